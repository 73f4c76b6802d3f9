#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Reduction of runtime values to a handful of comparison shapes.
//!
//! Instructors and students write "the same" answer as a bare number, a
//! one-element list, a set, or an array. Normalization erases those container
//! differences so the comparator only ever sees a number, a numeric array, a
//! string, or something opaque.

use std::fmt;

use itertools::Itertools;
use thiserror::Error;

use crate::value::{ElementType, NdArray, Value};

/// Raised when a sequence-like value has no numeric-array reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Conversion error to numeric array: {reason}. Object of type {type_name}")]
pub struct ConversionError {
    /// What went wrong.
    pub reason:    String,
    /// Type of the value being converted.
    pub type_name: String,
}

/// Element type of a normalized array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    /// 64-bit real floats.
    Float64,
    /// 128-bit complex floats.
    Complex128,
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::Float64 => write!(f, "float64"),
            Dtype::Complex128 => write!(f, "complex128"),
        }
    }
}

/// A numeric array after normalization.
///
/// A zero-dimensional complex array stands for a complex scalar; real scalars
/// always normalize to [`NormalizedValue::Number`] instead.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    /// Extent of every axis.
    shape: Vec<usize>,
    /// Element type.
    dtype: Dtype,
    /// Real parts, row-major.
    re:    Vec<f64>,
    /// Imaginary parts; empty for real arrays.
    im:    Vec<f64>,
}

impl NumericArray {
    /// Extent of every axis.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element type.
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Real parts, row-major.
    pub fn re(&self) -> &[f64] {
        &self.re
    }

    /// Imaginary parts, or zeros for a real array.
    pub fn im(&self, idx: usize) -> f64 {
        self.im.get(idx).copied().unwrap_or(0.0)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.re.len()
    }

    /// Returns true when the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.re.is_empty()
    }

    /// Returns true if any element has a NaN component.
    pub fn has_nan(&self) -> bool {
        self.re.iter().chain(self.im.iter()).any(|x| x.is_nan())
    }

    /// Python-style rendering of the shape, e.g. `(3, 4)` or `(5,)`.
    pub fn shape_string(&self) -> String {
        format_shape(&self.shape)
    }
}

/// Formats a shape the way numpy prints it.
pub fn format_shape(shape: &[usize]) -> String {
    match shape {
        [single] => format!("({single},)"),
        dims => format!("({})", dims.iter().join(", ")),
    }
}

/// The canonical comparison shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedValue {
    /// Any real scalar, or any container holding exactly one real number.
    Number(f64),
    /// Any numeric container with zero or several elements, or a complex
    /// scalar.
    Array(NumericArray),
    /// A string, untouched.
    Text(String),
    /// Anything else; only exact equality is meaningful.
    Opaque(Value),
}

impl NormalizedValue {
    /// Human-readable kind used in type-mismatch messages.
    pub fn describe(&self) -> String {
        match self {
            NormalizedValue::Number(_) => "number".to_string(),
            NormalizedValue::Array(arr) if arr.shape.is_empty() => "complex number".to_string(),
            NormalizedValue::Array(arr) => format!("matrix of shape {}", arr.shape_string()),
            NormalizedValue::Text(_) => "string".to_string(),
            NormalizedValue::Opaque(v) => v.type_name().to_string(),
        }
    }

    /// Returns true when both sides have the same comparison kind.
    ///
    /// All real scalars share one kind regardless of where they came from;
    /// arrays are one kind whatever their shape (shape is checked later);
    /// opaque values must come from the same runtime type.
    pub fn same_kind(&self, other: &NormalizedValue) -> bool {
        match (self, other) {
            (NormalizedValue::Number(_), NormalizedValue::Number(_))
            | (NormalizedValue::Array(_), NormalizedValue::Array(_))
            | (NormalizedValue::Text(_), NormalizedValue::Text(_)) => true,
            (NormalizedValue::Opaque(a), NormalizedValue::Opaque(b)) => {
                a.type_name() == b.type_name()
            }
            _ => false,
        }
    }

    /// Maps back to a runtime value that normalizes to `self`.
    pub fn into_value(self) -> Value {
        match self {
            NormalizedValue::Number(x) => Value::Float(x),
            NormalizedValue::Array(arr) if arr.shape.is_empty() => Value::Complex {
                re: arr.re.first().copied().unwrap_or(0.0),
                im: arr.im.first().copied().unwrap_or(0.0),
            },
            NormalizedValue::Array(arr) => Value::Ndarray(match arr.dtype {
                Dtype::Float64 => NdArray {
                    shape: arr.shape,
                    dtype: ElementType::Float64,
                    data:  arr.re,
                    imag:  Vec::new(),
                },
                Dtype::Complex128 => NdArray {
                    shape: arr.shape,
                    dtype: ElementType::Complex128,
                    data:  arr.re,
                    imag:  arr.im,
                },
            }),
            NormalizedValue::Text(s) => Value::Str(s),
            NormalizedValue::Opaque(v) => v,
        }
    }
}

/// Reduces a runtime value to its comparison shape.
///
/// Rules, first match wins:
/// 1. scalar numbers (booleans included) become [`NormalizedValue::Number`];
/// 2. numeric containers with exactly one element collapse to that element;
/// 3. other lists, tuples, sets and arrays become a [`NumericArray`], and a
///    non-numeric or ragged element is a [`ConversionError`];
/// 4. strings pass through;
/// 5. everything else is opaque.
pub fn normalize(value: &Value) -> Result<NormalizedValue, ConversionError> {
    match value {
        Value::Bool(b) => Ok(NormalizedValue::Number(f64::from(u8::from(*b)))),
        Value::Int(i) => Ok(NormalizedValue::Number(*i as f64)),
        Value::Float(x) => Ok(NormalizedValue::Number(*x)),
        Value::Complex { re, im } => Ok(scalar(*re, *im)),
        Value::Str(s) => Ok(NormalizedValue::Text(s.clone())),
        Value::List(_) | Value::Tuple(_) | Value::Set(_) | Value::Ndarray(_) => {
            let dense = densify(value).map_err(|reason| ConversionError {
                reason,
                type_name: value.type_name().to_string(),
            })?;
            Ok(dense.collapse())
        }
        Value::None | Value::Dict(_) | Value::Opaque { .. } => {
            Ok(NormalizedValue::Opaque(value.clone()))
        }
    }
}

/// Builds the normalized form of one complex number.
fn scalar(re: f64, im: f64) -> NormalizedValue {
    if im == 0.0 {
        NormalizedValue::Number(re)
    } else {
        NormalizedValue::Array(NumericArray {
            shape: Vec::new(),
            dtype: Dtype::Complex128,
            re:    vec![re],
            im:    vec![im],
        })
    }
}

/// A rectangular block of numbers discovered while walking a container.
#[derive(Debug, Default)]
struct Dense {
    /// Extent of every axis.
    shape:   Vec<usize>,
    /// Real parts, row-major.
    re:      Vec<f64>,
    /// Imaginary parts, row-major, same length as `re`.
    im:      Vec<f64>,
    /// Whether any element was complex.
    complex: bool,
}

impl Dense {
    /// A zero-dimensional block holding one number.
    fn leaf(re: f64, im: f64, complex: bool) -> Self {
        Self {
            shape: Vec::new(),
            re: vec![re],
            im: vec![im],
            complex,
        }
    }

    /// Applies the single-element collapse and picks the dtype.
    fn collapse(self) -> NormalizedValue {
        if self.re.len() == 1 {
            return scalar(self.re[0], self.im[0]);
        }
        let (dtype, im) = if self.complex {
            (Dtype::Complex128, self.im)
        } else {
            (Dtype::Float64, Vec::new())
        };
        NormalizedValue::Array(NumericArray {
            shape: self.shape,
            dtype,
            re: self.re,
            im,
        })
    }
}

/// Walks a value into a rectangular numeric block.
fn densify(value: &Value) -> Result<Dense, String> {
    match value {
        Value::Bool(b) => Ok(Dense::leaf(f64::from(u8::from(*b)), 0.0, false)),
        Value::Int(i) => Ok(Dense::leaf(*i as f64, 0.0, false)),
        Value::Float(x) => Ok(Dense::leaf(*x, 0.0, false)),
        Value::Complex { re, im } => Ok(Dense::leaf(*re, *im, true)),
        Value::Ndarray(arr) => {
            let complex = arr.dtype.is_complex();
            let im = if complex && arr.imag.len() == arr.data.len() {
                arr.imag.clone()
            } else {
                vec![0.0; arr.data.len()]
            };
            if arr.shape.iter().product::<usize>() != arr.data.len() {
                return Err(format!(
                    "array of shape {} carries {} elements",
                    format_shape(&arr.shape),
                    arr.data.len()
                ));
            }
            Ok(Dense {
                shape: arr.shape.clone(),
                re: arr.data.clone(),
                im,
                complex,
            })
        }
        Value::List(items) | Value::Tuple(items) | Value::Set(items) => {
            let mut out = Dense {
                shape: vec![items.len()],
                ..Dense::default()
            };
            let mut inner: Option<Vec<usize>> = None;
            for item in items {
                let block = densify(item)?;
                match &inner {
                    None => inner = Some(block.shape.clone()),
                    Some(shape) if *shape != block.shape => {
                        return Err(format!(
                            "setting an array element with a sequence: inhomogeneous shapes {} \
                             and {}",
                            format_shape(shape),
                            format_shape(&block.shape)
                        ));
                    }
                    Some(_) => {}
                }
                out.complex |= block.complex;
                out.re.extend(block.re);
                out.im.extend(block.im);
            }
            out.shape.extend(inner.unwrap_or_default());
            Ok(out)
        }
        other => Err(format!("element of type {} is not a number", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_lists_are_rejected() {
        let ragged = Value::List(vec![Value::float_list([1.0, 2.0]), Value::float_list([3.0])]);
        let err = normalize(&ragged).unwrap_err();
        assert!(err.reason.contains("inhomogeneous"), "{err}");
    }

    #[test]
    fn empty_list_is_an_empty_array() {
        let NormalizedValue::Array(arr) = normalize(&Value::List(vec![])).unwrap() else {
            panic!("expected array");
        };
        assert_eq!(arr.shape(), &[0]);
        assert!(arr.is_empty());
    }

    #[test]
    fn shapes_print_like_numpy() {
        assert_eq!(format_shape(&[3]), "(3,)");
        assert_eq!(format_shape(&[3, 4]), "(3, 4)");
        assert_eq!(format_shape(&[]), "()");
    }
}
