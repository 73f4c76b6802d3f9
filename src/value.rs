#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Runtime values harvested from an executed script.
//!
//! A [`Value`] mirrors what a script leaves in its top-level namespace, closely
//! enough that the grader can tell a list from a set from an array but without
//! pretending to understand arbitrary objects: anything unknown becomes
//! [`Value::Opaque`]. The serde representation is the on-disk format of the
//! expected-values record and of the runner harness output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Final variable bindings of one script execution.
pub type Variables = BTreeMap<String, Value>;

/// Element type of an n-dimensional array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    /// Booleans, stored as 0.0 / 1.0.
    Bool,
    /// Signed or unsigned integers.
    Int64,
    /// Real floating point.
    Float64,
    /// Complex floating point; imaginary parts live in [`NdArray::imag`].
    Complex128,
}

impl ElementType {
    /// Returns true for complex element types.
    pub fn is_complex(self) -> bool {
        matches!(self, ElementType::Complex128)
    }
}

/// A dense, row-major n-dimensional numeric array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdArray {
    /// Extent of every axis.
    pub shape: Vec<usize>,
    /// Element type reported by the producing runtime.
    pub dtype: ElementType,
    /// Real parts, flattened in row-major order.
    #[serde(with = "codec::floats")]
    pub data:  Vec<f64>,
    /// Imaginary parts; empty unless `dtype` is complex.
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "codec::floats")]
    pub imag:  Vec<f64>,
}

impl NdArray {
    /// Builds a real array, checking that `data` fills `shape`.
    pub fn real(shape: Vec<usize>, data: Vec<f64>) -> Option<Self> {
        (shape.iter().product::<usize>() == data.len()).then_some(Self {
            shape,
            dtype: ElementType::Float64,
            data,
            imag: Vec::new(),
        })
    }

    /// Builds a complex array, checking that both parts fill `shape`.
    pub fn complex(shape: Vec<usize>, re: Vec<f64>, im: Vec<f64>) -> Option<Self> {
        let len = shape.iter().product::<usize>();
        (len == re.len() && len == im.len()).then_some(Self {
            shape,
            dtype: ElementType::Complex128,
            data: re,
            imag: im,
        })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true when the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One runtime value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// The runtime's null.
    None,
    /// A boolean.
    Bool(bool),
    /// An integer that fits in 64 bits.
    Int(i64),
    /// A real float.
    Float(#[serde(with = "codec::float")] f64),
    /// A complex scalar.
    Complex {
        /// Real part.
        #[serde(with = "codec::float")]
        re: f64,
        /// Imaginary part.
        #[serde(with = "codec::float")]
        im: f64,
    },
    /// A string.
    Str(String),
    /// An ordered, mutable sequence.
    List(Vec<Value>),
    /// An ordered, immutable sequence.
    Tuple(Vec<Value>),
    /// An unordered collection, in the order the runtime iterated it.
    Set(Vec<Value>),
    /// A numeric array.
    Ndarray(NdArray),
    /// A string-keyed mapping.
    Dict(BTreeMap<String, Value>),
    /// Anything else, kept only by its type name and printed form.
    Opaque {
        /// Runtime type name.
        type_name: String,
        /// Printed representation.
        repr:      String,
    },
}

impl Value {
    /// Shorthand for a real array value; `None` if `data` does not fill
    /// `shape`.
    pub fn array(shape: Vec<usize>, data: Vec<f64>) -> Option<Self> {
        NdArray::real(shape, data).map(Value::Ndarray)
    }

    /// Shorthand for a list of floats.
    pub fn float_list(items: impl IntoIterator<Item = f64>) -> Self {
        Value::List(items.into_iter().map(Value::Float).collect())
    }

    /// Name of the runtime type this value came from.
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Complex { .. } => "complex",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Ndarray(_) => "ndarray",
            Value::Dict(_) => "dict",
            Value::Opaque { type_name, .. } => type_name,
        }
    }

    /// Returns the boolean if this value is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns true for the runtime's null.
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Converts to plain JSON, dropping the type tags.
    ///
    /// Used to read a rubric that an instructor wrote as variables of the
    /// solution script. Arrays become nested lists, opaque values their
    /// printed form, and non-finite floats JSON `null`.
    pub fn to_plain_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        let number = |x: f64| serde_json::Number::from_f64(x).map_or(Json::Null, Json::Number);
        match self {
            Value::None => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(x) => number(*x),
            Value::Complex { re, im } => Json::Array(vec![number(*re), number(*im)]),
            Value::Str(s) => Json::String(s.clone()),
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => {
                Json::Array(items.iter().map(Value::to_plain_json).collect())
            }
            Value::Ndarray(arr) => nest(&arr.shape, &arr.data, &number),
            Value::Dict(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_plain_json()))
                    .collect(),
            ),
            Value::Opaque { repr, .. } => Json::String(repr.clone()),
        }
    }
}

/// Rebuilds nested JSON lists from a flat row-major buffer.
fn nest(
    shape: &[usize],
    data: &[f64],
    number: &dyn Fn(f64) -> serde_json::Value,
) -> serde_json::Value {
    match shape.split_first() {
        None => data.first().copied().map_or(serde_json::Value::Null, number),
        Some((_, rest)) if rest.is_empty() => {
            serde_json::Value::Array(data.iter().copied().map(number).collect())
        }
        Some((&outer, rest)) => {
            let stride = rest.iter().product::<usize>();
            serde_json::Value::Array(
                (0..outer)
                    .map(|i| {
                        let end = ((i + 1) * stride).min(data.len());
                        let start = (i * stride).min(end);
                        nest(rest, &data[start..end], number)
                    })
                    .collect(),
            )
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// JSON has no NaN or infinities; these codecs spell them as strings so the
/// expected-values record round-trips exactly.
mod codec {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    /// A float as it may appear on disk.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        /// An ordinary JSON number.
        Number(f64),
        /// One of `NaN`, `inf`, `-inf`.
        Tagged(String),
    }

    /// Decodes one on-disk float.
    fn decode<E: Error>(repr: Repr) -> Result<f64, E> {
        match repr {
            Repr::Number(x) => Ok(x),
            Repr::Tagged(tag) => match tag.as_str() {
                "NaN" | "nan" => Ok(f64::NAN),
                "inf" | "Infinity" => Ok(f64::INFINITY),
                "-inf" | "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(E::custom(format!("not a float: {other}"))),
            },
        }
    }

    /// Encodes one float, spelling non-finite values as strings.
    fn encode<S: Serializer>(x: f64, serializer: S) -> Result<S::Ok, S::Error> {
        if x.is_nan() {
            serializer.serialize_str("NaN")
        } else if x == f64::INFINITY {
            serializer.serialize_str("inf")
        } else if x == f64::NEG_INFINITY {
            serializer.serialize_str("-inf")
        } else {
            serializer.serialize_f64(x)
        }
    }

    /// Codec for a single `f64` field.
    pub mod float {
        use super::*;

        /// Serializes one float.
        pub fn serialize<S: Serializer>(x: &f64, serializer: S) -> Result<S::Ok, S::Error> {
            encode(*x, serializer)
        }

        /// Deserializes one float.
        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
            decode(Repr::deserialize(deserializer)?)
        }
    }

    /// Codec for a `Vec<f64>` field.
    pub mod floats {
        use serde::ser::SerializeSeq;

        use super::*;

        /// Serializes a float buffer.
        pub fn serialize<S: Serializer>(xs: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
            /// Adapter so each element goes through [`encode`].
            struct One(f64);
            impl serde::Serialize for One {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    encode(self.0, serializer)
                }
            }

            let mut seq = serializer.serialize_seq(Some(xs.len()))?;
            for x in xs {
                seq.serialize_element(&One(*x))?;
            }
            seq.end()
        }

        /// Deserializes a float buffer.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<f64>, D::Error> {
            Vec::<Repr>::deserialize(deserializer)?
                .into_iter()
                .map(decode)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_floats_round_trip() {
        let arr = Value::array(vec![3], vec![f64::NAN, f64::INFINITY, -1.5]).unwrap();
        let json = serde_json::to_string(&arr).unwrap();
        assert!(json.contains("\"NaN\""));
        assert!(json.contains("\"inf\""));

        let back: Value = serde_json::from_str(&json).unwrap();
        let Value::Ndarray(back) = back else {
            panic!("expected an array, got {back:?}");
        };
        assert!(back.data[0].is_nan());
        assert_eq!(back.data[1], f64::INFINITY);
        assert_eq!(back.data[2], -1.5);
    }

    #[test]
    fn scalars_use_adjacent_tags() {
        let json = serde_json::to_value(Value::Float(0.1 + 0.2)).unwrap();
        assert_eq!(json["type"], "float");
        let back: Value = serde_json::from_value(json).unwrap();
        assert_eq!(back, Value::Float(0.1 + 0.2));

        let none: Value = serde_json::from_str(r#"{"type":"none"}"#).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn plain_json_nests_arrays_by_shape() {
        let arr = Value::array(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(arr.to_plain_json(), serde_json::json!([[1.0, 2.0], [3.0, 4.0]]));
    }

    #[test]
    fn array_constructor_rejects_wrong_length() {
        assert!(Value::array(vec![2, 3], vec![1.0; 5]).is_none());
        assert!(NdArray::complex(vec![2], vec![1.0, 2.0], vec![0.0]).is_none());
    }
}
