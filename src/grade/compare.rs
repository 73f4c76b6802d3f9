#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Decides whether a student's value matches the expected one, and if not,
//! why not.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::normalize::{NormalizedValue, NumericArray, normalize};
use crate::{
    constants::{DEFAULT_ATOL, DEFAULT_RTOL},
    error::GradingError,
    value::Value,
};

/// Relative and absolute tolerance for numeric comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Relative tolerance, scaled by the expected magnitude.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: DEFAULT_RTOL,
            atol: DEFAULT_ATOL,
        }
    }
}

impl Tolerance {
    /// Creates a tolerance from explicit values.
    pub fn new(rtol: f64, atol: f64) -> Self {
        Self { rtol, atol }
    }

    /// `|actual - expected| <= atol + rtol * |expected|`.
    ///
    /// Equal infinities are close; NaN is never close to anything.
    pub fn is_close(&self, actual: f64, expected: f64) -> bool {
        if actual == expected {
            return true;
        }
        if !actual.is_finite() || !expected.is_finite() {
            return false;
        }
        (actual - expected).abs() <= self.atol + self.rtol * expected.abs()
    }

    /// Complex counterpart of [`Tolerance::is_close`], using the modulus.
    pub fn is_close_complex(&self, actual: (f64, f64), expected: (f64, f64)) -> bool {
        if actual == expected {
            return true;
        }
        let finite = |(re, im): (f64, f64)| re.is_finite() && im.is_finite();
        if !finite(actual) || !finite(expected) {
            return false;
        }
        let diff = (actual.0 - expected.0).hypot(actual.1 - expected.1);
        diff <= self.atol + self.rtol * expected.0.hypot(expected.1)
    }
}

/// Why a comparison failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The submission never produced the variable.
    NotDefined,
    /// The student's value could not be normalized.
    UnrecognizedType,
    /// The two sides normalize to different kinds.
    TypeMismatch,
    /// Both are arrays, of different shapes.
    ShapeMismatch,
    /// Both are arrays, one real and one complex.
    DtypeMismatch,
    /// The student's value contains NaN.
    ContainsNaN,
    /// Numbers differ by more than the tolerance.
    ToleranceExceeded,
    /// Strings differ after trimming and lower-casing.
    StringMismatch,
}

impl FailureKind {
    /// Hint keys to try, most specific first.
    pub fn hint_keys(self) -> &'static [&'static str] {
        match self {
            FailureKind::NotDefined => &["not_defined"],
            FailureKind::UnrecognizedType => &["unrecognized_type"],
            FailureKind::TypeMismatch => &["wrong_type"],
            FailureKind::ShapeMismatch => &["wrong_size"],
            FailureKind::DtypeMismatch => &["wrong_dtype", "wrong_type"],
            FailureKind::ContainsNaN => &["nans"],
            FailureKind::ToleranceExceeded => &["tolerance"],
            FailureKind::StringMismatch => &["string_mismatch"],
        }
    }

    /// Every failure kind, in decision order.
    pub const ALL: [FailureKind; 8] = [
        FailureKind::NotDefined,
        FailureKind::UnrecognizedType,
        FailureKind::TypeMismatch,
        FailureKind::ShapeMismatch,
        FailureKind::DtypeMismatch,
        FailureKind::ContainsNaN,
        FailureKind::ToleranceExceeded,
        FailureKind::StringMismatch,
    ];
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::NotDefined => "not defined",
            FailureKind::UnrecognizedType => "unrecognized type",
            FailureKind::TypeMismatch => "type mismatch",
            FailureKind::ShapeMismatch => "shape mismatch",
            FailureKind::DtypeMismatch => "dtype mismatch",
            FailureKind::ContainsNaN => "contains NaN",
            FailureKind::ToleranceExceeded => "tolerance exceeded",
            FailureKind::StringMismatch => "string mismatch",
        };
        f.write_str(name)
    }
}

/// Verdict of one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The values agree.
    Match,
    /// The values disagree for the given reason.
    Mismatch(FailureKind),
}

/// A verdict plus the explanation shown to the student.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Match or the reason for a mismatch.
    pub outcome: Outcome,
    /// Explanation of a mismatch; empty on a match.
    pub details: String,
}

impl Comparison {
    /// A successful comparison.
    fn matched() -> Self {
        Self {
            outcome: Outcome::Match,
            details: String::new(),
        }
    }

    /// A failed comparison.
    fn failed(kind: FailureKind, details: String) -> Self {
        Self {
            outcome: Outcome::Mismatch(kind),
            details,
        }
    }

    /// Returns true on a match.
    pub fn is_match(&self) -> bool {
        self.outcome == Outcome::Match
    }

    /// Returns the failure kind, if any.
    pub fn failure(&self) -> Option<FailureKind> {
        match self.outcome {
            Outcome::Match => None,
            Outcome::Mismatch(kind) => Some(kind),
        }
    }
}

/// Compares the student's value of `variable` against the expected one.
///
/// `student` is `None` when the submission never bound the variable. The
/// student side decides which shape or type is reported as wrong. An
/// expected value that cannot be normalized means the autograder itself is
/// broken, which is reported as [`GradingError::Internal`].
pub fn compare(
    variable: &str,
    student: Option<&Value>,
    expected: &Value,
    tolerance: Tolerance,
) -> Result<Comparison, GradingError> {
    let Some(student) = student else {
        return Ok(Comparison::failed(
            FailureKind::NotDefined,
            format!("Variable {variable} is not defined in your solution file. "),
        ));
    };

    let actual = match normalize(student) {
        Ok(actual) => actual,
        Err(err) => {
            tracing::debug!("{variable}: {err}");
            return Ok(Comparison::failed(
                FailureKind::UnrecognizedType,
                format!("Variable {variable} has an unrecognized type. "),
            ));
        }
    };
    let expected = normalize(expected).map_err(|err| {
        GradingError::internal(format!("Expected value for {variable} can not be converted: {err}"))
    })?;

    if !actual.same_kind(&expected) {
        return Ok(type_failure(variable, &actual, &expected));
    }

    let comparison = match (&actual, &expected) {
        (NormalizedValue::Number(a), NormalizedValue::Number(b)) => {
            compare_numbers(variable, *a, *b, tolerance)
        }
        (NormalizedValue::Array(a), NormalizedValue::Array(b)) => {
            compare_arrays(variable, a, b, tolerance)
        }
        (NormalizedValue::Text(a), NormalizedValue::Text(b)) => {
            if a.trim().to_lowercase() == b.trim().to_lowercase() {
                Comparison::matched()
            } else {
                Comparison::failed(
                    FailureKind::StringMismatch,
                    "Your answer does not match the right answer. ".to_string(),
                )
            }
        }
        (NormalizedValue::Opaque(a), NormalizedValue::Opaque(b)) => {
            if a == b {
                Comparison::matched()
            } else {
                Comparison::failed(
                    FailureKind::TypeMismatch,
                    format!(
                        "Wrong answer type: values of type {} can not be checked beyond exact \
                         equality, and your variable {variable} differs from the right answer. ",
                        a.type_name()
                    ),
                )
            }
        }
        _ => type_failure(variable, &actual, &expected),
    };
    Ok(comparison)
}

/// Scalar branch: NaN first, then tolerance.
fn compare_numbers(variable: &str, actual: f64, expected: f64, tol: Tolerance) -> Comparison {
    if actual.is_nan() {
        return nan_failure(variable);
    }
    if !tol.is_close(actual, expected) {
        return tolerance_failure();
    }
    Comparison::matched()
}

/// Array branch: shape, dtype, NaN, then elementwise tolerance.
fn compare_arrays(
    variable: &str,
    actual: &NumericArray,
    expected: &NumericArray,
    tol: Tolerance,
) -> Comparison {
    if actual.shape() != expected.shape() {
        return Comparison::failed(
            FailureKind::ShapeMismatch,
            format!(
                "Wrong dimensions: the shape of your variable {variable} is {}, but it should be \
                 {}. ",
                actual.shape_string(),
                expected.shape_string()
            ),
        );
    }
    if actual.dtype() != expected.dtype() {
        return Comparison::failed(
            FailureKind::DtypeMismatch,
            format!(
                "Wrong data type of the array: the data type of your array {variable} is {}, but \
                 it should be {}. ",
                actual.dtype(),
                expected.dtype()
            ),
        );
    }
    if actual.has_nan() {
        return nan_failure(variable);
    }

    let close = (0..actual.len()).all(|i| {
        tol.is_close_complex((actual.re()[i], actual.im(i)), (expected.re()[i], expected.im(i)))
    });
    if close {
        Comparison::matched()
    } else {
        tolerance_failure()
    }
}

/// Kinds differ; both are named so the student sees what was expected.
fn type_failure(variable: &str, actual: &NormalizedValue, expected: &NormalizedValue) -> Comparison {
    Comparison::failed(
        FailureKind::TypeMismatch,
        format!(
            "Wrong answer type: the type of your variable {variable} is {}, but it should be a \
             {}. ",
            actual.describe(),
            expected.describe()
        ),
    )
}

/// Shared NaN failure.
fn nan_failure(variable: &str) -> Comparison {
    Comparison::failed(FailureKind::ContainsNaN, format!("Your variable {variable} contains NaNs. "))
}

/// Shared tolerance failure.
fn tolerance_failure() -> Comparison {
    Comparison::failed(
        FailureKind::ToleranceExceeded,
        "Your answer is not within tolerance from the right answer. ".to_string(),
    )
}
