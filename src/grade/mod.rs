#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Comparator: match/mismatch and why.
pub mod compare;
/// Scoring engine and per-test report.
pub mod engine;
/// Attempt/score ledger.
pub mod ledger;
/// Type normalizer.
pub mod normalize;
/// Rubric data model and validation.
pub mod rubric;

pub use compare::{Comparison, FailureKind, Outcome, Tolerance, compare};
pub use engine::{GradeReport, Points, TestResult, grade, overview_table, pretest_flag, round_score};
pub use ledger::{AttemptRecord, FinalScoreDecision, Suppression, reconcile};
pub use normalize::{ConversionError, Dtype, NormalizedValue, NumericArray, normalize};
pub use rubric::{ExpectedValues, Rubric, RubricDraft, TestDraft, TestSpec};
