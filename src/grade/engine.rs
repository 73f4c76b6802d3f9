#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Scoring engine: runs every rubric test against one submission.

use std::fmt::Display;

use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, Width, object::Rows},
};

use super::{
    compare::{FailureKind, compare},
    rubric::{ExpectedValues, Rubric},
};
use crate::{
    constants::PRETEST_VARIABLE,
    error::{GradingError, RubricError},
    runner::Platform,
    value::{Value, Variables},
};

/// Rounds a score to two decimals.
pub fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
/// Points awarded out of points available
pub struct Points {
    /// Points awarded
    pub awarded: f64,
    /// Points available
    pub out_of:  f64,
}

impl Display for Points {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}/{:.2}", self.awarded, self.out_of)
    }
}

#[derive(Tabled, Clone, Debug, PartialEq)]
/// Outcome of one test
pub struct TestResult {
    #[tabled(rename = "Test")]
    /// Numbered display name, e.g. `1. Part A: the sum`
    pub name:    String,
    #[tabled(rename = "Score")]
    /// Points for this test
    pub points:  Points,
    #[tabled(rename = "Message")]
    /// `Correct.` or the failure explanation, with a hint when one exists
    pub message: String,
    #[tabled(skip)]
    /// Why the test failed, if it did
    pub failure: Option<FailureKind>,
}

impl TestResult {
    /// Points awarded.
    pub fn score(&self) -> f64 {
        self.points.awarded
    }

    /// Returns true if the test passed.
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Result of grading one submission.
#[derive(Clone, Debug, PartialEq)]
pub struct GradeReport {
    /// Sum of awarded points, rounded to two decimals.
    pub score:     f64,
    /// Sum of all test weights.
    pub max_score: f64,
    /// Per-test results in rubric order.
    pub tests:     Vec<TestResult>,
    /// Narrative shown above the tests.
    pub output:    String,
    /// Set when the submission declared itself a pretest.
    pub pretest:   bool,
}

/// Reads the reserved pretest flag from a submission.
///
/// Absent or `None` means not a pretest; anything but a boolean is the
/// student's mistake.
pub fn pretest_flag(submission: &Variables) -> Result<bool, GradingError> {
    match submission.get(PRETEST_VARIABLE) {
        None | Some(Value::None) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(other) => Err(GradingError::user(format!(
            "{PRETEST_VARIABLE} should be boolean value, but in your submission it's {}",
            other.type_name()
        ))),
    }
}

/// Grades `submission` against the rubric, in rubric order.
///
/// A test whose expected value was never captured aborts the whole pass with
/// an internal error: the autograder was built incorrectly.
pub fn grade(
    rubric: &Rubric,
    expected: &ExpectedValues,
    submission: &Variables,
    platform: Platform,
) -> Result<GradeReport, GradingError> {
    let pretest = pretest_flag(submission)?;
    let mut tests = Vec::with_capacity(rubric.tests().len());
    let mut total = 0.0;

    for (index, test) in rubric.tests().iter().enumerate() {
        let variable = test.expected_variable();
        let expected_value = expected
            .get(variable)
            .ok_or_else(|| RubricError::MissingExpectedValue(variable.to_string()))?;
        let student = submission.get(variable).filter(|v| !v.is_none());

        let comparison = compare(variable, student, expected_value, test.tolerance())?;
        let name = test.display_name(index);
        let result = match comparison.failure() {
            None => {
                total += test.weight();
                TestResult {
                    name,
                    points: Points {
                        awarded: test.weight(),
                        out_of:  test.weight(),
                    },
                    message: "Correct.".to_string(),
                    failure: None,
                }
            }
            Some(kind) => {
                let mut message = comparison.details;
                if let Some(hint) = test.hint(kind, platform) {
                    message.push_str("\nHint: ");
                    message.push_str(hint);
                }
                TestResult {
                    name,
                    points: Points {
                        awarded: 0.0,
                        out_of:  test.weight(),
                    },
                    message,
                    failure: Some(kind),
                }
            }
        };
        tracing::debug!(
            "{}: {}",
            result.name,
            result
                .failure
                .map_or_else(|| "passed".to_string(), |kind| kind.to_string())
        );
        tests.push(result);
    }

    let max_score = rubric.total_score();
    let score = round_score(total).min(max_score);
    tracing::info!("Scored {score:.2}/{max_score:.2}{}", if pretest { " (pretest)" } else { "" });
    Ok(GradeReport {
        score,
        max_score,
        tests,
        output: format!("Executed successfully. Current score: {score:.2}/{max_score:.2}\n"),
        pretest,
    })
}

/// Renders the per-test results as a console table.
pub fn overview_table(tests: &[TestResult], score: f64, max_score: f64) -> String {
    Table::new(tests)
        .with(Panel::header("Grading Overview"))
        .with(Panel::footer(format!("Total: {score:.2}/{max_score:.2}")))
        .with(Modify::new(Rows::new(1..)).with(Width::wrap(40).keep_words(true)))
        .with(
            Modify::new(Rows::first())
                .with(Alignment::center())
                .with(Alignment::center_vertical()),
        )
        .with(
            Modify::new(Rows::last())
                .with(Alignment::center())
                .with(Alignment::center_vertical()),
        )
        .with(Style::modern())
        .to_string()
}
