#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Failure classification shared by packaging and grading.
//!
//! Every failure that can end a grading invocation is reduced to one of two
//! kinds before the final report is assembled. The kind decides whether the
//! student loses an attempt.

use thiserror::Error;

/// Who is responsible for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    /// The submitted (or, while packaging, the instructor's) code or files.
    User,
    /// The grading system itself.
    Internal,
}

/// A classified failure of a packaging or grading run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GradingError {
    /// Attributable to the submitted code; consumes an attempt.
    #[error("{0}")]
    User(String),
    /// Attributable to the grader; never consumes an attempt.
    #[error("{0}")]
    Internal(String),
}

impl GradingError {
    /// Builds a user-attributable failure.
    pub fn user(message: impl Into<String>) -> Self {
        Self::User(message.into())
    }

    /// Builds a system-attributable failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns who is responsible for this failure.
    pub fn attribution(&self) -> Attribution {
        match self {
            Self::User(_) => Attribution::User,
            Self::Internal(_) => Attribution::Internal,
        }
    }

    /// Returns true when the failure must not cost the student an attempt.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// Reclassifies any failure as internal, keeping its message.
    ///
    /// Used while grading, where a broken rubric is always the grader's fault
    /// even though the same check is an instructor error while packaging.
    pub fn into_internal(self) -> Self {
        match self {
            Self::User(message) | Self::Internal(message) => Self::Internal(message),
        }
    }
}

/// Problems with an instructor-authored rubric.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RubricError {
    /// The rubric declares no tests at all.
    #[error("The test suite is empty: define at least one test.")]
    EmptyTestSuite,

    /// The rubric could not be parsed.
    #[error("Rubric can not be loaded. Error:\n{0}\nMake sure there are no typos in the JSON syntax.")]
    Malformed(String),

    /// Two tests share a name.
    #[error("Test name `{0}` is used more than once; test names must be unique.")]
    DuplicateName(String),

    /// A test does not say which variable it checks.
    #[error("{0}: expected variable name is empty.")]
    MissingVariable(String),

    /// A test has no weight and there is no total to derive one from.
    #[error(
        "{0}: score is missing and total_score is not defined. You need to either define scores \
         for each test or define total_score."
    )]
    MissingWeight(String),

    /// A weight is negative or not a number.
    #[error("{name}: score should be a non-negative number, got {weight}.")]
    InvalidWeight {
        /// Test name.
        name:   String,
        /// Offending weight.
        weight: f64,
    },

    /// `total_score` is negative or not a number.
    #[error("total_score should be a non-negative number, got {0}.")]
    InvalidTotal(f64),

    /// An explicit weight disagrees with the weight derived from the total.
    #[error(
        "{name}: score for this test is not consistent with total_score: {explicit:.2} vs \
         {derived:.2} ({total}/{count}). You need to define either one global score to assign \
         points evenly, or to define all tests' scores manually. When you do both make sure \
         they're consistent."
    )]
    InconsistentWeight {
        /// Test name.
        name:     String,
        /// Weight written on the test.
        explicit: f64,
        /// Weight derived from `total_score`.
        derived:  f64,
        /// Declared `total_score`.
        total:    f64,
        /// Number of tests the total is spread over.
        count:    usize,
    },

    /// A tolerance is negative or not a number.
    #[error("Tolerances for test {0}: rtol and atol should be non-negative numbers.")]
    InvalidTolerance(String),

    /// A platform name is not one gspack knows how to run.
    #[error("Unrecognized platform: {0}. Options are: python, jupyter, matlab.")]
    UnknownPlatform(String),

    /// The solution finished without defining a variable a test checks.
    #[error(
        "{test}: variable {variable} is set to be checked but it's not defined after the \
         solution finishes its execution."
    )]
    UndefinedExpectedVariable {
        /// Test name.
        test:     String,
        /// Variable the test reads.
        variable: String,
    },

    /// Grading found no captured answer for a declared test.
    #[error("No expected value was captured for variable {0}; the autograder was packaged incorrectly.")]
    MissingExpectedValue(String),
}

impl From<RubricError> for GradingError {
    /// Rubric defects are the author's fault; while grading callers escalate
    /// them with [`GradingError::into_internal`].
    fn from(err: RubricError) -> Self {
        match err {
            RubricError::MissingExpectedValue(_) => GradingError::Internal(err.to_string()),
            other => GradingError::User(other.to_string()),
        }
    }
}
