#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// File name of the rubric record inside an autograder directory.
pub const RUBRIC_JSON: &str = "rubric.json";

/// File name of the expected-values record inside an autograder directory.
pub const EXPECTED_VALUES_JSON: &str = "expected_values.json";

/// File name of the grading result record.
pub const RESULTS_JSON: &str = "results.json";

/// File name of the metadata Gradescope places in the autograder home.
pub const SUBMISSION_METADATA_JSON: &str = "submission_metadata.json";

/// Default autograder home on a Gradescope server.
pub const GRADESCOPE_HOME: &str = "/autograder";

/// Default directory `package` writes the autograder records into.
pub const AUTOGRADER_DIR: &str = "autograder";

/// Reserved submission variable that marks a diagnostic run.
pub const PRETEST_VARIABLE: &str = "pretest";

/// Default relative tolerance for numeric comparisons.
pub const DEFAULT_RTOL: f64 = 1e-5;

/// Default absolute tolerance for numeric comparisons.
pub const DEFAULT_ATOL: f64 = 1e-8;

/// Maximum disagreement between an explicit test weight and the weight
/// derived from `total_score`.
pub const WEIGHT_AGREEMENT_TOLERANCE: f64 = 1e-2;

/// Default wall-clock budget for one script execution, in seconds.
pub const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 1000;

/// Name of the exempt account Gradescope uses for instructor test runs.
pub const TEST_STUDENT_NAME: &str = "Test Student";

/// Email of the exempt account Gradescope uses for instructor test runs.
pub const TEST_STUDENT_EMAIL: &str = "test_student@gspack.com";

/// Identity used when the submission metadata carries no readable user.
pub const DEFAULT_STUDENT_NAME: &str = "John Smith";

/// Email paired with [`DEFAULT_STUDENT_NAME`].
pub const DEFAULT_STUDENT_EMAIL: &str = "john_smith@gspack.com";

/// Top-level solution variables that may carry an embedded rubric.
pub const RUBRIC_VARIABLES: [&str; 7] = [
    "test_suite",
    "total_score",
    "number_of_attempts",
    "supported_platforms",
    "extra_files",
    "main_file_name",
    "requirements",
];

/// Python harness that executes a script and dumps its final bindings.
pub const PYTHON_HARNESS: &str = include_str!("harness/capture.py");
