#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Gradescope's side of the conversation: the `results.json` the autograder
//! writes and the `submission_metadata.json` it reads.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{
    config::Identity,
    constants::{DEFAULT_STUDENT_EMAIL, DEFAULT_STUDENT_NAME},
    grade::{AttemptRecord, TestResult},
};

/// Represents output format settings for Gradescope submissions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GradescopeOutputFormat {
    /// Plain text format.
    Text,
    /// This is very similar to the "html" format option but will also convert
    /// \n into <br /> and \n\n+ into a page break.
    SimpleFormat,
    /// Markdown format.
    Md,
}

/// Represents visibility settings for Gradescope submissions and test cases.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GradescopeVisibility {
    /// Hidden from students.
    Hidden,
    /// Visible after the due date of the assignment.
    AfterDueDate,
    /// Visible after the grades are published.
    AfterPublished,
    /// Always visible to students.
    Visible,
}

/// Represents the status of a test case in Gradescope submissions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GradescopeStatus {
    /// Indicates the test case passed successfully.
    Passed,
    /// Indicates the test case failed.
    Failed,
}

/// Bookkeeping the next grading run reads back from `previous_submissions`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraData {
    /// False when the grader itself failed; the attempt then does not count.
    pub success: bool,
    /// True for a diagnostic run that must not count either.
    pub pretest: bool,
}

/// Represents the overall submission data.
#[derive(Serialize, Deserialize, Debug, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[builder(doc)]
pub struct GradescopeSubmission {
    /// Optional overall score. Overrides total of test cases if specified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Optional execution time in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u32>,

    /// Optional text relevant to the entire submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Optional output format settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<GradescopeOutputFormat>,

    /// Optional default output format for test case outputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_output_format: Option<GradescopeOutputFormat>,

    /// Optional default output format for test case names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_name_format: Option<GradescopeOutputFormat>,

    /// Optional visibility setting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<GradescopeVisibility>,

    /// Optional stdout visibility setting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_visibility: Option<GradescopeVisibility>,

    /// Attempt bookkeeping for the next run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<ExtraData>,

    /// Test cases; empty when details are withheld.
    #[serde(default)]
    pub tests: Vec<GradescopeTestCase>,
}

impl GradescopeSubmission {
    /// Writes the record as pretty JSON, creating the parent directory.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("Could not serialize results")?;
        fs::write(path, text).with_context(|| format!("Could not write {}", path.display()))
    }
}

/// Represents an individual test case.
#[derive(Serialize, Deserialize, Debug, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[builder(doc)]
pub struct GradescopeTestCase {
    /// Optional score for the test case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Optional maximum score for the test case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,

    /// Optional status of the test case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<GradescopeStatus>,

    /// Optional name of the test case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Optional formatting for the test case name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_format: Option<GradescopeOutputFormat>,

    /// Optional detailed output for the test case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Optional formatting for the test case output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<GradescopeOutputFormat>,

    /// Optional visibility setting for the test case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<GradescopeVisibility>,
}

impl From<&TestResult> for GradescopeTestCase {
    fn from(result: &TestResult) -> Self {
        GradescopeTestCase::builder()
            .name(result.name.clone())
            .name_format(GradescopeOutputFormat::Text)
            .score(result.points.awarded)
            .max_score(result.points.out_of)
            .status(if result.passed() {
                GradescopeStatus::Passed
            } else {
                GradescopeStatus::Failed
            })
            .output(result.message.clone())
            .output_format(GradescopeOutputFormat::Text)
            .visibility(GradescopeVisibility::Visible)
            .build()
    }
}

/// A score that may arrive as a number or as a numeric string.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum LenientScore {
    /// A JSON number.
    Number(f64),
    /// A JSON string holding a number.
    Text(String),
}

impl LenientScore {
    /// The numeric value, if there is one.
    fn value(&self) -> Option<f64> {
        match self {
            LenientScore::Number(x) => Some(*x),
            LenientScore::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// One entry of `users`.
#[derive(Deserialize, Debug, Clone, Default)]
struct UserEntry {
    /// Display name.
    #[serde(default)]
    name:  Option<String>,
    /// Email.
    #[serde(default)]
    email: Option<String>,
}

/// `users` is a list on Gradescope, a bare object in older exports.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum Users {
    /// Group submissions list everyone.
    Many(Vec<UserEntry>),
    /// A single user.
    One(UserEntry),
}

impl Default for Users {
    fn default() -> Self {
        Users::Many(Vec::new())
    }
}

/// The `results` a previous grading run wrote.
#[derive(Deserialize, Debug, Clone, Default)]
struct PreviousResults {
    /// Recorded score.
    #[serde(default)]
    score:      Option<LenientScore>,
    /// Bookkeeping, absent for runs that predate it.
    #[serde(default)]
    extra_data: Option<ExtraData>,
}

/// One earlier submission.
#[derive(Deserialize, Debug, Clone, Default)]
struct PreviousSubmission {
    /// Score Gradescope shows for it.
    #[serde(default)]
    score:   Option<LenientScore>,
    /// The results record of that run.
    #[serde(default)]
    results: PreviousResults,
}

/// The parts of `submission_metadata.json` grading needs.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct SubmissionMetadata {
    /// Submitting users.
    #[serde(default)]
    users:                Users,
    /// Earlier submissions, oldest first.
    #[serde(default)]
    previous_submissions: Vec<PreviousSubmission>,
}

impl SubmissionMetadata {
    /// Parses metadata JSON.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Could not parse submission metadata")
    }

    /// Reads the metadata file.
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// The submitting student; the first user of a group.
    pub fn student(&self) -> Identity {
        let user = match &self.users {
            Users::Many(users) => users.first(),
            Users::One(user) => Some(user),
        };
        match user.and_then(|u| Some((u.name.clone()?, u.email.clone()?))) {
            Some((name, email)) => Identity::new(name, email),
            None => {
                tracing::warn!("Can't access student's name in submission metadata");
                Identity::new(DEFAULT_STUDENT_NAME, DEFAULT_STUDENT_EMAIL)
            }
        }
    }

    /// Earlier attempts that carry bookkeeping, oldest first.
    pub fn attempt_history(&self) -> Vec<AttemptRecord> {
        self.previous_submissions
            .iter()
            .filter_map(|submission| {
                let extra = submission.results.extra_data?;
                let score = submission
                    .results
                    .score
                    .as_ref()
                    .or(submission.score.as_ref())
                    .and_then(LenientScore::value)
                    .unwrap_or(0.0);
                Some(AttemptRecord {
                    score,
                    succeeded: extra.success,
                    is_pretest: extra.pretest,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_tolerates_older_shapes() {
        let metadata = SubmissionMetadata::from_json_str(
            r#"{
                "users": { "name": "Grace Hopper", "email": "grace@example.edu" },
                "previous_submissions": [
                    { "score": "0.75", "results": { "extra_data": { "success": true, "pretest": false } } },
                    { "score": 1.0, "results": { "score": 1.0 } }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(metadata.student(), Identity::new("Grace Hopper", "grace@example.edu"));
        assert_eq!(
            metadata.attempt_history(),
            vec![AttemptRecord {
                score:      0.75,
                succeeded:  true,
                is_pretest: false,
            }]
        );
    }

    #[test]
    fn missing_users_fall_back_to_the_default_student() {
        let metadata = SubmissionMetadata::from_json_str("{}").unwrap();
        assert_eq!(metadata.student().name, DEFAULT_STUDENT_NAME);
        assert!(metadata.attempt_history().is_empty());
    }
}
