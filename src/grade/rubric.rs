#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The grading configuration: which variables are checked, how much each is
//! worth, how close is close enough, and what to tell a student who got it
//! wrong.
//!
//! A rubric starts life as a [`RubricDraft`] written by the instructor (a
//! JSON file, or top-level variables of the solution script). Validation
//! resolves weights and produces an immutable [`Rubric`], which is what the
//! autograder stores and what every grading run reads back.

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::compare::{FailureKind, Tolerance};
use crate::{
    constants::{EXPECTED_VALUES_JSON, RUBRIC_JSON, RUBRIC_VARIABLES, WEIGHT_AGREEMENT_TOLERANCE},
    error::RubricError,
    runner::Platform,
    value::{Value, Variables},
};

/// One test as the instructor wrote it.
#[derive(Debug, Clone, Deserialize, TypedBuilder)]
pub struct TestDraft {
    /// Test name, unique within the rubric.
    #[serde(alias = "test_name")]
    #[builder(setter(into))]
    pub name:              String,
    /// Variable read from both executions.
    #[serde(alias = "variable_name")]
    #[builder(setter(into))]
    pub expected_variable: String,
    /// Explicit weight; derived from `total_score` when absent.
    #[serde(default, alias = "score")]
    #[builder(default, setter(into))]
    pub weight:            Option<f64>,
    /// Relative tolerance override.
    #[serde(default)]
    #[builder(default, setter(into))]
    pub rtol:              Option<f64>,
    /// Absolute tolerance override.
    #[serde(default)]
    #[builder(default, setter(into))]
    pub atol:              Option<f64>,
    /// Text appended to the displayed test name.
    #[serde(default)]
    #[builder(default, setter(into))]
    pub description:       Option<String>,
    /// Hints keyed by failure kind, optionally suffixed with a platform.
    #[serde(default)]
    #[builder(default)]
    pub hints:             BTreeMap<String, String>,
    /// Unrecognized keys; flat `hint_<key>` entries are folded into `hints`.
    #[serde(flatten)]
    #[builder(default)]
    pub extra:             BTreeMap<String, serde_json::Value>,
}

/// A rubric as the instructor wrote it, before validation.
#[derive(Debug, Clone, Deserialize, TypedBuilder)]
pub struct RubricDraft {
    /// Tests, in report order.
    #[serde(alias = "test_suite")]
    pub tests:               Vec<TestDraft>,
    /// Total score spread evenly over tests without a weight.
    #[serde(default)]
    #[builder(default, setter(into))]
    pub total_score:         Option<f64>,
    /// Maximum number of scored attempts; `-1` or absent means unlimited.
    #[serde(default, alias = "number_of_attempts")]
    #[builder(default, setter(into))]
    pub attempt_limit:       Option<i64>,
    /// Data files that must sit next to the script when it runs.
    #[serde(default)]
    #[builder(default)]
    pub extra_files:         Vec<String>,
    /// Stem of the file to run when a submission has several.
    #[serde(default)]
    #[builder(default, setter(into))]
    pub main_file_name:      Option<String>,
    /// Platforms students may submit in.
    #[serde(default)]
    #[builder(default, setter(into))]
    pub supported_platforms: Option<Vec<String>>,
    /// Packages the solution needs installed on the grading server.
    #[serde(default)]
    #[builder(default)]
    pub requirements:        Vec<String>,
}

/// One gradable check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSpec {
    /// Unique name.
    name:              String,
    /// Variable read from both executions.
    expected_variable: String,
    /// Score awarded on a match.
    weight:            f64,
    /// Relative tolerance.
    rtol:              f64,
    /// Absolute tolerance.
    atol:              f64,
    /// Text appended to the displayed name.
    #[serde(skip_serializing_if = "Option::is_none")]
    description:       Option<String>,
    /// Remediation text keyed by `<kind>` or `<kind>_<platform>`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    hints:             BTreeMap<String, String>,
}

impl TestSpec {
    /// Unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variable this test reads.
    pub fn expected_variable(&self) -> &str {
        &self.expected_variable
    }

    /// Score awarded on a match.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Tolerance for numeric comparisons.
    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.rtol, self.atol)
    }

    /// Optional description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Name shown in reports: `"<n>. <name>"`, plus `": <description>"`.
    pub fn display_name(&self, index: usize) -> String {
        match &self.description {
            Some(description) => format!("{}. {}: {}", index + 1, self.name, description),
            None => format!("{}. {}", index + 1, self.name),
        }
    }

    /// Finds the hint for a failure, preferring a platform-specific one.
    pub fn hint(&self, kind: FailureKind, platform: Platform) -> Option<&str> {
        kind.hint_keys().iter().find_map(|key| {
            self.hints
                .get(&format!("{key}_{}", platform.as_str()))
                .or_else(|| self.hints.get(*key))
                .map(String::as_str)
        })
    }
}

/// A validated, immutable rubric.
#[derive(Debug, Clone, PartialEq)]
pub struct Rubric {
    /// Tests, in report order.
    tests:               Vec<TestSpec>,
    /// Maximum number of scored attempts; `None` is unlimited.
    attempt_limit:       Option<u32>,
    /// Data files that must accompany the script.
    extra_files:         Vec<String>,
    /// Stem of the file to run.
    main_file_name:      Option<String>,
    /// Platforms students may submit in.
    supported_platforms: Vec<Platform>,
    /// Packages the solution needs.
    requirements:        Vec<String>,
}

/// On-disk shape of a [`Rubric`].
#[derive(Serialize)]
struct RubricRecord<'a> {
    /// Tests with resolved weights.
    tests:               &'a [TestSpec],
    /// `-1` for unlimited.
    attempt_limit:       i64,
    /// Data files.
    extra_files:         &'a [String],
    /// Main file stem.
    #[serde(skip_serializing_if = "Option::is_none")]
    main_file_name:      Option<&'a str>,
    /// Allowed platforms.
    supported_platforms: &'a [Platform],
    /// Packages to install.
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    requirements:        &'a [String],
}

impl RubricDraft {
    /// Reads a draft out of the variables a solution script left behind.
    pub fn from_solution_variables(variables: &Variables) -> Result<Self, RubricError> {
        if !variables.contains_key("test_suite") {
            return Err(RubricError::Malformed(
                "No test_suite variable defined in the solution file.".to_string(),
            ));
        }
        let object: serde_json::Map<String, serde_json::Value> = RUBRIC_VARIABLES
            .iter()
            .filter_map(|name| {
                variables
                    .get(*name)
                    .filter(|v| !v.is_none())
                    .map(|v| (name.to_string(), v.to_plain_json()))
            })
            .collect();
        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| RubricError::Malformed(e.to_string()))
    }

    /// Validates the draft and resolves every test's weight.
    ///
    /// `solution_platform` is used when the draft names no supported
    /// platforms; with neither, Python is assumed.
    pub fn validate(self, solution_platform: Option<Platform>) -> Result<Rubric, RubricError> {
        if self.tests.is_empty() {
            return Err(RubricError::EmptyTestSuite);
        }

        let count = self.tests.len();
        let per_test = match self.total_score {
            Some(total) if !total.is_finite() || total < 0.0 => {
                return Err(RubricError::InvalidTotal(total));
            }
            Some(total) => Some(total / count as f64),
            None => None,
        };

        let mut seen = HashSet::new();
        let mut tests = Vec::with_capacity(count);
        for draft in self.tests {
            if !seen.insert(draft.name.clone()) {
                return Err(RubricError::DuplicateName(draft.name));
            }
            if draft.expected_variable.trim().is_empty() {
                return Err(RubricError::MissingVariable(draft.name));
            }

            let weight = match (draft.weight, per_test) {
                (Some(w), _) if !w.is_finite() || w < 0.0 => {
                    return Err(RubricError::InvalidWeight {
                        name:   draft.name,
                        weight: w,
                    });
                }
                (Some(w), Some(derived)) if (w - derived).abs() > WEIGHT_AGREEMENT_TOLERANCE => {
                    return Err(RubricError::InconsistentWeight {
                        name: draft.name,
                        explicit: w,
                        derived,
                        total: self.total_score.unwrap_or_default(),
                        count,
                    });
                }
                (Some(w), _) => w,
                (None, Some(derived)) => derived,
                (None, None) => return Err(RubricError::MissingWeight(draft.name)),
            };

            let defaults = Tolerance::default();
            let rtol = draft.rtol.unwrap_or(defaults.rtol);
            let atol = draft.atol.unwrap_or(defaults.atol);
            if !(rtol.is_finite() && atol.is_finite() && rtol >= 0.0 && atol >= 0.0) {
                return Err(RubricError::InvalidTolerance(draft.name));
            }

            let mut hints = draft.hints;
            fold_flat_hints(&mut hints, draft.extra);

            tests.push(TestSpec {
                name: draft.name,
                expected_variable: draft.expected_variable,
                weight,
                rtol,
                atol,
                description: draft.description.filter(|d| !d.trim().is_empty()),
                hints,
            });
        }

        let supported_platforms = match self.supported_platforms {
            Some(names) if !names.is_empty() => names
                .iter()
                .map(|name| {
                    name.parse::<Platform>()
                        .map_err(|_| RubricError::UnknownPlatform(name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => vec![solution_platform.unwrap_or(Platform::Python)],
        };

        let attempt_limit = self
            .attempt_limit
            .filter(|n| *n > 0)
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX));

        let rubric = Rubric {
            tests,
            attempt_limit,
            extra_files: self.extra_files,
            main_file_name: self.main_file_name.filter(|m| !m.trim().is_empty()),
            supported_platforms,
            requirements: self.requirements,
        };
        tracing::debug!(
            "Rubric validated: {} tests, {:.2} points, attempts: {}",
            rubric.tests.len(),
            rubric.total_score(),
            rubric
                .attempt_limit
                .map_or_else(|| "unlimited".to_string(), |n| n.to_string())
        );
        Ok(rubric)
    }
}

/// Moves flat `hint_<key>` entries into the hint map.
fn fold_flat_hints(hints: &mut BTreeMap<String, String>, extra: BTreeMap<String, serde_json::Value>) {
    for (key, value) in extra {
        match (key.strip_prefix("hint_"), value) {
            (Some(kind), serde_json::Value::String(text)) => {
                hints.entry(kind.to_string()).or_insert(text);
            }
            (_, _) => tracing::debug!("Ignoring unrecognized test field `{key}`"),
        }
    }
}

impl Rubric {
    /// Parses and validates a rubric from JSON text.
    pub fn from_json_str(
        text: &str,
        solution_platform: Option<Platform>,
    ) -> Result<Self, RubricError> {
        let draft: RubricDraft =
            serde_json::from_str(text).map_err(|e| RubricError::Malformed(e.to_string()))?;
        draft.validate(solution_platform)
    }

    /// Reads, parses, and validates a rubric file.
    pub fn read(path: &Path, solution_platform: Option<Platform>) -> Result<Self, RubricError> {
        let text = fs::read_to_string(path).map_err(|e| {
            RubricError::Malformed(format!("could not read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text, solution_platform)
    }

    /// Tests, in report order.
    pub fn tests(&self) -> &[TestSpec] {
        &self.tests
    }

    /// Sum of all weights.
    pub fn total_score(&self) -> f64 {
        self.tests.iter().map(TestSpec::weight).sum()
    }

    /// Maximum number of scored attempts; `None` is unlimited.
    pub fn attempt_limit(&self) -> Option<u32> {
        self.attempt_limit
    }

    /// Data files that must accompany the script.
    pub fn extra_files(&self) -> &[String] {
        &self.extra_files
    }

    /// Stem of the file to run, if the rubric names one.
    pub fn main_file_name(&self) -> Option<&str> {
        self.main_file_name.as_deref()
    }

    /// Platforms students may submit in.
    pub fn supported_platforms(&self) -> &[Platform] {
        &self.supported_platforms
    }

    /// Returns true when submissions on `platform` are accepted.
    pub fn supports(&self, platform: Platform) -> bool {
        self.supported_platforms.contains(&platform)
    }

    /// Packages the solution needs.
    pub fn requirements(&self) -> &[String] {
        &self.requirements
    }

    /// Records the instructor's answer for every declared variable.
    pub fn capture_expected_values(
        &self,
        solution: &Variables,
    ) -> Result<ExpectedValues, RubricError> {
        let mut values = Variables::new();
        for test in &self.tests {
            let value = solution
                .get(test.expected_variable())
                .filter(|v| !v.is_none())
                .ok_or_else(|| RubricError::UndefinedExpectedVariable {
                    test:     test.name.clone(),
                    variable: test.expected_variable.clone(),
                })?;
            values.insert(test.expected_variable.clone(), value.clone());
        }
        Ok(ExpectedValues(values))
    }

    /// Serializes the rubric record.
    pub fn to_json(&self) -> Result<String> {
        let record = RubricRecord {
            tests:               &self.tests,
            attempt_limit:       self.attempt_limit.map_or(-1, i64::from),
            extra_files:         &self.extra_files,
            main_file_name:      self.main_file_name.as_deref(),
            supported_platforms: &self.supported_platforms,
            requirements:        &self.requirements,
        };
        serde_json::to_string_pretty(&record).context("Could not serialize the rubric")
    }

    /// Writes the rubric record into `dir`, returning its path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(RUBRIC_JSON);
        fs::write(&path, self.to_json()?)
            .with_context(|| format!("Could not write {}", path.display()))?;
        Ok(path)
    }
}

/// The answer key: the instructor's value for every checked variable.
///
/// Built once while packaging and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectedValues(Variables);

impl ExpectedValues {
    /// The expected value of `variable`.
    pub fn get(&self, variable: &str) -> Option<&Value> {
        self.0.get(variable)
    }

    /// Number of recorded variables.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads an expected-values record.
    pub fn read(path: &Path) -> Result<Self, RubricError> {
        let text = fs::read_to_string(path).map_err(|e| {
            RubricError::Malformed(format!("could not read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| RubricError::Malformed(e.to_string()))
    }

    /// Writes the expected-values record into `dir`, returning its path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(EXPECTED_VALUES_JSON);
        let text = serde_json::to_string(self).context("Could not serialize expected values")?;
        fs::write(&path, text).with_context(|| format!("Could not write {}", path.display()))?;
        Ok(path)
    }
}

impl FromIterator<(String, Value)> for ExpectedValues {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_hint_keys_are_folded() {
        let mut hints = BTreeMap::from([("wrong_size".to_string(), "kept".to_string())]);
        let extra = BTreeMap::from([
            ("hint_wrong_size".to_string(), serde_json::json!("ignored")),
            ("hint_nans_matlab".to_string(), serde_json::json!("no NaNs")),
            ("points_note".to_string(), serde_json::json!(3)),
        ]);
        fold_flat_hints(&mut hints, extra);
        assert_eq!(hints["wrong_size"], "kept");
        assert_eq!(hints["nans_matlab"], "no NaNs");
        assert_eq!(hints.len(), 2);
    }
}
