#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use crate::constants::{GRADESCOPE_HOME, RESULTS_JSON, SUBMISSION_METADATA_JSON};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Directory layout of a Gradescope autograder home.
pub struct GradescopeDirs {
    /// Autograder home, `/autograder` on Gradescope.
    home_dir:       PathBuf,
    /// `source/`: the unpacked autograder archive.
    source_dir:     PathBuf,
    /// `submission/`: the student's files.
    submission_dir: PathBuf,
    /// `results/`: where `results.json` goes.
    results_dir:    PathBuf,
}

impl GradescopeDirs {
    /// Standard layout under `home_dir`.
    pub fn new(home_dir: impl Into<PathBuf>) -> Self {
        Self::from_parts(home_dir.into(), None, None, None)
    }

    /// Layout with optional overrides for each directory.
    pub fn from_parts(
        home_dir: PathBuf,
        source_dir: Option<PathBuf>,
        submission_dir: Option<PathBuf>,
        results_dir: Option<PathBuf>,
    ) -> Self {
        let source_dir = source_dir.unwrap_or_else(|| home_dir.join("source"));
        let submission_dir = submission_dir.unwrap_or_else(|| home_dir.join("submission"));
        let results_dir = results_dir.unwrap_or_else(|| home_dir.join("results"));
        Self {
            home_dir,
            source_dir,
            submission_dir,
            results_dir,
        }
    }

    /// Autograder home.
    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    /// Unpacked autograder archive.
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Student's files.
    pub fn submission_dir(&self) -> &Path {
        &self.submission_dir
    }

    /// Results directory.
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// `results/results.json`.
    pub fn results_json(&self) -> PathBuf {
        self.results_dir.join(RESULTS_JSON)
    }

    /// `submission_metadata.json` in the home directory.
    pub fn submission_metadata_json(&self) -> PathBuf {
        self.home_dir.join(SUBMISSION_METADATA_JSON)
    }
}

impl Default for GradescopeDirs {
    fn default() -> Self {
        Self::new(GRADESCOPE_HOME)
    }
}
