#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_EXECUTION_TIMEOUT_SECS, TEST_STUDENT_EMAIL, TEST_STUDENT_NAME};

/// A student as Gradescope names them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Display name.
    pub name:  String,
    /// Email address.
    pub email: String,
}

impl Identity {
    /// Creates an identity.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name:  name.into(),
            email: email.into(),
        }
    }
}

/// Process-wide settings, read once at start-up and passed by reference.
#[derive(Debug, Clone)]
pub struct Config {
    /// Wall-clock budget for one script execution.
    execution_timeout: Duration,
    /// Python interpreter used to run scripts, if one was found.
    python:            Option<PathBuf>,
    /// Account exempt from attempt limits and score suppression.
    test_account:      Identity,
}

impl Config {
    /// Reads the configuration from the environment.
    ///
    /// * `GSPACK_TIMEOUT_SECS`: execution timeout (default 1000).
    /// * `GSPACK_PYTHON`: interpreter path; otherwise `python3` or `python`
    ///   from `PATH`.
    /// * `GSPACK_TEST_STUDENT_NAME` / `GSPACK_TEST_STUDENT_EMAIL`: the exempt
    ///   account.
    pub fn from_env() -> Self {
        let python = std::env::var("GSPACK_PYTHON")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| which::which("python3").ok())
            .or_else(|| which::which("python").ok());
        if python.is_none() {
            tracing::warn!("No Python interpreter found on PATH; set GSPACK_PYTHON to run scripts.");
        }

        let test_account = Identity::new(
            std::env::var("GSPACK_TEST_STUDENT_NAME").unwrap_or_else(|_| TEST_STUDENT_NAME.into()),
            std::env::var("GSPACK_TEST_STUDENT_EMAIL")
                .unwrap_or_else(|_| TEST_STUDENT_EMAIL.into()),
        );

        Self::from_parts(
            Some(read_timeout_secs("GSPACK_TIMEOUT_SECS", DEFAULT_EXECUTION_TIMEOUT_SECS)),
            python,
            Some(test_account),
        )
    }

    /// Builds a configuration from explicit values, defaulting what is absent.
    pub fn from_parts(
        execution_timeout: Option<Duration>,
        python: Option<PathBuf>,
        test_account: Option<Identity>,
    ) -> Self {
        Self {
            execution_timeout: execution_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_EXECUTION_TIMEOUT_SECS)),
            python,
            test_account: test_account
                .unwrap_or_else(|| Identity::new(TEST_STUDENT_NAME, TEST_STUDENT_EMAIL)),
        }
    }

    /// Wall-clock budget for one script execution.
    pub fn execution_timeout(&self) -> Duration {
        self.execution_timeout
    }

    /// Python interpreter, if one was configured or found.
    pub fn python(&self) -> Option<&PathBuf> {
        self.python.as_ref()
    }

    /// The exempt test account.
    pub fn test_account(&self) -> &Identity {
        &self.test_account
    }

    /// Returns true if `who` is the exempt test account.
    pub fn is_test_account(&self, who: &Identity) -> bool {
        *who == self.test_account
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_parts(None, None, None)
    }
}

/// Parses an environment variable into a `Duration`, falling back to
/// `default_secs` when parsing fails or the variable is missing.
fn read_timeout_secs(env: &str, default_secs: u64) -> Duration {
    std::env::var(env)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}
