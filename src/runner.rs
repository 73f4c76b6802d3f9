#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Script execution: run a solution or submission and harvest its final
//! variable bindings.
//!
//! The grading core only sees the [`Runner`] trait. [`PythonRunner`] is the
//! production implementation; it never executes code in-process, but spawns
//! an interpreter on a small harness script under a deadline.

use std::{
    ffi::OsString,
    fmt,
    future::Future,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::Config,
    constants::PYTHON_HARNESS,
    error::GradingError,
    process::{ProcessError, run_collect},
    value::Variables,
};

/// A language/environment a script can be written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Plain `.py` scripts.
    Python,
    /// `.ipynb` notebooks; code cells run top to bottom.
    Jupyter,
    /// `.m` scripts.
    Matlab,
}

impl Platform {
    /// Every platform, in the order extensions are matched.
    pub const ALL: [Platform; 3] = [Platform::Python, Platform::Matlab, Platform::Jupyter];

    /// Lower-case name, as used in rubrics and hint keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Python => "python",
            Platform::Jupyter => "jupyter",
            Platform::Matlab => "matlab",
        }
    }

    /// File extension, with the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Platform::Python => ".py",
            Platform::Jupyter => ".ipynb",
            Platform::Matlab => ".m",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| s.to_string())
    }
}

/// Platform of a file, judged by its extension.
pub fn determine_platform(path: &Path) -> Option<Platform> {
    let name = path.file_name()?.to_string_lossy();
    Platform::ALL
        .into_iter()
        .find(|p| name.ends_with(p.extension()))
}

/// What a successful execution produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// Platform the script was run as.
    pub platform:  Platform,
    /// Final top-level bindings.
    pub variables: Variables,
}

/// Why a script could not be executed to completion.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The script ran past its deadline.
    #[error("Your code did not finish within {} seconds.", .0.as_secs())]
    Timeout(Duration),
    /// The script itself raised.
    #[error("Your code raised an error:\n{message}\n{output}")]
    Script {
        /// Exception summary.
        message: String,
        /// Output the script printed before failing.
        output:  String,
    },
    /// The file is not something any runner understands.
    #[error("Unrecognized file type: {0}. Submit a .py, .ipynb or .m file.")]
    UnrecognizedFile(String),
    /// This grader cannot execute the platform at all.
    #[error("{0} scripts can not be executed by this grader.")]
    Unavailable(Platform),
    /// The interpreter could not be started.
    #[error("Could not start the interpreter: {0}")]
    Spawn(String),
    /// The harness misbehaved or produced unreadable output.
    #[error("The execution harness failed: {0}")]
    Harness(String),
}

impl From<RunnerError> for GradingError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Timeout(_)
            | RunnerError::Script { .. }
            | RunnerError::UnrecognizedFile(_) => GradingError::User(err.to_string()),
            RunnerError::Unavailable(_) | RunnerError::Spawn(_) | RunnerError::Harness(_) => {
                GradingError::Internal(err.to_string())
            }
        }
    }
}

/// Executes a script and returns its final bindings.
pub trait Runner {
    /// Runs `script`, with its directory as the working directory.
    fn execute(
        &self,
        script: &Path,
    ) -> impl Future<Output = Result<Execution, RunnerError>> + Send;
}

/// What the harness writes to its output file.
#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum HarnessOutput {
    /// The script finished.
    Ok {
        /// Final bindings.
        variables: Variables,
        /// Captured stdout and stderr.
        #[serde(default)]
        output:    String,
    },
    /// The script raised.
    Error {
        /// Exception summary.
        message: String,
        /// Full traceback, logged only.
        #[serde(default)]
        traceback: String,
        /// Captured stdout and stderr.
        #[serde(default)]
        output:  String,
    },
}

/// Runs Python scripts and notebooks in a separate interpreter.
#[derive(Debug, Clone)]
pub struct PythonRunner {
    /// Interpreter binary.
    python:  PathBuf,
    /// Deadline for one run.
    timeout: Duration,
}

impl PythonRunner {
    /// Creates a runner for an explicit interpreter.
    pub fn new(python: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            python: python.into(),
            timeout,
        }
    }

    /// Creates a runner from the process configuration.
    ///
    /// Without a configured interpreter `python3` is tried at execution time,
    /// so a missing interpreter surfaces as a [`RunnerError::Spawn`].
    pub fn from_config(config: &Config) -> Self {
        let python = config
            .python()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("python3"));
        Self::new(python, config.execution_timeout())
    }

    /// Runs the harness and parses its output file.
    async fn run_harness(
        &self,
        script: &Path,
        harness: &Path,
        out: &Path,
    ) -> Result<Variables, RunnerError> {
        let cwd = script.parent().filter(|p| !p.as_os_str().is_empty());
        let args: Vec<OsString> = vec![
            harness.as_os_str().to_owned(),
            script.as_os_str().to_owned(),
            out.as_os_str().to_owned(),
        ];
        let env = [
            (OsString::from("MPLBACKEND"), OsString::from("Agg")),
            (OsString::from("PYTHONDONTWRITEBYTECODE"), OsString::from("1")),
        ];

        let collected = run_collect(&self.python, &args, cwd, &env, Some(self.timeout))
            .await
            .map_err(|e| match e {
                ProcessError::Timeout(limit) => RunnerError::Timeout(limit),
                ProcessError::Spawn { .. } => RunnerError::Spawn(e.to_string()),
                ProcessError::Io(_) => RunnerError::Harness(e.to_string()),
            })?;

        let text = match tokio::fs::read_to_string(out).await {
            Ok(text) => text,
            Err(_) => {
                return Err(RunnerError::Harness(format!(
                    "interpreter exited with {} and wrote no results:\n{}",
                    collected.status,
                    collected.combined_output()
                )));
            }
        };

        match serde_json::from_str::<HarnessOutput>(&text)
            .map_err(|e| RunnerError::Harness(format!("unreadable harness output: {e}")))?
        {
            HarnessOutput::Ok { variables, output } => {
                tracing::debug!("Script output:\n{output}");
                Ok(variables)
            }
            HarnessOutput::Error {
                message,
                traceback,
                output,
            } => {
                tracing::debug!("Script raised:\n{traceback}");
                Err(RunnerError::Script { message, output })
            }
        }
    }
}

impl Runner for PythonRunner {
    async fn execute(&self, script: &Path) -> Result<Execution, RunnerError> {
        let platform = determine_platform(script)
            .ok_or_else(|| RunnerError::UnrecognizedFile(script.display().to_string()))?;
        if platform == Platform::Matlab {
            return Err(RunnerError::Unavailable(platform));
        }
        let script = std::path::absolute(script)
            .map_err(|e| RunnerError::Harness(format!("could not resolve {}: {e}", script.display())))?;

        let scratch = std::env::temp_dir();
        let id = Uuid::new_v4();
        let harness = scratch.join(format!("gspack-harness-{id}.py"));
        let out = scratch.join(format!("gspack-capture-{id}.json"));
        tokio::fs::write(&harness, PYTHON_HARNESS)
            .await
            .map_err(|e| {
                RunnerError::Harness(format!("could not write {}: {e}", harness.display()))
            })?;

        tracing::info!("Executing {} as {platform}", script.display());
        let result = self.run_harness(&script, &harness, &out).await;
        let _ = tokio::fs::remove_file(&harness).await;
        let _ = tokio::fs::remove_file(&out).await;

        result.map(|variables| Execution {
            platform,
            variables,
        })
    }
}
