#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The two phases of an assignment's life.
//!
//! * [`package`] runs once, on the instructor's machine: execute the
//!   solution, validate the rubric, capture the answer key.
//! * [`grade`] runs once per submission, on the grading server: execute the
//!   submission, score it, reconcile the score with earlier attempts and
//!   write `results.json`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use itertools::Itertools;

use crate::{
    config::{Config, Identity},
    constants::{EXPECTED_VALUES_JSON, RESULTS_JSON, RUBRIC_JSON},
    error::GradingError,
    grade::{
        self, AttemptRecord, ExpectedValues, FinalScoreDecision, GradeReport, Rubric, RubricDraft,
        TestResult, reconcile,
    },
    gradescope::{
        ExtraData, GradescopeOutputFormat, GradescopeSubmission, GradescopeTestCase,
        GradescopeVisibility, SubmissionMetadata,
    },
    paths::GradescopeDirs,
    runner::{Execution, Platform, Runner, determine_platform},
};

/// Everything `package` produced.
#[derive(Debug, Clone)]
pub struct PackageOutcome {
    /// The validated rubric.
    pub rubric:        Rubric,
    /// The captured answer key.
    pub expected:      ExpectedValues,
    /// Platform the solution was written for.
    pub platform:      Platform,
    /// Path of the written rubric record.
    pub rubric_path:   PathBuf,
    /// Path of the written expected-values record.
    pub expected_path: PathBuf,
}

/// Builds an autograder from an instructor solution.
///
/// The rubric comes from `rubric_file` when given, otherwise from the
/// solution's own top-level variables. Records and extra files are written
/// into `out_dir`. Every failure here is the instructor's to fix and is
/// reported as [`GradingError::User`], except I/O trouble with `out_dir`.
pub async fn package<R: Runner>(
    solution: &Path,
    rubric_file: Option<&Path>,
    out_dir: &Path,
    runner: &R,
) -> Result<PackageOutcome, GradingError> {
    if !solution.is_file() {
        return Err(GradingError::user(format!(
            "Solution file not found: {}",
            solution.display()
        )));
    }
    tracing::info!("Packaging {}", solution.display());

    let Execution {
        platform,
        variables,
    } = runner.execute(solution).await?;
    tracing::info!("Solution executed: {} variables captured", variables.len());

    let rubric = match rubric_file {
        Some(path) => Rubric::read(path, Some(platform))?,
        None => RubricDraft::from_solution_variables(&variables)?.validate(Some(platform))?,
    };
    let expected = rubric.capture_expected_values(&variables)?;

    let internal = |e: anyhow::Error| GradingError::internal(format!("{e:#}"));
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Could not create {}", out_dir.display()))
        .map_err(internal)?;
    let rubric_path = rubric.write_to(out_dir).map_err(internal)?;
    let expected_path = expected.write_to(out_dir).map_err(internal)?;

    let solution_dir = parent_dir(solution);
    for name in rubric.extra_files() {
        let from = solution_dir.join(name);
        if !from.is_file() {
            return Err(GradingError::user(format!(
                "Extra file {name} is listed in the rubric but not found next to the solution."
            )));
        }
        let to = out_dir.join(name);
        if from != to {
            fs::copy(&from, &to)
                .with_context(|| format!("Could not copy {} to {}", from.display(), to.display()))
                .map_err(internal)?;
        }
    }

    tracing::info!(
        "Autograder written to {}: {} tests, {:.2} points",
        out_dir.display(),
        rubric.tests().len(),
        rubric.total_score()
    );
    Ok(PackageOutcome {
        rubric,
        expected,
        platform,
        rubric_path,
        expected_path,
    })
}

/// Where a grading run reads from and writes to, and who it grades.
#[derive(Debug, Clone)]
pub struct GradingEnvironment {
    /// Submitting student.
    pub student:              Identity,
    /// Exempt from attempt limits and suppression.
    pub is_test_account:      bool,
    /// Earlier attempts, oldest first.
    pub history:              Vec<AttemptRecord>,
    /// Directory holding the student's files.
    pub submission_dir:       PathBuf,
    /// Explicit file to run; discovered in `submission_dir` when absent.
    pub submission_file:      Option<PathBuf>,
    /// Rubric record.
    pub rubric_path:          PathBuf,
    /// Expected-values record.
    pub expected_values_path: PathBuf,
    /// Directory extra files are copied from.
    pub source_dir:           PathBuf,
    /// Where `results.json` goes.
    pub results_path:         PathBuf,
    /// Set when the submission metadata could not be read.
    pub metadata_problem:     Option<String>,
}

impl GradingEnvironment {
    /// Environment of a Gradescope grading server.
    ///
    /// Unreadable metadata is not fatal here; it turns the run into an
    /// internal failure so the student keeps the attempt.
    pub fn from_gradescope(dirs: &GradescopeDirs, config: &Config) -> Self {
        let (metadata, metadata_problem) =
            match SubmissionMetadata::read(&dirs.submission_metadata_json()) {
                Ok(metadata) => (metadata, None),
                Err(e) => {
                    tracing::error!("{e:#}");
                    (SubmissionMetadata::default(), Some(format!("{e:#}")))
                }
            };
        let student = metadata.student();
        Self {
            is_test_account: config.is_test_account(&student),
            student,
            history: metadata.attempt_history(),
            submission_dir: dirs.submission_dir().to_path_buf(),
            submission_file: None,
            rubric_path: dirs.source_dir().join(RUBRIC_JSON),
            expected_values_path: dirs.source_dir().join(EXPECTED_VALUES_JSON),
            source_dir: dirs.source_dir().to_path_buf(),
            results_path: dirs.results_json(),
            metadata_problem,
        }
    }

    /// Environment for grading one file locally, as the test account.
    ///
    /// The expected values are read from next to the rubric and the results
    /// are written next to the submission.
    pub fn local(submission: &Path, rubric: &Path, config: &Config) -> Self {
        let submission_dir = parent_dir(submission);
        let source_dir = parent_dir(rubric);
        Self {
            student: config.test_account().clone(),
            is_test_account: true,
            history: Vec::new(),
            results_path: submission_dir.join(RESULTS_JSON),
            submission_file: Some(submission.to_path_buf()),
            submission_dir,
            rubric_path: rubric.to_path_buf(),
            expected_values_path: source_dir.join(EXPECTED_VALUES_JSON),
            source_dir,
            metadata_problem: None,
        }
    }
}

/// The loaded, read-only grading records.
#[derive(Debug, Clone)]
pub struct Records {
    /// The rubric.
    pub rubric:   Rubric,
    /// The answer key.
    pub expected: ExpectedValues,
}

/// Where one grading invocation stands.
///
/// `Ready → Executing → {Scoring | ExecutionFailed}`, `Scoring → {Scored |
/// ExecutionFailed}`. `Scored` and `ExecutionFailed` are terminal; both go
/// through the ledger before anything is written.
#[derive(Debug)]
pub enum Stage {
    /// Nothing done yet.
    Ready,
    /// Records loaded and the file to run located.
    Executing {
        /// Loaded records.
        records: Records,
        /// Script to run.
        script:  PathBuf,
    },
    /// The submission ran; its bindings await scoring.
    Scoring {
        /// Loaded records.
        records:   Records,
        /// What the run produced.
        execution: Execution,
    },
    /// Grading stopped early.
    ExecutionFailed {
        /// Records, if they could be loaded.
        records: Option<Records>,
        /// Why it stopped.
        error:   GradingError,
    },
    /// The submission was scored.
    Scored {
        /// Loaded records.
        records: Records,
        /// The score report.
        report:  GradeReport,
    },
}

impl Stage {
    /// Returns true for `Scored` and `ExecutionFailed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Scored { .. } | Stage::ExecutionFailed { .. })
    }

    /// Performs one transition.
    pub async fn advance<R: Runner>(self, env: &GradingEnvironment, runner: &R) -> Stage {
        match self {
            Stage::Ready => match prepare(env) {
                Ok((records, script)) => Stage::Executing { records, script },
                Err((records, error)) => Stage::ExecutionFailed { records, error },
            },
            Stage::Executing { records, script } => match runner.execute(&script).await {
                Ok(execution) => {
                    tracing::info!("Submission executed as {}", execution.platform);
                    Stage::Scoring { records, execution }
                }
                Err(e) => Stage::ExecutionFailed {
                    records: Some(records),
                    error:   e.into(),
                },
            },
            Stage::Scoring { records, execution } => match grade::grade(
                &records.rubric,
                &records.expected,
                &execution.variables,
                execution.platform,
            ) {
                Ok(report) => Stage::Scored { records, report },
                Err(error) => Stage::ExecutionFailed {
                    records: Some(records),
                    error,
                },
            },
            terminal => terminal,
        }
    }
}

/// Loads the records, locates the submission, and stages extra files.
fn prepare(env: &GradingEnvironment) -> Result<(Records, PathBuf), (Option<Records>, GradingError)> {
    if let Some(problem) = &env.metadata_problem {
        return Err((
            None,
            GradingError::internal(format!("Submission metadata is unreadable: {problem}")),
        ));
    }

    let rubric = Rubric::read(&env.rubric_path, None)
        .map_err(|e| (None, GradingError::from(e).into_internal()))?;
    let expected = ExpectedValues::read(&env.expected_values_path)
        .map_err(|e| (None, GradingError::from(e).into_internal()))?;
    let records = Records { rubric, expected };

    match locate_and_stage(env, &records.rubric) {
        Ok(script) => Ok((records, script)),
        Err(error) => Err((Some(records), error)),
    }
}

/// Finds the script to run, checks its platform, and copies extra files.
fn locate_and_stage(env: &GradingEnvironment, rubric: &Rubric) -> Result<PathBuf, GradingError> {
    let script = match &env.submission_file {
        Some(file) => {
            ensure_readable(file)?;
            file.clone()
        }
        None => find_submission_file(&env.submission_dir, rubric.main_file_name())?,
    };

    let platform = determine_platform(&script).ok_or_else(|| {
        GradingError::user(format!("Unrecognized file type: {}", script.display()))
    })?;
    if !rubric.supports(platform) {
        return Err(GradingError::user(format!(
            "Submissions in {platform} are not accepted for this assignment. Supported platforms: \
             {}.",
            rubric.supported_platforms().iter().join(", ")
        )));
    }

    let target_dir = parent_dir(&script);
    for name in rubric.extra_files() {
        let from = env.source_dir.join(name);
        let to = target_dir.join(name);
        if from == to {
            continue;
        }
        fs::copy(&from, &to).map_err(|e| {
            GradingError::internal(format!("Could not copy extra file {name}: {e}"))
        })?;
    }
    Ok(script)
}

/// Checks that a submitted file reads as UTF-8 text.
fn ensure_readable(file: &Path) -> Result<(), GradingError> {
    fs::read_to_string(file).map(|_| ()).map_err(|e| {
        GradingError::user(format!(
            "Gradescope is unable to read your file: \n {e} \nThis might happen if your file is \
             damaged or improperly encoded (not in UTF-8)"
        ))
    })
}

/// Picks the submitted file to run.
///
/// Only files of a known platform are considered. With `main_file_name` the
/// file with that stem wins; without it there must be exactly one candidate.
pub fn find_submission_file(
    dir: &Path,
    main_file_name: Option<&str>,
) -> Result<PathBuf, GradingError> {
    if !dir.is_dir() {
        return Err(GradingError::internal(format!("Not a directory: {}", dir.display())));
    }
    let entries = fs::read_dir(dir)
        .map_err(|e| GradingError::internal(format!("Could not list {}: {e}", dir.display())))?;

    let mut candidates = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && determine_platform(&path).is_some() {
            ensure_readable(&path)?;
            candidates.push(path);
        }
    }
    candidates.sort();

    if candidates.is_empty() {
        return Err(GradingError::user(
            "No student solution files found. Check that you submitted either .py, .ipynb or .m \
             files.",
        ));
    }

    match main_file_name {
        Some(main) => candidates
            .iter()
            .find(|path| path.file_stem().is_some_and(|stem| stem == main))
            .cloned()
            .ok_or_else(|| {
                GradingError::user(format!(
                    "The main file {main} was not found among your files: \n{}",
                    candidates.iter().map(|p| p.display()).join("\n")
                ))
            }),
        None if candidates.len() > 1 => Err(GradingError::user(format!(
            "You should have submitted one file, but you submitted many: \n {}",
            candidates.iter().map(|p| p.display()).join("\n")
        ))),
        None => Ok(candidates.remove(0)),
    }
}

/// What one grading run decided and wrote.
#[derive(Debug)]
pub struct GradingOutcome {
    /// The record written to `results.json`.
    pub submission: GradescopeSubmission,
    /// The ledger's decision.
    pub decision:   FinalScoreDecision,
    /// Per-test results as computed, before any suppression.
    pub tests:      Vec<TestResult>,
    /// The failure that stopped grading, if any.
    pub error:      Option<GradingError>,
}

/// Grades one submission and writes `results.json`.
///
/// Only a failure to write the results record escapes as an error; every
/// grading failure is classified and reported inside the record.
pub async fn grade<R: Runner>(env: &GradingEnvironment, runner: &R) -> Result<GradingOutcome> {
    let mut stage = Stage::Ready;
    while !stage.is_terminal() {
        stage = stage.advance(env, runner).await;
    }

    let outcome = conclude(stage, env);
    outcome.submission.write_to(&env.results_path)?;
    tracing::info!("Results written to {}", env.results_path.display());
    Ok(outcome)
}

/// Runs the ledger over a terminal stage and assembles the results record.
fn conclude(stage: Stage, env: &GradingEnvironment) -> GradingOutcome {
    let (records, body, tests, new_score, extra, error) = match stage {
        Stage::Scored { records, report } => (
            Some(records),
            report.output,
            report.tests,
            report.score,
            ExtraData {
                success: true,
                pretest: report.pretest,
            },
            None,
        ),
        Stage::ExecutionFailed { records, error } => {
            tracing::warn!("Grading failed: {error}");
            (
                records,
                failure_body(&error),
                Vec::new(),
                0.0,
                ExtraData {
                    success: !error.is_internal(),
                    pretest: false,
                },
                Some(error),
            )
        }
        Stage::Ready | Stage::Executing { .. } | Stage::Scoring { .. } => (
            None,
            failure_body(&GradingError::internal("grading stopped before a verdict")),
            Vec::new(),
            0.0,
            ExtraData {
                success: false,
                pretest: false,
            },
            None,
        ),
    };

    let (attempt_limit, max_score) = records.as_ref().map_or((None, f64::INFINITY), |r| {
        (r.rubric.attempt_limit(), r.rubric.total_score())
    });
    let decision = reconcile(
        new_score,
        &env.history,
        attempt_limit,
        max_score,
        env.is_test_account,
        extra.pretest,
    );
    let output = decision.narrate(&body, new_score);
    let shown: Vec<GradescopeTestCase> = if decision.suppresses_details() {
        Vec::new()
    } else {
        tests.iter().map(GradescopeTestCase::from).collect()
    };

    let submission = GradescopeSubmission::builder()
        .score(decision.score)
        .output(output)
        .output_format(GradescopeOutputFormat::Text)
        .test_output_format(GradescopeOutputFormat::Text)
        .test_name_format(GradescopeOutputFormat::Text)
        .visibility(GradescopeVisibility::Visible)
        .stdout_visibility(GradescopeVisibility::Hidden)
        .extra_data(extra)
        .tests(shown)
        .build();

    GradingOutcome {
        submission,
        decision,
        tests,
        error,
    }
}

/// Narrative for a run that ended in failure.
fn failure_body(error: &GradingError) -> String {
    match error {
        GradingError::User(message) => format!("ERROR: \n{message}\n"),
        GradingError::Internal(message) => format!(
            "ERROR: \nAutograder failed to process your submission due to an internal error: \n \
             {message} \nPlease contact your instructor for assistance. This attempt does not \
             count towards your total number of attempts, if limited.\n"
        ),
    }
}

/// Directory containing `path`, or `.` for a bare file name.
fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
