//! # gspack
//!
//! Packages an instructor's solution script into a Gradescope autograder and
//! grades student submissions against it.
//!
//! Packaging runs the solution once and records the rubric and the value of
//! every checked variable. Grading runs a submission, compares its variables
//! to the recorded ones under a tolerance, and keeps the student's recorded
//! score monotonic across attempts.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Process-wide configuration
pub mod config;
/// A module defining a bunch of constant values to be used throughout
pub mod constants;
/// Failure classification
pub mod error;
/// Normalizer, comparator, rubric, scoring engine and ledger
pub mod grade;
/// Gradescope result and metadata records
pub mod gradescope;
/// Autograder directory layout
pub mod paths;
/// Packaging and grading phases
pub mod pipeline;
/// Subprocess execution with a deadline
pub mod process;
/// Script runners
pub mod runner;
/// Runtime values harvested from scripts
pub mod value;

pub use config::{Config, Identity};
pub use error::{Attribution, GradingError, RubricError};
pub use pipeline::{GradingEnvironment, GradingOutcome, PackageOutcome, grade, package};
pub use runner::{Execution, Platform, PythonRunner, Runner, RunnerError};
pub use value::{Value, Variables};
