#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # gspack
//!
//! Command line front end.
//!
//! * `gspack package <SOLUTION>` builds an autograder from a solution script.
//! * `gspack grade <SUBMISSION> <RUBRIC>` grades one file locally.
//! * `gspack gradescope` grades the submission on a Gradescope server.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bpaf::*;
use dotenvy::dotenv;
use gspack::{
    Config, GradingEnvironment, PythonRunner,
    constants::AUTOGRADER_DIR,
    grade::overview_table,
    paths::GradescopeDirs,
    pipeline,
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Build an autograder from a solution
    Package {
        /// Rubric JSON; the solution's variables are used when absent
        rubric:   Option<PathBuf>,
        /// Output directory
        out:      PathBuf,
        /// Instructor solution
        solution: PathBuf,
    },
    /// Grade one submission locally
    Grade {
        /// Student submission
        submission: PathBuf,
        /// Rubric record produced by `package`
        rubric:     PathBuf,
    },
    /// Grade on a Gradescope server
    Gradescope {
        /// Autograder home override
        home: Option<PathBuf>,
    },
}

/// Parsed command line.
#[derive(Debug, Clone)]
struct Options {
    /// Log at DEBUG instead of INFO
    verbose: bool,
    /// What to do
    cmd:     Cmd,
}

/// Parse the command line arguments and return `Options`
fn options() -> Options {
    let verbose = short('v')
        .long("verbose")
        .help("Print debug logs")
        .switch();

    let package = {
        let rubric = long("rubric")
            .help("Rubric JSON file; defaults to the rubric variables of the solution")
            .argument::<PathBuf>("PATH")
            .optional();
        let out = long("out")
            .help("Directory to write the autograder into")
            .argument::<PathBuf>("DIR")
            .fallback(PathBuf::from(AUTOGRADER_DIR));
        let solution = positional::<PathBuf>("SOLUTION").help("Instructor solution script");
        construct!(Cmd::Package {
            rubric,
            out,
            solution
        })
    }
    .to_options()
    .command("package")
    .help("Build an autograder from a solution script");

    let grade = {
        let submission = positional::<PathBuf>("SUBMISSION").help("Submission to grade");
        let rubric = positional::<PathBuf>("RUBRIC").help("rubric.json written by `package`");
        construct!(Cmd::Grade { submission, rubric })
    }
    .to_options()
    .command("grade")
    .help("Grade a submission locally");

    let gradescope = {
        let home = long("home")
            .help("Autograder home directory (default /autograder)")
            .argument::<PathBuf>("DIR")
            .optional();
        construct!(Cmd::Gradescope { home })
    }
    .to_options()
    .command("gradescope")
    .help("Grade the submission on a Gradescope server");

    let cmd = construct!([package, grade, gradescope]);

    construct!(Options { verbose, cmd })
        .to_options()
        .descr("Gradescope autograder packager and grader")
        .run()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let Options { verbose, cmd } = options();

    let fmt = fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(if verbose { Level::DEBUG } else { Level::INFO });
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let config = Config::from_env();
    let runner = PythonRunner::from_config(&config);

    match cmd {
        Cmd::Package {
            rubric,
            out,
            solution,
        } => {
            let outcome = pipeline::package(&solution, rubric.as_deref(), &out, &runner)
                .await
                .with_context(|| format!("Failed to package {}", solution.display()))?;
            println!(
                "Autograder for {} written to {} ({} tests, {:.2} points).",
                outcome.platform,
                out.display(),
                outcome.rubric.tests().len(),
                outcome.rubric.total_score()
            );
        }
        Cmd::Grade { submission, rubric } => {
            let env = GradingEnvironment::local(&submission, &rubric, &config);
            let outcome = pipeline::grade(&env, &runner).await?;
            if !outcome.tests.is_empty() {
                eprintln!(
                    "{}",
                    overview_table(
                        &outcome.tests,
                        outcome.decision.score,
                        outcome.decision.max_score
                    )
                );
            }
            println!("{}", outcome.submission.output.unwrap_or_default());
        }
        Cmd::Gradescope { home } => {
            let dirs = home.map(GradescopeDirs::new).unwrap_or_default();
            let env = GradingEnvironment::from_gradescope(&dirs, &config);
            pipeline::grade(&env, &runner).await?;
        }
    };

    Ok(())
}
