use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "respfit CLI - A command-line interface for respfit, a resumable pipeline for deriving RESP atomic partial charges from external quantum-chemistry computations.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build or resume a charge-derivation job, queuing external computations as needed.
    Run(RunArgs),
    /// Report per-stage completion counts for a job without modifying the work directory.
    Status(StatusArgs),
    /// Remove cached result bundles from a work directory.
    Clean(CleanArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the job description file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub job: PathBuf,

    /// Directory holding the cached result bundles and dispatch scripts.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub work_dir: PathBuf,

    /// Write the fitted charges as CSV to this path instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub charges: Option<PathBuf>,
}

/// Arguments for the `status` subcommand.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Path to the job description file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub job: PathBuf,

    /// Directory holding the cached result bundles and dispatch scripts.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub work_dir: PathBuf,
}

/// Arguments for the `clean` subcommand.
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Directory holding the cached result bundles and dispatch scripts.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub work_dir: PathBuf,

    /// Remove only bundles recording a failed computation, so exactly those
    /// tasks are re-issued on the next run.
    #[arg(long)]
    pub failed: bool,
}
