//! CLI argument parsing for the harvest workflow.
//!
//! The CLI only gathers inputs; matching and aggregation policy live in the
//! library modules so they can be exercised without a terminal.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "nbharvest",
    version,
    about = "Collect answers to template questions from many Jupyter notebooks",
    after_help = "Submissions are ID=LOCATION or a bare LOCATION (file path or http(s) URL).\n\nExamples:\n  nbharvest prompts --template day1_reading_journal.ipynb\n  nbharvest extract --template day1_reading_journal.ipynb alice=subs/alice.ipynb subs/bob.ipynb\n  nbharvest extract --template day1_reading_journal.ipynb --submissions-file roster.txt --with-names\n  nbharvest diff --template day1_reading_journal.ipynb --submissions-file roster.txt --out-dir processed",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Extract(ExtractArgs),
    Prompts(PromptsArgs),
    Diff(DiffArgs),
}

/// Submission inputs shared by every command that fetches notebooks.
#[derive(Args, Debug)]
pub struct SubmissionArgs {
    /// Submissions as ID=LOCATION or LOCATION
    #[arg(value_name = "SUBMISSION")]
    pub submissions: Vec<String>,

    /// File listing one submission per line (`#` starts a comment)
    #[arg(long, value_name = "PATH")]
    pub submissions_file: Option<PathBuf>,

    /// Concurrent fetches (overrides config)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Cache fetched notebooks in the user cache directory
    #[arg(long)]
    pub cache: bool,

    /// Cache fetched notebooks under this directory (overrides config)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// JSON config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Extract command inputs.
#[derive(Parser, Debug)]
#[command(about = "Merge every submission's answers into one notebook")]
pub struct ExtractArgs {
    /// Template notebook whose `is_question` cells define the prompts
    #[arg(long, value_name = "PATH")]
    pub template: PathBuf,

    #[command(flatten)]
    pub inputs: SubmissionArgs,

    /// Label each answer with its submission id and keep duplicate answers
    #[arg(long)]
    pub with_names: bool,

    /// Maximum edit distance for a question match (overrides config)
    #[arg(long, value_name = "N")]
    pub threshold: Option<usize>,

    /// Directory for `<template>_responses.ipynb`
    #[arg(long, value_name = "DIR", default_value = ".", conflicts_with = "out")]
    pub out_dir: PathBuf,

    /// Explicit output notebook path
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Write a JSON report of kept, missed, blank, duplicate and absent answers
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

/// Prompts command inputs.
#[derive(Parser, Debug)]
#[command(about = "Show the prompts compiled from a template")]
pub struct PromptsArgs {
    #[arg(long, value_name = "PATH")]
    pub template: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Diff command inputs.
#[derive(Parser, Debug)]
#[command(about = "Write each submission without the template cells it left untouched")]
pub struct DiffArgs {
    #[arg(long, value_name = "PATH")]
    pub template: PathBuf,

    #[command(flatten)]
    pub inputs: SubmissionArgs,

    /// Directory for `<template>_<id>.ipynb` files
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,
}
