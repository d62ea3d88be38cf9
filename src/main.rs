//! nbharvest: gather answers to a template's questions from many notebooks.
//!
//! Flow: compile the template's question cells into prompts, fetch every
//! submission, fuzzily locate each prompt's answer in each submission, and
//! merge the surviving answers into one notebook.
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod cli;
mod config;
mod diff;
mod distance;
mod matcher;
mod notebook;
mod output;
mod prompt;
mod source;
mod util;
mod workflow;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    init_tracing();
    let args = RootArgs::parse();

    match args.command {
        Command::Extract(args) => workflow::run_extract(args),
        Command::Prompts(args) => workflow::run_prompts(args),
        Command::Diff(args) => workflow::run_diff(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
