//! Thin CLI entry point: parse arguments, dispatch, exit with the
//! contracted exit code (`SPEC_FULL.md` §6).

use std::process::ExitCode;

use clap::Parser;
use vdocs_core::adapters::cli::{dispatch, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
