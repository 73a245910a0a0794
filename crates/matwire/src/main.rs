//! Entry point wiring that parses the CLI, initialises tracing and dispatches
//! to the subcommand handlers in `run.rs`.
//!
//! Types:
//!
//! - None; this module focuses on orchestrating submodules.
//!
//! Functions:
//!
//! - `main` parses CLI input, initialises tracing, and dispatches to commands.

mod cli;
mod hscript;
mod paths;
mod report;
mod run;
mod scan;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let config = cli.config.as_deref();
    match cli.command {
        Command::Build(args) => run::run_build(config, args),
        Command::Recommend(args) => run::run_recommend(config, args),
        Command::Capabilities(args) => run::run_capabilities(config, args),
        Command::Batch(args) => run::run_batch(config, args),
        Command::Where => run::run_where(config),
    }
}
