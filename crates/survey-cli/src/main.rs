//! Survey summary CLI.

use std::io::{self, IsTerminal};

use clap::{ColorChoice, Parser};

use survey_cli::logging::{LogConfig, init_logging};

mod cli;
mod commands;

use crate::cli::{Cli, Command};
use crate::commands::{run_counts, run_export_questions, run_questions, run_summary};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    if let Err(error) = init_logging(&log_config_from_cli(&cli)) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let result = match &cli.command {
        Command::Summary(args) => run_summary(args),
        Command::Questions(args) => run_questions(args),
        Command::ExportQuestions(args) => run_export_questions(args),
        Command::Counts(args) => run_counts(args),
    };
    let exit_code = match result {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn log_config_from_cli(cli: &Cli) -> LogConfig {
    LogConfig {
        level: cli.verbosity.tracing_level_filter(),
        with_ansi: match cli.color.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
        },
        log_file: cli.log_file.clone(),
    }
}
