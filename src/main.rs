//! merge-bisect CLI - Like git bisect, but on merge commits.

use clap::Parser;
use merge_bisect::cli::Cli;
use merge_bisect::commands::{self, CommandResult};
use merge_bisect::config::{BisectConfig, OutputFormat};
use merge_bisect::{guard, logging};
use std::process;

fn main() {
    let cli = Cli::parse();
    logging::init();
    guard::install_interrupt_handler();

    let config = match BisectConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };

    match commands::run(&config) {
        Ok(report) => output(&report, config.format),
        Err(e) => fail(&e),
    }
}

fn output<T: CommandResult>(result: &T, format: OutputFormat) {
    match format {
        OutputFormat::Human => println!("{}", result.to_human()),
        OutputFormat::Json => println!("{}", result.to_json()),
    }
}

/// Print an error with its remediation hint and exit.
fn fail(error: &merge_bisect::Error) -> ! {
    let mut msg = format!("merge-bisect: error: {}", error);
    if let Some(hint) = error.hint() {
        msg.push_str("\n\n  ");
        msg.push_str(hint);
    }
    eprintln!("{}", msg);
    process::exit(error.exit_code());
}
