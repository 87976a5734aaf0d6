//! `iisutil` entry point.
//!
//! The process exit code is the numeric [`ErrorCode`] of the operation.
use clap::Parser;
use clap::error::ErrorKind;

use iisutil_cli::cli::{Cli, normalize_args};
use iisutil_cli::commands;
use iisutil_cli::error::ErrorCode;
use iisutil_cli::logging::{self, Logger};

fn main() {
    let _ = enable_ansi_support::enable_ansi_support();

    let cli = match Cli::try_parse_from(normalize_args(std::env::args())) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ErrorCode::Succeed,
                _ => ErrorCode::InvalidParameter,
            };
            std::process::exit(code.code());
        }
    };

    let verb = cli.command.verb();
    logging::init_subscriber(cli.verbose, verb);
    let log = Logger::new(verb);

    let code = commands::run(&cli, &log);
    log.result(code, cli.command.is_query());
    std::process::exit(code.code());
}
