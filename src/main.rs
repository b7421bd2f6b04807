mod cli;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    snapedit::logging::init();
    let args = cli::CliArgs::parse();
    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "snapedit failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
