mod commands;
mod helpers;

use clap::Parser;
use crns_core::domain::CrnsError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();

    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let diagnostic = error.as_crns_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            if let Some(summary_line) = diagnostic.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            diagnostic.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "crspy-rs", about = "Cosmic-ray neutron sensor soil moisture processor")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Derive the site pressure-attenuation constants from its location
    Metadata(commands::MetadataArgs),
    /// Apply the neutron count corrections to a raw series
    Correct(commands::CorrectArgs),
    /// Calibrate the site N0 against soil sampling campaigns
    Calibrate(commands::CalibrateArgs),
    /// Run correction, quality control and the moisture inversion
    Process(commands::ProcessArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Metadata(args) => commands::run_metadata_command(args),
        CliCommand::Correct(args) => commands::run_correct_command(args),
        CliCommand::Calibrate(args) => commands::run_calibrate_command(args),
        CliCommand::Process(args) => commands::run_process_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(CrnsError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_crns_error(&self) -> CrnsError {
        match self {
            Self::Usage(message) => CrnsError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => CrnsError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
