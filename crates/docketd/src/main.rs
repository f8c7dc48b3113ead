use std::process::ExitCode;

use docket_config::ConfigError;
use docketd::{BootstrapError, LaunchError};

fn main() -> ExitCode {
    match docketd::run_server() {
        Ok(()) => ExitCode::SUCCESS,
        Err(LaunchError::Bootstrap {
            source:
                BootstrapError::Configuration {
                    source: ConfigError::Cli(error),
                },
        }) => error.exit(),
        Err(error) => {
            eprintln!("docketd: {error}");
            ExitCode::FAILURE
        }
    }
}
