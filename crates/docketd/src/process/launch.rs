//! Supervises server launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::info;

use crate::StructuredHealthReporter;
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::HealthReporter;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the server with the production collaborators until a termination signal.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap, listening, or signal handling fails.
pub fn run_server() -> Result<(), LaunchError> {
    run_server_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        &SystemShutdownSignal,
    )
}

/// Runs the server with injected collaborators.
pub(crate) fn run_server_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let daemon = bootstrap_with(loader, reporter)?;
    info!(
        target: PROCESS_TARGET,
        mode = %daemon.config().mode(),
        listen = %daemon.config().listen(),
        "starting server runtime"
    );
    daemon.serve(shutdown)?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}
