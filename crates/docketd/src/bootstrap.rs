//! Server bootstrap orchestration.

use std::sync::Arc;

use docket_config::{Config, ConfigError, SocketPreparationError};
use thiserror::Error;

use crate::dispatch::CommandTable;
use crate::health::HealthReporter;
use crate::metrics::ConnMetrics;
use crate::operation::OperationRegistry;
use crate::process::{LaunchError, ShutdownSignal};
use crate::server::ServerHandler;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the server configuration.
    fn load(&self) -> Result<Config, ConfigError>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load()
    }
}

/// Loader that returns a pre-built configuration after validating it.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare listen socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
}

/// Bootstrapped server, ready to listen.
pub struct Daemon {
    config: Config,
    registry: Arc<OperationRegistry>,
    table: Arc<CommandTable>,
    metrics: Arc<ConnMetrics>,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Registry of in-flight operations shared by every connection.
    #[must_use]
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Command table shared by every connection.
    #[must_use]
    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// Request and response counters.
    #[must_use]
    pub fn metrics(&self) -> &ConnMetrics {
        &self.metrics
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Connection handler serving this daemon's configuration.
    #[must_use]
    pub fn handler(&self) -> ServerHandler {
        ServerHandler::new(
            self.config.mode(),
            self.config.mirror(),
            Arc::clone(&self.table),
            Arc::clone(&self.metrics),
        )
        .with_capture_dir(self.config.capture_dir().map(ToOwned::to_owned))
    }

    /// Binds the configured endpoint and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the endpoint cannot be bound.
    pub fn start(&self) -> Result<ListenerHandle, ListenerError> {
        let listener = SocketListener::bind(self.config.listen())?;
        let local_addr = listener.local_addr();
        let handle = listener.start(Arc::new(self.handler()))?;
        self.reporter.listener_ready(self.config.listen(), local_addr);
        Ok(handle)
    }

    /// Serves until `shutdown` fires, then drains connections and closes the registry.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when listening or waiting for shutdown fails.
    pub fn serve(self, shutdown: &dyn ShutdownSignal) -> Result<(), LaunchError> {
        let handle = self.start()?;
        let waited = shutdown.wait();
        self.reporter.shutdown_starting();
        handle.shutdown();
        let joined = handle.join();
        self.registry.close();
        self.reporter.shutdown_completed();
        waited?;
        joined?;
        Ok(())
    }
}

/// Bootstraps the server using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration, telemetry, or socket
/// preparation fails; the reporter sees the failure first.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    if let Err(source) = config.listen().prepare_filesystem() {
        let error = BootstrapError::Socket { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    let registry = Arc::new(OperationRegistry::new());
    let table = Arc::new(CommandTable::with_builtins(Arc::clone(&registry)));
    reporter.bootstrap_succeeded(&config);

    Ok(Daemon {
        config,
        registry,
        table,
        metrics: Arc::new(ConnMetrics::new()),
        telemetry,
        reporter,
    })
}
