//! Configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;

use docket_config::{Config, ConfigError, Mode, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader listening on an ephemeral loopback port.
#[derive(Debug, Clone)]
pub struct TestConfigLoader {
    config: Config,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config {
                listen: SocketEndpoint::tcp("127.0.0.1", 0),
                ..Config::default()
            },
        }
    }

    /// Routes through `mode` with the mirror at `addr`.
    #[must_use]
    pub fn with_mirror(mut self, mode: Mode, addr: &str) -> Self {
        self.config.mode = mode;
        self.config.mirror_addr = Some(addr.to_owned());
        self
    }
}

impl Default for TestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config.clone())
    }
}

/// Loader that fails by selecting a mirror mode without a mirror.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        let args = vec![
            OsString::from("docketd"),
            OsString::from("--mode"),
            OsString::from("mirror-only"),
        ];
        Config::load_from_iter(args)
    }
}
