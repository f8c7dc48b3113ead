//! Shared harness for the server test suites.

mod config_loader;
mod mirror;
mod reporter;
mod server;
mod wire;
mod world;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use mirror::{FakeMirror, MirrorBehaviour};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use server::{ImmediateShutdown, TestServer};
pub use wire::{exchange, msg_document, msg_frame, query_frame, raw_frame};
pub use world::{TestWorld, world};
