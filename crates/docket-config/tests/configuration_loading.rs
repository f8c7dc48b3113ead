//! Integration tests for argument and environment loading.

use std::ffi::{OsStr, OsString};
use std::sync::{Mutex, MutexGuard};

use docket_config::{Config, ConfigError, LogFormat, Mode, SocketEndpoint};
use once_cell::sync::Lazy;
use rstest::rstest;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct EnvOverride {
    key: &'static str,
    previous: Option<OsString>,
    guard: Option<MutexGuard<'static, ()>>,
}

impl EnvOverride {
    fn set_var(key: &'static str, value: &OsStr) -> Self {
        let guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        let previous = std::env::var_os(key);
        // Environment mutation is unsafe under edition 2024.
        unsafe { std::env::set_var(key, value) };
        Self {
            key,
            previous,
            guard: Some(guard),
        }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { std::env::set_var(self.key, value) },
            None => unsafe { std::env::remove_var(self.key) },
        }
        drop(self.guard.take());
    }
}

fn load(args: &[&str]) -> Result<Config, ConfigError> {
    Config::load_from_iter(std::iter::once("docketd").chain(args.iter().copied()))
}

#[test]
fn defaults_listen_on_loopback_in_local_mode() {
    let _lock = ENV_MUTEX.lock().expect("env mutex poisoned");
    let config = load(&[]).expect("defaults load");

    assert_eq!(config.listen(), &SocketEndpoint::tcp("127.0.0.1", 27017));
    assert_eq!(config.mode(), Mode::LocalOnly);
    assert_eq!(config.log_format(), LogFormat::Json);
    assert_eq!(config.log_filter(), "info");
    assert!(config.mirror().is_none());
    assert!(config.capture_dir().is_none());
}

#[test]
fn flags_select_mirror_with_tls() {
    let _lock = ENV_MUTEX.lock().expect("env mutex poisoned");
    let config = load(&[
        "--mode",
        "dual-prefer-mirror",
        "--mirror-addr",
        "mirror.internal:27018",
        "--mirror-tls-ca-file",
        "/etc/docket/ca.pem",
        "--mirror-tls-cert-file",
        "/etc/docket/client.pem",
        "--mirror-tls-key-file",
        "/etc/docket/client.key",
    ])
    .expect("config loads");

    let mirror = config.mirror().expect("mirror configured");
    assert_eq!(mirror.addr, "mirror.internal:27018");
    assert_eq!(mirror.host(), "mirror.internal");
    let tls = mirror.tls.expect("tls configured");
    assert_eq!(tls.ca_file.as_str(), "/etc/docket/ca.pem");
    assert_eq!(
        tls.cert_file.as_ref().map(|path| path.as_str()),
        Some("/etc/docket/client.pem")
    );
}

#[test]
fn environment_supplies_values_missing_from_flags() {
    let _mode = EnvOverride::set_var("DOCKET_LOG_FORMAT", OsStr::new("compact"));
    let config = load(&["--listen", "unix:///tmp/docket-test/docket.sock"]).expect("config loads");

    assert_eq!(config.log_format(), LogFormat::Compact);
    assert_eq!(
        config.listen(),
        &SocketEndpoint::unix("/tmp/docket-test/docket.sock")
    );
}

#[rstest]
#[case::mirror_mode_without_address(&["--mode", "mirror-only"])]
#[case::dual_mode_without_address(&["--mode", "dual-prefer-local"])]
fn mirror_modes_need_an_address(#[case] args: &[&str]) {
    let _lock = ENV_MUTEX.lock().expect("env mutex poisoned");
    let error = load(args).expect_err("validation fails");
    assert!(matches!(error, ConfigError::MissingMirror { .. }), "{error}");
}

#[rstest]
#[case::missing_port(&["--mirror-addr", "mirror.internal"], "invalid mirror address")]
#[case::half_certificate(
    &["--mirror-addr", "m:1", "--mirror-tls-ca-file", "/ca.pem", "--mirror-tls-cert-file", "/c.pem"],
    "must be given together"
)]
#[case::certificate_without_ca(
    &["--mirror-addr", "m:1", "--mirror-tls-cert-file", "/c.pem", "--mirror-tls-key-file", "/k.pem"],
    "requires --mirror-tls-ca-file"
)]
fn inconsistent_mirror_settings_fail_fast(#[case] args: &[&str], #[case] expected: &str) {
    let _lock = ENV_MUTEX.lock().expect("env mutex poisoned");
    let message = load(args).expect_err("validation fails").to_string();
    assert!(message.contains(expected), "unexpected message {message:?}");
}

#[test]
fn unknown_mode_is_a_parse_error() {
    let _lock = ENV_MUTEX.lock().expect("env mutex poisoned");
    let error = load(&["--mode", "sideways"]).expect_err("parse fails");
    assert!(matches!(error, ConfigError::Cli(_)));
}
