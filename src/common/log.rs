//! Logger bootstrap
//!
//! The relay reports its events through the `log` facade; this module wires
//! the facade to `env_logger`.

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence; `level` is used when it is unset.
///
/// # Parameters
///
/// * `level` - Fallback log level
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    // A second initialization (tests, embedding) is not an error for us.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
