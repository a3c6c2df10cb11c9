//! Logging setup for CHX
//!
//! Library code only emits `tracing` events:
//!
//! - `info`: doubler (re)creation, context creation
//! - `warn`: bulk-load retries, flag files that could not be read, leftover staging files
//! - `error`: failed bulk loads, staging write errors, transactions dropped while open
//! - `debug`: table resolution, mocks, temporary tables, per-query timing
//!
//! This module installs a `fmt` subscriber for binaries and tests. `CHX_LOG` is read
//! first, then `RUST_LOG`, then the built-in directives.

#[cfg(feature = "logging")]
use tracing_subscriber::{EnvFilter, fmt, fmt::format::FmtSpan};

/// Doubler lifecycle and bulk-load problems, no per-query noise
pub const DEFAULT_FILTER: &str = "warn,chx_core=info";

/// Resolution, doublers and staging at debug; query timing stays at info
pub const TEST_FILTER: &str = "chx_core=debug,chx_core::connection=info";

/// Checked before `RUST_LOG`
pub const LOG_ENV: &str = "CHX_LOG";

#[cfg(feature = "logging")]
fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the subscriber with [`DEFAULT_FILTER`].
///
/// # Example
/// ```rust
/// chx_core::logging::init();
/// ```
#[cfg(feature = "logging")]
pub fn init() {
    init_with_filter(DEFAULT_FILTER)
}

/// Installs the subscriber with `directives` unless `CHX_LOG`/`RUST_LOG` is set.
///
/// Closed spans are logged, so table resolution and doubler creation report their
/// duration.
///
/// ```rust
/// chx_core::logging::init_with_filter("chx_core::transaction=debug");
/// ```
#[cfg(feature = "logging")]
pub fn init_with_filter(directives: &str) {
    let _ = fmt()
        .with_env_filter(env_filter(directives))
        .with_target(true)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// 테스트용 초기화 (cargo test 출력 캡처)
#[cfg(feature = "logging")]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(env_filter(TEST_FILTER))
        .with_span_events(FmtSpan::CLOSE)
        .without_time()
        .with_test_writer()
        .try_init();
}

#[cfg(not(feature = "logging"))]
pub fn init() {}

#[cfg(not(feature = "logging"))]
pub fn init_with_filter(_directives: &str) {}

#[cfg(not(feature = "logging"))]
pub fn init_test() {}
