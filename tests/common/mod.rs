//! Common test utilities: tracing setup shared by integration tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ...
//! }
//! ```
//!
//! Honors `RUST_LOG` filter directives, e.g.:
//!
//! ```bash
//! RUST_LOG=packtree=trace cargo test --features tracing
//! ```

#![allow(dead_code)]

use std::sync::Once;

/// Ensures tracing is only initialized once across all tests.
static INIT: Once = Once::new();

/// Initialize the tracing subscriber with console logging.
///
/// Safe to call multiple times - only the first call takes effect. With
/// the `tracing` feature off this still runs, it just has nothing to
/// subscribe to.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
