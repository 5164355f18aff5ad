//! # Blocky Testkit
//!
//! Test utilities for the Blocky map storage engine.
//!
//! This crate provides:
//! - Temporary stores and sample payloads
//! - Writers for broken, outdated and foreign document files
//! - Property-based test generators using proptest
//! - Log capture setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blocky_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     with_temp_store(|store| {
//!         let map = store.create("Dungeon A", "a").unwrap();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
}

pub use fixtures::*;
pub use generators::*;

/// Routes `tracing` output to the test harness.
///
/// Honors `RUST_LOG`. Safe to call from every test; only the first call
/// installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
