//! # SlotBox Testkit
//!
//! Test utilities for SlotBox.
//!
//! This crate provides:
//! - The IoT fixture schema with `Event` and `Reading` bindings
//! - Store helpers backed by the in-memory reference engine
//! - Property-based test generators using proptest
//! - Temporary snapshot files for generation runs
//!
//! Cross-crate scenarios live in this crate's `tests/` directory.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use slotbox_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     with_test_store(|store| {
//!         let events = store.put_events(3);
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod snapshot;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::snapshot::*;
}

pub use fixtures::*;
pub use generators::*;
pub use snapshot::*;
