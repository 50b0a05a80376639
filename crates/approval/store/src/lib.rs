//! Persistence adapters for Signoff
//!
//! The approval engine persists its two collections — chains and
//! requests — as one opaque snapshot through the [`SnapshotStore`]
//! contract. Two adapters ship:
//!
//! - [`MemoryStore`] — deterministic, test-friendly, nothing survives
//!   the process
//! - [`JsonFileStore`] — a single JSON file, replaced atomically via
//!   write-then-rename
//!
//! Deployments with stronger durability needs implement the trait over
//! their own backend; the engine is indifferent to what sits behind it.

#![deny(unsafe_code)]

pub mod error;
pub mod json_file;
pub mod memory;
pub mod model;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use model::EngineSnapshot;
pub use traits::SnapshotStore;
