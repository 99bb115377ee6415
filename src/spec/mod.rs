//! Layered specs.
//!
//! This module handles:
//! - Documents with their reserved top-level keys
//! - Base-chain lookup with hidden/held override markers
//! - Ordered lists encoded with fractional keys

pub mod document;
pub mod layered;
pub mod list;

pub use document::{BASE_KEY, Document, KIND_KEY, PROPERTIES_KEY, SPAWNER_KEY};
pub use layered::{HELD, HIDDEN, Resolved, Slot, Spec};
pub use list::{Cell, CellState, Position, key_between};
