//! Document storage boundary.
//!
//! This module handles:
//! - Platform-independent document paths and their validation
//! - The `FileSystem` trait with disk and in-memory implementations

pub mod fs;
pub mod path;

pub use fs::{DiskFs, FileSystem, MemoryFs};
pub use path::DocPath;
