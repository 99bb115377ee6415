//! Text-tree model.
//!
//! This module handles:
//! - The `Node` tree (scalar, sequence, mapping)
//! - Parsing the indented document text format
//! - Canonical, whitespace-stable serialization

pub mod format;
pub mod node;
pub mod parse;

pub use format::{Formatter, serialize};
pub use node::{Fetched, Node, NodeKind, identity};
pub use parse::{is_placeholder_token, parse, parse_document, parse_document_with};
