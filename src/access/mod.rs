//! Typed property access.
//!
//! This module handles:
//! - The `Accessor` surface construction code is written against
//! - Resolving real values through a layered spec (`Resolver`)
//! - Recording a schema instead of reading values (`Molder`)
//!
//! Construction code is generic over [`Accessor`], so the same `build`
//! function both spawns objects and describes the documents it expects.

pub mod field;
pub mod molder;
pub mod resolver;

pub use field::{Field, Range};
pub use molder::{Molder, mold};
pub use resolver::Resolver;

use crate::error::Result;
use crate::spawn::Spawner;
use indexmap::IndexMap;
use std::sync::Arc;

/// Typed reads of one spec subtree.
///
/// Every key is relative to the subtree the accessor is positioned on.
/// Defaults that are used are written back into the spec being read
/// (never into a base).
pub trait Accessor: Sized {
	/// True while recording a schema; values returned are stand-ins.
	fn is_molding(&self) -> bool;

	fn scalar<T: Field>(&mut self, key: &str, default: Option<T>) -> Result<T>;

	/// A float constrained to `range`.
	fn range(&mut self, key: &str, range: &Range, default: Option<f64>) -> Result<f64>;

	/// A keyword that must be one of `candidates`.
	fn choice(&mut self, key: &str, candidates: &[String], default: Option<&str>) -> Result<String>;

	/// An ordered list. With `fill`, held entries read as `fill` and an
	/// undefined list is empty; without it, held entries are dropped and an
	/// undefined list is an error.
	fn list<T: Field>(&mut self, key: &str, fill: Option<T>) -> Result<Vec<T>>;

	fn dict<T: Field>(&mut self, key: &str) -> Result<IndexMap<String, T>>;

	/// A dictionary whose values must be one of `candidates`.
	fn choice_dict(&mut self, key: &str, candidates: &[String]) -> Result<IndexMap<String, String>>;

	/// Effective key names of a nested mapping.
	fn keys(&mut self, key: &str) -> Result<Vec<String>>;

	/// Run `build` positioned on the nested mapping at `key`.
	fn section<R>(&mut self, key: &str, build: impl FnOnce(&mut Self) -> Result<R>) -> Result<R>;

	/// Run `build` once per entry of the nested mapping at `key`.
	fn entries<R>(
		&mut self,
		key: &str,
		build: impl FnMut(&str, &mut Self) -> Result<R>,
	) -> Result<IndexMap<String, R>>;

	/// Run `build` once per entry of the ordered list at `key`.
	fn items<R>(&mut self, key: &str, build: impl FnMut(&mut Self) -> Result<R>) -> Result<Vec<R>>;

	/// Construct `T` from the definition nested at `key`. Never cached.
	fn interior<T: Spawner>(&mut self, key: &str) -> Result<T::Output>;

	/// Construct `T` from the document whose path is stored at `key`.
	fn exterior<T: Spawner>(&mut self, key: &str) -> Result<Arc<T::Output>>;

	fn keyword(&mut self, key: &str) -> Result<String> {
		self.scalar(key, None)
	}

	fn keyword_or(&mut self, key: &str, default: &str) -> Result<String> {
		self.scalar(key, Some(default.to_string()))
	}

	fn int(&mut self, key: &str) -> Result<i64> {
		self.scalar(key, None)
	}

	fn int_or(&mut self, key: &str, default: i64) -> Result<i64> {
		self.scalar(key, Some(default))
	}

	fn float(&mut self, key: &str) -> Result<f64> {
		self.scalar(key, None)
	}

	fn float_or(&mut self, key: &str, default: f64) -> Result<f64> {
		self.scalar(key, Some(default))
	}

	fn flag(&mut self, key: &str) -> Result<bool> {
		self.scalar(key, None)
	}

	fn flag_or(&mut self, key: &str, default: bool) -> Result<bool> {
		self.scalar(key, Some(default))
	}
}
