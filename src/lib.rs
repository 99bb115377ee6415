//! Moldspec - layered, schema-introspectable configuration engine.
//!
//! This library provides the core functionality for moldspec, including:
//! - An indented text-tree document format with canonical serialization
//! - Specs layered over a chain of `base` documents, with hidden/held overrides
//! - Ordered lists stored under fractional numeric keys
//! - Construction code that can run as a dry "molding" pass to derive a schema
//! - A per-context cache of singleton objects spawned from specs
//!
//! # Example
//!
//! ```no_run
//! use moldspec::{Accessor, Constructor, Context, DiskFs, Result, Spawner};
//! use std::sync::Arc;
//!
//! struct Tank;
//!
//! impl Spawner for Tank {
//!     type Output = (String, i64);
//!     const TAG: &'static str = "Tank";
//!
//!     fn build<A: Accessor>(props: &mut A) -> Result<Self::Output> {
//!         Ok((props.keyword("name")?, props.int_or("armor", 3)?))
//!     }
//! }
//!
//! let ctx = Context::new(Arc::new(DiskFs::new("specs")));
//! let tank = Constructor::<Tank>::open(&ctx, "units/tank.spec")?.spawn(&ctx)?;
//! println!("{} has armor {}", tank.0, tank.1);
//! # Ok::<(), moldspec::SpecError>(())
//! ```

pub mod access;
pub mod config;
pub mod error;
pub mod spawn;
pub mod spec;
pub mod store;
pub mod tree;

pub use access::{Accessor, Field, Molder, Range, Resolver, mold};
pub use error::{Result, SpecError};
pub use spawn::{Constructor, Context, Options, SpawnCache, Spawner};
pub use spec::{Document, Spec};
pub use store::{DiskFs, DocPath, FileSystem, MemoryFs};
pub use tree::{Fetched, Node};
