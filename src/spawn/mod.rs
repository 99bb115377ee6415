//! Object construction from specs.
//!
//! This module handles:
//! - The `Spawner` trait implemented by constructible types
//! - `Constructor`, which binds a spawner type to a spec
//! - The per-context singleton cache and document registry

pub mod cache;
pub mod context;

pub use cache::SpawnCache;
pub use context::{Context, Options};

use crate::access::{Accessor, Resolver, mold};
use crate::error::{Result, SpecError};
use crate::spec::{Document, Spec};
use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

/// A type that can be built from a spec.
///
/// `build` is generic over the accessor so the same code spawns real
/// objects and describes its schema.
pub trait Spawner: 'static {
	type Output: Send + Sync + 'static;

	/// Value of the `spawner` key in documents this type builds from.
	const TAG: &'static str;

	/// Human-readable description.
	const NOTE: &'static str = "";

	/// Share one instance per document within a context.
	const SINGLETON: bool = false;

	fn build<A: Accessor>(props: &mut A) -> Result<Self::Output>;
}

/// A spawner type bound to one spec.
pub struct Constructor<T: Spawner> {
	spec: Arc<Spec>,
	spawner: PhantomData<fn() -> T>,
}

impl<T: Spawner> Constructor<T> {
	pub fn new(spec: Arc<Spec>) -> Self {
		Self {
			spec,
			spawner: PhantomData,
		}
	}

	/// Open `path` in `ctx` and bind it.
	pub fn open(ctx: &Context, path: &str) -> Result<Self> {
		Ok(Self::new(ctx.open(path)?))
	}

	pub fn note(&self) -> &'static str {
		T::NOTE
	}

	pub fn spec(&self) -> &Arc<Spec> {
		&self.spec
	}

	/// The declared `spawner` tag must name `T` when present anywhere in
	/// the chain; the most derived declaration counts.
	fn check_tag(&self) -> Result<()> {
		for level in self.spec.levels() {
			if let Some(found) = level.spawner_tag()? {
				if found != T::TAG {
					return Err(SpecError::SpawnerMismatch {
						expected: T::TAG.to_string(),
						found,
						document: self.spec.identity().to_string(),
					});
				}
				return Ok(());
			}
		}
		Ok(())
	}

	/// Build the object. Singletons are shared per (type, document).
	pub fn spawn(&self, ctx: &Context) -> Result<Arc<T::Output>> {
		self.check_tag()?;
		if !T::SINGLETON {
			return self.build(ctx).map(Arc::new);
		}
		ctx.cache().get_or_try_init(
			TypeId::of::<T>(),
			T::TAG,
			self.spec.identity(),
			|| self.build(ctx),
		)
	}

	fn build(&self, ctx: &Context) -> Result<T::Output> {
		let mut props = Resolver::new(ctx, self.spec.clone());
		T::build(&mut props)
	}

	/// The schema `T` expects, molded against this spec's live keys.
	pub fn schema(&self, ctx: &Context) -> Result<Document> {
		mold::<T>(ctx, Some(&self.spec))
	}
}
