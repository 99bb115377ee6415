use crate::error::{Result, SpecError};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

type Instance = Arc<dyn Any + Send + Sync>;
type CacheKey = (TypeId, String);

thread_local! {
	/// Keys this thread is currently constructing.
	static IN_FLIGHT: RefCell<Vec<CacheKey>> = const { RefCell::new(Vec::new()) };
}

/// Pops the in-flight key even when construction fails.
struct InFlight(CacheKey);

impl InFlight {
	fn enter(key: CacheKey) -> Option<Self> {
		IN_FLIGHT.with(|stack| {
			let mut stack = stack.borrow_mut();
			if stack.contains(&key) {
				return None;
			}
			stack.push(key.clone());
			Some(Self(key))
		})
	}
}

impl Drop for InFlight {
	fn drop(&mut self) {
		IN_FLIGHT.with(|stack| {
			let mut stack = stack.borrow_mut();
			if let Some(index) = stack.iter().rposition(|key| *key == self.0) {
				stack.remove(index);
			}
		});
	}
}

/// Singleton instances keyed by (spawner type, document identity).
///
/// The map lock is only held to find a key's cell; construction runs under
/// that cell's own init lock, so unrelated keys build concurrently and
/// racing callers of one key see a single construction.
#[derive(Default)]
pub struct SpawnCache {
	slots: Mutex<HashMap<CacheKey, Arc<OnceCell<Instance>>>>,
}

impl SpawnCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// The cached instance for `(spawner, document)`, built by `init` once.
	///
	/// A failed construction leaves the key empty so a later call retries.
	pub fn get_or_try_init<O: Send + Sync + 'static>(
		&self,
		spawner: TypeId,
		tag: &str,
		document: &str,
		init: impl FnOnce() -> Result<O>,
	) -> Result<Arc<O>> {
		let key = (spawner, document.to_string());
		let cell = self.slots.lock().entry(key.clone()).or_default().clone();

		let instance = match cell.get() {
			Some(instance) => instance.clone(),
			None => {
				let cycle = || SpecError::SpawnCycle {
					spawner: tag.to_string(),
					document: document.to_string(),
				};
				let _guard = InFlight::enter(key).ok_or_else(cycle)?;
				cell.get_or_try_init(|| {
					tracing::debug!(spawner = tag, document, "constructing singleton");
					init().map(|output| Arc::new(output) as Instance)
				})?
				.clone()
			}
		};

		instance.downcast::<O>().map_err(|_| SpecError::SpawnerMismatch {
			expected: tag.to_string(),
			found: "an instance of another type".to_string(),
			document: document.to_string(),
		})
	}

	/// Number of constructed instances.
	pub fn len(&self) -> usize {
		self.slots
			.lock()
			.values()
			.filter(|cell| cell.get().is_some())
			.count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl std::fmt::Debug for SpawnCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SpawnCache").field("len", &self.len()).finish()
	}
}
