use crate::error::{Result, SpecError};
use crate::store::{DocPath, FileSystem};
use crate::tree::{Formatter, Node, identity, parse_document_with};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Top-level key holding the relative path of the base document.
pub const BASE_KEY: &str = "base";

/// Top-level key holding the constructor-type tag.
pub const SPAWNER_KEY: &str = "spawner";

/// Top-level key holding the user data tree.
pub const PROPERTIES_KEY: &str = "properties";

/// Top-level key naming a molded document's own kind.
pub const KIND_KEY: &str = "kind";

static DETACHED_IDS: AtomicU64 = AtomicU64::new(1);

/// The raw tree of one configuration resource.
///
/// Readers get lock-free snapshots; every structural mutation runs under a
/// writer lock and publishes a new root.
#[derive(Debug)]
pub struct Document {
	path: Option<DocPath>,
	identity: String,
	root: ArcSwap<Node>,
	writer: Mutex<()>,
}

impl Document {
	pub fn new(path: DocPath, root: Node) -> Self {
		Self {
			identity: path.to_string(),
			path: Some(path),
			root: ArcSwap::from_pointee(root),
			writer: Mutex::new(()),
		}
	}

	/// A document with no backing resource, such as a molded schema.
	pub fn detached(root: Node) -> Self {
		let id = DETACHED_IDS.fetch_add(1, Ordering::Relaxed);
		Self {
			path: None,
			identity: format!("<detached-{id}>"),
			root: ArcSwap::from_pointee(root),
			writer: Mutex::new(()),
		}
	}

	/// Read and parse `path`. With `accept_empty`, a missing resource is an
	/// empty document instead of an error. `placeholder` is the empty-mapping
	/// token the document was saved with, if any.
	pub fn load(
		fs: &dyn FileSystem,
		path: &DocPath,
		accept_empty: bool,
		placeholder: Option<&str>,
	) -> Result<Self> {
		let root = match fs.read_text(path) {
			Ok(text) => parse_document_with(&text, &path.to_string(), placeholder)?,
			Err(SpecError::ResourceNotFound { .. }) if accept_empty => {
				tracing::debug!(document = %path, "missing document loaded as empty");
				Node::empty_mapping()
			}
			Err(e) => return Err(e),
		};
		tracing::debug!(document = %path, "document loaded");
		Ok(Self::new(path.clone(), root))
	}

	pub fn path(&self) -> Option<&DocPath> {
		self.path.as_ref()
	}

	/// Diagnostic and cache identity: the path, or a unique detached tag.
	pub fn identity(&self) -> &str {
		&self.identity
	}

	pub fn snapshot(&self) -> Arc<Node> {
		self.root.load_full()
	}

	/// Apply one structural mutation. Nothing is published if `mutate` fails.
	pub fn update<R>(&self, mutate: impl FnOnce(&mut Node) -> Result<R>) -> Result<R> {
		let _guard = self.writer.lock();
		let mut next = Node::clone(&self.root.load());
		let result = mutate(&mut next)?;
		self.root.store(Arc::new(next));
		Ok(result)
	}

	/// Replace the whole tree.
	pub fn replace(&self, root: Node) {
		let _guard = self.writer.lock();
		self.root.store(Arc::new(root));
	}

	/// A top-level scalar such as `base` or `spawner`.
	pub fn top_level_scalar(&self, key: &str) -> Result<Option<String>> {
		let root = self.snapshot();
		match root.get(key) {
			None => Ok(None),
			Some(node) => {
				let ident = identity(&self.identity, &[key]);
				Ok(Some(node.as_scalar(&ident)?.to_string()))
			}
		}
	}

	pub fn base_reference(&self) -> Result<Option<String>> {
		self.top_level_scalar(BASE_KEY)
	}

	pub fn spawner_tag(&self) -> Result<Option<String>> {
		self.top_level_scalar(SPAWNER_KEY)
	}

	pub fn to_text(&self, formatter: &Formatter) -> String {
		formatter.format(&self.snapshot())
	}

	/// Write the document back to its own resource.
	pub fn save(&self, fs: &dyn FileSystem, formatter: &Formatter) -> Result<()> {
		let Some(path) = &self.path else {
			return Err(SpecError::ResourceNotFound {
				path: self.identity.clone(),
			});
		};
		self.save_as(fs, path, formatter)
	}

	pub fn save_as(&self, fs: &dyn FileSystem, path: &DocPath, formatter: &Formatter) -> Result<()> {
		fs.write_text(path, &self.to_text(formatter), false)?;
		tracing::debug!(document = %path, "document saved");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::MemoryFs;

	#[test]
	fn test_load_and_reserved_keys() {
		let fs = MemoryFs::new()
			.with_file("a.spec", "\"base\": \"b.spec\"\n\"spawner\": \"Tank\"\n")
			.unwrap();
		let doc = Document::load(&fs, &DocPath::parse("a.spec").unwrap(), false, None).unwrap();

		assert_eq!(doc.identity(), "a.spec");
		assert_eq!(doc.base_reference().unwrap(), Some("b.spec".to_string()));
		assert_eq!(doc.spawner_tag().unwrap(), Some("Tank".to_string()));
	}

	#[test]
	fn test_load_missing_document() {
		let fs = MemoryFs::new();
		let path = DocPath::parse("missing.spec").unwrap();

		let strict = Document::load(&fs, &path, false, None);
		assert!(matches!(strict, Err(SpecError::ResourceNotFound { .. })));

		let lenient = Document::load(&fs, &path, true, None).unwrap();
		assert_eq!(*lenient.snapshot(), Node::empty_mapping());
	}

	#[test]
	fn test_load_malformed_document() {
		let fs = MemoryFs::new().with_file("bad.spec", "\"a\": oops\n").unwrap();
		let result = Document::load(&fs, &DocPath::parse("bad.spec").unwrap(), true, None);
		match result.unwrap_err() {
			SpecError::MalformedDocument { document, line, .. } => {
				assert_eq!(document, "bad.spec");
				assert_eq!(line, 1);
			}
			other => panic!("Expected MalformedDocument, got {other:?}"),
		}
	}

	#[test]
	fn test_update_is_all_or_nothing() {
		let doc = Document::detached(Node::empty_mapping());
		let before = doc.snapshot();

		doc.update(|root| root.insert("t", "a", Node::scalar("1")))
			.unwrap();
		assert_eq!(doc.snapshot().get("a"), Some(&Node::scalar("1")));
		// The earlier snapshot is unaffected.
		assert_eq!(*before, Node::empty_mapping());

		let failed: Result<()> = doc.update(|root| {
			root.insert("t", "b", Node::scalar("2"))?;
			Err(SpecError::KeyUndefined {
				identity: "t".to_string(),
				key: "x".to_string(),
			})
		});
		assert!(failed.is_err());
		assert_eq!(doc.snapshot().get("b"), None);
	}

	#[test]
	fn test_save_round_trip() {
		let fs = MemoryFs::new()
			.with_file("a.spec", "\"properties\":\n  \"x\": \"1\"\n")
			.unwrap();
		let path = DocPath::parse("a.spec").unwrap();
		let doc = Document::load(&fs, &path, false, None).unwrap();
		doc.update(|root| {
			root.ensure_mapping_path_mut("a.spec", &["properties"], |_| false)?
				.insert("y".to_string(), Node::scalar("2"));
			Ok(())
		})
		.unwrap();
		doc.save(&fs, &Formatter::new()).unwrap();

		assert_eq!(
			fs.contents("a.spec").unwrap(),
			"\"properties\":\n  \"x\": \"1\"\n  \"y\": \"2\"\n"
		);
	}

	#[test]
	fn test_concurrent_updates_are_not_lost() {
		let doc = Document::detached(Node::empty_mapping());
		let before = doc.snapshot();

		std::thread::scope(|scope| {
			for worker in 0..8 {
				let doc = &doc;
				scope.spawn(move || {
					for i in 0..50 {
						let key = format!("w{worker}-{i}");
						doc.update(|root| root.insert("t", &key, Node::scalar(i.to_string())))
							.unwrap();
						// Readers always see a complete tree.
						assert!(doc.snapshot().get(&key).is_some());
					}
				});
			}
		});

		let root = doc.snapshot();
		assert_eq!(root.as_mapping("t").unwrap().len(), 400);
		assert_eq!(root.get("w3-49"), Some(&Node::scalar("49")));
		assert_eq!(*before, Node::empty_mapping());
	}

	#[test]
	fn test_detached_identities_are_unique() {
		let a = Document::detached(Node::empty_mapping());
		let b = Document::detached(Node::empty_mapping());
		assert_ne!(a.identity(), b.identity());
		assert!(a.path().is_none());
	}
}
