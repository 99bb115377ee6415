use crate::config::MergedConfig;
use crate::error::{Result, SpecError};
use crate::spawn::cache::SpawnCache;
use crate::spec::{Document, Spec};
use crate::store::{DiskFs, DocPath, FileSystem};
use crate::tree::{Formatter, Node};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Loading and saving behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
	/// Missing documents load as empty instead of failing.
	pub accept_empty: bool,

	/// Omit empty collections when saving.
	pub collapse_empty: bool,

	/// Bare token written in place of empty mappings when saving, and read
	/// back as an empty mapping when loading.
	pub empty_placeholder: Option<String>,
}

/// Everything an engine run shares: the I/O boundary, loaded documents
/// and the singleton cache.
pub struct Context {
	fs: Arc<dyn FileSystem>,
	options: Options,
	documents: Mutex<HashMap<DocPath, Arc<Document>>>,
	cache: SpawnCache,
}

impl Context {
	pub fn new(fs: Arc<dyn FileSystem>) -> Self {
		Self {
			fs,
			options: Options::default(),
			documents: Mutex::new(HashMap::new()),
			cache: SpawnCache::new(),
		}
	}

	pub fn with_options(mut self, options: Options) -> Self {
		self.options = options;
		self
	}

	/// A disk-backed context for merged settings.
	pub fn from_config(config: &MergedConfig) -> Self {
		let options = Options {
			accept_empty: config.accept_empty,
			collapse_empty: config.collapse_empty,
			empty_placeholder: config.empty_placeholder.clone(),
		};
		Self::new(Arc::new(DiskFs::new(config.data_dir.clone()))).with_options(options)
	}

	pub fn fs(&self) -> &dyn FileSystem {
		self.fs.as_ref()
	}

	pub fn options(&self) -> &Options {
		&self.options
	}

	pub fn cache(&self) -> &SpawnCache {
		&self.cache
	}

	pub fn formatter(&self) -> Formatter {
		Formatter::new()
			.collapse_empty(self.options.collapse_empty)
			.empty_placeholder(self.options.empty_placeholder.clone())
	}

	/// The shared document for `path`, loading it on first use.
	pub fn fetch(&self, path: &DocPath) -> Result<Arc<Document>> {
		let mut documents = self.documents.lock();
		if let Some(doc) = documents.get(path) {
			return Ok(doc.clone());
		}
		let doc = Arc::new(Document::load(
			self.fs(),
			path,
			self.options.accept_empty,
			self.options.empty_placeholder.as_deref(),
		)?);
		documents.insert(path.clone(), doc.clone());
		Ok(doc)
	}

	/// Open a document by path string. See [`Context::open_at`].
	pub fn open(&self, path: &str) -> Result<Arc<Spec>> {
		self.open_at(&DocPath::parse(path)?)
	}

	/// Open a document as a spec with its full base chain.
	pub fn open_at(&self, path: &DocPath) -> Result<Arc<Spec>> {
		let mut chain: Vec<Arc<Document>> = Vec::new();
		let mut visited: Vec<DocPath> = Vec::new();
		let mut current = path.clone();

		loop {
			if visited.contains(&current) {
				let mut names: Vec<String> = visited.iter().map(ToString::to_string).collect();
				names.push(current.to_string());
				return Err(SpecError::BaseCycle {
					chain: names.join(" -> "),
				});
			}
			let doc = self.fetch(&current)?;
			let base = doc.base_reference()?;
			visited.push(current.clone());
			chain.push(doc);
			match base {
				Some(reference) => current = current.resolve(&reference)?,
				None => break,
			}
		}

		tracing::debug!(document = %path, depth = chain.len(), "base chain resolved");
		chain
			.into_iter()
			.rev()
			.fold(None, |base, doc| Some(Arc::new(Spec::new(doc, base))))
			.ok_or_else(|| SpecError::ResourceNotFound {
				path: path.to_string(),
			})
	}

	/// Register a new in-memory document at `path`. Nothing is written until
	/// it is saved.
	pub fn create(&self, path: &DocPath, root: Node) -> Arc<Document> {
		let doc = Arc::new(Document::new(path.clone(), root));
		self.documents.lock().insert(path.clone(), doc.clone());
		doc
	}

	pub fn save(&self, doc: &Document) -> Result<()> {
		if let Some(parent) = doc.path().map(DocPath::parent)
			&& !parent.is_root()
			&& !self.fs.exists(&parent)
		{
			self.fs.create_dir(&parent)?;
		}
		doc.save(self.fs(), &self.formatter())
	}
}

impl std::fmt::Debug for Context {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Context")
			.field("options", &self.options)
			.field("documents", &self.documents.lock().len())
			.field("cache", &self.cache)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::MemoryFs;

	fn context(files: &[(&str, &str)]) -> Context {
		let fs = files
			.iter()
			.fold(MemoryFs::new(), |fs, (path, text)| fs.with_file(path, text).unwrap());
		Context::new(Arc::new(fs))
	}

	#[test]
	fn test_open_builds_base_chain() {
		let ctx = context(&[
			("units/a.spec", "\"base\": \"../common/b.spec\"\n"),
			("common/b.spec", "\"base\": \"/root.spec\"\n"),
			("root.spec", "{}"),
		]);
		let spec = ctx.open("units/a.spec").unwrap();
		let names: Vec<_> = spec.levels().map(|level| level.identity().to_string()).collect();
		assert_eq!(names, vec!["units/a.spec", "common/b.spec", "root.spec"]);
	}

	#[test]
	fn test_documents_are_shared() {
		let ctx = context(&[("a.spec", "\"base\": \"b.spec\"\n"), ("b.spec", "{}")]);
		let a = ctx.open("a.spec").unwrap();
		let b = ctx.open("b.spec").unwrap();
		assert!(Arc::ptr_eq(a.base().unwrap().document(), b.document()));
	}

	#[test]
	fn test_base_cycle() {
		let ctx = context(&[
			("a.spec", "\"base\": \"b.spec\"\n"),
			("b.spec", "\"base\": \"a.spec\"\n"),
		]);
		match ctx.open("a.spec").unwrap_err() {
			SpecError::BaseCycle { chain } => assert_eq!(chain, "a.spec -> b.spec -> a.spec"),
			other => panic!("Expected BaseCycle, got {other:?}"),
		}
	}

	#[test]
	fn test_missing_base() {
		let ctx = context(&[("a.spec", "\"base\": \"gone.spec\"\n")]);
		assert!(matches!(
			ctx.open("a.spec"),
			Err(SpecError::ResourceNotFound { .. })
		));

		let lenient = context(&[("a.spec", "\"base\": \"gone.spec\"\n")]).with_options(Options {
			accept_empty: true,
			..Options::default()
		});
		assert_eq!(lenient.open("a.spec").unwrap().levels().count(), 2);
	}

	#[test]
	fn test_create_and_save_uses_formatter() {
		let fs = Arc::new(MemoryFs::new());
		let ctx = Context::new(fs.clone()).with_options(Options {
			collapse_empty: true,
			..Options::default()
		});
		let path = DocPath::parse("out/new.spec").unwrap();
		let doc = ctx.create(&path, parse_root());
		ctx.save(&doc).unwrap();

		assert_eq!(fs.contents("out/new.spec").unwrap(), "\"spawner\": \"Tank\"\n");
		assert!(Arc::ptr_eq(&ctx.fetch(&path).unwrap(), &doc));
	}

	#[test]
	fn test_placeholder_survives_save_and_reload() {
		let fs = Arc::new(
			MemoryFs::new()
				.with_file("a.spec", "\"properties\":\n  \"modes\": {}\n  \"x\": \"1\"\n")
				.unwrap(),
		);
		let options = Options {
			empty_placeholder: Some("~".to_string()),
			..Options::default()
		};

		let ctx = Context::new(fs.clone()).with_options(options.clone());
		let spec = ctx.open("a.spec").unwrap();
		spec.set(&["x"], Node::scalar("2")).unwrap();
		spec.set(&["tilde"], Node::scalar("~")).unwrap();
		ctx.save(spec.document()).unwrap();
		assert_eq!(
			fs.contents("a.spec").unwrap(),
			"\"properties\":\n  \"modes\": ~\n  \"x\": \"2\"\n  \"tilde\": \"~\"\n"
		);

		let reopened = Context::new(fs.clone()).with_options(options).open("a.spec").unwrap();
		assert_eq!(reopened.keys(&["modes"]).unwrap(), Vec::<String>::new());
		assert!(reopened.read_list_or(&["modes"], Node::scalar("0")).unwrap().is_empty());
		assert_eq!(reopened.get(&["modes"]).unwrap(), Node::empty_mapping());
		assert_eq!(reopened.get(&["tilde"]).unwrap(), Node::scalar("~"));
	}

	fn parse_root() -> Node {
		crate::tree::parse("\"spawner\": \"Tank\"\n\"properties\": {}\n").unwrap()
	}
}
