use crate::access::field::{Field, Range, choice_tag, with_default};
use crate::access::Accessor;
use crate::error::{Result, SpecError};
use crate::spawn::{Context, Spawner};
use crate::spec::{CellState, Document, KIND_KEY, PROPERTIES_KEY, Resolved, SPAWNER_KEY, Spec};
use crate::store::DocPath;
use crate::tree::Node;
use indexmap::IndexMap;
use std::any::TypeId;
use std::sync::Arc;

/// Placeholder key standing in for every entry of a collection with no
/// live keys to mold against.
const PLACEHOLDER_KEY: &str = "";

/// Records the schema implied by construction code instead of reading values.
///
/// Scalars are recorded as type tags. Nested calls get a fresh `Molder`
/// whose schema is merged under their key. With a backing spec, collection
/// accessors iterate its live keys so nested schema follows the real data.
pub struct Molder<'c> {
	ctx: &'c Context,
	backing: Option<Arc<Spec>>,
	prefix: Vec<String>,
	lineage: Vec<TypeId>,
	schema: IndexMap<String, Node>,
}

/// Mold spawner `T` into a detached schema document.
pub fn mold<T: Spawner>(ctx: &Context, backing: Option<&Arc<Spec>>) -> Result<Document> {
	let mut molder = Molder::new(ctx, backing.cloned(), vec![TypeId::of::<T>()]);
	T::build(&mut molder)?;
	tracing::debug!(spawner = T::TAG, "molded schema");

	let mut root = IndexMap::new();
	root.insert(KIND_KEY.to_string(), Node::scalar("Spec"));
	root.insert(SPAWNER_KEY.to_string(), Node::scalar(T::TAG));
	root.insert(PROPERTIES_KEY.to_string(), molder.into_schema());
	Ok(Document::detached(Node::Mapping(root)))
}

impl<'c> Molder<'c> {
	fn new(ctx: &'c Context, backing: Option<Arc<Spec>>, lineage: Vec<TypeId>) -> Self {
		Self {
			ctx,
			backing,
			prefix: Vec::new(),
			lineage,
			schema: IndexMap::new(),
		}
	}

	/// The recorded schema as a mapping node.
	pub fn into_schema(self) -> Node {
		Node::Mapping(self.schema)
	}

	fn path(&self, key: &str) -> Vec<String> {
		let mut path = self.prefix.clone();
		path.push(key.to_string());
		path
	}

	fn nested(&self, prefix: Vec<String>) -> Self {
		Self {
			ctx: self.ctx,
			backing: self.backing.clone(),
			prefix,
			lineage: self.lineage.clone(),
			schema: IndexMap::new(),
		}
	}

	fn record(&mut self, key: &str, node: Node) {
		self.schema.insert(key.to_string(), node);
	}

	fn enter<T: Spawner>(&self) -> Result<Vec<TypeId>> {
		let id = TypeId::of::<T>();
		if self.lineage.contains(&id) {
			return Err(SpecError::RecursiveSchema {
				spawner: T::TAG.to_string(),
			});
		}
		let mut lineage = self.lineage.clone();
		lineage.push(id);
		Ok(lineage)
	}

	fn live_keys(&self, path: &[String]) -> Result<Vec<String>> {
		let keys = match &self.backing {
			Some(backing) => backing.keys(path)?,
			None => Vec::new(),
		};
		Ok(placeholder_if_empty(keys))
	}

	fn live_items(&self, path: &[String]) -> Result<Vec<String>> {
		let keys = match &self.backing {
			Some(backing) => backing
				.list_cells(path)?
				.unwrap_or_default()
				.into_iter()
				.filter(|cell| matches!(cell.state, CellState::Value(_)))
				.map(|cell| cell.key)
				.collect(),
			None => Vec::new(),
		};
		Ok(placeholder_if_empty(keys))
	}

	/// The spec an exterior reference points at, when the backing has one.
	fn exterior_backing(&self, path: &[String]) -> Result<Option<Arc<Spec>>> {
		let Some(backing) = &self.backing else {
			return Ok(None);
		};
		let (reference, from) = match backing.lookup(path)? {
			Resolved::Found {
				node: Node::Scalar(reference),
				owner,
			} => (reference, owner.document().path().cloned()),
			_ => return Ok(None),
		};
		let target = match from {
			Some(from) => from.resolve(&reference)?,
			None => DocPath::parse(&reference)?,
		};
		self.ctx.open_at(&target).map(Some)
	}
}

fn placeholder_if_empty(keys: Vec<String>) -> Vec<String> {
	if keys.is_empty() {
		vec![PLACEHOLDER_KEY.to_string()]
	} else {
		keys
	}
}

impl Accessor for Molder<'_> {
	fn is_molding(&self) -> bool {
		true
	}

	fn scalar<T: Field>(&mut self, key: &str, default: Option<T>) -> Result<T> {
		let tag = with_default(T::TAG.to_string(), default.as_ref().map(Field::encode));
		self.record(key, Node::scalar(tag));
		Ok(default.unwrap_or_default())
	}

	fn range(&mut self, key: &str, range: &Range, default: Option<f64>) -> Result<f64> {
		let tag = with_default(range.tag(), default.as_ref().map(Field::encode));
		self.record(key, Node::scalar(tag));
		Ok(default.unwrap_or(range.low))
	}

	fn choice(&mut self, key: &str, candidates: &[String], default: Option<&str>) -> Result<String> {
		let tag = with_default(choice_tag(candidates), default.map(str::to_string));
		self.record(key, Node::scalar(tag));
		Ok(default
			.map(str::to_string)
			.or_else(|| candidates.first().cloned())
			.unwrap_or_default())
	}

	fn list<T: Field>(&mut self, key: &str, fill: Option<T>) -> Result<Vec<T>> {
		let tag = with_default(format!("List,{}", T::TAG), fill.as_ref().map(Field::encode));
		self.record(key, Node::scalar(tag));
		Ok(Vec::new())
	}

	fn dict<T: Field>(&mut self, key: &str) -> Result<IndexMap<String, T>> {
		self.record(key, Node::scalar(format!("Dict,{}", T::TAG)));
		Ok(IndexMap::new())
	}

	fn choice_dict(&mut self, key: &str, candidates: &[String]) -> Result<IndexMap<String, String>> {
		self.record(key, Node::scalar(format!("Dict,{}", choice_tag(candidates))));
		Ok(IndexMap::new())
	}

	fn keys(&mut self, key: &str) -> Result<Vec<String>> {
		// A structured accessor on the same key records more detail.
		if !self.schema.contains_key(key) {
			self.record(key, Node::scalar("Dict"));
		}
		self.live_keys(&self.path(key))
	}

	fn section<R>(&mut self, key: &str, build: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
		let mut nested = self.nested(self.path(key));
		let result = build(&mut nested)?;
		self.record(key, nested.into_schema());
		Ok(result)
	}

	fn entries<R>(
		&mut self,
		key: &str,
		mut build: impl FnMut(&str, &mut Self) -> Result<R>,
	) -> Result<IndexMap<String, R>> {
		let path = self.path(key);
		let mut schema = IndexMap::new();
		let mut built = IndexMap::new();
		for name in self.live_keys(&path)? {
			let mut entry_path = path.clone();
			entry_path.push(name.clone());
			let mut nested = self.nested(entry_path);
			built.insert(name.clone(), build(&name, &mut nested)?);
			schema.insert(name, nested.into_schema());
		}
		self.record(key, Node::Mapping(schema));
		Ok(built)
	}

	fn items<R>(&mut self, key: &str, mut build: impl FnMut(&mut Self) -> Result<R>) -> Result<Vec<R>> {
		let path = self.path(key);
		let mut schema = IndexMap::new();
		let mut built = Vec::new();
		for cell_key in self.live_items(&path)? {
			let mut item_path = path.clone();
			item_path.push(cell_key.clone());
			let mut nested = self.nested(item_path);
			built.push(build(&mut nested)?);
			schema.insert(cell_key, nested.into_schema());
		}
		self.record(key, Node::Mapping(schema));
		Ok(built)
	}

	fn interior<T: Spawner>(&mut self, key: &str) -> Result<T::Output> {
		let mut nested = self.nested(self.path(key));
		nested.lineage = self.enter::<T>()?;
		let output = T::build(&mut nested)?;
		self.record(key, nested.into_schema());
		Ok(output)
	}

	fn exterior<T: Spawner>(&mut self, key: &str) -> Result<Arc<T::Output>> {
		let lineage = self.enter::<T>()?;
		let backing = self.exterior_backing(&self.path(key))?;
		let mut nested = Molder::new(self.ctx, backing, lineage);
		let output = T::build(&mut nested)?;

		let mut reference = IndexMap::new();
		reference.insert(SPAWNER_KEY.to_string(), Node::scalar(T::TAG));
		reference.insert(PROPERTIES_KEY.to_string(), nested.into_schema());
		self.record(key, Node::Mapping(reference));
		Ok(Arc::new(output))
	}
}
