use crate::error::{Result, SpecError};
use indexmap::IndexMap;
use std::fmt;

/// One node of a text tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
	Scalar(String),
	Sequence(Vec<Node>),
	Mapping(IndexMap<String, Node>),
}

/// The kind of a [`Node`], used in type-mismatch diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
	Scalar,
	Sequence,
	Mapping,
}

impl NodeKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			NodeKind::Scalar => "scalar",
			NodeKind::Sequence => "sequence",
			NodeKind::Mapping => "mapping",
		}
	}
}

impl fmt::Display for NodeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Outcome of a read-or-insert access.
///
/// `Inserted` means the default was written back into the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched<T> {
	Found(T),
	Inserted(T),
}

impl<T> Fetched<T> {
	pub fn into_inner(self) -> T {
		match self {
			Fetched::Found(value) | Fetched::Inserted(value) => value,
		}
	}

	pub fn was_inserted(&self) -> bool {
		matches!(self, Fetched::Inserted(_))
	}

	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
		match self {
			Fetched::Found(value) => Fetched::Found(f(value)),
			Fetched::Inserted(value) => Fetched::Inserted(f(value)),
		}
	}
}

/// Diagnostic identity of the node reached by `path` inside `document`.
pub fn identity<S: AsRef<str>>(document: &str, path: &[S]) -> String {
	let keys: Vec<&str> = path.iter().map(AsRef::as_ref).collect();
	format!("{}#{}", document, keys.join("/"))
}

impl Node {
	pub fn scalar(value: impl Into<String>) -> Self {
		Node::Scalar(value.into())
	}

	pub fn empty_mapping() -> Self {
		Node::Mapping(IndexMap::new())
	}

	pub fn kind(&self) -> NodeKind {
		match self {
			Node::Scalar(_) => NodeKind::Scalar,
			Node::Sequence(_) => NodeKind::Sequence,
			Node::Mapping(_) => NodeKind::Mapping,
		}
	}

	fn mismatch(&self, expected: NodeKind, identity: &str) -> SpecError {
		SpecError::TypeMismatch {
			expected,
			actual: self.kind(),
			identity: identity.to_string(),
		}
	}

	pub fn as_scalar(&self, identity: &str) -> Result<&str> {
		match self {
			Node::Scalar(value) => Ok(value),
			other => Err(other.mismatch(NodeKind::Scalar, identity)),
		}
	}

	pub fn as_sequence(&self, identity: &str) -> Result<&[Node]> {
		match self {
			Node::Sequence(items) => Ok(items),
			other => Err(other.mismatch(NodeKind::Sequence, identity)),
		}
	}

	pub fn as_mapping(&self, identity: &str) -> Result<&IndexMap<String, Node>> {
		match self {
			Node::Mapping(entries) => Ok(entries),
			other => Err(other.mismatch(NodeKind::Mapping, identity)),
		}
	}

	pub fn as_mapping_mut(&mut self, identity: &str) -> Result<&mut IndexMap<String, Node>> {
		match self {
			Node::Mapping(entries) => Ok(entries),
			other => Err(other.mismatch(NodeKind::Mapping, identity)),
		}
	}

	/// True for `{}` and `[]`.
	pub fn is_empty_collection(&self) -> bool {
		match self {
			Node::Scalar(_) => false,
			Node::Sequence(items) => items.is_empty(),
			Node::Mapping(entries) => entries.is_empty(),
		}
	}

	/// Entry of a mapping; `None` for absent keys and non-mapping nodes.
	pub fn get(&self, key: &str) -> Option<&Node> {
		match self {
			Node::Mapping(entries) => entries.get(key),
			_ => None,
		}
	}

	/// Entry of a mapping, failing on absence.
	pub fn child(&self, identity: &str, key: &str) -> Result<&Node> {
		self.as_mapping(identity)?
			.get(key)
			.ok_or_else(|| SpecError::KeyUndefined {
				identity: identity.to_string(),
				key: key.to_string(),
			})
	}

	/// Entry of a mapping; when absent, `default` is inserted and returned.
	pub fn child_or_insert(
		&mut self,
		identity: &str,
		key: &str,
		default: Node,
	) -> Result<Fetched<&Node>> {
		let entries = self.as_mapping_mut(identity)?;
		if entries.contains_key(key) {
			return Ok(Fetched::Found(&entries[key]));
		}
		entries.insert(key.to_string(), default);
		Ok(Fetched::Inserted(&entries[key]))
	}

	/// Follow `path` through nested mappings.
	pub fn at_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Node> {
		path.iter()
			.try_fold(self, |node, key| node.get(key.as_ref()))
	}

	/// Follow `path`, creating empty mappings where keys are missing.
	///
	/// `replace_scalar` decides whether a scalar met on the way may be
	/// overwritten with a mapping; otherwise it is a type mismatch.
	pub fn ensure_mapping_path_mut<S: AsRef<str>>(
		&mut self,
		document: &str,
		path: &[S],
		replace_scalar: impl Fn(&str) -> bool,
	) -> Result<&mut IndexMap<String, Node>> {
		let mut node = self;
		for (depth, key) in path.iter().enumerate() {
			let ident = identity(document, &path[..depth]);
			let entries = node.as_mapping_mut(&ident)?;
			let child = entries
				.entry(key.as_ref().to_string())
				.or_insert_with(Node::empty_mapping);
			if let Node::Scalar(value) = &*child
				&& replace_scalar(value)
			{
				*child = Node::empty_mapping();
			}
			node = child;
		}
		node.as_mapping_mut(&identity(document, path))
	}

	/// Insert into a mapping, returning the previous value.
	pub fn insert(&mut self, identity: &str, key: &str, value: Node) -> Result<Option<Node>> {
		Ok(self.as_mapping_mut(identity)?.insert(key.to_string(), value))
	}

	/// Remove from a mapping, keeping the order of the remaining entries.
	pub fn remove(&mut self, identity: &str, key: &str) -> Result<Option<Node>> {
		Ok(self.as_mapping_mut(identity)?.shift_remove(key))
	}
}

impl From<&str> for Node {
	fn from(value: &str) -> Self {
		Node::Scalar(value.to_string())
	}
}

impl From<String> for Node {
	fn from(value: String) -> Self {
		Node::Scalar(value)
	}
}
