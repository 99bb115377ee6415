use crate::error::{Result, SpecError};
use crate::spec::document::{Document, PROPERTIES_KEY};
use crate::spec::list::{self, Cell, CellState};
use crate::tree::{Fetched, Node, NodeKind, identity};
use indexmap::IndexMap;
use std::sync::Arc;

/// Sentinel deleting a key at this level and below.
pub const HIDDEN: &str = "__HIDDEN__";

/// Sentinel freezing a key to the caller's default.
pub const HELD: &str = "__HELD__";

/// What a single level stores for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
	Present(Node),
	Hidden,
	Held,
	Absent,
}

/// Outcome of resolving a key through the base chain.
#[derive(Debug)]
pub enum Resolved<'a> {
	/// The value and the level that supplied it.
	Found { node: Node, owner: &'a Spec },
	Hidden,
	Held,
	Absent,
}

fn marker(node: &Node) -> Option<Slot> {
	match node {
		Node::Scalar(value) if value == HIDDEN => Some(Slot::Hidden),
		Node::Scalar(value) if value == HELD => Some(Slot::Held),
		_ => None,
	}
}

fn is_marker(value: &str) -> bool {
	value == HIDDEN || value == HELD
}

fn classify_cell(node: &Node) -> CellState {
	match marker(node) {
		Some(Slot::Hidden) => CellState::Hidden,
		Some(Slot::Held) => CellState::Held,
		_ => CellState::Value(node.clone()),
	}
}

fn keys_of<S: AsRef<str>>(path: &[S]) -> Vec<String> {
	path.iter().map(|key| key.as_ref().to_string()).collect()
}

/// A layered view over one document and its base chain.
///
/// Each level owns its own key set; lookups forward to the base only when
/// this level has no entry at all.
#[derive(Debug)]
pub struct Spec {
	doc: Arc<Document>,
	base: Option<Arc<Spec>>,
}

impl Spec {
	pub fn new(doc: Arc<Document>, base: Option<Arc<Spec>>) -> Self {
		Self { doc, base }
	}

	/// A base-less spec over an in-memory tree.
	pub fn detached(root: Node) -> Self {
		Self::new(Arc::new(Document::detached(root)), None)
	}

	pub fn document(&self) -> &Arc<Document> {
		&self.doc
	}

	pub fn base(&self) -> Option<&Arc<Spec>> {
		self.base.as_ref()
	}

	pub fn identity(&self) -> &str {
		self.doc.identity()
	}

	pub fn spawner_tag(&self) -> Result<Option<String>> {
		self.doc.spawner_tag()
	}

	pub fn base_reference(&self) -> Result<Option<String>> {
		self.doc.base_reference()
	}

	/// This spec followed by each base, most derived first.
	pub fn levels(&self) -> impl Iterator<Item = &Spec> {
		std::iter::successors(Some(self), |spec| spec.base.as_deref())
	}

	fn full_path<S: AsRef<str>>(path: &[S]) -> Vec<String> {
		let mut full = vec![PROPERTIES_KEY.to_string()];
		full.extend(keys_of(path));
		full
	}

	/// Diagnostic identity of `path` below `properties` in this document.
	pub fn node_identity<S: AsRef<str>>(&self, path: &[S]) -> String {
		identity(self.identity(), &Self::full_path(path))
	}

	/// The state of `path` at this level only.
	///
	/// A marker stored at an intermediate key covers everything below it.
	pub fn slot<S: AsRef<str>>(&self, path: &[S]) -> Result<Slot> {
		let root = self.doc.snapshot();
		let Some(mut node) = root.get(PROPERTIES_KEY) else {
			return Ok(Slot::Absent);
		};

		for (depth, key) in path.iter().enumerate() {
			if let Some(found) = marker(node) {
				return Ok(found);
			}
			match node {
				Node::Mapping(entries) => match entries.get(key.as_ref()) {
					Some(child) => node = child,
					None => return Ok(Slot::Absent),
				},
				other => {
					return Err(SpecError::TypeMismatch {
						expected: NodeKind::Mapping,
						actual: other.kind(),
						identity: self.node_identity(&path[..depth]),
					});
				}
			}
		}

		Ok(marker(node).unwrap_or_else(|| Slot::Present(node.clone())))
	}

	/// Resolve `path` through the base chain.
	pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Result<Resolved<'_>> {
		for level in self.levels() {
			match level.slot(path)? {
				Slot::Present(node) => {
					tracing::trace!(spec = %self.identity(), owner = %level.identity(), "resolved");
					return Ok(Resolved::Found { node, owner: level });
				}
				Slot::Hidden => return Ok(Resolved::Hidden),
				Slot::Held => return Ok(Resolved::Held),
				Slot::Absent => {}
			}
		}
		Ok(Resolved::Absent)
	}

	fn undefined<S: AsRef<str>>(&self, path: &[S]) -> SpecError {
		let (key, parent) = match path.split_last() {
			Some((key, parent)) => (key.as_ref().to_string(), self.node_identity(parent)),
			None => (PROPERTIES_KEY.to_string(), identity::<&str>(self.identity(), &[])),
		};
		SpecError::KeyUndefined {
			identity: parent,
			key,
		}
	}

	/// Effective value; hidden, held and absent keys are undefined.
	pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Result<Node> {
		match self.lookup(path)? {
			Resolved::Found { node, .. } => Ok(node),
			_ => Err(self.undefined(path)),
		}
	}

	/// Effective value, falling back to `default`.
	///
	/// When no level has any entry the default is also written into this
	/// spec (never into a base) and reported as [`Fetched::Inserted`]. Hidden
	/// and held keys return the default without writing, so markers survive.
	pub fn get_or<S: AsRef<str>>(&self, path: &[S], default: Node) -> Result<Fetched<Node>> {
		match self.lookup(path)? {
			Resolved::Found { node, .. } => Ok(Fetched::Found(node)),
			Resolved::Hidden | Resolved::Held => Ok(Fetched::Found(default)),
			Resolved::Absent => {
				self.refuse_marker(path, &default)?;
				self.write(path, default.clone())?;
				Ok(Fetched::Inserted(default))
			}
		}
	}

	/// Write a value at this level. Override markers cannot be set this way.
	pub fn set<S: AsRef<str>>(&self, path: &[S], value: Node) -> Result<()> {
		self.refuse_marker(path, &value)?;
		self.write(path, value)
	}

	/// Markers are only written through `hide`/`hold` and their list forms.
	fn refuse_marker<S: AsRef<str>>(&self, path: &[S], value: &Node) -> Result<()> {
		match value {
			Node::Scalar(text) if is_marker(text) => Err(SpecError::InvalidValue {
				identity: self.node_identity(path),
				expected: "a value other than an override marker".to_string(),
				value: text.clone(),
			}),
			_ => Ok(()),
		}
	}

	/// Writing below a marker replaces the marker with a mapping.
	fn write<S: AsRef<str>>(&self, path: &[S], value: Node) -> Result<()> {
		let full = Self::full_path(path);
		let Some((last, parents)) = full.split_last() else {
			return Ok(());
		};
		let document = self.identity().to_string();

		self.doc.update(|root| {
			let parent = root.ensure_mapping_path_mut(&document, parents, is_marker)?;
			parent.insert(last.clone(), value);
			Ok(())
		})
	}

	/// Delete the entry at this level so reads fall through to the base.
	pub fn remove<S: AsRef<str>>(&self, path: &[S]) -> Result<bool> {
		let full = Self::full_path(path);
		let Some((last, parents)) = full.split_last() else {
			return Ok(false);
		};

		self.doc.update(|root| {
			let mut node = root;
			for key in parents {
				match node {
					Node::Mapping(entries) => match entries.get_mut(key) {
						Some(child) => node = child,
						None => return Ok(false),
					},
					_ => return Ok(false),
				}
			}
			match node {
				Node::Mapping(entries) => Ok(entries.shift_remove(last).is_some()),
				_ => Ok(false),
			}
		})
	}

	/// Mark `path` deleted at this level, blocking the base.
	pub fn hide<S: AsRef<str>>(&self, path: &[S]) -> Result<()> {
		self.write(path, Node::scalar(HIDDEN))
	}

	/// Freeze `path` to the caller's default at this level, blocking the base.
	pub fn hold<S: AsRef<str>>(&self, path: &[S]) -> Result<()> {
		self.write(path, Node::scalar(HELD))
	}

	/// Merged entries of a nested mapping.
	///
	/// Derived keys come first in their own order, then keys only a base has.
	/// Hidden and held entries are left out. `None` when no level defines it.
	pub fn entries<S: AsRef<str>>(&self, path: &[S]) -> Result<Option<IndexMap<String, Node>>> {
		let mut merged: IndexMap<String, Option<Node>> = IndexMap::new();
		let mut defined = false;

		for level in self.levels() {
			match level.slot(path)? {
				Slot::Present(Node::Mapping(entries)) => {
					defined = true;
					for (key, value) in entries {
						if !merged.contains_key(&key) {
							let visible = marker(&value).is_none().then_some(value);
							merged.insert(key, visible);
						}
					}
				}
				Slot::Present(other) => {
					return Err(SpecError::TypeMismatch {
						expected: NodeKind::Mapping,
						actual: other.kind(),
						identity: level.node_identity(path),
					});
				}
				Slot::Hidden | Slot::Held => break,
				Slot::Absent => {}
			}
		}

		if !defined {
			return Ok(None);
		}
		Ok(Some(
			merged
				.into_iter()
				.filter_map(|(key, value)| value.map(|value| (key, value)))
				.collect(),
		))
	}

	/// Merged key names of a nested mapping; empty when undefined.
	pub fn keys<S: AsRef<str>>(&self, path: &[S]) -> Result<Vec<String>> {
		Ok(self
			.entries(path)?
			.map(|entries| entries.into_keys().collect())
			.unwrap_or_default())
	}

	/// Merged list cells, markers included, sorted by position.
	///
	/// The chain is walked until a level hides or holds the whole field.
	/// `None` when no level defines the field.
	pub fn list_cells<S: AsRef<str>>(&self, path: &[S]) -> Result<Option<Vec<Cell>>> {
		let mut levels = Vec::new();

		for level in self.levels() {
			match level.slot(path)? {
				Slot::Present(Node::Mapping(entries)) => {
					let ident = level.node_identity(path);
					levels.push(list::decode_level(&entries, &ident, classify_cell)?);
				}
				Slot::Present(other) => {
					return Err(SpecError::TypeMismatch {
						expected: NodeKind::Mapping,
						actual: other.kind(),
						identity: level.node_identity(path),
					});
				}
				Slot::Hidden | Slot::Held => break,
				Slot::Absent => {}
			}
		}

		if levels.is_empty() {
			return Ok(None);
		}
		Ok(Some(list::merge_levels(levels)))
	}

	/// Ordered list values. Hidden and held cells are dropped.
	pub fn read_list<S: AsRef<str>>(&self, path: &[S]) -> Result<Vec<Node>> {
		let cells = self
			.list_cells(path)?
			.ok_or_else(|| self.undefined(path))?;
		Ok(cells
			.into_iter()
			.filter_map(|cell| match cell.state {
				CellState::Value(node) => Some(node),
				CellState::Hidden | CellState::Held => None,
			})
			.collect())
	}

	/// Ordered list values where held cells become `fill` at their slot.
	/// Hidden cells are dropped; an undefined field is an empty list.
	pub fn read_list_or<S: AsRef<str>>(&self, path: &[S], fill: Node) -> Result<Vec<Node>> {
		let cells = self.list_cells(path)?.unwrap_or_default();
		Ok(cells
			.into_iter()
			.filter_map(|cell| match cell.state {
				CellState::Value(node) => Some(node),
				CellState::Held => Some(fill.clone()),
				CellState::Hidden => None,
			})
			.collect())
	}

	/// Replace this level's list with keys `0..N-1`. Base cells are untouched;
	/// an empty list removes the field at this level.
	pub fn write_list<S: AsRef<str>>(&self, path: &[S], values: Vec<Node>) -> Result<()> {
		tracing::debug!(
			spec = %self.identity(),
			field = %self.node_identity(path),
			len = values.len(),
			"list overwrite"
		);
		for (index, value) in values.iter().enumerate() {
			let mut cell_path = keys_of(path);
			cell_path.push(index.to_string());
			self.refuse_marker(&cell_path, value)?;
		}
		match list::encode(values) {
			Some(node) => self.write(path, node),
			None => self.remove(path).map(|_| ()),
		}
	}

	fn visible_cells<S: AsRef<str>>(&self, path: &[S]) -> Result<(Vec<Cell>, Vec<Cell>)> {
		let all = self.list_cells(path)?.unwrap_or_default();
		let visible = all
			.iter()
			.filter(|cell| matches!(cell.state, CellState::Value(_)))
			.cloned()
			.collect();
		Ok((all, visible))
	}

	/// Insert `value` so it reads back at `index` of the plain list, using a
	/// fractional key at this level. Indices past the end append.
	pub fn insert_list_entry<S: AsRef<str>>(
		&self,
		path: &[S],
		index: usize,
		value: Node,
	) -> Result<String> {
		let (all, visible) = self.visible_cells(path)?;
		let high = visible.get(index).map(|cell| &cell.position);
		let low = all
			.iter()
			.map(|cell| &cell.position)
			.filter(|position| high.is_none_or(|high| *position < high))
			.max();

		let key = list::key_between(low, high);
		let mut cell_path = keys_of(path);
		cell_path.push(key.clone());
		self.refuse_marker(&cell_path, &value)?;
		self.write(&cell_path, value)?;
		Ok(key)
	}

	fn mark_list_entry<S: AsRef<str>>(&self, path: &[S], index: usize, mark: &str) -> Result<()> {
		let (_, visible) = self.visible_cells(path)?;
		let cell = visible.get(index).ok_or_else(|| SpecError::KeyUndefined {
			identity: self.node_identity(path),
			key: index.to_string(),
		})?;
		let mut cell_path = keys_of(path);
		cell_path.push(cell.key.clone());
		self.write(&cell_path, Node::scalar(mark))
	}

	/// Hide the entry currently read back at `index`.
	pub fn hide_list_entry<S: AsRef<str>>(&self, path: &[S], index: usize) -> Result<()> {
		self.mark_list_entry(path, index, HIDDEN)
	}

	/// Hold the entry currently read back at `index`.
	pub fn hold_list_entry<S: AsRef<str>>(&self, path: &[S], index: usize) -> Result<()> {
		self.mark_list_entry(path, index, HELD)
	}
}
