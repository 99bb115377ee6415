use crate::access::field::{Field, Range};
use crate::access::Accessor;
use crate::error::{Result, SpecError};
use crate::spawn::{Constructor, Context, Spawner};
use crate::spec::{CellState, Resolved, Spec};
use crate::store::DocPath;
use crate::tree::Node;
use indexmap::IndexMap;
use std::sync::Arc;

/// Reads real values through a spec's base chain.
pub struct Resolver<'c> {
	ctx: &'c Context,
	spec: Arc<Spec>,
	prefix: Vec<String>,
}

impl<'c> Resolver<'c> {
	pub fn new(ctx: &'c Context, spec: Arc<Spec>) -> Self {
		Self {
			ctx,
			spec,
			prefix: Vec::new(),
		}
	}

	pub fn spec(&self) -> &Arc<Spec> {
		&self.spec
	}

	fn path(&self, key: &str) -> Vec<String> {
		let mut path = self.prefix.clone();
		path.push(key.to_string());
		path
	}

	fn nested(&self, prefix: Vec<String>) -> Self {
		Self {
			ctx: self.ctx,
			spec: self.spec.clone(),
			prefix,
		}
	}

	fn decode<T: Field>(&self, path: &[String], node: &Node) -> Result<T> {
		let identity = self.spec.node_identity(path);
		let text = node.as_scalar(&identity)?;
		T::decode(text).ok_or_else(|| SpecError::InvalidValue {
			identity,
			expected: T::TAG.to_string(),
			value: text.to_string(),
		})
	}
}

impl Accessor for Resolver<'_> {
	fn is_molding(&self) -> bool {
		false
	}

	fn scalar<T: Field>(&mut self, key: &str, default: Option<T>) -> Result<T> {
		let path = self.path(key);
		let node = match default {
			None => self.spec.get(&path)?,
			Some(default) => {
				let fetched = self.spec.get_or(&path, Node::scalar(default.encode()))?;
				if fetched.was_inserted() {
					tracing::debug!(field = %self.spec.node_identity(&path), "default written back");
				}
				fetched.into_inner()
			}
		};
		self.decode(&path, &node)
	}

	fn range(&mut self, key: &str, range: &Range, default: Option<f64>) -> Result<f64> {
		let value: f64 = self.scalar(key, default)?;
		if !range.contains(value) {
			return Err(SpecError::OutOfRange {
				identity: self.spec.node_identity(&self.path(key)),
				value,
				range: range.to_string(),
			});
		}
		Ok(value)
	}

	fn choice(&mut self, key: &str, candidates: &[String], default: Option<&str>) -> Result<String> {
		let value: String = self.scalar(key, default.map(str::to_string))?;
		if !candidates.contains(&value) {
			return Err(SpecError::InvalidChoice {
				identity: self.spec.node_identity(&self.path(key)),
				value,
				candidates: candidates.to_vec(),
			});
		}
		Ok(value)
	}

	fn list<T: Field>(&mut self, key: &str, fill: Option<T>) -> Result<Vec<T>> {
		let path = self.path(key);
		let nodes = match &fill {
			None => self.spec.read_list(&path)?,
			Some(fill) => self.spec.read_list_or(&path, Node::scalar(fill.encode()))?,
		};

		let identity = self.spec.node_identity(&path);
		nodes
			.iter()
			.enumerate()
			.map(|(index, node)| {
				let reason = match node {
					Node::Scalar(text) => match T::decode(text) {
						Some(value) => return Ok(value),
						None => format!("expected {}, found {text:?}", T::TAG),
					},
					other => format!("expected scalar, found {}", other.kind()),
				};
				Err(SpecError::InvalidListEntry {
					identity: identity.clone(),
					key: index.to_string(),
					reason,
				})
			})
			.collect()
	}

	fn dict<T: Field>(&mut self, key: &str) -> Result<IndexMap<String, T>> {
		let path = self.path(key);
		let Some(entries) = self.spec.entries(&path)? else {
			return Ok(IndexMap::new());
		};
		entries
			.into_iter()
			.map(|(name, node)| {
				let mut entry_path = path.clone();
				entry_path.push(name.clone());
				let value = self.decode(&entry_path, &node)?;
				Ok((name, value))
			})
			.collect()
	}

	fn choice_dict(&mut self, key: &str, candidates: &[String]) -> Result<IndexMap<String, String>> {
		let values: IndexMap<String, String> = self.dict(key)?;
		for (name, value) in &values {
			if !candidates.contains(value) {
				let mut entry_path = self.path(key);
				entry_path.push(name.clone());
				return Err(SpecError::InvalidChoice {
					identity: self.spec.node_identity(&entry_path),
					value: value.clone(),
					candidates: candidates.to_vec(),
				});
			}
		}
		Ok(values)
	}

	fn keys(&mut self, key: &str) -> Result<Vec<String>> {
		self.spec.keys(&self.path(key))
	}

	fn section<R>(&mut self, key: &str, build: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
		let mut nested = self.nested(self.path(key));
		build(&mut nested)
	}

	fn entries<R>(
		&mut self,
		key: &str,
		mut build: impl FnMut(&str, &mut Self) -> Result<R>,
	) -> Result<IndexMap<String, R>> {
		let path = self.path(key);
		let mut built = IndexMap::new();
		for name in self.spec.keys(&path)? {
			let mut entry_path = path.clone();
			entry_path.push(name.clone());
			let mut nested = self.nested(entry_path);
			let value = build(&name, &mut nested)?;
			built.insert(name, value);
		}
		Ok(built)
	}

	fn items<R>(&mut self, key: &str, mut build: impl FnMut(&mut Self) -> Result<R>) -> Result<Vec<R>> {
		let path = self.path(key);
		let cells = self.spec.list_cells(&path)?.unwrap_or_default();
		cells
			.into_iter()
			.filter(|cell| matches!(cell.state, CellState::Value(_)))
			.map(|cell| {
				let mut item_path = path.clone();
				item_path.push(cell.key);
				build(&mut self.nested(item_path))
			})
			.collect()
	}

	fn interior<T: Spawner>(&mut self, key: &str) -> Result<T::Output> {
		let mut nested = self.nested(self.path(key));
		T::build(&mut nested)
	}

	fn exterior<T: Spawner>(&mut self, key: &str) -> Result<Arc<T::Output>> {
		let path = self.path(key);
		let (reference, owner) = match self.spec.lookup(&path)? {
			Resolved::Found { node, owner } => {
				let identity = self.spec.node_identity(&path);
				(node.as_scalar(&identity)?.to_string(), owner)
			}
			_ => {
				return Err(SpecError::KeyUndefined {
					identity: self.spec.node_identity(&self.prefix),
					key: key.to_string(),
				});
			}
		};

		// References are relative to the document that wrote them.
		let target = match owner.document().path() {
			Some(from) => from.resolve(&reference)?,
			None => DocPath::parse(&reference)?,
		};
		let spec = self.ctx.open_at(&target)?;
		Constructor::<T>::new(spec).spawn(self.ctx)
	}
}
