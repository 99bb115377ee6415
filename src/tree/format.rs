use crate::tree::node::Node;
use crate::tree::parse::{BLOCK_MARKER, INDENT, ITEM_MARKER, is_placeholder_token};
use std::fmt::Write;

/// Canonical text writer for [`Node`] trees.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
	collapse_empty: bool,
	empty_placeholder: Option<String>,
}

/// Serialize with the canonical layout.
pub fn serialize(node: &Node, collapse_empty: bool) -> String {
	Formatter::new().collapse_empty(collapse_empty).format(node)
}

impl Formatter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Omit mapping entries whose value is an empty collection.
	pub fn collapse_empty(mut self, collapse: bool) -> Self {
		self.collapse_empty = collapse;
		self
	}

	/// Write empty mappings as this bare token instead of `{}`. Empty
	/// sequences keep `[]`. Tokens [`is_placeholder_token`] rejects are
	/// ignored; read the text back with
	/// [`parse_document_with`](crate::tree::parse::parse_document_with).
	pub fn empty_placeholder(mut self, placeholder: Option<String>) -> Self {
		self.empty_placeholder = placeholder.filter(|token| is_placeholder_token(token));
		self
	}

	pub fn placeholder(&self) -> Option<&str> {
		self.empty_placeholder.as_deref()
	}

	/// Canonical text for `node`.
	///
	/// Only collection roots round-trip through [`parse`](crate::tree::parse::parse).
	/// The text has no syntax for a bare root scalar, so one is written as a
	/// single sequence item and reads back as a one-item sequence.
	pub fn format(&self, node: &Node) -> String {
		let mut out = String::new();
		let root = if self.collapse_empty {
			collapse(node)
		} else {
			node.clone()
		};

		match &root {
			Node::Mapping(entries) if !entries.is_empty() => self.write_entries(&mut out, &root, 0),
			Node::Sequence(items) if !items.is_empty() => self.write_entries(&mut out, &root, 0),
			other => {
				self.write_inline(&mut out, other, 0, false);
			}
		}
		out
	}

	fn write_entries(&self, out: &mut String, node: &Node, indent: usize) {
		let pad = " ".repeat(indent);
		match node {
			Node::Mapping(entries) => {
				for (key, value) in entries {
					let _ = write!(out, "{pad}{}:", quote(key));
					self.write_inline(out, value, indent, true);
				}
			}
			Node::Sequence(items) => {
				for item in items {
					out.push_str(&pad);
					self.write_inline(out, item, indent, false);
				}
			}
			Node::Scalar(_) => self.write_inline(out, node, indent, false),
		}
	}

	/// Write the value part of a line at `indent`; `keyed` lines already end in `:`.
	fn write_inline(&self, out: &mut String, value: &Node, indent: usize, keyed: bool) {
		let sep = if keyed { " " } else { "" };
		match value {
			Node::Scalar(text) if is_block(text) => {
				let _ = writeln!(out, "{sep}{BLOCK_MARKER}");
				let pad = " ".repeat(indent + INDENT);
				for line in text.split('\n') {
					let _ = writeln!(out, "{pad}{line}");
				}
			}
			Node::Scalar(text) => {
				let _ = writeln!(out, "{sep}{}", quote(text));
			}
			collection if collection.is_empty_collection() => {
				let token = match (collection, &self.empty_placeholder) {
					(Node::Sequence(_), _) => "[]".to_string(),
					(_, Some(placeholder)) => placeholder.clone(),
					(_, None) => "{}".to_string(),
				};
				let _ = writeln!(out, "{sep}{token}");
			}
			collection => {
				if keyed {
					out.push('\n');
				} else {
					let _ = writeln!(out, "{ITEM_MARKER}");
				}
				self.write_entries(out, collection, indent + INDENT);
			}
		}
	}
}

/// Drop mapping entries that are, or collapse to, empty collections.
fn collapse(node: &Node) -> Node {
	match node {
		Node::Mapping(entries) => Node::Mapping(
			entries
				.iter()
				.map(|(key, value)| (key.clone(), collapse(value)))
				.filter(|(_, value)| !value.is_empty_collection())
				.collect(),
		),
		Node::Sequence(items) => Node::Sequence(items.iter().map(collapse).collect()),
		Node::Scalar(_) => node.clone(),
	}
}

fn is_block(text: &str) -> bool {
	text.contains('\n') && !text.contains('\r')
}

/// Double-quote and escape a scalar or key.
pub(crate) fn quote(text: &str) -> String {
	let mut out = String::with_capacity(text.len() + 2);
	out.push('"');
	for c in text.chars() {
		match c {
			'"' => out.push_str("\\\""),
			'\\' => out.push_str("\\\\"),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			'\t' => out.push_str("\\t"),
			c if c.is_control() => {
				let _ = write!(out, "\\u{:04x}", c as u32);
			}
			c => out.push(c),
		}
	}
	out.push('"');
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tree::parse::{parse, parse_document_with};
	use indexmap::IndexMap;

	const CANONICAL: &str = r#""base": "b.spec"
"spawner": "Tank"
"properties":
  "name": "heavy \"one\""
  "note": |+
    line one
      line two
  "list":
    "0": "10"
    "0.5": "15"
  "seq":
    "a"
    -
      "k": "v"
    -
      "x"
    []
  "empty": {}
"#;

	#[test]
	fn test_round_trip_canonical_text() {
		let node = parse(CANONICAL).unwrap();
		assert_eq!(serialize(&node, false), CANONICAL);
	}

	#[test]
	fn test_round_trip_tree() {
		let mut inner = IndexMap::new();
		inner.insert("multi".to_string(), Node::scalar("a\nb\n"));
		inner.insert("cr".to_string(), Node::scalar("a\r\nb"));
		inner.insert("ctl".to_string(), Node::scalar("bell\u{7}"));
		inner.insert("unicode".to_string(), Node::scalar("über ✓"));
		inner.insert(
			"nested".to_string(),
			Node::Sequence(vec![Node::Sequence(vec![Node::scalar("deep\nblock")])]),
		);
		let mut root = IndexMap::new();
		root.insert("properties".to_string(), Node::Mapping(inner));
		let tree = Node::Mapping(root);

		let text = serialize(&tree, false);
		assert_eq!(parse(&text).unwrap(), tree);
		assert_eq!(serialize(&parse(&text).unwrap(), false), text);
	}

	#[test]
	fn test_empty_root() {
		assert_eq!(serialize(&Node::empty_mapping(), false), "{}\n");
	}

	#[test]
	fn test_root_scalar_reads_back_as_sequence() {
		let text = serialize(&Node::scalar("x"), false);
		assert_eq!(text, "\"x\"\n");
		assert_eq!(parse(&text).unwrap(), Node::Sequence(vec![Node::scalar("x")]));
		assert_eq!(serialize(&parse(&text).unwrap(), false), text);
	}

	#[test]
	fn test_collapse_empty() {
		let node = parse(
			r#""a": {}
"b":
  "c": []
  "d": "1"
"e":
  "f": {}
"#,
		)
		.unwrap();
		assert_eq!(serialize(&node, true), "\"b\":\n  \"d\": \"1\"\n");
	}

	#[test]
	fn test_empty_placeholder() {
		let node = parse("\"a\": {}\n\"b\": []\n\"c\": \"~\"\n").unwrap();
		let text = Formatter::new()
			.empty_placeholder(Some("~".to_string()))
			.format(&node);
		assert_eq!(text, "\"a\": ~\n\"b\": []\n\"c\": \"~\"\n");
		assert_eq!(parse_document_with(&text, "t", Some("~")).unwrap(), node);

		for unusable in ["", "two words", "{}"] {
			let ignored = Formatter::new()
				.empty_placeholder(Some(unusable.to_string()))
				.format(&node);
			assert_eq!(ignored, "\"a\": {}\n\"b\": []\n\"c\": \"~\"\n");
		}
	}

	#[test]
	fn test_empty_root_with_placeholder() {
		let formatter = Formatter::new().empty_placeholder(Some("~".to_string()));
		let text = formatter.format(&Node::empty_mapping());
		assert_eq!(text, "~\n");
		assert_eq!(
			parse_document_with(&text, "t", formatter.placeholder()).unwrap(),
			Node::empty_mapping()
		);
	}

	#[test]
	fn test_block_scalar_trailing_newline() {
		let mut root = IndexMap::new();
		root.insert("k".to_string(), Node::scalar("x\n"));
		let text = serialize(&Node::Mapping(root), false);
		assert_eq!(text, "\"k\": |+\n  x\n  \n");
	}
}
