use crate::error::{Result, SpecError};
use crate::tree::node::{Node, NodeKind};
use indexmap::IndexMap;

/// Marker that introduces a multi-line block scalar.
pub const BLOCK_MARKER: &str = "|+";

/// Marker line for a nested collection inside a sequence.
pub const ITEM_MARKER: &str = "-";

/// Width of one nesting level.
pub const INDENT: usize = 2;

/// Parse text into a tree. Empty text is an empty mapping.
pub fn parse(text: &str) -> Result<Node> {
	parse_named(text, "<text>", None)
}

/// Parse a document, requiring a mapping at the root.
pub fn parse_document(text: &str, document: &str) -> Result<Node> {
	parse_document_with(text, document, None)
}

/// Parse a document written with an empty-mapping placeholder: a bare
/// `placeholder` token reads back as `{}`. A quoted scalar with the same
/// text stays a scalar.
pub fn parse_document_with(text: &str, document: &str, placeholder: Option<&str>) -> Result<Node> {
	let placeholder = placeholder.filter(|token| is_placeholder_token(token));
	let node = parse_named(text, document, placeholder)?;
	match node.kind() {
		NodeKind::Mapping => Ok(node),
		kind => Err(SpecError::MalformedDocument {
			document: document.to_string(),
			line: 1,
			message: format!("document root must be a mapping, found {kind}"),
		}),
	}
}

/// Whether `token` can stand in for an empty mapping as a bare value
/// without colliding with any other value syntax.
pub fn is_placeholder_token(token: &str) -> bool {
	!token.is_empty()
		&& !token.starts_with(['"', '#'])
		&& ![BLOCK_MARKER, ITEM_MARKER, "{}", "[]"].contains(&token)
		&& !token.chars().any(|c| c.is_whitespace() || c.is_control())
}

fn parse_named<'a>(text: &'a str, document: &'a str, placeholder: Option<&'a str>) -> Result<Node> {
	let mut parser = Parser {
		lines: text
			.split('\n')
			.map(|line| line.strip_suffix('\r').unwrap_or(line))
			.collect(),
		pos: 0,
		document,
		placeholder,
	};

	let node = match parser.peek() {
		None => Node::empty_mapping(),
		Some((indent, _)) if indent != 0 => {
			return Err(parser.error("unexpected indentation at document start"));
		}
		Some((_, token)) if token == "{}" || Some(token) == parser.placeholder => {
			parser.pos += 1;
			Node::empty_mapping()
		}
		Some((_, "[]")) => {
			parser.pos += 1;
			Node::Sequence(Vec::new())
		}
		Some(_) => parser.parse_block(0)?,
	};

	if parser.peek().is_some() {
		return Err(parser.error("unexpected content after document end"));
	}
	Ok(node)
}

struct Parser<'a> {
	lines: Vec<&'a str>,
	pos: usize,
	document: &'a str,
	placeholder: Option<&'a str>,
}

/// A single parsed value token from the rest of a line.
enum Inline {
	Scalar(String),
	Block,
	Nested,
	EmptyMapping,
	EmptySequence,
}

impl<'a> Parser<'a> {
	fn error(&self, message: impl Into<String>) -> SpecError {
		self.error_at(self.pos + 1, message)
	}

	fn error_at(&self, line: usize, message: impl Into<String>) -> SpecError {
		SpecError::MalformedDocument {
			document: self.document.to_string(),
			line,
			message: message.into(),
		}
	}

	fn is_skippable(line: &str) -> bool {
		let trimmed = line.trim();
		trimmed.is_empty() || trimmed.starts_with('#')
	}

	/// Advance past blank and comment lines; return the next line's indent and text.
	fn peek(&mut self) -> Option<(usize, &'a str)> {
		while self.pos < self.lines.len() && Self::is_skippable(self.lines[self.pos]) {
			self.pos += 1;
		}
		let line = *self.lines.get(self.pos)?;
		let content = line.trim_start_matches(' ');
		Some((line.len() - content.len(), content.trim_end()))
	}

	/// Parse all lines at exactly `indent` into a mapping or a sequence.
	fn parse_block(&mut self, indent: usize) -> Result<Node> {
		let Some((_, first)) = self.peek() else {
			return Err(self.error("missing nested value"));
		};

		if first.starts_with('"') && split_key(first).is_some() {
			self.parse_mapping(indent)
		} else {
			self.parse_sequence(indent)
		}
	}

	fn parse_mapping(&mut self, indent: usize) -> Result<Node> {
		let mut entries = IndexMap::new();

		while let Some((line_indent, content)) = self.peek() {
			if line_indent < indent {
				break;
			}
			if line_indent > indent {
				return Err(self.error("unexpected indentation"));
			}

			let Some((key, rest)) = split_key(content) else {
				return Err(self.error("expected a quoted key followed by ':'"));
			};
			if entries.contains_key(&key) {
				return Err(self.error(format!("duplicate key {key:?}")));
			}

			let inline = self.parse_inline(rest)?;
			self.pos += 1;
			let value = self.finish_inline(inline, indent)?;
			entries.insert(key, value);
		}

		Ok(Node::Mapping(entries))
	}

	fn parse_sequence(&mut self, indent: usize) -> Result<Node> {
		let mut items = Vec::new();

		while let Some((line_indent, content)) = self.peek() {
			if line_indent < indent {
				break;
			}
			if line_indent > indent {
				return Err(self.error("unexpected indentation"));
			}
			if content.starts_with('"') && split_key(content).is_some() {
				return Err(self.error("mapping entry inside a sequence"));
			}

			let inline = if content == ITEM_MARKER {
				Inline::Nested
			} else {
				self.parse_inline(content)?
			};
			self.pos += 1;
			items.push(self.finish_inline(inline, indent)?);
		}

		Ok(Node::Sequence(items))
	}

	/// Classify the value part of an entry line.
	fn parse_inline(&self, rest: &str) -> Result<Inline> {
		let rest = rest.trim();
		match rest {
			"" => Ok(Inline::Nested),
			BLOCK_MARKER => Ok(Inline::Block),
			"{}" => Ok(Inline::EmptyMapping),
			"[]" => Ok(Inline::EmptySequence),
			_ if Some(rest) == self.placeholder => Ok(Inline::EmptyMapping),
			_ if rest.starts_with('"') => match read_quoted(rest) {
				Some((value, tail)) if tail.trim().is_empty() => Ok(Inline::Scalar(value)),
				Some(_) => Err(self.error("trailing characters after scalar")),
				None => Err(self.error("unterminated or invalid quoted scalar")),
			},
			_ => Err(self.error(format!("unrecognized value {rest:?}"))),
		}
	}

	/// Build the node for an inline token; the entry line is already consumed.
	fn finish_inline(&mut self, inline: Inline, indent: usize) -> Result<Node> {
		match inline {
			Inline::Scalar(value) => Ok(Node::Scalar(value)),
			Inline::EmptyMapping => Ok(Node::empty_mapping()),
			Inline::EmptySequence => Ok(Node::Sequence(Vec::new())),
			Inline::Block => Ok(Node::Scalar(self.read_block(indent + INDENT))),
			Inline::Nested => {
				// The entry line was the one just consumed.
				let entry_line = self.pos;
				match self.peek() {
					Some((child_indent, _)) if child_indent == indent + INDENT => {
						self.parse_block(indent + INDENT)
					}
					_ => Err(self.error_at(entry_line, "missing nested value")),
				}
			}
		}
	}

	/// Raw lines at `indent` or deeper, with the indent stripped.
	///
	/// A whitespace-only line shorter than the indent still belongs to the
	/// block when a later block line follows it.
	fn read_block(&mut self, indent: usize) -> String {
		let prefix = " ".repeat(indent);
		let mut lines = Vec::new();

		while self.pos < self.lines.len() {
			let line = self.lines[self.pos];
			if let Some(stripped) = line.strip_prefix(&prefix) {
				lines.push(stripped);
				self.pos += 1;
				continue;
			}
			if line.trim().is_empty() && self.block_continues(&prefix) {
				lines.push("");
				self.pos += 1;
				continue;
			}
			break;
		}

		lines.join("\n")
	}

	fn block_continues(&self, prefix: &str) -> bool {
		self.lines[self.pos + 1..]
			.iter()
			.find(|line| !line.trim().is_empty())
			.is_some_and(|line| line.starts_with(prefix))
	}
}

/// Split `"key": rest` into its unescaped key and the text after the colon.
fn split_key(content: &str) -> Option<(String, &str)> {
	let (key, tail) = read_quoted(content)?;
	let rest = tail.strip_prefix(':')?;
	if !rest.is_empty() && !rest.starts_with(' ') {
		return None;
	}
	Some((key, rest))
}

/// Read a double-quoted string at the start of `input`; returns it and the tail.
pub(crate) fn read_quoted(input: &str) -> Option<(String, &str)> {
	let mut chars = input.char_indices();
	if chars.next()?.1 != '"' {
		return None;
	}

	let mut value = String::new();
	while let Some((index, c)) = chars.next() {
		match c {
			'"' => return Some((value, &input[index + 1..])),
			'\\' => {
				let (_, escaped) = chars.next()?;
				match escaped {
					'"' => value.push('"'),
					'\\' => value.push('\\'),
					'n' => value.push('\n'),
					'r' => value.push('\r'),
					't' => value.push('\t'),
					'u' => {
						let mut code = 0u32;
						for _ in 0..4 {
							let (_, digit) = chars.next()?;
							code = code * 16 + digit.to_digit(16)?;
						}
						value.push(char::from_u32(code)?);
					}
					_ => return None,
				}
			}
			c => value.push(c),
		}
	}
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	fn mapping(entries: &[(&str, Node)]) -> Node {
		Node::Mapping(
			entries
				.iter()
				.map(|(k, v)| (k.to_string(), v.clone()))
				.collect(),
		)
	}

	#[test]
	fn test_parse_empty_text() {
		assert_eq!(parse("").unwrap(), Node::empty_mapping());
		assert_eq!(parse("\n\n# only a comment\n").unwrap(), Node::empty_mapping());
		assert_eq!(parse("{}\n").unwrap(), Node::empty_mapping());
	}

	#[test]
	fn test_parse_nested_mapping() {
		let text = r#""base": "b.spec"
"properties":
  "speed": "5"
  "motion":
    "turn": "0.25"
  "tags": []
  "extra": {}
"#;
		let node = parse(text).unwrap();
		let expected = mapping(&[
			("base", Node::scalar("b.spec")),
			(
				"properties",
				mapping(&[
					("speed", Node::scalar("5")),
					("motion", mapping(&[("turn", Node::scalar("0.25"))])),
					("tags", Node::Sequence(vec![])),
					("extra", Node::empty_mapping()),
				]),
			),
		]);
		assert_eq!(node, expected);
	}

	#[test]
	fn test_parse_sequences() {
		let text = r#""items":
  "a"
  -
    "name": "b"
  -
    "x"
    "y"
  []
"#;
		let node = parse(text).unwrap();
		let items = node.get("items").unwrap().as_sequence("t").unwrap();
		assert_eq!(items.len(), 4);
		assert_eq!(items[0], Node::scalar("a"));
		assert_eq!(items[1], mapping(&[("name", Node::scalar("b"))]));
		assert_eq!(
			items[2],
			Node::Sequence(vec![Node::scalar("x"), Node::scalar("y")])
		);
		assert_eq!(items[3], Node::Sequence(vec![]));
	}

	#[test]
	fn test_parse_block_scalar() {
		let text = "\"note\": |+\n  first line\n    indented\n\n  after blank\n\"next\": \"1\"\n";
		let node = parse(text).unwrap();
		assert_eq!(
			node.get("note").unwrap(),
			&Node::scalar("first line\n  indented\n\nafter blank")
		);
		assert_eq!(node.get("next").unwrap(), &Node::scalar("1"));
	}

	#[test]
	fn test_parse_escapes() {
		let node = parse(r#""k\"ey": "tab\there A \\ end""#).unwrap();
		assert_eq!(node.get("k\"ey").unwrap(), &Node::scalar("tab\there A \\ end"));
	}

	#[test]
	fn test_parse_keys_with_colons() {
		let node = parse("\"a: b\": \"c: d\"\n").unwrap();
		assert_eq!(node.get("a: b").unwrap(), &Node::scalar("c: d"));
	}

	#[test]
	fn test_malformed_inputs() {
		let cases = [
			("\"a\": \"1\"\n\"a\": \"2\"\n", 2, "duplicate key"),
			("\"a\":\n", 1, "missing nested value"),
			("\"a\": \"1\"\n    \"b\": \"2\"\n", 2, "unexpected indentation"),
			("\"a\": bare\n", 1, "unrecognized value"),
			("\"a\": \"open\n", 1, "unterminated"),
			("  \"a\": \"1\"\n", 1, "unexpected indentation"),
			("\"a\": \"1\" x\n", 1, "trailing characters"),
		];

		for (text, line, needle) in cases {
			match parse(text).unwrap_err() {
				SpecError::MalformedDocument {
					line: got,
					message,
					..
				} => {
					assert_eq!(got, line, "text {text:?}");
					assert!(message.contains(needle), "{message} for {text:?}");
				}
				other => panic!("Expected MalformedDocument, got {other:?}"),
			}
		}
	}

	#[test]
	fn test_parse_document_requires_mapping() {
		let result = parse_document("\"a\"\n\"b\"\n", "seq.spec");
		match result.unwrap_err() {
			SpecError::MalformedDocument { document, .. } => assert_eq!(document, "seq.spec"),
			other => panic!("Expected MalformedDocument, got {other:?}"),
		}
	}

	#[test]
	fn test_placeholder_reads_as_empty_mapping() {
		let text = "\"modes\": ~\n\"literal\": \"~\"\n\"items\":\n  ~\n  \"a\"\n";
		let node = parse_document_with(text, "a.spec", Some("~")).unwrap();
		assert_eq!(node.get("modes"), Some(&Node::empty_mapping()));
		assert_eq!(node.get("literal"), Some(&Node::scalar("~")));
		assert_eq!(
			node.get("items"),
			Some(&Node::Sequence(vec![Node::empty_mapping(), Node::scalar("a")]))
		);
		assert_eq!(parse_document_with("~\n", "a.spec", Some("~")).unwrap(), Node::empty_mapping());

		// Without the placeholder configured the bare token is malformed.
		assert!(matches!(
			parse_document("\"modes\": ~\n", "a.spec"),
			Err(SpecError::MalformedDocument { .. })
		));
	}

	#[test]
	fn test_placeholder_token_rules() {
		assert!(is_placeholder_token("~"));
		assert!(is_placeholder_token("none"));
		for bad in ["", "\"q\"", "#c", "-", "|+", "{}", "[]", "a b", "tab\t"] {
			assert!(!is_placeholder_token(bad), "{bad:?}");
		}
	}

	#[test]
	fn test_crlf_line_endings() {
		let node = parse("\"a\":\r\n  \"b\": \"1\"\r\n").unwrap();
		assert_eq!(node.at_path(&["a", "b"]), Some(&Node::scalar("1")));
	}
}
