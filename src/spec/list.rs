//! Ordered lists stored as mappings with fractional numeric keys.
//!
//! A list `[a, b, c]` is written as `{"0": a, "1": b, "2": c}`. Entries can be
//! inserted between neighbours (`"0.5"`) without renumbering, and base
//! documents contribute their own cells to a derived document's list.

use crate::error::{Result, SpecError};
use crate::tree::Node;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

static NUMERIC_KEY: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("static regex"));

/// Exact decimal position of a list cell, totally ordered.
///
/// Keys are compared digit by digit, so arbitrarily long fractional keys
/// stay distinct and `"0.5"` / `"0.50"` land on the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
	negative: bool,
	/// Integer digits without leading zeros; `"0"` for zero.
	int: String,
	/// Fraction digits without trailing zeros.
	frac: String,
}

impl Position {
	/// Parse a cell key; `None` for anything that is not a plain decimal.
	pub fn parse(key: &str) -> Option<Self> {
		if !NUMERIC_KEY.is_match(key) {
			return None;
		}
		let (negative, digits) = match key.strip_prefix('-') {
			Some(rest) => (true, rest),
			None => (false, key),
		};
		let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
		Some(Self::new(negative, int, frac))
	}

	fn new(negative: bool, int: &str, frac: &str) -> Self {
		let int = int.trim_start_matches('0');
		let int = if int.is_empty() { "0" } else { int };
		let frac = frac.trim_end_matches('0');
		// -0 and 0 are the same slot.
		let zero = int == "0" && frac.is_empty();
		Self {
			negative: negative && !zero,
			int: int.to_string(),
			frac: frac.to_string(),
		}
	}

	fn integer(negative: bool, int: &str) -> Self {
		Self::new(negative, int, "")
	}

	fn negate(&self) -> Self {
		Self::new(!self.negative, &self.int, &self.frac)
	}

	fn is_zero(&self) -> bool {
		self.int == "0" && self.frac.is_empty()
	}

	/// The smallest integer strictly greater than this position.
	fn next_integer(&self) -> Self {
		match (self.negative, self.frac.is_empty()) {
			(false, _) => Self::integer(false, &increment(&self.int)),
			(true, false) => Self::integer(true, &self.int),
			(true, true) => Self::integer(true, &decrement(&self.int)),
		}
	}

	fn cmp_magnitude(&self, other: &Self) -> Ordering {
		self.int
			.len()
			.cmp(&other.int.len())
			.then_with(|| self.int.cmp(&other.int))
			.then_with(|| self.frac.cmp(&other.frac))
	}
}

impl fmt::Display for Position {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.negative {
			f.write_str("-")?;
		}
		f.write_str(&self.int)?;
		if !self.frac.is_empty() {
			write!(f, ".{}", self.frac)?;
		}
		Ok(())
	}
}

impl PartialOrd for Position {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Position {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self.negative, other.negative) {
			(false, false) => self.cmp_magnitude(other),
			(true, true) => other.cmp_magnitude(self),
			(true, false) => Ordering::Less,
			(false, true) => Ordering::Greater,
		}
	}
}

/// Add one to a decimal digit string.
fn increment(digits: &str) -> String {
	let mut out: Vec<u8> = digits.bytes().collect();
	for digit in out.iter_mut().rev() {
		if *digit == b'9' {
			*digit = b'0';
		} else {
			*digit += 1;
			return String::from_utf8_lossy(&out).into_owned();
		}
	}
	format!("1{}", String::from_utf8_lossy(&out))
}

/// Subtract one from a positive decimal digit string.
fn decrement(digits: &str) -> String {
	let mut out: Vec<u8> = digits.bytes().collect();
	for digit in out.iter_mut().rev() {
		if *digit == b'0' {
			*digit = b'9';
		} else {
			*digit -= 1;
			break;
		}
	}
	String::from_utf8_lossy(&out).into_owned()
}

/// What one level says about one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellState {
	Value(Node),
	Hidden,
	Held,
}

/// A cell after merging the chain: the deciding level's key and state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
	pub key: String,
	pub position: Position,
	pub state: CellState,
}

/// Validate and order the cells of one level's list mapping.
///
/// Keys that are not decimals, or that collide after numeric parsing, fail
/// the whole list.
pub fn decode_level(
	entries: &IndexMap<String, Node>,
	identity: &str,
	classify: impl Fn(&Node) -> CellState,
) -> Result<Vec<Cell>> {
	let mut cells: Vec<Cell> = Vec::with_capacity(entries.len());

	for (key, node) in entries {
		let position = Position::parse(key).ok_or_else(|| SpecError::InvalidListEntry {
			identity: identity.to_string(),
			key: key.clone(),
			reason: "list keys must be decimal numbers".to_string(),
		})?;

		if let Some(existing) = cells.iter().find(|cell| cell.position == position) {
			return Err(SpecError::InvalidListEntry {
				identity: identity.to_string(),
				key: key.clone(),
				reason: format!("ambiguous with key {:?}", existing.key),
			});
		}

		cells.push(Cell {
			key: key.clone(),
			position,
			state: classify(node),
		});
	}

	cells.sort_by(|a, b| a.position.cmp(&b.position));
	Ok(cells)
}

/// Merge levels ordered most-derived first. The first level holding a
/// position decides that cell.
pub fn merge_levels(levels: Vec<Vec<Cell>>) -> Vec<Cell> {
	let mut merged: Vec<Cell> = Vec::new();
	for level in levels {
		for cell in level {
			if !merged.iter().any(|m| m.position == cell.position) {
				merged.push(cell);
			}
		}
	}
	merged.sort_by(|a, b| a.position.cmp(&b.position));
	merged
}

/// Canonical mapping for a full overwrite: keys `0..N-1` in input order.
/// `None` for an empty list.
pub fn encode(values: Vec<Node>) -> Option<Node> {
	if values.is_empty() {
		return None;
	}
	Some(Node::Mapping(
		values
			.into_iter()
			.enumerate()
			.map(|(index, value)| (index.to_string(), value))
			.collect(),
	))
}

/// Short decimal key strictly between `low` and `high`.
///
/// Open ends step to the next whole number; with no neighbours at all the
/// key is `"0"`. The result is exact at any depth, so repeated inserts into
/// the same gap never collide with an existing key.
pub fn key_between(low: Option<&Position>, high: Option<&Position>) -> String {
	let key = match (low, high) {
		(None, None) => Position::integer(false, "0"),
		(Some(low), None) => low.next_integer(),
		(None, Some(high)) => high.negate().next_integer().negate(),
		(Some(low), Some(high)) => {
			debug_assert!(low < high, "{low} must sort before {high}");
			if !low.negative {
				between_non_negative(low, high)
			} else if high.negative || high.is_zero() {
				between_non_negative(&high.negate(), &low.negate()).negate()
			} else {
				Position::integer(false, "0")
			}
		}
	};
	key.to_string()
}

/// `0 <= low < high`.
fn between_non_negative(low: &Position, high: &Position) -> Position {
	let next = low.next_integer();
	if next < *high {
		return next;
	}
	// No whole number fits, so the key shares `low`'s integer part.
	let upper = (high.int == low.int).then_some(high.frac.as_str());
	Position::new(false, &low.int, &fraction_between(&low.frac, upper))
}

/// Fraction digits strictly between `0.low` and `0.high` (`None` is 1).
fn fraction_between(low: &str, high: Option<&str>) -> String {
	let digit_at = |digits: &[u8], index: usize| digits.get(index).map_or(0, |d| d - b'0');
	let low = low.as_bytes();
	let mut high = high.map(str::as_bytes);
	let mut out = String::new();

	for index in 0.. {
		let lo = digit_at(low, index);
		let hi = high.map_or(10, |digits| digit_at(digits, index));
		if hi >= lo + 2 {
			out.push(char::from(b'0' + (lo + hi) / 2));
			break;
		}
		if hi == lo + 1 {
			if let Some(digits) = high
				&& digits.len() > index + 1
			{
				out.push(char::from(b'0' + hi));
				break;
			}
			high = None;
		}
		out.push(char::from(b'0' + lo));
	}
	out
}
