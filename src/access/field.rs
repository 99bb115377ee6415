use std::fmt;

/// A scalar type that can be read from and written to a spec.
///
/// `TAG` is the schema tag recorded while molding; `Default` supplies the
/// stand-in value construction code sees during a dry run.
pub trait Field: Sized + Clone + Default {
	const TAG: &'static str;

	fn decode(text: &str) -> Option<Self>;

	fn encode(&self) -> String;
}

impl Field for String {
	const TAG: &'static str = "Keyword";

	fn decode(text: &str) -> Option<Self> {
		Some(text.to_string())
	}

	fn encode(&self) -> String {
		self.clone()
	}
}

impl Field for i64 {
	const TAG: &'static str = "Int";

	fn decode(text: &str) -> Option<Self> {
		text.parse().ok()
	}

	fn encode(&self) -> String {
		self.to_string()
	}
}

impl Field for f64 {
	const TAG: &'static str = "Float";

	fn decode(text: &str) -> Option<Self> {
		text.parse::<f64>().ok().filter(|value| value.is_finite())
	}

	fn encode(&self) -> String {
		self.to_string()
	}
}

impl Field for bool {
	const TAG: &'static str = "Flag";

	fn decode(text: &str) -> Option<Self> {
		match text {
			"true" => Some(true),
			"false" => Some(false),
			_ => None,
		}
	}

	fn encode(&self) -> String {
		self.to_string()
	}
}

/// A numeric interval with per-end inclusivity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
	pub low: f64,
	pub high: f64,
	pub low_inclusive: bool,
	pub high_inclusive: bool,
}

impl Range {
	/// Half-open `[low, high)`.
	pub fn new(low: f64, high: f64) -> Self {
		Self {
			low,
			high,
			low_inclusive: true,
			high_inclusive: false,
		}
	}

	/// Closed `[low, high]`.
	pub fn closed(low: f64, high: f64) -> Self {
		Self {
			high_inclusive: true,
			..Self::new(low, high)
		}
	}

	pub fn inclusive(mut self, low: bool, high: bool) -> Self {
		self.low_inclusive = low;
		self.high_inclusive = high;
		self
	}

	pub fn contains(&self, value: f64) -> bool {
		let above = if self.low_inclusive {
			value >= self.low
		} else {
			value > self.low
		};
		let below = if self.high_inclusive {
			value <= self.high
		} else {
			value < self.high
		};
		above && below
	}

	fn brackets(&self) -> (&'static str, &'static str) {
		(
			if self.low_inclusive { "[" } else { "(" },
			if self.high_inclusive { "]" } else { ")" },
		)
	}

	/// Schema tag, e.g. `Range,[,0,10,)`.
	pub fn tag(&self) -> String {
		let (open, close) = self.brackets();
		format!("Range,{open},{},{},{close}", self.low, self.high)
	}
}

impl fmt::Display for Range {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let (open, close) = self.brackets();
		write!(f, "{open}{}, {}{close}", self.low, self.high)
	}
}

/// Schema tag for a candidate set, e.g. `Choice,a,b`.
pub fn choice_tag(candidates: &[String]) -> String {
	let mut tag = String::from("Choice");
	for candidate in candidates {
		tag.push(',');
		tag.push_str(candidate);
	}
	tag
}

/// Append `=default` to a tag when a default is supplied.
pub fn with_default(tag: String, default: Option<String>) -> String {
	match default {
		Some(default) => format!("{tag}={default}"),
		None => tag,
	}
}
