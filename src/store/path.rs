use crate::error::{Result, SpecError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};

/// Characters that may never appear in a document path.
static PROHIBITED: Lazy<Regex> =
	Lazy::new(|| Regex::new(r#"[*?"<>|:\\]"#).expect("static regex"));

/// A platform-independent, root-relative document path.
///
/// Paths are forward-slash separated. `.` and empty segments are dropped and
/// `..` is resolved lexically; a `..` that would climb above the root is an
/// [`SpecError::OutOfRootAccess`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DocPath {
	segments: Vec<String>,
}

impl DocPath {
	/// The root directory itself.
	pub fn root() -> Self {
		Self::default()
	}

	/// Parse and normalize a path string.
	pub fn parse(input: &str) -> Result<Self> {
		Self::root().join(input)
	}

	/// Join `input` onto this path. A leading `/` makes `input` root-relative.
	pub fn join(&self, input: &str) -> Result<Self> {
		if let Some(found) = PROHIBITED.find(input) {
			let character = input[found.start()..].chars().next().unwrap_or('\\');
			return Err(SpecError::InvalidPath {
				path: input.to_string(),
				character,
				position: input[..found.start()].chars().count(),
			});
		}

		let mut segments = if input.starts_with('/') {
			Vec::new()
		} else {
			self.segments.clone()
		};

		for segment in input.split('/') {
			match segment {
				"" | "." => {}
				".." => {
					if segments.pop().is_none() {
						return Err(SpecError::OutOfRootAccess {
							path: input.to_string(),
						});
					}
				}
				other => segments.push(other.to_string()),
			}
		}

		Ok(Self { segments })
	}

	/// Resolve a reference stored inside the document at this path
	/// (a `base` or exterior value) relative to the document's directory.
	pub fn resolve(&self, reference: &str) -> Result<Self> {
		self.parent().join(reference)
	}

	/// The containing directory.
	pub fn parent(&self) -> Self {
		let mut segments = self.segments.clone();
		segments.pop();
		Self { segments }
	}

	/// Last segment, if any.
	pub fn file_name(&self) -> Option<&str> {
		self.segments.last().map(String::as_str)
	}

	pub fn segments(&self) -> &[String] {
		&self.segments
	}

	pub fn is_root(&self) -> bool {
		self.segments.is_empty()
	}

	/// Map onto a real filesystem location below `root`.
	pub fn to_fs_path(&self, root: &Path) -> PathBuf {
		let mut path = root.to_path_buf();
		for segment in &self.segments {
			path.push(segment);
		}
		path
	}
}

impl fmt::Display for DocPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.segments.join("/"))
	}
}
