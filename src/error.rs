use std::path::PathBuf;

use crate::tree::NodeKind;

/// Library-level structured errors for moldspec.
///
/// Use `thiserror` for structured errors that library consumers can match on.
/// The CLI binary wraps these with `anyhow` for rich context chains.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
	#[error("Malformed document {document} at line {line}: {message}")]
	MalformedDocument {
		document: String,
		line: usize,
		message: String,
	},

	#[error("Type mismatch at {identity}: expected {expected}, found {actual}")]
	TypeMismatch {
		expected: NodeKind,
		actual: NodeKind,
		identity: String,
	},

	#[error("Key undefined: {key} (in {identity})")]
	KeyUndefined { identity: String, key: String },

	#[error("Invalid list entry {key} in {identity}: {reason}")]
	InvalidListEntry {
		identity: String,
		key: String,
		reason: String,
	},

	#[error("Invalid value at {identity}: expected {expected}, found {value:?}")]
	InvalidValue {
		identity: String,
		expected: String,
		value: String,
	},

	#[error("Value {value} at {identity} is outside {range}")]
	OutOfRange {
		identity: String,
		value: f64,
		range: String,
	},

	#[error("Invalid choice {value:?} at {identity} (expected one of: {})", candidates.join(", "))]
	InvalidChoice {
		identity: String,
		value: String,
		candidates: Vec<String>,
	},

	#[error("Invalid character {character:?} at position {position} in path: {path}")]
	InvalidPath {
		path: String,
		character: char,
		position: usize,
	},

	#[error("Path escapes the document root: {path}")]
	OutOfRootAccess { path: String },

	#[error("Resource not found: {path}")]
	ResourceNotFound { path: String },

	#[error("I/O failure on {path}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("Base chain cycle: {chain}")]
	BaseCycle { chain: String },

	#[error("Document {document} declares spawner {found}, expected {expected}")]
	SpawnerMismatch {
		expected: String,
		found: String,
		document: String,
	},

	#[error("Spawner {spawner} re-entered while constructing from {document}")]
	SpawnCycle { spawner: String, document: String },

	#[error("Spawner {spawner} recursively molds itself")]
	RecursiveSchema { spawner: String },

	#[error("Failed to read config file: {path}")]
	ConfigReadError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config file: {path}")]
	ConfigParseError {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Invalid setting {key} in {path}: {message}")]
	InvalidSetting {
		path: PathBuf,
		key: String,
		message: String,
	},

	#[error("Failed to resolve home directory")]
	HomeDirectoryNotFound,
}

/// Result type alias using SpecError.
pub type Result<T> = std::result::Result<T, SpecError>;
