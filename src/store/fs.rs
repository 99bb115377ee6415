use crate::error::{Result, SpecError};
use crate::store::path::DocPath;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

/// The I/O boundary every document load and save goes through.
///
/// Implementations are scoped to a root; [`DocPath`] already rejects paths
/// that leave it.
pub trait FileSystem: Send + Sync {
	fn exists(&self, path: &DocPath) -> bool;

	fn create_dir(&self, path: &DocPath) -> Result<()>;

	/// Read a whole file. Missing files are [`SpecError::ResourceNotFound`].
	fn read_text(&self, path: &DocPath) -> Result<String>;

	fn write_text(&self, path: &DocPath, text: &str, append: bool) -> Result<()>;

	/// Names of the immediate subdirectories of `path`, sorted.
	fn list_dirs(&self, path: &DocPath) -> Result<Vec<String>>;
}

/// Files on disk below a root directory.
#[derive(Debug, Clone)]
pub struct DiskFs {
	root: PathBuf,
}

impl DiskFs {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn io_error(path: &DocPath, source: std::io::Error) -> SpecError {
		if source.kind() == std::io::ErrorKind::NotFound {
			SpecError::ResourceNotFound {
				path: path.to_string(),
			}
		} else {
			SpecError::Io {
				path: path.to_string(),
				source,
			}
		}
	}
}

impl FileSystem for DiskFs {
	fn exists(&self, path: &DocPath) -> bool {
		path.to_fs_path(&self.root).exists()
	}

	fn create_dir(&self, path: &DocPath) -> Result<()> {
		std::fs::create_dir_all(path.to_fs_path(&self.root))
			.map_err(|source| Self::io_error(path, source))
	}

	fn read_text(&self, path: &DocPath) -> Result<String> {
		std::fs::read_to_string(path.to_fs_path(&self.root))
			.map_err(|source| Self::io_error(path, source))
	}

	fn write_text(&self, path: &DocPath, text: &str, append: bool) -> Result<()> {
		let real = path.to_fs_path(&self.root);
		if let Some(dir) = real.parent() {
			std::fs::create_dir_all(dir).map_err(|source| Self::io_error(path, source))?;
		}

		let mut file = std::fs::OpenOptions::new()
			.create(true)
			.write(true)
			.append(append)
			.truncate(!append)
			.open(&real)
			.map_err(|source| Self::io_error(path, source))?;
		file.write_all(text.as_bytes())
			.map_err(|source| Self::io_error(path, source))
	}

	fn list_dirs(&self, path: &DocPath) -> Result<Vec<String>> {
		let entries = std::fs::read_dir(path.to_fs_path(&self.root))
			.map_err(|source| Self::io_error(path, source))?;

		let mut names = Vec::new();
		for entry in entries {
			let entry = entry.map_err(|source| Self::io_error(path, source))?;
			if entry.path().is_dir() {
				names.push(entry.file_name().to_string_lossy().to_string());
			}
		}
		names.sort();
		Ok(names)
	}
}

/// In-memory file tree, used by tests through the same [`crate::Context`].
#[derive(Debug, Default)]
pub struct MemoryFs {
	files: RwLock<BTreeMap<DocPath, String>>,
	dirs: RwLock<BTreeSet<DocPath>>,
}

impl MemoryFs {
	pub fn new() -> Self {
		Self::default()
	}

	/// Seed a file, creating its directories.
	pub fn with_file(self, path: &str, text: &str) -> Result<Self> {
		self.write_text(&DocPath::parse(path)?, text, false)?;
		Ok(self)
	}

	/// Current contents of a file, if present.
	pub fn contents(&self, path: &str) -> Option<String> {
		let path = DocPath::parse(path).ok()?;
		self.files.read().get(&path).cloned()
	}

	fn add_dirs(&self, path: &DocPath) {
		let mut dirs = self.dirs.write();
		let mut current = path.clone();
		while !current.is_root() {
			dirs.insert(current.clone());
			current = current.parent();
		}
	}
}

impl FileSystem for MemoryFs {
	fn exists(&self, path: &DocPath) -> bool {
		path.is_root() || self.files.read().contains_key(path) || self.dirs.read().contains(path)
	}

	fn create_dir(&self, path: &DocPath) -> Result<()> {
		self.add_dirs(path);
		Ok(())
	}

	fn read_text(&self, path: &DocPath) -> Result<String> {
		self.files
			.read()
			.get(path)
			.cloned()
			.ok_or_else(|| SpecError::ResourceNotFound {
				path: path.to_string(),
			})
	}

	fn write_text(&self, path: &DocPath, text: &str, append: bool) -> Result<()> {
		self.add_dirs(&path.parent());
		let mut files = self.files.write();
		let entry = files.entry(path.clone()).or_default();
		if !append {
			entry.clear();
		}
		entry.push_str(text);
		Ok(())
	}

	fn list_dirs(&self, path: &DocPath) -> Result<Vec<String>> {
		if !self.exists(path) {
			return Err(SpecError::ResourceNotFound {
				path: path.to_string(),
			});
		}

		let depth = path.segments().len() + 1;
		Ok(self
			.dirs
			.read()
			.iter()
			.filter(|dir| dir.segments().len() == depth && dir.parent() == *path)
			.filter_map(|dir| dir.file_name().map(str::to_string))
			.collect())
	}
}
