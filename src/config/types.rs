use crate::error::{Result, SpecError};
use crate::spec::{HELD, HIDDEN};
use crate::tree::is_placeholder_token;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name looked up in each directory of the cascade and in the home directory.
pub const CONFIG_FILE_NAME: &str = ".moldspec.toml";

/// Accepted values of `log-level`.
pub const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Settings from one `.moldspec.toml` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
	/// If true, stop directory cascade and jump directly to ~/.moldspec.toml.
	#[serde(default)]
	pub root: bool,

	/// Directory documents are resolved against, relative to this file.
	pub data_dir: Option<PathBuf>,

	/// Load missing documents as empty instead of failing.
	pub accept_empty: Option<bool>,

	/// Omit empty collections when saving.
	pub collapse_empty: Option<bool>,

	/// Bare token written in place of empty mappings when saving.
	pub empty_placeholder: Option<String>,

	/// Default log filter for the CLI.
	pub log_level: Option<String>,

	/// Environment variable name that, if truthy, skips ~/.moldspec.toml lookup.
	/// Useful for CI environments.
	#[serde(default)]
	pub root_config_lookup_disable_env_var: Option<String>,
}

/// A loaded configuration with its source path for debugging/display.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
	/// The parsed configuration.
	pub config: Config,

	/// The path this config was loaded from.
	pub path: PathBuf,
}

/// Effective settings after merging the cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedConfig {
	/// Absolute or start-relative document root.
	pub data_dir: PathBuf,

	pub accept_empty: bool,

	pub collapse_empty: bool,

	pub empty_placeholder: Option<String>,

	pub log_level: Option<String>,

	/// Every file that contributed, most specific first.
	pub sources: Vec<PathBuf>,
}

impl Config {
	/// Reject settings the engine cannot honour.
	pub fn validate(&self, path: &Path) -> Result<()> {
		if let Some(level) = &self.log_level
			&& !LOG_LEVELS.contains(&level.to_lowercase().as_str())
		{
			return Err(SpecError::InvalidSetting {
				path: path.to_path_buf(),
				key: "log-level".to_string(),
				message: format!("expected one of {}, found {level:?}", LOG_LEVELS.join(", ")),
			});
		}

		if let Some(placeholder) = &self.empty_placeholder {
			let problem = if placeholder == HIDDEN || placeholder == HELD {
				Some("is reserved as an override marker")
			} else if !is_placeholder_token(placeholder) {
				Some("must be a single bare token (no quotes, spaces, or value syntax)")
			} else {
				None
			};
			if let Some(problem) = problem {
				return Err(SpecError::InvalidSetting {
					path: path.to_path_buf(),
					key: "empty-placeholder".to_string(),
					message: format!("{placeholder:?} {problem}"),
				});
			}
		}

		if let Some(dir) = &self.data_dir
			&& dir.as_os_str().is_empty()
		{
			return Err(SpecError::InvalidSetting {
				path: path.to_path_buf(),
				key: "data-dir".to_string(),
				message: "must not be empty".to_string(),
			});
		}

		Ok(())
	}
}
