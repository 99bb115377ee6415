use crate::config::parser::parse_config_file;
use crate::config::types::{CONFIG_FILE_NAME, LoadedConfig, MergedConfig};
use crate::error::{Result, SpecError};
use std::path::{Path, PathBuf};

/// Discover and load all config files in the cascade.
///
/// The cascade order is:
/// 1. Start from `start_dir` and look for `.moldspec.toml`
/// 2. If found and `root = true`, skip to user config only
/// 3. Otherwise, continue up the directory tree
/// 4. Finally, check ~/.moldspec.toml (unless disabled)
///
/// Returns configs in cascade order (most specific first).
pub fn discover_configs(start_dir: &Path) -> Result<Vec<LoadedConfig>> {
	let mut configs = Vec::new();
	let mut current_dir = start_dir.to_path_buf();

	// Walk up the directory tree
	loop {
		let config_path = current_dir.join(CONFIG_FILE_NAME);

		if config_path.exists() {
			let config = parse_config_file(&config_path)?;
			let stop = config.root;

			configs.push(LoadedConfig {
				config,
				path: config_path,
			});

			if stop {
				break;
			}
		}

		// Move to parent directory
		if let Some(parent) = current_dir.parent() {
			current_dir = parent.to_path_buf();
		} else {
			break;
		}
	}

	// Check user config unless disabled by env var
	if let Some(user_config) = load_user_config(&configs)? {
		// The walk may already have passed through the home directory.
		if !configs.iter().any(|loaded| loaded.path == user_config.path) {
			configs.push(user_config);
		}
	}

	Ok(configs)
}

/// Load the user's ~/.moldspec.toml if it exists and isn't disabled.
fn load_user_config(existing_configs: &[LoadedConfig]) -> Result<Option<LoadedConfig>> {
	// Check if any config disables user config lookup via env var
	for loaded in existing_configs {
		if let Some(ref env_var) = loaded.config.root_config_lookup_disable_env_var
			&& is_env_truthy(env_var)
		{
			return Ok(None);
		}
	}

	let user_config_path = user_config_path()?;

	if user_config_path.exists() {
		let config = parse_config_file(&user_config_path)?;
		Ok(Some(LoadedConfig {
			config,
			path: user_config_path,
		}))
	} else {
		Ok(None)
	}
}

/// Check if an environment variable is set to a truthy value.
fn is_env_truthy(var_name: &str) -> bool {
	match std::env::var(var_name) {
		Ok(value) => {
			let lower = value.to_lowercase();
			!value.is_empty() && lower != "0" && lower != "false" && lower != "no"
		}
		Err(_) => false,
	}
}

/// Merge multiple configs into a single effective config.
///
/// For every setting the most specific file that sets it wins. A relative
/// `data-dir` is resolved against the directory of the file declaring it;
/// without one, documents live in `start_dir`.
pub fn merge_configs(configs: &[LoadedConfig], start_dir: &Path) -> MergedConfig {
	let mut merged = MergedConfig {
		data_dir: start_dir.to_path_buf(),
		..MergedConfig::default()
	};
	let mut data_dir = None;
	let mut accept_empty = None;
	let mut collapse_empty = None;

	for loaded in configs {
		let config = &loaded.config;
		merged.sources.push(loaded.path.clone());

		if data_dir.is_none()
			&& let Some(dir) = &config.data_dir
		{
			let base = loaded.path.parent().unwrap_or(start_dir);
			data_dir = Some(base.join(dir));
		}
		accept_empty = accept_empty.or(config.accept_empty);
		collapse_empty = collapse_empty.or(config.collapse_empty);
		if merged.empty_placeholder.is_none() {
			merged.empty_placeholder = config.empty_placeholder.clone();
		}
		if merged.log_level.is_none() {
			merged.log_level = config.log_level.clone();
		}
	}

	if let Some(dir) = data_dir {
		merged.data_dir = dir;
	}
	merged.accept_empty = accept_empty.unwrap_or(false);
	merged.collapse_empty = collapse_empty.unwrap_or(false);
	merged
}

/// Convenience function to discover, load, and merge configs from a directory.
pub fn load_merged_config(start_dir: &Path) -> Result<MergedConfig> {
	let configs = discover_configs(start_dir)?;
	let merged = merge_configs(&configs, start_dir);
	tracing::debug!(sources = merged.sources.len(), data_dir = %merged.data_dir.display(), "settings merged");
	Ok(merged)
}

/// Get the path to the user's config file.
pub fn user_config_path() -> Result<PathBuf> {
	let home_dir = dirs::home_dir().ok_or(SpecError::HomeDirectoryNotFound)?;
	Ok(home_dir.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::types::Config;

	#[test]
	fn test_is_env_truthy() {
		// SAFETY: These env var operations are safe in single-threaded test context
		unsafe {
			// Not set
			std::env::remove_var("TEST_MOLDSPEC_ENV_1");
			assert!(!is_env_truthy("TEST_MOLDSPEC_ENV_1"));

			// Empty string
			std::env::set_var("TEST_MOLDSPEC_ENV_2", "");
			assert!(!is_env_truthy("TEST_MOLDSPEC_ENV_2"));

			// "0"
			std::env::set_var("TEST_MOLDSPEC_ENV_3", "0");
			assert!(!is_env_truthy("TEST_MOLDSPEC_ENV_3"));

			// "false"
			std::env::set_var("TEST_MOLDSPEC_ENV_4", "false");
			assert!(!is_env_truthy("TEST_MOLDSPEC_ENV_4"));

			// "FALSE"
			std::env::set_var("TEST_MOLDSPEC_ENV_5", "FALSE");
			assert!(!is_env_truthy("TEST_MOLDSPEC_ENV_5"));

			// "no"
			std::env::set_var("TEST_MOLDSPEC_ENV_6", "no");
			assert!(!is_env_truthy("TEST_MOLDSPEC_ENV_6"));

			// "1" - truthy
			std::env::set_var("TEST_MOLDSPEC_ENV_7", "1");
			assert!(is_env_truthy("TEST_MOLDSPEC_ENV_7"));

			// "true" - truthy
			std::env::set_var("TEST_MOLDSPEC_ENV_8", "true");
			assert!(is_env_truthy("TEST_MOLDSPEC_ENV_8"));

			// Any other value - truthy
			std::env::set_var("TEST_MOLDSPEC_ENV_9", "yes");
			assert!(is_env_truthy("TEST_MOLDSPEC_ENV_9"));

			// Cleanup
			for i in 1..=9 {
				std::env::remove_var(format!("TEST_MOLDSPEC_ENV_{}", i));
			}
		}
	}

	#[test]
	fn test_user_config_path() {
		let path = user_config_path();
		assert!(path.is_ok());
		let path = path.unwrap();
		assert!(path.ends_with(".moldspec.toml"));
	}

	#[test]
	fn test_root_stops_cascade() {
		let temp = tempfile::tempdir().unwrap();
		let outer = temp.path().join("project");
		let inner = outer.join("units");
		std::fs::create_dir_all(&inner).unwrap();
		std::fs::write(outer.join(CONFIG_FILE_NAME), "accept-empty = true\n").unwrap();
		std::fs::write(
			inner.join(CONFIG_FILE_NAME),
			"root = true\nroot-config-lookup-disable-env-var = \"TEST_MOLDSPEC_NO_HOME\"\n",
		)
		.unwrap();

		// SAFETY: Only this test reads this variable
		unsafe { std::env::set_var("TEST_MOLDSPEC_NO_HOME", "1") };
		let configs = discover_configs(&inner).unwrap();
		unsafe { std::env::remove_var("TEST_MOLDSPEC_NO_HOME") };

		assert_eq!(configs.len(), 1);
		assert_eq!(configs[0].path, inner.join(CONFIG_FILE_NAME));
	}

	fn loaded(path: &str, config: Config) -> LoadedConfig {
		LoadedConfig {
			config,
			path: PathBuf::from(path),
		}
	}

	#[test]
	fn test_merge_most_specific_wins() {
		let configs = vec![
			loaded(
				"/work/game/.moldspec.toml",
				Config {
					collapse_empty: Some(true),
					..Config::default()
				},
			),
			loaded(
				"/work/.moldspec.toml",
				Config {
					data_dir: Some(PathBuf::from("specs")),
					collapse_empty: Some(false),
					accept_empty: Some(true),
					log_level: Some("debug".to_string()),
					..Config::default()
				},
			),
		];

		let merged = merge_configs(&configs, Path::new("/work/game"));
		assert_eq!(merged.data_dir, PathBuf::from("/work/specs"));
		assert!(merged.collapse_empty);
		assert!(merged.accept_empty);
		assert_eq!(merged.log_level, Some("debug".to_string()));
		assert_eq!(merged.sources.len(), 2);
	}

	#[test]
	fn test_merge_defaults() {
		let merged = merge_configs(&[], Path::new("/work"));
		assert_eq!(merged.data_dir, PathBuf::from("/work"));
		assert!(!merged.accept_empty);
		assert!(merged.empty_placeholder.is_none());
		assert!(merged.sources.is_empty());
	}
}
