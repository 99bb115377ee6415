//! Settings loading and parsing for moldspec.
//!
//! This module handles:
//! - TOML settings file parsing
//! - Directory cascade discovery
//! - Settings merging

pub mod cascade;
pub mod parser;
pub mod template;
pub mod types;

pub use cascade::{discover_configs, load_merged_config, merge_configs, user_config_path};
pub use parser::{parse_config_file, parse_config_str};
pub use template::generate_init_template;
pub use types::{CONFIG_FILE_NAME, Config, LOG_LEVELS, LoadedConfig, MergedConfig};
