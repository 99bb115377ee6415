/// Contents written by `moldspec --init`.
pub fn generate_init_template() -> &'static str {
	r#"# moldspec settings
#
# Files named .moldspec.toml are read from the current directory upwards,
# then from ~/.moldspec.toml. For each setting the most specific file wins.

# Stop walking up the directory tree at this file.
root = true

# Directory documents are resolved against, relative to this file.
# data-dir = "specs"

# Load missing documents as empty instead of failing.
accept-empty = false

# Omit empty collections when saving documents.
collapse-empty = false

# Write empty mappings as this bare token instead of {}.
# empty-placeholder = "~"

# Default log filter (off, error, warn, info, debug, trace).
# MOLDSPEC_LOG overrides it.
log-level = "warn"

# Skip ~/.moldspec.toml when this environment variable is truthy.
# root-config-lookup-disable-env-var = "CI"
"#
}
