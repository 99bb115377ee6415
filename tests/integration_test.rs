#![allow(deprecated)] // assert_cmd::Command::cargo_bin is deprecated but replacement requires nightly

use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn moldspec_cmd(home: &Path) -> assert_cmd::Command {
	let mut cmd = assert_cmd::Command::cargo_bin("moldspec").unwrap();
	// Keep the real ~/.moldspec.toml and MOLDSPEC_LOG out of the tests.
	cmd.env("HOME", home).env_remove("MOLDSPEC_LOG");
	cmd
}

/// A project directory with `root = true` settings and two layered documents.
fn project() -> tempfile::TempDir {
	let temp_dir = tempfile::tempdir().unwrap();
	let root = temp_dir.path();
	fs::write(root.join(".moldspec.toml"), "root = true\n").unwrap();
	fs::create_dir_all(root.join("units")).unwrap();
	fs::write(
		root.join("units/b.spec"),
		r#""spawner": "Tank"
"properties":
  "name": "base tank"
  "armor": "4"
  "list":
    "1": "21"
    "2": "22"
"#,
	)
	.unwrap();
	fs::write(
		root.join("units/a.spec"),
		r#""base": "b.spec"
"properties":
  "name": "heavy tank"
  "list":
    "0": "10"
    "0.5": "15"
    "1": "11"
"#,
	)
	.unwrap();
	temp_dir
}

// ============================================================================
// CLI flag tests
// ============================================================================

#[test]
fn test_help_flag() {
	let temp_dir = tempfile::tempdir().unwrap();
	moldspec_cmd(temp_dir.path())
		.arg("--help")
		.assert()
		.success()
		.stdout(predicate::str::contains("Layered configuration documents"));
}

#[test]
fn test_version_flag() {
	let temp_dir = tempfile::tempdir().unwrap();
	moldspec_cmd(temp_dir.path())
		.arg("--version")
		.assert()
		.success()
		.stdout(predicate::str::contains("moldspec"));
}

#[test]
fn test_no_args_shows_help() {
	let temp_dir = tempfile::tempdir().unwrap();
	// With arg_required_else_help, no args should show help
	moldspec_cmd(temp_dir.path())
		.assert()
		.failure()
		.stderr(predicate::str::contains("Usage"));
}

// ============================================================================
// --init tests
// ============================================================================

#[test]
fn test_init_creates_config() {
	let temp_dir = tempfile::tempdir().unwrap();
	let config_path = temp_dir.path().join(".moldspec.toml");

	moldspec_cmd(temp_dir.path())
		.arg("--init")
		.current_dir(temp_dir.path())
		.assert()
		.success()
		.stdout(predicate::str::contains("Created .moldspec.toml"));

	let content = fs::read_to_string(&config_path).unwrap();
	assert!(content.contains("root = true"));
	assert!(content.contains("accept-empty"));
}

#[test]
fn test_init_fails_if_exists() {
	let temp_dir = tempfile::tempdir().unwrap();
	fs::write(temp_dir.path().join(".moldspec.toml"), "# existing").unwrap();

	moldspec_cmd(temp_dir.path())
		.arg("--init")
		.current_dir(temp_dir.path())
		.assert()
		.failure()
		.stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_init_force_overwrites() {
	let temp_dir = tempfile::tempdir().unwrap();
	let config_path = temp_dir.path().join(".moldspec.toml");
	fs::write(&config_path, "# existing").unwrap();

	moldspec_cmd(temp_dir.path())
		.args(["--init", "--force"])
		.current_dir(temp_dir.path())
		.assert()
		.success();

	let content = fs::read_to_string(&config_path).unwrap();
	assert!(content.contains("root = true"));
}

// ============================================================================
// config subcommand tests
// ============================================================================

#[test]
fn test_config_validate_no_config() {
	let temp_dir = tempfile::tempdir().unwrap();
	moldspec_cmd(temp_dir.path())
		.args(["config", "validate"])
		.current_dir(temp_dir.path())
		.assert()
		.success()
		.stdout(predicate::str::contains("No configuration files found"));
}

#[test]
fn test_config_validate_invalid_config() {
	let temp_dir = tempfile::tempdir().unwrap();
	fs::write(temp_dir.path().join(".moldspec.toml"), "invalid toml [[[").unwrap();

	moldspec_cmd(temp_dir.path())
		.args(["config", "validate"])
		.current_dir(temp_dir.path())
		.assert()
		.failure()
		.stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_config_show_displays_settings() {
	let temp_dir = tempfile::tempdir().unwrap();
	fs::write(
		temp_dir.path().join(".moldspec.toml"),
		"root = true\ndata-dir = \"specs\"\ncollapse-empty = true\n",
	)
	.unwrap();

	moldspec_cmd(temp_dir.path())
		.args(["config", "show"])
		.current_dir(temp_dir.path())
		.assert()
		.success()
		.stdout(predicate::str::contains("# data-dir: specs"))
		.stdout(predicate::str::contains("collapse-empty: true"));
}

// ============================================================================
// Document commands
// ============================================================================

#[test]
fn test_get_falls_through_to_base() {
	let temp_dir = project();
	moldspec_cmd(temp_dir.path())
		.args(["get", "units/a.spec", "armor"])
		.current_dir(temp_dir.path())
		.assert()
		.success()
		.stdout("4\n");

	moldspec_cmd(temp_dir.path())
		.args(["get", "units/a.spec", "name"])
		.current_dir(temp_dir.path())
		.assert()
		.success()
		.stdout("heavy tank\n");
}

#[test]
fn test_get_missing_key_fails() {
	let temp_dir = project();
	moldspec_cmd(temp_dir.path())
		.args(["get", "units/a.spec", "speed"])
		.current_dir(temp_dir.path())
		.assert()
		.failure()
		.stderr(predicate::str::contains("Key undefined"));
}

#[test]
fn test_list_merges_base_cells() {
	let temp_dir = project();
	moldspec_cmd(temp_dir.path())
		.args(["list", "units/a.spec", "list"])
		.current_dir(temp_dir.path())
		.assert()
		.success()
		.stdout("10\n15\n11\n22\n");
}

#[test]
fn test_keys_merge_derived_first() {
	let temp_dir = project();
	moldspec_cmd(temp_dir.path())
		.args(["keys", "units/a.spec"])
		.current_dir(temp_dir.path())
		.assert()
		.success()
		.stdout("name\nlist\narmor\n");
}

#[test]
fn test_hide_blocks_base_and_unset_restores() {
	let temp_dir = project();
	let dir = temp_dir.path();

	moldspec_cmd(dir)
		.args(["hide", "units/a.spec", "armor"])
		.current_dir(dir)
		.assert()
		.success();
	let saved = fs::read_to_string(dir.join("units/a.spec")).unwrap();
	assert!(saved.contains("\"armor\": \"__HIDDEN__\""));

	moldspec_cmd(dir)
		.args(["get", "units/a.spec", "armor"])
		.current_dir(dir)
		.assert()
		.failure();

	moldspec_cmd(dir)
		.args(["unset", "units/a.spec", "armor"])
		.current_dir(dir)
		.assert()
		.success();
	moldspec_cmd(dir)
		.args(["get", "units/a.spec", "armor"])
		.current_dir(dir)
		.assert()
		.success()
		.stdout("4\n");
}

#[test]
fn test_hold_list_entry_with_fill() {
	let temp_dir = project();
	let dir = temp_dir.path();

	moldspec_cmd(dir)
		.args(["hold", "units/a.spec", "list/0.5"])
		.current_dir(dir)
		.assert()
		.success();

	moldspec_cmd(dir)
		.args(["list", "units/a.spec", "list"])
		.current_dir(dir)
		.assert()
		.success()
		.stdout("10\n11\n22\n");

	moldspec_cmd(dir)
		.args(["list", "units/a.spec", "list", "--fill", "0"])
		.current_dir(dir)
		.assert()
		.success()
		.stdout("10\n0\n11\n22\n");
}

#[test]
fn test_set_writes_only_the_named_document() {
	let temp_dir = project();
	let dir = temp_dir.path();
	let base_before = fs::read_to_string(dir.join("units/b.spec")).unwrap();

	moldspec_cmd(dir)
		.args(["set", "units/a.spec", "motion/speed", "3"])
		.current_dir(dir)
		.assert()
		.success();

	let saved = fs::read_to_string(dir.join("units/a.spec")).unwrap();
	assert!(saved.contains("  \"motion\":\n    \"speed\": \"3\"\n"));
	assert_eq!(fs::read_to_string(dir.join("units/b.spec")).unwrap(), base_before);
}

#[test]
fn test_show_prints_chain() {
	let temp_dir = project();
	moldspec_cmd(temp_dir.path())
		.args(["show", "units/a.spec"])
		.current_dir(temp_dir.path())
		.assert()
		.success()
		.stdout(predicate::str::contains("# units/a.spec"))
		.stdout(predicate::str::contains("# units/b.spec"));
}

#[test]
fn test_fmt_check_and_rewrite() {
	let temp_dir = project();
	let dir = temp_dir.path();
	fs::write(dir.join("messy.spec"), "# comment\n\"a\":   \"1\"\n\n\"b\": {}\n").unwrap();

	moldspec_cmd(dir)
		.args(["fmt", "messy.spec", "--check"])
		.current_dir(dir)
		.assert()
		.failure()
		.stdout(predicate::str::contains("not canonical"));

	moldspec_cmd(dir)
		.args(["fmt", "messy.spec"])
		.current_dir(dir)
		.assert()
		.success();
	assert_eq!(
		fs::read_to_string(dir.join("messy.spec")).unwrap(),
		"\"a\": \"1\"\n\"b\": {}\n"
	);

	moldspec_cmd(dir)
		.args(["fmt", "messy.spec", "--check"])
		.current_dir(dir)
		.assert()
		.success();
}

#[test]
fn test_malformed_document_reports_line() {
	let temp_dir = project();
	let dir = temp_dir.path();
	fs::write(dir.join("bad.spec"), "\"a\": \"1\"\n\"b\": oops\n").unwrap();

	moldspec_cmd(dir)
		.args(["get", "bad.spec", "a"])
		.current_dir(dir)
		.assert()
		.failure()
		.stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_data_dir_setting() {
	let temp_dir = tempfile::tempdir().unwrap();
	let dir = temp_dir.path();
	fs::write(dir.join(".moldspec.toml"), "root = true\ndata-dir = \"specs\"\n").unwrap();
	fs::create_dir_all(dir.join("specs")).unwrap();
	fs::write(dir.join("specs/x.spec"), "\"properties\":\n  \"k\": \"v\"\n").unwrap();

	moldspec_cmd(dir)
		.args(["get", "x.spec", "k"])
		.current_dir(dir)
		.assert()
		.success()
		.stdout("v\n");
}
