use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use moldspec::config::{
	CONFIG_FILE_NAME, MergedConfig, discover_configs, generate_init_template, load_merged_config,
	user_config_path,
};
use moldspec::spec::Spec;
use moldspec::{Context, DocPath, Node};

/// Environment variable holding a tracing filter; overrides every other setting.
const LOG_ENV_VAR: &str = "MOLDSPEC_LOG";

#[derive(Parser)]
#[command(name = "moldspec")]
#[command(
	author,
	version,
	about = "Layered configuration documents with base inheritance and schema molding"
)]
#[command(arg_required_else_help = true)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	/// Create a template .moldspec.toml in the current directory
	#[arg(long)]
	init: bool,

	/// Overwrite existing .moldspec.toml when using --init
	#[arg(long, requires = "init")]
	force: bool,

	/// Increase log output (-v debug, -vv trace)
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
	/// Print the effective value at a key path
	Get {
		/// Document path relative to the data directory
		doc: String,
		/// Key path below `properties`, separated by `/`
		key: String,
	},
	/// Print an ordered list, one entry per line
	List {
		doc: String,
		key: String,
		/// Show held entries as this value instead of dropping them
		#[arg(long)]
		fill: Option<String>,
	},
	/// Print the effective keys of a mapping
	Keys {
		doc: String,
		/// Key path; the properties root when omitted
		key: Option<String>,
	},
	/// Set a scalar in this document and save it
	Set { doc: String, key: String, value: String },
	/// Remove a key from this document so the base shows through
	Unset { doc: String, key: String },
	/// Hide a key: it reads as undefined, whatever the base says
	Hide { doc: String, key: String },
	/// Hold a key: it reads as the caller's default, whatever the base says
	Hold { doc: String, key: String },
	/// Print every document of the base chain
	Show { doc: String },
	/// Rewrite a document in canonical form
	Fmt {
		doc: String,
		/// Report whether the document is canonical without writing
		#[arg(long)]
		check: bool,
	},
	/// Settings management commands
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},
}

#[derive(Subcommand)]
enum ConfigAction {
	/// Display merged effective settings with source annotations
	Show,
	/// Check all settings files for errors without running anything
	Validate,
}

fn main() -> ExitCode {
	match run() {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:?}");
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<ExitCode> {
	let cli = Cli::parse();

	// Handle --init
	if cli.init {
		init_logging(cli.verbose, None);
		return handle_init(cli.force);
	}

	let Some(command) = cli.command else {
		// No command specified - this shouldn't happen due to arg_required_else_help
		return Ok(ExitCode::SUCCESS);
	};

	if let Commands::Config { action } = command {
		init_logging(cli.verbose, None);
		return match action {
			ConfigAction::Show => handle_config_show(),
			ConfigAction::Validate => handle_config_validate(),
		};
	}

	let cwd = std::env::current_dir().context("Failed to get current directory")?;
	let config = load_merged_config(&cwd).context("Failed to load configuration")?;
	init_logging(cli.verbose, config.log_level.as_deref());
	let ctx = Context::from_config(&config);

	match command {
		Commands::Get { doc, key } => handle_get(&ctx, &doc, &key),
		Commands::List { doc, key, fill } => handle_list(&ctx, &doc, &key, fill),
		Commands::Keys { doc, key } => handle_keys(&ctx, &doc, key.as_deref().unwrap_or("")),
		Commands::Set { doc, key, value } => {
			mutate(&ctx, &doc, |spec| Ok(spec.set(&key_path(&key), Node::scalar(value))?))
		}
		Commands::Unset { doc, key } => mutate(&ctx, &doc, |spec| {
			if !spec.remove(&key_path(&key))? {
				eprintln!("warning: {key} is not set in {doc}");
			}
			Ok(())
		}),
		Commands::Hide { doc, key } => mutate(&ctx, &doc, |spec| Ok(spec.hide(&key_path(&key))?)),
		Commands::Hold { doc, key } => mutate(&ctx, &doc, |spec| Ok(spec.hold(&key_path(&key))?)),
		Commands::Show { doc } => handle_show(&ctx, &doc),
		Commands::Fmt { doc, check } => handle_fmt(&ctx, &doc, check),
		Commands::Config { .. } => unreachable!("handled above"),
	}
}

/// Install the stderr subscriber: `MOLDSPEC_LOG`, else `-v`, else `log-level`.
fn init_logging(verbose: u8, configured: Option<&str>) {
	let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| {
		let level = match verbose {
			0 => configured.unwrap_or("warn"),
			1 => "debug",
			_ => "trace",
		};
		EnvFilter::new(level)
	});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.init();
}

/// Split a command-line key path. Dots stay inside a key so that
/// fractional list keys such as `0.5` can be addressed.
fn key_path(key: &str) -> Vec<String> {
	key.split('/')
		.filter(|segment| !segment.is_empty())
		.map(str::to_string)
		.collect()
}

fn open(ctx: &Context, doc: &str) -> Result<Arc<Spec>> {
	ctx.open(doc).with_context(|| format!("Failed to open {doc}"))
}

fn print_node(ctx: &Context, node: &Node) {
	match node {
		Node::Scalar(value) => println!("{value}"),
		other => print!("{}", ctx.formatter().format(other)),
	}
}

fn handle_get(ctx: &Context, doc: &str, key: &str) -> Result<ExitCode> {
	let spec = open(ctx, doc)?;
	let node = spec
		.get(&key_path(key))
		.with_context(|| format!("Failed to read {key} from {doc}"))?;
	print_node(ctx, &node);
	Ok(ExitCode::SUCCESS)
}

fn handle_list(ctx: &Context, doc: &str, key: &str, fill: Option<String>) -> Result<ExitCode> {
	let spec = open(ctx, doc)?;
	let path = key_path(key);
	let items = match fill {
		Some(fill) => spec.read_list_or(&path, Node::scalar(fill)),
		None => spec.read_list(&path),
	}
	.with_context(|| format!("Failed to read list {key} from {doc}"))?;

	for item in &items {
		print_node(ctx, item);
	}
	Ok(ExitCode::SUCCESS)
}

fn handle_keys(ctx: &Context, doc: &str, key: &str) -> Result<ExitCode> {
	let spec = open(ctx, doc)?;
	let keys = spec
		.keys(&key_path(key))
		.with_context(|| format!("Failed to read keys of {key:?} from {doc}"))?;
	for name in keys {
		println!("{name}");
	}
	Ok(ExitCode::SUCCESS)
}

/// Apply one change to the named document (not its bases) and save it.
fn mutate(ctx: &Context, doc: &str, change: impl FnOnce(&Spec) -> Result<()>) -> Result<ExitCode> {
	let spec = open(ctx, doc)?;
	change(&spec).with_context(|| format!("Failed to update {doc}"))?;
	ctx.save(spec.document())
		.with_context(|| format!("Failed to save {doc}"))?;
	Ok(ExitCode::SUCCESS)
}

fn handle_show(ctx: &Context, doc: &str) -> Result<ExitCode> {
	let spec = open(ctx, doc)?;
	let formatter = ctx.formatter();

	for (depth, level) in spec.levels().enumerate() {
		if depth > 0 {
			println!();
		}
		match level.base_reference()? {
			Some(base) => println!("# {} (base: {base})", level.identity()),
			None => println!("# {}", level.identity()),
		}
		print!("{}", level.document().to_text(&formatter));
	}
	Ok(ExitCode::SUCCESS)
}

fn handle_fmt(ctx: &Context, doc: &str, check: bool) -> Result<ExitCode> {
	let path = DocPath::parse(doc).with_context(|| format!("Invalid document path {doc}"))?;
	let original = ctx
		.fs()
		.read_text(&path)
		.with_context(|| format!("Failed to read {doc}"))?;
	let document = ctx.fetch(&path).with_context(|| format!("Failed to open {doc}"))?;
	let canonical = document.to_text(&ctx.formatter());

	if original == canonical {
		return Ok(ExitCode::SUCCESS);
	}
	if check {
		println!("{doc} is not canonical");
		return Ok(ExitCode::FAILURE);
	}

	ctx.save(&document)
		.with_context(|| format!("Failed to save {doc}"))?;
	println!("Formatted {doc}");
	Ok(ExitCode::SUCCESS)
}

fn handle_init(force: bool) -> Result<ExitCode> {
	let config_path = PathBuf::from(CONFIG_FILE_NAME);

	if config_path.exists() && !force {
		anyhow::bail!("{CONFIG_FILE_NAME} already exists. Use --force to overwrite.");
	}

	std::fs::write(&config_path, generate_init_template())
		.with_context(|| format!("Failed to write {}", config_path.display()))?;

	println!("Created {CONFIG_FILE_NAME}");
	Ok(ExitCode::SUCCESS)
}

fn handle_config_show() -> Result<ExitCode> {
	let cwd = std::env::current_dir().context("Failed to get current directory")?;
	let configs = discover_configs(&cwd).context("Failed to discover config files")?;

	if configs.is_empty() {
		println!("No configuration files found.");
	} else {
		println!("Configuration files (in cascade order):\n");
		for loaded in &configs {
			let config = &loaded.config;
			println!("# Source: {}", loaded.path.display());
			println!("# root: {}", config.root);
			if let Some(ref dir) = config.data_dir {
				println!("# data-dir: {}", dir.display());
			}
			if let Some(accept) = config.accept_empty {
				println!("# accept-empty: {accept}");
			}
			if let Some(collapse) = config.collapse_empty {
				println!("# collapse-empty: {collapse}");
			}
			if let Some(ref placeholder) = config.empty_placeholder {
				println!("# empty-placeholder: {placeholder}");
			}
			if let Some(ref level) = config.log_level {
				println!("# log-level: {level}");
			}
			if let Some(ref env_var) = config.root_config_lookup_disable_env_var {
				println!("# root-config-lookup-disable-env-var: {env_var}");
			}
			println!();
		}
	}

	print_effective(&moldspec::config::merge_configs(&configs, &cwd));

	// Show user config path
	if let Ok(user_path) = user_config_path() {
		println!("User config path: {}", user_path.display());
		if user_path.exists() {
			println!("  (exists)");
		} else {
			println!("  (not found)");
		}
	}

	Ok(ExitCode::SUCCESS)
}

fn print_effective(merged: &MergedConfig) {
	println!("Effective settings:");
	println!("  data-dir: {}", merged.data_dir.display());
	println!("  accept-empty: {}", merged.accept_empty);
	println!("  collapse-empty: {}", merged.collapse_empty);
	if let Some(ref placeholder) = merged.empty_placeholder {
		println!("  empty-placeholder: {placeholder}");
	}
	println!("  log-level: {}", merged.log_level.as_deref().unwrap_or("warn"));
	println!();
}

fn handle_config_validate() -> Result<ExitCode> {
	let cwd = std::env::current_dir().context("Failed to get current directory")?;

	match discover_configs(&cwd) {
		Ok(configs) => {
			if configs.is_empty() {
				println!("No configuration files found.");
			} else {
				println!("All configuration files are valid:");
				for loaded in &configs {
					println!("  {}", loaded.path.display());
				}
			}
			Ok(ExitCode::SUCCESS)
		}
		Err(e) => {
			eprintln!("Configuration error: {e}");
			Ok(ExitCode::FAILURE)
		}
	}
}
