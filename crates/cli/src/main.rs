mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use envsys_lib::consts::CONFIG_FILENAME;
use envsys_lib::hook::shell::Shell;

use crate::cmd::{EnterArgs, cmd_enter};
use crate::output::OutputFormat;

/// envsys - Reproducible development environments
///
/// Evaluates envsys.lua for the current system and prints a shell activation
/// script (eval "$(envsys)").
#[derive(Parser)]
#[command(name = "envsys")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Path to the configuration file
  #[arg(short, long, default_value = CONFIG_FILENAME)]
  config: PathBuf,

  /// System to evaluate (repeatable); defaults to the current system
  #[arg(long = "system", value_name = "SYSTEM")]
  systems: Vec<String>,

  /// Evaluate every configured system
  #[arg(long, conflicts_with = "systems")]
  all: bool,

  /// Shell to render the activation script for (auto-detected if not specified)
  #[arg(long)]
  shell: Option<Shell>,

  /// Output format
  #[arg(long, value_enum, default_value_t)]
  format: OutputFormat,

  /// Enable verbose output
  #[arg(short, long)]
  verbose: bool,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let success = cmd_enter(EnterArgs {
    config: cli.config,
    systems: cli.systems,
    all: cli.all,
    shell: cli.shell.unwrap_or_else(Shell::detect),
    format: cli.format,
  })?;

  if !success {
    std::process::exit(1);
  }
  Ok(())
}
