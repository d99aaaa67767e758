//! The single `envsys` action: evaluate the config and enter the environment.
//!
//! With one system (the default) the text output is an activation script for
//! `eval`. With several systems, or `--all`, a per-system summary is printed
//! instead. Either way the exit status is non-zero if any system failed.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::debug;

use envsys_lib::eval::evaluate_path;
use envsys_lib::hook::shell::Shell;
use envsys_lib::platform::System;
use envsys_lib::project::Projection;

use crate::output::{OutputFormat, print_definition, print_failure, print_json};

pub struct EnterArgs {
  pub config: PathBuf,
  pub systems: Vec<String>,
  pub all: bool,
  pub shell: Shell,
  pub format: OutputFormat,
}

/// Returns whether every evaluated system succeeded.
pub fn cmd_enter(args: EnterArgs) -> Result<bool> {
  if !args.config.exists() {
    bail!("Config file not found: {}", args.config.display());
  }

  let systems = requested_systems(&args)?;
  debug!(systems = ?systems, shell = %args.shell, "entering environment");

  let projection = evaluate_path(&args.config, systems.as_deref())
    .with_context(|| format!("Failed to evaluate config: {}", args.config.display()))?;

  if args.format.is_json() {
    print_json(&projection)?;
    return Ok(projection.is_success());
  }

  match (args.all, projection.results.len()) {
    (false, 1) => print_activation(&projection, args.shell),
    _ => print_summary(&projection),
  }

  Ok(projection.is_success())
}

/// `None` means every configured system.
fn requested_systems(args: &EnterArgs) -> Result<Option<Vec<System>>> {
  if args.all {
    return Ok(None);
  }
  if !args.systems.is_empty() {
    return Ok(Some(args.systems.iter().map(|s| System::new(s.as_str())).collect()));
  }
  let current = System::current().context("Could not detect the current system; pass --system")?;
  Ok(Some(vec![current]))
}

fn print_activation(projection: &Projection, shell: Shell) {
  for (system, result) in &projection.results {
    match result {
      Ok(def) => print!("{}", shell.render_activation(def)),
      Err(err) => print_failure(system, err),
    }
  }
}

fn print_summary(projection: &Projection) {
  for (system, result) in &projection.results {
    match result {
      Ok(def) => print_definition(def),
      Err(err) => print_failure(system, err),
    }
  }
}
