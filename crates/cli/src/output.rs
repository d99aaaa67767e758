//! Terminal output for the envsys CLI.
//!
//! Summaries go to stdout, failures to stderr. Colors are applied only when
//! the stream supports them.

use std::fmt::Display;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use envsys_lib::compose::EnvironmentDefinition;
use envsys_lib::platform::System;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  /// Activation script for one system, or a summary for several
  #[default]
  Text,
  /// The per-system projection as JSON
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

const OK: &str = "✓";
const FAILED: &str = "✗";

/// One line per resolved system followed by its packages, env and hook.
pub fn print_definition(def: &EnvironmentDefinition) {
  println!(
    "{} {}",
    OK.if_supports_color(Stream::Stdout, |s| s.green()),
    def.system.if_supports_color(Stream::Stdout, |s| s.bold())
  );

  let packages: Vec<String> = def
    .packages
    .iter()
    .map(|p| {
      let id = p.id();
      format!("{} {}", id.name, id.version)
    })
    .collect();
  print_field("packages", &packages.join(", "));

  let env: Vec<&str> = def.env.keys().map(String::as_str).collect();
  print_field("env", &env.join(", "));

  if !def.hook.is_empty() {
    print_field("hook", &format!("{} step(s)", def.hook.steps.len()));
  }
}

pub fn print_failure(system: &System, err: &impl Display) {
  eprintln!(
    "{} {}: {}",
    FAILED.if_supports_color(Stream::Stderr, |s| s.red()),
    system.if_supports_color(Stream::Stderr, |s| s.bold()),
    err.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

fn print_field(label: &str, value: &str) {
  if value.is_empty() {
    return;
  }
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
