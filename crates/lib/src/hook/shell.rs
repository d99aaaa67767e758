//! Shell detection and activation script rendering.

use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::compose::EnvironmentDefinition;
use crate::package::Package;

use super::ResolvedStep;

/// Supported shell types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
  Bash,
  Zsh,
  Fish,
  Sh,
}

impl Shell {
  /// Detect the current shell from `$SHELL`, falling back to POSIX `sh`.
  pub fn detect() -> Self {
    env::var("SHELL")
      .ok()
      .and_then(|shell| {
        let name = Path::new(&shell).file_name()?.to_str()?.to_lowercase();
        Self::parse(&name).or_else(|| {
          ["zsh", "bash", "fish"]
            .into_iter()
            .find(|known| name.contains(known))
            .and_then(Self::parse)
        })
      })
      .unwrap_or(Shell::Sh)
  }

  pub fn parse(name: &str) -> Option<Self> {
    match name {
      "bash" => Some(Shell::Bash),
      "zsh" => Some(Shell::Zsh),
      "fish" => Some(Shell::Fish),
      "sh" | "dash" => Some(Shell::Sh),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Shell::Bash => "bash",
      Shell::Zsh => "zsh",
      Shell::Fish => "fish",
      Shell::Sh => "sh",
    }
  }

  /// Quote a word so the shell reads it literally.
  pub fn quote(&self, word: &str) -> String {
    match self {
      Shell::Fish => format!("'{}'", word.replace('\\', "\\\\").replace('\'', "\\'")),
      Shell::Bash | Shell::Zsh | Shell::Sh => format!("'{}'", word.replace('\'', r"'\''")),
    }
  }

  /// Generate an export statement for setting an environment variable
  pub fn export_var(&self, name: &str, value: &str) -> String {
    match self {
      Shell::Fish => format!("set -gx {} {}", name, self.quote(value)),
      Shell::Bash | Shell::Zsh | Shell::Sh => format!("export {}={}", name, self.quote(value)),
    }
  }

  /// A function named `name` running `command` with the caller's arguments.
  pub fn function(&self, name: &str, command: &str) -> String {
    match self {
      Shell::Fish => format!("function {}\n  {} $argv\nend", name, command),
      Shell::Bash | Shell::Zsh | Shell::Sh => format!("{}() {{\n  {} \"$@\"\n}}", name, command),
    }
  }

  /// Wrap `command` so it only runs while `path` does not exist.
  pub fn guard(&self, path: &str, command: &str) -> String {
    match self {
      Shell::Fish => format!("if not test -e {}\n  {}\nend", self.quote(path), command),
      Shell::Bash | Shell::Zsh | Shell::Sh => {
        format!("if [ ! -e {} ]; then\n  {}\nfi", self.quote(path), command)
      }
    }
  }

  pub fn comment(&self, text: &str) -> String {
    format!("# {}", text)
  }

  pub fn header(&self) -> &'static str {
    match self {
      Shell::Bash => "#!/usr/bin/env bash",
      Shell::Zsh => "#!/usr/bin/env zsh",
      Shell::Fish => "# fish activation script",
      Shell::Sh => "#!/bin/sh",
    }
  }

  pub fn render_step(&self, step: &ResolvedStep) -> String {
    let command = match step {
      ResolvedStep::Exec { argv, .. } => argv.iter().map(|w| self.quote(w)).collect::<Vec<_>>().join(" "),
      ResolvedStep::Inline { run, .. } => run.clone(),
    };
    match step.creates() {
      Some(path) => self.guard(path, &command),
      None => command,
    }
  }

  /// Render the script a shell sources to enter `def`.
  ///
  /// Sections, in order: provided packages (as comments), env exports in
  /// composition order, script functions, hook steps.
  pub fn render_activation(&self, def: &EnvironmentDefinition) -> String {
    let mut lines = vec![
      self.header().to_string(),
      self.comment(&format!("envsys environment for {}", def.system)),
    ];

    for package in &def.packages {
      if !matches!(package, Package::Script(_)) {
        lines.push(self.comment(&format!("provides {}", package.id())));
      }
    }

    for (name, value) in &def.env {
      lines.push(self.export_var(name, value));
    }

    for package in &def.packages {
      if let Package::Script(script) = package {
        lines.push(self.function(&script.name, &script.command));
      }
    }

    for step in &def.hook.steps {
      lines.push(self.render_step(step));
    }

    let mut script = lines.join("\n");
    script.push('\n');
    script
  }
}

impl FromStr for Shell {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(&s.to_lowercase()).ok_or_else(|| format!("unsupported shell '{}' (expected bash, zsh, fish or sh)", s))
  }
}

impl fmt::Display for Shell {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
