//! Shell hook sequencing.
//!
//! A hook is the ordered list of one-time setup actions run when the
//! environment is entered (installing git hooks, creating a local database,
//! ...). Declaration order is execution order. A step may name a `creates`
//! path; once that path exists the step is skipped, so re-entering the
//! environment is idempotent. A step with a `when` condition is dropped on
//! systems it does not match.
//!
//! An `Exec` step's binary is looked up in the composed package set first
//! (dependencies by name, the toolchain by kind) and only falls back to the
//! input namespace when nothing provisioned provides it.

pub mod shell;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::inputs::namespace::{LookupError, Namespace};
use crate::package::{Dependency, DependencyKind, Package, PackageId};
use crate::platform::System;
use crate::platform::condition::Condition;

/// What a declared step does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
  /// Run a binary provided by a package. `package` defaults to `bin`; `from`
  /// restricts the provider to one input.
  Exec {
    bin: String,
    args: Vec<String>,
    package: Option<String>,
    from: Option<String>,
  },
  /// A raw shell command.
  Inline { run: String },
}

/// A hook step as declared in the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookStep {
  pub action: HookAction,
  /// Skip the step when this path already exists.
  pub creates: Option<String>,
  pub condition: Condition,
}

impl HookStep {
  pub fn inline(run: impl Into<String>) -> Self {
    Self {
      action: HookAction::Inline { run: run.into() },
      creates: None,
      condition: Condition::Always,
    }
  }

  pub fn exec(bin: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
    Self {
      action: HookAction::Exec {
        bin: bin.into(),
        args: args.into_iter().map(Into::into).collect(),
        package: None,
        from: None,
      },
      creates: None,
      condition: Condition::Always,
    }
  }

  /// Name the package providing an `Exec` step's binary. No-op for inline steps.
  pub fn with_package(mut self, name: impl Into<String>) -> Self {
    if let HookAction::Exec { package, .. } = &mut self.action {
      *package = Some(name.into());
    }
    self
  }

  /// Restrict an `Exec` step's provider to `input`. No-op for inline steps.
  pub fn from_input(mut self, input: impl Into<String>) -> Self {
    if let HookAction::Exec { from, .. } = &mut self.action {
      *from = Some(input.into());
    }
    self
  }

  pub fn creates(mut self, path: impl Into<String>) -> Self {
    self.creates = Some(path.into());
    self
  }

  pub fn when(mut self, condition: Condition) -> Self {
    self.condition = condition;
    self
  }
}

/// A step with its binary resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolvedStep {
  Exec {
    argv: Vec<String>,
    provider: PackageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    creates: Option<String>,
  },
  Inline {
    run: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    creates: Option<String>,
  },
}

impl ResolvedStep {
  pub fn creates(&self) -> Option<&str> {
    match self {
      ResolvedStep::Exec { creates, .. } | ResolvedStep::Inline { creates, .. } => creates.as_deref(),
    }
  }
}

/// Ordered setup steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ShellHook {
  pub steps: Vec<ResolvedStep>,
}

impl ShellHook {
  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HookError {
  #[error("hook step {step}: {source}")]
  Lookup {
    step: usize,
    #[source]
    source: LookupError,
  },

  #[error("hook step {step} has an empty command")]
  EmptyCommand { step: usize },
}

/// Resolve declared steps for `system`, keeping their order.
///
/// `provisioned` is the composed package set. An `Exec` step whose package is
/// not part of it is looked up in `ns` instead and resolves with a warning.
pub fn sequence(
  steps: &[HookStep],
  ns: &Namespace<'_>,
  system: &System,
  provisioned: &[Package],
) -> Result<ShellHook, HookError> {
  let mut resolved = Vec::with_capacity(steps.len());

  for (index, step) in steps.iter().enumerate() {
    let number = index + 1;
    if !step.condition.matches(system) {
      debug!(step = number, system = %system, condition = %step.condition, "skipping hook step");
      continue;
    }
    let creates = step.creates.clone();

    let entry = match &step.action {
      HookAction::Inline { run } => {
        if run.trim().is_empty() {
          return Err(HookError::EmptyCommand { step: number });
        }
        ResolvedStep::Inline {
          run: run.clone(),
          creates,
        }
      }
      HookAction::Exec {
        bin,
        args,
        package,
        from,
      } => {
        if bin.is_empty() {
          return Err(HookError::EmptyCommand { step: number });
        }
        let name = package.as_deref().unwrap_or(bin);
        let lookup = |source| HookError::Lookup { step: number, source };

        let provider = match find_provisioned(ns, provisioned, name, from.as_deref()).map_err(lookup)? {
          Some(id) => id,
          None => {
            let mut dep = Dependency::new(name);
            if let Some(input) = from {
              dep = dep.from_input(input.clone());
            }
            let resolved = ns.package(&dep, system, DependencyKind::Build).map_err(lookup)?;
            let provider = Package::Dependency(resolved).id();
            warn!(
              step = number,
              package = %provider,
              "hook step uses a package that is not in the environment"
            );
            provider
          }
        };

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(bin.clone());
        argv.extend(args.iter().cloned());
        ResolvedStep::Exec {
          argv,
          provider,
          creates,
        }
      }
    };

    debug!(step = number, system = %system, "sequenced hook step");
    resolved.push(entry);
  }

  Ok(ShellHook { steps: resolved })
}

/// The provisioned package or toolchain called `name`, restricted to input
/// `from` when given. Scripts never provide binaries.
fn find_provisioned(
  ns: &Namespace<'_>,
  provisioned: &[Package],
  name: &str,
  from: Option<&str>,
) -> Result<Option<PackageId>, LookupError> {
  let source = from.map(|input| ns.input(input).map(|i| i.source_id())).transpose()?;
  Ok(
    provisioned
      .iter()
      .filter(|p| !matches!(p, Package::Script(_)) && p.name() == name)
      .map(Package::id)
      .find(|id| source.as_ref().is_none_or(|s| &id.source == s)),
  )
}
