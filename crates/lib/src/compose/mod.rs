//! Environment composition.
//!
//! Builds one system's provisioning set in a fixed order: the toolchain, its
//! applicable runtime requirements, applicable build packages, applicable dev
//! packages, then scripts. Conditions are evaluated before lookup, so a
//! package gated to another platform is never looked up at all.
//!
//! Entries are keyed by name. Re-adding an identical [`PackageId`] keeps the
//! first position and takes the later entry; the same name with a different
//! identity is a [`ComposeError::ConflictingPackage`].

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::config::EnvLayer;
use crate::hook::ShellHook;
use crate::inputs::namespace::{LookupError, Namespace};
use crate::package::{Dependency, DependencyKind, Package, PackageId, Script};
use crate::platform::System;
use crate::platform::condition::applicable;
use crate::toolchain::SelectedToolchain;

/// The fully computed environment for one system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentDefinition {
  pub system: System,
  pub packages: Vec<Package>,
  pub env: IndexMap<String, String>,
  pub hook: ShellHook,
}

impl EnvironmentDefinition {
  pub fn package(&self, name: &str) -> Option<&Package> {
    self.packages.iter().find(|p| p.name() == name)
  }
}

/// Everything a definition is composed from, besides the system and namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposeInput<'a> {
  pub toolchain: Option<&'a SelectedToolchain>,
  pub packages: &'a [Dependency],
  pub dev_packages: &'a [Dependency],
  pub scripts: &'a [Script],
  pub env: &'a [EnvLayer],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
  #[error("package '{name}': {source}")]
  Lookup {
    name: String,
    #[source]
    source: LookupError,
  },

  #[error("toolchain '{toolchain}' requires '{name}': {source}")]
  Requirement {
    toolchain: String,
    name: String,
    #[source]
    source: LookupError,
  },

  #[error("conflicting package '{name}': {existing} vs {incoming}")]
  ConflictingPackage {
    name: String,
    existing: PackageId,
    incoming: PackageId,
  },
}

/// Compose the environment for `system`.
///
/// The returned definition has an empty hook; see [`crate::hook::sequence`].
pub fn compose(
  system: &System,
  ns: &Namespace<'_>,
  input: ComposeInput<'_>,
) -> Result<EnvironmentDefinition, ComposeError> {
  let mut set = PackageSet::default();

  if let Some(selected) = input.toolchain {
    set.push(Package::Toolchain(selected.toolchain.clone()))?;

    let scope = Namespace::scoped(&selected.provider);
    for req in selected.requires.iter().filter(|d| applicable(d, system)) {
      let resolved = scope
        .package(req, system, DependencyKind::Build)
        .map_err(|source| ComposeError::Requirement {
          toolchain: selected.toolchain.kind.clone(),
          name: req.name.clone(),
          source,
        })?;
      set.push(Package::Dependency(resolved))?;
    }
  }

  for (deps, kind) in [
    (input.packages, DependencyKind::Build),
    (input.dev_packages, DependencyKind::Dev),
  ] {
    for dep in deps {
      if !applicable(dep, system) {
        trace!(package = %dep.name, condition = %dep.condition, system = %system, "skipping inapplicable package");
        continue;
      }
      let resolved = ns
        .package(dep, system, kind)
        .map_err(|source| ComposeError::Lookup {
          name: dep.name.clone(),
          source,
        })?;
      set.push(Package::Dependency(resolved))?;
    }
  }

  for script in input.scripts {
    set.push(Package::Script(script.clone()))?;
  }

  let env = merge_env(input.env);
  let packages: Vec<Package> = set.entries.into_values().collect();

  info!(system = %system, packages = packages.len(), env = env.len(), "composed environment");
  Ok(EnvironmentDefinition {
    system: system.clone(),
    packages,
    env,
    hook: ShellHook::default(),
  })
}

/// Merge env layers in order. Later values win; a key keeps the position of
/// its first insertion.
pub fn merge_env(layers: &[EnvLayer]) -> IndexMap<String, String> {
  let mut env = IndexMap::new();
  for layer in layers {
    for (name, value) in layer {
      env.insert(name.clone(), value.clone());
    }
  }
  env
}

#[derive(Default)]
struct PackageSet {
  entries: IndexMap<String, Package>,
}

impl PackageSet {
  fn push(&mut self, package: Package) -> Result<(), ComposeError> {
    match self.entries.entry(package.name().to_string()) {
      Entry::Vacant(slot) => {
        debug!(package = %package.id(), "adding package");
        slot.insert(package);
      }
      Entry::Occupied(mut slot) => {
        let existing = slot.get().id();
        let incoming = package.id();
        if existing != incoming {
          return Err(ComposeError::ConflictingPackage {
            name: slot.key().clone(),
            existing,
            incoming,
          });
        }
        trace!(package = %incoming, "deduplicated package");
        slot.insert(package);
      }
    }
    Ok(())
  }
}
