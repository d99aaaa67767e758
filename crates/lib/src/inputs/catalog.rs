//! What a fetched input offers.
//!
//! Every input root carries a `catalog.lua` describing its own sub-inputs, the
//! packages it provides and the toolchains it can build. Catalogs are plain
//! data once loaded; see [`crate::lua::catalog`] for the Lua side.

use std::collections::{BTreeMap, BTreeSet};

use crate::package::Dependency;
use crate::platform::System;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
  /// Sub-inputs this input depends on: name -> locator.
  pub inputs: BTreeMap<String, String>,
  pub packages: BTreeMap<String, PackageOffer>,
  /// Toolchains keyed by kind (e.g. `rust`).
  pub toolchains: BTreeMap<String, ToolchainOffer>,
}

/// A package provided by an input at one exact version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOffer {
  pub version: String,
  /// Systems the package is offered for. `None` means every system.
  pub systems: Option<BTreeSet<System>>,
}

impl PackageOffer {
  pub fn new(version: impl Into<String>) -> Self {
    Self {
      version: version.into(),
      systems: None,
    }
  }

  pub fn available_on(&self, system: &System) -> bool {
    self.systems.as_ref().is_none_or(|systems| systems.contains(system))
  }
}

/// The versions and optional components an input offers for one toolchain kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainOffer {
  pub versions: BTreeSet<String>,
  pub extensions: BTreeSet<String>,
  pub targets: BTreeSet<String>,
  /// Packages the toolchain needs at runtime, looked up in the offering
  /// input's own sub-inputs.
  pub requires: Vec<Dependency>,
}
