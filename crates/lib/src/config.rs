//! The parsed `envsys.lua` configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::hook::HookStep;
use crate::inputs::InputDecls;
use crate::package::{Dependency, Script};
use crate::platform::System;
use crate::toolchain::ToolchainRequest;

/// One layer of environment variables. Keys within a layer are ordered by name;
/// layers are merged in declaration order.
pub type EnvLayer = BTreeMap<String, String>;

/// Everything an environment is composed from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
  /// Canonical path of the config file.
  pub path: PathBuf,
  pub inputs: InputDecls,
  /// Systems to evaluate. Empty means the defaults.
  pub systems: Vec<System>,
  pub toolchain: Option<ToolchainRequest>,
  pub packages: Vec<Dependency>,
  pub dev_packages: Vec<Dependency>,
  pub scripts: Vec<Script>,
  pub env: Vec<EnvLayer>,
  pub hook: Vec<HookStep>,
}

impl Config {
  /// Directory relative `path:` locators are resolved against.
  pub fn dir(&self) -> &Path {
    self.path.parent().unwrap_or(Path::new("."))
  }

  /// Configured systems, or [`System::defaults`] when none are listed.
  pub fn systems(&self) -> Vec<System> {
    if self.systems.is_empty() {
      System::defaults()
    } else {
      self.systems.clone()
    }
  }
}
