//! Host platform identification.
//!
//! A [`System`] is the resolution key for every environment definition. It is an
//! opaque identifier such as `"aarch64-darwin"`; the architecture and OS family
//! are parsed on demand and an unrecognized part simply yields `None`.

pub mod arch;
pub mod condition;
pub mod os;
pub mod paths;

use std::fmt;

use arch::Arch;
use os::Os;
use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_SYSTEMS;

/// Platform identifier combining architecture and OS (e.g., "aarch64-darwin")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct System(String);

impl System {
  /// Wrap an identifier verbatim. Never fails; unknown identifiers are valid systems.
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  /// Build the identifier for a known architecture and OS.
  pub fn from_parts(arch: Arch, os: Os) -> Self {
    Self(format!("{}-{}", arch, os))
  }

  /// Detect the current system at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self::from_parts(Arch::current()?, Os::current()?))
  }

  /// The fixed default set used when no systems are configured.
  pub fn defaults() -> Vec<Self> {
    DEFAULT_SYSTEMS.iter().map(|s| Self::new(*s)).collect()
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Architecture part of the identifier, if recognized.
  pub fn arch(&self) -> Option<Arch> {
    let (arch, _) = self.0.split_once('-')?;
    Arch::parse(arch)
  }

  /// OS family part of the identifier, if recognized.
  pub fn os(&self) -> Option<Os> {
    let (_, os) = self.0.split_once('-')?;
    Os::parse(os)
  }
}

impl fmt::Display for System {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for System {
  fn from(id: &str) -> Self {
    Self::new(id)
  }
}
