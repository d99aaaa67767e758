//! Package and dependency types.
//!
//! A [`Dependency`] is an unresolved reference by name, optionally guarded by a
//! platform [`Condition`]. Once looked up in a namespace it becomes a
//! [`ResolvedPackage`] carrying a [`PackageId`], the identity used to
//! deduplicate the provisioning set.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::consts::{HASH_PREFIX_LEN, INLINE_SOURCE};
use crate::platform::condition::Condition;
use crate::toolchain::Toolchain;

/// Identity of the source instance a package came from (`<locator>@<rev>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
  pub fn new(locator: &str, rev: &str) -> Self {
    Self(format!("{}@{}", locator, rev))
  }

  /// Identity for packages synthesized inline rather than fetched.
  pub fn inline() -> Self {
    Self(INLINE_SOURCE.to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for SourceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Package identity: name, exact version and source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageId {
  pub name: String,
  pub version: String,
  pub source: SourceId,
}

impl fmt::Display for PackageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{} ({})", self.name, self.version, self.source)
  }
}

/// An unresolved package reference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dependency {
  pub name: String,
  /// Input to look the name up in. `None` searches every input in scope.
  pub from: Option<String>,
  pub condition: Condition,
}

impl Dependency {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      from: None,
      condition: Condition::Always,
    }
  }

  pub fn from_input(mut self, input: impl Into<String>) -> Self {
    self.from = Some(input.into());
    self
  }

  pub fn when(mut self, condition: Condition) -> Self {
    self.condition = condition;
    self
  }
}

/// Which partition a resolved dependency was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
  /// Needed to produce artifacts.
  Build,
  /// Developer workflow only (linters, watchers).
  Dev,
}

/// A dependency after namespace lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPackage {
  pub name: String,
  pub version: String,
  pub source: SourceId,
  pub kind: DependencyKind,
}

/// A named executable synthesized inline, e.g. a fixed-command test runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Script {
  pub name: String,
  pub command: String,
}

impl Script {
  pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      command: command.into(),
    }
  }

  /// Truncated SHA-256 of the command; stands in for a version.
  pub fn digest(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.command.as_bytes());
    let full = hex::encode(hasher.finalize());
    full[..HASH_PREFIX_LEN].to_string()
  }
}

/// An entry of the provisioning set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Package {
  Toolchain(Toolchain),
  Dependency(ResolvedPackage),
  Script(Script),
}

impl Package {
  pub fn name(&self) -> &str {
    match self {
      Package::Toolchain(t) => &t.kind,
      Package::Dependency(p) => &p.name,
      Package::Script(s) => &s.name,
    }
  }

  pub fn id(&self) -> PackageId {
    match self {
      Package::Toolchain(t) => t.package_id(),
      Package::Dependency(p) => PackageId {
        name: p.name.clone(),
        version: p.version.clone(),
        source: p.source.clone(),
      },
      Package::Script(s) => PackageId {
        name: s.name.clone(),
        version: s.digest(),
        source: SourceId::inline(),
      },
    }
  }
}
