//! Platform conditions attached to dependencies.
//!
//! Conditions are plain data evaluated against a [`System`]. Evaluation is pure
//! and total: a system whose architecture or OS is not recognized simply fails
//! every family predicate, it never produces an error.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::System;
use super::arch::Arch;
use super::os::Os;
use crate::package::Dependency;

/// A predicate over [`System`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Condition {
  /// Unconditional.
  #[default]
  Always,
  /// OS family, e.g. `darwin`.
  Os(Os),
  /// CPU architecture, e.g. `aarch64`.
  Arch(Arch),
  /// Exact system identifier, e.g. `aarch64-darwin`.
  System(System),
  Not(Box<Condition>),
  Any(Vec<Condition>),
  All(Vec<Condition>),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown platform condition '{0}': expected an OS family, an architecture or a '<arch>-<os>' system")]
pub struct ConditionParseError(pub String);

impl Condition {
  /// Evaluate the condition for `system`.
  pub fn matches(&self, system: &System) -> bool {
    match self {
      Condition::Always => true,
      Condition::Os(os) => system.os() == Some(*os),
      Condition::Arch(arch) => system.arch() == Some(*arch),
      Condition::System(exact) => exact == system,
      Condition::Not(inner) => !inner.matches(system),
      Condition::Any(conds) => conds.iter().any(|c| c.matches(system)),
      Condition::All(conds) => conds.iter().all(|c| c.matches(system)),
    }
  }

  pub fn is_always(&self) -> bool {
    matches!(self, Condition::Always)
  }
}

impl FromStr for Condition {
  type Err = ConditionParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s == "always" {
      return Ok(Condition::Always);
    }
    if let Some(os) = Os::parse(s) {
      return Ok(Condition::Os(os));
    }
    if let Some(arch) = Arch::parse(s) {
      return Ok(Condition::Arch(arch));
    }
    match s.split_once('-') {
      Some((arch, os)) if !arch.is_empty() && !os.is_empty() => Ok(Condition::System(System::new(s))),
      _ => Err(ConditionParseError(s.to_string())),
    }
  }
}

impl fmt::Display for Condition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let join = |f: &mut fmt::Formatter<'_>, op: &str, conds: &[Condition]| {
      let parts: Vec<String> = conds.iter().map(|c| c.to_string()).collect();
      write!(f, "{}({})", op, parts.join(", "))
    };
    match self {
      Condition::Always => f.write_str("always"),
      Condition::Os(os) => write!(f, "{}", os),
      Condition::Arch(arch) => write!(f, "{}", arch),
      Condition::System(system) => write!(f, "{}", system),
      Condition::Not(inner) => write!(f, "not({})", inner),
      Condition::Any(conds) => join(f, "any", conds),
      Condition::All(conds) => join(f, "all", conds),
    }
  }
}

/// Whether `dep` applies to `system`.
pub fn applicable(dep: &Dependency, system: &System) -> bool {
  dep.condition.matches(system)
}
