//! Explicit package lookup over resolved inputs.
//!
//! Nothing is brought into scope implicitly: every package reference is a
//! named lookup against a [`Namespace`], optionally pinned to one input with
//! `from`. A name offered by several distinct source instances must be
//! disambiguated; aliases of one instance (through `follows`) count once.

use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use super::catalog::ToolchainOffer;
use super::types::{ResolvedInput, ResolvedInputs};
use crate::package::{Dependency, DependencyKind, ResolvedPackage};
use crate::platform::System;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
  #[error("unknown component '{name}' in {scope}")]
  UnknownComponent { name: String, scope: String },

  #[error("unknown input '{name}'")]
  UnknownInput { name: String },

  #[error("'{name}' is provided by several inputs ({}); set `from` to pick one", .inputs.join(", "))]
  Ambiguous { name: String, inputs: Vec<String> },

  #[error("'{name}' is not available on {system}")]
  Unavailable { name: String, system: String },
}

/// Lookup table over a set of resolved inputs.
#[derive(Debug, Clone, Copy)]
pub struct Namespace<'a> {
  inputs: &'a ResolvedInputs,
}

impl<'a> Namespace<'a> {
  pub fn new(inputs: &'a ResolvedInputs) -> Self {
    Self { inputs }
  }

  /// Find an input by name or by a `parent/child` path through sub-inputs.
  pub fn input(&self, path: &str) -> Result<&'a Arc<ResolvedInput>, LookupError> {
    let unknown = || LookupError::UnknownInput { name: path.to_string() };
    let mut segments = path.split('/');
    let first = segments.next().ok_or_else(unknown)?;
    let mut current = self.inputs.get(first).ok_or_else(unknown)?;
    for segment in segments {
      current = current.inputs.get(segment).ok_or_else(unknown)?;
    }
    Ok(current)
  }

  /// Namespace over one input's own sub-inputs.
  pub fn scoped(input: &'a ResolvedInput) -> Self {
    Self::new(&input.inputs)
  }

  /// Resolve a dependency for `system`.
  ///
  /// The caller is expected to have already evaluated the dependency's
  /// condition; this only checks the catalog's system restrictions.
  pub fn package(
    &self,
    dep: &Dependency,
    system: &System,
    kind: DependencyKind,
  ) -> Result<ResolvedPackage, LookupError> {
    let (input, offer) = self.locate(&dep.name, dep.from.as_deref(), |input| {
      input.catalog.packages.get(&dep.name)
    })?;

    if !offer.available_on(system) {
      return Err(LookupError::Unavailable {
        name: dep.name.clone(),
        system: system.to_string(),
      });
    }

    trace!(package = %dep.name, version = %offer.version, input = %input.path, "resolved package");
    Ok(ResolvedPackage {
      name: dep.name.clone(),
      version: offer.version.clone(),
      source: input.source_id(),
      kind,
    })
  }

  /// Find the input offering toolchain `kind`.
  pub fn toolchain(
    &self,
    kind: &str,
    from: Option<&str>,
  ) -> Result<(&'a Arc<ResolvedInput>, &'a ToolchainOffer), LookupError> {
    self.locate(kind, from, |input| input.catalog.toolchains.get(kind))
  }

  fn locate<T>(
    &self,
    name: &str,
    from: Option<&str>,
    offer: impl Fn(&'a ResolvedInput) -> Option<&'a T>,
  ) -> Result<(&'a Arc<ResolvedInput>, &'a T), LookupError> {
    if let Some(from) = from {
      let input = self.input(from)?;
      return offer(input.as_ref())
        .map(|found| (input, found))
        .ok_or_else(|| LookupError::UnknownComponent {
          name: name.to_string(),
          scope: format!("input '{}'", from),
        });
    }

    let mut candidates: Vec<(&String, &'a Arc<ResolvedInput>, &'a T)> = Vec::new();
    for (input_name, input) in self.inputs {
      if let Some(found) = offer(input.as_ref()) {
        // Aliases of an already-seen instance are the same provider
        if !candidates.iter().any(|(_, seen, _)| seen.source_id() == input.source_id()) {
          candidates.push((input_name, input, found));
        }
      }
    }

    match candidates.len() {
      0 => Err(LookupError::UnknownComponent {
        name: name.to_string(),
        scope: self.scope_description(),
      }),
      1 => {
        let (_, input, found) = candidates.remove(0);
        Ok((input, found))
      }
      _ => Err(LookupError::Ambiguous {
        name: name.to_string(),
        inputs: candidates.into_iter().map(|(n, _, _)| n.clone()).collect(),
      }),
    }
  }

  fn scope_description(&self) -> String {
    if self.inputs.is_empty() {
      "an empty namespace".to_string()
    } else {
      let names: Vec<&str> = self.inputs.keys().map(String::as_str).collect();
      format!("inputs [{}]", names.join(", "))
    }
  }
}
