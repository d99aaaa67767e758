//! Per-system projection.
//!
//! One configuration is evaluated independently for every supported system.
//! Evaluations share nothing mutable and run in parallel; results come back
//! in the order systems were given. A failure, or a panic, in one system's
//! evaluation is recorded for that system only.

use std::panic::{self, AssertUnwindSafe};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;
use tracing::{error, info};

use crate::compose::{ComposeError, EnvironmentDefinition};
use crate::hook::HookError;
use crate::platform::System;

/// Why one system's evaluation failed.
#[derive(Debug, Error)]
pub enum SystemError {
  #[error(transparent)]
  Compose(#[from] ComposeError),

  #[error(transparent)]
  Hook(#[from] HookError),

  /// The evaluation panicked. Always a defect, never a user error.
  #[error("evaluation for {system} panicked: {message}")]
  PlatformEvaluation { system: String, message: String },
}

pub type SystemResult = Result<EnvironmentDefinition, SystemError>;

/// Results keyed by system, in projection order.
#[derive(Debug, Default)]
pub struct Projection {
  pub results: IndexMap<System, SystemResult>,
}

impl Projection {
  pub fn get(&self, system: &System) -> Option<&SystemResult> {
    self.results.get(system)
  }

  pub fn is_success(&self) -> bool {
    self.results.values().all(Result::is_ok)
  }

  pub fn failures(&self) -> impl Iterator<Item = (&System, &SystemError)> {
    self
      .results
      .iter()
      .filter_map(|(system, result)| result.as_ref().err().map(|e| (system, e)))
  }

  pub fn definitions(&self) -> impl Iterator<Item = &EnvironmentDefinition> {
    self.results.values().filter_map(|r| r.as_ref().ok())
  }
}

impl Serialize for Projection {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    #[derive(serde::Serialize)]
    #[serde(rename_all = "snake_case")]
    enum Entry<'a> {
      Ok(&'a EnvironmentDefinition),
      Error(String),
    }

    let mut map = serializer.serialize_map(Some(self.results.len()))?;
    for (system, result) in &self.results {
      let entry = match result {
        Ok(def) => Entry::Ok(def),
        Err(err) => Entry::Error(err.to_string()),
      };
      map.serialize_entry(system, &entry)?;
    }
    map.end()
  }
}

/// Evaluate `eval` for every system in parallel.
///
/// Duplicate systems are evaluated once, at their first position.
pub fn project<F>(systems: &[System], eval: F) -> Projection
where
  F: Fn(&System) -> SystemResult + Sync,
{
  let mut unique: Vec<&System> = Vec::with_capacity(systems.len());
  for system in systems {
    if !unique.contains(&system) {
      unique.push(system);
    }
  }

  info!(systems = unique.len(), "projecting environment");

  let results: Vec<(System, SystemResult)> = unique
    .into_par_iter()
    .map(|system| {
      let result = panic::catch_unwind(AssertUnwindSafe(|| eval(system))).unwrap_or_else(|payload| {
        Err(SystemError::PlatformEvaluation {
          system: system.to_string(),
          message: panic_message(payload.as_ref()),
        })
      });
      if let Err(err) = &result {
        error!(system = %system, error = %err, "system evaluation failed");
      }
      (system.clone(), result)
    })
    .collect();

  Projection {
    results: results.into_iter().collect(),
  }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic payload".to_string()
  }
}
