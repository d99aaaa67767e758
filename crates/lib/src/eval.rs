//! End-to-end evaluation.
//!
//! System-independent work happens once: the config is loaded, inputs are
//! resolved and the toolchain is selected. Any failure there aborts the whole
//! evaluation before a single system is projected. The per-system part
//! (composition and hook sequencing) then runs for every system, and its
//! failures are reported per system.

use std::path::Path;

use mlua::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::compose::{ComposeInput, compose};
use crate::config::Config;
use crate::hook::sequence;
use crate::inputs::fetch::{LocalFetcher, SourceFetcher};
use crate::inputs::resolve::{ResolveError, ResolvedGraph, SourceRegistry};
use crate::lua;
use crate::platform::System;
use crate::project::{Projection, SystemResult, project};
use crate::toolchain::{SelectedToolchain, ToolchainError, select};

/// Errors that abort an evaluation for every system.
#[derive(Debug, Error)]
pub enum EvalError {
  #[error("lua error: {0}")]
  Lua(#[from] LuaError),

  #[error("input resolution error: {0}")]
  Resolve(#[from] ResolveError),

  #[error("toolchain selection error: {0}")]
  Toolchain(#[from] ToolchainError),
}

/// Load and parse a config file.
pub fn load_config(path: &Path) -> Result<Config, EvalError> {
  Ok(lua::config::load_config(path)?)
}

/// The system-independent half of an evaluation.
#[derive(Debug)]
pub struct Evaluation {
  pub config: Config,
  pub graph: ResolvedGraph,
  pub toolchain: Option<SelectedToolchain>,
}

impl Evaluation {
  /// Resolve inputs and select the toolchain.
  pub fn prepare<F: SourceFetcher + ?Sized>(config: Config, fetcher: &F) -> Result<Self, EvalError> {
    let graph = SourceRegistry::new(fetcher).resolve(&config.inputs)?;
    let toolchain = match &config.toolchain {
      Some(request) => Some(select(&graph.namespace(), request)?),
      None => {
        debug!("no toolchain requested");
        None
      }
    };

    Ok(Self {
      config,
      graph,
      toolchain,
    })
  }

  /// Compose the environment for one system and sequence its hook.
  pub fn evaluate_system(&self, system: &System) -> SystemResult {
    let ns = self.graph.namespace();
    let input = ComposeInput {
      toolchain: self.toolchain.as_ref(),
      packages: &self.config.packages,
      dev_packages: &self.config.dev_packages,
      scripts: &self.config.scripts,
      env: &self.config.env,
    };

    let mut def = compose(system, &ns, input)?;
    def.hook = sequence(&self.config.hook, &ns, system, &def.packages)?;
    Ok(def)
  }

  /// Evaluate every system in `systems`.
  pub fn project(&self, systems: &[System]) -> Projection {
    project(systems, |system| self.evaluate_system(system))
  }
}

/// Evaluate `config` for `systems`, or for the configured systems when `None`.
pub fn evaluate<F: SourceFetcher + ?Sized>(
  config: Config,
  fetcher: &F,
  systems: Option<&[System]>,
) -> Result<Projection, EvalError> {
  let evaluation = Evaluation::prepare(config, fetcher)?;
  let systems = match systems {
    Some(systems) => systems.to_vec(),
    None => evaluation.config.systems(),
  };
  Ok(evaluation.project(&systems))
}

/// Load the config at `path` and evaluate it with the default fetcher.
pub fn evaluate_path(path: &Path, systems: Option<&[System]>) -> Result<Projection, EvalError> {
  let config = load_config(path)?;
  info!(path = %config.path.display(), "evaluating config");
  let fetcher = LocalFetcher::new(config.dir());
  evaluate(config, &fetcher, systems)
}
