//! Toolchain selection.
//!
//! A toolchain is requested by kind and exact version plus optional extension
//! and target components. Selection happens once per evaluation, against the
//! root namespace; the result is system-independent and becomes one opaque
//! package in every system's provisioning set.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::inputs::ResolvedInput;
use crate::inputs::namespace::{LookupError, Namespace};
use crate::package::{Dependency, PackageId, SourceId};

/// A toolchain as declared in the config.
///
/// ```lua
/// toolchain = {
///   kind = "rust",
///   version = "1.82.0",
///   extensions = { "rust-src", "rust-analyzer" },
///   targets = { "wasm32-unknown-unknown" },
///   from = "rust-overlay",
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolchainRequest {
  pub kind: String,
  pub version: String,
  pub extensions: BTreeSet<String>,
  pub targets: BTreeSet<String>,
  /// Input offering the toolchain. `None` searches every input.
  pub from: Option<String>,
}

impl ToolchainRequest {
  pub fn new(kind: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      version: version.into(),
      ..Default::default()
    }
  }
}

/// A selected toolchain build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toolchain {
  pub kind: String,
  pub version: String,
  pub extensions: BTreeSet<String>,
  pub targets: BTreeSet<String>,
  pub source: SourceId,
}

impl Toolchain {
  pub fn package_id(&self) -> PackageId {
    PackageId {
      name: self.kind.clone(),
      version: self.version.clone(),
      source: self.source.clone(),
    }
  }
}

/// A toolchain together with the input that offers it.
#[derive(Debug, Clone)]
pub struct SelectedToolchain {
  pub toolchain: Toolchain,
  /// The offering input; its sub-inputs scope the `requires` lookups.
  pub provider: Arc<ResolvedInput>,
  /// Runtime requirements declared by the catalog, still conditional.
  pub requires: Vec<Dependency>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolchainError {
  #[error("no input offers a '{kind}' toolchain")]
  UnknownToolchain { kind: String },

  #[error("{kind} {version} is not offered by '{input}' (available: {})", .available.join(", "))]
  UnknownToolchainVersion {
    kind: String,
    version: String,
    input: String,
    available: Vec<String>,
  },

  #[error("{kind} {version} has no component(s): {}", .components.join(", "))]
  UnknownComponent {
    kind: String,
    version: String,
    components: Vec<String>,
  },

  #[error(transparent)]
  Lookup(#[from] LookupError),
}

/// Pick the toolchain build matching `request`.
///
/// # Errors
///
/// Every unknown extension and target is reported at once, sorted by name.
pub fn select(ns: &Namespace<'_>, request: &ToolchainRequest) -> Result<SelectedToolchain, ToolchainError> {
  let (provider, offer) = ns
    .toolchain(&request.kind, request.from.as_deref())
    .map_err(|err| match err {
      LookupError::UnknownComponent { .. } => ToolchainError::UnknownToolchain {
        kind: request.kind.clone(),
      },
      other => ToolchainError::Lookup(other),
    })?;

  debug!(kind = %request.kind, input = %provider.path, "found toolchain provider");

  if !offer.versions.contains(&request.version) {
    return Err(ToolchainError::UnknownToolchainVersion {
      kind: request.kind.clone(),
      version: request.version.clone(),
      input: provider.path.clone(),
      available: offer.versions.iter().cloned().collect(),
    });
  }

  let unknown: BTreeSet<&String> = request
    .extensions
    .difference(&offer.extensions)
    .chain(request.targets.difference(&offer.targets))
    .collect();
  if !unknown.is_empty() {
    return Err(ToolchainError::UnknownComponent {
      kind: request.kind.clone(),
      version: request.version.clone(),
      components: unknown.into_iter().cloned().collect(),
    });
  }

  let toolchain = Toolchain {
    kind: request.kind.clone(),
    version: request.version.clone(),
    extensions: request.extensions.clone(),
    targets: request.targets.clone(),
    source: provider.source_id(),
  };

  info!(
    toolchain = %toolchain.kind,
    version = %toolchain.version,
    source = %toolchain.source,
    "selected toolchain"
  );

  Ok(SelectedToolchain {
    toolchain,
    provider: provider.clone(),
    requires: offer.requires.clone(),
  })
}
