//! Input types for declaration and resolution.
//!
//! - [`InputDecl`] - Parsed input declaration from the config (before resolution)
//! - [`InputOverride`] - Override specification for a sub-input
//! - [`ResolvedInput`] - A fetched input with its bound sub-inputs

use std::collections::BTreeMap;
use std::sync::Arc;

use super::catalog::Catalog;
use crate::package::SourceId;

/// Maximum depth for follows chain resolution.
/// Prevents infinite loops in malformed configurations.
pub const MAX_FOLLOWS_DEPTH: usize = 10;

/// A parsed input declaration (before resolution).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputDecl {
  /// Simple locator string.
  ///
  /// ```lua
  /// inputs = {
  ///   pkgs = "git:https://github.com/org/pkgs.git#4f2a9c1",
  /// }
  /// ```
  Url(String),

  /// Locator with overrides for the input's own sub-inputs.
  ///
  /// ```lua
  /// inputs = {
  ///   overlay = {
  ///     url = "git:https://github.com/org/overlay.git#9b1e0d2",
  ///     inputs = {
  ///       pkgs = { follows = "pkgs" },
  ///     },
  ///   },
  /// }
  /// ```
  Extended {
    url: Option<String>,
    inputs: BTreeMap<String, InputOverride>,
  },

  /// Alias for another input: `nixpkgs = { follows = "pkgs" }`.
  Follows(String),
}

impl InputDecl {
  /// Get the locator from the declaration, if present.
  pub fn url(&self) -> Option<&str> {
    match self {
      InputDecl::Url(url) => Some(url),
      InputDecl::Extended { url, .. } => url.as_deref(),
      InputDecl::Follows(_) => None,
    }
  }

  /// Get the sub-input overrides, if any.
  pub fn overrides(&self) -> Option<&BTreeMap<String, InputOverride>> {
    match self {
      InputDecl::Extended { inputs, .. } if !inputs.is_empty() => Some(inputs),
      _ => None,
    }
  }

  /// Target of an alias declaration.
  pub fn follows(&self) -> Option<&str> {
    match self {
      InputDecl::Follows(target) => Some(target),
      _ => None,
    }
  }
}

/// An override specification for a sub-input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOverride {
  /// Replace the sub-input's locator.
  Url(String),

  /// Bind the sub-input to an already-resolved input.
  ///
  /// The path can name a root input (`"pkgs"`) or a sub-input of one
  /// (`"overlay/pkgs"`).
  Follows(String),
}

impl InputOverride {
  pub fn follows_path(&self) -> Option<&str> {
    match self {
      InputOverride::Follows(path) => Some(path),
      InputOverride::Url(_) => None,
    }
  }
}

/// Map of input names to their declarations.
pub type InputDecls = BTreeMap<String, InputDecl>;

/// A resolved input instance.
///
/// Instances are shared through [`Arc`]: every consumer that follows the same
/// input holds a pointer to the very same instance.
#[derive(Debug)]
pub struct ResolvedInput {
  /// Graph path of the node that produced this instance (e.g. `pkgs` or `overlay/utils`).
  pub path: String,
  pub locator: String,
  /// Pinned revision (commit hash, or `local` for path inputs).
  pub rev: String,
  pub catalog: Arc<Catalog>,
  /// Sub-inputs, already bound (followed ones point at their target instance).
  pub inputs: ResolvedInputs,
}

impl ResolvedInput {
  pub fn source_id(&self) -> SourceId {
    SourceId::new(&self.locator, &self.rev)
  }
}

/// Map of input names to their resolved instances.
pub type ResolvedInputs = BTreeMap<String, Arc<ResolvedInput>>;
