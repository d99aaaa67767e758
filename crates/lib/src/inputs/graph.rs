//! Input declaration graph.
//!
//! Nodes are keyed by their path from the root (`pkgs`, `overlay/pkgs`). Root
//! inputs come from the config; transitive nodes are added as fetched inputs
//! reveal their own sub-inputs. `follows` declarations are resolved into
//! [`DependencyGraph::follows_resolved`], walking chains up to
//! [`MAX_FOLLOWS_DEPTH`] hops and rejecting cycles.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use thiserror::Error;
use tracing::{debug, trace};

use super::types::{InputDecl, InputDecls, InputOverride, MAX_FOLLOWS_DEPTH};

/// A node in the declaration graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
  /// The input name (as declared in the parent's inputs table).
  pub name: String,
  pub decl: InputDecl,
  /// Parent node path. Empty for root-level inputs.
  pub parent_path: String,
  /// Full path to this node (e.g., "pkgs" or "overlay/pkgs").
  pub full_path: String,
}

impl GraphNode {
  pub fn root_input(name: &str, decl: InputDecl) -> Self {
    Self {
      name: name.to_string(),
      decl,
      parent_path: String::new(),
      full_path: name.to_string(),
    }
  }

  pub fn transitive(name: &str, decl: InputDecl, parent_path: &str) -> Self {
    Self {
      name: name.to_string(),
      decl,
      parent_path: parent_path.to_string(),
      full_path: join_path(parent_path, name),
    }
  }

  pub fn is_root_level(&self) -> bool {
    self.parent_path.is_empty()
  }
}

/// Join a parent path and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
  if parent.is_empty() {
    name.to_string()
  } else {
    format!("{}/{}", parent, name)
  }
}

/// Errors that can occur during graph operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
  #[error("follows target '{target}' not found (referenced from '{from}')")]
  FollowsTargetNotFound { from: String, target: String },

  #[error("circular follows detected: {chain}")]
  CircularFollows { chain: String },

  #[error("follows chain too deep (maximum {max} hops): {chain}")]
  FollowsChainTooDeep { max: usize, chain: String },

  #[error("invalid follows path '{path}' (referenced from '{from}')")]
  InvalidFollowsPath { from: String, path: String },
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
  /// All nodes, keyed by full path.
  pub nodes: BTreeMap<String, GraphNode>,
  /// Edges: parent path -> child paths.
  pub edges: BTreeMap<String, BTreeSet<String>>,
  /// Follows mappings after resolution: source path -> final target path.
  pub follows_resolved: BTreeMap<String, String>,
}

impl DependencyGraph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_root_input(&mut self, name: &str, decl: InputDecl) {
    let node = GraphNode::root_input(name, decl);
    self.nodes.insert(node.full_path.clone(), node);
  }

  /// Add a transitive node below `parent_path` and return its full path.
  pub fn add_transitive(&mut self, name: &str, decl: InputDecl, parent_path: &str) -> String {
    let node = GraphNode::transitive(name, decl, parent_path);
    let full_path = node.full_path.clone();
    self
      .edges
      .entry(parent_path.to_string())
      .or_default()
      .insert(full_path.clone());
    self.nodes.insert(full_path.clone(), node);
    full_path
  }

  pub fn get(&self, path: &str) -> Option<&GraphNode> {
    self.nodes.get(path)
  }

  pub fn root_inputs(&self) -> Vec<&str> {
    self
      .nodes
      .values()
      .filter(|n| n.is_root_level())
      .map(|n| n.name.as_str())
      .collect()
  }

  /// Children of a node, in name order.
  pub fn dependencies(&self, path: &str) -> Vec<&str> {
    self
      .edges
      .get(path)
      .map(|deps| deps.iter().map(|s| s.as_str()).collect())
      .unwrap_or_default()
  }

  /// Final target for a followed path, if it is followed.
  pub fn follows_target(&self, path: &str) -> Option<&str> {
    self.follows_resolved.get(path).map(|s| s.as_str())
  }

  /// Resolve every follows declaration currently known to the graph.
  ///
  /// Covers root-level aliases (`a = { follows = "b" }`) and sub-input
  /// overrides (`overlay.inputs.pkgs = { follows = "pkgs" }`). Targets are not
  /// required to exist yet; transitive nodes appear only after fetching.
  pub fn resolve_follows(&mut self) -> Result<(), GraphError> {
    let mut declared: Vec<(String, String)> = Vec::new();

    for node in self.nodes.values() {
      if let Some(target) = node.decl.follows() {
        declared.push((node.full_path.clone(), target.to_string()));
      }
      if let Some(overrides) = node.decl.overrides() {
        for (sub, override_) in overrides {
          if let InputOverride::Follows(target) = override_ {
            declared.push((join_path(&node.full_path, sub), target.clone()));
          }
        }
      }
    }

    self.follows_resolved.clear();
    for (source, target) in declared {
      let resolved = self.resolve_follows_chain(&source, &target)?;
      debug!(source = %source, target = %resolved, "resolved follows");
      self.follows_resolved.insert(source, resolved);
    }

    Ok(())
  }

  fn resolve_follows_chain(&self, source: &str, initial_target: &str) -> Result<String, GraphError> {
    let mut visited = HashSet::new();
    visited.insert(source.to_string());
    let mut chain = vec![source.to_string()];
    let mut current = initial_target.to_string();

    for depth in 0..MAX_FOLLOWS_DEPTH {
      validate_follows_path(source, &current)?;
      chain.push(current.clone());

      if !visited.insert(current.clone()) {
        return Err(GraphError::CircularFollows {
          chain: chain.join(" -> "),
        });
      }

      match self.declared_follows(&current) {
        Some(next) => {
          trace!(depth, current = %current, next = %next, "following chain");
          current = next;
        }
        None => return Ok(current),
      }
    }

    chain.push(current);
    Err(GraphError::FollowsChainTooDeep {
      max: MAX_FOLLOWS_DEPTH,
      chain: chain.join(" -> "),
    })
  }

  /// The follows target declared for `path`, either as a root alias or as an
  /// override on its parent node.
  fn declared_follows(&self, path: &str) -> Option<String> {
    match path.rsplit_once('/') {
      Some((parent, sub)) => {
        let node = self.nodes.get(parent)?;
        match node.decl.overrides()?.get(sub)? {
          InputOverride::Follows(target) => Some(target.clone()),
          InputOverride::Url(_) => None,
        }
      }
      None => self.nodes.get(path)?.decl.follows().map(str::to_string),
    }
  }
}

fn validate_follows_path(from: &str, path: &str) -> Result<(), GraphError> {
  if path.is_empty() || path.split('/').any(|segment| segment.is_empty()) {
    return Err(GraphError::InvalidFollowsPath {
      from: from.to_string(),
      path: path.to_string(),
    });
  }
  Ok(())
}

/// Build a graph from root input declarations.
pub fn build_initial_graph(root_inputs: &InputDecls) -> DependencyGraph {
  let mut graph = DependencyGraph::new();
  for (name, decl) in root_inputs {
    graph.add_root_input(name, decl.clone());
  }
  graph
}
