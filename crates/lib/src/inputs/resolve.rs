//! Two-pass input resolution.
//!
//! 1. **Declaration pass**: root declarations form a [`DependencyGraph`] whose
//!    follows chains are resolved and cycle-checked before anything is fetched.
//!    Inputs are then fetched breadth-first; each catalog's sub-inputs become
//!    transitive nodes unless a follows override binds them elsewhere, in which
//!    case they are never fetched. A `locator` is fetched at most once. A node
//!    whose source is also one of its ancestors' is a cycle.
//! 2. **Instantiation pass**: nodes are turned into [`ResolvedInput`] instances
//!    dependencies-first. A followed sub-input receives the same [`Arc`] as its
//!    target, so every consumer of a followed input shares one instance.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::fetch::{FetchError, FetchedSource, SourceFetcher};
use super::graph::{DependencyGraph, GraphError, build_initial_graph, join_path};
use super::namespace::Namespace;
use super::source::{ParseError, parse, rebase, source_type};
use super::types::{InputDecl, InputDecls, InputOverride, ResolvedInput, ResolvedInputs};

/// Errors that can occur during input resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// A follows target does not exist in the resolved graph.
  #[error("follows target '{target}' not found (referenced from '{from}')")]
  UnresolvedFollows { from: String, target: String },

  /// Follows declarations form a cycle (or a chain too long to be anything else).
  #[error("cyclic input declaration: {chain}")]
  CyclicInput { chain: String },

  #[error("input '{name}' has an invalid locator: {source}")]
  InvalidLocator {
    name: String,
    #[source]
    source: ParseError,
  },

  #[error("input '{name}' declares neither a url nor a follows target")]
  MissingLocator { name: String },

  /// The fetch collaborator failed. Never retried here.
  #[error("failed to fetch input '{name}': {source}")]
  SourceFetch {
    name: String,
    #[source]
    source: FetchError,
  },
}

impl From<GraphError> for ResolveError {
  fn from(err: GraphError) -> Self {
    match err {
      GraphError::FollowsTargetNotFound { from, target } => ResolveError::UnresolvedFollows { from, target },
      GraphError::InvalidFollowsPath { from, path } => ResolveError::UnresolvedFollows { from, target: path },
      GraphError::CircularFollows { chain } => ResolveError::CyclicInput { chain },
      GraphError::FollowsChainTooDeep { chain, .. } => ResolveError::CyclicInput { chain },
    }
  }
}

/// The resolved input graph: root inputs bound to shared instances.
#[derive(Debug)]
pub struct ResolvedGraph {
  pub inputs: ResolvedInputs,
}

impl ResolvedGraph {
  pub fn get(&self, name: &str) -> Option<&Arc<ResolvedInput>> {
    self.inputs.get(name)
  }

  /// Explicit lookup table over the root inputs.
  pub fn namespace(&self) -> Namespace<'_> {
    Namespace::new(&self.inputs)
  }

  /// Number of distinct instances reachable from the roots.
  pub fn instance_count(&self) -> usize {
    let mut seen = HashSet::new();
    let mut stack: Vec<&Arc<ResolvedInput>> = self.inputs.values().collect();
    while let Some(input) = stack.pop() {
      if seen.insert(Arc::as_ptr(input)) {
        stack.extend(input.inputs.values());
      }
    }
    seen.len()
  }
}

/// Resolves input declarations through a [`SourceFetcher`].
pub struct SourceRegistry<'a, F: SourceFetcher + ?Sized> {
  fetcher: &'a F,
}

impl<'a, F: SourceFetcher + ?Sized> SourceRegistry<'a, F> {
  pub fn new(fetcher: &'a F) -> Self {
    Self { fetcher }
  }

  /// Resolve all declared inputs.
  ///
  /// # Errors
  ///
  /// - [`ResolveError::CyclicInput`] for cyclic follows, detected before any fetch,
  ///   and for catalogs that include each other
  /// - [`ResolveError::UnresolvedFollows`] when a follows target does not exist
  /// - [`ResolveError::SourceFetch`] when the fetcher fails
  pub fn resolve(&self, decls: &InputDecls) -> Result<ResolvedGraph, ResolveError> {
    let mut graph = build_initial_graph(decls);
    graph.resolve_follows()?;

    info!(count = decls.len(), "resolving inputs");
    let fetched = self.expand(&mut graph)?;

    // Transitive nodes may have turned up new follows targets.
    graph.resolve_follows()?;
    for (from, target) in &graph.follows_resolved {
      if !fetched.contains_key(target) {
        return Err(ResolveError::UnresolvedFollows {
          from: from.clone(),
          target: target.clone(),
        });
      }
    }

    let mut instantiator = Instantiator {
      graph: &graph,
      fetched: &fetched,
      memo: HashMap::new(),
      stack: Vec::new(),
    };

    let mut inputs = BTreeMap::new();
    for name in graph.root_inputs() {
      let target = graph.follows_target(name).unwrap_or(name);
      let instance = instantiator.instantiate(target)?;
      inputs.insert(name.to_string(), instance);
    }

    let resolved = ResolvedGraph { inputs };
    info!(
      roots = resolved.inputs.len(),
      instances = resolved.instance_count(),
      "inputs resolved"
    );
    Ok(resolved)
  }

  /// Fetch every node that is not bound by follows, discovering sub-inputs as we go.
  fn expand(&self, graph: &mut DependencyGraph) -> Result<BTreeMap<String, NodeSource>, ResolveError> {
    let mut fetched: BTreeMap<String, NodeSource> = BTreeMap::new();
    let mut by_locator: HashMap<String, FetchedSource> = HashMap::new();

    let mut queue: VecDeque<String> = VecDeque::new();
    for node in graph.nodes.values() {
      match &node.decl {
        InputDecl::Follows(_) => {}
        decl if decl.url().is_none() => {
          return Err(ResolveError::MissingLocator {
            name: node.full_path.clone(),
          });
        }
        _ => queue.push_back(node.full_path.clone()),
      }
    }

    while let Some(path) = queue.pop_front() {
      let Some(node) = graph.get(&path) else { continue };
      let decl = node.decl.clone();
      let Some(locator) = decl.url().map(str::to_string) else {
        continue;
      };

      let source = parse(&locator).map_err(|e| ResolveError::InvalidLocator {
        name: path.clone(),
        source: e,
      })?;

      let fetched_source = match by_locator.get(&locator) {
        Some(existing) => {
          debug!(input = %path, locator = %locator, "reusing fetched source");
          existing.clone()
        }
        None => {
          debug!(input = %path, kind = source_type(&source), locator = %locator, "fetching input");
          let result = self
            .fetcher
            .fetch(&node.name, &source)
            .map_err(|e| ResolveError::SourceFetch {
              name: path.clone(),
              source: e,
            })?;
          by_locator.insert(locator.clone(), result.clone());
          result
        }
      };

      let key = source_key(&locator, &fetched_source);
      if let Some(chain) = ancestor_cycle(&path, &key, &fetched) {
        return Err(ResolveError::CyclicInput { chain });
      }

      let overrides = decl.overrides();
      for (sub, sub_locator) in &fetched_source.catalog.inputs {
        let sub_decl = match overrides.and_then(|o| o.get(sub)) {
          Some(InputOverride::Follows(_)) => continue,
          Some(InputOverride::Url(url)) => InputDecl::Url(url.clone()),
          None => match &fetched_source.root {
            Some(root) => InputDecl::Url(rebase(sub_locator, root)),
            None => InputDecl::Url(sub_locator.clone()),
          },
        };
        let sub_path = graph.add_transitive(sub, sub_decl, &path);
        queue.push_back(sub_path);
      }

      if let Some(overrides) = overrides {
        for sub in overrides.keys() {
          if !fetched_source.catalog.inputs.contains_key(sub) {
            warn!(input = %path, sub_input = %sub, "override names a sub-input the input does not declare");
          }
        }
      }

      fetched.insert(
        path,
        NodeSource {
          key,
          fetched: fetched_source,
        },
      );
    }

    Ok(fetched)
  }
}

/// A fetched graph node.
struct NodeSource {
  /// Source identity; see [`source_key`].
  key: String,
  fetched: FetchedSource,
}

/// Local inputs are identified by their canonical directory, however they were spelled.
fn source_key(locator: &str, fetched: &FetchedSource) -> String {
  match &fetched.root {
    Some(root) => format!("path:{}", root.display()),
    None => locator.to_string(),
  }
}

/// If an ancestor of `path` has the same source, the catalogs include each
/// other and expansion would never end. Returns the offending chain.
fn ancestor_cycle(path: &str, key: &str, fetched: &BTreeMap<String, NodeSource>) -> Option<String> {
  let segments: Vec<&str> = path.split('/').collect();
  let ancestors: Vec<String> = (1..segments.len()).map(|n| segments[..n].join("/")).collect();
  let start = ancestors
    .iter()
    .position(|ancestor| fetched.get(ancestor).is_some_and(|node| node.key == key))?;

  let mut chain = ancestors[start..].to_vec();
  chain.push(path.to_string());
  Some(chain.join(" -> "))
}

struct Instantiator<'g> {
  graph: &'g DependencyGraph,
  fetched: &'g BTreeMap<String, NodeSource>,
  memo: HashMap<String, Arc<ResolvedInput>>,
  stack: Vec<String>,
}

impl Instantiator<'_> {
  fn instantiate(&mut self, path: &str) -> Result<Arc<ResolvedInput>, ResolveError> {
    if let Some(instance) = self.memo.get(path) {
      return Ok(instance.clone());
    }

    if self.stack.iter().any(|p| p == path) {
      let mut chain = self.stack.clone();
      chain.push(path.to_string());
      return Err(ResolveError::CyclicInput {
        chain: chain.join(" -> "),
      });
    }

    let node = self.fetched.get(path).ok_or_else(|| ResolveError::UnresolvedFollows {
      from: self.stack.last().cloned().unwrap_or_default(),
      target: path.to_string(),
    })?;

    self.stack.push(path.to_string());
    let mut inputs = BTreeMap::new();
    for sub in node.fetched.catalog.inputs.keys() {
      let child_path = join_path(path, sub);
      let target = self
        .graph
        .follows_target(&child_path)
        .map(str::to_string)
        .unwrap_or(child_path);
      let child = self.instantiate(&target)?;
      inputs.insert(sub.clone(), child);
    }
    self.stack.pop();

    let instance = Arc::new(ResolvedInput {
      path: path.to_string(),
      locator: node.key.clone(),
      rev: node.fetched.rev.clone(),
      catalog: node.fetched.catalog.clone(),
      inputs,
    });
    self.memo.insert(path.to_string(), instance.clone());
    Ok(instance)
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use super::*;
  use crate::inputs::catalog::{Catalog, PackageOffer};
  use crate::inputs::source::InputSource;

  /// In-memory fetcher keyed by locator.
  #[derive(Default)]
  struct MemoryFetcher {
    catalogs: BTreeMap<String, Catalog>,
    calls: RefCell<Vec<String>>,
  }

  impl MemoryFetcher {
    fn with(mut self, locator: &str, catalog: Catalog) -> Self {
      self.catalogs.insert(locator.to_string(), catalog);
      self
    }
  }

  impl SourceFetcher for MemoryFetcher {
    fn fetch(&self, _name: &str, source: &InputSource) -> Result<FetchedSource, FetchError> {
      let locator = match source {
        InputSource::Path { path } => format!("path:{}", path.display()),
        InputSource::Git { url, rev } => format!("git:{}#{}", url, rev),
      };
      self.calls.borrow_mut().push(locator.clone());
      let catalog = self
        .catalogs
        .get(&locator)
        .cloned()
        .ok_or_else(|| FetchError::MissingCatalog(locator.clone()))?;
      Ok(FetchedSource {
        rev: "local".to_string(),
        catalog: Arc::new(catalog),
        root: None,
      })
    }
  }

  fn catalog(sub_inputs: &[(&str, &str)], packages: &[(&str, &str)]) -> Catalog {
    Catalog {
      inputs: sub_inputs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
      packages: packages
        .iter()
        .map(|(k, v)| (k.to_string(), PackageOffer::new(*v)))
        .collect(),
      toolchains: BTreeMap::new(),
    }
  }

  fn follows(locator: &str, subs: &[(&str, &str)]) -> InputDecl {
    InputDecl::Extended {
      url: Some(locator.to_string()),
      inputs: subs
        .iter()
        .map(|(k, v)| (k.to_string(), InputOverride::Follows(v.to_string())))
        .collect(),
    }
  }

  fn fetcher() -> MemoryFetcher {
    MemoryFetcher::default()
      .with("path:pkgs", catalog(&[], &[("openssl", "3.3.2")]))
      .with("path:old-pkgs", catalog(&[], &[("openssl", "1.1.1")]))
      .with("path:overlay", catalog(&[("pkgs", "path:old-pkgs")], &[]))
      .with("path:utils", catalog(&[("pkgs", "path:old-pkgs")], &[]))
  }

  #[test]
  fn follows_shares_one_instance() {
    let mut decls = InputDecls::new();
    decls.insert("pkgs".to_string(), InputDecl::Url("path:pkgs".to_string()));
    decls.insert("overlay".to_string(), follows("path:overlay", &[("pkgs", "pkgs")]));
    decls.insert("utils".to_string(), follows("path:utils", &[("pkgs", "pkgs")]));

    let fetcher = fetcher();
    let graph = SourceRegistry::new(&fetcher).resolve(&decls).unwrap();

    let pkgs = graph.get("pkgs").unwrap();
    let overlay_pkgs = &graph.get("overlay").unwrap().inputs["pkgs"];
    let utils_pkgs = &graph.get("utils").unwrap().inputs["pkgs"];
    assert!(Arc::ptr_eq(pkgs, overlay_pkgs));
    assert!(Arc::ptr_eq(overlay_pkgs, utils_pkgs));
    assert_eq!(graph.instance_count(), 3);

    // The followed sub-input's own locator is never fetched
    assert!(!fetcher.calls.borrow().iter().any(|c| c == "path:old-pkgs"));
  }

  #[test]
  fn without_follows_sub_inputs_are_separate() {
    let mut decls = InputDecls::new();
    decls.insert("pkgs".to_string(), InputDecl::Url("path:pkgs".to_string()));
    decls.insert("overlay".to_string(), InputDecl::Url("path:overlay".to_string()));
    decls.insert("utils".to_string(), InputDecl::Url("path:utils".to_string()));

    let fetcher = fetcher();
    let graph = SourceRegistry::new(&fetcher).resolve(&decls).unwrap();

    let overlay_pkgs = &graph.get("overlay").unwrap().inputs["pkgs"];
    assert!(!Arc::ptr_eq(graph.get("pkgs").unwrap(), overlay_pkgs));
    assert_eq!(overlay_pkgs.catalog.packages["openssl"].version, "1.1.1");

    // Two nodes share the old-pkgs locator; it is fetched once
    let calls = fetcher.calls.borrow();
    assert_eq!(calls.iter().filter(|c| *c == "path:old-pkgs").count(), 1);
  }

  #[test]
  fn root_alias_resolves_to_target_instance() {
    let mut decls = InputDecls::new();
    decls.insert("pkgs".to_string(), InputDecl::Url("path:pkgs".to_string()));
    decls.insert("nixpkgs".to_string(), InputDecl::Follows("pkgs".to_string()));

    let graph = SourceRegistry::new(&fetcher()).resolve(&decls).unwrap();
    assert!(Arc::ptr_eq(graph.get("pkgs").unwrap(), graph.get("nixpkgs").unwrap()));
  }

  #[test]
  fn cyclic_follows_fails_before_fetching() {
    let mut decls = InputDecls::new();
    decls.insert("a".to_string(), InputDecl::Follows("b".to_string()));
    decls.insert("b".to_string(), InputDecl::Follows("a".to_string()));

    let fetcher = fetcher();
    let err = SourceRegistry::new(&fetcher).resolve(&decls).unwrap_err();
    assert!(matches!(err, ResolveError::CyclicInput { .. }));
    assert!(fetcher.calls.borrow().is_empty());
  }

  #[test]
  fn self_referencing_sub_input_is_cyclic() {
    let mut decls = InputDecls::new();
    decls.insert("overlay".to_string(), follows("path:overlay", &[("pkgs", "overlay")]));

    let err = SourceRegistry::new(&fetcher()).resolve(&decls).unwrap_err();
    match err {
      ResolveError::CyclicInput { chain } => assert_eq!(chain, "overlay -> overlay"),
      other => panic!("expected cyclic input error, got {other}"),
    }
  }

  #[test]
  fn mutually_including_catalogs_are_cyclic() {
    let fetcher = MemoryFetcher::default()
      .with("path:a", catalog(&[("b", "path:b")], &[]))
      .with("path:b", catalog(&[("a", "path:a")], &[]));
    let mut decls = InputDecls::new();
    decls.insert("a".to_string(), InputDecl::Url("path:a".to_string()));

    let err = SourceRegistry::new(&fetcher).resolve(&decls).unwrap_err();
    match err {
      ResolveError::CyclicInput { chain } => assert_eq!(chain, "a -> a/b -> a/b/a"),
      other => panic!("expected cyclic input error, got {other}"),
    }
    assert_eq!(fetcher.calls.borrow().len(), 2);
  }

  #[test]
  fn catalog_including_itself_is_cyclic() {
    let fetcher = MemoryFetcher::default().with("path:a", catalog(&[("me", "path:a")], &[]));
    let mut decls = InputDecls::new();
    decls.insert("a".to_string(), InputDecl::Url("path:a".to_string()));

    let err = SourceRegistry::new(&fetcher).resolve(&decls).unwrap_err();
    assert!(matches!(err, ResolveError::CyclicInput { ref chain } if chain == "a -> a/me"));
  }

  #[test]
  fn shared_source_on_separate_branches_is_not_a_cycle() {
    // overlay and utils both pull in old-pkgs; neither is an ancestor of the other
    let mut decls = InputDecls::new();
    decls.insert("overlay".to_string(), InputDecl::Url("path:overlay".to_string()));
    decls.insert("utils".to_string(), InputDecl::Url("path:utils".to_string()));
    assert!(SourceRegistry::new(&fetcher()).resolve(&decls).is_ok());
  }

  #[test]
  fn missing_follows_target_is_unresolved() {
    let mut decls = InputDecls::new();
    decls.insert("overlay".to_string(), follows("path:overlay", &[("pkgs", "nixpkgs")]));

    let err = SourceRegistry::new(&fetcher()).resolve(&decls).unwrap_err();
    match err {
      ResolveError::UnresolvedFollows { from, target } => {
        assert_eq!(from, "overlay/pkgs");
        assert_eq!(target, "nixpkgs");
      }
      other => panic!("expected unresolved follows error, got {other}"),
    }
  }

  #[test]
  fn follows_into_transitive_node() {
    // utils/pkgs follows overlay/pkgs, which is fetched as a transitive node
    let mut decls = InputDecls::new();
    decls.insert("overlay".to_string(), InputDecl::Url("path:overlay".to_string()));
    decls.insert("utils".to_string(), follows("path:utils", &[("pkgs", "overlay/pkgs")]));

    let graph = SourceRegistry::new(&fetcher()).resolve(&decls).unwrap();
    assert!(Arc::ptr_eq(
      &graph.get("overlay").unwrap().inputs["pkgs"],
      &graph.get("utils").unwrap().inputs["pkgs"],
    ));
  }

  #[test]
  fn url_override_replaces_sub_input_locator() {
    let mut decls = InputDecls::new();
    let mut overrides = BTreeMap::new();
    overrides.insert("pkgs".to_string(), InputOverride::Url("path:pkgs".to_string()));
    decls.insert(
      "overlay".to_string(),
      InputDecl::Extended {
        url: Some("path:overlay".to_string()),
        inputs: overrides,
      },
    );

    let graph = SourceRegistry::new(&fetcher()).resolve(&decls).unwrap();
    let pkgs = &graph.get("overlay").unwrap().inputs["pkgs"];
    assert_eq!(pkgs.locator, "path:pkgs");
    assert_eq!(pkgs.catalog.packages["openssl"].version, "3.3.2");
  }

  #[test]
  fn fetch_failure_is_surfaced() {
    let mut decls = InputDecls::new();
    decls.insert("ghost".to_string(), InputDecl::Url("path:ghost".to_string()));

    let err = SourceRegistry::new(&fetcher()).resolve(&decls).unwrap_err();
    assert!(matches!(err, ResolveError::SourceFetch { ref name, .. } if name == "ghost"));
  }

  #[test]
  fn invalid_locator_is_reported() {
    let mut decls = InputDecls::new();
    decls.insert(
      "pkgs".to_string(),
      InputDecl::Url("git:https://example.com/pkgs.git".to_string()),
    );

    let err = SourceRegistry::new(&fetcher()).resolve(&decls).unwrap_err();
    assert!(matches!(
      err,
      ResolveError::InvalidLocator {
        source: ParseError::Unpinned(_),
        ..
      }
    ));
  }

  #[test]
  fn extended_without_url_is_rejected() {
    let mut decls = InputDecls::new();
    decls.insert(
      "pkgs".to_string(),
      InputDecl::Extended {
        url: None,
        inputs: BTreeMap::new(),
      },
    );

    let err = SourceRegistry::new(&fetcher()).resolve(&decls).unwrap_err();
    assert!(matches!(err, ResolveError::MissingLocator { .. }));
  }

  #[test]
  fn resolution_is_repeatable() {
    let mut decls = InputDecls::new();
    decls.insert("pkgs".to_string(), InputDecl::Url("path:pkgs".to_string()));
    decls.insert("overlay".to_string(), follows("path:overlay", &[("pkgs", "pkgs")]));

    let fetcher = fetcher();
    let first = SourceRegistry::new(&fetcher).resolve(&decls).unwrap();
    let second = SourceRegistry::new(&fetcher).resolve(&decls).unwrap();

    let ids = |g: &ResolvedGraph| -> Vec<String> { g.inputs.values().map(|i| i.source_id().to_string()).collect() };
    assert_eq!(ids(&first), ids(&second));
  }
}
