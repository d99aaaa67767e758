//! The fetch collaborator.
//!
//! Fetching is the only I/O the registry performs and it sits behind the
//! [`SourceFetcher`] trait. [`LocalFetcher`] is the default implementation:
//!
//! - `path:` inputs are resolved relative to the config directory and read in place
//! - `git:` inputs are cloned into `$XDG_CACHE_HOME/envsys/inputs/<name>-<hash>/`
//!   and the catalog is read from the pinned commit's tree, so the worktree
//!   state never matters
//!
//! Failures are surfaced as-is; retrying belongs to the caller.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gix::remote::Direction;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use super::catalog::Catalog;
use super::source::InputSource;
use crate::consts::{CATALOG_FILENAME, HASH_PREFIX_LEN, LOCAL_REV};
use crate::lua::catalog::parse_catalog;
use crate::platform::paths::{home_dir, inputs_cache_dir};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("failed to create cache directory '{0}': {1}")]
  CreateCacheDir(PathBuf, #[source] std::io::Error),

  #[error("failed to clone repository '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: BoxError,
  },

  #[error("failed to open repository at '{path}': {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: Box<gix::open::Error>,
  },

  #[error("failed to fetch from '{url}': {source}")]
  Fetch {
    url: String,
    #[source]
    source: BoxError,
  },

  #[error("no remote configured for repository at '{0}'")]
  NoRemote(PathBuf),

  #[error("revision '{rev}' not found in repository")]
  RevisionNotFound { rev: String },

  #[error("path does not exist: {0}")]
  PathNotFound(PathBuf),

  #[error("failed to resolve path '{path}': {source}")]
  CanonicalizePath {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("input has no catalog.lua at '{0}'")]
  MissingCatalog(String),

  #[error("failed to read catalog '{path}': {source}")]
  ReadCatalog {
    path: String,
    #[source]
    source: BoxError,
  },

  #[error("invalid catalog '{path}': {message}")]
  InvalidCatalog { path: String, message: String },
}

/// The result of fetching one input at its pinned revision.
#[derive(Debug, Clone)]
pub struct FetchedSource {
  /// The exact revision that was fetched.
  pub rev: String,
  pub catalog: Arc<Catalog>,
  /// Local directory of the input, when it has one. Relative `path:`
  /// sub-inputs in its catalog resolve against it.
  pub root: Option<PathBuf>,
}

/// Fetches inputs for the registry.
pub trait SourceFetcher {
  /// Fetch the input declared as `name` from `source`.
  fn fetch(&self, name: &str, source: &InputSource) -> Result<FetchedSource, FetchError>;
}

/// Fetches `path:` inputs from disk and `git:` inputs into the cache directory.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
  config_dir: PathBuf,
  cache_dir: PathBuf,
}

impl LocalFetcher {
  /// `config_dir` anchors relative `path:` locators.
  pub fn new(config_dir: impl Into<PathBuf>) -> Self {
    Self {
      config_dir: config_dir.into(),
      cache_dir: inputs_cache_dir(),
    }
  }

  pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
    self.cache_dir = cache_dir.into();
    self
  }
}

impl SourceFetcher for LocalFetcher {
  fn fetch(&self, name: &str, source: &InputSource) -> Result<FetchedSource, FetchError> {
    let (rev, chunk_name, content, root) = match source {
      InputSource::Path { path } => {
        let root = resolve_path(&path.to_string_lossy(), &self.config_dir)?;
        let catalog_path = root.join(CATALOG_FILENAME);
        if !catalog_path.is_file() {
          return Err(FetchError::MissingCatalog(root.display().to_string()));
        }
        let content = fs::read_to_string(&catalog_path).map_err(|e| FetchError::ReadCatalog {
          path: catalog_path.display().to_string(),
          source: Box::new(e),
        })?;
        (LOCAL_REV.to_string(), catalog_path.display().to_string(), content, Some(root))
      }
      InputSource::Git { url, rev } => {
        let (commit, content) = fetch_git(name, url, rev, &self.cache_dir)?;
        let chunk_name = format!("{}#{}/{}", url, commit, CATALOG_FILENAME);
        (commit, chunk_name, content, None)
      }
    };

    let catalog = parse_catalog(&chunk_name, &content).map_err(|e| FetchError::InvalidCatalog {
      path: chunk_name.clone(),
      message: e.to_string(),
    })?;

    Ok(FetchedSource {
      rev,
      catalog: Arc::new(catalog),
      root,
    })
  }
}

/// Fetch a git input and read its catalog at the pinned revision.
///
/// An existing clone is reused; the remote is only contacted when the revision
/// is not already present locally. Returns `(commit_hash, catalog_source)`.
pub fn fetch_git(name: &str, url: &str, rev: &str, cache_dir: &Path) -> Result<(String, String), FetchError> {
  let repo_path = cache_dir.join(repo_dir_name(name, url));

  if !cache_dir.exists() {
    fs::create_dir_all(cache_dir).map_err(|e| FetchError::CreateCacheDir(cache_dir.to_path_buf(), e))?;
  }

  let repo = if repo_path.join(".git").exists() {
    debug!(name, path = %repo_path.display(), "opening cached repository");
    let repo = gix::open(&repo_path).map_err(|e| FetchError::Open {
      path: repo_path.clone(),
      source: Box::new(e),
    })?;
    if repo.rev_parse_single(rev).is_err() {
      fetch_updates(&repo, url, &repo_path)?;
    }
    repo
  } else {
    info!(name, url, path = %repo_path.display(), "cloning input");
    clone_repo(url, &repo_path)?
  };

  let read_err = |e: BoxError| FetchError::ReadCatalog {
    path: format!("{}#{}", url, rev),
    source: e,
  };
  let commit = repo
    .rev_parse_single(rev)
    .map_err(|_| FetchError::RevisionNotFound { rev: rev.to_string() })?
    .object()
    .map_err(|e| read_err(Box::new(e)))?
    .peel_to_commit()
    .map_err(|e| read_err(Box::new(e)))?;
  let commit_id = commit.id.to_string();

  let content = read_catalog_blob(&commit, url)?;
  debug!(name, rev, commit = %commit_id, "resolved pinned revision");
  Ok((commit_id, content))
}

fn read_catalog_blob(commit: &gix::Commit<'_>, url: &str) -> Result<String, FetchError> {
  let location = format!("{}#{}/{}", url, commit.id, CATALOG_FILENAME);
  let read_err = |e: BoxError| FetchError::ReadCatalog {
    path: location.clone(),
    source: e,
  };

  let tree = commit.tree().map_err(|e| read_err(Box::new(e)))?;
  let entry = tree
    .lookup_entry_by_path(CATALOG_FILENAME)
    .map_err(|e| read_err(Box::new(e)))?
    .ok_or_else(|| FetchError::MissingCatalog(location.clone()))?;
  let blob = entry.object().map_err(|e| read_err(Box::new(e)))?;

  String::from_utf8(blob.data.clone()).map_err(|e| read_err(Box::new(e)))
}

/// Cache directory name: the input name plus a short hash of the URL, so two
/// inputs sharing a name but not a URL never share a clone.
fn repo_dir_name(name: &str, url: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  let digest = hex::encode(hasher.finalize());
  format!("{}-{}", name, &digest[..HASH_PREFIX_LEN])
}

fn clone_repo(url: &str, dest: &Path) -> Result<gix::Repository, FetchError> {
  let clone_err = |e: BoxError| FetchError::Clone {
    url: url.to_string(),
    source: e,
  };

  let mut prepared = gix::prepare_clone(url, dest).map_err(|e| clone_err(Box::new(e)))?;
  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| clone_err(Box::new(e)))?;
  let (repo, _outcome) = checkout
    .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| clone_err(Box::new(e)))?;

  Ok(repo)
}

fn fetch_updates(repo: &gix::Repository, url: &str, repo_path: &Path) -> Result<(), FetchError> {
  debug!(url, "fetching updates");
  let fetch_err = |e: BoxError| FetchError::Fetch {
    url: url.to_string(),
    source: e,
  };

  let remote = repo
    .find_default_remote(Direction::Fetch)
    .ok_or_else(|| FetchError::NoRemote(repo_path.to_path_buf()))?
    .map_err(|e| fetch_err(Box::new(e)))?;

  remote
    .connect(Direction::Fetch)
    .map_err(|e| fetch_err(Box::new(e)))?
    .prepare_fetch(gix::progress::Discard, Default::default())
    .map_err(|e| fetch_err(Box::new(e)))?
    .receive(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| fetch_err(Box::new(e)))?;

  Ok(())
}

/// Resolve a path input.
///
/// `~` expands to the home directory, relative paths are anchored at
/// `config_dir`. Returns the canonical path.
pub fn resolve_path(path_str: &str, config_dir: &Path) -> Result<PathBuf, FetchError> {
  let expanded = if let Some(rest) = path_str.strip_prefix("~/") {
    home_dir().join(rest)
  } else if path_str == "~" {
    home_dir()
  } else if Path::new(path_str).is_absolute() {
    PathBuf::from(path_str)
  } else {
    config_dir.join(path_str)
  };

  let canonical = dunce::canonicalize(&expanded).map_err(|e| {
    if e.kind() == std::io::ErrorKind::NotFound {
      FetchError::PathNotFound(expanded.clone())
    } else {
      FetchError::CanonicalizePath {
        path: expanded.clone(),
        source: e,
      }
    }
  })?;

  debug!(path = %canonical.display(), "resolved path input");
  Ok(canonical)
}
