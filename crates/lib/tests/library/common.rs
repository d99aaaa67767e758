//! Shared fixtures for library integration tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use envsys_lib::inputs::fetch::{FetchError, FetchedSource, LocalFetcher, SourceFetcher};
use envsys_lib::inputs::source::InputSource;
use tempfile::TempDir;

/// Package source shared by most fixtures.
pub const PKGS_CATALOG: &str = r#"
return {
  packages = {
    pnpm = "9.12.0",
    ["cargo-edit"] = "0.13.0",
    watchexec = "2.2.0",
    libiconv = "1.17",
    Security = { version = "11.3", systems = { "aarch64-darwin", "x86_64-darwin" } },
  },
}
"#;

/// An older package source the overlay pins on its own.
pub const OLD_PKGS_CATALOG: &str = r#"
return {
  packages = { libiconv = "1.16", pnpm = "8.15.0" },
}
"#;

/// Offers the rust toolchain; its darwin requirement comes from its own `pkgs`.
pub const OVERLAY_CATALOG: &str = r#"
return {
  inputs = { pkgs = "path:../old-pkgs" },
  toolchains = {
    rust = {
      versions = { "1.81.0", "1.82.0" },
      extensions = { "rust-src", "rust-analyzer", "clippy" },
      targets = { "wasm32-unknown-unknown" },
      requires = { { "libiconv", from = "pkgs", when = "darwin" } },
    },
  },
}
"#;

/// A project directory with a config and some input directories.
pub struct Project {
  pub temp: TempDir,
}

impl Project {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// The standard layout: `pkgs`, `old-pkgs` and `rust-overlay` inputs.
  pub fn standard() -> Self {
    let project = Self::new();
    project.write("pkgs/catalog.lua", PKGS_CATALOG);
    project.write("old-pkgs/catalog.lua", OLD_PKGS_CATALOG);
    project.write("rust-overlay/catalog.lua", OVERLAY_CATALOG);
    project
  }

  pub fn write(&self, relative: &str, content: &str) {
    let path = self.temp.path().join(relative);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
  }

  pub fn config(&self, content: &str) -> PathBuf {
    self.write("envsys.lua", content);
    self.config_path()
  }

  pub fn config_path(&self) -> PathBuf {
    self.temp.path().join("envsys.lua")
  }

  pub fn dir(&self) -> &Path {
    self.temp.path()
  }
}

/// Wraps [`LocalFetcher`] and records every fetched locator.
pub struct RecordingFetcher {
  inner: LocalFetcher,
  pub fetched: Mutex<Vec<PathBuf>>,
}

impl RecordingFetcher {
  pub fn new(config_dir: &Path) -> Self {
    Self {
      inner: LocalFetcher::new(config_dir),
      fetched: Mutex::new(Vec::new()),
    }
  }

  /// Whether a path input ending in `dir_name` was fetched.
  pub fn fetched_dir(&self, dir_name: &str) -> bool {
    self.fetched.lock().unwrap().iter().any(|p| p.ends_with(dir_name))
  }
}

impl SourceFetcher for RecordingFetcher {
  fn fetch(&self, name: &str, source: &InputSource) -> Result<FetchedSource, FetchError> {
    let fetched = self.inner.fetch(name, source)?;
    if let Some(root) = &fetched.root {
      self.fetched.lock().unwrap().push(root.clone());
    }
    Ok(fetched)
  }
}
