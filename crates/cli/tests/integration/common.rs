//! Shared helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

pub const PKGS_CATALOG: &str = r#"
return {
  packages = {
    pnpm = "9.12.0",
    watchexec = "2.2.0",
    libiconv = "1.17",
    Security = { version = "11.3", systems = { "aarch64-darwin" } },
  },
  toolchains = {
    rust = { versions = { "1.82.0" }, extensions = { "rust-src" } },
  },
}
"#;

pub const RUST_CONFIG: &str = r#"
return {
  inputs = { pkgs = "path:./pkgs" },
  systems = { "x86_64-linux", "aarch64-darwin" },
  toolchain = { kind = "rust", version = "1.82.0", extensions = { "rust-src" } },
  packages = { "pnpm", { "Security", when = "darwin" }, { "libiconv", when = "darwin" } },
  dev_packages = { "watchexec" },
  scripts = { test = "cargo test --workspace" },
  env = { RUST_LOG = "debug", RUST_BACKTRACE = "1" },
  hook = { { run = "mkdir -p .cache", creates = ".cache" } },
}
"#;

/// Project directory with a config and a `pkgs` path input.
pub struct TestEnv {
  pub temp: TempDir,
  pub config_path: PathBuf,
}

impl TestEnv {
  pub fn new(config: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("envsys.lua");
    let env = Self { temp, config_path };
    env.write_file("pkgs/catalog.lua", PKGS_CATALOG);
    env.write_file("envsys.lua", config);
    env
  }

  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// A command running in the project directory.
  pub fn cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("envsys");
    cmd.current_dir(self.temp.path()).env_remove("RUST_LOG");
    cmd
  }
}
