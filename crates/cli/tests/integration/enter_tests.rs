//! Entering environments and projecting across systems.

use predicates::prelude::*;
use serde_json::Value;

use super::common::{RUST_CONFIG, TestEnv};

#[test]
fn linux_activation_script() {
  let env = TestEnv::new(RUST_CONFIG);
  let output = env
    .cmd()
    .args(["--system", "x86_64-linux", "--shell", "bash"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();
  let script = String::from_utf8(output).unwrap();

  assert!(script.starts_with("#!/usr/bin/env bash"));
  assert!(script.contains("# provides rust-1.82.0"));
  assert!(script.contains("# provides pnpm-9.12.0"));
  assert!(!script.contains("Security"));
  assert!(!script.contains("libiconv"));
  assert!(script.contains("export RUST_BACKTRACE='1'\nexport RUST_LOG='debug'"));
  assert!(script.contains("test() {\n  cargo test --workspace \"$@\"\n}"));
  assert!(script.contains("if [ ! -e '.cache' ]; then\n  mkdir -p .cache\nfi"));
}

#[test]
fn darwin_activation_script_includes_conditionals() {
  let env = TestEnv::new(RUST_CONFIG);
  env
    .cmd()
    .args(["--system", "aarch64-darwin", "--shell", "zsh"])
    .assert()
    .success()
    .stdout(predicate::str::contains("# provides Security-11.3"))
    .stdout(predicate::str::contains("# provides libiconv-1.17"));
}

#[test]
fn shell_detected_from_environment() {
  let env = TestEnv::new(RUST_CONFIG);
  env
    .cmd()
    .env("SHELL", "/usr/bin/fish")
    .args(["--system", "x86_64-linux"])
    .assert()
    .success()
    .stdout(predicate::str::contains("set -gx RUST_LOG 'debug'"));
}

#[test]
fn all_prints_summary_per_system() {
  let env = TestEnv::new(RUST_CONFIG);
  env
    .cmd()
    .arg("--all")
    .assert()
    .success()
    .stdout(predicate::str::contains("x86_64-linux"))
    .stdout(predicate::str::contains("aarch64-darwin"))
    .stdout(predicate::str::contains("Security 11.3"));
}

#[test]
fn json_projection() {
  let env = TestEnv::new(RUST_CONFIG);
  let output = env
    .cmd()
    .args(["--all", "--format", "json"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();
  let text = String::from_utf8(output).unwrap();
  let json: Value = serde_json::from_str(&text).unwrap();

  // systems keep their configured order
  assert!(text.find("\"x86_64-linux\"").unwrap() < text.find("\"aarch64-darwin\"").unwrap());
  assert_eq!(json["x86_64-linux"]["ok"]["env"]["RUST_LOG"], "debug");
  assert_eq!(json["aarch64-darwin"]["ok"]["system"], "aarch64-darwin");
}

#[test]
fn json_output_is_deterministic() {
  let env = TestEnv::new(RUST_CONFIG);
  let run = || {
    env
      .cmd()
      .args(["--all", "--format", "json"])
      .assert()
      .success()
      .get_output()
      .stdout
      .clone()
  };
  assert_eq!(run(), run());
}

#[test]
fn failing_system_exits_nonzero() {
  // Security is requested unconditionally but only offered on darwin
  let env = TestEnv::new(
    r#"
return {
  inputs = { pkgs = "path:./pkgs" },
  systems = { "x86_64-linux", "aarch64-darwin" },
  packages = { "Security" },
}
"#,
  );
  env
    .cmd()
    .arg("--all")
    .assert()
    .failure()
    .stdout(predicate::str::contains("aarch64-darwin"))
    .stderr(predicate::str::contains("x86_64-linux"));
}

#[test]
fn cyclic_follows_fails_before_output() {
  let env = TestEnv::new(
    r#"
return {
  inputs = {
    a = { follows = "b" },
    b = { follows = "a" },
  },
  packages = { "pnpm" },
}
"#,
  );
  env
    .cmd()
    .args(["--all", "--format", "json"])
    .assert()
    .failure()
    .stdout(predicate::str::is_empty())
    .stderr(predicate::str::contains("Failed to evaluate config"));
}
