//! End-to-end environments for a rust project on linux and darwin.

use envsys_lib::eval::{EvalError, evaluate_path, load_config};
use envsys_lib::inputs::resolve::ResolveError;
use envsys_lib::package::Package;
use envsys_lib::platform::System;

use super::common::Project;

const RUST_PROJECT: &str = r#"
return {
  inputs = {
    pkgs = "path:./pkgs",
    ["rust-overlay"] = {
      url = "path:./rust-overlay",
      inputs = { pkgs = { follows = "pkgs" } },
    },
  },
  systems = { "x86_64-linux", "aarch64-darwin" },
  toolchain = {
    kind = "rust",
    version = "1.82.0",
    extensions = { "rust-src", "rust-analyzer" },
    from = "rust-overlay",
  },
  packages = {
    "pnpm",
    { "Security", when = "darwin" },
    { "libiconv", when = "darwin" },
  },
  dev_packages = { "cargo-edit", "watchexec" },
  env = { RUST_LOG = "debug", RUST_BACKTRACE = "1" },
}
"#;

fn names(packages: &[Package]) -> Vec<&str> {
  packages.iter().map(Package::name).collect()
}

#[test]
fn linux_environment_excludes_darwin_packages() {
  let project = Project::standard();
  let path = project.config(RUST_PROJECT);

  let projection = evaluate_path(&path, None).unwrap();
  let linux = projection
    .get(&System::new("x86_64-linux"))
    .unwrap()
    .as_ref()
    .unwrap();

  assert_eq!(names(&linux.packages), ["rust", "pnpm", "cargo-edit", "watchexec"]);
  let env: Vec<(&str, &str)> = linux.env.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
  assert_eq!(env, [("RUST_BACKTRACE", "1"), ("RUST_LOG", "debug")]);
}

#[test]
fn darwin_environment_adds_security_and_libiconv() {
  let project = Project::standard();
  let path = project.config(RUST_PROJECT);

  let projection = evaluate_path(&path, None).unwrap();
  let darwin = projection
    .get(&System::new("aarch64-darwin"))
    .unwrap()
    .as_ref()
    .unwrap();

  // libiconv arrives first as a toolchain requirement and is deduplicated later
  assert_eq!(
    names(&darwin.packages),
    ["rust", "libiconv", "pnpm", "Security", "cargo-edit", "watchexec"]
  );
  match darwin.package("libiconv").unwrap() {
    Package::Dependency(p) => assert_eq!(p.version, "1.17"),
    other => panic!("expected a dependency, got {other:?}"),
  }
}

#[test]
fn repeated_evaluation_is_byte_identical() {
  let project = Project::standard();
  let path = project.config(RUST_PROJECT);

  let first = serde_json::to_string(&evaluate_path(&path, None).unwrap()).unwrap();
  let second = serde_json::to_string(&evaluate_path(&path, None).unwrap()).unwrap();
  assert_eq!(first, second);
}

#[test]
fn later_env_layer_wins() {
  let project = Project::standard();
  let path = project.config(
    r#"
      return {
        systems = { "x86_64-linux" },
        env = { { RUST_LOG = "debug" }, { RUST_LOG = "trace" } },
      }
    "#,
  );

  let projection = evaluate_path(&path, None).unwrap();
  let def = projection.definitions().next().unwrap();
  assert_eq!(def.env["RUST_LOG"], "trace");
}

#[test]
fn cyclic_follows_produces_no_definition() {
  let project = Project::standard();
  let path = project.config(
    r#"
      return {
        inputs = { a = { follows = "b" }, b = { follows = "a" } },
        packages = { "pnpm" },
      }
    "#,
  );

  let err = evaluate_path(&path, None).unwrap_err();
  assert!(matches!(err, EvalError::Resolve(ResolveError::CyclicInput { .. })));
}

#[test]
fn mutually_including_catalogs_fail_cleanly() {
  let project = Project::new();
  project.write("a/catalog.lua", r#"return { inputs = { b = "path:../b" } }"#);
  project.write("b/catalog.lua", r#"return { inputs = { a = "path:../a" } }"#);
  let path = project.config(r#"return { inputs = { a = "path:./a" } }"#);

  match evaluate_path(&path, None).unwrap_err() {
    EvalError::Resolve(ResolveError::CyclicInput { chain }) => assert_eq!(chain, "a -> a/b -> a/b/a"),
    other => panic!("expected cyclic input error, got {other}"),
  }
}

#[test]
fn unknown_toolchain_version_aborts() {
  let project = Project::standard();
  let path = project.config(
    r#"
      return {
        inputs = { ["rust-overlay"] = "path:./rust-overlay" },
        toolchain = { kind = "rust", version = "1.70.0" },
      }
    "#,
  );

  let err = evaluate_path(&path, None).unwrap_err();
  assert!(err.to_string().contains("1.70.0"));
}

#[test]
fn scripts_and_hook_are_part_of_the_definition() {
  let project = Project::standard();
  let path = project.config(
    r#"
      return {
        inputs = { pkgs = "path:./pkgs" },
        systems = { "x86_64-linux" },
        dev_packages = { "watchexec" },
        scripts = { test = "cargo test --workspace" },
        hook = {
          { bin = "watchexec", args = { "--version" } },
          { run = "mkdir -p .cache", creates = ".cache" },
        },
      }
    "#,
  );

  let config = load_config(&path).unwrap();
  assert_eq!(config.hook.len(), 2);

  let projection = evaluate_path(&path, None).unwrap();
  let def = projection.definitions().next().unwrap();
  assert_eq!(names(&def.packages), ["watchexec", "test"]);
  assert_eq!(def.hook.steps.len(), 2);
  assert_eq!(def.hook.steps[1].creates(), Some(".cache"));
}
