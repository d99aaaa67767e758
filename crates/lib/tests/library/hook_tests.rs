//! Hook steps resolved against the composed environment.

use envsys_lib::eval::evaluate_path;
use envsys_lib::hook::ResolvedStep;
use envsys_lib::package::PackageId;
use envsys_lib::platform::System;

use super::common::Project;

fn providers(path: &std::path::Path, system: &str) -> Vec<PackageId> {
  let projection = evaluate_path(path, None).unwrap();
  let def = projection.get(&System::new(system)).unwrap().as_ref().unwrap();
  def
    .hook
    .steps
    .iter()
    .filter_map(|step| match step {
      ResolvedStep::Exec { provider, .. } => Some(provider.clone()),
      ResolvedStep::Inline { .. } => None,
    })
    .collect()
}

#[test]
fn toolchain_binary_runs_from_the_toolchain() {
  let project = Project::standard();
  let path = project.config(
    r#"
      return {
        inputs = { ["rust-overlay"] = "path:./rust-overlay" },
        systems = { "x86_64-linux" },
        toolchain = { kind = "rust", version = "1.82.0" },
        hook = { { bin = "cargo", args = { "fetch" }, package = "rust" } },
      }
    "#,
  );

  let providers = providers(&path, "x86_64-linux");
  assert_eq!(providers.len(), 1);
  assert_eq!(providers[0].name, "rust");
  assert_eq!(providers[0].version, "1.82.0");
}

#[test]
fn binary_offered_by_two_inputs_uses_the_pinned_package() {
  let project = Project::standard();
  let path = project.config(
    r#"
      return {
        inputs = { pkgs = "path:./pkgs", legacy = "path:./old-pkgs" },
        systems = { "x86_64-linux" },
        packages = { { "pnpm", from = "pkgs" } },
        hook = { { bin = "pnpm", args = { "install" } } },
      }
    "#,
  );

  let providers = providers(&path, "x86_64-linux");
  assert_eq!(providers[0].version, "9.12.0");
}

#[test]
fn exec_step_can_name_its_input() {
  let project = Project::standard();
  let path = project.config(
    r#"
      return {
        inputs = { pkgs = "path:./pkgs", legacy = "path:./old-pkgs" },
        systems = { "x86_64-linux" },
        hook = { { bin = "pnpm", args = { "--version" }, from = "legacy" } },
      }
    "#,
  );

  let providers = providers(&path, "x86_64-linux");
  assert_eq!(providers[0].version, "8.15.0");
}

#[test]
fn darwin_only_step_does_not_fail_linux() {
  let project = Project::standard();
  let path = project.config(
    r#"
      return {
        inputs = { pkgs = "path:./pkgs" },
        systems = { "x86_64-linux", "aarch64-darwin" },
        packages = { { "Security", when = "darwin" } },
        hook = { { bin = "security", args = { "list-keychains" }, package = "Security", when = "darwin" } },
      }
    "#,
  );

  assert!(providers(&path, "x86_64-linux").is_empty());
  let darwin = providers(&path, "aarch64-darwin");
  assert_eq!(darwin[0].name, "Security");
}
