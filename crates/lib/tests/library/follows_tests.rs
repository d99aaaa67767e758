//! `follows` unification across inputs.

use std::sync::Arc;

use envsys_lib::compose::ComposeError;
use envsys_lib::eval::{Evaluation, load_config};
use envsys_lib::package::Package;
use envsys_lib::platform::System;
use envsys_lib::project::SystemError;

use super::common::{Project, RecordingFetcher};

const FOLLOWING: &str = r#"
return {
  inputs = {
    pkgs = "path:./pkgs",
    ["rust-overlay"] = {
      url = "path:./rust-overlay",
      inputs = { pkgs = { follows = "pkgs" } },
    },
    tools = {
      url = "path:./tools",
      inputs = { pkgs = { follows = "pkgs" } },
    },
  },
  toolchain = { kind = "rust", version = "1.82.0" },
  packages = { "pnpm", { "libiconv", when = "darwin" } },
}
"#;

const TOOLS_CATALOG: &str = r#"
return {
  inputs = { pkgs = "path:../old-pkgs" },
  packages = { lefthook = "1.7.18" },
}
"#;

fn project() -> Project {
  let project = Project::standard();
  project.write("tools/catalog.lua", TOOLS_CATALOG);
  project
}

#[test]
fn inputs_following_the_same_input_share_one_instance() {
  let project = project();
  let config = load_config(&project.config(FOLLOWING)).unwrap();
  let fetcher = RecordingFetcher::new(project.dir());

  let evaluation = Evaluation::prepare(config, &fetcher).unwrap();
  let graph = &evaluation.graph;
  let pkgs = graph.get("pkgs").unwrap();
  let overlay_pkgs = &graph.get("rust-overlay").unwrap().inputs["pkgs"];
  let tools_pkgs = &graph.get("tools").unwrap().inputs["pkgs"];

  assert!(Arc::ptr_eq(pkgs, overlay_pkgs));
  assert!(Arc::ptr_eq(overlay_pkgs, tools_pkgs));
  assert!(!fetcher.fetched_dir("old-pkgs"));
}

#[test]
fn followed_requirements_do_not_diverge() {
  let project = project();
  let config = load_config(&project.config(FOLLOWING)).unwrap();
  let fetcher = RecordingFetcher::new(project.dir());

  let evaluation = Evaluation::prepare(config, &fetcher).unwrap();
  let darwin = evaluation.evaluate_system(&System::new("aarch64-darwin")).unwrap();

  let libiconv: Vec<&Package> = darwin.packages.iter().filter(|p| p.name() == "libiconv").collect();
  assert_eq!(libiconv.len(), 1);
  match libiconv[0] {
    Package::Dependency(p) => assert_eq!(p.version, "1.17"),
    other => panic!("expected a dependency, got {other:?}"),
  }
}

#[test]
fn without_follows_the_overlay_pins_its_own_packages() {
  let project = project();
  let path = project.config(
    r#"
      return {
        inputs = {
          pkgs = "path:./pkgs",
          ["rust-overlay"] = "path:./rust-overlay",
        },
        toolchain = { kind = "rust", version = "1.82.0" },
        packages = { { "libiconv", from = "pkgs", when = "darwin" } },
      }
    "#,
  );
  let config = load_config(&path).unwrap();
  let fetcher = RecordingFetcher::new(project.dir());

  let evaluation = Evaluation::prepare(config, &fetcher).unwrap();
  assert!(fetcher.fetched_dir("old-pkgs"));

  // The overlay's libiconv 1.16 collides with the root's 1.17
  let err = evaluation
    .evaluate_system(&System::new("aarch64-darwin"))
    .unwrap_err();
  assert!(matches!(
    err,
    SystemError::Compose(ComposeError::ConflictingPackage { ref name, .. }) if name == "libiconv"
  ));

  // Linux never looks libiconv up, so it still composes
  assert!(evaluation.evaluate_system(&System::new("x86_64-linux")).is_ok());
}

#[test]
fn alias_and_target_count_as_one_provider() {
  let project = project();
  let path = project.config(
    r#"
      return {
        inputs = { pkgs = "path:./pkgs", nixpkgs = { follows = "pkgs" } },
        packages = { "pnpm" },
      }
    "#,
  );
  let config = load_config(&path).unwrap();
  let fetcher = RecordingFetcher::new(project.dir());

  let evaluation = Evaluation::prepare(config, &fetcher).unwrap();
  assert!(Arc::ptr_eq(
    evaluation.graph.get("pkgs").unwrap(),
    evaluation.graph.get("nixpkgs").unwrap()
  ));
  assert!(evaluation.evaluate_system(&System::new("x86_64-linux")).is_ok());
}
