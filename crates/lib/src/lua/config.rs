//! `envsys.lua` parsing.
//!
//! ```lua
//! return {
//!   inputs = {
//!     pkgs = "git:https://github.com/org/pkgs.git#4f2a9c1",
//!     rust_overlay = {
//!       url = "git:https://github.com/org/rust-overlay.git#9b1e0d2",
//!       inputs = { pkgs = { follows = "pkgs" } },
//!     },
//!   },
//!   systems = { "x86_64-linux", "aarch64-darwin" },
//!   toolchain = { kind = "rust", version = "1.82.0", extensions = { "rust-src" } },
//!   packages = { "openssl", { "Security", when = "darwin" } },
//!   dev_packages = { "cargo-watch" },
//!   scripts = { test = "cargo test --workspace" },
//!   env = { RUST_LOG = "debug", RUST_BACKTRACE = "1" },
//!   hook = { { bin = "lefthook", args = { "install" }, creates = ".git/hooks/pre-commit" } },
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use mlua::prelude::*;
use tracing::debug;

use crate::config::{Config, EnvLayer};
use crate::hook::{HookAction, HookStep};
use crate::inputs::{InputDecl, InputDecls, InputOverride};
use crate::lua::runtime;
use crate::lua::values::{
  dependency_list, input_name, is_sequence, parse_condition, scalar_to_string, string_list, string_map, string_set,
};
use crate::package::Script;
use crate::platform::System;
use crate::toolchain::ToolchainRequest;

/// Evaluate a config file.
pub fn load_config(path: &Path) -> LuaResult<Config> {
  let canonical = dunce::canonicalize(path)
    .map_err(|e| LuaError::external(format!("cannot resolve '{}': {}", path.display(), e)))?;

  let lua = runtime::create_runtime()?;
  let value = runtime::load_file(&lua, &canonical)?;
  let table = match value {
    LuaValue::Table(t) => t,
    other => {
      return Err(LuaError::external(format!(
        "config must return a table, got {}",
        other.type_name()
      )));
    }
  };

  let mut config = parse_config(&table)?;
  config.path = canonical;
  debug!(
    path = %config.path.display(),
    inputs = config.inputs.len(),
    packages = config.packages.len(),
    dev_packages = config.dev_packages.len(),
    "loaded config"
  );
  Ok(config)
}

/// Parse an evaluated config table. `path` is left empty.
pub fn parse_config(table: &LuaTable) -> LuaResult<Config> {
  Ok(Config {
    path: Default::default(),
    inputs: parse_input_decls(table.get("inputs")?)?,
    systems: string_list("systems", table.get("systems")?)?
      .into_iter()
      .map(System::new)
      .collect(),
    toolchain: parse_toolchain(table.get("toolchain")?)?,
    packages: dependency_list("packages", table.get("packages")?)?,
    dev_packages: dependency_list("dev_packages", table.get("dev_packages")?)?,
    scripts: parse_scripts(table.get("scripts")?)?,
    env: parse_env(table.get("env")?)?,
    hook: parse_hook(table.get("hook")?)?,
  })
}

fn parse_input_decls(value: LuaValue) -> LuaResult<InputDecls> {
  let table = match value {
    LuaValue::Nil => return Ok(BTreeMap::new()),
    LuaValue::Table(t) => t,
    _ => return Err(LuaError::external("inputs must be a table")),
  };

  let mut decls = BTreeMap::new();
  for pair in table.pairs::<String, LuaValue>() {
    let (name, value) = pair?;
    input_name("inputs", &name)?;
    let decl = parse_input_decl(&name, value)?;
    decls.insert(name, decl);
  }
  Ok(decls)
}

fn parse_input_decl(name: &str, value: LuaValue) -> LuaResult<InputDecl> {
  match value {
    LuaValue::String(url) => Ok(InputDecl::Url(url.to_str()?.to_string())),
    LuaValue::Table(table) => {
      let follows: Option<String> = table.get("follows")?;
      let url: Option<String> = table.get("url")?;
      let inputs_value: LuaValue = table.get("inputs")?;

      if let Some(target) = follows {
        if url.is_some() || !inputs_value.is_nil() {
          return Err(LuaError::external(format!(
            "input '{}': 'follows' cannot be combined with 'url' or 'inputs'",
            name
          )));
        }
        return Ok(InputDecl::Follows(target));
      }

      let overrides = match inputs_value {
        LuaValue::Nil => BTreeMap::new(),
        LuaValue::Table(inputs_table) => parse_input_overrides(name, &inputs_table)?,
        _ => {
          return Err(LuaError::external(format!(
            "input '{}': inputs field must be a table",
            name
          )));
        }
      };

      Ok(InputDecl::Extended { url, inputs: overrides })
    }
    _ => Err(LuaError::external(format!(
      "input '{}' must be a locator string or a table",
      name
    ))),
  }
}

fn parse_input_overrides(input: &str, table: &LuaTable) -> LuaResult<BTreeMap<String, InputOverride>> {
  let mut overrides = BTreeMap::new();
  for pair in table.pairs::<String, LuaValue>() {
    let (name, value) = pair?;
    input_name(&format!("input '{}' overrides", input), &name)?;
    let override_ = match value {
      LuaValue::String(url) => InputOverride::Url(url.to_str()?.to_string()),
      LuaValue::Table(t) => {
        let follows: Option<String> = t.get("follows")?;
        let url: Option<String> = t.get("url")?;
        match (follows, url) {
          (Some(target), None) => InputOverride::Follows(target),
          (None, Some(url)) => InputOverride::Url(url),
          _ => {
            return Err(LuaError::external(format!(
              "override '{}' must have exactly one of 'url' or 'follows'",
              name
            )));
          }
        }
      }
      _ => {
        return Err(LuaError::external(format!(
          "override '{}' must be a locator string or a table with 'url' or 'follows'",
          name
        )));
      }
    };
    overrides.insert(name, override_);
  }
  Ok(overrides)
}

fn parse_toolchain(value: LuaValue) -> LuaResult<Option<ToolchainRequest>> {
  let table = match value {
    LuaValue::Nil => return Ok(None),
    LuaValue::Table(t) => t,
    _ => return Err(LuaError::external("toolchain must be a table")),
  };

  let kind: Option<String> = table.get("kind")?;
  let version: Option<String> = table.get("version")?;
  let (Some(kind), Some(version)) = (kind, version) else {
    return Err(LuaError::external("toolchain needs both 'kind' and 'version'"));
  };

  Ok(Some(ToolchainRequest {
    kind,
    version,
    extensions: string_set("toolchain.extensions", table.get("extensions")?)?,
    targets: string_set("toolchain.targets", table.get("targets")?)?,
    from: table.get("from")?,
  }))
}

/// `{ name = command }` (ordered by name) or a list of `{ name = ..., run = ... }`.
fn parse_scripts(value: LuaValue) -> LuaResult<Vec<Script>> {
  let table = match value {
    LuaValue::Nil => return Ok(Vec::new()),
    LuaValue::Table(t) => t,
    _ => return Err(LuaError::external("scripts must be a table")),
  };

  if !is_sequence(&table) {
    let scripts = string_map("scripts", LuaValue::Table(table))?;
    return Ok(scripts.into_iter().map(|(name, run)| Script::new(name, run)).collect());
  }

  let mut scripts = Vec::new();
  for (i, entry) in table.sequence_values::<LuaTable>().enumerate() {
    let entry = entry?;
    let name: Option<String> = entry.get("name")?;
    let run: Option<String> = entry.get("run")?;
    match (name, run) {
      (Some(name), Some(run)) => scripts.push(Script::new(name, run)),
      _ => {
        return Err(LuaError::external(format!(
          "scripts[{}]: needs both 'name' and 'run'",
          i + 1
        )));
      }
    }
  }
  Ok(scripts)
}

/// A single `{ NAME = value }` layer or a list of layers.
fn parse_env(value: LuaValue) -> LuaResult<Vec<EnvLayer>> {
  let table = match value {
    LuaValue::Nil => return Ok(Vec::new()),
    LuaValue::Table(t) => t,
    _ => return Err(LuaError::external("env must be a table")),
  };

  if !is_sequence(&table) {
    return Ok(vec![string_map("env", LuaValue::Table(table))?]);
  }

  let mut layers = Vec::new();
  for pair in table.pairs::<LuaValue, LuaValue>() {
    if let (LuaValue::String(key), _) = pair? {
      return Err(LuaError::external(format!(
        "env: '{}' mixes a named variable with a list of layers",
        key.to_str()?
      )));
    }
  }
  for (i, layer) in table.sequence_values::<LuaValue>().enumerate() {
    layers.push(string_map(&format!("env[{}]", i + 1), layer?)?);
  }
  Ok(layers)
}

fn parse_hook(value: LuaValue) -> LuaResult<Vec<HookStep>> {
  let table = match value {
    LuaValue::Nil => return Ok(Vec::new()),
    LuaValue::String(run) => return Ok(vec![HookStep::inline(run.to_str()?.to_string())]),
    LuaValue::Table(t) => t,
    _ => return Err(LuaError::external("hook must be a list of steps")),
  };

  let mut steps = Vec::new();
  for (i, entry) in table.sequence_values::<LuaValue>().enumerate() {
    let field = format!("hook[{}]", i + 1);
    let step = match entry? {
      LuaValue::String(run) => HookStep::inline(run.to_str()?.to_string()),
      LuaValue::Table(t) => parse_hook_step(&field, &t)?,
      other => {
        return Err(LuaError::external(format!(
          "{}: expected a command string or table, got {}",
          field,
          other.type_name()
        )));
      }
    };
    steps.push(step);
  }
  Ok(steps)
}

fn parse_hook_step(field: &str, table: &LuaTable) -> LuaResult<HookStep> {
  let run: Option<String> = table.get("run")?;
  let bin: Option<String> = table.get("bin")?;
  let creates: LuaValue = table.get("creates")?;
  let creates = if creates.is_nil() {
    None
  } else {
    Some(scalar_to_string(&format!("{}.creates", field), creates)?)
  };

  let action = match (run, bin) {
    (Some(run), None) => HookAction::Inline { run },
    (None, Some(bin)) => HookAction::Exec {
      bin,
      args: string_list(&format!("{}.args", field), table.get("args")?)?,
      package: table.get("package")?,
      from: table.get("from")?,
    },
    _ => {
      return Err(LuaError::external(format!(
        "{}: a step needs exactly one of 'run' or 'bin'",
        field
      )));
    }
  };

  let condition = parse_condition(&format!("{}.when", field), table.get("when")?)?;

  Ok(HookStep {
    action,
    creates,
    condition,
  })
}
