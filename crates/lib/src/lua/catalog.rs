//! `catalog.lua` parsing.
//!
//! ```lua
//! return {
//!   inputs = { pkgs = "git:https://example.com/pkgs.git#abc123" },
//!   packages = {
//!     pnpm = "9.12.0",
//!     Security = { version = "11.3", systems = { "aarch64-darwin", "x86_64-darwin" } },
//!   },
//!   toolchains = {
//!     rust = {
//!       versions = { "1.82.0" },
//!       extensions = { "rust-src", "rust-analyzer" },
//!       targets = { "wasm32-unknown-unknown" },
//!       requires = { { "libiconv", from = "pkgs", when = "darwin" } },
//!     },
//!   },
//! }
//! ```
//!
//! Catalogs are evaluated in a fresh VM without loaders: a catalog read from a
//! git object has no directory to load siblings from.

use std::collections::BTreeMap;

use mlua::prelude::*;
use tracing::trace;

use crate::inputs::catalog::{Catalog, PackageOffer, ToolchainOffer};
use crate::lua::runtime;
use crate::lua::values::{dependency_list, input_name, string_list, string_map, string_set};
use crate::platform::System;

/// Evaluate catalog source text.
pub fn parse_catalog(chunk_name: &str, content: &str) -> LuaResult<Catalog> {
  let lua = Lua::new();
  let value = runtime::load_chunk(&lua, chunk_name, content)?;

  let table = match value {
    LuaValue::Table(t) => t,
    other => {
      return Err(LuaError::external(format!(
        "catalog must return a table, got {}",
        other.type_name()
      )));
    }
  };

  let inputs = string_map("inputs", table.get("inputs")?)?;
  for name in inputs.keys() {
    input_name(&format!("{} inputs", chunk_name), name)?;
  }

  let catalog = Catalog {
    inputs,
    packages: parse_packages(table.get("packages")?)?,
    toolchains: parse_toolchains(table.get("toolchains")?)?,
  };

  trace!(
    catalog = chunk_name,
    inputs = catalog.inputs.len(),
    packages = catalog.packages.len(),
    toolchains = catalog.toolchains.len(),
    "parsed catalog"
  );
  Ok(catalog)
}

fn parse_packages(value: LuaValue) -> LuaResult<BTreeMap<String, PackageOffer>> {
  let table = match value {
    LuaValue::Nil => return Ok(BTreeMap::new()),
    LuaValue::Table(t) => t,
    other => {
      return Err(LuaError::external(format!(
        "packages must be a table, got {}",
        other.type_name()
      )));
    }
  };

  let mut packages = BTreeMap::new();
  for pair in table.pairs::<String, LuaValue>() {
    let (name, value) = pair?;
    let offer = match value {
      LuaValue::String(version) => PackageOffer::new(version.to_str()?.to_string()),
      LuaValue::Table(t) => {
        let version: String = t
          .get::<Option<String>>("version")?
          .ok_or_else(|| LuaError::external(format!("packages.{}: missing version", name)))?;
        let systems: LuaValue = t.get("systems")?;
        let systems = if systems.is_nil() {
          None
        } else {
          Some(
            string_list(&format!("packages.{}.systems", name), systems)?
              .into_iter()
              .map(System::new)
              .collect(),
          )
        };
        PackageOffer { version, systems }
      }
      other => {
        return Err(LuaError::external(format!(
          "packages.{}: expected a version string or table, got {}",
          name,
          other.type_name()
        )));
      }
    };
    packages.insert(name, offer);
  }
  Ok(packages)
}

fn parse_toolchains(value: LuaValue) -> LuaResult<BTreeMap<String, ToolchainOffer>> {
  let table = match value {
    LuaValue::Nil => return Ok(BTreeMap::new()),
    LuaValue::Table(t) => t,
    other => {
      return Err(LuaError::external(format!(
        "toolchains must be a table, got {}",
        other.type_name()
      )));
    }
  };

  let mut toolchains = BTreeMap::new();
  for pair in table.pairs::<String, LuaTable>() {
    let (kind, t) = pair?;
    let field = |key: &str| format!("toolchains.{}.{}", kind, key);
    let offer = ToolchainOffer {
      versions: string_set(&field("versions"), t.get("versions")?)?,
      extensions: string_set(&field("extensions"), t.get("extensions")?)?,
      targets: string_set(&field("targets"), t.get("targets")?)?,
      requires: dependency_list(&field("requires"), t.get("requires")?)?,
    };
    if offer.versions.is_empty() {
      return Err(LuaError::external(format!("{}: at least one version is required", field("versions"))));
    }
    toolchains.insert(kind, offer);
  }
  Ok(toolchains)
}
