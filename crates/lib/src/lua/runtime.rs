use std::path::Path;

use mlua::prelude::*;

use crate::consts::{APP_NAME, DEFAULT_SYSTEMS};
use crate::lua::loaders;

/// Create a Lua runtime for evaluating configuration files.
///
/// Installs the `__dir`-aware loaders and an `envsys` global table carrying
/// the crate version and the default system list. No host facts (current OS,
/// architecture) are exposed: one configuration is projected onto every system.
pub fn create_runtime() -> LuaResult<Lua> {
  let lua = Lua::new();
  let package = lua.globals().get::<LuaTable>("package")?;
  let package_path = package.get::<String>("path")?;
  package.set("path", format!("./lua/?.lua;./lua/?/init.lua;{}", package_path))?;

  loaders::install_loaders(&lua)?;

  let envsys = lua.create_table()?;
  envsys.set("version", env!("CARGO_PKG_VERSION"))?;
  envsys.set("default_systems", lua.create_sequence_from(DEFAULT_SYSTEMS.iter().copied())?)?;
  lua.globals().set(APP_NAME, envsys)?;

  Ok(lua)
}

/// Evaluate a Lua file, returning whatever the chunk returns.
pub fn load_file(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  loaders::load_file_with_dir(lua, path)
}

/// Evaluate an in-memory chunk, e.g. a catalog read from a git blob.
///
/// `chunk_name` shows up in Lua error messages.
pub fn load_chunk(lua: &Lua, chunk_name: &str, content: &str) -> LuaResult<LuaValue> {
  lua.load(content).set_name(format!("@{}", chunk_name)).eval::<LuaValue>()
}
