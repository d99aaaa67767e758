//! Module loading with per-file `__dir` injection.
//!
//! Config files may be split across several Lua files. `dofile` and the Lua
//! file searcher behind `require` are replaced so that every loaded file sees
//! a `__dir` variable holding its own directory, and relative `dofile` paths
//! resolve against it.

use std::fs;
use std::path::{Path, PathBuf};

use mlua::prelude::*;

/// Registry key holding the `__dir` of the file currently being evaluated.
const CURRENT_DIR_KEY: &str = "__envsys_current_dir";

/// Evaluate a Lua file in an environment whose `__dir` is the file's directory.
pub fn load_file_with_dir(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  let canonical_path = dunce::canonicalize(path)
    .map_err(|e| LuaError::external(format!("cannot resolve '{}': {}", path.display(), e)))?;

  let content = fs::read_to_string(&canonical_path)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", canonical_path.display(), e)))?;

  let dir = canonical_path
    .parent()
    .unwrap_or(Path::new("."))
    .to_string_lossy()
    .into_owned();

  let prev_dir: Option<String> = lua.named_registry_value(CURRENT_DIR_KEY)?;
  lua.set_named_registry_value(CURRENT_DIR_KEY, dir.clone())?;

  let env = lua.create_table()?;
  env.set("__dir", dir)?;
  let mt = lua.create_table()?;
  mt.set("__index", lua.globals())?;
  env.set_metatable(Some(mt))?;

  let result = lua
    .load(&content)
    .set_name(format!("@{}", canonical_path.display()))
    .set_environment(env)
    .eval::<LuaValue>();

  // Restore even on error; a failed restore must not mask the evaluation error
  let _ = lua.set_named_registry_value(CURRENT_DIR_KEY, prev_dir);

  result
}

/// Resolve `path_str` against the `__dir` of the file being evaluated.
fn resolve_path(lua: &Lua, path_str: &str) -> LuaResult<PathBuf> {
  let path = Path::new(path_str);
  if path.is_absolute() {
    return Ok(path.to_path_buf());
  }

  let current: Option<String> = lua.named_registry_value(CURRENT_DIR_KEY)?;
  Ok(match current {
    Some(dir) => Path::new(&dir).join(path),
    None => path.to_path_buf(),
  })
}

fn create_lua_searcher(lua: &Lua) -> LuaResult<LuaFunction> {
  lua.create_function(|lua, modname: String| {
    let package: LuaTable = lua.globals().get("package")?;
    let search_path: String = package.get("path")?;
    let searchpath: LuaFunction = package.get("searchpath")?;
    let result: LuaMultiValue = searchpath.call((modname.clone(), search_path))?;

    match result.into_iter().next() {
      Some(LuaValue::String(found)) => {
        let file = found.to_str()?.to_string();
        let target = file.clone();
        let loader = lua.create_function(move |lua, _: LuaMultiValue| load_file_with_dir(lua, Path::new(&target)))?;
        Ok((LuaValue::Function(loader), file))
      }
      _ => Ok((LuaValue::Nil, format!("\n\tno file for module '{}'", modname))),
    }
  })
}

fn create_dofile(lua: &Lua) -> LuaResult<LuaFunction> {
  lua.create_function(|lua, path: Option<String>| match path {
    Some(path) => {
      let resolved = resolve_path(lua, &path)?;
      load_file_with_dir(lua, &resolved)
    }
    None => Err(LuaError::external("dofile() without a path is not supported")),
  })
}

/// Replace `package.searchers[2]` and `dofile` with `__dir`-aware versions.
pub fn install_loaders(lua: &Lua) -> LuaResult<()> {
  let package: LuaTable = lua.globals().get("package")?;
  let searchers: LuaTable = package.get("searchers")?;
  searchers.set(2, create_lua_searcher(lua)?)?;

  lua.globals().set("dofile", create_dofile(lua)?)?;
  Ok(())
}
