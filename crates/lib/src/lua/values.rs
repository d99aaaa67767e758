//! Conversions from Lua values into envsys types.
//!
//! Shared by the config and catalog parsers. Errors name the field they were
//! found in so a bad config points at the offending entry.

use std::collections::{BTreeMap, BTreeSet};

use mlua::prelude::*;

use crate::package::Dependency;
use crate::platform::condition::Condition;

/// Whether a table has a non-empty array part.
pub fn is_sequence(table: &LuaTable) -> bool {
  table.raw_len() > 0
}

/// A Lua string, number or boolean rendered as a string.
pub fn scalar_to_string(field: &str, value: LuaValue) -> LuaResult<String> {
  match value {
    LuaValue::String(s) => Ok(s.to_str()?.to_string()),
    LuaValue::Integer(i) => Ok(i.to_string()),
    LuaValue::Number(n) => Ok(n.to_string()),
    LuaValue::Boolean(b) => Ok(b.to_string()),
    other => Err(LuaError::external(format!(
      "{}: expected a string, got {}",
      field,
      other.type_name()
    ))),
  }
}

/// A list of strings. `nil` is an empty list; a single string is a one-element list.
pub fn string_list(field: &str, value: LuaValue) -> LuaResult<Vec<String>> {
  match value {
    LuaValue::Nil => Ok(Vec::new()),
    LuaValue::String(s) => Ok(vec![s.to_str()?.to_string()]),
    LuaValue::Table(t) => {
      let mut items = Vec::with_capacity(t.raw_len());
      for item in t.sequence_values::<LuaValue>() {
        items.push(scalar_to_string(field, item?)?);
      }
      Ok(items)
    }
    other => Err(LuaError::external(format!(
      "{}: expected a list of strings, got {}",
      field,
      other.type_name()
    ))),
  }
}

pub fn string_set(field: &str, value: LuaValue) -> LuaResult<BTreeSet<String>> {
  Ok(string_list(field, value)?.into_iter().collect())
}

/// Input names are path segments (`overlay/pkgs`), so they cannot contain `/`.
pub fn input_name(field: &str, name: &str) -> LuaResult<()> {
  if name.is_empty() || name.contains('/') {
    return Err(LuaError::external(format!(
      "{}: '{}' is not a valid input name (names cannot be empty or contain '/')",
      field, name
    )));
  }
  Ok(())
}

/// A `{ name = value }` table of scalars, ordered by name.
pub fn string_map(field: &str, value: LuaValue) -> LuaResult<BTreeMap<String, String>> {
  match value {
    LuaValue::Nil => Ok(BTreeMap::new()),
    LuaValue::Table(t) => {
      let mut map = BTreeMap::new();
      for pair in t.pairs::<String, LuaValue>() {
        let (key, value) = pair?;
        let value = scalar_to_string(&format!("{}.{}", field, key), value)?;
        map.insert(key, value);
      }
      Ok(map)
    }
    other => Err(LuaError::external(format!(
      "{}: expected a table, got {}",
      field,
      other.type_name()
    ))),
  }
}

/// Parse a `when` value.
///
/// Accepts a condition string (`"darwin"`, `"aarch64"`, `"x86_64-linux"`), a
/// list of conditions (any of them), or a table with exactly one of `any`,
/// `all` or `not`.
pub fn parse_condition(field: &str, value: LuaValue) -> LuaResult<Condition> {
  match value {
    LuaValue::Nil => Ok(Condition::Always),
    LuaValue::String(s) => s
      .to_str()?
      .parse::<Condition>()
      .map_err(|e| LuaError::external(format!("{}: {}", field, e))),
    LuaValue::Table(t) if is_sequence(&t) => Ok(Condition::Any(condition_list(field, &t)?)),
    LuaValue::Table(t) => {
      let any: LuaValue = t.get("any")?;
      let all: LuaValue = t.get("all")?;
      let not: LuaValue = t.get("not")?;
      match (any, all, not) {
        (LuaValue::Table(list), LuaValue::Nil, LuaValue::Nil) => Ok(Condition::Any(condition_list(field, &list)?)),
        (LuaValue::Nil, LuaValue::Table(list), LuaValue::Nil) => Ok(Condition::All(condition_list(field, &list)?)),
        (LuaValue::Nil, LuaValue::Nil, inner) if !inner.is_nil() => {
          Ok(Condition::Not(Box::new(parse_condition(field, inner)?)))
        }
        _ => Err(LuaError::external(format!(
          "{}: condition table must have exactly one of 'any', 'all' or 'not'",
          field
        ))),
      }
    }
    other => Err(LuaError::external(format!(
      "{}: expected a condition string or table, got {}",
      field,
      other.type_name()
    ))),
  }
}

fn condition_list(field: &str, table: &LuaTable) -> LuaResult<Vec<Condition>> {
  let mut conditions = Vec::with_capacity(table.raw_len());
  for item in table.sequence_values::<LuaValue>() {
    conditions.push(parse_condition(field, item?)?);
  }
  Ok(conditions)
}

/// Parse a dependency entry.
///
/// Either a bare name, or a table `{ "name", from = "input", when = ... }`
/// (the name may also be given as `name = "..."`).
pub fn parse_dependency(field: &str, value: LuaValue) -> LuaResult<Dependency> {
  match value {
    LuaValue::String(s) => Ok(Dependency::new(s.to_str()?.to_string())),
    LuaValue::Table(t) => {
      let positional: Option<String> = t.get(1)?;
      let named: Option<String> = t.get("name")?;
      let name = named
        .or(positional)
        .ok_or_else(|| LuaError::external(format!("{}: dependency table needs a name", field)))?;

      let field = format!("{}.{}", field, name);
      let from: Option<String> = t.get("from")?;
      let condition = parse_condition(&format!("{}.when", field), t.get("when")?)?;

      Ok(Dependency {
        name,
        from,
        condition,
      })
    }
    other => Err(LuaError::external(format!(
      "{}: expected a package name or table, got {}",
      field,
      other.type_name()
    ))),
  }
}

pub fn dependency_list(field: &str, value: LuaValue) -> LuaResult<Vec<Dependency>> {
  match value {
    LuaValue::Nil => Ok(Vec::new()),
    LuaValue::Table(t) => {
      let mut deps = Vec::with_capacity(t.raw_len());
      for (i, item) in t.sequence_values::<LuaValue>().enumerate() {
        deps.push(parse_dependency(&format!("{}[{}]", field, i + 1), item?)?);
      }
      Ok(deps)
    }
    other => Err(LuaError::external(format!(
      "{}: expected a list, got {}",
      field,
      other.type_name()
    ))),
  }
}
