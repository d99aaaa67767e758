//! Lua evaluation of configuration files and input catalogs.
//!
//! - [`runtime`] - VM setup and file evaluation
//! - [`loaders`] - `dofile`/`require` with per-file `__dir`
//! - [`values`] - conversions from Lua values into envsys types
//! - [`config`] - `envsys.lua` parsing
//! - [`catalog`] - `catalog.lua` parsing

pub mod catalog;
pub mod config;
pub mod loaders;
pub mod runtime;
pub mod values;
