//! envsys-lib: reproducible development environment resolution
//!
//! Given a Lua configuration and a target system, this crate computes the
//! environment to provision: toolchain, packages, environment variables and a
//! setup hook.
//!
//! - [`inputs`]: pinned package sources, `follows` unification and lookup
//! - [`platform`]: system identifiers and platform conditions
//! - [`toolchain`]: toolchain selection
//! - [`compose`]: per-system provisioning set and env merge
//! - [`hook`]: setup step sequencing and shell rendering
//! - [`project`]: parallel evaluation across systems
//! - [`eval`]: the end-to-end pipeline

pub mod compose;
pub mod config;
pub mod consts;
pub mod eval;
pub mod hook;
pub mod inputs;
pub mod lua;
pub mod package;
pub mod platform;
pub mod project;
pub mod toolchain;
