//! Source registry: external inputs and their resolution.
//!
//! Inputs are declared in the config's `inputs` table, pinned to a revision and
//! optionally rebased onto another input through `follows`.
//!
//! # Modules
//!
//! - [`source`] - Locator parsing (`git:<url>#<rev>`, `path:<dir>`)
//! - [`graph`] - Declaration graph, follows chains and cycle detection
//! - [`catalog`] - What a fetched input offers (packages, toolchains, sub-inputs)
//! - [`fetch`] - The fetch collaborator seam and its git/path implementation
//! - [`resolve`] - Two-pass resolution into shared instances
//! - [`namespace`] - Explicit package lookup over resolved inputs

pub mod catalog;
pub mod fetch;
pub mod graph;
pub mod namespace;
pub mod resolve;
pub mod source;
mod types;

pub use types::*;
