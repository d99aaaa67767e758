//! Library integration tests: full evaluations over on-disk path inputs.

mod common;
mod follows_tests;
mod hook_tests;
mod scenario_tests;
