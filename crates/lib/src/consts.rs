/// Application name, used for cache and config directories.
pub const APP_NAME: &str = "envsys";

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "envsys.lua";

/// File every input root must contain to describe what it offers.
pub const CATALOG_FILENAME: &str = "catalog.lua";

/// Revision reported for `path:` inputs, which are not versioned.
pub const LOCAL_REV: &str = "local";

/// Source identity of packages synthesized inline (generated scripts).
pub const INLINE_SOURCE: &str = "inline";

/// Length of truncated hashes used in cache directory names and script identities.
pub const HASH_PREFIX_LEN: usize = 12;

/// Systems evaluated when neither the config nor the caller names any.
pub const DEFAULT_SYSTEMS: &[&str] = &["x86_64-linux", "aarch64-linux", "x86_64-darwin", "aarch64-darwin"];
