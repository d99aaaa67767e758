//! Locator parsing for input sources.
//!
//! Supported forms:
//! - `git:<url>#<rev>` - a git repository pinned to a commit, tag or branch
//! - `path:<dir>` - a local directory (relative to the config file, `~` expanded)

use std::path::{Path, PathBuf};

use thiserror::Error;

/// A parsed input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
  Git { url: String, rev: String },
  Path { path: PathBuf },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
  #[error("locator '{0}' has no scheme (expected 'git:' or 'path:')")]
  MissingScheme(String),

  #[error("unknown locator scheme '{0}'")]
  UnknownScheme(String),

  #[error("locator '{0}' is empty after the scheme")]
  Empty(String),

  #[error("git locator '{0}' is not pinned to a revision (append '#<rev>')")]
  Unpinned(String),
}

/// Parse a locator string.
pub fn parse(locator: &str) -> Result<InputSource, ParseError> {
  let (scheme, rest) = locator
    .split_once(':')
    .ok_or_else(|| ParseError::MissingScheme(locator.to_string()))?;

  if rest.is_empty() {
    return Err(ParseError::Empty(locator.to_string()));
  }

  match scheme {
    "git" => match rest.rsplit_once('#') {
      Some((url, rev)) if !url.is_empty() && !rev.is_empty() => Ok(InputSource::Git {
        url: url.to_string(),
        rev: rev.to_string(),
      }),
      Some((url, _)) if url.is_empty() => Err(ParseError::Empty(locator.to_string())),
      _ => Err(ParseError::Unpinned(locator.to_string())),
    },
    "path" => Ok(InputSource::Path {
      path: PathBuf::from(rest),
    }),
    other => Err(ParseError::UnknownScheme(other.to_string())),
  }
}

/// Anchor a relative `path:` locator at `base`. Other locators are returned unchanged.
pub fn rebase(locator: &str, base: &Path) -> String {
  match locator.strip_prefix("path:") {
    Some(rest) if !rest.starts_with('~') && Path::new(rest).is_relative() => {
      format!("path:{}", base.join(rest).display())
    }
    _ => locator.to_string(),
  }
}

/// Short name of the source kind, for logs.
pub fn source_type(source: &InputSource) -> &'static str {
  match source {
    InputSource::Git { .. } => "git",
    InputSource::Path { .. } => "path",
  }
}
