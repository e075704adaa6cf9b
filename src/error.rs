//! Error types surfaced by the rule index, the content repository and batch assignment.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::{AssetPath, NamingStrategy};

/// Errors raised while mutating rules and groups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
  /// A rule already targets the same path within the same group.
  #[error("a rule for `{target}` already exists in group `{group}`; update it instead")]
  DuplicateRule {
    /// Group the rule was added to.
    group: String,
    /// Target shared by both rules.
    target: AssetPath,
  },
  /// No rule targets the path.
  #[error("no rule targets `{target}`")]
  RuleNotFound {
    /// Target that was looked up.
    target: AssetPath,
  },
  /// The rule target normalises to the repository root.
  #[error("rule target `{target}` does not name an asset or folder")]
  EmptyTarget {
    /// Target as supplied by the caller.
    target: String,
  },
  /// The naming strategy appends a naming string but none was given.
  #[error("rule for `{target}` uses {strategy:?} but has no naming string")]
  MissingNamingString {
    /// Target of the rejected rule.
    target: AssetPath,
    /// Strategy that needs the naming string.
    strategy: NamingStrategy,
  },
  /// A group with the same name already exists.
  #[error("group `{0}` already exists")]
  DuplicateGroup(String),
  /// Group names must not be blank.
  #[error("group name `{0}` is blank")]
  InvalidGroupName(String),
  /// No group carries the name.
  #[error("group `{0}` does not exist")]
  GroupNotFound(String),
}

/// Errors raised by a content repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
  /// Failed to read or write repository state.
  #[error("failed to access {}: {source}", path.display())]
  Io {
    /// Path that caused the error.
    path: PathBuf,
    /// Source I/O error.
    source: std::io::Error,
  },
  /// Failed to parse repository metadata.
  #[error("failed to parse {}: {source}", path.display())]
  Parse {
    /// Path that caused the error.
    path: PathBuf,
    /// Source parse error.
    source: serde_json::Error,
  },
  /// The asset is locked and cannot be modified.
  #[error("asset `{path}` is locked")]
  Locked {
    /// Locked asset.
    path: AssetPath,
  },
  /// The asset does not exist in the repository.
  #[error("asset `{path}` does not exist")]
  NotFound {
    /// Missing asset.
    path: AssetPath,
  },
}

/// Failure of one item inside a batch operation. The rest of the batch keeps going.
#[derive(Debug, Error)]
pub enum BatchError {
  /// Writing the bundle name of one asset failed.
  #[error("failed to assign bundle `{bundle_name}` to `{path}`")]
  Assignment {
    /// Asset whose assignment failed.
    path: AssetPath,
    /// Bundle name that could not be written.
    bundle_name: String,
    /// Underlying repository error.
    #[source]
    source: RepositoryError,
  },
  /// The pass was cancelled before every item was processed.
  #[error("cancelled after {processed} of {total} items")]
  Cancelled {
    /// Items processed before cancellation.
    processed: usize,
    /// Items the pass would have processed.
    total: usize,
  },
}
