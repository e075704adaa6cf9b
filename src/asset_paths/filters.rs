use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::normalize::{extension, normalize_asset_path, scope_matches};
use crate::models::IgnoreType;

/// Pattern lists describing which paths are exempt from management or bundling.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IgnoreConfig {
  /// Paths (files or folder prefixes) that are not managed at all.
  pub manage: Vec<String>,
  /// Folder prefixes whose contents never match a rule.
  pub folders: Vec<String>,
  /// Folder names that are ignored at any depth.
  pub folder_names: Vec<String>,
  /// Literal file paths that are not managed.
  pub files: Vec<String>,
  /// Extensions (with or without the leading dot) that are never bundled.
  pub extensions: Vec<String>,
  /// Paths (files or folder prefixes) that are managed but not bundled.
  pub bundling: Vec<String>,
}

/// Classifies paths into an [`IgnoreType`] from static pattern lists.
#[derive(Debug, Clone, Default)]
pub struct IgnoreClassifier {
  manage: BTreeSet<String>,
  folders: BTreeSet<String>,
  folder_names: BTreeSet<String>,
  files: BTreeSet<String>,
  extensions: BTreeSet<String>,
  bundling: BTreeSet<String>,
}

impl IgnoreClassifier {
  /// Build a classifier, normalising every configured pattern.
  pub fn new(config: &IgnoreConfig) -> Self {
    Self {
      manage: normalise_paths(&config.manage),
      folders: normalise_paths(&config.folders),
      folder_names: normalise_paths(&config.folder_names),
      files: normalise_paths(&config.files),
      extensions: config
        .extensions
        .iter()
        .map(|value| value.trim().trim_start_matches('.').to_lowercase())
        .filter(|value| !value.is_empty())
        .collect(),
      bundling: normalise_paths(&config.bundling),
    }
  }

  /// Classify a normalised asset path.
  ///
  /// Management exemptions win over folder exemptions, which win over extension and bundling
  /// exemptions. Never fails: unknown paths are simply not ignored.
  pub fn classify(&self, path: &str) -> Option<IgnoreType> {
    if self.files.contains(path) || any_scope_matches(&self.manage, path) {
      return Some(IgnoreType::IgnoreManage);
    }

    if any_scope_matches(&self.folders, path) || self.has_ignored_folder_name(path) {
      return Some(IgnoreType::IgnoreFolder);
    }

    if extension(path).is_some_and(|ext| self.extensions.contains(&ext)) {
      return Some(IgnoreType::IgnoreExtension);
    }

    if any_scope_matches(&self.bundling, path) {
      return Some(IgnoreType::IgnoreAssetBundle);
    }

    None
  }

  fn has_ignored_folder_name(&self, path: &str) -> bool {
    if self.folder_names.is_empty() {
      return false;
    }
    let mut segments: Vec<&str> = path.split('/').collect();
    segments.pop();
    segments
      .iter()
      .any(|segment| self.folder_names.contains(*segment))
  }
}

fn any_scope_matches(scopes: &BTreeSet<String>, path: &str) -> bool {
  scopes.iter().any(|scope| scope_matches(scope, path))
}

fn normalise_paths(values: &[String]) -> BTreeSet<String> {
  values
    .iter()
    .map(|value| normalize_asset_path(value.trim()))
    .filter(|value| !value.is_empty())
    .collect()
}
