//! Planner configuration: ignore patterns, groups and their rules.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::asset_paths::{IgnoreClassifier, IgnoreConfig};
use crate::models::ManageRule;
use crate::rules::ManageRuleIndex;

const CONFIG_CANDIDATES: &[&str] = &[
  "bundle-planner.json",
  "bundle-planner.yaml",
  "bundle-planner.yml",
];

/// Group of rules as written in the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
  /// Group name; empty for ungrouped rules.
  pub name: String,
  /// Rules belonging to the group.
  pub rules: Vec<ManageRule>,
}

/// Discoverable planner configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlannerConfig {
  /// Ignore pattern lists.
  pub ignore: IgnoreConfig,
  /// Groups and their rules, in registration order.
  pub groups: Vec<GroupConfig>,
  /// JSON map of forward dependencies, relative to the configuration directory.
  pub dependencies_file: Option<String>,
  /// JSON map where bundle assignments are persisted, relative to the configuration directory.
  pub assignments_file: Option<String>,
}

impl PlannerConfig {
  /// Look for a configuration file in `dir`.
  ///
  /// Falls back to defaults when no candidate exists; a candidate that fails to parse is an
  /// error rather than silently ignored.
  pub fn discover(dir: &Path) -> Result<Self> {
    match Self::discover_path(dir) {
      Some(path) => Self::from_path(&path),
      None => Ok(Self::default()),
    }
  }

  /// First configuration candidate present in `dir`.
  pub fn discover_path(dir: &Path) -> Option<PathBuf> {
    CONFIG_CANDIDATES
      .iter()
      .map(|candidate| dir.join(candidate))
      .find(|path| path.is_file())
  }

  /// Read configuration from a JSON or YAML file, chosen by extension.
  pub fn from_path(path: &Path) -> Result<Self> {
    let content =
      fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = path
      .extension()
      .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
      serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    } else {
      serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
  }

  /// Build the classifier described by the ignore section.
  pub fn classifier(&self) -> IgnoreClassifier {
    IgnoreClassifier::new(&self.ignore)
  }

  /// Register every configured group and rule in a fresh index.
  pub fn to_rule_index(&self) -> Result<ManageRuleIndex> {
    let mut index = ManageRuleIndex::new(self.classifier());
    for group in &self.groups {
      let name = group.name.trim();
      if !name.is_empty() && !index.groups().iter().any(|existing| existing.name == name) {
        index
          .add_group(&group.name)
          .with_context(|| format!("invalid group `{}`", group.name))?;
      }
      for rule in &group.rules {
        index
          .add_rule(&group.name, rule.clone())
          .with_context(|| format!("invalid rule in group `{}`", group.name))?;
      }
    }
    Ok(index)
  }

  /// Dependency map path resolved against `base`.
  pub fn dependencies_path(&self, base: &Path) -> Option<PathBuf> {
    self.dependencies_file.as_ref().map(|file| base.join(file))
  }

  /// Assignment map path resolved against `base`.
  pub fn assignments_path(&self, base: &Path) -> Option<PathBuf> {
    self.assignments_file.as_ref().map(|file| base.join(file))
  }
}
