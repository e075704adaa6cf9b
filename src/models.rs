//! Data structures shared by the rule index, the collector and the dependency graph.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Normalised, slash-separated path of one asset relative to the repository root.
pub type AssetPath = String;

/// Classification that exempts a path from management or bundling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IgnoreType {
  /// The path is not managed at all; its bundle assignment is left untouched.
  IgnoreManage,
  /// The path sits inside an ignored folder and never matches a rule.
  IgnoreFolder,
  /// The path carries an extension that is never bundled.
  IgnoreExtension,
  /// The path is managed but must not be bundled.
  IgnoreAssetBundle,
}

impl IgnoreType {
  /// Returns `true` when the classification suppresses rule matching entirely.
  pub fn suppresses_rules(self) -> bool {
    matches!(self, Self::IgnoreManage | Self::IgnoreFolder)
  }

  /// Returns `true` when the composed bundle name is forced to empty, clearing any stored
  /// assignment. [`IgnoreType::IgnoreManage`] assets are not bundled either, but their stored
  /// assignment is left untouched instead.
  pub fn suppresses_bundling(self) -> bool {
    !matches!(self, Self::IgnoreManage)
  }
}

/// How a rule derives bundle names for the assets it governs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NamingStrategy {
  /// Every governed asset lands in one bundle named after the rule target.
  #[default]
  ByManageAssetName,
  /// Each governed asset gets its own bundle suffixed with its relative path.
  ByChildAssetName,
  /// Like [`NamingStrategy::ByChildAssetName`] with the naming string inserted before the child.
  PrefixAndChildAssetName,
  /// One bundle named after the target plus the naming string.
  Specified,
}

impl NamingStrategy {
  /// Returns `true` when every governed asset is expected to get a bundle of its own.
  pub fn names_each_child(self) -> bool {
    matches!(self, Self::ByChildAssetName | Self::PrefixAndChildAssetName)
  }
}

/// User-authored binding from an asset or folder to a naming strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageRule {
  /// Asset or folder whose subtree the rule governs.
  pub target_asset: AssetPath,
  /// Strategy used to compose bundle names.
  #[serde(default)]
  pub naming_strategy: NamingStrategy,
  /// Free-form string used by the prefix and specified strategies.
  #[serde(default)]
  pub naming_string: String,
  /// Whether assets governed by this rule are bundled at all.
  #[serde(default = "default_bundled")]
  pub is_bundled: bool,
  /// Arbitrary label carried for tooling.
  #[serde(default)]
  pub tag: String,
}

fn default_bundled() -> bool {
  true
}

impl ManageRule {
  /// Bundled rule with the default naming strategy.
  pub fn new(target_asset: impl Into<AssetPath>) -> Self {
    Self {
      target_asset: target_asset.into(),
      naming_strategy: NamingStrategy::default(),
      naming_string: String::new(),
      is_bundled: true,
      tag: String::new(),
    }
  }

  /// Replace the naming strategy.
  pub fn with_strategy(mut self, strategy: NamingStrategy) -> Self {
    self.naming_strategy = strategy;
    self
  }

  /// Replace the naming string.
  pub fn with_naming_string(mut self, value: impl Into<String>) -> Self {
    self.naming_string = value.into();
    self
  }

  /// Toggle bundling for the governed assets.
  pub fn with_bundled(mut self, is_bundled: bool) -> Self {
    self.is_bundled = is_bundled;
    self
  }

  /// Replace the tag.
  pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
    self.tag = tag.into();
    self
  }
}

/// Named collection of rules whose name prefixes every computed bundle name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
  /// Group name, prefixed onto bundle names as `name/`.
  pub name: String,
  /// Targets of the member rules. A target identifies its rule.
  pub member_rules: BTreeSet<AssetPath>,
}

impl Group {
  /// Empty group with the provided name.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      member_rules: BTreeSet::new(),
    }
  }
}

/// Result of resolving one physical asset. Replaced wholesale on every collection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCollectInfo {
  /// Asset the information describes.
  pub path: AssetPath,
  /// Deepest rule governing the asset, if any.
  pub resolved_rule: Option<ManageRule>,
  /// Ignore classification of the asset, if any.
  pub ignore: Option<IgnoreType>,
  /// Target bundle name; empty when the asset is not bundled.
  pub bundle_name: String,
}

impl AssetCollectInfo {
  /// Returns `true` when the asset takes part in bundling.
  pub fn is_bundled(&self) -> bool {
    self.ignore.is_none() && !self.bundle_name.is_empty()
  }
}

/// Bundle name that merges assets which were meant to be bundled apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameCollision {
  /// Targets of the rules producing the name, sorted.
  pub rules: Vec<AssetPath>,
  /// Assets landing in the bundle, sorted.
  pub assets: Vec<AssetPath>,
}

/// Dependency partition of one bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDependencyInfo {
  /// Bundle the partition belongs to.
  pub bundle_name: String,
  /// Members of the bundle plus dependencies living in the same bundle.
  pub owned_asset_paths: Vec<AssetPath>,
  /// Dependencies that live in another bundle or in no bundle at all.
  pub external_asset_paths: Vec<AssetPath>,
}

/// Inverse view: which bundles pull in an asset they do not own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceInfo {
  /// Referenced asset.
  pub asset_path: AssetPath,
  /// Bundles referencing the asset externally, sorted by name.
  pub referencing_bundles: Vec<String>,
  /// Bundle the asset itself belongs to; empty when it is not bundled.
  pub owning_bundle: String,
}

impl ReferenceInfo {
  /// Number of bundles referencing the asset.
  pub fn reference_count(&self) -> usize {
    self.referencing_bundles.len()
  }

  /// An unbundled asset referenced by two or more bundles is copied into each of them.
  pub fn is_duplicated(&self) -> bool {
    self.owning_bundle.is_empty() && self.referencing_bundles.len() >= 2
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ignore_types_split_rule_and_bundle_suppression() {
    assert!(IgnoreType::IgnoreManage.suppresses_rules());
    assert!(IgnoreType::IgnoreFolder.suppresses_rules());
    assert!(!IgnoreType::IgnoreExtension.suppresses_rules());
    assert!(!IgnoreType::IgnoreAssetBundle.suppresses_rules());

    assert!(!IgnoreType::IgnoreManage.suppresses_bundling());
    assert!(IgnoreType::IgnoreFolder.suppresses_bundling());
    assert!(IgnoreType::IgnoreExtension.suppresses_bundling());
    assert!(IgnoreType::IgnoreAssetBundle.suppresses_bundling());
  }

  #[test]
  fn rule_deserialises_with_defaults() {
    let rule: ManageRule =
      serde_json::from_str(r#"{"targetAsset": "Chars", "namingStrategy": "byChildAssetName"}"#)
        .expect("rule should parse");

    assert_eq!(rule.target_asset, "Chars");
    assert_eq!(rule.naming_strategy, NamingStrategy::ByChildAssetName);
    assert!(rule.is_bundled);
    assert!(rule.naming_string.is_empty());
  }

  #[test]
  fn duplication_requires_unowned_asset_and_two_bundles() {
    let mut info = ReferenceInfo {
      asset_path: "Shared/tex.png".into(),
      referencing_bundles: vec!["a".into(), "b".into()],
      owning_bundle: String::new(),
    };
    assert!(info.is_duplicated());
    assert_eq!(info.reference_count(), 2);

    info.owning_bundle = "shared".into();
    assert!(!info.is_duplicated());
  }
}
