//! Management rules, groups, and deepest-match resolution.

use std::cell::OnceCell;

use tracing::debug;

use crate::asset_paths::{IgnoreClassifier, normalize_asset_path, scope_matches};
use crate::error::RuleError;
use crate::models::{AssetPath, Group, IgnoreType, ManageRule, NamingStrategy};

/// Rule governing a path together with the group it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRule<'a> {
  /// Deepest matching rule.
  pub rule: &'a ManageRule,
  /// Name of the rule's group; empty for ungrouped rules.
  pub group: &'a str,
}

#[derive(Debug, Clone)]
struct CachedRule {
  target: AssetPath,
  rule: usize,
  group: Option<usize>,
}

/// Ordered collection of management rules and their groups.
///
/// Resolution walks a lazily built list of rule targets sorted deepest first. Every mutating
/// method drops that list before returning, so the next [`ManageRuleIndex::resolve`] always
/// sees the current rules.
#[derive(Debug, Default)]
pub struct ManageRuleIndex {
  classifier: IgnoreClassifier,
  rules: Vec<ManageRule>,
  groups: Vec<Group>,
  cache: OnceCell<Vec<CachedRule>>,
}

impl ManageRuleIndex {
  /// Empty index classifying paths with `classifier`.
  pub fn new(classifier: IgnoreClassifier) -> Self {
    Self {
      classifier,
      ..Self::default()
    }
  }

  /// Classifier used for ignore precedence.
  pub fn classifier(&self) -> &IgnoreClassifier {
    &self.classifier
  }

  /// Classify `path` with the index's classifier.
  pub fn classify(&self, path: &str) -> Option<IgnoreType> {
    self.classifier.classify(path)
  }

  /// All registered rules in registration order.
  pub fn rules(&self) -> &[ManageRule] {
    &self.rules
  }

  /// All groups in creation order.
  pub fn groups(&self) -> &[Group] {
    &self.groups
  }

  /// Rule targeting exactly `target`.
  pub fn find_rule(&self, target: &str) -> Option<&ManageRule> {
    let target = normalize_asset_path(target);
    self.rules.iter().find(|rule| rule.target_asset == target)
  }

  /// Name of the group owning the rule for `target`; empty when ungrouped.
  pub fn group_of(&self, target: &str) -> &str {
    let target = normalize_asset_path(target);
    self
      .group_index_of(&target)
      .map_or("", |index| self.groups[index].name.as_str())
  }

  /// Register `rule` in `group_name`, creating the group when needed.
  ///
  /// Re-adding a target inside the same group fails with [`RuleError::DuplicateRule`]. Adding a
  /// target owned by another group moves the rule into `group_name`.
  pub fn add_rule(&mut self, group_name: &str, mut rule: ManageRule) -> Result<(), RuleError> {
    validate_rule(&mut rule)?;
    let group_name = group_name.trim();
    let target = rule.target_asset.clone();

    if let Some(existing) = self.rule_position(&target) {
      if self.group_of(&target) == group_name {
        return Err(RuleError::DuplicateRule {
          group: group_name.to_string(),
          target,
        });
      }
      self.detach_from_groups(&target);
      self.rules[existing] = rule;
    } else {
      self.rules.push(rule);
    }

    if !group_name.is_empty() {
      let index = match self.groups.iter().position(|group| group.name == group_name) {
        Some(index) => index,
        None => {
          self.groups.push(Group::new(group_name));
          self.groups.len() - 1
        }
      };
      self.groups[index].member_rules.insert(target);
    }

    self.invalidate();
    Ok(())
  }

  /// Replace the rule with the same target, keeping its group membership.
  pub fn update_rule(&mut self, mut rule: ManageRule) -> Result<(), RuleError> {
    validate_rule(&mut rule)?;
    let position = self
      .rule_position(&rule.target_asset)
      .ok_or_else(|| RuleError::RuleNotFound {
        target: rule.target_asset.clone(),
      })?;
    self.rules[position] = rule;
    self.invalidate();
    Ok(())
  }

  /// Remove the rule for `target`.
  ///
  /// When `group_name` is not empty the rule must belong to that group.
  pub fn remove_rule(&mut self, group_name: &str, target: &str) -> Result<ManageRule, RuleError> {
    let target = normalize_asset_path(target);
    let group_name = group_name.trim();
    let not_found = || RuleError::RuleNotFound {
      target: target.clone(),
    };

    let position = self.rule_position(&target).ok_or_else(not_found)?;
    if !group_name.is_empty() && self.group_of(&target) != group_name {
      return Err(not_found());
    }

    self.detach_from_groups(&target);
    let removed = self.rules.remove(position);
    self.invalidate();
    Ok(removed)
  }

  /// Create an empty group.
  pub fn add_group(&mut self, name: &str) -> Result<(), RuleError> {
    let name = name.trim();
    if name.is_empty() {
      return Err(RuleError::InvalidGroupName(name.to_string()));
    }
    if self.groups.iter().any(|group| group.name == name) {
      return Err(RuleError::DuplicateGroup(name.to_string()));
    }
    self.groups.push(Group::new(name));
    self.invalidate();
    Ok(())
  }

  /// Rename a group. Bundle names of its members change on the next collection pass.
  pub fn rename_group(&mut self, from: &str, to: &str) -> Result<(), RuleError> {
    let (from, to) = (from.trim(), to.trim());
    if to.is_empty() {
      return Err(RuleError::InvalidGroupName(to.to_string()));
    }
    if self.groups.iter().any(|group| group.name == to) {
      return Err(RuleError::DuplicateGroup(to.to_string()));
    }
    let group = self
      .groups
      .iter_mut()
      .find(|group| group.name == from)
      .ok_or_else(|| RuleError::GroupNotFound(from.to_string()))?;
    group.name = to.to_string();
    self.invalidate();
    Ok(())
  }

  /// Remove a group together with its member rules, returning the removed rules.
  pub fn remove_group(&mut self, name: &str) -> Result<Vec<ManageRule>, RuleError> {
    let name = name.trim();
    let position = self
      .groups
      .iter()
      .position(|group| group.name == name)
      .ok_or_else(|| RuleError::GroupNotFound(name.to_string()))?;
    let group = self.groups.remove(position);

    let (removed, kept): (Vec<ManageRule>, Vec<ManageRule>) = std::mem::take(&mut self.rules)
      .into_iter()
      .partition(|rule| group.member_rules.contains(&rule.target_asset));
    self.rules = kept;
    self.invalidate();
    Ok(removed)
  }

  /// Resolve the deepest rule governing `path`.
  ///
  /// Paths classified as [`IgnoreType::IgnoreManage`] or [`IgnoreType::IgnoreFolder`] never
  /// resolve. Rules whose own target is ignored that way never match anything.
  pub fn resolve(&self, path: &str) -> Option<ResolvedRule<'_>> {
    if self
      .classifier
      .classify(path)
      .is_some_and(IgnoreType::suppresses_rules)
    {
      return None;
    }

    self
      .cache
      .get_or_init(|| self.build_cache())
      .iter()
      .find(|entry| scope_matches(&entry.target, path))
      .map(|entry| ResolvedRule {
        rule: &self.rules[entry.rule],
        group: entry
          .group
          .map_or("", |index| self.groups[index].name.as_str()),
      })
  }

  fn build_cache(&self) -> Vec<CachedRule> {
    let mut entries: Vec<CachedRule> = self
      .rules
      .iter()
      .enumerate()
      .filter(|(_, rule)| {
        let ignored = self
          .classifier
          .classify(&rule.target_asset)
          .is_some_and(IgnoreType::suppresses_rules);
        if ignored {
          debug!(target_asset = %rule.target_asset, "skipping rule with ignored target");
        }
        !ignored
      })
      .map(|(index, rule)| CachedRule {
        target: rule.target_asset.clone(),
        rule: index,
        group: self.group_index_of(&rule.target_asset),
      })
      .collect();

    entries.sort_by(|a, b| {
      b.target
        .len()
        .cmp(&a.target.len())
        .then_with(|| a.target.cmp(&b.target))
    });
    debug!(rules = entries.len(), "rebuilt rule resolution cache");
    entries
  }

  fn invalidate(&mut self) {
    self.cache.take();
  }

  fn rule_position(&self, target: &str) -> Option<usize> {
    self.rules.iter().position(|rule| rule.target_asset == target)
  }

  fn group_index_of(&self, target: &str) -> Option<usize> {
    self
      .groups
      .iter()
      .position(|group| group.member_rules.contains(target))
  }

  fn detach_from_groups(&mut self, target: &str) {
    for group in &mut self.groups {
      group.member_rules.remove(target);
    }
  }

  #[cfg(test)]
  fn cache_is_warm(&self) -> bool {
    self.cache.get().is_some()
  }
}

/// Normalise the rule target and reject rules that cannot compose a distinct bundle name.
fn validate_rule(rule: &mut ManageRule) -> Result<(), RuleError> {
  let target = normalize_asset_path(&rule.target_asset);
  if target.is_empty() {
    return Err(RuleError::EmptyTarget {
      target: std::mem::take(&mut rule.target_asset),
    });
  }
  rule.target_asset = target;

  let needs_naming_string = matches!(
    rule.naming_strategy,
    NamingStrategy::PrefixAndChildAssetName | NamingStrategy::Specified
  );
  if needs_naming_string && rule.naming_string.trim().is_empty() {
    return Err(RuleError::MissingNamingString {
      target: rule.target_asset.clone(),
      strategy: rule.naming_strategy,
    });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::asset_paths::IgnoreConfig;

  fn index_with(rules: &[(&str, &str)]) -> ManageRuleIndex {
    let mut index = ManageRuleIndex::new(IgnoreClassifier::new(&IgnoreConfig {
      folders: vec!["A/Wip".into()],
      manage: vec!["Editor".into()],
      ..IgnoreConfig::default()
    }));
    for (group, target) in rules {
      index
        .add_rule(group, ManageRule::new(*target))
        .expect("rule should register");
    }
    index
  }

  fn resolved_target<'a>(index: &'a ManageRuleIndex, path: &str) -> Option<&'a str> {
    index
      .resolve(path)
      .map(|resolved| resolved.rule.target_asset.as_str())
  }

  #[test]
  fn resolves_deepest_rule_first() {
    let index = index_with(&[("", "A"), ("", "A/B")]);
    assert_eq!(resolved_target(&index, "A/B/c.png"), Some("A/B"));
    assert_eq!(resolved_target(&index, "A/x.png"), Some("A"));
    assert_eq!(resolved_target(&index, "Z/x.png"), None);
  }

  #[test]
  fn folder_rules_do_not_match_partial_segments() {
    let index = index_with(&[("", "Foo")]);
    assert_eq!(resolved_target(&index, "FooBar/x.png"), None);
    assert_eq!(resolved_target(&index, "Foo/x.png"), Some("Foo"));
  }

  #[test]
  fn file_rules_match_only_themselves() {
    let index = index_with(&[("", "A"), ("", "A/hero.png")]);
    assert_eq!(resolved_target(&index, "A/hero.png"), Some("A/hero.png"));
    assert_eq!(resolved_target(&index, "A/hero.png.bak"), Some("A"));
  }

  #[test]
  fn ignored_folders_never_resolve() {
    let index = index_with(&[("", "A"), ("", "A/Wip"), ("", "Editor")]);
    assert_eq!(resolved_target(&index, "A/Wip/draft.png"), None);
    assert_eq!(resolved_target(&index, "Editor/tool.png"), None);
    assert_eq!(resolved_target(&index, "A/final.png"), Some("A"));
  }

  #[test]
  fn resolution_reports_the_owning_group() {
    let index = index_with(&[("ui", "Chars"), ("", "Props")]);
    assert_eq!(index.resolve("Chars/hero.png").map(|r| r.group), Some("ui"));
    assert_eq!(index.resolve("Props/box.png").map(|r| r.group), Some(""));
  }

  #[test]
  fn duplicate_targets_in_the_same_group_are_rejected() {
    let mut index = index_with(&[("ui", "Chars")]);
    let err = index
      .add_rule("ui", ManageRule::new("Chars/"))
      .expect_err("duplicate should fail");
    assert_eq!(err, RuleError::DuplicateRule {
      group: "ui".into(),
      target: "Chars".into(),
    });
    assert_eq!(index.rules().len(), 1);
  }

  #[test]
  fn adding_to_another_group_moves_the_rule() {
    let mut index = index_with(&[("ui", "Chars")]);
    index
      .add_rule("hud", ManageRule::new("Chars").with_tag("moved"))
      .expect("move should succeed");

    assert_eq!(index.rules().len(), 1);
    assert_eq!(index.group_of("Chars"), "hud");
    assert!(index.groups()[0].member_rules.is_empty());
    assert_eq!(index.find_rule("Chars").map(|r| r.tag.as_str()), Some("moved"));
  }

  #[test]
  fn every_mutation_invalidates_the_cache() {
    let mut index = index_with(&[("g", "A")]);
    assert_eq!(resolved_target(&index, "A/B/c.png"), Some("A"));
    assert!(index.cache_is_warm());

    index
      .add_rule("g", ManageRule::new("A/B"))
      .expect("add should succeed");
    assert!(!index.cache_is_warm());
    assert_eq!(resolved_target(&index, "A/B/c.png"), Some("A/B"));

    index
      .update_rule(ManageRule::new("A/B").with_bundled(false))
      .expect("update should succeed");
    assert!(!index.cache_is_warm());
    assert_eq!(index.resolve("A/B/c.png").map(|r| r.rule.is_bundled), Some(false));

    index.rename_group("g", "h").expect("rename should succeed");
    assert!(!index.cache_is_warm());
    assert_eq!(index.resolve("A/B/c.png").map(|r| r.group), Some("h"));

    index.remove_rule("h", "A/B").expect("remove should succeed");
    assert!(!index.cache_is_warm());
    assert_eq!(resolved_target(&index, "A/B/c.png"), Some("A"));

    index.remove_group("h").expect("group removal should succeed");
    assert!(!index.cache_is_warm());
    assert_eq!(resolved_target(&index, "A/B/c.png"), None);
  }

  #[test]
  fn update_requires_an_existing_rule() {
    let mut index = index_with(&[]);
    let err = index
      .update_rule(
        ManageRule::new("Missing")
          .with_strategy(NamingStrategy::Specified)
          .with_naming_string("v2"),
      )
      .expect_err("update should fail");
    assert_eq!(err, RuleError::RuleNotFound {
      target: "Missing".into()
    });
  }

  #[test]
  fn removal_checks_group_membership() {
    let mut index = index_with(&[("ui", "Chars")]);
    assert!(index.remove_rule("hud", "Chars").is_err());
    assert!(index.remove_rule("ui", "Chars").is_ok());
    assert!(index.rules().is_empty());
    assert!(index.groups()[0].member_rules.is_empty());
  }

  #[test]
  fn group_names_must_be_unique() {
    let mut index = index_with(&[("ui", "Chars")]);
    assert_eq!(index.add_group("ui"), Err(RuleError::DuplicateGroup("ui".into())));
    assert_eq!(index.add_group("  "), Err(RuleError::InvalidGroupName(String::new())));
    index.add_group("hud").expect("new group should be created");
    assert_eq!(
      index.rename_group("hud", "ui"),
      Err(RuleError::DuplicateGroup("ui".into()))
    );
    assert_eq!(
      index.rename_group("hud", ""),
      Err(RuleError::InvalidGroupName(String::new()))
    );
    assert_eq!(
      index.rename_group("missing", "other"),
      Err(RuleError::GroupNotFound("missing".into()))
    );
  }

  #[test]
  fn removing_a_group_removes_its_rules() {
    let mut index = index_with(&[("ui", "Chars"), ("ui", "Icons"), ("", "Props")]);
    let removed = index.remove_group("ui").expect("group should exist");
    assert_eq!(removed.len(), 2);
    assert_eq!(index.rules().len(), 1);
    assert_eq!(resolved_target(&index, "Chars/hero.png"), None);
  }

  #[test]
  fn root_targets_are_rejected() {
    let mut index = index_with(&[("", "Chars")]);
    for target in ["", "/", ".", "./"] {
      let err = index
        .add_rule("", ManageRule::new(target))
        .expect_err("root target should fail");
      assert_eq!(err, RuleError::EmptyTarget {
        target: target.into()
      });
    }
    assert_eq!(
      index.update_rule(ManageRule::new("/")),
      Err(RuleError::EmptyTarget { target: "/".into() })
    );
    assert_eq!(index.rules().len(), 1);
    assert_eq!(resolved_target(&index, "Props/box.png"), None);
  }

  #[test]
  fn naming_string_is_required_where_it_is_appended() {
    let mut index = index_with(&[]);
    for strategy in [NamingStrategy::Specified, NamingStrategy::PrefixAndChildAssetName] {
      let err = index
        .add_rule("", ManageRule::new("Chars").with_strategy(strategy))
        .expect_err("blank naming string should fail");
      assert_eq!(err, RuleError::MissingNamingString {
        target: "Chars".into(),
        strategy,
      });
    }
    assert!(index.rules().is_empty());

    index
      .add_rule("", ManageRule::new("Chars").with_strategy(NamingStrategy::ByChildAssetName))
      .expect("child strategy needs no naming string");
    assert!(matches!(
      index.update_rule(
        ManageRule::new("Chars")
          .with_strategy(NamingStrategy::Specified)
          .with_naming_string(" ")
      ),
      Err(RuleError::MissingNamingString { .. })
    ));
  }
}
