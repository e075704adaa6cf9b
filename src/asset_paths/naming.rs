use std::sync::OnceLock;

use regex::Regex;

use super::normalize::{file_name, file_stem, parent_folder, relative_to, strip_extension};
use crate::models::{ManageRule, NamingStrategy};

fn canonical_bundle_name() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_./-]*$").expect("invalid bundle name regex"))
}

/// Compose the canonical lower-case bundle name for an asset governed by `rule`.
///
/// Returns an empty string when there is no rule or the rule does not bundle. The result only
/// depends on the arguments, so repeated calls always agree.
///
/// The rule target contributes its parent folders joined with `_` followed by its own name. A
/// folder target keeps its full name while a file target drops its extension. Child strategies
/// append the asset's path below the target, extension stripped and separators replaced by `_`.
/// Distinct assets can still fold onto one name (`hero.png` and `hero.psd`, `a_b.png` and
/// `a/b.png`); [`crate::BundlePlanner::name_collisions`] reports those.
pub fn compose_bundle_name(
  rule: Option<&ManageRule>,
  asset_path: &str,
  group_name: &str,
) -> String {
  let Some(rule) = rule.filter(|rule| rule.is_bundled) else {
    return String::new();
  };

  let target = rule.target_asset.as_str();
  let child = relative_to(asset_path, target).unwrap_or_default();
  let target_is_folder = !child.is_empty();

  let mut name = String::new();
  if !group_name.is_empty() {
    name.push_str(group_name);
    name.push('/');
  }

  let parent = parent_folder(target);
  if !parent.is_empty() {
    name.push_str(&parent.replace('/', "_"));
    name.push('_');
  }
  name.push_str(if target_is_folder {
    file_name(target)
  } else {
    file_stem(target)
  });

  let child_segment = strip_extension(child).replace('/', "_");
  match rule.naming_strategy {
    NamingStrategy::ByManageAssetName => {}
    NamingStrategy::ByChildAssetName => push_segment(&mut name, &child_segment),
    NamingStrategy::PrefixAndChildAssetName => {
      push_segment(&mut name, &rule.naming_string);
      push_segment(&mut name, &child_segment);
    }
    NamingStrategy::Specified => push_segment(&mut name, &rule.naming_string),
  }

  name.to_lowercase()
}

fn push_segment(name: &mut String, segment: &str) {
  if !segment.is_empty() {
    name.push('_');
    name.push_str(segment);
  }
}

/// Returns `true` when a composed name only uses ASCII lower-case letters, digits, `_`, `.`,
/// `-` and `/`.
///
/// Names outside that set are still valid; callers surface them as warnings because packaging
/// layers disagree on how they are folded.
pub fn is_canonical_bundle_name(name: &str) -> bool {
  canonical_bundle_name().is_match(name)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn chars_rule(strategy: NamingStrategy) -> ManageRule {
    ManageRule::new("Chars")
      .with_strategy(strategy)
      .with_naming_string("v2")
  }

  #[test]
  fn composes_child_names_under_group_prefix() {
    let rule = chars_rule(NamingStrategy::ByChildAssetName);
    assert_eq!(compose_bundle_name(Some(&rule), "Chars/hero.png", "ui"), "ui/chars_hero");
  }

  #[test]
  fn composes_specified_names() {
    let rule = chars_rule(NamingStrategy::Specified);
    assert_eq!(compose_bundle_name(Some(&rule), "Chars/hero.png", "ui"), "ui/chars_v2");
  }

  #[test]
  fn strategies_produce_distinct_names() {
    let names: Vec<String> = [
      NamingStrategy::ByManageAssetName,
      NamingStrategy::ByChildAssetName,
      NamingStrategy::PrefixAndChildAssetName,
      NamingStrategy::Specified,
    ]
    .into_iter()
    .map(|strategy| compose_bundle_name(Some(&chars_rule(strategy)), "Chars/hero.png", ""))
    .collect();

    assert_eq!(names, vec!["chars", "chars_hero", "chars_v2_hero", "chars_v2"]);
  }

  #[test]
  fn composition_is_deterministic() {
    let rule = chars_rule(NamingStrategy::PrefixAndChildAssetName);
    let first = compose_bundle_name(Some(&rule), "Chars/Sub/Hero.PNG", "UI");
    let second = compose_bundle_name(Some(&rule), "Chars/Sub/Hero.PNG", "UI");
    assert_eq!(first, second);
    assert_eq!(first, "ui/chars_v2_sub_hero");
  }

  #[test]
  fn nested_targets_fold_parent_folders_into_the_name() {
    let rule = ManageRule::new("Art/Chars").with_strategy(NamingStrategy::ByChildAssetName);
    assert_eq!(compose_bundle_name(Some(&rule), "Art/Chars/hero.png", ""), "art_chars_hero");

    let rule = ManageRule::new("Art/Chars/hero.png");
    assert_eq!(compose_bundle_name(Some(&rule), "Art/Chars/hero.png", ""), "art_chars_hero");
  }

  #[test]
  fn file_targets_skip_the_empty_child_segment() {
    let rule = ManageRule::new("Art/hero.png").with_strategy(NamingStrategy::ByChildAssetName);
    assert_eq!(compose_bundle_name(Some(&rule), "Art/hero.png", ""), "art_hero");
  }

  #[test]
  fn missing_or_unbundled_rules_yield_empty_names() {
    assert_eq!(compose_bundle_name(None, "Chars/hero.png", "ui"), "");
    let rule = chars_rule(NamingStrategy::ByChildAssetName).with_bundled(false);
    assert_eq!(compose_bundle_name(Some(&rule), "Chars/hero.png", "ui"), "");
  }

  #[test]
  fn flags_non_canonical_characters() {
    assert!(is_canonical_bundle_name("ui/chars_hero"));
    assert!(is_canonical_bundle_name(""));
    assert!(!is_canonical_bundle_name("ui/chars hero"));
    assert!(!is_canonical_bundle_name("ui/キャラ"));
  }
}
