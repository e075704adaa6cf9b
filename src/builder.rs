//! Planner service tying rules, collection, assignment and dependency analysis together.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, instrument, warn};

use crate::collector::{AssetChanges, AssetCollector, CollectionReport};
use crate::error::{BatchError, RepositoryError, RuleError};
use crate::graph::{DependencyGraph, DependencyGraphBuilder};
use crate::models::{AssetCollectInfo, AssetPath, IgnoreType, ManageRule, NameCollision};
use crate::progress::{CancellationToken, ProgressSink};
use crate::repository::ContentRepository;
use crate::rules::ManageRuleIndex;

/// High-level entry point owning the rule index, the collected index and the repository.
///
/// Construct one per batch run. Rule edits go through the planner so they are serialised
/// against collection passes; they take effect on the next pass.
#[derive(Debug)]
pub struct BundlePlanner<R> {
  rules: ManageRuleIndex,
  collector: AssetCollector,
  repo: R,
}

impl<R: ContentRepository> BundlePlanner<R> {
  /// Create a planner over `repo` using `rules`.
  pub fn new(rules: ManageRuleIndex, repo: R) -> Self {
    Self {
      rules,
      collector: AssetCollector::new(),
      repo,
    }
  }

  /// Rule index used for resolution.
  pub fn rules(&self) -> &ManageRuleIndex {
    &self.rules
  }

  /// Collected information from previous passes.
  pub fn collector(&self) -> &AssetCollector {
    &self.collector
  }

  /// Underlying repository.
  pub fn repository(&self) -> &R {
    &self.repo
  }

  /// Mutable access to the underlying repository, e.g. to apply host file events.
  pub fn repository_mut(&mut self) -> &mut R {
    &mut self.repo
  }

  /// Consume the planner, returning the repository.
  pub fn into_repository(self) -> R {
    self.repo
  }

  /// See [`ManageRuleIndex::add_rule`].
  pub fn add_rule(&mut self, group_name: &str, rule: ManageRule) -> Result<(), RuleError> {
    self.rules.add_rule(group_name, rule)
  }

  /// See [`ManageRuleIndex::update_rule`].
  pub fn update_rule(&mut self, rule: ManageRule) -> Result<(), RuleError> {
    self.rules.update_rule(rule)
  }

  /// See [`ManageRuleIndex::remove_rule`].
  pub fn remove_rule(&mut self, group_name: &str, target: &str) -> Result<ManageRule, RuleError> {
    self.rules.remove_rule(group_name, target)
  }

  /// See [`ManageRuleIndex::add_group`].
  pub fn add_group(&mut self, name: &str) -> Result<(), RuleError> {
    self.rules.add_group(name)
  }

  /// See [`ManageRuleIndex::rename_group`].
  pub fn rename_group(&mut self, from: &str, to: &str) -> Result<(), RuleError> {
    self.rules.rename_group(from, to)
  }

  /// See [`ManageRuleIndex::remove_group`].
  pub fn remove_group(&mut self, name: &str) -> Result<Vec<ManageRule>, RuleError> {
    self.rules.remove_group(name)
  }

  /// Resolve one asset without touching the collected index or the repository.
  pub fn resolve(&self, path: &str) -> AssetCollectInfo {
    AssetCollector::resolve(&self.rules, path)
  }

  /// Collect the whole repository and push every changed bundle assignment.
  ///
  /// Failed writes are reported per asset and never stop the batch.
  #[instrument(level = "debug", skip_all)]
  pub fn collect_all(
    &mut self,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
  ) -> CollectionReport {
    let mut report = self
      .collector
      .collect_all(&self.rules, &self.repo, progress, cancel);
    self.apply_report(&mut report);
    report
  }

  /// Collect the whole repository without writing any bundle assignment.
  ///
  /// Refreshes the collected index for read-only consumers such as
  /// [`BundlePlanner::build_dependency_graph`].
  pub fn scan(
    &mut self,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
  ) -> CollectionReport {
    self
      .collector
      .collect_all(&self.rules, &self.repo, progress, cancel)
  }

  /// Collect one file or folder and push its changed bundle assignments.
  pub fn collect_subtree(
    &mut self,
    root: &str,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
  ) -> CollectionReport {
    let mut report = self
      .collector
      .collect_subtree(&self.rules, &self.repo, root, progress, cancel);
    self.apply_report(&mut report);
    report
  }

  /// Update the collected index after host file events and push the new assignments.
  pub fn apply_changes(&mut self, changes: &AssetChanges) -> CollectionReport {
    let mut report = CollectionReport {
      infos: self
        .collector
        .apply_changes(&self.rules, &self.repo, changes),
      ..CollectionReport::default()
    };
    self.apply_report(&mut report);
    report
  }

  /// Write `info.bundle_name` to the repository when it differs from the stored name.
  ///
  /// Assets excluded from management are left untouched. Returns whether a write happened.
  pub fn apply_bundle_assignment(
    &mut self,
    info: &AssetCollectInfo,
  ) -> Result<bool, RepositoryError> {
    apply_bundle_assignment(&mut self.repo, info)
  }

  /// Build the dependency graph over the collected bundle membership.
  pub fn build_dependency_graph(
    &self,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
  ) -> (DependencyGraph, Vec<BatchError>) {
    DependencyGraphBuilder::new(self.collector.infos()).build(&self.repo, progress, cancel)
  }

  /// Bundle names mapped to their sorted member assets.
  pub fn bundles(&self) -> BTreeMap<String, Vec<AssetPath>> {
    let mut bundles: BTreeMap<String, Vec<AssetPath>> = BTreeMap::new();
    for info in self.collector.infos().filter(|info| info.is_bundled()) {
      bundles
        .entry(info.bundle_name.clone())
        .or_default()
        .push(info.path.clone());
    }
    bundles
  }

  /// Bundle names that merge assets meant to be bundled apart.
  ///
  /// A name collides when several rules produce it, or when a child strategy maps several
  /// assets to it (`hero.png` next to `hero.psd`, or `a_b.png` next to `a/b.png`).
  pub fn name_collisions(&self) -> BTreeMap<String, NameCollision> {
    #[derive(Default)]
    struct Sources<'a> {
      rules: BTreeSet<&'a str>,
      assets: BTreeSet<&'a str>,
      per_child: bool,
    }

    let mut sources: BTreeMap<&str, Sources<'_>> = BTreeMap::new();
    for info in self.collector.infos().filter(|info| info.is_bundled()) {
      if let Some(rule) = &info.resolved_rule {
        let entry = sources.entry(info.bundle_name.as_str()).or_default();
        entry.rules.insert(rule.target_asset.as_str());
        entry.assets.insert(info.path.as_str());
        entry.per_child |= rule.naming_strategy.names_each_child();
      }
    }

    sources
      .into_iter()
      .filter(|(_, found)| found.rules.len() > 1 || (found.per_child && found.assets.len() > 1))
      .map(|(name, found)| {
        warn!(
          bundle = name,
          rules = found.rules.len(),
          assets = found.assets.len(),
          "bundle name merges assets meant to be bundled apart"
        );
        let collision = NameCollision {
          rules: found.rules.into_iter().map(str::to_string).collect(),
          assets: found.assets.into_iter().map(str::to_string).collect(),
        };
        (name.to_string(), collision)
      })
      .collect()
  }

  fn apply_report(&mut self, report: &mut CollectionReport) {
    for info in &report.infos {
      match apply_bundle_assignment(&mut self.repo, info) {
        Ok(true) => report.changed += 1,
        Ok(false) => {}
        Err(source) => {
          warn!(path = %info.path, error = %source, "failed to assign bundle");
          report.errors.push(BatchError::Assignment {
            path: info.path.clone(),
            bundle_name: info.bundle_name.clone(),
            source,
          });
        }
      }
    }
    info!(
      assets = report.infos.len(),
      changed = report.changed,
      errors = report.errors.len(),
      "applied bundle assignments"
    );
  }
}

/// Push one bundle assignment to `repo` if it changed.
pub fn apply_bundle_assignment<R: ContentRepository + ?Sized>(
  repo: &mut R,
  info: &AssetCollectInfo,
) -> Result<bool, RepositoryError> {
  if info.ignore == Some(IgnoreType::IgnoreManage) {
    return Ok(false);
  }
  if repo.current_bundle_name(&info.path) == info.bundle_name {
    return Ok(false);
  }

  repo.set_bundle_name(&info.path, &info.bundle_name)?;
  debug!(path = %info.path, bundle = %info.bundle_name, "assigned bundle");
  Ok(true)
}
