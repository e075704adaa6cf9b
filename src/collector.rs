//! Asset collection: classification, rule resolution and naming across the repository.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::asset_paths::{
  compose_bundle_name, is_canonical_bundle_name, normalize_asset_path, scope_matches,
};
use crate::error::BatchError;
use crate::models::{AssetCollectInfo, AssetPath, IgnoreType};
use crate::progress::{CancellationToken, NoProgress, ProgressSink, fraction};
use crate::repository::ContentRepository;
use crate::rules::ManageRuleIndex;

/// Outcome of a batch pass: every item processed plus per-item failures.
#[derive(Debug, Default)]
pub struct CollectionReport {
  /// Fresh information for every processed asset, sorted by path.
  pub infos: Vec<AssetCollectInfo>,
  /// Number of bundle assignments written to the repository.
  pub changed: usize,
  /// Failures that did not stop the pass.
  pub errors: Vec<BatchError>,
}

impl CollectionReport {
  /// Returns `true` when the pass stopped early because it was cancelled.
  pub fn was_cancelled(&self) -> bool {
    self
      .errors
      .iter()
      .any(|error| matches!(error, BatchError::Cancelled { .. }))
  }
}

/// File system events reported by the host since the last pass.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssetChanges {
  /// Newly created or re-imported files and folders.
  pub created: Vec<AssetPath>,
  /// Deleted files and folders.
  pub deleted: Vec<AssetPath>,
  /// Moves as `(from, to)` pairs.
  pub moved: Vec<(AssetPath, AssetPath)>,
}

/// In-memory index of [`AssetCollectInfo`] keyed by asset path.
#[derive(Debug, Default)]
pub struct AssetCollector {
  infos: BTreeMap<AssetPath, AssetCollectInfo>,
}

impl AssetCollector {
  /// Empty collector.
  pub fn new() -> Self {
    Self::default()
  }

  /// Collected information in path order.
  pub fn infos(&self) -> impl Iterator<Item = &AssetCollectInfo> {
    self.infos.values()
  }

  /// Collected information for one asset.
  pub fn get(&self, path: &str) -> Option<&AssetCollectInfo> {
    self.infos.get(path)
  }

  /// Number of collected assets.
  pub fn len(&self) -> usize {
    self.infos.len()
  }

  /// Returns `true` when nothing has been collected.
  pub fn is_empty(&self) -> bool {
    self.infos.is_empty()
  }

  /// Classify, resolve and name one asset.
  ///
  /// Assets whose ignore type suppresses bundling keep their resolved rule but get an empty
  /// bundle name, so stale assignments are cleared when applied.
  pub fn resolve(rules: &ManageRuleIndex, path: &str) -> AssetCollectInfo {
    let path = normalize_asset_path(path);
    let ignore = rules.classify(&path);
    let resolved = rules.resolve(&path);

    let bundle_name = if ignore.is_some_and(IgnoreType::suppresses_bundling) {
      String::new()
    } else {
      let (rule, group) = resolved.map_or((None, ""), |r| (Some(r.rule), r.group));
      compose_bundle_name(rule, &path, group)
    };

    if !is_canonical_bundle_name(&bundle_name) {
      warn!(%path, %bundle_name, "bundle name contains non-canonical characters");
    }

    AssetCollectInfo {
      resolved_rule: resolved.map(|r| r.rule.clone()),
      path,
      ignore,
      bundle_name,
    }
  }

  /// Collect every asset in the repository, replacing the whole index.
  ///
  /// When cancelled, the assets processed so far are merged into the existing index instead.
  #[instrument(level = "debug", skip_all)]
  pub fn collect_all<R: ContentRepository + ?Sized>(
    &mut self,
    rules: &ManageRuleIndex,
    repo: &R,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
  ) -> CollectionReport {
    let assets = repo.list_assets("");
    let report = collect_paths(rules, &assets, progress, cancel);

    if report.was_cancelled() {
      self.merge(&report.infos);
    } else {
      self.infos = report
        .infos
        .iter()
        .map(|info| (info.path.clone(), info.clone()))
        .collect();
    }
    info!(assets = report.infos.len(), "collected repository assets");
    report
  }

  /// Collect the assets at or beneath `root`, leaving the rest of the index untouched.
  ///
  /// Entries beneath `root` that no longer exist are dropped.
  #[instrument(level = "debug", skip_all, fields(root = %root))]
  pub fn collect_subtree<R: ContentRepository + ?Sized>(
    &mut self,
    rules: &ManageRuleIndex,
    repo: &R,
    root: &str,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
  ) -> CollectionReport {
    let root = normalize_asset_path(root);
    let assets = repo.list_assets(&root);
    let report = collect_paths(rules, &assets, progress, cancel);

    if !report.was_cancelled() {
      self.forget(&root);
    }
    self.merge(&report.infos);
    debug!(assets = report.infos.len(), "collected subtree");
    report
  }

  /// Update the index after creations, deletions and moves.
  ///
  /// Returns the fresh information of every created or moved asset.
  pub fn apply_changes<R: ContentRepository + ?Sized>(
    &mut self,
    rules: &ManageRuleIndex,
    repo: &R,
    changes: &AssetChanges,
  ) -> Vec<AssetCollectInfo> {
    let cancel = CancellationToken::new();
    let removed = changes
      .deleted
      .iter()
      .chain(changes.moved.iter().map(|(from, _)| from));
    for path in removed {
      self.forget(&normalize_asset_path(path));
    }

    let added = changes
      .created
      .iter()
      .chain(changes.moved.iter().map(|(_, to)| to));
    let mut infos = Vec::new();
    for path in added {
      let report = self.collect_subtree(rules, repo, path, &mut NoProgress, &cancel);
      infos.extend(report.infos);
    }
    infos
  }

  fn forget(&mut self, root: &str) {
    self.infos.retain(|path, _| !scope_matches(root, path));
  }

  fn merge(&mut self, infos: &[AssetCollectInfo]) {
    for info in infos {
      self.infos.insert(info.path.clone(), info.clone());
    }
  }
}

fn collect_paths(
  rules: &ManageRuleIndex,
  assets: &[AssetPath],
  progress: &mut dyn ProgressSink,
  cancel: &CancellationToken,
) -> CollectionReport {
  let total = assets.len();
  let mut report = CollectionReport::default();

  for (processed, path) in assets.iter().enumerate() {
    if cancel.is_cancelled() {
      warn!(processed, total, "collection cancelled");
      report
        .errors
        .push(BatchError::Cancelled { processed, total });
      break;
    }
    report.infos.push(AssetCollector::resolve(rules, path));
    progress.report(fraction(processed + 1, total), path);
  }

  report
}
