//! Cross-bundle dependency graph.
//!
//! For every bundle the builder splits the dependencies of its members into assets the bundle
//! owns and assets living elsewhere, then inverts the external edges into a ranking of assets
//! pulled in by several bundles. The graph is always rebuilt in full: a single new edge can move
//! assets between the owned and external sets of unrelated bundles.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::BatchError;
use crate::models::{AssetCollectInfo, AssetPath, BundleDependencyInfo, ReferenceInfo};
use crate::progress::{CancellationToken, ProgressSink, fraction};
use crate::repository::ContentRepository;

/// Dependency partitions per bundle plus the inverse reference ranking.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraph {
  /// Partition of every bundle that has at least one member.
  pub bundles: BTreeMap<String, BundleDependencyInfo>,
  /// Externally referenced assets, most referenced first.
  pub references: Vec<ReferenceInfo>,
}

impl DependencyGraph {
  /// Reference information for one asset.
  pub fn reference(&self, path: &str) -> Option<&ReferenceInfo> {
    self.references.iter().find(|info| info.asset_path == path)
  }

  /// Assets referenced by at least two bundles.
  pub fn shared(&self) -> impl Iterator<Item = &ReferenceInfo> {
    self
      .references
      .iter()
      .filter(|info| info.reference_count() >= 2)
  }

  /// Unbundled assets that end up copied into several bundles.
  pub fn duplicated(&self) -> impl Iterator<Item = &ReferenceInfo> {
    self.references.iter().filter(|info| info.is_duplicated())
  }
}

/// Builds a [`DependencyGraph`] from collected bundle membership.
#[derive(Debug)]
pub struct DependencyGraphBuilder<'a> {
  bundle_of: BTreeMap<&'a str, &'a str>,
  members: BTreeMap<&'a str, Vec<&'a str>>,
}

impl<'a> DependencyGraphBuilder<'a> {
  /// Index the bundled, non-ignored assets among `infos`.
  pub fn new(infos: impl IntoIterator<Item = &'a AssetCollectInfo>) -> Self {
    let mut bundle_of = BTreeMap::new();
    let mut members: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for info in infos.into_iter().filter(|info| info.is_bundled()) {
      bundle_of.insert(info.path.as_str(), info.bundle_name.as_str());
      members
        .entry(info.bundle_name.as_str())
        .or_default()
        .push(info.path.as_str());
    }

    Self { bundle_of, members }
  }

  /// Number of bundles with at least one member.
  pub fn bundle_count(&self) -> usize {
    self.members.len()
  }

  /// Partition dependencies of every bundle and rank externally shared assets.
  ///
  /// Unknown dependencies are tolerated: they belong to no bundle and are listed as external.
  /// On cancellation the fully processed bundles are returned together with a
  /// [`BatchError::Cancelled`].
  #[instrument(level = "debug", skip_all, fields(bundles = self.members.len()))]
  pub fn build<R: ContentRepository + ?Sized>(
    &self,
    repo: &R,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
  ) -> (DependencyGraph, Vec<BatchError>) {
    let total: usize = self.members.values().map(Vec::len).sum();
    let mut processed = 0;
    let mut errors = Vec::new();
    let mut bundles = BTreeMap::new();

    for (&bundle, assets) in &self.members {
      let mut owned: BTreeSet<AssetPath> = assets.iter().map(|asset| asset.to_string()).collect();
      let mut external: BTreeSet<AssetPath> = BTreeSet::new();
      let mut stop = false;

      for &asset in assets {
        if cancel.is_cancelled() {
          warn!(processed, total, "dependency graph build cancelled");
          errors.push(BatchError::Cancelled { processed, total });
          stop = true;
          break;
        }

        for dependency in repo.forward_dependencies(asset) {
          if self.bundle_name(&dependency) == bundle {
            external.remove(&dependency);
            owned.insert(dependency);
          } else if !owned.contains(&dependency) {
            external.insert(dependency);
          }
        }

        processed += 1;
        progress.report(fraction(processed, total), asset);
      }

      if stop {
        break;
      }

      debug!(bundle, owned = owned.len(), external = external.len(), "partitioned bundle");
      bundles.insert(bundle.to_string(), BundleDependencyInfo {
        bundle_name: bundle.to_string(),
        owned_asset_paths: owned.into_iter().collect(),
        external_asset_paths: external.into_iter().collect(),
      });
    }

    let references = self.rank_references(&bundles);
    info!(
      bundles = bundles.len(),
      referenced = references.len(),
      shared = references.iter().filter(|r| r.reference_count() >= 2).count(),
      "built dependency graph"
    );

    (DependencyGraph { bundles, references }, errors)
  }

  fn bundle_name(&self, path: &str) -> &'a str {
    self.bundle_of.get(path).copied().unwrap_or_default()
  }

  fn rank_references(
    &self,
    bundles: &BTreeMap<String, BundleDependencyInfo>,
  ) -> Vec<ReferenceInfo> {
    let mut referencing: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for info in bundles.values() {
      for asset in &info.external_asset_paths {
        referencing
          .entry(asset.as_str())
          .or_default()
          .push(info.bundle_name.clone());
      }
    }

    let mut references: Vec<ReferenceInfo> = referencing
      .into_iter()
      .map(|(asset, mut referencing_bundles)| {
        referencing_bundles.sort();
        ReferenceInfo {
          asset_path: asset.to_string(),
          referencing_bundles,
          owning_bundle: self.bundle_name(asset).to_string(),
        }
      })
      .collect();

    references.sort_by(|a, b| {
      Reverse(a.reference_count())
        .cmp(&Reverse(b.reference_count()))
        .then_with(|| a.asset_path.len().cmp(&b.asset_path.len()))
        .then_with(|| a.asset_path.cmp(&b.asset_path))
    });
    references
  }
}
