#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod asset_paths;
pub mod builder;
pub mod collector;
pub mod config;
pub mod error;
pub mod graph;
pub mod models;
pub mod progress;
pub mod repository;
pub mod rules;

pub use builder::{BundlePlanner, apply_bundle_assignment};
pub use collector::{AssetChanges, AssetCollector, CollectionReport};
pub use config::PlannerConfig;
pub use error::{BatchError, RepositoryError, RuleError};
pub use graph::{DependencyGraph, DependencyGraphBuilder};
pub use models::{
  AssetCollectInfo, AssetPath, BundleDependencyInfo, Group, IgnoreType, ManageRule,
  NameCollision, NamingStrategy, ReferenceInfo,
};
pub use progress::{CancellationToken, NoProgress, ProgressSink};
pub use repository::{ContentRepository, FsRepository, MemoryRepository};
pub use rules::{ManageRuleIndex, ResolvedRule};
