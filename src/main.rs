use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bundle_planner::{
  AssetCollectInfo, AssetPath, BundlePlanner, CancellationToken, FsRepository, NameCollision,
  NoProgress, PlannerConfig, ReferenceInfo,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
  name = "bundle-planner",
  version,
  about = "Assign content assets to bundles and report cross-bundle dependencies"
)]
struct Cli {
  /// Content root the asset paths are relative to.
  #[arg(long, global = true, default_value = ".")]
  root: PathBuf,

  /// Planner configuration file. Discovered in the content root when omitted.
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Resolve every asset and print its bundle assignment.
  Scan {
    /// Write changed assignments to the assignments file.
    #[arg(long)]
    apply: bool,
  },
  /// Resolve a single asset.
  Resolve {
    /// Asset path relative to the content root.
    path: String,
  },
  /// Build the cross-bundle dependency graph.
  Graph {
    /// Only print assets referenced by two or more bundles.
    #[arg(long)]
    shared_only: bool,
  },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanOutput<'a> {
  assets: &'a [AssetCollectInfo],
  changed: usize,
  bundles: BTreeMap<String, Vec<AssetPath>>,
  collisions: BTreeMap<String, NameCollision>,
}

fn init_tracing() {
  let filter = EnvFilter::try_from_env("BUNDLE_PLANNER_LOG")
    .unwrap_or_else(|_| EnvFilter::new("bundle_planner=info,warn"));
  let format = env::var("BUNDLE_PLANNER_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

  let registry = tracing_subscriber::registry().with(filter);
  match format.as_str() {
    "json" => registry
      .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
      .init(),
    _ => registry
      .with(fmt::layer().compact().with_writer(std::io::stderr))
      .init(),
  }
}

fn open_planner(root: &Path, config_path: Option<&Path>) -> Result<BundlePlanner<FsRepository>> {
  let config_path = config_path
    .map(Path::to_path_buf)
    .or_else(|| PlannerConfig::discover_path(root));
  let (config, base) = match &config_path {
    Some(path) => (
      PlannerConfig::from_path(path)?,
      path.parent().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
    ),
    None => (PlannerConfig::default(), root.to_path_buf()),
  };

  let rules = config.to_rule_index()?;
  let mut repo = FsRepository::open(
    root,
    config.dependencies_path(&base).as_deref(),
    config.assignments_path(&base),
  )
  .context("failed to open content repository")?;
  if let Some(path) = &config_path {
    repo.exclude(path);
  }
  info!(root = %root.display(), rules = rules.rules().len(), "opened content repository");
  Ok(BundlePlanner::new(rules, repo))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn main() -> Result<()> {
  init_tracing();
  let cli = Cli::parse();
  let mut planner = open_planner(&cli.root, cli.config.as_deref())?;
  let cancel = CancellationToken::new();

  match cli.command {
    Command::Scan { apply } => {
      let report = planner.collect_all(&mut NoProgress, &cancel);
      print_json(&ScanOutput {
        assets: &report.infos,
        changed: report.changed,
        bundles: planner.bundles(),
        collisions: planner.name_collisions(),
      })?;

      for error in &report.errors {
        eprintln!("error: {error}");
      }
      if apply {
        planner
          .repository()
          .save()
          .context("failed to persist bundle assignments")?;
      }
      if !report.errors.is_empty() {
        bail!("{} assets could not be assigned", report.errors.len());
      }
    }
    Command::Resolve { path } => {
      print_json(&planner.resolve(&path))?;
    }
    Command::Graph { shared_only } => {
      planner.scan(&mut NoProgress, &cancel);
      let (graph, errors) = planner.build_dependency_graph(&mut NoProgress, &cancel);
      for error in &errors {
        eprintln!("error: {error}");
      }

      if shared_only {
        let shared: Vec<&ReferenceInfo> = graph.shared().collect();
        print_json(&shared)?;
      } else {
        print_json(&graph)?;
      }
    }
  }

  Ok(())
}
