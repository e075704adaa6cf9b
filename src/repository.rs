//! Content repository abstraction consumed by the planner.
//!
//! The planner never touches storage directly. Hosts implement [`ContentRepository`] over their
//! asset database; [`MemoryRepository`] backs tests and embedding, [`FsRepository`] backs the CLI.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::asset_paths::{normalize_asset_path, relative_to, scope_matches};
use crate::error::RepositoryError;
use crate::models::AssetPath;

/// Query and mutation interface of the host's content repository.
pub trait ContentRepository {
  /// Returns `true` when `path` is a folder.
  fn is_folder(&self, path: &str) -> bool;

  /// Returns `true` when `path` exists as a file or folder.
  fn exists(&self, path: &str) -> bool;

  /// Every non-folder asset at or beneath `root`, sorted. An empty root lists the repository.
  fn list_assets(&self, root: &str) -> Vec<AssetPath>;

  /// Flattened one-hop dependencies of `path`. Unknown assets have none.
  fn forward_dependencies(&self, path: &str) -> Vec<AssetPath>;

  /// Bundle name currently stored for `path`; empty when unassigned.
  fn current_bundle_name(&self, path: &str) -> String;

  /// Store a bundle name for `path`. An empty name clears the assignment.
  fn set_bundle_name(&mut self, path: &str, name: &str) -> Result<(), RepositoryError>;
}

/// In-memory repository used as a fake oracle and by hosts that mirror their own database.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
  assets: BTreeSet<AssetPath>,
  dependencies: BTreeMap<AssetPath, Vec<AssetPath>>,
  bundle_names: BTreeMap<AssetPath, String>,
  locked: BTreeSet<AssetPath>,
}

impl MemoryRepository {
  /// Empty repository.
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style variant of [`MemoryRepository::add_asset`].
  pub fn with_asset(mut self, path: &str) -> Self {
    self.add_asset(path);
    self
  }

  /// Builder-style variant of [`MemoryRepository::set_dependencies`].
  pub fn with_dependencies(mut self, path: &str, dependencies: &[&str]) -> Self {
    self.set_dependencies(path, dependencies);
    self
  }

  /// Register a file asset. Its ancestors become folders implicitly.
  pub fn add_asset(&mut self, path: &str) {
    self.assets.insert(normalize_asset_path(path));
  }

  /// Remove a file asset or every asset beneath a folder.
  pub fn remove_asset(&mut self, path: &str) {
    let path = normalize_asset_path(path);
    self.assets.retain(|asset| !scope_matches(&path, asset));
    self.bundle_names.retain(|asset, _| !scope_matches(&path, asset));
  }

  /// Move a file or folder, carrying bundle assignments along.
  pub fn move_asset(&mut self, from: &str, to: &str) {
    let from = normalize_asset_path(from);
    let to = normalize_asset_path(to);
    let moved: Vec<AssetPath> = self
      .assets
      .iter()
      .filter(|asset| scope_matches(&from, asset))
      .cloned()
      .collect();

    for asset in moved {
      let Some(relative) = relative_to(&asset, &from) else {
        continue;
      };
      let destination = if relative.is_empty() {
        to.clone()
      } else {
        format!("{to}/{relative}")
      };
      self.assets.remove(&asset);
      if let Some(name) = self.bundle_names.remove(&asset) {
        self.bundle_names.insert(destination.clone(), name);
      }
      self.assets.insert(destination);
    }
  }

  /// Replace the forward dependencies of `path`.
  pub fn set_dependencies(&mut self, path: &str, dependencies: &[&str]) {
    self.dependencies.insert(
      normalize_asset_path(path),
      dependencies
        .iter()
        .map(|dependency| normalize_asset_path(dependency))
        .collect(),
    );
  }

  /// Make every subsequent bundle write to `path` fail.
  pub fn lock(&mut self, path: &str) {
    self.locked.insert(normalize_asset_path(path));
  }
}

impl ContentRepository for MemoryRepository {
  fn is_folder(&self, path: &str) -> bool {
    let prefix = format!("{path}/");
    path.is_empty()
      || self
        .assets
        .range(prefix.clone()..)
        .next()
        .is_some_and(|asset| asset.starts_with(&prefix))
  }

  fn exists(&self, path: &str) -> bool {
    self.assets.contains(path) || self.is_folder(path)
  }

  fn list_assets(&self, root: &str) -> Vec<AssetPath> {
    self
      .assets
      .iter()
      .filter(|asset| scope_matches(root, asset))
      .cloned()
      .collect()
  }

  fn forward_dependencies(&self, path: &str) -> Vec<AssetPath> {
    self.dependencies.get(path).cloned().unwrap_or_default()
  }

  fn current_bundle_name(&self, path: &str) -> String {
    self.bundle_names.get(path).cloned().unwrap_or_default()
  }

  fn set_bundle_name(&mut self, path: &str, name: &str) -> Result<(), RepositoryError> {
    if self.locked.contains(path) {
      return Err(RepositoryError::Locked { path: path.into() });
    }
    if !self.assets.contains(path) {
      return Err(RepositoryError::NotFound { path: path.into() });
    }
    if name.is_empty() {
      self.bundle_names.remove(path);
    } else {
      self.bundle_names.insert(path.into(), name.into());
    }
    Ok(())
  }
}

/// Repository backed by a directory tree.
///
/// Dependencies come from a JSON map (`{"asset": ["dependency", ...]}`); bundle assignments are
/// kept in memory and written back to a JSON map by [`FsRepository::save`]. Either file living
/// inside the content root is excluded from enumeration, as is anything passed to
/// [`FsRepository::exclude`].
#[derive(Debug)]
pub struct FsRepository {
  root: PathBuf,
  dependencies: BTreeMap<AssetPath, Vec<AssetPath>>,
  bundle_names: BTreeMap<AssetPath, String>,
  assignments_path: Option<PathBuf>,
  excluded: BTreeSet<AssetPath>,
}

impl FsRepository {
  /// Open a repository rooted at `root`.
  ///
  /// Missing dependency or assignment files are treated as empty maps.
  pub fn open(
    root: impl Into<PathBuf>,
    dependencies_path: Option<&Path>,
    assignments_path: Option<PathBuf>,
  ) -> Result<Self, RepositoryError> {
    let dependencies = match dependencies_path {
      Some(path) => load_json_map::<Vec<AssetPath>>(path)?
        .into_iter()
        .map(|(asset, deps)| {
          (
            normalize_asset_path(&asset),
            deps.iter().map(|dep| normalize_asset_path(dep)).collect(),
          )
        })
        .collect(),
      None => BTreeMap::new(),
    };
    let bundle_names = match assignments_path.as_deref() {
      Some(path) => load_json_map::<String>(path)?,
      None => BTreeMap::new(),
    };

    let mut repo = Self {
      root: root.into(),
      dependencies,
      bundle_names,
      assignments_path: None,
      excluded: BTreeSet::new(),
    };
    if let Some(path) = dependencies_path {
      repo.exclude(path);
    }
    if let Some(path) = &assignments_path {
      repo.exclude(path);
    }
    repo.assignments_path = assignments_path;
    Ok(repo)
  }

  /// Hide a planner file (configuration or sidecar map) from asset enumeration.
  ///
  /// Paths outside the content root are ignored.
  pub fn exclude(&mut self, path: &Path) {
    let Ok(relative) = path.strip_prefix(&self.root) else {
      return;
    };
    let asset = normalize_asset_path(&relative.to_string_lossy());
    if !asset.is_empty() {
      debug!(%asset, "excluding planner file from assets");
      self.excluded.insert(asset);
    }
  }

  /// Directory the repository is rooted at.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Persist bundle assignments to the configured assignments file, if any.
  pub fn save(&self) -> Result<(), RepositoryError> {
    let Some(path) = &self.assignments_path else {
      return Ok(());
    };
    let json = serde_json::to_string_pretty(&self.bundle_names).map_err(|source| {
      RepositoryError::Parse {
        path: path.clone(),
        source,
      }
    })?;
    fs::write(path, json).map_err(|source| RepositoryError::Io {
      path: path.clone(),
      source,
    })?;
    debug!(
      path = %path.display(),
      assignments = self.bundle_names.len(),
      "saved bundle assignments"
    );
    Ok(())
  }

  fn native_path(&self, path: &str) -> PathBuf {
    if path.is_empty() {
      self.root.clone()
    } else {
      self.root.join(path)
    }
  }
}

impl ContentRepository for FsRepository {
  fn is_folder(&self, path: &str) -> bool {
    self.native_path(path).is_dir()
  }

  fn exists(&self, path: &str) -> bool {
    self.native_path(path).exists()
  }

  fn list_assets(&self, root: &str) -> Vec<AssetPath> {
    let native = self.native_path(root);
    let mut assets = Vec::new();
    if native.is_file() {
      assets.push(root.to_string());
    } else {
      collect_files_recursively(&native, root, &mut assets);
    }
    assets.retain(|asset| !self.excluded.contains(asset));
    assets.sort();
    assets
  }

  fn forward_dependencies(&self, path: &str) -> Vec<AssetPath> {
    self.dependencies.get(path).cloned().unwrap_or_default()
  }

  fn current_bundle_name(&self, path: &str) -> String {
    self.bundle_names.get(path).cloned().unwrap_or_default()
  }

  fn set_bundle_name(&mut self, path: &str, name: &str) -> Result<(), RepositoryError> {
    if !self.native_path(path).is_file() {
      return Err(RepositoryError::NotFound { path: path.into() });
    }
    if name.is_empty() {
      self.bundle_names.remove(path);
    } else {
      self.bundle_names.insert(path.into(), name.into());
    }
    Ok(())
  }
}

/// Walk `dir`, pushing slash-separated paths of every visible file relative to the repository.
fn collect_files_recursively(dir: &Path, relative_root: &str, assets: &mut Vec<AssetPath>) {
  let Ok(entries) = fs::read_dir(dir) else {
    return;
  };

  for entry in entries.flatten() {
    let file_name = entry.file_name();
    let name = file_name.to_string_lossy();
    if name.starts_with('.') {
      continue;
    }

    let relative = if relative_root.is_empty() {
      name.to_string()
    } else {
      format!("{relative_root}/{name}")
    };

    match entry.file_type() {
      Ok(file_type) if file_type.is_dir() => {
        collect_files_recursively(&entry.path(), &relative, assets);
      }
      Ok(file_type) if file_type.is_file() => assets.push(relative),
      _ => {}
    }
  }
}

fn load_json_map<T: serde::de::DeserializeOwned>(
  path: &Path,
) -> Result<BTreeMap<String, T>, RepositoryError> {
  let contents = match fs::read_to_string(path) {
    Ok(contents) => contents,
    Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
    Err(source) => {
      return Err(RepositoryError::Io {
        path: path.to_path_buf(),
        source,
      });
    }
  };

  serde_json::from_str(&contents).map_err(|source| RepositoryError::Parse {
    path: path.to_path_buf(),
    source,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn memory_folders_are_implied_by_descendants() {
    let repo = MemoryRepository::new()
      .with_asset("Art/Chars/hero.png")
      .with_asset("Art/CharsExtra.png");

    assert!(repo.is_folder("Art"));
    assert!(repo.is_folder("Art/Chars"));
    assert!(!repo.is_folder("Art/Char"));
    assert!(!repo.is_folder("Art/CharsExtra.png"));
    assert!(repo.exists("Art/CharsExtra.png"));
    assert!(!repo.exists("Art/missing.png"));
  }

  #[test]
  fn memory_listing_is_scoped_and_sorted() {
    let repo = MemoryRepository::new()
      .with_asset("b.png")
      .with_asset("Foo/x.png")
      .with_asset("FooBar/y.png");

    assert_eq!(repo.list_assets("Foo"), vec!["Foo/x.png".to_string()]);
    assert_eq!(repo.list_assets("").len(), 3);
    assert_eq!(repo.list_assets("b.png"), vec!["b.png".to_string()]);
  }

  #[test]
  fn memory_writes_respect_locks_and_existence() {
    let mut repo = MemoryRepository::new().with_asset("a.png");
    repo.lock("a.png");

    assert!(matches!(
      repo.set_bundle_name("a.png", "x"),
      Err(RepositoryError::Locked { .. })
    ));
    assert!(matches!(
      repo.set_bundle_name("missing.png", "x"),
      Err(RepositoryError::NotFound { .. })
    ));
  }

  #[test]
  fn memory_moves_carry_assignments() {
    let mut repo = MemoryRepository::new().with_asset("Old/a.png");
    repo
      .set_bundle_name("Old/a.png", "bundle")
      .expect("write should succeed");

    repo.move_asset("Old", "New");

    assert!(repo.exists("New/a.png"));
    assert!(!repo.exists("Old/a.png"));
    assert_eq!(repo.current_bundle_name("New/a.png"), "bundle");
  }

  #[test]
  fn fs_repository_lists_visible_files_and_persists_assignments()
  -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let root = temp.path().join("content");
    fs::create_dir_all(root.join("Chars/sub"))?;
    fs::write(root.join("Chars/hero.png"), b"png")?;
    fs::write(root.join("Chars/sub/villain.png"), b"png")?;
    fs::write(root.join("Chars/.DS_Store"), b"junk")?;

    let deps_path = temp.path().join("deps.json");
    fs::write(&deps_path, r#"{"Chars\\hero.png": ["Shared/mat.mat"]}"#)?;
    let assignments_path = temp.path().join("assignments.json");

    let mut repo =
      FsRepository::open(&root, Some(deps_path.as_path()), Some(assignments_path.clone()))?;
    assert_eq!(repo.list_assets(""), vec![
      "Chars/hero.png".to_string(),
      "Chars/sub/villain.png".to_string(),
    ]);
    assert!(repo.is_folder("Chars/sub"));
    assert_eq!(repo.forward_dependencies("Chars/hero.png"), vec![
      "Shared/mat.mat".to_string()
    ]);

    repo.set_bundle_name("Chars/hero.png", "chars_hero")?;
    repo.save()?;

    let reopened = FsRepository::open(&root, None, Some(assignments_path))?;
    assert_eq!(reopened.current_bundle_name("Chars/hero.png"), "chars_hero");
    Ok(())
  }

  #[test]
  fn fs_repository_hides_planner_files_inside_the_root() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let root = temp.path();
    fs::create_dir_all(root.join("Chars"))?;
    fs::write(root.join("Chars/hero.png"), b"png")?;
    fs::write(root.join("bundle-planner.json"), "{}")?;
    fs::write(root.join("dependencies.json"), "{}")?;
    fs::write(root.join("bundles.json"), "{}")?;

    let mut repo = FsRepository::open(
      root,
      Some(root.join("dependencies.json").as_path()),
      Some(root.join("bundles.json")),
    )?;
    repo.exclude(&root.join("bundle-planner.json"));
    repo.exclude(Path::new("/elsewhere/bundle-planner.json"));

    assert_eq!(repo.list_assets(""), vec!["Chars/hero.png".to_string()]);
    assert!(repo.list_assets("bundles.json").is_empty());
    Ok(())
  }
}
