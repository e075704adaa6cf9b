//! Canonical asset path handling.
//!
//! Asset paths are always slash-separated and relative to the repository root, regardless of
//! the native directory separator used when the files were discovered on disk.

/// Produce the canonical form of a repository-relative asset path.
///
/// Backslashes become forward slashes, empty and `.` segments are dropped, and leading or
/// trailing separators are trimmed.
pub fn normalize_asset_path(path: &str) -> String {
  path
    .replace('\\', "/")
    .split('/')
    .filter(|segment| !segment.is_empty() && *segment != ".")
    .collect::<Vec<_>>()
    .join("/")
}

/// Folder containing `path`, or `""` for entries at the repository root.
pub fn parent_folder(path: &str) -> &str {
  path.rsplit_once('/').map_or("", |(parent, _)| parent)
}

/// Last segment of `path`.
pub fn file_name(path: &str) -> &str {
  path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// Last segment of `path` without its final extension.
///
/// Dot-files such as `.keep` keep their full name.
pub fn file_stem(path: &str) -> &str {
  let name = file_name(path);
  match name.rfind('.') {
    Some(0) | None => name,
    Some(index) => &name[..index],
  }
}

/// Strip the final extension from every segment-preserving relative path.
pub fn strip_extension(path: &str) -> &str {
  let stem = file_stem(path);
  let parent = parent_folder(path);
  if parent.is_empty() {
    stem
  } else {
    &path[..parent.len() + 1 + stem.len()]
  }
}

/// Lower-cased extension of `path` without the leading dot.
pub fn extension(path: &str) -> Option<String> {
  let name = file_name(path);
  match name.rfind('.') {
    Some(0) | None => None,
    Some(index) => Some(name[index + 1..].to_lowercase()),
  }
}

/// Path of `path` relative to `root`.
///
/// Returns `Some("")` when both are equal and `None` when `path` is outside `root`. Matching is
/// segment-aware, so `Foo` is not an ancestor of `FooBar/x.png`.
pub fn relative_to<'a>(path: &'a str, root: &str) -> Option<&'a str> {
  if root.is_empty() {
    return Some(path);
  }
  if path == root {
    return Some("");
  }
  path.strip_prefix(root)?.strip_prefix('/')
}

/// Returns `true` when `candidate` equals `scope` or lives beneath it.
pub fn scope_matches(scope: &str, candidate: &str) -> bool {
  relative_to(candidate, scope).is_some()
}
