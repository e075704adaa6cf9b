//! Pure helpers over asset paths: normalisation, ignore classification and bundle naming.
//!
//! Each concern lives in its own submodule so the classifier and the name composer can be
//! tested without a repository or a rule index.

mod filters;
mod naming;
mod normalize;

pub use filters::{IgnoreClassifier, IgnoreConfig};
pub use naming::{compose_bundle_name, is_canonical_bundle_name};
pub use normalize::{
  extension, file_name, file_stem, normalize_asset_path, parent_folder, relative_to,
  scope_matches, strip_extension,
};
