//! Path resolution and derivative path layout.
//!
//! Relative paths stored on media rows use `/` separators regardless of
//! platform. Resolution is purely lexical: derivative paths are computed
//! before the file exists, so nothing here may require the target to be
//! present on disk.

use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use lumina_core::models::Variant;

use crate::{StorageError, StorageResult};

/// Resolve `relative` against `root`, rejecting any input whose resolved
/// path is not equal to or strictly nested under `root`.
///
/// Absolute inputs and `..` sequences that climb out of the root are both
/// rejected, no matter how the relative path was constructed upstream.
pub fn resolve_absolute(root: &Path, relative: &str) -> StorageResult<PathBuf> {
    let candidate = Path::new(relative);
    let mut resolved = root.to_path_buf();
    let mut depth: usize = 0;

    for component in candidate.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(StorageError::PathEscape(relative.to_string()));
                }
                resolved.pop();
                depth -= 1;
            }
            // An absolute relative_path is never legitimate
            Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::PathEscape(relative.to_string()));
            }
        }
    }

    debug_assert!(resolved.starts_with(root));
    Ok(resolved)
}

/// Derivative artifacts live next to their source's logical directory under
/// the derived root, keyed by media id and variant:
/// `{dir}/{media_id}-{variant}.{ext}`.
pub fn derivative_relative_path(
    media_relative_path: &str,
    media_id: Uuid,
    variant: Variant,
    ext: &str,
) -> String {
    let normalized = media_relative_path.replace('\\', "/");
    let file_name = format!("{}-{}.{}", media_id, variant, ext);
    match normalized.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => format!("{}/{}", dir, file_name),
        _ => file_name,
    }
}

/// Extension used for generated image derivatives.
pub const IMAGE_DERIVATIVE_EXT: &str = "webp";

/// Container extensions a playback derivative may have been encoded into.
pub const PLAYBACK_EXTS: [&str; 2] = ["mp4", "webm"];

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/data/lumina/originals")
    }

    #[test]
    fn resolves_nested_paths_under_root() {
        let abs = resolve_absolute(&root(), "a/b/c.jpg").unwrap();
        assert_eq!(abs, root().join("a/b/c.jpg"));
        assert!(abs.starts_with(root()));
    }

    #[test]
    fn rejects_parent_traversal() {
        assert!(matches!(
            resolve_absolute(&root(), "../../etc/passwd"),
            Err(StorageError::PathEscape(_))
        ));
        assert!(matches!(
            resolve_absolute(&root(), "a/../../b.jpg"),
            Err(StorageError::PathEscape(_))
        ));
    }

    #[test]
    fn rejects_absolute_input() {
        assert!(matches!(
            resolve_absolute(&root(), "/etc/passwd"),
            Err(StorageError::PathEscape(_))
        ));
    }

    #[test]
    fn interior_parent_components_stay_sandboxed() {
        // Climbs into a/ then back out to b.jpg, never leaving the root
        let abs = resolve_absolute(&root(), "a/../b.jpg").unwrap();
        assert_eq!(abs, root().join("b.jpg"));
    }

    #[test]
    fn current_dir_components_are_ignored() {
        let abs = resolve_absolute(&root(), "./a/./b.jpg").unwrap();
        assert_eq!(abs, root().join("a/b.jpg"));
    }

    #[test]
    fn derivative_path_is_deterministic() {
        let id = Uuid::parse_str("6f8f57e5-54d6-4b93-ae2c-3a1f0d2b9c11").unwrap();
        let first = derivative_relative_path("2026/03/cat.jpg", id, Variant::Thumb, "webp");
        let second = derivative_relative_path("2026/03/cat.jpg", id, Variant::Thumb, "webp");
        assert_eq!(first, second);
        assert_eq!(
            first,
            format!("2026/03/{}-thumb.webp", id)
        );
    }

    #[test]
    fn derivative_path_without_directory() {
        let id = Uuid::new_v4();
        assert_eq!(
            derivative_relative_path("cat.jpg", id, Variant::Small, "webp"),
            format!("{}-small.webp", id)
        );
    }

    #[test]
    fn derivative_path_normalizes_backslashes() {
        let id = Uuid::new_v4();
        assert_eq!(
            derivative_relative_path("a\\b\\cat.jpg", id, Variant::Playback, "mp4"),
            format!("a/b/{}-playback.mp4", id)
        );
    }
}
