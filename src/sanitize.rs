//! Path and key sanitization shared by the content cache and the upload
//! service. Grounded on the bucket-name validation idiom in the teacher's
//! `s3/handlers.rs::is_valid_bucket_name`, generalized to the traversal-safe
//! path composition spec.md §4.3 requires.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Strips leading separators, folds interior separators to `_`, and maps
/// the empty/dot/dot-dot names to `"default"`.
pub fn sanitize_bucket_component(bucket: &str) -> String {
    let trimmed = bucket.trim_start_matches(['/', '\\']);
    let folded: String = trimmed
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();

    match folded.as_str() {
        "" | "." | ".." => "default".to_string(),
        _ => folded,
    }
}

/// `cacheRoot / sanitize(bucket) / hex(sha256(objectKey))`, with a final
/// defense-in-depth check: if the resolved path somehow escapes
/// `cache_root`, the bucket component is forced to `"default"`.
pub fn cache_path_for(cache_root: &Path, bucket: &str, object_key: &str) -> PathBuf {
    let hash = hex_digest(object_key.as_bytes());
    let sanitized_bucket = sanitize_bucket_component(bucket);
    let candidate = cache_root.join(&sanitized_bucket).join(&hash);

    if path_escapes_root(cache_root, &candidate) {
        cache_root.join("default").join(&hash)
    } else {
        candidate
    }
}

fn path_escapes_root(root: &Path, candidate: &Path) -> bool {
    // Purely lexical: the candidate is freshly composed from a sanitized
    // component plus a hex digest, so string-prefix comparison (rather
    // than canonicalize, which would require the path to already exist)
    // is sufficient to catch a sanitize() bug letting a separator through.
    let root_str = root.to_string_lossy();
    let candidate_str = candidate.to_string_lossy();
    let prefix = format!("{}{}", root_str.trim_end_matches('/'), std::path::MAIN_SEPARATOR);
    !candidate_str.starts_with(&prefix)
}

fn hex_digest(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Trims whitespace, strips a leading `/`, collapses repeated `/`, and
/// rejects any `.`/`..` path segment by returning `None`.
pub fn sanitize_object_path(path: &str) -> Option<String> {
    let trimmed = path.trim();
    let stripped = trimmed.trim_start_matches('/');

    let mut segments = Vec::new();
    for segment in stripped.split('/') {
        if segment.is_empty() {
            continue;
        }
        if segment == "." || segment == ".." {
            return None;
        }
        segments.push(segment);
    }

    if segments.is_empty() {
        return None;
    }

    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_bucket_empty_variants_map_to_default() {
        assert_eq!(sanitize_bucket_component(""), "default");
        assert_eq!(sanitize_bucket_component("."), "default");
        assert_eq!(sanitize_bucket_component(".."), "default");
    }

    #[test]
    fn sanitize_bucket_strips_leading_and_folds_interior_separators() {
        assert_eq!(sanitize_bucket_component("/a/b"), "a_b");
        assert_eq!(sanitize_bucket_component("../evil"), ".._evil");
    }

    #[test]
    fn cache_path_is_always_under_root() {
        let root = Path::new("/var/cache/content");
        let path = cache_path_for(root, "../evil", "ok");
        assert!(path.starts_with(root));
    }

    #[test]
    fn cache_path_is_deterministic_and_content_addressed() {
        let root = Path::new("/var/cache/content");
        let a = cache_path_for(root, "bucket", "key");
        let b = cache_path_for(root, "bucket", "key");
        assert_eq!(a, b);
        let c = cache_path_for(root, "bucket", "other-key");
        assert_ne!(a, c);
    }

    #[test]
    fn sanitize_object_path_rejects_dot_segments() {
        assert_eq!(sanitize_object_path("a/../b"), None);
        assert_eq!(sanitize_object_path("../evil"), None);
        assert_eq!(sanitize_object_path("./ok"), None);
    }

    #[test]
    fn sanitize_object_path_collapses_slashes_and_trims() {
        assert_eq!(sanitize_object_path("  /a//b/c  "), Some("a/b/c".to_string()));
    }

    #[test]
    fn sanitize_object_path_rejects_empty() {
        assert_eq!(sanitize_object_path(""), None);
        assert_eq!(sanitize_object_path("///"), None);
    }

    #[test]
    fn sanitize_object_path_is_idempotent() {
        let inputs = ["a/b/c", "  /x//y  ", "single"];
        for input in inputs {
            if let Some(once) = sanitize_object_path(input) {
                let twice = sanitize_object_path(&once);
                assert_eq!(Some(once), twice);
            }
        }
    }
}
