//! Bucket-key masking and destination-file naming.
//!
//! A bucket key is derived from the grouping field's raw text by replacing
//! its trailing characters with `x`. Each distinct bucket key maps to exactly
//! one destination file in the output directory.

use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Mask length used when the caller passes 0 ("use default").
pub const DEFAULT_MASK_LEN: usize = 4;

/// Reserved bucket for elements whose grouping field is absent, `null`, or
/// not a scalar. Never passed through the mask, so it cannot collide with a
/// legitimate empty-string or masked value.
pub const UNGROUPED_BUCKET: &str = "__ungrouped__";

// ─────────────────────────────────────────────────────────────────────────────
// Masking
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves a raw mask-length setting.
///
/// Negative disables masking entirely, `0` selects [`DEFAULT_MASK_LEN`], and
/// any positive value is used as-is.
pub fn resolve_mask_len(raw: i32) -> Option<usize> {
    match raw {
        n if n < 0 => None,
        0 => Some(DEFAULT_MASK_LEN),
        n => Some(n as usize),
    }
}

/// Computes the bucket key for a grouping-field value.
///
/// Replaces the value's last `mask_len` characters with `x` repeated that
/// many times; values shorter than the mask are returned unchanged, and
/// `None` disables masking. Operates on characters rather than bytes so
/// multi-byte values mask cleanly.
pub fn mask_value(value: &str, mask_len: Option<usize>) -> String {
    let Some(mask_len) = mask_len else {
        return value.to_string();
    };

    let char_count = value.chars().count();
    if char_count < mask_len {
        return value.to_string();
    }

    let mut masked: String = value.chars().take(char_count - mask_len).collect();
    masked.extend(std::iter::repeat('x').take(mask_len));
    masked
}

// ─────────────────────────────────────────────────────────────────────────────
// Naming
// ─────────────────────────────────────────────────────────────────────────────

/// Base name of the input file, without directory or extension.
pub(crate) fn input_stem(input: &Path) -> &str {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
}

/// Extension of the input file, reattached to every destination file.
pub(crate) fn input_extension(input: &Path) -> &str {
    input.extension().and_then(|s| s.to_str()).unwrap_or("json")
}

/// Replaces path separators and control characters in a bucket key with `_`
/// so the key always stays a single file-name component. With masking
/// disabled the grouping field's raw text reaches the file name, and a value
/// like `../evil` must not resolve outside the output directory.
fn sanitize_component(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if std::path::is_separator(c) || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Builds the destination path for one bucket:
/// `<input-base-name>__<field>_<bucket>.<original-extension>`.
pub fn partition_path(input: &Path, out_dir: &Path, field: &str, bucket: &str) -> PathBuf {
    out_dir.join(format!(
        "{}__{}_{}.{}",
        input_stem(input),
        field,
        sanitize_component(bucket),
        input_extension(input)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_longer_than_mask_len() {
        assert_eq!(mask_value("ABC123456", Some(4)), "ABC12xxxx");
    }

    #[test]
    fn test_mask_shorter_value_unchanged() {
        assert_eq!(mask_value("AB", Some(4)), "AB");
    }

    #[test]
    fn test_mask_equal_length_fully_masked() {
        assert_eq!(mask_value("ABCD", Some(4)), "xxxx");
    }

    #[test]
    fn test_mask_disabled_is_identity() {
        assert_eq!(mask_value("ABC123456", None), "ABC123456");
        assert_eq!(mask_value("", None), "");
    }

    #[test]
    fn test_mask_empty_value() {
        // Empty string is shorter than any positive mask, so it stays empty.
        assert_eq!(mask_value("", Some(4)), "");
    }

    #[test]
    fn test_mask_is_idempotent() {
        let once = mask_value("ABC123456", Some(4));
        let twice = mask_value(&once, Some(4));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_mask_counts_characters_not_bytes() {
        // Four two-byte characters plus a prefix: only the last four
        // characters are replaced.
        assert_eq!(mask_value("idéééé", Some(4)), "idxxxx");
    }

    #[test]
    fn test_resolve_mask_len() {
        assert_eq!(resolve_mask_len(-1), None);
        assert_eq!(resolve_mask_len(-7), None);
        assert_eq!(resolve_mask_len(0), Some(DEFAULT_MASK_LEN));
        assert_eq!(resolve_mask_len(2), Some(2));
    }

    #[test]
    fn test_partition_path_naming() {
        let path = partition_path(
            Path::new("/data/export.json"),
            Path::new("/out"),
            "AccountId",
            "ABC12xxxx",
        );
        assert_eq!(
            path,
            Path::new("/out/export__AccountId_ABC12xxxx.json")
        );
    }

    #[test]
    fn test_partition_path_defaults_extension() {
        let path = partition_path(Path::new("export"), Path::new("/out"), "F", "X");
        assert_eq!(path, Path::new("/out/export__F_X.json"));
    }

    #[test]
    fn test_partition_path_separator_in_bucket_stays_in_out_dir() {
        let path = partition_path(
            Path::new("/data/export.json"),
            Path::new("/out"),
            "F",
            "../evil",
        );
        assert_eq!(path, Path::new("/out/export__F_.._evil.json"));
    }

    #[test]
    fn test_sanitize_component_replaces_hostile_characters() {
        assert_eq!(sanitize_component("a/b\\c\nd"), "a_b_c_d");
        assert_eq!(sanitize_component("plain-value"), "plain-value");
    }
}
