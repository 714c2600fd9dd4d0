use thiserror::Error;

/// Application-wide error type.
///
/// Each variant corresponds to one failure stage of a split run, so callers
/// can report which stage failed rather than a single generic condition.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Entry preconditions ───────────────────────────────────────────────────
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ── Structural ────────────────────────────────────────────────────────────
    #[error("Input root is not a JSON array")]
    RootNotArray,

    // ── Read ──────────────────────────────────────────────────────────────────
    #[error("JSON read error: {0}")]
    JsonReadError(String),

    // ── Write ─────────────────────────────────────────────────────────────────
    #[error("Partition write error: {0}")]
    PartitionWriteError(String),

    // ── Rewrite ───────────────────────────────────────────────────────────────
    #[error("Bracket rewrite error: {0}")]
    BracketRewriteError(String),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns all AppError variants for exhaustive testing.
    fn all_variants() -> Vec<AppError> {
        vec![
            AppError::InvalidInput("grouping field must not be empty".into()),
            AppError::RootNotArray,
            AppError::JsonReadError("unexpected end of input".into()),
            AppError::PartitionWriteError("disk full".into()),
            AppError::BracketRewriteError("file does not end with a closing bracket".into()),
            AppError::Internal("task join error".into()),
        ]
    }

    #[test]
    fn all_variants_have_nonempty_messages() {
        for variant in all_variants() {
            assert!(
                !variant.to_string().trim().is_empty(),
                "Empty message for {:?}",
                variant
            );
        }
    }

    #[test]
    fn stages_render_distinct_messages() {
        let messages: Vec<String> = all_variants().iter().map(|v| v.to_string()).collect();
        for (i, a) in messages.iter().enumerate() {
            for b in messages.iter().skip(i + 1) {
                assert_ne!(a, b, "Two error stages render the same message");
            }
        }
    }
}
