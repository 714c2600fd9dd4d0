//! Streaming JSON-array splitting keyed by a masked grouping field.
//!
//! Reads the input one element at a time, computes a bucket key from the
//! configured grouping field, and routes each element to the destination
//! file for that key. Exactly one destination file is writable at any
//! instant; a bucket that recurs later in the input has its file reopened
//! and extended rather than recreated, so every file ends the run as a
//! complete, independently valid JSON array.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AppError;
use crate::splitting::array_stream::for_each_element;
use crate::splitting::bucket::{mask_value, partition_path, resolve_mask_len, UNGROUPED_BUCKET};
use crate::splitting::partition_file::PartitionHandle;
use crate::splitting::record::JsonNode;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for a split run.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Top-level field of each element whose value selects its bucket.
    pub group_field: String,
    /// Raw mask length: negative disables masking, 0 selects the default of 4.
    pub mask_len: i32,
}

impl SplitConfig {
    /// Creates a config for the given grouping field with the default mask.
    pub fn new(group_field: impl Into<String>) -> Self {
        Self {
            group_field: group_field.into(),
            mask_len: 0,
        }
    }

    /// Sets the raw mask length.
    pub fn mask_len(mut self, mask_len: i32) -> Self {
        self.mask_len = mask_len;
        self
    }
}

/// Result of splitting a JSON-array file into partitions.
#[derive(Debug, Clone, Serialize)]
pub struct SplitResult {
    /// Paths to the partition files, in first-touched order.
    pub partition_paths: Vec<PathBuf>,
    /// Total elements routed across all partitions.
    pub total_elements: u64,
    /// Elements per partition (parallel to `partition_paths`).
    pub elements_per_partition: Vec<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Splits a JSON-array file into per-bucket partition files.
///
/// # Arguments
///
/// * `input` - Path to the source file; its root must be an array of objects
/// * `out_dir` - Directory where partition files are created
/// * `config` - Grouping field and mask length
///
/// # Returns
///
/// A `SplitResult` with the partition paths and per-partition element counts.
///
/// # Errors
///
/// Returns [`AppError::InvalidInput`] for an empty grouping field,
/// [`AppError::RootNotArray`] when the input root is not an array, and the
/// read/write/rewrite variants for mid-run failures. Partition files
/// finalized before a failure remain valid JSON arrays on disk.
pub async fn split_file(
    input: &Path,
    out_dir: &Path,
    config: SplitConfig,
) -> Result<SplitResult, AppError> {
    tokio::fs::create_dir_all(out_dir).await.map_err(|e| {
        AppError::PartitionWriteError(format!("failed to create output directory: {}", e))
    })?;

    // Clone paths for the blocking closure
    let input = input.to_owned();
    let out_dir = out_dir.to_owned();

    // Run the blocking JSON processing in a separate thread
    tokio::task::spawn_blocking(move || split_file_blocking(&input, &out_dir, config))
        .await
        .map_err(|e| AppError::Internal(format!("task join error: {}", e)))?
}

/// Blocking implementation of the split run.
pub fn split_file_blocking(
    input: &Path,
    out_dir: &Path,
    config: SplitConfig,
) -> Result<SplitResult, AppError> {
    if config.group_field.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "grouping field must not be empty".to_string(),
        ));
    }

    let file = File::open(input).map_err(|e| {
        AppError::JsonReadError(format!("failed to open {}: {}", input.display(), e))
    })?;
    let reader = BufReader::new(file);

    #[cfg(debug_assertions)]
    tracing::debug!(
        input = %input.display(),
        field = %config.group_field,
        mask_len = config.mask_len,
        "Starting split run"
    );

    let mut session = PartitionSession::new(input, out_dir, &config);
    let outcome = for_each_element(reader, |element| session.route(element));

    match outcome {
        Ok(_) => {
            session.finish()?;

            #[cfg(debug_assertions)]
            tracing::debug!(
                total_elements = session.total_elements,
                partitions = session.partition_paths.len(),
                "Split run complete"
            );

            Ok(session.into_result())
        }
        Err(err) => {
            session.abort();
            Err(err)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run state
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable state for one split run.
///
/// Holds the currently open partition, the bucket registry that decides
/// create-vs-reopen without probing the filesystem, and per-partition element
/// counts.
struct PartitionSession {
    input: PathBuf,
    out_dir: PathBuf,
    group_field: String,
    mask_len: Option<usize>,
    current: Option<OpenPartition>,
    /// Bucket key -> index into the parallel result vectors. Presence means
    /// the bucket's file exists from an earlier session of this run.
    index_by_bucket: HashMap<String, usize>,
    partition_paths: Vec<PathBuf>,
    elements_per_partition: Vec<u64>,
    total_elements: u64,
    /// Reusable scratch buffer holding one serialized element per iteration.
    record_buf: Vec<u8>,
}

/// The partition currently accepting records.
struct OpenPartition {
    bucket: String,
    handle: PartitionHandle,
}

impl PartitionSession {
    fn new(input: &Path, out_dir: &Path, config: &SplitConfig) -> Self {
        Self {
            input: input.to_path_buf(),
            out_dir: out_dir.to_path_buf(),
            group_field: config.group_field.clone(),
            mask_len: resolve_mask_len(config.mask_len),
            current: None,
            index_by_bucket: HashMap::new(),
            partition_paths: Vec::new(),
            elements_per_partition: Vec::new(),
            total_elements: 0,
            record_buf: Vec::with_capacity(4096),
        }
    }

    /// Routes one element to its partition, switching destination files when
    /// the bucket key changes.
    fn route(&mut self, element: JsonNode) -> Result<(), AppError> {
        if !element.is_object() {
            return Err(AppError::JsonReadError(format!(
                "array element {} is not an object",
                self.total_elements
            )));
        }

        // One element per line; the element's own token stream is copied
        // unmodified.
        self.record_buf.clear();
        serde_json::to_writer(&mut self.record_buf, &element)
            .map_err(|e| AppError::JsonReadError(format!("failed to serialize element: {}", e)))?;
        self.record_buf.push(b'\n');

        let bucket = self.bucket_for(&element);
        let needs_switch = match &self.current {
            Some(open) => open.bucket != bucket,
            None => true,
        };
        if needs_switch {
            self.switch_to(bucket)?;
        }

        let open = match self.current.as_mut() {
            Some(open) => open,
            None => {
                return Err(AppError::Internal(
                    "no open partition after bucket switch".to_string(),
                ))
            }
        };
        open.handle.append_record(&self.record_buf)?;

        let idx = self.index_by_bucket[&open.bucket];
        self.elements_per_partition[idx] += 1;
        self.total_elements += 1;
        Ok(())
    }

    /// Computes the bucket key for an element from its grouping field.
    ///
    /// Strings are used as-is, numbers and booleans as their JSON text; an
    /// absent, `null`, or nested value routes to [`UNGROUPED_BUCKET`].
    fn bucket_for(&self, element: &JsonNode) -> String {
        let raw = match element.get(&self.group_field) {
            Some(JsonNode::String(s)) => Some(s.clone()),
            Some(JsonNode::Number(n)) => Some(n.to_string()),
            Some(JsonNode::Bool(b)) => Some(b.to_string()),
            None | Some(JsonNode::Null) => None,
            Some(_) => {
                tracing::warn!(
                    field = %self.group_field,
                    "Non-scalar grouping value, routing to the ungrouped bucket"
                );
                None
            }
        };

        match raw {
            Some(raw) => mask_value(&raw, self.mask_len),
            None => UNGROUPED_BUCKET.to_string(),
        }
    }

    /// Finalizes the open partition (if any) and opens the file for `bucket`:
    /// created on first touch, reopened on a later one.
    fn switch_to(&mut self, bucket: String) -> Result<(), AppError> {
        if let Some(open) = self.current.take() {
            open.handle.finalize()?;
        }

        let handle = match self.index_by_bucket.get(&bucket) {
            Some(&idx) => {
                let path = &self.partition_paths[idx];

                #[cfg(debug_assertions)]
                tracing::debug!(bucket = %bucket, path = %path.display(), "Reopening partition");

                PartitionHandle::reopen(path)?
            }
            None => {
                let path =
                    partition_path(&self.input, &self.out_dir, &self.group_field, &bucket);

                #[cfg(debug_assertions)]
                tracing::debug!(bucket = %bucket, path = %path.display(), "Creating partition");

                let handle = PartitionHandle::create(&path)?;
                self.index_by_bucket
                    .insert(bucket.clone(), self.partition_paths.len());
                self.partition_paths.push(path);
                self.elements_per_partition.push(0);
                handle
            }
        };

        self.current = Some(OpenPartition { bucket, handle });
        Ok(())
    }

    /// Finalizes whichever partition is open once the input array ends.
    fn finish(&mut self) -> Result<(), AppError> {
        if let Some(open) = self.current.take() {
            open.handle.finalize()?;
        }
        Ok(())
    }

    /// Best-effort finalize after a mid-run failure, so the open partition is
    /// not left without its closing bracket. A secondary failure here is
    /// logged and swallowed; the original error is the one surfaced.
    fn abort(&mut self) {
        if let Some(open) = self.current.take() {
            if let Err(err) = open.handle.finalize() {
                tracing::warn!(
                    bucket = %open.bucket,
                    error = %err,
                    "Failed to finalize open partition while aborting"
                );
            }
        }
    }

    fn into_result(self) -> SplitResult {
        SplitResult {
            partition_paths: self.partition_paths,
            total_elements: self.total_elements,
            elements_per_partition: self.elements_per_partition,
        }
    }
}
