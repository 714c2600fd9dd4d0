//! Streaming utilities for splitting large JSON-array files.
//!
//! This module routes each element of a top-level JSON array into a
//! destination file chosen by a masked ("bucketed") value of one designated
//! field, processing the input one element at a time so documents larger
//! than memory split safely. Every destination file is a complete valid JSON
//! array whenever it is not the currently open one.

mod array_stream;
mod bucket;
mod json_splitter;
mod partition_file;
mod record;

pub use bucket::{
    mask_value, partition_path, resolve_mask_len, DEFAULT_MASK_LEN, UNGROUPED_BUCKET,
};
pub use json_splitter::{split_file, split_file_blocking, SplitConfig, SplitResult};
pub use partition_file::{remove_stale_partitions, PartitionHandle};
