//! Streaming JSON-array partitioning.
//!
//! Splits one large JSON document whose root is an array of objects into a
//! set of smaller, independently valid JSON-array files, routing each element
//! by a masked value of one designated top-level field.

pub mod error;
pub mod splitting;

pub use error::AppError;
pub use splitting::{
    mask_value, partition_path, remove_stale_partitions, split_file, split_file_blocking,
    SplitConfig, SplitResult, DEFAULT_MASK_LEN, UNGROUPED_BUCKET,
};
