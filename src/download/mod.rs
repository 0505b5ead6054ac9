//! Download-commit pipeline for discovered attachments
//!
//! Fetching, verification, content deduplication, sequence numbering and the
//! final rename all live here. See [`pipeline`] for the commit flow.

mod naming;
mod pipeline;
mod sequence;
mod verify;

pub use naming::{
    final_name, is_forbidden_char, matches_keywords, parse_sequence_prefix, sanitize_name,
    truncate_name, MAX_NAME_BYTES,
};
pub use pipeline::{DownloadOutcome, DownloadPipeline, DownloadResult, DownloadSettings};
pub use sequence::SequenceCounter;
pub use verify::{sha256_hex, verify_staged};
