//! Output module for reports and run summaries
//!
//! This module handles:
//! - The append-only HTML report of processed records
//! - Markdown summaries of finished runs
//! - Statistics read back from the store

mod report;
pub mod stats;
mod summary;
mod traits;

pub use report::{format_block, read_report_links, HtmlReport};
pub use stats::{load_statistics, print_statistics, StoreStatistics};
pub use summary::{format_markdown_summary, write_markdown_summary};
pub use traits::{OutputError, OutputResult, ReportSink, RunSummary};
