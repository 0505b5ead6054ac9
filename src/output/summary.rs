//! Markdown summary of a finished run

use crate::output::stats::StoreStatistics;
use crate::output::traits::{OutputResult, RunSummary};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of a run to `output_path`
///
/// # Arguments
///
/// * `run` - What the run itself did
/// * `store` - Totals across all runs, read from the store afterwards
/// * `output_path` - Path where the markdown file should be written
pub fn write_markdown_summary(
    run: &RunSummary,
    store: &StoreStatistics,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_summary(run, store);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(run: &RunSummary, store: &StoreStatistics) -> String {
    let stats = &run.stats;
    let mut md = String::new();

    md.push_str("# Catalog-Harvester Run Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", run.run_id));
    md.push_str(&format!("- **Status**: {}\n", run.status.to_db_string()));
    md.push_str(&format!(
        "- **Duration**: {:.1} seconds ({:.2} minutes)\n",
        run.elapsed.as_secs_f64(),
        run.elapsed.as_secs_f64() / 60.0
    ));
    md.push_str(&format!("- **Config Hash**: {}\n\n", run.config_hash));

    md.push_str("## Discovery\n\n");
    md.push_str("| Event | Count |\n");
    md.push_str("|-------|-------|\n");
    md.push_str(&format!("| Pages listed | {} |\n", stats.pages_listed));
    md.push_str(&format!("| Pages exhausted | {} |\n", stats.pages_exhausted));
    md.push_str(&format!("| Records discovered | {} |\n", stats.records_discovered));
    md.push_str(&format!("| Known from earlier runs | {} |\n", stats.records_known));
    md.push_str(&format!("| Enqueued | {} |\n\n", stats.records_enqueued));

    md.push_str("## Processing\n\n");
    md.push_str("| Event | Count |\n");
    md.push_str("|-------|-------|\n");
    md.push_str(&format!("| Claimed | {} |\n", stats.records_claimed));
    md.push_str(&format!(
        "| Already claimed | {} |\n",
        stats.records_already_claimed
    ));
    md.push_str(&format!("| Processed | {} |\n", stats.records_processed));
    md.push_str(&format!("| Exhausted | {} |\n", stats.records_exhausted));
    md.push_str(&format!("| Claims released | {} |\n", stats.claims_released));
    md.push_str(&format!(
        "\n- **Success Rate**: {:.2}%\n\n",
        run.success_rate()
    ));

    md.push_str("## Files\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Saved | {} |\n", stats.files_saved));
    md.push_str(&format!("| Duplicate content | {} |\n", stats.files_duplicate));
    md.push_str(&format!("| Failed | {} |\n", stats.files_failed));
    if stats.files_simulated > 0 {
        md.push_str(&format!("| Simulated | {} |\n", stats.files_simulated));
    }
    md.push_str(&format!(
        "| Filtered by keyword | {} |\n\n",
        stats.files_filtered
    ));

    md.push_str("## Store Totals\n\n");
    md.push_str(&format!("- **Claimed records**: {}\n", store.record_ids));
    md.push_str(&format!("- **Known content hashes**: {}\n", store.file_hashes));
    md.push_str(&format!("- **Committed downloads**: {}\n", store.downloads));
    if let Some(last) = store.last_sequence {
        md.push_str(&format!("- **Last sequence number**: {}\n", last));
    }

    md
}
