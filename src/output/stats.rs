//! Statistics generation from the record database
//!
//! This module provides functionality for extracting and displaying
//! record statistics for `--stats`.

use crate::extract::EntityKind;
use crate::storage::{RunRecord, SqliteRecordStore, StorageResult};
use std::collections::HashMap;
use std::fmt::Write;

/// Number of domains listed in the report
const TOP_DOMAINS: usize = 10;

/// Record statistics summary
#[derive(Debug, Clone, Default)]
pub struct RecordStatistics {
    /// Total number of stored records
    pub total_records: u64,

    /// Count of records by entity kind
    pub records_by_kind: HashMap<EntityKind, u64>,

    /// Record count per quality value (0..=4), ascending
    pub quality_breakdown: Vec<(u8, u64)>,

    /// Number of distinct domains with at least one record
    pub unique_domains: u64,

    /// Domains with the most records
    pub top_domains: Vec<(String, u64)>,

    pub total_runs: u64,
    pub latest_run: Option<RunRecord>,
}

impl RecordStatistics {
    /// Mean quality over all records
    pub fn average_quality(&self) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        let sum: u64 = self
            .quality_breakdown
            .iter()
            .map(|(quality, count)| u64::from(*quality) * count)
            .sum();
        sum as f64 / self.total_records as f64
    }
}

/// Loads statistics from the record store
pub fn load_statistics(store: &SqliteRecordStore) -> StorageResult<RecordStatistics> {
    Ok(RecordStatistics {
        total_records: store.count_records()?,
        records_by_kind: store.count_by_kind()?,
        quality_breakdown: store.quality_breakdown()?,
        unique_domains: store.count_domains()?,
        top_domains: store.top_domains(TOP_DOMAINS)?,
        total_runs: store.count_runs()?,
        latest_run: store.get_latest_run()?,
    })
}

/// Formats statistics as a plain-text report
pub fn render_statistics(stats: &RecordStatistics) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_report(&mut out, stats);
    out
}

fn write_report(out: &mut String, stats: &RecordStatistics) -> std::fmt::Result {
    writeln!(out, "=== Record Statistics ===\n")?;

    writeln!(out, "Overview:")?;
    writeln!(out, "  Total records: {}", stats.total_records)?;
    writeln!(out, "  Unique domains: {}", stats.unique_domains)?;
    writeln!(out, "  Average quality: {:.2} / 4", stats.average_quality())?;
    writeln!(out, "  Crawl runs: {}", stats.total_runs)?;
    writeln!(out)?;

    writeln!(out, "Records by Kind:")?;
    let mut kinds: Vec<_> = stats.records_by_kind.iter().collect();
    kinds.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
    for (kind, count) in kinds {
        let percentage = if stats.total_records > 0 {
            (*count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        writeln!(out, "  {}: {} ({:.1}%)", kind.as_str(), count, percentage)?;
    }
    writeln!(out)?;

    if !stats.quality_breakdown.is_empty() {
        writeln!(out, "Quality:")?;
        for (quality, count) in &stats.quality_breakdown {
            writeln!(out, "  {}/4: {}", quality, count)?;
        }
        writeln!(out)?;
    }

    if !stats.top_domains.is_empty() {
        writeln!(out, "Top Domains:")?;
        for (domain, count) in &stats.top_domains {
            writeln!(out, "  - {} ({})", domain, count)?;
        }
        writeln!(out)?;
    }

    match &stats.latest_run {
        Some(run) => {
            writeln!(out, "Latest Run (#{}):", run.id)?;
            writeln!(out, "  Status: {}", run.status)?;
            writeln!(out, "  Started: {}", run.started_at)?;
            if let Some(finished) = &run.finished_at {
                writeln!(out, "  Finished: {}", finished)?;
            }
            writeln!(out, "  Pages visited: {}", run.pages_visited)?;
            writeln!(out, "  Records stored: {}", run.records_stored)?;
            if let Some(error) = &run.error_message {
                writeln!(out, "  Error: {}", error)?;
            }
        }
        None => writeln!(out, "No crawl runs recorded")?,
    }

    Ok(())
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &RecordStatistics) {
    print!("{}", render_statistics(stats));
}
