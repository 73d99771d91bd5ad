//! Run-level aggregation and the final report.

use crate::batch::{BatchReport, BatchStats};
use chrono::{DateTime, Local};
use std::fmt;
use tagsync_catalog_client::TagFqn;

/// Why an application was not processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The application's tag does not exist in the catalog
    MissingTag(TagFqn),
    /// No mapping entry (or scope) for the application
    NoMapping,
    /// Schema listing came back empty
    NoTables(String),
    /// The tag existence check itself failed
    TagLookupFailed(String),
    /// Listing the schema's tables failed
    ListingFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingTag(tag) => write!(f, "missing tag {}", tag),
            SkipReason::NoMapping => f.write_str("no mapping entry"),
            SkipReason::NoTables(schema) => write!(f, "no tables found in {}", schema),
            SkipReason::TagLookupFailed(e) => write!(f, "tag lookup failed: {}", e),
            SkipReason::ListingFailed(e) => write!(f, "table listing failed: {}", e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedApplication {
    pub key: String,
    /// Tag FQN, or owner reference for owner runs
    pub target: String,
    pub report: BatchReport,
}

#[derive(Debug, Clone)]
pub struct SkippedApplication {
    pub key: String,
    pub reason: SkipReason,
}

/// Accumulates per-application results into run totals.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub operation: String,
    pub dry_run: bool,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub processed: Vec<ProcessedApplication>,
    pub skipped: Vec<SkippedApplication>,
    pub totals: BatchStats,
}

impl RunSummary {
    pub fn new(operation: impl Into<String>, dry_run: bool) -> Self {
        Self {
            operation: operation.into(),
            dry_run,
            started_at: Local::now(),
            finished_at: None,
            processed: Vec::new(),
            skipped: Vec::new(),
            totals: BatchStats::default(),
        }
    }

    /// Record an application whose entities were worked through.
    pub fn record_processed(
        &mut self,
        key: impl Into<String>,
        target: impl fmt::Display,
        report: BatchReport,
    ) {
        let key = key.into();
        let target = target.to_string();
        let s = &report.stats;
        tracing::info!(
            application = %key,
            target = %target,
            dry_run = self.dry_run,
            total = s.total_tables,
            already_tagged = s.already_tagged,
            applied = s.newly_tagged,
            simulated = s.simulated,
            failed = s.failed_tag_applications,
            missing = s.missing_tables,
            "Application complete"
        );
        self.totals += &report.stats;
        self.processed.push(ProcessedApplication {
            key,
            target,
            report,
        });
    }

    /// Record an application skipped before any entity work.
    pub fn record_skipped(&mut self, key: impl Into<String>, reason: SkipReason) {
        let key = key.into();
        tracing::warn!(application = %key, reason = %reason, "Skipping application");
        self.skipped.push(SkippedApplication { key, reason });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    /// Applications skipped because their tag is missing, with the tag.
    pub fn missing_tags(&self) -> Vec<(&str, &TagFqn)> {
        self.skipped
            .iter()
            .filter_map(|s| match &s.reason {
                SkipReason::MissingTag(tag) => Some((s.key.as_str(), tag)),
                _ => None,
            })
            .collect()
    }

    /// Entities whose patch was sent (or would be, in a dry run).
    pub fn changed(&self) -> usize {
        self.totals.newly_tagged + self.totals.simulated
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.dry_run { " (DRY RUN)" } else { "" };
        let applied_label = if self.dry_run { "Would apply" } else { "Applied" };

        writeln!(f, "=== {} summary{} ===", self.operation, mode)?;
        writeln!(
            f,
            "Started: {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        if let Some(finished) = self.finished_at {
            writeln!(f, "Finished: {}", finished.format("%Y-%m-%d %H:%M:%S"))?;
        }

        writeln!(f, "Applications processed: {}", self.processed.len())?;
        for app in &self.processed {
            let s = &app.report.stats;
            writeln!(
                f,
                "  - {} [{}]: {} tables, {} already tagged, {} {}, {} failed, {} missing",
                app.key,
                app.target,
                s.total_tables,
                s.already_tagged,
                s.newly_tagged + s.simulated,
                applied_label.to_lowercase(),
                s.failed_tag_applications,
                s.missing_tables
            )?;
        }

        writeln!(f, "Applications skipped: {}", self.skipped.len())?;
        for skip in &self.skipped {
            writeln!(f, "  - {}: {}", skip.key, skip.reason)?;
        }

        let missing = self.missing_tags();
        if !missing.is_empty() {
            writeln!(f, "Missing tags:")?;
            for (key, tag) in missing {
                writeln!(f, "  - Application: {}", key)?;
                writeln!(f, "    Missing Tag: {}", tag)?;
            }
        }

        let t = &self.totals;
        writeln!(f, "Total tables: {}", t.total_tables)?;
        writeln!(f, "Existing tables: {}", t.existing_tables)?;
        writeln!(f, "Missing tables: {}", t.missing_tables)?;
        writeln!(f, "Already tagged: {}", t.already_tagged)?;
        writeln!(f, "{}: {}", applied_label, self.changed())?;
        write!(f, "Failed: {}", t.failed_tag_applications)
    }
}
