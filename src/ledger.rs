//! Task ledger
//!
//! A JSON file of task rows doubles as the input queue and the output
//! ledger. Rows marked completed are skipped on re-run, so an interrupted
//! batch picks up where it left off.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::audit::AuditOutcome;
use crate::rank::RankOutcome;

/// Status value marking a fully processed row.
pub const STATUS_COMPLETED: &str = "Completed";

/// One keyword to process, plus its result columns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskRow {
    /// Search query
    pub keyword: String,
    /// URL or domain fragment to look for in the results
    pub target: String,
    /// Rank column ("Not Found" when absent)
    pub rank: String,
    /// Exact URL found at that rank
    pub ranking_url: String,
    /// Keyword flagged for deletion
    pub deletion_keyword: String,
    /// Page flagged for title and meta work
    pub title_meta_url: String,
    /// Page flagged for content work
    pub content_url: String,
    /// Processing status
    pub status: String,
    /// When the row was completed
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRow {
    pub fn new(keyword: &str, target: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            target: target.to_string(),
            ..Default::default()
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }

    /// Rows without both a keyword and a target cannot be processed.
    pub fn is_actionable(&self) -> bool {
        !self.keyword.trim().is_empty() && !self.target.trim().is_empty()
    }
}

/// Ledger I/O errors. Failing to read the ledger at startup is fatal.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to read task ledger {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Task ledger {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Failed to write task ledger {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// The row collection and its backing file.
pub struct TaskLedger {
    path: PathBuf,
    rows: Vec<TaskRow>,
}

impl TaskLedger {
    /// Load all rows from the ledger file.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|source| LedgerError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let rows: Vec<TaskRow> =
            serde_json::from_str(&content).map_err(|source| LedgerError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        info!("Loaded {} task row(s) from {}", rows.len(), path.display());
        Ok(Self { path, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> &TaskRow {
        &self.rows[index]
    }

    pub fn rows(&self) -> &[TaskRow] {
        &self.rows
    }

    /// Write the rank columns for a row.
    pub fn record_rank(&mut self, index: usize, outcome: &RankOutcome) {
        let row = &mut self.rows[index];
        row.rank = outcome.rank_label();
        row.ranking_url = outcome.url().to_string();
    }

    /// Write the audit columns for a row. The three outcome columns are
    /// cleared first so a re-audit never leaves stale values behind.
    pub fn record_audit(&mut self, index: usize, outcome: &AuditOutcome) {
        let row = &mut self.rows[index];
        row.deletion_keyword.clear();
        row.title_meta_url.clear();
        row.content_url.clear();

        match outcome {
            AuditOutcome::Deletion { keyword } => row.deletion_keyword = keyword.clone(),
            AuditOutcome::TitleMetaIssue { url } => row.title_meta_url = url.clone(),
            AuditOutcome::ContentIssue { url } => row.content_url = url.clone(),
            AuditOutcome::LowProductCount { .. } | AuditOutcome::Optimized { .. } => {}
        }
    }

    /// Mark a row as fully processed.
    pub fn mark_completed(&mut self, index: usize) {
        let row = &mut self.rows[index];
        row.status = STATUS_COMPLETED.to_string();
        row.completed_at = Some(Utc::now());
    }

    /// Persist all rows back to the ledger file.
    pub fn save(&self) -> Result<(), LedgerError> {
        let content = serde_json::to_string_pretty(&self.rows).map_err(|source| {
            LedgerError::Parse {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        std::fs::write(&self.path, content).map_err(|source| LedgerError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_ledger(name: &str, rows: &[TaskRow]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "rank-auditor-test-{}-{}.json",
            std::process::id(),
            name
        ));
        std::fs::write(&path, serde_json::to_string_pretty(rows).unwrap()).unwrap();
        path
    }

    #[test]
    fn loads_and_saves_roundtrip() {
        let path = temp_ledger(
            "roundtrip",
            &[
                TaskRow::new("red shoes", "shop.example"),
                TaskRow::new("blue hats", "shop.example"),
            ],
        );

        let mut ledger = TaskLedger::load(&path).unwrap();
        assert_eq!(ledger.len(), 2);

        ledger.record_rank(
            0,
            &RankOutcome::Found {
                rank: 3,
                url: "https://shop.example/red".to_string(),
            },
        );
        ledger.mark_completed(0);
        ledger.save().unwrap();

        let reloaded = TaskLedger::load(&path).unwrap();
        assert_eq!(reloaded.row(0).rank, "3");
        assert_eq!(reloaded.row(0).ranking_url, "https://shop.example/red");
        assert!(reloaded.row(0).is_completed());
        assert!(reloaded.row(0).completed_at.is_some());
        assert!(!reloaded.row(1).is_completed());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn audit_outcomes_map_to_their_columns() {
        let mut row = TaskRow::new("red shoes", "shop.example");
        row.deletion_keyword = "stale".to_string();
        let path = temp_ledger("columns", &[row]);
        let mut ledger = TaskLedger::load(&path).unwrap();

        ledger.record_audit(
            0,
            &AuditOutcome::TitleMetaIssue {
                url: "https://site.test/shop".to_string(),
            },
        );
        // Old values cleared, only the matching column set.
        assert_eq!(ledger.row(0).deletion_keyword, "");
        assert_eq!(ledger.row(0).title_meta_url, "https://site.test/shop");
        assert_eq!(ledger.row(0).content_url, "");

        ledger.record_audit(
            0,
            &AuditOutcome::Deletion {
                keyword: "red shoes".to_string(),
            },
        );
        assert_eq!(ledger.row(0).deletion_keyword, "red shoes");
        assert_eq!(ledger.row(0).title_meta_url, "");

        ledger.record_audit(
            0,
            &AuditOutcome::Optimized {
                detail: "All checks passed".to_string(),
            },
        );
        assert_eq!(ledger.row(0).deletion_keyword, "");
        assert_eq!(ledger.row(0).title_meta_url, "");
        assert_eq!(ledger.row(0).content_url, "");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn not_found_rows_record_the_sentinel() {
        let path = temp_ledger("sentinel", &[TaskRow::new("red shoes", "shop.example")]);
        let mut ledger = TaskLedger::load(&path).unwrap();

        ledger.record_rank(0, &RankOutcome::NotFound);
        assert_eq!(ledger.row(0).rank, "Not Found");
        assert_eq!(ledger.row(0).ranking_url, "");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn blank_rows_are_not_actionable() {
        assert!(!TaskRow::new("", "shop.example").is_actionable());
        assert!(!TaskRow::new("red shoes", "  ").is_actionable());
        assert!(TaskRow::new("red shoes", "shop.example").is_actionable());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(TaskLedger::load("/nonexistent/rank-auditor-tasks.json").is_err());
    }
}
