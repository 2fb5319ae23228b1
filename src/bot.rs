//! Batch runner
//!
//! Walks the task ledger row by row: rank phase, internal search, on-page
//! audit, write-back. One browser session, strictly sequential. Row-level
//! failures are logged and counted; the batch keeps going.

use tracing::{error, info, warn};

use crate::audit::{site_search, AuditFunnel};
use crate::browser::PageSession;
use crate::ledger::{TaskLedger, TaskRow};
use crate::notify::Notifier;
use crate::pacing::{DelayKind, DelayPolicy};
use crate::rank::{CaptchaGate, DetourEngine, RankConfig, RankFinder, SearchTask};
use crate::stats::{RunStats, RunStatsSnapshot};
use crate::AppConfig;

/// Drives the whole batch against one browser session.
pub struct Automator<'a> {
    page: &'a dyn PageSession,
    config: &'a AppConfig,
    notifier: &'a dyn Notifier,
    ledger: TaskLedger,
    delays: DelayPolicy,
    detour: DetourEngine,
    stats: RunStats,
}

impl<'a> Automator<'a> {
    pub fn new(
        page: &'a dyn PageSession,
        config: &'a AppConfig,
        notifier: &'a dyn Notifier,
        ledger: TaskLedger,
    ) -> Self {
        let delays = DelayPolicy::new(config.delays.clone(), config.rng_seed);
        let detour = DetourEngine::new(
            config.serp.decoy_tabs.clone(),
            config.detour_probability,
            config.rng_seed,
        );
        Self {
            page,
            config,
            notifier,
            ledger,
            delays,
            detour,
            stats: RunStats::new(),
        }
    }

    /// Process every pending row, then report the run counters.
    pub async fn run(mut self) -> RunStatsSnapshot {
        let total = self.ledger.len();
        info!("Starting batch of {} row(s)", total);

        for index in 0..total {
            let row = self.ledger.row(index).clone();

            if row.is_completed() {
                info!(
                    "Skipping row {} ('{}'), already marked completed",
                    index + 1,
                    row.keyword
                );
                self.stats.record_skipped();
                continue;
            }
            if !row.is_actionable() {
                warn!("Skipping row {}: keyword or target is missing", index + 1);
                self.stats.record_skipped();
                continue;
            }

            info!("{}", "=".repeat(80));
            info!(">>> Processing {}/{}: '{}'", index + 1, total, row.keyword);
            info!("{}", "=".repeat(80));

            self.process_row(index, &row).await;

            info!("Taking a break before the next keyword");
            self.delays.pause(DelayKind::RowBreak).await;
        }

        let snapshot = self.stats.snapshot();
        info!("Batch finished: {:?}", snapshot);
        snapshot
    }

    async fn process_row(&mut self, index: usize, row: &TaskRow) {
        self.stats.record_processed();
        let task = SearchTask::new(&row.keyword, &row.target);

        // Phase 1: engine ranking
        let outcome = {
            let mut finder = RankFinder {
                page: self.page,
                serp: &self.config.serp,
                config: RankConfig {
                    search_url: self.config.search_url.clone(),
                    max_pages: self.config.max_pages,
                    input_wait: self.config.input_wait(),
                    scan_wait: self.config.scan_wait(),
                },
                gate: CaptchaGate::from_config(
                    self.config.serp.captcha_marker.as_str(),
                    &self.config.captcha,
                ),
                delays: &mut self.delays,
                detour: &mut self.detour,
                notifier: self.notifier,
            };
            finder.find_rank(&task).await
        };

        if outcome.is_found() {
            self.stats.record_rank_found();
        } else {
            self.stats.record_rank_not_found();
        }
        self.ledger.record_rank(index, &outcome);
        self.persist();

        // Phase 2: internal search and audit
        let start_url = if outcome.is_found() {
            outcome.url().to_string()
        } else {
            self.config.fallback_url.clone()
        };
        let page_to_analyze = site_search::run(
            self.page,
            &self.config.site,
            &task.keyword,
            &start_url,
            self.config.site_wait(),
        )
        .await;

        info!("Re-navigating to {} for the audit", page_to_analyze);
        if let Err(e) = self.page.goto(&page_to_analyze).await {
            error!("Could not open the audit page for '{}': {}", row.keyword, e);
            self.stats.record_task_error();
            return;
        }
        match self.page.wait_for("body", self.config.site_wait()).await {
            Ok(true) => {}
            Ok(false) => warn!("Audit page body never appeared, auditing anyway"),
            Err(e) => {
                error!("Audit page did not load for '{}': {}", row.keyword, e);
                self.stats.record_task_error();
                return;
            }
        }

        let funnel = AuditFunnel::new(self.page, &self.config.site, &self.config.audit);
        let audit = funnel.classify(&task.keyword, &page_to_analyze).await;
        info!("Audit verdict for '{}': {}", row.keyword, audit.status());
        self.stats.record_audit(&audit);

        // Phase 3: write-back and completion marker
        self.ledger.record_audit(index, &audit);
        self.ledger.mark_completed(index);
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.ledger.save() {
            error!("Failed to save the task ledger: {}", e);
        }
    }
}
