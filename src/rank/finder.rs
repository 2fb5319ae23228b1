//! Rank search orchestration
//!
//! One `find_rank` call drives the whole sequence for a task: submit the
//! query like a human would, optionally detour, then scan and paginate under
//! the CAPTCHA gate. Whatever goes wrong inside is contained here and comes
//! out as a not-found outcome; a single bad keyword never kills the batch.

use std::time::Duration;

use tracing::{error, info, warn};

use super::captcha::CaptchaGate;
use super::detour::DetourEngine;
use super::scanner::scan_page;
use super::{RankOutcome, SearchTask};
use crate::browser::{PageSession, SessionError};
use crate::notify::Notifier;
use crate::pacing::{DelayKind, DelayPolicy};
use crate::selectors::SerpSelectors;

/// Results per page assumed by the contiguous rank numbering.
const RESULTS_PER_PAGE: u32 = 10;

/// Fixed settings for one batch of rank searches
#[derive(Debug, Clone)]
pub struct RankConfig {
    /// Search engine entry point
    pub search_url: String,
    /// Maximum results pages to scan per task
    pub max_pages: u32,
    /// Wait budget for the query input to appear
    pub input_wait: Duration,
    /// Wait budget for result containers to appear
    pub scan_wait: Duration,
}

/// Drives the end-to-end rank search for one task at a time.
pub struct RankFinder<'a> {
    pub page: &'a dyn PageSession,
    pub serp: &'a SerpSelectors,
    pub config: RankConfig,
    pub gate: CaptchaGate,
    pub delays: &'a mut DelayPolicy,
    pub detour: &'a mut DetourEngine,
    pub notifier: &'a dyn Notifier,
}

impl RankFinder<'_> {
    /// Find the target's organic rank for the task keyword.
    ///
    /// Never fails: unexpected errors are logged with the keyword and
    /// reported as [`RankOutcome::NotFound`].
    pub async fn find_rank(&mut self, task: &SearchTask) -> RankOutcome {
        info!(
            "Looking up rank for '{}' (target: {})",
            task.keyword, task.target
        );
        match self.run(task).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    "Unexpected failure during rank search for '{}': {}",
                    task.keyword, e
                );
                RankOutcome::NotFound
            }
        }
    }

    async fn run(&mut self, task: &SearchTask) -> Result<RankOutcome, SessionError> {
        self.page.goto(&self.config.search_url).await?;
        self.delays.pause(DelayKind::PostNav).await;

        if !self
            .page
            .wait_for(&self.serp.query_input, self.config.input_wait)
            .await?
        {
            warn!(
                "Search input never appeared, skipping keyword '{}'",
                task.keyword
            );
            return Ok(RankOutcome::NotFound);
        }

        self.page.clear(&self.serp.query_input).await?;
        for ch in task.keyword.chars() {
            self.page
                .type_text(&self.serp.query_input, &ch.to_string())
                .await?;
            self.delays.pause(DelayKind::Keystroke).await;
        }
        self.page.press_enter(&self.serp.query_input).await?;
        self.delays.pause(DelayKind::PostNav).await;

        self.detour
            .maybe_perform(self.page, self.serp, &task.target, self.delays)
            .await;

        let mut offset = 0u32;
        for page_num in 1..=self.config.max_pages {
            info!(
                "--- Scanning page {} for '{}' (simulating reading) ---",
                page_num, task.keyword
            );
            self.delays.pause(DelayKind::SerpRead).await;

            if self.page.is_present(&self.serp.captcha_marker).await? {
                if !self
                    .gate
                    .resolve(self.page, self.notifier, &task.keyword)
                    .await
                {
                    // Challenge never cleared; give up on this task only.
                    return Ok(RankOutcome::NotFound);
                }
            }

            if let Some(hit) = scan_page(
                self.page,
                self.serp,
                &task.target,
                offset,
                self.config.scan_wait,
            )
            .await
            {
                info!(
                    "Found '{}' at rank {} on page {}: {}",
                    task.target, hit.rank, page_num, hit.url
                );
                return Ok(RankOutcome::Found {
                    rank: hit.rank,
                    url: hit.url,
                });
            }

            if !self.page.is_present(&self.serp.next_page).await? {
                info!("No next-page control, reached the end of results");
                break;
            }
            self.delays.pause(DelayKind::PrePagination).await;
            self.page.click_js(&self.serp.next_page).await?;
            offset += RESULTS_PER_PAGE;
        }

        info!(
            "Finished scanning for '{}', target not found",
            task.keyword
        );
        Ok(RankOutcome::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakePage, FakeSession};
    use crate::browser::ResultBlock;
    use crate::notify::NullNotifier;
    use crate::pacing::{DelayConfig, DelayRange};

    const INPUT: &str = "[name='q']";
    const NEXT: &str = "a#pnnext";
    const CONTAINER: &str = "div#search div.g";
    const CAPTCHA: &str = "iframe[title='reCAPTCHA']";

    fn tiny_delays() -> DelayPolicy {
        let range = DelayRange::new(1, 2);
        let config = DelayConfig {
            typing: range,
            after_page_load: range,
            serp_read: range,
            before_next_page: range,
            detour_view: range,
            back_settle: range,
            row_break: range,
        };
        DelayPolicy::new(config, Some(5))
    }

    fn fast_gate() -> CaptchaGate {
        CaptchaGate::new(
            CAPTCHA,
            Duration::from_millis(5),
            Duration::from_millis(25),
        )
    }

    fn config(max_pages: u32) -> RankConfig {
        RankConfig {
            search_url: "https://www.google.com".to_string(),
            max_pages,
            input_wait: Duration::from_millis(50),
            scan_wait: Duration::from_millis(50),
        }
    }

    fn organic(href: &str) -> ResultBlock {
        ResultBlock {
            heading: Some("entry".to_string()),
            href: Some(href.to_string()),
            is_ad: false,
        }
    }

    fn home_page() -> FakePage {
        FakePage::new("https://www.google.com/").with_present(INPUT)
    }

    fn serp(blocks: Vec<ResultBlock>, has_next: bool) -> FakePage {
        let mut page = FakePage::new("https://www.google.com/search")
            .with_present(CONTAINER)
            .with_blocks(blocks);
        if has_next {
            page = page.with_present(NEXT);
        }
        page
    }

    async fn run_finder(
        session: &FakeSession,
        max_pages: u32,
        task: &SearchTask,
    ) -> RankOutcome {
        let serp_selectors = crate::selectors::SerpSelectors::default();
        let mut delays = tiny_delays();
        let mut detour = DetourEngine::new(vec![], 0.0, Some(1));
        let mut finder = RankFinder {
            page: session,
            serp: &serp_selectors,
            config: config(max_pages),
            gate: fast_gate(),
            delays: &mut delays,
            detour: &mut detour,
            notifier: &NullNotifier,
        };
        finder.find_rank(task).await
    }

    #[tokio::test]
    async fn advances_to_page_two_with_contiguous_ranks() {
        let session = FakeSession::with_pages(vec![
            home_page(),
            serp(vec![organic("https://other.test/")], true),
            serp(vec![organic("https://shop.example/landing")], false),
        ])
        .advance_on(INPUT)
        .advance_on(NEXT);

        let task = SearchTask::new("red shoes", "shop.example");
        let outcome = run_finder(&session, 2, &task).await;

        assert_eq!(
            outcome,
            RankOutcome::Found {
                rank: 11,
                url: "https://shop.example/landing".to_string()
            }
        );
        let calls = session.calls();
        assert_eq!(session.calls_matching("collect_results"), 2);
        assert_eq!(session.calls_matching(&format!("click_js {}", NEXT)), 1);
        assert!(calls.iter().any(|c| c == &format!("enter {}", INPUT)));
    }

    #[tokio::test]
    async fn respects_the_page_limit() {
        let session = FakeSession::with_pages(vec![
            home_page(),
            serp(vec![organic("https://other.test/")], true),
            serp(vec![organic("https://shop.example/landing")], false),
        ])
        .advance_on(INPUT)
        .advance_on(NEXT);

        let task = SearchTask::new("red shoes", "shop.example");
        let outcome = run_finder(&session, 1, &task).await;

        // Page two holds the match, but the budget of one page means it is
        // never scanned.
        assert_eq!(outcome, RankOutcome::NotFound);
        assert_eq!(session.calls_matching("collect_results"), 1);
    }

    #[tokio::test]
    async fn missing_next_control_ends_the_search() {
        let session = FakeSession::with_pages(vec![
            home_page(),
            serp(vec![organic("https://other.test/")], false),
        ])
        .advance_on(INPUT);

        let task = SearchTask::new("red shoes", "shop.example");
        let outcome = run_finder(&session, 3, &task).await;

        assert_eq!(outcome, RankOutcome::NotFound);
        assert_eq!(session.calls_matching("collect_results"), 1);
    }

    #[tokio::test]
    async fn missing_search_input_degrades_to_not_found() {
        let session = FakeSession::single(FakePage::new("https://www.google.com/"));
        let task = SearchTask::new("red shoes", "shop.example");
        let outcome = run_finder(&session, 1, &task).await;

        assert_eq!(outcome, RankOutcome::NotFound);
        assert_eq!(session.calls_matching("collect_results"), 0);
    }

    #[tokio::test]
    async fn captcha_timeout_abandons_the_task() {
        let session = FakeSession::with_pages(vec![
            home_page(),
            serp(vec![organic("https://shop.example/landing")], false)
                .with_present(CAPTCHA),
        ])
        .advance_on(INPUT);

        let task = SearchTask::new("red shoes", "shop.example");
        let outcome = run_finder(&session, 1, &task).await;

        assert_eq!(outcome, RankOutcome::NotFound);
        // The gate gave up before any scan happened.
        assert_eq!(session.calls_matching("collect_results"), 0);
    }

    #[tokio::test]
    async fn types_the_keyword_character_by_character() {
        let session = FakeSession::with_pages(vec![
            home_page(),
            serp(vec![organic("https://shop.example/landing")], false),
        ])
        .advance_on(INPUT);

        let task = SearchTask::new("red shoes", "shop.example");
        let outcome = run_finder(&session, 1, &task).await;

        assert!(outcome.is_found());
        assert_eq!(session.typed(), "red shoes");
        assert!(session.calls().iter().any(|c| c == &format!("clear {}", INPUT)));
    }
}
