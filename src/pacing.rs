//! Humanlike pacing
//!
//! Every interaction category gets its own randomized delay range, so the
//! session never produces the fixed-interval timing that behavioral bot
//! detection keys on. All randomness comes from a seedable generator to
//! keep replays deterministic in tests.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ConfigError;

/// Interaction categories with distinct pacing profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelayKind {
    /// Between individual keystrokes while typing a query
    Keystroke,
    /// After a page navigation settles
    PostNav,
    /// Simulated reading of a results page
    SerpRead,
    /// Before activating the next-page control
    PrePagination,
    /// Dwelling on a decoy page during a detour
    DetourDwell,
    /// After navigating back from a detour
    BackSettle,
    /// Between ledger rows
    RowBreak,
}

impl DelayKind {
    fn name(self) -> &'static str {
        match self {
            DelayKind::Keystroke => "typing",
            DelayKind::PostNav => "afterPageLoad",
            DelayKind::SerpRead => "serpRead",
            DelayKind::PrePagination => "beforeNextPage",
            DelayKind::DetourDwell => "detourView",
            DelayKind::BackSettle => "backSettle",
            DelayKind::RowBreak => "rowBreak",
        }
    }
}

/// Inclusive delay bounds in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }
}

/// Delay ranges per interaction category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DelayConfig {
    pub typing: DelayRange,
    pub after_page_load: DelayRange,
    pub serp_read: DelayRange,
    pub before_next_page: DelayRange,
    pub detour_view: DelayRange,
    pub back_settle: DelayRange,
    pub row_break: DelayRange,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            typing: DelayRange::new(90, 220),
            after_page_load: DelayRange::new(2_500, 5_000),
            serp_read: DelayRange::new(5_000, 8_500),
            before_next_page: DelayRange::new(2_000, 4_000),
            detour_view: DelayRange::new(5_000, 9_000),
            back_settle: DelayRange::new(2_000, 4_000),
            row_break: DelayRange::new(12_000, 22_000),
        }
    }
}

impl DelayConfig {
    pub fn range(&self, kind: DelayKind) -> DelayRange {
        match kind {
            DelayKind::Keystroke => self.typing,
            DelayKind::PostNav => self.after_page_load,
            DelayKind::SerpRead => self.serp_read,
            DelayKind::PrePagination => self.before_next_page,
            DelayKind::DetourDwell => self.detour_view,
            DelayKind::BackSettle => self.back_settle,
            DelayKind::RowBreak => self.row_break,
        }
    }

    /// Every range must be genuinely random. A fixed delay is a bot signature.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const ALL: [DelayKind; 7] = [
            DelayKind::Keystroke,
            DelayKind::PostNav,
            DelayKind::SerpRead,
            DelayKind::PrePagination,
            DelayKind::DetourDwell,
            DelayKind::BackSettle,
            DelayKind::RowBreak,
        ];
        for kind in ALL {
            let range = self.range(kind);
            if range.min_ms >= range.max_ms {
                return Err(ConfigError::ZeroWidthDelay(kind.name()));
            }
        }
        Ok(())
    }
}

/// Supplies a randomized wait for each interaction category.
pub struct DelayPolicy {
    config: DelayConfig,
    rng: StdRng,
}

impl DelayPolicy {
    pub fn new(config: DelayConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    /// Draw a delay for this category.
    pub fn sample(&mut self, kind: DelayKind) -> Duration {
        let range = self.config.range(kind);
        Duration::from_millis(self.rng.gen_range(range.min_ms..=range.max_ms))
    }

    /// Suspend for a randomized delay in this category.
    pub async fn pause(&mut self, kind: DelayKind) {
        let delay = self.sample(kind);
        trace!("Pausing {:?} for {}ms", kind, delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}
