//! Decoy navigation
//!
//! Before the first scan, the search may divert into an unrelated
//! interaction (an alternate content tab, or a random organic link) and then
//! come back. The point is to break the query-scan-leave pattern that
//! behavioral detection looks for. The generic link option must never click
//! anything containing the target, so the measurement itself stays clean.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::browser::PageSession;
use crate::pacing::{DelayKind, DelayPolicy};
use crate::selectors::{Decoy, SerpSelectors};

/// Performs at most one decoy interaction per rank search.
pub struct DetourEngine {
    decoys: Vec<Decoy>,
    probability: f64,
    rng: StdRng,
}

impl DetourEngine {
    pub fn new(decoys: Vec<Decoy>, probability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            decoys,
            probability,
            rng,
        }
    }

    /// Roll the configured probability and maybe perform a detour.
    pub async fn maybe_perform(
        &mut self,
        page: &dyn PageSession,
        serp: &SerpSelectors,
        target: &str,
        delays: &mut DelayPolicy,
    ) {
        if !self.rng.gen_bool(self.probability) {
            debug!("Skipping detour this time");
            return;
        }
        self.perform(page, serp, target, delays).await;
    }

    /// Perform one decoy interaction and return to the prior page.
    ///
    /// Nothing here may fail the search: a missing decoy element or an
    /// empty candidate list logs and leaves the page untouched.
    pub async fn perform(
        &mut self,
        page: &dyn PageSession,
        serp: &SerpSelectors,
        target: &str,
        delays: &mut DelayPolicy,
    ) {
        info!(">>> Taking a detour to look less mechanical");

        // Index == decoys.len() selects the generic organic-link option.
        let pick = self.rng.gen_range(0..=self.decoys.len());
        let diverted = if pick < self.decoys.len() {
            let decoy = self.decoys[pick].clone();
            info!("Detour: opening the '{}' tab", decoy.label);
            match page.click(&decoy.selector).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Could not open decoy tab '{}': {}", decoy.label, e);
                    false
                }
            }
        } else {
            info!("Detour: clicking a random non-target result");
            self.click_random_organic(page, serp, target).await
        };

        if !diverted {
            return;
        }

        delays.pause(DelayKind::DetourDwell).await;
        info!("<<< Returning from detour");
        if let Err(e) = page.back().await {
            warn!("Could not navigate back from detour: {}", e);
            return;
        }
        delays.pause(DelayKind::BackSettle).await;
    }

    async fn click_random_organic(
        &mut self,
        page: &dyn PageSession,
        serp: &SerpSelectors,
        target: &str,
    ) -> bool {
        let blocks = match page.collect_results(serp).await {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!("Could not enumerate results for detour: {}", e);
                return false;
            }
        };

        // Never decoy into the thing being measured.
        let candidates: Vec<usize> = blocks
            .iter()
            .enumerate()
            .filter(|(_, block)| {
                block
                    .href
                    .as_deref()
                    .is_some_and(|href| !href.contains(target))
            })
            .map(|(index, _)| index)
            .collect();

        let Some(&index) = candidates.choose(&mut self.rng) else {
            warn!("No non-target link available for detour, skipping");
            return false;
        };

        match page.click_result_link(serp, index).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not click detour link: {}", e);
                false
            }
        }
    }
}
