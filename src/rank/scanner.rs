//! Results page scanning
//!
//! Turns the raw result containers into an ordered organic list, assigns
//! globally contiguous ranks across paginated pages and looks for the first
//! entry whose destination URL contains the target identifier.

use std::time::Duration;

use tracing::{error, info};

use crate::browser::{PageSession, ResultBlock};
use crate::selectors::SerpSelectors;

/// An organic entry that matched the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganicResult {
    /// 1-based rank, contiguous across pages
    pub rank: u32,
    /// Exact destination URL of the matching entry
    pub url: String,
}

/// Scan the current results page for the target.
///
/// Waits a bounded time for the first result container; a page without
/// containers reports no match rather than an error. `offset` is the rank
/// base for this page (0 for page 1, 10 for page 2).
pub async fn scan_page(
    page: &dyn PageSession,
    serp: &SerpSelectors,
    target: &str,
    offset: u32,
    wait_budget: Duration,
) -> Option<OrganicResult> {
    match page.wait_for(&serp.result_container, wait_budget).await {
        Ok(true) => {}
        Ok(false) => {
            info!("No result containers appeared within the wait budget");
            return None;
        }
        Err(e) => {
            error!("Error while waiting for results: {}", e);
            return None;
        }
    }

    let blocks = match page.collect_results(serp).await {
        Ok(blocks) => blocks,
        Err(e) => {
            error!("Error while collecting results: {}", e);
            return None;
        }
    };

    let hit = find_in_blocks(&blocks, target, offset);
    if let Some(ref hit) = hit {
        info!("Match for '{}' at rank {}: {}", target, hit.rank, hit.url);
    }
    hit
}

/// Rank the organic entries and find the first target match.
///
/// Advertisements and entries without heading text never receive a rank.
/// An organic entry whose link could not be extracted keeps its rank but
/// cannot match. Matching is substring containment in page order.
pub fn find_in_blocks(blocks: &[ResultBlock], target: &str, offset: u32) -> Option<OrganicResult> {
    let organic = blocks.iter().filter(|block| {
        !block.is_ad
            && block
                .heading
                .as_deref()
                .is_some_and(|heading| !heading.trim().is_empty())
    });

    for (position, block) in organic.enumerate() {
        let rank = offset + position as u32 + 1;
        if let Some(href) = &block.href {
            if href.contains(target) {
                return Some(OrganicResult {
                    rank,
                    url: href.clone(),
                });
            }
        }
    }
    None
}
