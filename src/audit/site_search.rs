//! Internal site search
//!
//! Feeds the keyword through the audited site's own search box and resolves
//! the URL the audit should run against. Every failure path falls back to
//! the start URL so the audit always has somewhere to look.

use std::time::Duration;

use tracing::{error, info, warn};
use url::Url;

use crate::browser::{PageSession, SessionError};
use crate::selectors::SiteSelectors;

/// Run the internal search and return the cleaned URL of the results page.
///
/// On any failure the start URL is returned instead, with its query string
/// stripped either way.
pub async fn run(
    page: &dyn PageSession,
    site: &SiteSelectors,
    keyword: &str,
    start_url: &str,
    wait_budget: Duration,
) -> String {
    info!(
        "Performing internal search for '{}' starting from {}",
        keyword, start_url
    );
    match attempt(page, site, keyword, start_url, wait_budget).await {
        Ok(url) => {
            info!("Internal search complete, cleaned URL: {}", url);
            url
        }
        Err(e) => {
            error!("Internal search failed: {}, using the start URL", e);
            strip_query(start_url)
        }
    }
}

async fn attempt(
    page: &dyn PageSession,
    site: &SiteSelectors,
    keyword: &str,
    start_url: &str,
    wait_budget: Duration,
) -> Result<String, SessionError> {
    page.goto(start_url).await?;

    if !page.wait_for(&site.search_input, wait_budget).await? {
        warn!("Site search input never appeared, using the start URL");
        return Ok(strip_query(start_url));
    }

    page.clear(&site.search_input).await?;
    page.type_text(&site.search_input, keyword).await?;
    page.press_enter(&site.search_input).await?;

    // Either the product count (results) or the no-results message confirms
    // the search page actually loaded before we trust its URL.
    let settled = format!("{}, {}", site.product_count, site.no_results);
    if !page.wait_for(&settled, wait_budget).await? {
        warn!("Search results never settled, using the start URL");
        return Ok(strip_query(start_url));
    }

    Ok(strip_query(&page.current_url().await?))
}

/// Drop the query string and fragment from a URL.
pub fn strip_query(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.split('?').next().unwrap_or(url).to_string(),
    }
}
