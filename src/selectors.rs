//! Injected CSS selector configuration
//!
//! All DOM knowledge lives here. The search and audit logic is
//! selector-agnostic; swapping the audited site or adapting to a markup
//! change is a configuration edit, not a code change.

use serde::{Deserialize, Serialize};

/// A labeled decoy action on the results page (an alternate content tab).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decoy {
    pub label: String,
    pub selector: String,
}

impl Decoy {
    pub fn new(label: &str, selector: &str) -> Self {
        Self {
            label: label.to_string(),
            selector: selector.to_string(),
        }
    }
}

/// Selectors for the search engine results page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerpSelectors {
    /// One organic or ad result container
    pub result_container: String,
    /// Link element inside a result container
    pub result_link: String,
    /// Heading element inside a result container
    pub result_heading: String,
    /// Marker identifying a container as an advertisement
    pub ad_marker: String,
    /// Next-page control
    pub next_page: String,
    /// Query input on the search page
    pub query_input: String,
    /// Security-challenge interstitial marker
    pub captcha_marker: String,
    /// Decoy tabs for detour navigation
    pub decoy_tabs: Vec<Decoy>,
}

impl Default for SerpSelectors {
    fn default() -> Self {
        Self {
            result_container: "div#search div.g".to_string(),
            result_link: "a".to_string(),
            result_heading: "h3".to_string(),
            ad_marker: "[data-text-ad]".to_string(),
            next_page: "a#pnnext".to_string(),
            query_input: "[name='q']".to_string(),
            captcha_marker: "iframe[title='reCAPTCHA']".to_string(),
            decoy_tabs: vec![
                Decoy::new("images", "a[href*='&tbm=isch']"),
                Decoy::new("videos", "a[href*='&tbm=vid']"),
                Decoy::new("news", "a[href*='&tbm=nws']"),
                Decoy::new("maps", "a[href*='maps.google.com']"),
            ],
        }
    }
}

/// Selectors for the audited site
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteSelectors {
    /// The site's own search input
    pub search_input: String,
    /// "No results" indicator on a listing page
    pub no_results: String,
    /// Product count element on a listing page
    pub product_count: String,
    /// Main SEO content block
    pub content_block: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            search_input: "input.desktop-searchBar".to_string(),
            no_results: "span.title-corrections".to_string(),
            product_count: "span.title-count".to_string(),
            content_block: "div.index-seoContainer".to_string(),
        }
    }
}
