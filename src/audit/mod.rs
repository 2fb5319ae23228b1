//! On-page audit funnel
//!
//! Classifies a landing page into exactly one optimization bucket. The rules
//! run as an ordered chain and stop at the first match, so a page that is
//! both empty and badly titled is a deletion, nothing else.

pub mod site_search;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::browser::PageSession;
use crate::selectors::SiteSelectors;

/// Meta description element, same on every audited page.
const META_DESCRIPTION: &str = "meta[name='description']";

/// Thresholds for the audit rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditThresholds {
    /// Pages with fewer products than this are flagged and analysis stops
    pub min_product_count: u32,
    pub title_min_chars: usize,
    pub title_max_chars: usize,
    pub description_min_chars: usize,
    pub description_max_chars: usize,
    /// Minimum word count for the SEO content block
    pub min_content_words: usize,
    /// Glyph that marks an unfilled description template
    pub placeholder_glyph: String,
}

impl Default for AuditThresholds {
    fn default() -> Self {
        Self {
            min_product_count: 13,
            title_min_chars: 45,
            title_max_chars: 70,
            description_min_chars: 145,
            description_max_chars: 165,
            min_content_words: 250,
            placeholder_glyph: "✯".to_string(),
        }
    }
}

/// One audit verdict. Exactly one applies per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    /// The page has no results; the keyword should be removed
    Deletion { keyword: String },
    /// Title or meta description needs work
    TitleMetaIssue { url: String },
    /// Too few products to be worth optimizing further
    LowProductCount { detail: String },
    /// The SEO content block is missing or too thin
    ContentIssue { url: String },
    /// Every check passed
    Optimized { detail: String },
}

impl AuditOutcome {
    /// Short status label for logs and counters.
    pub fn status(&self) -> &'static str {
        match self {
            AuditOutcome::Deletion { .. } => "Deletion",
            AuditOutcome::TitleMetaIssue { .. } => "T&M",
            AuditOutcome::LowProductCount { .. } => "Low Product Count",
            AuditOutcome::ContentIssue { .. } => "Content",
            AuditOutcome::Optimized { .. } => "Optimized",
        }
    }
}

/// The rules, in evaluation order. First match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditRule {
    NoResults,
    TitleMeta,
    ProductCount,
    Content,
}

pub const FUNNEL_ORDER: [AuditRule; 4] = [
    AuditRule::NoResults,
    AuditRule::TitleMeta,
    AuditRule::ProductCount,
    AuditRule::Content,
];

/// Ordered decision list over the currently loaded page.
///
/// Pure with respect to page state: re-running on an unchanged page yields
/// the same outcome.
pub struct AuditFunnel<'a> {
    page: &'a dyn PageSession,
    site: &'a SiteSelectors,
    thresholds: &'a AuditThresholds,
}

impl<'a> AuditFunnel<'a> {
    pub fn new(
        page: &'a dyn PageSession,
        site: &'a SiteSelectors,
        thresholds: &'a AuditThresholds,
    ) -> Self {
        Self {
            page,
            site,
            thresholds,
        }
    }

    /// Classify the current page.
    pub async fn classify(&self, keyword: &str, page_url: &str) -> AuditOutcome {
        info!("--- Running on-page audit for '{}' ---", keyword);
        for rule in FUNNEL_ORDER {
            if let Some(outcome) = self.evaluate(rule, keyword, page_url).await {
                return outcome;
            }
        }
        info!("All on-page checks passed");
        AuditOutcome::Optimized {
            detail: "All checks passed".to_string(),
        }
    }

    async fn evaluate(
        &self,
        rule: AuditRule,
        keyword: &str,
        page_url: &str,
    ) -> Option<AuditOutcome> {
        match rule {
            AuditRule::NoResults => self.no_results_present().await.then(|| AuditOutcome::Deletion {
                keyword: keyword.to_string(),
            }),
            AuditRule::TitleMeta => {
                self.title_meta_issue()
                    .await
                    .then(|| AuditOutcome::TitleMetaIssue {
                        url: page_url.to_string(),
                    })
            }
            AuditRule::ProductCount => (!self.product_count_sufficient().await).then(|| {
                AuditOutcome::LowProductCount {
                    detail: format!(
                        "Analysis stopped, fewer than {} products",
                        self.thresholds.min_product_count
                    ),
                }
            }),
            AuditRule::Content => {
                self.content_needs_work()
                    .await
                    .then(|| AuditOutcome::ContentIssue {
                        url: page_url.to_string(),
                    })
            }
        }
    }

    async fn no_results_present(&self) -> bool {
        match self.page.is_present(&self.site.no_results).await {
            Ok(true) => {
                warn!("DELETION CHECK: found the 'no results' indicator");
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!("Deletion check failed: {}", e);
                false
            }
        }
    }

    async fn title_meta_issue(&self) -> bool {
        let title = match self.page.title().await {
            Ok(title) => title,
            Err(e) => {
                error!("T&M check could not read the title: {}", e);
                return false;
            }
        };
        if title.is_empty() {
            warn!("T&M CHECK: page title is missing");
            return true;
        }

        let description = match self.page.attr_of(META_DESCRIPTION, "content").await {
            Ok(Some(description)) => description,
            Ok(None) => {
                warn!("T&M CHECK: description meta tag is missing");
                return true;
            }
            Err(e) => {
                error!("T&M check could not read the description: {}", e);
                return false;
            }
        };

        if description.contains(self.thresholds.placeholder_glyph.as_str()) {
            warn!(
                "T&M CHECK: found placeholder '{}' in the description",
                self.thresholds.placeholder_glyph
            );
            return true;
        }

        let title_len = title.chars().count();
        if !(self.thresholds.title_min_chars..=self.thresholds.title_max_chars)
            .contains(&title_len)
        {
            warn!(
                "T&M CHECK: title length {} is outside {}-{}",
                title_len, self.thresholds.title_min_chars, self.thresholds.title_max_chars
            );
            return true;
        }

        let description_len = description.chars().count();
        if !(self.thresholds.description_min_chars..=self.thresholds.description_max_chars)
            .contains(&description_len)
        {
            warn!(
                "T&M CHECK: description length {} is outside {}-{}",
                description_len,
                self.thresholds.description_min_chars,
                self.thresholds.description_max_chars
            );
            return true;
        }

        false
    }

    async fn product_count_sufficient(&self) -> bool {
        let text = match self.page.text_of(&self.site.product_count).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                // A listing page without its count element is itself a red flag.
                warn!("PRODUCT COUNT CHECK: count element not found");
                return false;
            }
            Err(e) => {
                error!("Product count check failed: {}", e);
                return false;
            }
        };

        match parse_first_int(&text) {
            Some(count) => {
                info!("PRODUCT COUNT CHECK: found {} items", count);
                count >= self.thresholds.min_product_count
            }
            None => {
                warn!("PRODUCT COUNT CHECK: could not parse a number from '{}'", text);
                false
            }
        }
    }

    async fn content_needs_work(&self) -> bool {
        let text = match self.page.text_of(&self.site.content_block).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                // Missing block counts as failing, unlike other extraction errors.
                warn!("CONTENT CHECK: SEO content block not found");
                return true;
            }
            Err(e) => {
                error!("Content check failed: {}", e);
                return false;
            }
        };

        let words = text.split_whitespace().count();
        info!("CONTENT CHECK: content block has {} words", words);
        words < self.thresholds.min_content_words
    }
}

/// First run of digits in the text, commas stripped.
fn parse_first_int(text: &str) -> Option<u32> {
    let cleaned = text.replace(',', "");
    let digits: String = cleaned
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakePage, FakeSession};

    const URL: &str = "https://site.test/shop/red-shoes";

    fn selectors() -> SiteSelectors {
        SiteSelectors::default()
    }

    fn thresholds() -> AuditThresholds {
        AuditThresholds::default()
    }

    /// A page that passes every rule.
    fn optimized_page() -> FakePage {
        let site = selectors();
        FakePage::new(URL)
            .with_title(&"t".repeat(50))
            .with_attr(META_DESCRIPTION, "content", &"d".repeat(150))
            .with_text(&site.product_count, "1,234 Items")
            .with_text(&site.content_block, &"word ".repeat(260))
    }

    async fn classify(page: FakePage) -> AuditOutcome {
        let session = FakeSession::single(page);
        let site = selectors();
        let thresholds = thresholds();
        AuditFunnel::new(&session, &site, &thresholds)
            .classify("red shoes", URL)
            .await
    }

    #[tokio::test]
    async fn clean_page_is_optimized() {
        assert_eq!(
            classify(optimized_page()).await,
            AuditOutcome::Optimized {
                detail: "All checks passed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn deletion_short_circuits_every_other_rule() {
        // Bad title AND the no-results marker: deletion wins, nothing else runs.
        let page = optimized_page()
            .with_title("short")
            .with_present(&selectors().no_results);
        assert_eq!(
            classify(page).await,
            AuditOutcome::Deletion {
                keyword: "red shoes".to_string()
            }
        );
    }

    #[tokio::test]
    async fn title_length_boundaries_are_inclusive() {
        for len in [45, 70] {
            let page = optimized_page().with_title(&"t".repeat(len));
            assert!(
                matches!(classify(page).await, AuditOutcome::Optimized { .. }),
                "title length {}",
                len
            );
        }
        for len in [44, 71] {
            let page = optimized_page().with_title(&"t".repeat(len));
            assert_eq!(
                classify(page).await,
                AuditOutcome::TitleMetaIssue {
                    url: URL.to_string()
                },
                "title length {}",
                len
            );
        }
    }

    #[tokio::test]
    async fn description_length_boundaries_are_inclusive() {
        for len in [145, 165] {
            let page =
                optimized_page().with_attr(META_DESCRIPTION, "content", &"d".repeat(len));
            assert!(
                matches!(classify(page).await, AuditOutcome::Optimized { .. }),
                "description length {}",
                len
            );
        }
        for len in [144, 166] {
            let page =
                optimized_page().with_attr(META_DESCRIPTION, "content", &"d".repeat(len));
            assert_eq!(
                classify(page).await,
                AuditOutcome::TitleMetaIssue {
                    url: URL.to_string()
                },
                "description length {}",
                len
            );
        }
    }

    #[tokio::test]
    async fn placeholder_glyph_flags_the_description() {
        let mut description = "d".repeat(149);
        description.push('✯');
        let page = optimized_page().with_attr(META_DESCRIPTION, "content", &description);
        assert_eq!(
            classify(page).await,
            AuditOutcome::TitleMetaIssue {
                url: URL.to_string()
            }
        );
    }

    #[tokio::test]
    async fn missing_title_or_description_is_a_tm_issue() {
        let no_title = optimized_page().with_title("");
        assert!(matches!(
            classify(no_title).await,
            AuditOutcome::TitleMetaIssue { .. }
        ));

        let site = selectors();
        let no_description = FakePage::new(URL)
            .with_title(&"t".repeat(50))
            .with_text(&site.product_count, "1,234 Items")
            .with_text(&site.content_block, &"word ".repeat(260));
        assert!(matches!(
            classify(no_description).await,
            AuditOutcome::TitleMetaIssue { .. }
        ));
    }

    #[tokio::test]
    async fn product_count_threshold_is_thirteen() {
        let site = selectors();
        let enough = optimized_page().with_text(&site.product_count, "13 Items");
        assert!(matches!(classify(enough).await, AuditOutcome::Optimized { .. }));

        let short = optimized_page().with_text(&site.product_count, "12 Items");
        assert!(matches!(
            classify(short).await,
            AuditOutcome::LowProductCount { .. }
        ));
    }

    #[tokio::test]
    async fn low_product_count_halts_before_the_content_check() {
        // Thin catalog AND missing content block: the count verdict wins.
        let site = selectors();
        let page = FakePage::new(URL)
            .with_title(&"t".repeat(50))
            .with_attr(META_DESCRIPTION, "content", &"d".repeat(150))
            .with_text(&site.product_count, "5 Items");
        assert!(matches!(
            classify(page).await,
            AuditOutcome::LowProductCount { .. }
        ));
    }

    #[tokio::test]
    async fn missing_count_element_or_unparsable_text_fails_the_check() {
        let site = selectors();
        let absent = FakePage::new(URL)
            .with_title(&"t".repeat(50))
            .with_attr(META_DESCRIPTION, "content", &"d".repeat(150))
            .with_text(&site.content_block, &"word ".repeat(260));
        assert!(matches!(
            classify(absent).await,
            AuditOutcome::LowProductCount { .. }
        ));

        let garbled = optimized_page().with_text(&site.product_count, "plenty of items");
        assert!(matches!(
            classify(garbled).await,
            AuditOutcome::LowProductCount { .. }
        ));
    }

    #[tokio::test]
    async fn content_word_count_threshold_is_inclusive() {
        let site = selectors();
        let exactly = optimized_page().with_text(&site.content_block, &"word ".repeat(250));
        assert!(matches!(classify(exactly).await, AuditOutcome::Optimized { .. }));

        let thin = optimized_page().with_text(&site.content_block, &"word ".repeat(249));
        assert_eq!(
            classify(thin).await,
            AuditOutcome::ContentIssue {
                url: URL.to_string()
            }
        );
    }

    #[tokio::test]
    async fn missing_content_block_is_a_content_issue() {
        let site = selectors();
        let page = FakePage::new(URL)
            .with_title(&"t".repeat(50))
            .with_attr(META_DESCRIPTION, "content", &"d".repeat(150))
            .with_text(&site.product_count, "1,234 Items");
        assert_eq!(
            classify(page).await,
            AuditOutcome::ContentIssue {
                url: URL.to_string()
            }
        );
    }

    #[tokio::test]
    async fn auditing_an_unchanged_page_is_idempotent() {
        let session = FakeSession::single(optimized_page().with_title("short"));
        let site = selectors();
        let limits = thresholds();
        let funnel = AuditFunnel::new(&session, &site, &limits);

        let first = funnel.classify("red shoes", URL).await;
        let second = funnel.classify("red shoes", URL).await;
        assert_eq!(first, second);
    }

    #[test]
    fn first_int_parsing_handles_commas_and_noise() {
        assert_eq!(parse_first_int("- 1,234 Items"), Some(1234));
        assert_eq!(parse_first_int("13 Items"), Some(13));
        assert_eq!(parse_first_int("no digits here"), None);
        assert_eq!(parse_first_int(""), None);
    }
}
