//! Rank Auditor
//!
//! Finds a target site's organic rank for each keyword in a task ledger,
//! then runs an on-page audit of the landing page, driving a single visible
//! browser session with humanlike pacing. Results are written back to the
//! ledger so interrupted runs resume where they stopped.

pub mod audit;
pub mod bot;
pub mod browser;
pub mod ledger;
pub mod notify;
pub mod pacing;
pub mod rank;
pub mod selectors;
pub mod stats;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use audit::AuditThresholds;
use browser::SessionConfig;
use notify::SmtpConfig;
use pacing::DelayConfig;
use rank::CaptchaConfig;
use selectors::{SerpSelectors, SiteSelectors};

/// Configuration validation failures. The only fatal error class: anything
/// here halts the run before the first task.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Delay range '{0}' must have min < max")]
    ZeroWidthDelay(&'static str),

    #[error("CAPTCHA poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("CAPTCHA wait ceiling must be greater than zero")]
    ZeroWaitCeiling,

    #[error("'{0}' is not configured")]
    MissingValue(&'static str),

    #[error("Selector '{0}' must not be empty")]
    EmptySelector(&'static str),

    #[error("Detour probability must be between 0 and 1, got {0}")]
    InvalidProbability(f64),

    #[error("Max pages must be at least 1")]
    ZeroMaxPages,
}

/// Application configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Search engine entry point
    pub search_url: String,
    /// Audit start URL when the rank search finds nothing
    pub fallback_url: String,
    /// Path to the JSON task ledger
    pub ledger_path: String,
    /// Maximum results pages to scan per keyword
    pub max_pages: u32,
    /// Probability of a decoy detour per search
    pub detour_probability: f64,
    /// Seed for all randomized behavior; unset means entropy-seeded
    pub rng_seed: Option<u64>,
    /// Wait budget for the query input, in seconds
    pub input_wait_secs: u64,
    /// Wait budget for result containers, in seconds
    pub scan_wait_secs: u64,
    /// Wait budget on the audited site, in seconds
    pub site_wait_secs: u64,
    /// Browser session settings
    pub browser: SessionConfig,
    /// Delay ranges per interaction category
    pub delays: DelayConfig,
    /// CAPTCHA polling settings
    pub captcha: CaptchaConfig,
    /// Audit rule thresholds
    pub audit: AuditThresholds,
    /// Alert mail settings
    pub smtp: SmtpConfig,
    /// Results page selectors
    pub serp: SerpSelectors,
    /// Audited site selectors
    pub site: SiteSelectors,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search_url: "https://www.google.com".to_string(),
            fallback_url: "https://www.myntra.com".to_string(),
            ledger_path: "tasks.json".to_string(),
            max_pages: 1,
            detour_probability: 0.5,
            rng_seed: None,
            input_wait_secs: 10,
            scan_wait_secs: 5,
            site_wait_secs: 15,
            browser: SessionConfig::default(),
            delays: DelayConfig::default(),
            captcha: CaptchaConfig::default(),
            audit: AuditThresholds::default(),
            smtp: SmtpConfig::default(),
            serp: SerpSelectors::default(),
            site: SiteSelectors::default(),
        }
    }
}

impl AppConfig {
    /// Default config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rank-auditor").join("config.json"))
    }

    /// Load configuration.
    ///
    /// An explicitly given path must exist and parse. Without one, the
    /// default location is tried and any problem falls back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Config {} is not valid JSON: {}", path.display(), e))?;
            info!("Loaded config from {}", path.display());
            return Ok(config);
        }

        if let Some(path) = Self::config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(content) => match serde_json::from_str(&content) {
                        Ok(config) => {
                            info!("Loaded config from {}", path.display());
                            return Ok(config);
                        }
                        Err(e) => warn!("Failed to parse config file: {}", e),
                    },
                    Err(e) => warn!("Failed to read config file: {}", e),
                }
            }
        }
        Ok(Self::default())
    }

    /// Check everything the run depends on, before any task starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("searchUrl"));
        }
        if self.fallback_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("fallbackUrl"));
        }
        if self.ledger_path.trim().is_empty() {
            return Err(ConfigError::MissingValue("ledgerPath"));
        }
        if self.browser.webdriver_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("browser.webdriverUrl"));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::ZeroMaxPages);
        }
        if !(0.0..=1.0).contains(&self.detour_probability) {
            return Err(ConfigError::InvalidProbability(self.detour_probability));
        }

        self.delays.validate()?;
        self.captcha.validate()?;

        let serp_selectors: [(&'static str, &str); 7] = [
            ("serp.resultContainer", &self.serp.result_container),
            ("serp.resultLink", &self.serp.result_link),
            ("serp.resultHeading", &self.serp.result_heading),
            ("serp.adMarker", &self.serp.ad_marker),
            ("serp.nextPage", &self.serp.next_page),
            ("serp.queryInput", &self.serp.query_input),
            ("serp.captchaMarker", &self.serp.captcha_marker),
        ];
        let site_selectors: [(&'static str, &str); 4] = [
            ("site.searchInput", &self.site.search_input),
            ("site.noResults", &self.site.no_results),
            ("site.productCount", &self.site.product_count),
            ("site.contentBlock", &self.site.content_block),
        ];
        for (name, selector) in serp_selectors.iter().chain(site_selectors.iter()) {
            if selector.trim().is_empty() {
                return Err(ConfigError::EmptySelector(name));
            }
        }

        Ok(())
    }

    pub fn input_wait(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.input_wait_secs)
    }

    pub fn scan_wait(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.scan_wait_secs)
    }

    pub fn site_wait(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.site_wait_secs)
    }
}

/// Get log directory path (shared across modules)
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("rank-auditor").join("logs"))
}

/// Initialize console plus daily-rolling file logging.
///
/// Returns the appender guard; drop it only on shutdown or buffered log
/// lines are lost.
pub fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if let Some(log_dir) = log_dir() {
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "rank-auditor.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::DelayRange;

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.max_pages, 1);
        assert_eq!(config.detour_probability, 0.5);
        assert_eq!(config.audit.min_product_count, 13);
        assert_eq!(config.audit.min_content_words, 250);
        assert_eq!(config.audit.title_min_chars, 45);
        assert_eq!(config.audit.title_max_chars, 70);
        assert_eq!(config.audit.description_min_chars, 145);
        assert_eq!(config.audit.description_max_chars, 165);
    }

    #[test]
    fn zero_width_delay_is_fatal() {
        let mut config = AppConfig::default();
        config.delays.typing = DelayRange::new(100, 100);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroWidthDelay("typing"))
        ));
    }

    #[test]
    fn empty_selector_is_fatal() {
        let mut config = AppConfig::default();
        config.serp.next_page = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptySelector("serp.nextPage"))
        ));
    }

    #[test]
    fn out_of_range_probability_is_fatal() {
        let mut config = AppConfig::default();
        config.detour_probability = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProbability(_))
        ));
    }

    #[test]
    fn missing_webdriver_url_is_fatal() {
        let mut config = AppConfig::default();
        config.browser.webdriver_url = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingValue("browser.webdriverUrl"))
        ));
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.serp.next_page, config.serp.next_page);
    }
}
