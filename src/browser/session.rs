//! Browser session management
//!
//! Wraps a WebDriver-driven Chrome instance behind the [`PageSession`] trait so
//! the search and audit logic never touches a concrete driver. Tests substitute
//! a scripted fake session.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use thirtyfour::prelude::*;
use tracing::{debug, info, warn};

use super::SessionError;
use crate::selectors::SerpSelectors;

/// W3C WebDriver key code for Enter (U+E007).
const ENTER_KEY: char = '\u{e007}';

/// Interval between element polls inside bounded waits.
const WAIT_POLL_MS: u64 = 250;

/// Realistic desktop user agents, one picked at random per session launch.
const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Configuration for launching a browser session
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// WebDriver endpoint (chromedriver or a Selenium hub)
    pub webdriver_url: String,
    /// User agent pool; one is picked at random on launch
    pub user_agents: Vec<String>,
    /// Page load timeout in seconds
    pub page_load_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            page_load_timeout_secs: 60,
        }
    }
}

/// Raw extraction of one result container, in page order.
///
/// Individual extraction failures degrade to `None` fields rather than
/// failing the whole collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultBlock {
    /// Heading text, if the container has one
    pub heading: Option<String>,
    /// Destination URL of the container's link, if extractable
    pub href: Option<String>,
    /// Whether the container carries an advertisement marker
    pub is_ad: bool,
}

/// Capabilities the automation needs from a live page.
///
/// Deliberately small: navigate, read, wait, click, type. All higher-level
/// behavior (scanning, pagination, auditing) is built on top of these.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate to a URL.
    async fn goto(&self, url: &str) -> Result<(), SessionError>;

    /// URL of the current page.
    async fn current_url(&self) -> Result<String, SessionError>;

    /// Title of the current page.
    async fn title(&self) -> Result<String, SessionError>;

    /// Navigate back in session history.
    async fn back(&self) -> Result<(), SessionError>;

    /// Whether at least one element matches the selector right now.
    async fn is_present(&self, css: &str) -> Result<bool, SessionError>;

    /// Poll until an element matches the selector or the budget runs out.
    /// Returns whether the element appeared; exhaustion is not an error.
    async fn wait_for(&self, css: &str, timeout: Duration) -> Result<bool, SessionError>;

    /// Visible text of the first matching element, `None` when absent.
    async fn text_of(&self, css: &str) -> Result<Option<String>, SessionError>;

    /// Attribute value of the first matching element, `None` when the element
    /// or the attribute is absent.
    async fn attr_of(&self, css: &str, attr: &str) -> Result<Option<String>, SessionError>;

    /// Clear the first matching input element.
    async fn clear(&self, css: &str) -> Result<(), SessionError>;

    /// Send keystrokes to the first matching element.
    async fn type_text(&self, css: &str, text: &str) -> Result<(), SessionError>;

    /// Send the Enter key to the first matching element.
    async fn press_enter(&self, css: &str) -> Result<(), SessionError>;

    /// Native click on the first matching element.
    async fn click(&self, css: &str) -> Result<(), SessionError>;

    /// Script-injected click, for controls that resist native clicks.
    async fn click_js(&self, css: &str) -> Result<(), SessionError>;

    /// Extract all result containers on the current page, in page order.
    async fn collect_results(&self, serp: &SerpSelectors) -> Result<Vec<ResultBlock>, SessionError>;

    /// Click the link inside the result container at `index` (page order).
    async fn click_result_link(
        &self,
        serp: &SerpSelectors,
        index: usize,
    ) -> Result<(), SessionError>;
}

/// A live browser session backed by thirtyfour.
pub struct DriverSession {
    driver: WebDriver,
}

impl DriverSession {
    /// Launch a humanlike Chrome session against the configured WebDriver
    /// endpoint. Picks a random user agent and hides the usual automation
    /// giveaways.
    pub async fn launch(config: &SessionConfig) -> Result<Self, SessionError> {
        let mut caps = DesiredCapabilities::chrome();

        let user_agent = config
            .user_agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER_AGENTS[0].to_string());
        info!("Launching browser session (user agent: {})", user_agent);

        caps.add_arg(&format!("--user-agent={}", user_agent))?;
        caps.add_arg("--disable-blink-features=AutomationControlled")?;
        caps.add_arg("--no-first-run")?;
        caps.add_arg("--disable-infobars")?;
        caps.add_arg("--disable-extensions")?;
        caps.add_experimental_option("excludeSwitches", ["enable-automation"])?;
        caps.add_experimental_option("useAutomationExtension", false)?;

        let driver = WebDriver::new(&config.webdriver_url, caps)
            .await
            .map_err(|e| SessionError::LaunchFailed(e.to_string()))?;
        driver
            .set_page_load_timeout(Duration::from_secs(config.page_load_timeout_secs))
            .await?;
        driver.maximize_window().await?;

        Ok(Self { driver })
    }

    /// Close the browser and end the WebDriver session.
    pub async fn quit(self) -> Result<(), SessionError> {
        info!("Closing browser session");
        self.driver.quit().await?;
        Ok(())
    }

    /// Find the first matching element; absence is `None`, not an error.
    async fn find_opt(&self, css: &str) -> Option<WebElement> {
        self.driver.find(By::Css(css)).await.ok()
    }

    /// Find the first matching element; absence is an [`SessionError::ElementNotFound`].
    async fn find_required(&self, css: &str) -> Result<WebElement, SessionError> {
        self.driver
            .find(By::Css(css))
            .await
            .map_err(|_| SessionError::ElementNotFound(css.to_string()))
    }
}

#[async_trait]
impl PageSession for DriverSession {
    async fn goto(&self, url: &str) -> Result<(), SessionError> {
        debug!("Navigating to {}", url);
        self.driver
            .goto(url)
            .await
            .map_err(|e| SessionError::NavigationFailed(e.to_string()))
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        Ok(self.driver.current_url().await?.to_string())
    }

    async fn title(&self) -> Result<String, SessionError> {
        Ok(self.driver.title().await?)
    }

    async fn back(&self) -> Result<(), SessionError> {
        self.driver.back().await?;
        Ok(())
    }

    async fn is_present(&self, css: &str) -> Result<bool, SessionError> {
        match self.driver.find_all(By::Css(css)).await {
            Ok(elements) => Ok(!elements.is_empty()),
            Err(e) => {
                debug!("Presence check failed for '{}': {}", css, e);
                Ok(false)
            }
        }
    }

    async fn wait_for(&self, css: &str, timeout: Duration) -> Result<bool, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_present(css).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(WAIT_POLL_MS)).await;
        }
    }

    async fn text_of(&self, css: &str) -> Result<Option<String>, SessionError> {
        match self.find_opt(css).await {
            Some(element) => Ok(Some(element.text().await?)),
            None => Ok(None),
        }
    }

    async fn attr_of(&self, css: &str, attr: &str) -> Result<Option<String>, SessionError> {
        match self.find_opt(css).await {
            Some(element) => Ok(element.attr(attr).await?),
            None => Ok(None),
        }
    }

    async fn clear(&self, css: &str) -> Result<(), SessionError> {
        self.find_required(css).await?.clear().await?;
        Ok(())
    }

    async fn type_text(&self, css: &str, text: &str) -> Result<(), SessionError> {
        self.find_required(css).await?.send_keys(text).await?;
        Ok(())
    }

    async fn press_enter(&self, css: &str) -> Result<(), SessionError> {
        self.find_required(css)
            .await?
            .send_keys(ENTER_KEY.to_string())
            .await?;
        Ok(())
    }

    async fn click(&self, css: &str) -> Result<(), SessionError> {
        self.find_required(css).await?.click().await?;
        Ok(())
    }

    async fn click_js(&self, css: &str) -> Result<(), SessionError> {
        let element = self.find_required(css).await?;
        self.driver
            .execute("arguments[0].click();", vec![element.to_json()?])
            .await?;
        Ok(())
    }

    async fn collect_results(&self, serp: &SerpSelectors) -> Result<Vec<ResultBlock>, SessionError> {
        let containers = self.driver.find_all(By::Css(&serp.result_container)).await?;
        let mut blocks = Vec::with_capacity(containers.len());

        for container in containers {
            let is_ad = match container.find_all(By::Css(&serp.ad_marker)).await {
                Ok(markers) => !markers.is_empty(),
                Err(_) => false,
            };
            let heading = match container.find(By::Css(&serp.result_heading)).await {
                Ok(heading) => heading.text().await.ok(),
                Err(_) => None,
            };
            let href = match container.find(By::Css(&serp.result_link)).await {
                Ok(link) => link.attr("href").await.ok().flatten(),
                Err(_) => None,
            };
            blocks.push(ResultBlock { heading, href, is_ad });
        }

        Ok(blocks)
    }

    async fn click_result_link(
        &self,
        serp: &SerpSelectors,
        index: usize,
    ) -> Result<(), SessionError> {
        let containers = self.driver.find_all(By::Css(&serp.result_container)).await?;
        let container = containers.get(index).ok_or_else(|| {
            warn!("Result container {} is gone, page may have changed", index);
            SessionError::ElementNotFound(format!("{}[{}]", serp.result_container, index))
        })?;
        let link = container
            .find(By::Css(&serp.result_link))
            .await
            .map_err(|_| SessionError::ElementNotFound(serp.result_link.clone()))?;
        link.click().await?;
        Ok(())
    }
}
