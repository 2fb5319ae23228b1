//! Security-challenge gate
//!
//! When the search engine throws up a challenge interstitial, the run pauses
//! and waits for a human to clear it in the visible browser. One alert goes
//! out per pause; polling continues until the marker disappears or the wait
//! ceiling is hit.

use std::io::Write;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::browser::PageSession;
use crate::notify::Notifier;
use crate::ConfigError;

/// Polling and timeout settings for challenge waits
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptchaConfig {
    /// Seconds between marker re-checks
    pub poll_interval_secs: u64,
    /// Total seconds to wait before abandoning the task
    pub wait_ceiling_secs: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            wait_ceiling_secs: 300,
        }
    }
}

impl CaptchaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.wait_ceiling_secs == 0 {
            return Err(ConfigError::ZeroWaitCeiling);
        }
        Ok(())
    }
}

/// State carried through one pause
struct CaptchaState {
    first_seen: Instant,
    alert_sent: bool,
}

/// Pauses execution while a challenge interstitial is up.
///
/// Each invocation is an independent state instance; a single rank search may
/// run the gate several times (once per results page).
pub struct CaptchaGate {
    marker: String,
    poll_interval: Duration,
    wait_ceiling: Duration,
}

impl CaptchaGate {
    pub fn new(marker: impl Into<String>, poll_interval: Duration, wait_ceiling: Duration) -> Self {
        Self {
            marker: marker.into(),
            poll_interval,
            wait_ceiling,
        }
    }

    pub fn from_config(marker: impl Into<String>, config: &CaptchaConfig) -> Self {
        Self::new(
            marker,
            Duration::from_secs(config.poll_interval_secs),
            Duration::from_secs(config.wait_ceiling_secs),
        )
    }

    /// Block until the challenge is solved or the wait ceiling passes.
    ///
    /// Returns `true` on resolution, `false` on timeout. Callers abandon only
    /// the current task on `false`, never the batch.
    pub async fn resolve(
        &self,
        page: &dyn PageSession,
        notifier: &dyn Notifier,
        keyword: &str,
    ) -> bool {
        let mut state = CaptchaState {
            first_seen: Instant::now(),
            alert_sent: false,
        };
        warn!("CAPTCHA detected, pausing for manual intervention (keyword: '{}')", keyword);

        loop {
            match page.is_present(&self.marker).await {
                Ok(false) => {
                    info!("CAPTCHA solved, resuming");
                    return true;
                }
                Ok(true) => {}
                Err(e) => {
                    warn!("Could not re-check CAPTCHA marker: {}, still waiting", e);
                }
            }

            if state.first_seen.elapsed() >= self.wait_ceiling {
                error!(
                    "CAPTCHA not solved within {}s, abandoning keyword '{}'",
                    self.wait_ceiling.as_secs(),
                    keyword
                );
                return false;
            }

            if !state.alert_sent {
                self.prompt_operator();
                let body = format!(
                    "Hello,\n\nThe automation has hit a security check and is now paused.\n\n\
                     Keyword: \"{}\"\n\nPlease solve the challenge in the browser window. \
                     The run resumes automatically once it clears.\n\n- Automated System",
                    keyword
                );
                if let Err(e) = notifier
                    .send_alert("Rank Auditor Alert: CAPTCHA - Action Required", &body)
                    .await
                {
                    error!("Failed to send CAPTCHA alert: {}", e);
                }
                state.alert_sent = true;
            }

            tokio::time::sleep(self.poll_interval).await;
            print!(".");
            let _ = std::io::stdout().flush();
        }
    }

    fn prompt_operator(&self) {
        println!("\n{}", "=".repeat(60));
        println!("ACTION REQUIRED: please solve the security check in the browser.");
        println!(
            "Waiting up to {:.0} minute(s); the run resumes automatically.",
            self.wait_ceiling.as_secs_f64() / 60.0
        );
        println!("{}\n", "=".repeat(60));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::browser::fake::{FakePage, FakeSession};
    use crate::notify::NotifyError;

    const MARKER: &str = "iframe[title='reCAPTCHA']";

    struct RecordingNotifier {
        alerts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn new(fail: bool) -> Self {
            Self {
                alerts: Mutex::new(Vec::new()),
                fail,
            }
        }

        fn count(&self) -> usize {
            self.alerts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_alert(&self, subject: &str, _body: &str) -> Result<(), NotifyError> {
            self.alerts.lock().unwrap().push(subject.to_string());
            if self.fail {
                Err(NotifyError::Smtp("relay down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn fast_gate(ceiling_ms: u64) -> CaptchaGate {
        CaptchaGate::new(
            MARKER,
            Duration::from_millis(5),
            Duration::from_millis(ceiling_ms),
        )
    }

    #[tokio::test]
    async fn resolves_once_marker_clears() {
        let session = FakeSession::single(FakePage::new("https://serp.test/")).countdown(MARKER, 3);
        let notifier = RecordingNotifier::new(false);

        assert!(fast_gate(1_000).resolve(&session, &notifier, "red shoes").await);
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn times_out_when_marker_persists() {
        let session = FakeSession::single(FakePage::new("https://serp.test/").with_present(MARKER));
        let notifier = RecordingNotifier::new(false);

        let gate = fast_gate(30);
        assert!(!gate.resolve(&session, &notifier, "red shoes").await);
        // Exactly one alert per pause.
        assert_eq!(notifier.count(), 1);

        // A later invocation is an independent state instance with its own alert.
        assert!(!gate.resolve(&session, &notifier, "red shoes").await);
        assert_eq!(notifier.count(), 2);
    }

    #[tokio::test]
    async fn already_clear_marker_resolves_without_alert() {
        let session = FakeSession::single(FakePage::new("https://serp.test/"));
        let notifier = RecordingNotifier::new(false);

        assert!(fast_gate(1_000).resolve(&session, &notifier, "red shoes").await);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn alert_failure_never_blocks_resolution() {
        let session = FakeSession::single(FakePage::new("https://serp.test/")).countdown(MARKER, 2);
        let notifier = RecordingNotifier::new(true);

        assert!(fast_gate(1_000).resolve(&session, &notifier, "red shoes").await);
        assert_eq!(notifier.count(), 1);
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let bad_poll = CaptchaConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert!(bad_poll.validate().is_err());

        let bad_ceiling = CaptchaConfig {
            wait_ceiling_secs: 0,
            ..Default::default()
        };
        assert!(bad_ceiling.validate().is_err());

        assert!(CaptchaConfig::default().validate().is_ok());
    }
}
