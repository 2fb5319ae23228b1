//! Rank Auditor entry point
//!
//! Usage: `rank-auditor [config.json]`
//!
//! Loads configuration and the task ledger, launches one humanlike browser
//! session and processes every pending row. A crash alert goes out if the
//! run dies after setup.

use std::path::Path;

use anyhow::Context;
use tracing::{error, info, warn};

use rank_auditor::bot::Automator;
use rank_auditor::browser::DriverSession;
use rank_auditor::ledger::TaskLedger;
use rank_auditor::notify::{Notifier, NullNotifier, SmtpNotifier};
use rank_auditor::stats::RunStatsSnapshot;
use rank_auditor::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = rank_auditor::init_logging();

    info!("Starting Rank Auditor");
    if let Some(dir) = rank_auditor::log_dir() {
        info!("Log files saved to: {}", dir.display());
    }

    let config_path = std::env::args().nth(1);
    let config = AppConfig::load(config_path.as_deref().map(Path::new))?;
    config.validate().context("Configuration is invalid")?;

    let notifier: Box<dyn Notifier> = if config.smtp.enabled {
        Box::new(SmtpNotifier::new(config.smtp.clone()))
    } else {
        info!("Alert mail is disabled");
        Box::new(NullNotifier)
    };

    let result = run_batch(&config, notifier.as_ref()).await;

    if let Err(e) = &result {
        error!("The run crashed: {:#}", e);
        let body = format!(
            "The rank auditor run has crashed.\n\nError:\n{:#}\n\n- Automated System",
            e
        );
        if let Err(alert_err) = notifier
            .send_alert("Rank Auditor Alert: RUN CRASHED", &body)
            .await
        {
            error!("Failed to send the crash alert: {}", alert_err);
        }
    }

    let snapshot = result?;
    info!("--- Rank Auditor finished: {:?} ---", snapshot);
    Ok(())
}

async fn run_batch(
    config: &AppConfig,
    notifier: &dyn Notifier,
) -> anyhow::Result<RunStatsSnapshot> {
    let ledger = TaskLedger::load(&config.ledger_path)
        .with_context(|| format!("Failed to load the task ledger from {}", config.ledger_path))?;

    let session = DriverSession::launch(&config.browser)
        .await
        .context("Failed to launch the browser session")?;

    let automator = Automator::new(&session, config, notifier, ledger);
    let snapshot = automator.run().await;

    if let Err(e) = session.quit().await {
        warn!("Failed to close the browser session: {}", e);
    }

    Ok(snapshot)
}
