//! Notifier daemon.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use miette::Result;
use tokio::sync::watch;
use tracing::info;

use nudge_scheduler::{
    JsonFileRepository, Notifier, NotifierConfig, ReminderRepository, log_delivery,
    webhook_delivery,
};

/// Settings for `nudge run`.
pub struct DaemonConfig {
    pub store: PathBuf,
    pub poll_interval: u64,
    pub webhook_url: Option<String>,
    pub align_zone: Option<String>,
    pub align: bool,
}

pub async fn run(config: DaemonConfig) -> Result<()> {
    let notifier_config = NotifierConfig {
        poll_interval: Duration::from_secs(config.poll_interval),
        align_to_interval: config.align,
        align_zone: config.align_zone,
    };
    notifier_config
        .validate()
        .map_err(|e| miette::miette!("{}", e))?;

    let repository = JsonFileRepository::open(&config.store)
        .await
        .map_err(|e| miette::miette!("failed to open store {}: {}", config.store.display(), e))?;
    let repository: Arc<dyn ReminderRepository> = Arc::new(repository);

    let active = repository
        .get_active_reminders()
        .await
        .map_err(|e| miette::miette!("{}", e))?
        .len();
    info!(store = %config.store.display(), active, "reminder store ready");

    let deliver = match config.webhook_url {
        Some(url) => {
            info!(%url, "delivering reminders by webhook");
            webhook_delivery(url).map_err(|e| miette::miette!("{}", e))?
        }
        None => {
            info!("no webhook configured, fired reminders will only be logged");
            log_delivery()
        }
    };

    let notifier = Notifier::new(repository, deliver).with_config(notifier_config);

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Handle shutdown signals
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    notifier.run(shutdown_rx).await;
    Ok(())
}
