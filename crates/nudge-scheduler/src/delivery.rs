//! Delivery actions: how a fired reminder reaches its owner.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::SchedulerError;

/// Type alias for the delivery action: `(owner_id, message) -> result`.
///
/// Failures are reported back to the notifier, which logs them and moves on.
pub type DeliveryAction = Box<
    dyn Fn(i64, String) -> Pin<Box<dyn Future<Output = Result<(), SchedulerError>> + Send>>
        + Send
        + Sync,
>;

/// Delivery that only logs the reminder. Used when no webhook is configured.
pub fn log_delivery() -> DeliveryAction {
    Box::new(|user_id, message| {
        Box::pin(async move {
            info!(user_id, %message, "reminder fired");
            Ok(())
        })
    })
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    user_id: i64,
    message: String,
}

/// Delivery that POSTs `{"user_id": .., "message": ..}` to `url`.
///
/// Any non-2xx response is a delivery failure.
pub fn webhook_delivery(url: impl Into<String>) -> Result<DeliveryAction, SchedulerError> {
    let http = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| SchedulerError::InvalidConfig(format!("HTTP client: {}", e)))?;
    let url: Arc<str> = Arc::from(url.into());

    Ok(Box::new(move |user_id, message| {
        let http = http.clone();
        let url = Arc::clone(&url);
        Box::pin(async move {
            let response = http
                .post(url.as_ref())
                .json(&WebhookPayload { user_id, message })
                .send()
                .await
                .map_err(|e| SchedulerError::Delivery(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(SchedulerError::Delivery(format!(
                    "webhook returned {}",
                    status
                )));
            }

            debug!(user_id, %status, "webhook delivered reminder");
            Ok(())
        })
    }))
}
