//! Hit-set change notifications.
//!
//! Every change of a category's hit or passthrough set is announced as
//! `UPDATE_CATEGORY_HITSET { category }` on an in-process broadcast channel.
//! When a forward URL is configured the same payload is posted to the process
//! that owns enforcement.

use std::time::Duration;

use catwatch_core::HitSetUpdated;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Buffered notifications per subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Forwarder {
    client: reqwest::Client,
    url: String,
}

/// Emits hit-set change notifications.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<HitSetUpdated>,
    forward: Option<Forwarder>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl Notifier {
    /// Creates a notifier with a local channel only.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, forward: None }
    }

    /// Also posts every notification to `url`.
    pub fn with_forward_url(mut self, url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("Catwatch/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        let url = url.into();
        info!("Forwarding hit-set notifications to {}", url);
        self.forward = Some(Forwarder { client, url });
        Ok(self)
    }

    /// Subscribes to notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<HitSetUpdated> {
        self.tx.subscribe()
    }

    /// Announces that `category`'s sets changed.
    pub fn notify(&self, category: &str) {
        let event = HitSetUpdated::new(category);
        info!("Send UPDATE_CATEGORY_HITSET notification for category {}", category);

        if self.tx.send(event.clone()).is_err() {
            debug!("No local subscribers for hit-set notifications");
        }

        if let Some(forward) = &self.forward {
            let forward = forward.clone();
            tokio::spawn(async move {
                let result = forward
                    .client
                    .post(&forward.url)
                    .json(&event)
                    .send()
                    .await
                    .and_then(|response| response.error_for_status());
                if let Err(e) = result {
                    warn!("Failed to forward hit-set notification for {}: {}", event.category, e);
                }
            });
        }
    }
}
