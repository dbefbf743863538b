//! Consolidated webhook notifications
//!
//! One notification per client per pass type per cycle, carrying a title
//! line and one body line per acted-on item. Delivery is fire-and-forget:
//! a spawned task POSTs to every configured webhook with a per-webhook
//! timeout. Failures surface as a warning plus an
//! [`Event::WebhookFailed`], never as back-pressure on the cycle.

use crate::config::{NotificationConfig, PruneAction, WebhookConfig};
use crate::error::{Error, Result};
use crate::types::{AdmissionSummary, Event, PruneSummary, WebhookPayload};
use crate::utils::format_size;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Sends consolidated pass summaries to configured webhooks
pub(crate) struct Notifier {
    enabled: bool,
    webhooks: Vec<WebhookConfig>,
    http: reqwest::Client,
    event_tx: broadcast::Sender<Event>,
}

impl Notifier {
    pub(crate) fn new(
        config: &NotificationConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("qbit-brush")
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e), None))?;
        Ok(Self {
            enabled: config.enabled,
            webhooks: config.webhooks.clone(),
            http,
            event_tx,
        })
    }

    /// Announce a prune pass that acted on at least one torrent
    pub(crate) fn notify_prune(&self, client: &str, action: PruneAction, summary: &PruneSummary) {
        let verb = match action {
            PruneAction::Pause => "Paused",
            PruneAction::Delete => "Deleted",
            PruneAction::DeleteWithFiles => "Deleted (with files)",
        };
        let body = summary
            .pruned
            .iter()
            .map(|t| {
                format!(
                    "{} from {}, size {}, uploaded {}",
                    t.name,
                    t.site.as_deref().unwrap_or("unknown site"),
                    format_size(t.size),
                    format_size(t.uploaded),
                )
            })
            .collect();
        self.dispatch(WebhookPayload {
            pass: "prune".to_string(),
            client: client.to_string(),
            title: format!("{} {} torrents on {}", verb, summary.pruned.len(), client),
            body,
            timestamp: chrono::Utc::now().timestamp(),
        });
    }

    /// Announce an admission pass that submitted at least one torrent
    pub(crate) fn notify_admission(&self, client: &str, summary: &AdmissionSummary) {
        let total: u64 = summary.admitted.iter().map(|a| a.size).sum();
        let body = summary
            .admitted
            .iter()
            .map(|a| format!("{} ({})", a.title, format_size(a.size)))
            .collect();
        self.dispatch(WebhookPayload {
            pass: "admission".to_string(),
            client: client.to_string(),
            title: format!(
                "Admitted {} torrents ({}) on {}, {} budget left",
                summary.admitted.len(),
                format_size(total),
                client,
                format_size(summary.remaining_quota),
            ),
            body,
            timestamp: chrono::Utc::now().timestamp(),
        });
    }

    /// POST the payload to every configured webhook (fire and forget)
    fn dispatch(&self, payload: WebhookPayload) {
        if !self.enabled || self.webhooks.is_empty() {
            return;
        }

        let webhooks = self.webhooks.clone();
        let http = self.http.clone();
        let event_tx = self.event_tx.clone();
        let payload = Arc::new(payload);

        tokio::spawn(async move {
            for webhook in webhooks {
                let mut request = http
                    .post(&webhook.url)
                    .json(payload.as_ref())
                    .timeout(webhook.timeout);
                if let Some(auth) = &webhook.auth_header {
                    request = request.header("Authorization", auth);
                }

                match request.send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!(url = %webhook.url, "webhook sent");
                    }
                    Ok(response) => {
                        let error = format!("webhook returned status {}", response.status());
                        warn!(url = %webhook.url, error = %error, "webhook failed");
                        event_tx
                            .send(Event::WebhookFailed {
                                url: webhook.url,
                                error,
                            })
                            .ok();
                    }
                    Err(e) => {
                        let error = e.to_string();
                        warn!(url = %webhook.url, error = %error, "webhook failed");
                        event_tx
                            .send(Event::WebhookFailed {
                                url: webhook.url,
                                error,
                            })
                            .ok();
                    }
                }
            }
        });
    }
}
