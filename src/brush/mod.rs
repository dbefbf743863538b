//! Cycle orchestration: guard, prune pass, admission pass
//!
//! [`BrushManager`] runs one control cycle at a time across all configured
//! clients. The order inside a cycle is fixed: the throughput guard runs
//! first (active uploads outrank everything), then the prune pass, then the
//! admission pass. Cycles are serialized by an async lock that also owns
//! the dedup set, so a manual `run_cycle()` call and the periodic scheduler
//! can never overlap or double-spend the quota.
//!
//! Failures stay contained at the smallest unit: a torrent action or
//! article submission failure is counted and the pass continues; a feed
//! fetch failure skips that feed; an unreachable client skips that client.
//! Nothing a cycle encounters stops future cycles.

mod notify;

use crate::config::{Config, PruneAction};
use crate::dedup::DedupSet;
use crate::error::{Error, Result};
use crate::filter::{AdmissionFilter, AdmissionVerdict, PruneFilter};
use crate::gateway::{ClientGateway, QbitGateway};
use crate::quota::Quota;
use crate::types::{
    AdmissionSummary, AdmittedArticle, ClientCycleReport, CycleOutcome, CycleReport, Event,
    PruneSummary, PrunedTorrent,
};
use chrono::Utc;
use notify::Notifier;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Broadcast channel capacity for [`Event`]s
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One configured client and the gateway talking to it
struct ClientHandle {
    name: String,
    gateway: Arc<dyn ClientGateway>,
}

/// Steady-state manager for one or more qBittorrent instances
///
/// Construct with [`BrushManager::new`] (builds a [`QbitGateway`] per
/// configured client) or [`BrushManager::with_gateways`] to supply custom
/// gateway implementations. Drive it either by calling
/// [`run_cycle`](Self::run_cycle) directly or by spawning a
/// [`BrushScheduler`](crate::BrushScheduler).
pub struct BrushManager {
    config: Arc<Config>,
    clients: Vec<ClientHandle>,
    prune_filter: PruneFilter,
    admission_filter: AdmissionFilter,
    /// Owns the cross-cycle dedup state; holding it is what serializes cycles
    cycle_state: Mutex<DedupSet>,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
    notifier: Notifier,
}

impl BrushManager {
    /// Build a manager with a [`QbitGateway`] per configured client
    ///
    /// # Errors
    /// Returns a config error when validation fails or a gateway cannot be
    /// constructed.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let gateways = config
            .clients
            .iter()
            .map(|client| -> Result<(String, Arc<dyn ClientGateway>)> {
                let gateway = QbitGateway::new(client, config.retry.clone())?;
                Ok((client.name.clone(), Arc::new(gateway) as Arc<dyn ClientGateway>))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::with_gateways(config, gateways)
    }

    /// Build a manager around caller-supplied gateways
    ///
    /// The gateways replace the ones `new` would build from
    /// `config.clients`; everything else (filters, thresholds, feeds)
    /// still comes from the config.
    pub fn with_gateways(
        config: Config,
        gateways: Vec<(String, Arc<dyn ClientGateway>)>,
    ) -> Result<Self> {
        if gateways.is_empty() {
            return Err(Error::config(
                "at least one client gateway is required",
                Some("clients"),
            ));
        }

        let prune_filter = PruneFilter::from_config(&config.brush);
        let admission_filter = AdmissionFilter::from_config(&config.admission)?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let notifier = Notifier::new(&config.notifications, event_tx.clone())?;
        let cycle_state = Mutex::new(DedupSet::new(config.admission.dedup_cap));

        Ok(Self {
            config: Arc::new(config),
            clients: gateways
                .into_iter()
                .map(|(name, gateway)| ClientHandle { name, gateway })
                .collect(),
            prune_filter,
            admission_filter,
            cycle_state,
            event_tx,
            cancel: CancellationToken::new(),
            notifier,
        })
    }

    /// The configuration this manager runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to cycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token that cancels in-flight and future cycles when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop promptly: the current cycle halts before its next destructive
    /// step and the scheduler (if any) exits
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Run one full cycle across all configured clients
    ///
    /// Clients are processed sequentially in configuration order. Cycles
    /// are serialized: a concurrent call waits until the running cycle
    /// finishes. Already-applied actions are never rolled back on
    /// cancellation.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut dedup = self.cycle_state.lock().await;
        self.event_tx.send(Event::CycleStarted).ok();

        let mut report = CycleReport::default();
        for client in &self.clients {
            if self.cancel.is_cancelled() {
                info!(client = %client.name, "cycle cancelled, remaining clients skipped");
                break;
            }
            let outcome = self.run_client(client, &mut dedup).await;
            report.clients.push(ClientCycleReport {
                client: client.name.clone(),
                outcome,
            });
        }

        self.event_tx
            .send(Event::CycleCompleted {
                report: report.clone(),
            })
            .ok();
        report
    }

    /// Guard, prune, and admit for a single client
    async fn run_client(&self, client: &ClientHandle, dedup: &mut DedupSet) -> CycleOutcome {
        if let Some(ceiling) = self.config.brush.max_client_upload_bps.filter(|&c| c > 0) {
            let upload_rate = client.gateway.upload_rate().await;
            if upload_rate >= ceiling {
                info!(
                    client = %client.name,
                    upload_rate,
                    ceiling,
                    "upload ceiling reached, skipping prune and admission"
                );
                self.event_tx
                    .send(Event::GuardTripped {
                        client: client.name.clone(),
                        upload_rate,
                        ceiling,
                    })
                    .ok();
                return CycleOutcome::Throttled { upload_rate };
            }
        }

        let prune = match self.prune_pass(client).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(client = %client.name, error = %e, "client unreachable, skipping");
                self.event_tx
                    .send(Event::ClientUnreachable {
                        client: client.name.clone(),
                        error: e.to_string(),
                    })
                    .ok();
                return CycleOutcome::Unreachable {
                    error: e.to_string(),
                };
            }
        };

        if self.cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        let admission = if self.config.admission.enabled {
            self.admission_pass(client, dedup).await
        } else {
            None
        };

        if !prune.pruned.is_empty() {
            self.notifier
                .notify_prune(&client.name, self.config.brush.action, &prune);
        }
        if let Some(admission) = admission.as_ref()
            && !admission.admitted.is_empty()
        {
            self.notifier.notify_admission(&client.name, admission);
        }

        CycleOutcome::Completed { prune, admission }
    }

    /// List completed torrents and apply the configured action to the
    /// stalled ones
    async fn prune_pass(&self, client: &ClientHandle) -> Result<PruneSummary> {
        let torrents = client.gateway.completed_torrents().await?;
        let now = Utc::now();
        let eligible: Vec<_> = torrents
            .iter()
            .filter(|t| self.prune_filter.eligible(t, now))
            .collect();
        info!(
            client = %client.name,
            completed = torrents.len(),
            eligible = eligible.len(),
            "prune pass"
        );

        let action = self.config.brush.action;
        let mut summary = PruneSummary::default();
        for torrent in eligible {
            if self.cancel.is_cancelled() {
                info!(client = %client.name, "cycle cancelled mid-prune");
                break;
            }

            let hash = std::slice::from_ref(&torrent.hash);
            let result = match action {
                PruneAction::Pause => client.gateway.stop_torrents(hash).await,
                PruneAction::Delete => client.gateway.delete_torrents(hash, false).await,
                PruneAction::DeleteWithFiles => client.gateway.delete_torrents(hash, true).await,
            };

            match result {
                Ok(()) => {
                    info!(
                        client = %client.name,
                        name = %torrent.name,
                        %action,
                        "pruned torrent"
                    );
                    self.event_tx
                        .send(Event::TorrentPruned {
                            client: client.name.clone(),
                            name: torrent.name.clone(),
                            action,
                        })
                        .ok();
                    summary.pruned.push(PrunedTorrent {
                        name: torrent.name.clone(),
                        site: torrent.site(),
                        size: torrent.size,
                        uploaded: torrent.uploaded,
                    });
                }
                Err(e) => {
                    warn!(
                        client = %client.name,
                        name = %torrent.name,
                        error = %e,
                        "prune action failed, continuing with remaining torrents"
                    );
                    self.event_tx
                        .send(Event::PruneFailed {
                            client: client.name.clone(),
                            name: torrent.name.clone(),
                            error: e.to_string(),
                        })
                        .ok();
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Admit new articles from the configured feeds within the size budget
    ///
    /// Returns None when the pass could not even establish a budget (usage
    /// query failed); an exhausted budget still yields a summary so the
    /// report shows why nothing was admitted.
    async fn admission_pass(
        &self,
        client: &ClientHandle,
        dedup: &mut DedupSet,
    ) -> Option<AdmissionSummary> {
        let category = self.config.brush.category.as_deref();
        let used = match client.gateway.category_size(category).await {
            Ok(used) => used,
            Err(e) => {
                // Failing closed: without a usage figure the budget is
                // unknown, and admitting against an unknown budget could
                // blow straight through the ceiling
                warn!(
                    client = %client.name,
                    error = %e,
                    "category usage unknown, skipping admissions this cycle"
                );
                return None;
            }
        };

        let ceiling = self.config.admission.size_ceiling_bytes;
        let mut quota = Quota::new(ceiling, used);
        let mut summary = AdmissionSummary {
            initial_quota: quota.remaining(),
            remaining_quota: quota.remaining(),
            ..AdmissionSummary::default()
        };

        if quota.is_exhausted() {
            info!(
                client = %client.name,
                used,
                ceiling,
                "size ceiling reached, nothing to admit"
            );
            return Some(summary);
        }

        let now = Utc::now();
        'feeds: for feed in &self.config.admission.feeds {
            let articles = match client.gateway.feed_articles(feed).await {
                Ok(articles) => articles,
                Err(e) => {
                    // One bad feed must not starve the ones after it
                    warn!(client = %client.name, feed = %feed, error = %e, "skipping feed");
                    self.event_tx
                        .send(Event::FeedSkipped {
                            client: client.name.clone(),
                            feed: feed.clone(),
                            error: e.to_string(),
                        })
                        .ok();
                    continue;
                }
            };
            debug!(client = %client.name, feed = %feed, articles = articles.len(), "fetched feed");

            for article in &articles {
                if self.cancel.is_cancelled() {
                    info!(client = %client.name, "cycle cancelled mid-admission");
                    break 'feeds;
                }

                let verdict = self.admission_filter.evaluate(article, dedup, &quota, now);
                let AdmissionVerdict::Admit { size } = verdict else {
                    continue;
                };

                // The budget is spent at the moment of decision; a failed
                // submission is not refunded within this pass
                quota.reserve(size);

                match client.gateway.add_torrent(&article.url, category).await {
                    Ok(true) => {
                        info!(
                            client = %client.name,
                            feed = %feed,
                            title = %article.title,
                            size,
                            "admitted torrent"
                        );
                        dedup.insert(article.title.clone());
                        self.event_tx
                            .send(Event::ArticleAdmitted {
                                client: client.name.clone(),
                                feed: feed.clone(),
                                title: article.title.clone(),
                                size,
                            })
                            .ok();
                        summary.admitted.push(AdmittedArticle {
                            title: article.title.clone(),
                            size,
                            feed: feed.clone(),
                        });
                    }
                    Ok(false) => {
                        warn!(
                            client = %client.name,
                            title = %article.title,
                            "client declined torrent"
                        );
                        self.event_tx
                            .send(Event::AdmissionFailed {
                                client: client.name.clone(),
                                title: article.title.clone(),
                                error: "declined by client".to_string(),
                            })
                            .ok();
                        summary.failed += 1;
                    }
                    Err(e) => {
                        warn!(
                            client = %client.name,
                            title = %article.title,
                            error = %e,
                            "torrent submission failed, continuing"
                        );
                        self.event_tx
                            .send(Event::AdmissionFailed {
                                client: client.name.clone(),
                                title: article.title.clone(),
                                error: e.to_string(),
                            })
                            .ok();
                        summary.failed += 1;
                    }
                }
            }
        }

        summary.remaining_quota = quota.remaining();
        Some(summary)
    }
}
