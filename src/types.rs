//! Core types for qbit-brush

use crate::config::PruneAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a torrent on the client (the info-hash string)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TorrentHash(pub String);

impl TorrentHash {
    /// Create a new TorrentHash
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Borrow the inner hash string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TorrentHash {
    fn from(hash: String) -> Self {
        Self(hash)
    }
}

impl From<&str> for TorrentHash {
    fn from(hash: &str) -> Self {
        Self(hash.to_string())
    }
}

impl std::fmt::Display for TorrentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A completed torrent as reported by the client
///
/// Only the fields the control loop reasons about; the gateway discards the
/// rest of the client's torrent object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Torrent {
    /// Client-side identifier
    pub hash: TorrentHash,

    /// Display name
    pub name: String,

    /// Category, None when uncategorized
    pub category: Option<String>,

    /// Total size in bytes
    pub size: u64,

    /// Bytes uploaded over the torrent's lifetime
    pub uploaded: u64,

    /// Instantaneous upload rate in bytes/sec
    pub upload_rate: u64,

    /// When the download completed (falls back to the add time when the
    /// client never recorded completion; None when neither is known)
    pub completed_at: Option<DateTime<Utc>>,

    /// Tracker URL, used to derive the origin site for notifications
    pub tracker: Option<String>,
}

impl Torrent {
    /// Seconds this torrent has been seeding as of `now`
    ///
    /// Returns 0 when the completion time is untracked or lies in the
    /// future (clock skew between host and client).
    pub fn seeding_secs(&self, now: DateTime<Utc>) -> u64 {
        match self.completed_at {
            Some(done) => (now - done).num_seconds().max(0) as u64,
            None => 0,
        }
    }

    /// Lifetime average upload rate in bytes/sec as of `now`
    ///
    /// A torrent with seeding duration 0 has average rate 0, never a
    /// division fault.
    pub fn avg_upload_rate(&self, now: DateTime<Utc>) -> u64 {
        let secs = self.seeding_secs(now);
        if secs == 0 { 0 } else { self.uploaded / secs }
    }

    /// Origin site derived from the tracker URL
    pub fn site(&self) -> Option<String> {
        self.tracker.as_deref().and_then(crate::utils::tracker_site)
    }
}

/// An article from one of the client's RSS feeds
///
/// The declared size is not a field: the admission filter extracts it from
/// the bracketed annotation in the title at decision time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedArticle {
    /// Title, unique within a feed; the dedup key
    pub title: String,

    /// Torrent download URL
    pub url: String,

    /// Publish timestamp, None when the client reported none or an
    /// unparseable one
    pub published: Option<DateTime<Utc>>,
}

/// One torrent acted on by a prune pass
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrunedTorrent {
    /// Display name
    pub name: String,
    /// Origin site, when derivable from the tracker URL
    pub site: Option<String>,
    /// Total size in bytes
    pub size: u64,
    /// Bytes uploaded over the torrent's lifetime
    pub uploaded: u64,
}

/// One article submitted by an admission pass
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdmittedArticle {
    /// Article title
    pub title: String,
    /// Declared size in bytes, as reserved against the quota
    pub size: u64,
    /// Feed the article came from
    pub feed: String,
}

/// Outcome of one prune pass on one client
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PruneSummary {
    /// Torrents successfully acted on
    pub pruned: Vec<PrunedTorrent>,
    /// Eligible torrents whose action failed (logged, not retried)
    pub failed: u32,
}

/// Outcome of one admission pass on one client
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdmissionSummary {
    /// Articles the client accepted
    pub admitted: Vec<AdmittedArticle>,
    /// Eligible articles the client declined or that failed to submit
    pub failed: u32,
    /// Budget at the start of the pass, in bytes
    pub initial_quota: u64,
    /// Budget left after the pass, in bytes
    pub remaining_quota: u64,
}

/// How one client's portion of a cycle ended
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Both passes ran (admission only when enabled)
    Completed {
        /// Prune pass results
        prune: PruneSummary,
        /// Admission pass results; None when admission is disabled or the
        /// pass was skipped (exhausted budget, usage query failure)
        admission: Option<AdmissionSummary>,
    },
    /// The upload guard tripped; no work was attempted
    Throttled {
        /// Client's aggregate upload rate at the time, bytes/sec
        upload_rate: u64,
    },
    /// The client could not be queried; its portion was skipped
    Unreachable {
        /// Rendered error
        error: String,
    },
    /// Cancellation stopped the cycle before this client finished
    Cancelled,
}

/// One client's report within a [`CycleReport`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientCycleReport {
    /// Configured client name
    pub client: String,
    /// How this client's portion ended
    pub outcome: CycleOutcome,
}

/// Consolidated result of one full cycle across all configured clients
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Per-client outcomes, in configuration order
    pub clients: Vec<ClientCycleReport>,
}

impl CycleReport {
    /// Total torrents pruned across all clients this cycle
    pub fn total_pruned(&self) -> usize {
        self.clients
            .iter()
            .filter_map(|c| match &c.outcome {
                CycleOutcome::Completed { prune, .. } => Some(prune.pruned.len()),
                _ => None,
            })
            .sum()
    }

    /// Total articles admitted across all clients this cycle
    pub fn total_admitted(&self) -> usize {
        self.clients
            .iter()
            .filter_map(|c| match &c.outcome {
                CycleOutcome::Completed {
                    admission: Some(a), ..
                } => Some(a.admitted.len()),
                _ => None,
            })
            .sum()
    }
}

/// Events broadcast while cycles run
///
/// Subscribe via [`BrushManager::subscribe`](crate::BrushManager::subscribe).
/// Slow subscribers may miss events (broadcast semantics); the consolidated
/// [`CycleReport`] is the loss-free record of a cycle.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A cycle began
    CycleStarted,

    /// A cycle finished; carries the consolidated report
    CycleCompleted {
        /// Report for the finished cycle
        report: CycleReport,
    },

    /// The upload guard suppressed all work for one client
    GuardTripped {
        /// Client name
        client: String,
        /// Measured aggregate upload rate, bytes/sec
        upload_rate: u64,
        /// Configured ceiling, bytes/sec
        ceiling: u64,
    },

    /// A torrent was pruned
    TorrentPruned {
        /// Client name
        client: String,
        /// Torrent name
        name: String,
        /// Action applied
        action: PruneAction,
    },

    /// A prune action failed for one torrent (pass continues)
    PruneFailed {
        /// Client name
        client: String,
        /// Torrent name
        name: String,
        /// Rendered error
        error: String,
    },

    /// An article was submitted and accepted
    ArticleAdmitted {
        /// Client name
        client: String,
        /// Feed the article came from
        feed: String,
        /// Article title
        title: String,
        /// Declared size in bytes
        size: u64,
    },

    /// An article submission was declined or failed (pass continues)
    AdmissionFailed {
        /// Client name
        client: String,
        /// Article title
        title: String,
        /// Rendered error, or "declined by client"
        error: String,
    },

    /// A configured feed was skipped this cycle
    FeedSkipped {
        /// Client name
        client: String,
        /// Feed name
        feed: String,
        /// Rendered error
        error: String,
    },

    /// A client could not be queried; its portion of the cycle was skipped
    ClientUnreachable {
        /// Client name
        client: String,
        /// Rendered error
        error: String,
    },

    /// A webhook delivery failed
    WebhookFailed {
        /// Webhook URL
        url: String,
        /// Rendered error
        error: String,
    },
}

/// JSON body POSTed to configured webhooks
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Pass type: "prune" or "admission"
    pub pass: String,
    /// Client the pass ran against
    pub client: String,
    /// Title line, e.g. "Pruned 3 torrents on seedbox"
    pub title: String,
    /// One line per acted-on torrent/article
    pub body: Vec<String>,
    /// Unix timestamp of delivery
    pub timestamp: i64,
}
