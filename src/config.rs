//! Configuration types for qbit-brush

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard floor for the cycle interval.
///
/// Cycles hammer the client's torrent list and RSS endpoints; anything more
/// frequent than this is excessive polling. [`Config::effective_interval`]
/// clamps to this value.
pub const MIN_CYCLE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Connection settings for one qBittorrent instance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Display name used in logs, events, and notifications
    pub name: String,

    /// Base URL of the WebUI API, e.g. "http://localhost:8080"
    pub base_url: String,

    /// WebUI username (None when the client allows unauthenticated access)
    #[serde(default)]
    pub username: Option<String>,

    /// WebUI password
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// Cycle behavior: interval, prune action, and rate thresholds
///
/// Groups the settings that shape a single control cycle. Used as a nested
/// sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrushConfig {
    /// How often a cycle runs (default: 15 minutes)
    ///
    /// Floor-clamped to [`MIN_CYCLE_INTERVAL`] by
    /// [`Config::effective_interval`]; the stored value is left untouched so
    /// it round-trips through serialization.
    #[serde(default = "default_cycle_interval", with = "duration_serde")]
    pub interval: Duration,

    /// What to do with a prune-eligible torrent (default: pause)
    #[serde(default)]
    pub action: PruneAction,

    /// Target category for pruning, quota accounting, and admissions
    ///
    /// `Some(name)` restricts pruning to torrents in that exact category,
    /// counts only that category's torrents against the size ceiling, and
    /// tags admitted torrents with it. `None` disables the prune category
    /// constraint and counts every torrent on the client toward the ceiling
    /// (the broader sum admits less, never more).
    #[serde(default)]
    pub category: Option<String>,

    /// Per-torrent upload floor in bytes/sec (default: None)
    ///
    /// A completed torrent is prune-eligible only when both its long-run
    /// average and its instantaneous upload rate are below this floor.
    /// `None` disables rate-based pruning entirely.
    #[serde(default)]
    pub min_torrent_upload_bps: Option<u64>,

    /// Client-wide upload ceiling in bytes/sec (default: None)
    ///
    /// When the client's aggregate upload rate is at or above this ceiling
    /// the whole cycle is skipped for that client: active uploads are
    /// already earning, so neither pruning nor admission should disturb
    /// them. `None` disables the guard.
    #[serde(default)]
    pub max_client_upload_bps: Option<u64>,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            interval: default_cycle_interval(),
            action: PruneAction::default(),
            category: None,
            min_torrent_upload_bps: None,
            max_client_upload_bps: None,
        }
    }
}

/// RSS admission settings: feeds, size budget, and article filters
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Whether the admission pass runs at all (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Names of RSS feeds registered on the client, processed in this order
    #[serde(default)]
    pub feeds: Vec<String>,

    /// Size ceiling in bytes for the target category (default: 10 TiB)
    ///
    /// Each admission pass starts from `ceiling - current category usage`
    /// and admits articles until that budget is spent.
    #[serde(default = "default_size_ceiling")]
    pub size_ceiling_bytes: u64,

    /// Discard articles published earlier than now minus this window
    ///
    /// `None` (or a zero window) disables staleness filtering. When a
    /// window is set, articles whose publish date the client did not report
    /// (or reported unparseably) are also discarded.
    #[serde(default, with = "optional_duration_serde")]
    pub max_article_age: Option<Duration>,

    /// Regex an article title must match to be admitted
    ///
    /// `None` or an empty string admits any title.
    #[serde(default)]
    pub title_pattern: Option<String>,

    /// Size-annotation units accepted in article titles (default: [GB])
    ///
    /// An article declares its size as a bracketed annotation such as
    /// `[12.5 GB]`. Annotations in a unit outside this set are treated as
    /// absent, and articles without a declared size are never admitted.
    #[serde(default = "default_size_units")]
    pub size_units: Vec<SizeUnit>,

    /// Maximum number of admitted titles remembered for dedup (default: 1000)
    ///
    /// When the set outgrows this cap it is truncated to the most recently
    /// admitted half.
    #[serde(default = "default_dedup_cap")]
    pub dedup_cap: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            feeds: Vec::new(),
            size_ceiling_bytes: default_size_ceiling(),
            max_article_age: None,
            title_pattern: None,
            size_units: default_size_units(),
            dedup_cap: default_dedup_cap(),
        }
    }
}

/// Notification configuration (webhooks)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Whether consolidated per-pass notifications are sent (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Webhook endpoints receiving the notification payloads
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

/// Webhook endpoint configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// URL to POST to
    pub url: String,

    /// Optional authentication header value
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Timeout for webhook requests (default: 30 seconds)
    #[serde(default = "default_webhook_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// Retry behavior for transient client failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial call (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Main configuration for [`BrushManager`](crate::BrushManager)
///
/// Fields are organized into logical sub-configs:
/// - [`brush`](BrushConfig) — cycle interval, prune action, rate thresholds
/// - [`admission`](AdmissionConfig) — feeds, size budget, article filters
/// - [`notifications`](NotificationConfig) — webhook delivery
/// - [`retry`](RetryConfig) — backoff for transient client failures
///
/// The configuration is read-only to the control loop: a cycle never
/// mutates it, and the host may rebuild the manager to apply changes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// qBittorrent instances to manage (at least one required)
    #[serde(default)]
    pub clients: Vec<ClientConfig>,

    /// Cycle behavior settings
    #[serde(default)]
    pub brush: BrushConfig,

    /// RSS admission settings
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Notification settings
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Retry settings for client calls
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Cycle interval with the polling floor applied
    pub fn effective_interval(&self) -> Duration {
        self.brush.interval.max(MIN_CYCLE_INTERVAL)
    }

    /// Validate the configuration, returning the first problem found
    ///
    /// Checks that at least one client is configured with a usable base URL
    /// and a unique non-empty name, that the admission pattern compiles, and
    /// that admission settings are coherent when the pass is enabled.
    pub fn validate(&self) -> Result<()> {
        if self.clients.is_empty() {
            return Err(Error::config(
                "at least one client must be configured",
                Some("clients"),
            ));
        }

        let mut seen_names = std::collections::HashSet::new();
        for client in &self.clients {
            if client.name.is_empty() {
                return Err(Error::config("client name must not be empty", Some("clients")));
            }
            if !seen_names.insert(client.name.as_str()) {
                return Err(Error::config(
                    format!("duplicate client name: {}", client.name),
                    Some("clients"),
                ));
            }
            url::Url::parse(&client.base_url).map_err(|e| {
                Error::config(
                    format!("invalid base_url for client {}: {}", client.name, e),
                    Some("clients"),
                )
            })?;
        }

        if let Some(pattern) = self.admission.title_pattern.as_deref()
            && !pattern.is_empty()
        {
            regex::Regex::new(pattern).map_err(|e| {
                Error::config(
                    format!("invalid title_pattern: {}", e),
                    Some("admission.title_pattern"),
                )
            })?;
        }

        if self.admission.enabled {
            if self.admission.feeds.is_empty() {
                return Err(Error::config(
                    "admission is enabled but no feeds are configured",
                    Some("admission.feeds"),
                ));
            }
            if self.admission.size_units.is_empty() {
                return Err(Error::config(
                    "admission is enabled but no size units are accepted",
                    Some("admission.size_units"),
                ));
            }
            if self.admission.size_ceiling_bytes == 0 {
                return Err(Error::config(
                    "admission is enabled with a zero size ceiling",
                    Some("admission.size_ceiling_bytes"),
                ));
            }
        }

        if self.admission.dedup_cap < 2 {
            return Err(Error::config(
                "dedup_cap must be at least 2",
                Some("admission.dedup_cap"),
            ));
        }

        Ok(())
    }
}

/// What the prune pass does with an eligible torrent
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneAction {
    /// Stop seeding but keep the torrent and its data (default)
    #[default]
    Pause,
    /// Remove the torrent, keep downloaded files on disk
    Delete,
    /// Remove the torrent and its downloaded files
    DeleteWithFiles,
}

impl std::fmt::Display for PruneAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PruneAction::Pause => write!(f, "pause"),
            PruneAction::Delete => write!(f, "delete"),
            PruneAction::DeleteWithFiles => write!(f, "delete_with_files"),
        }
    }
}

/// Units recognized in bracketed size annotations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SizeUnit {
    /// Kilobytes (1024 bytes)
    Kb,
    /// Megabytes (1024^2 bytes)
    Mb,
    /// Gigabytes (1024^3 bytes)
    Gb,
    /// Terabytes (1024^4 bytes)
    Tb,
}

impl SizeUnit {
    /// Bytes per one of this unit
    pub fn bytes(self) -> u64 {
        match self {
            SizeUnit::Kb => 1 << 10,
            SizeUnit::Mb => 1 << 20,
            SizeUnit::Gb => 1 << 30,
            SizeUnit::Tb => 1 << 40,
        }
    }

    /// Annotation tag for this unit
    pub fn tag(self) -> &'static str {
        match self {
            SizeUnit::Kb => "KB",
            SizeUnit::Mb => "MB",
            SizeUnit::Gb => "GB",
            SizeUnit::Tb => "TB",
        }
    }

    /// Parse a unit tag as it appears in a title annotation ("GB", "mb", ...)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "KB" => Some(SizeUnit::Kb),
            "MB" => Some(SizeUnit::Mb),
            "GB" => Some(SizeUnit::Gb),
            "TB" => Some(SizeUnit::Tb),
            _ => None,
        }
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_cycle_interval() -> Duration {
    Duration::from_secs(15 * 60) // 15 minutes
}

fn default_size_ceiling() -> u64 {
    10 << 40 // 10 TiB
}

fn default_size_units() -> Vec<SizeUnit> {
    vec![SizeUnit::Gb]
}

fn default_dedup_cap() -> usize {
    1000
}

fn default_webhook_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

/// Serde helper encoding Duration as whole seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serde helper encoding Option<Duration> as whole seconds
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
