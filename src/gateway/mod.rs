//! Capability interface over the remote download client
//!
//! The control loop never touches a client's full API surface: everything
//! it needs is expressed by the [`ClientGateway`] trait, and every call
//! site depends on that trait alone. [`QbitGateway`] is the shipped
//! implementation speaking the qBittorrent WebUI API; tests substitute
//! their own implementations.

mod qbit;

pub use qbit::QbitGateway;

use crate::error::Result;
use crate::types::{FeedArticle, Torrent, TorrentHash};
use async_trait::async_trait;

/// Narrow capability surface the control loop needs from a download client
///
/// One gateway instance corresponds to one configured client. Methods that
/// query state fail with [`Error::UnreachableClient`](crate::Error) when
/// the client cannot be reached; an empty result is valid and distinct
/// from failure.
#[async_trait]
pub trait ClientGateway: Send + Sync {
    /// All torrents the client reports as completed
    async fn completed_torrents(&self) -> Result<Vec<Torrent>>;

    /// Sum of sizes of torrents in the category, in bytes
    ///
    /// `None` sums across every torrent on the client.
    async fn category_size(&self, category: Option<&str>) -> Result<u64>;

    /// Current aggregate upload rate in bytes/sec
    ///
    /// A throughput guard input, not correctness-critical: implementations
    /// fail soft and return 0 when the transfer stats are unavailable.
    async fn upload_rate(&self) -> u64;

    /// Stop (pause) the given torrents
    ///
    /// Idempotent: already-stopped or absent hashes are not an error.
    async fn stop_torrents(&self, hashes: &[TorrentHash]) -> Result<()>;

    /// Remove the given torrents, optionally with their downloaded files
    ///
    /// Idempotent like [`stop_torrents`](Self::stop_torrents).
    async fn delete_torrents(&self, hashes: &[TorrentHash], delete_files: bool) -> Result<()>;

    /// Refresh the named feed on the client, then return its articles
    ///
    /// Fails with [`Error::FeedNotFound`](crate::Error) when no feed of
    /// that name is registered on the client.
    async fn feed_articles(&self, feed: &str) -> Result<Vec<FeedArticle>>;

    /// Submit a new torrent by URL; returns whether the client accepted it
    ///
    /// Acceptance does not guarantee the download will complete.
    async fn add_torrent(&self, url: &str, category: Option<&str>) -> Result<bool>;
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
