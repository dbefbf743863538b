//! qBittorrent WebUI API implementation of [`ClientGateway`]
//!
//! Speaks the v2 WebUI API: cookie-session auth, form-encoded commands,
//! JSON queries. The session cookie lives in the HTTP client's cookie
//! store; a 403 triggers one re-login before the request is retried, so
//! expired sessions heal transparently. Transient network failures are
//! retried with backoff before a call is declared unreachable.

use super::ClientGateway;
use crate::config::{ClientConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::{FeedArticle, Torrent, TorrentHash};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

/// One torrent object from `torrents/info`, fields we care about
#[derive(Debug, Deserialize)]
struct TorrentInfo {
    hash: String,
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    uploaded: i64,
    #[serde(default)]
    upspeed: i64,
    #[serde(default)]
    completion_on: i64,
    #[serde(default)]
    added_on: i64,
    #[serde(default)]
    tracker: String,
}

/// Response shape of `transfer/info`
#[derive(Debug, Deserialize)]
struct TransferInfo {
    #[serde(default)]
    up_info_speed: u64,
}

/// [`ClientGateway`] implementation for one qBittorrent instance
pub struct QbitGateway {
    name: String,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
    http: reqwest::Client,
    retry: RetryConfig,
}

impl QbitGateway {
    /// Build a gateway from a client's connection settings
    ///
    /// # Errors
    /// Returns a config error when the base URL does not parse or the HTTP
    /// client cannot be constructed.
    pub fn new(config: &ClientConfig, retry: RetryConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| {
            Error::config(
                format!("invalid base_url for client {}: {}", config.name, e),
                Some("clients"),
            )
        })?;
        // Joining relative API paths needs a directory-style base
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .cookie_store(true)
            .user_agent("qbit-brush")
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e), None))?;

        Ok(Self {
            name: config.name.clone(),
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            http,
            retry,
        })
    }

    /// Configured client name (used in errors and logs)
    pub fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(&format!("api/v2/{}", path))
            .map_err(|e| Error::config(format!("invalid API path {}: {}", path, e), None))
    }

    /// Authenticate and store the session cookie
    async fn login(&self) -> Result<()> {
        let url = self.endpoint("auth/login")?;
        let form = [
            ("username", self.username.clone().unwrap_or_default()),
            ("password", self.password.clone().unwrap_or_default()),
        ];

        let response = with_retry(&self.retry, || async {
            self.http
                .post(url.clone())
                .form(&form)
                .send()
                .await
                .map_err(Error::from)
        })
        .await?;

        let status = response.status();
        let body = response.text().await.map_err(Error::from)?;
        if !status.is_success() || body.trim() == "Fails." {
            return Err(Error::AuthRejected {
                client: self.name.clone(),
            });
        }
        debug!(client = %self.name, "logged in to client");
        Ok(())
    }

    /// Send a GET, re-logging in once on 403
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let url = self.endpoint(path)?;
        let send = || async {
            self.http
                .get(url.clone())
                .query(query)
                .send()
                .await
                .map_err(Error::from)
        };

        let mut response = with_retry(&self.retry, &send).await?;
        if response.status() == StatusCode::FORBIDDEN {
            self.login().await?;
            response = with_retry(&self.retry, &send).await?;
        }
        self.checked(response, path)
    }

    /// Send a form POST, re-logging in once on 403
    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<reqwest::Response> {
        let url = self.endpoint(path)?;
        let send = || async {
            self.http
                .post(url.clone())
                .form(form)
                .send()
                .await
                .map_err(Error::from)
        };

        let mut response = with_retry(&self.retry, &send).await?;
        if response.status() == StatusCode::FORBIDDEN {
            self.login().await?;
            response = with_retry(&self.retry, &send).await?;
        }
        self.checked(response, path)
    }

    fn checked(&self, response: reqwest::Response, path: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::unreachable(
                &self.name,
                format!("HTTP {} from {}", status.as_u16(), path),
            ));
        }
        Ok(response)
    }

    /// Mark any remaining network failure as this client being unreachable
    fn unreachable(&self, err: Error) -> Error {
        match err {
            Error::Network(inner) => Error::unreachable(&self.name, inner),
            other => other,
        }
    }

    async fn torrents_info(&self, category: Option<&str>, filter: Option<&str>) -> Result<Vec<TorrentInfo>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(filter) = filter {
            query.push(("filter", filter));
        }
        if let Some(category) = category {
            query.push(("category", category));
        }
        let response = self.get("torrents/info", &query).await?;
        response
            .json::<Vec<TorrentInfo>>()
            .await
            .map_err(|e| Error::MalformedResponse(format!("torrents/info: {}", e)))
    }
}

#[async_trait]
impl ClientGateway for QbitGateway {
    async fn completed_torrents(&self) -> Result<Vec<Torrent>> {
        let infos = self
            .torrents_info(None, Some("completed"))
            .await
            .map_err(|e| self.unreachable(e))?;
        Ok(infos.into_iter().map(into_torrent).collect())
    }

    async fn category_size(&self, category: Option<&str>) -> Result<u64> {
        let infos = self
            .torrents_info(category, None)
            .await
            .map_err(|e| self.unreachable(e))?;
        Ok(infos.iter().map(|t| t.size.max(0) as u64).sum())
    }

    async fn upload_rate(&self) -> u64 {
        let result = async {
            let response = self.get("transfer/info", &[]).await?;
            response
                .json::<TransferInfo>()
                .await
                .map_err(|e| Error::MalformedResponse(format!("transfer/info: {}", e)))
        }
        .await;

        match result {
            Ok(info) => info.up_info_speed,
            Err(e) => {
                warn!(client = %self.name, error = %e, "transfer stats unavailable, assuming 0");
                0
            }
        }
    }

    async fn stop_torrents(&self, hashes: &[TorrentHash]) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let joined = join_hashes(hashes);
        self.post_form("torrents/stop", &[("hashes", joined)])
            .await
            .map_err(|e| self.unreachable(e))?;
        Ok(())
    }

    async fn delete_torrents(&self, hashes: &[TorrentHash], delete_files: bool) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let joined = join_hashes(hashes);
        self.post_form(
            "torrents/delete",
            &[
                ("hashes", joined),
                ("deleteFiles", delete_files.to_string()),
            ],
        )
        .await
        .map_err(|e| self.unreachable(e))?;
        Ok(())
    }

    async fn feed_articles(&self, feed: &str) -> Result<Vec<FeedArticle>> {
        // Registered feeds first, so an unknown name is a distinct error
        let response = self
            .get("rss/items", &[("withData", "false")])
            .await
            .map_err(|e| self.unreachable(e))?;
        let feeds: serde_json::Map<String, serde_json::Value> = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("rss/items: {}", e)))?;
        if !feeds.contains_key(feed) {
            return Err(Error::FeedNotFound(feed.to_string()));
        }

        // Ask the client to re-fetch the feed, then read what it holds
        self.post_form("rss/refreshItem", &[("itemPath", feed.to_string())])
            .await
            .map_err(|e| self.unreachable(e))?;

        let response = self
            .get("rss/items", &[("withData", "true")])
            .await
            .map_err(|e| self.unreachable(e))?;
        let feeds: serde_json::Map<String, serde_json::Value> = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("rss/items: {}", e)))?;

        let articles = feeds
            .get(feed)
            .and_then(|f| f.get("articles"))
            .and_then(|a| a.as_array())
            .cloned()
            .unwrap_or_default();

        let mut parsed = Vec::with_capacity(articles.len());
        for article in &articles {
            let Some(title) = article.get("title").and_then(|v| v.as_str()) else {
                debug!(client = %self.name, feed, "dropping article without title");
                continue;
            };
            let Some(url) = article.get("torrentURL").and_then(|v| v.as_str()) else {
                debug!(client = %self.name, feed, title, "dropping article without torrent URL");
                continue;
            };
            let published = article
                .get("date")
                .and_then(|v| v.as_str())
                .and_then(parse_article_date);
            parsed.push(FeedArticle {
                title: title.to_string(),
                url: url.to_string(),
                published,
            });
        }
        Ok(parsed)
    }

    async fn add_torrent(&self, url: &str, category: Option<&str>) -> Result<bool> {
        let mut form = vec![("urls", url.to_string())];
        if let Some(category) = category {
            form.push(("category", category.to_string()));
        }
        let response = self
            .post_form("torrents/add", &form)
            .await
            .map_err(|e| self.unreachable(e))?;
        let body = response.text().await.unwrap_or_default();
        Ok(body.trim() != "Fails.")
    }
}

fn join_hashes(hashes: &[TorrentHash]) -> String {
    hashes
        .iter()
        .map(TorrentHash::as_str)
        .collect::<Vec<_>>()
        .join("|")
}

fn into_torrent(info: TorrentInfo) -> Torrent {
    // The client reports 0 (or garbage negatives) for torrents it never saw
    // complete; fall back to the add time so seeding duration stays sane
    let completed_at = epoch_to_utc(info.completion_on).or_else(|| epoch_to_utc(info.added_on));
    Torrent {
        hash: TorrentHash::new(info.hash),
        name: info.name,
        category: Some(info.category).filter(|c| !c.is_empty()),
        size: info.size.max(0) as u64,
        uploaded: info.uploaded.max(0) as u64,
        upload_rate: info.upspeed.max(0) as u64,
        completed_at,
        tracker: Some(info.tracker).filter(|t| !t.is_empty()),
    }
}

fn epoch_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}

/// Parse the client's RSS article date strings
///
/// qBittorrent emits RFC 2822-style dates, sometimes without the leading
/// day-of-week. Unparseable dates become None and staleness filtering
/// treats the article as undated.
fn parse_article_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .or_else(|| DateTime::parse_from_str(raw, "%d %b %Y %H:%M:%S %z").ok())
        .map(|dt| dt.with_timezone(&Utc))
}
