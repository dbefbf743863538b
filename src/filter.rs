//! Prune and admission decision logic
//!
//! Both filters are pure: they look at a torrent or article plus the
//! current cycle state and return a decision, leaving all side effects to
//! the control loop. Admission decisions come back as an explicit
//! [`AdmissionVerdict`] so skip reasons stay distinguishable in logs and
//! tests instead of collapsing into a bare bool.

use crate::config::{AdmissionConfig, BrushConfig, SizeUnit};
use crate::dedup::DedupSet;
use crate::error::{Error, Result};
use crate::quota::Quota;
use crate::types::{FeedArticle, Torrent};
use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

/// Compiled-regex size cap, prevents ReDoS via pathological patterns
const REGEX_SIZE_LIMIT: usize = 1024 * 1024;

/// Decides whether a completed torrent has stalled enough to prune
///
/// A torrent is pruned only when *both* its long-run average and its
/// instantaneous upload rate sit below the configured floor: a stale
/// average must not kill a torrent that is bursting right now.
#[derive(Clone, Debug)]
pub struct PruneFilter {
    category: Option<String>,
    min_upload_bps: Option<u64>,
}

impl PruneFilter {
    /// Build from the cycle configuration
    pub fn from_config(brush: &BrushConfig) -> Self {
        Self {
            category: brush.category.clone(),
            min_upload_bps: brush.min_torrent_upload_bps.filter(|&bps| bps > 0),
        }
    }

    /// Whether this torrent should be pruned
    pub fn eligible(&self, torrent: &Torrent, now: DateTime<Utc>) -> bool {
        if let Some(category) = self.category.as_deref()
            && torrent.category.as_deref() != Some(category)
        {
            debug!(name = %torrent.name, "keep: outside target category");
            return false;
        }

        if let Some(floor) = self.min_upload_bps {
            let avg = torrent.avg_upload_rate(now);
            if avg >= floor {
                debug!(name = %torrent.name, avg_bps = avg, "keep: still earning on average");
                return false;
            }
            if torrent.upload_rate >= floor {
                debug!(
                    name = %torrent.name,
                    rate_bps = torrent.upload_rate,
                    "keep: currently bursting"
                );
                return false;
            }
        }

        debug!(name = %torrent.name, "prune candidate");
        true
    }
}

/// Why an article was or was not admitted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionVerdict {
    /// Admit; declared size in bytes to reserve against the quota
    Admit {
        /// Declared size parsed from the title annotation
        size: u64,
    },
    /// Title was admitted in an earlier cycle
    AlreadySeen,
    /// Published before the staleness window (or no usable publish date)
    Stale,
    /// No size annotation in an accepted unit
    NoSize,
    /// Title does not match the configured pattern
    PatternMismatch,
    /// Declared size exceeds the remaining budget
    OverQuota,
}

/// Decides whether a feed article should be submitted to the client
#[derive(Clone, Debug)]
pub struct AdmissionFilter {
    size_re: Regex,
    pattern: Option<Regex>,
    max_age: Option<chrono::Duration>,
}

impl AdmissionFilter {
    /// Build from the admission configuration
    ///
    /// # Errors
    /// Returns a config error when the title pattern does not compile or
    /// no size units are accepted.
    pub fn from_config(admission: &AdmissionConfig) -> Result<Self> {
        let size_re = size_annotation_regex(&admission.size_units)?;

        let pattern = match admission.title_pattern.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                regex::RegexBuilder::new(raw)
                    .size_limit(REGEX_SIZE_LIMIT)
                    .build()
                    .map_err(|e| {
                        Error::config(
                            format!("invalid title_pattern: {}", e),
                            Some("admission.title_pattern"),
                        )
                    })?,
            ),
        };

        // A zero window means "no staleness filtering", same as None
        let max_age = admission
            .max_article_age
            .filter(|age| !age.is_zero())
            .map(|age| chrono::Duration::from_std(age).unwrap_or(chrono::Duration::MAX));

        Ok(Self {
            size_re,
            pattern,
            max_age,
        })
    }

    /// Declared size in bytes from the first accepted annotation, if any
    pub fn declared_size(&self, title: &str) -> Option<u64> {
        let captures = self.size_re.captures(title)?;
        let value: f64 = captures.get(1)?.as_str().parse().ok()?;
        let unit = SizeUnit::from_tag(captures.get(2)?.as_str())?;
        Some((value * unit.bytes() as f64) as u64)
    }

    /// Evaluate one article against the cycle state
    ///
    /// Checks run in a fixed order and the first failing one names the
    /// verdict: seen, stale, size, pattern, quota. The caller reserves the
    /// returned size before submitting; nothing here mutates state.
    pub fn evaluate(
        &self,
        article: &FeedArticle,
        seen: &DedupSet,
        quota: &Quota,
        now: DateTime<Utc>,
    ) -> AdmissionVerdict {
        if seen.contains(&article.title) {
            debug!(title = %article.title, "skip: already admitted");
            return AdmissionVerdict::AlreadySeen;
        }

        if let Some(max_age) = self.max_age {
            match article.published {
                Some(published) if now.signed_duration_since(published) <= max_age => {}
                Some(_) => {
                    debug!(title = %article.title, "skip: published outside staleness window");
                    return AdmissionVerdict::Stale;
                }
                None => {
                    debug!(title = %article.title, "skip: no usable publish date");
                    return AdmissionVerdict::Stale;
                }
            }
        }

        let Some(size) = self.declared_size(&article.title) else {
            debug!(title = %article.title, "skip: no declared size");
            return AdmissionVerdict::NoSize;
        };

        if let Some(pattern) = &self.pattern
            && !pattern.is_match(&article.title)
        {
            debug!(title = %article.title, "skip: title pattern mismatch");
            return AdmissionVerdict::PatternMismatch;
        }

        if !quota.fits(size) {
            debug!(
                title = %article.title,
                size,
                remaining = quota.remaining(),
                "skip: over remaining budget"
            );
            return AdmissionVerdict::OverQuota;
        }

        debug!(title = %article.title, size, "admit");
        AdmissionVerdict::Admit { size }
    }
}

/// Build the bracketed-annotation regex for the accepted unit tags
///
/// Matches e.g. `[12.5 GB]` case-insensitively; only accepted units appear
/// in the alternation, so annotations in any other unit never match and
/// the article counts as size-less.
fn size_annotation_regex(units: &[SizeUnit]) -> Result<Regex> {
    if units.is_empty() {
        return Err(Error::config(
            "at least one size unit must be accepted",
            Some("admission.size_units"),
        ));
    }
    let tags: Vec<&str> = units.iter().map(|u| u.tag()).collect();
    let raw = format!(r"(?i)\[\s*(\d+(?:\.\d+)?)\s*({})\s*\]", tags.join("|"));
    Regex::new(&raw).map_err(|e| Error::config(format!("size regex: {}", e), None))
}
