//! Utility functions for notification formatting

/// Format a byte count as a human-readable size string
///
/// Uses 1024-based units and two decimal places above bytes, matching the
/// size figures shown in the client's own UI.
///
/// # Examples
///
/// ```
/// use qbit_brush::utils::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
/// ```
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/// Derive an origin-site label from a tracker URL
///
/// Returns the registrable-looking tail of the host (last two labels), the
/// host itself for IPs and single-label hosts, or None when the URL does not
/// parse or has no host. Best-effort heuristic, not public-suffix aware.
///
/// # Examples
///
/// ```
/// use qbit_brush::utils::tracker_site;
///
/// assert_eq!(
///     tracker_site("https://tracker.example.com:2710/announce"),
///     Some("example.com".to_string())
/// );
/// assert_eq!(tracker_site("udp://10.0.0.1:6881"), Some("10.0.0.1".to_string()));
/// assert_eq!(tracker_site(""), None);
/// ```
#[must_use]
pub fn tracker_site(tracker_url: &str) -> Option<String> {
    let parsed = url::Url::parse(tracker_url).ok()?;
    let host = parsed.host_str()?;

    // IP literals pass through whole ([] stripped for IPv6)
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<std::net::IpAddr>().is_ok() {
        return Some(bare.to_string());
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    match labels.len() {
        0 => None,
        1 => Some(labels[0].to_string()),
        n => Some(format!("{}.{}", labels[n - 2], labels[n - 1])),
    }
}
