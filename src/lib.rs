//! # qbit-brush
//!
//! Steady-state seedbox manager library for qBittorrent.
//!
//! Every cycle the manager protects upload throughput first, then prunes
//! completed torrents whose upload contribution has stalled, then admits
//! new torrents from the client's RSS feeds while a category size budget
//! lasts. The result is a seedbox that keeps earning upload credit inside
//! a fixed disk footprint without manual gardening.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Protect, then prune, then admit** - Active uploads outrank all other
//!   work; a cycle that would disturb them does nothing at all
//! - **Contained failures** - A failing torrent, article, feed, or client
//!   never takes down its siblings or the loop itself
//! - **Event-driven** - Consumers subscribe to cycle events, no polling
//!
//! ## Quick Start
//!
//! ```no_run
//! use qbit_brush::{BrushManager, BrushScheduler, ClientConfig, Config};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.clients = vec![ClientConfig {
//!         name: "seedbox".to_string(),
//!         base_url: "http://localhost:8080".to_string(),
//!         username: Some("admin".to_string()),
//!         password: Some("adminadmin".to_string()),
//!         timeout: std::time::Duration::from_secs(30),
//!     }];
//!     config.brush.category = Some("brush".to_string());
//!     config.admission.enabled = true;
//!     config.admission.feeds = vec!["daily".to_string()];
//!
//!     let manager = Arc::new(BrushManager::new(config)?);
//!
//!     // Subscribe to events
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Run cycles until Ctrl+C
//!     let scheduler = BrushScheduler::new(manager.clone());
//!     tokio::spawn(async move { scheduler.run().await });
//!     qbit_brush::run_with_shutdown(manager).await;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Cycle orchestration (guard, prune pass, admission pass)
pub mod brush;
/// Periodic cycle scheduling
pub mod brush_scheduler;
/// Configuration types
pub mod config;
/// Bounded memory of previously-admitted feed articles
pub mod dedup;
/// Error types
pub mod error;
/// Prune and admission decision logic
pub mod filter;
/// Capability interface over the remote download client
pub mod gateway;
/// Per-pass byte budget for admissions
pub mod quota;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use brush::BrushManager;
pub use brush_scheduler::BrushScheduler;
pub use config::{
    AdmissionConfig, BrushConfig, ClientConfig, Config, NotificationConfig, PruneAction,
    RetryConfig, SizeUnit, WebhookConfig,
};
pub use dedup::DedupSet;
pub use error::{Error, Result};
pub use filter::{AdmissionFilter, AdmissionVerdict, PruneFilter};
pub use gateway::{ClientGateway, QbitGateway};
pub use quota::Quota;
pub use types::{
    AdmissionSummary, AdmittedArticle, ClientCycleReport, CycleOutcome, CycleReport, Event,
    FeedArticle, PruneSummary, PrunedTorrent, Torrent, TorrentHash, WebhookPayload,
};

use std::sync::Arc;

/// Helper function to run the manager with graceful signal handling.
///
/// Waits for a termination signal and then calls the manager's
/// [`shutdown`](BrushManager::shutdown), which stops the current cycle
/// before its next destructive step and ends any running scheduler.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use qbit_brush::{BrushManager, Config, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let manager = Arc::new(BrushManager::new(config)?);
///
///     // Run with automatic signal handling
///     run_with_shutdown(manager).await;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: Arc<BrushManager>) {
    wait_for_signal().await;
    manager.shutdown();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
