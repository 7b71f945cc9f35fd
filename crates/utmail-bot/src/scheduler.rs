//! Poll scheduler — fixed-interval fan-out over registered users.
//!
//! Every tick snapshots the credential store and spawns one
//! independent task per chat: fetch unseen mail, then notify. Ticks
//! never wait for earlier ticks, so overlapping fetches for the same
//! user across adjacent ticks are possible and not deduplicated. One
//! user's failure never reaches another user's task or the next
//! tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use utmail_core::CredentialStore;
use utmail_imap::MailFetcher;

use crate::notifier::Notifier;

/// Drives fetch-and-notify cycles for all registered credentials.
pub struct PollScheduler {
    store: Arc<CredentialStore>,
    fetcher: Arc<dyn MailFetcher>,
    notifier: Arc<Notifier>,
    interval: Duration,
    /// Lower bound of every unseen-since search, fixed at startup
    /// and shared by all users and all ticks.
    cutoff: DateTime<Utc>,
    shutdown: Arc<Notify>,
}

impl PollScheduler {
    pub fn new(
        store: Arc<CredentialStore>,
        fetcher: Arc<dyn MailFetcher>,
        notifier: Arc<Notifier>,
        interval: Duration,
        cutoff: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            fetcher,
            notifier,
            interval,
            cutoff,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Tick until `stop` is called. In-flight tasks are left to
    /// finish on their own.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        // tokio fires the first tick immediately; wait a full
        // interval instead.
        ticker.tick().await;

        info!(
            interval_secs = self.interval.as_secs(),
            "poll scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let mut tasks = self.poll_once().await;
                    tokio::spawn(async move {
                        while let Some(joined) = tasks.join_next().await {
                            if let Err(e) = joined {
                                warn!(error = %e, "poll task failed");
                            }
                        }
                    });
                }
                _ = self.shutdown.notified() => {
                    info!("poll scheduler shutting down");
                    return;
                }
            }
        }
    }

    /// Fan out one fetch-and-notify task per registered credential.
    ///
    /// Returns the joinable set so callers (and tests) can await
    /// completion deterministically; the ticker itself never waits.
    pub async fn poll_once(&self) -> JoinSet<()> {
        let snapshot = self.store.snapshot().await;
        debug!(users = snapshot.len(), "poll tick");

        let mut tasks = JoinSet::new();
        for (chat_id, credential) in snapshot {
            let fetcher = self.fetcher.clone();
            let notifier = self.notifier.clone();
            let cutoff = self.cutoff;
            tasks.spawn(async move {
                let mails = fetcher
                    .fetch(&credential.username, &credential.password, cutoff)
                    .await;
                if mails.is_empty() {
                    return;
                }
                notifier.deliver(chat_id, mails).await;
            });
        }
        tasks
    }

    /// Stop future ticks.
    pub fn stop(&self) {
        self.shutdown.notify_waiters();
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
