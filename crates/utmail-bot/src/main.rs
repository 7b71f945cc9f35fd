//! utmail-bot — Telegram bot that forwards unseen university mail.
//!
//! Startup wires four pieces together: the env-driven config, the
//! shared credential store, the poll scheduler that checks each
//! registered mailbox, and the Telegram channel that takes
//! registrations and carries the forwarded mail.

mod handler;
mod notifier;
mod scheduler;
mod telegram;

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use utmail_core::{Config, CredentialStore};
use utmail_imap::ImapFetcher;

use crate::handler::ChatHandler;
use crate::notifier::Notifier;
use crate::scheduler::PollScheduler;
use crate::telegram::{ChatSender, TelegramChannel, TelegramSender};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("utmail=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, "no .env file loaded");
    }

    let config = Config::from_env()?;
    info!(
        imap_host = %config.imap_host,
        mailbox = %config.imap_mailbox,
        poll_secs = config.poll_interval.as_secs(),
        "starting utmail-bot"
    );

    // Every poll searches from this fixed point; mail older than the
    // lookback window at startup is never forwarded.
    let lookback =
        chrono::Duration::from_std(config.lookback).context("lookback out of range")?;
    let cutoff = Utc::now() - lookback;

    let store = Arc::new(CredentialStore::new());
    let sender: Arc<dyn ChatSender> = Arc::new(TelegramSender::new(&config.token));
    let fetcher = Arc::new(ImapFetcher::new(
        config.imap_host.clone(),
        config.imap_port,
        config.imap_mailbox.clone(),
    ));
    let notifier = Arc::new(Notifier::new(sender.clone()));

    let scheduler = Arc::new(PollScheduler::new(
        store.clone(),
        fetcher,
        notifier,
        config.poll_interval,
        cutoff,
    ));
    let polling = scheduler.clone();
    tokio::spawn(async move { polling.run().await });

    let handler = ChatHandler::new(store, sender);
    let channel = TelegramChannel::new(&config, handler);

    tokio::select! {
        result = channel.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            scheduler.stop();
            channel.stop();
        }
    }

    Ok(())
}
