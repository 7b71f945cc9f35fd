//! Telegram channel — webhook intake and message sending.
//!
//! With a public base URL configured, registers `URL/<token>` as the
//! bot webhook and serves it on the fixed port; without one it falls
//! back to long polling. Incoming text messages go to the chat
//! handler. All outgoing traffic flows through one shared
//! `TelegramSender`, which is safe for concurrent use by the
//! notifier tasks.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode, ReplyParameters, UpdateKind};
use teloxide::update_listeners::{self, webhooks, UpdateListener};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use utmail_core::Config;

use crate::handler::ChatHandler;

/// One outgoing chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub chat_id: i64,
    pub text: String,
    /// Send with HTML parse mode.
    pub html: bool,
    /// Message id this is a reply to.
    pub reply_to: Option<i32>,
}

impl Outgoing {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            html: false,
            reply_to: None,
        }
    }

    pub fn html(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            html: true,
            ..Self::text(chat_id, text)
        }
    }

    pub fn in_reply_to(mut self, message_id: i32) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

/// Outgoing message transport.
///
/// The chat handler and the notifier hold this as a trait object so
/// tests can record messages instead of hitting the Bot API.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send(&self, outgoing: Outgoing) -> anyhow::Result<()>;
}

/// `ChatSender` over the Telegram Bot API.
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }
}

#[async_trait]
impl ChatSender for TelegramSender {
    async fn send(&self, outgoing: Outgoing) -> anyhow::Result<()> {
        let mut request = self
            .bot
            .send_message(ChatId(outgoing.chat_id), outgoing.text);
        if outgoing.html {
            request = request.parse_mode(ParseMode::Html);
        }
        if let Some(message_id) = outgoing.reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(message_id)));
        }
        request.await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────
// TelegramChannel
// ─────────────────────────────────────────────

/// Update intake loop for the bot.
pub struct TelegramChannel {
    bot: Bot,
    token: String,
    webhook_base: String,
    webhook_port: u16,
    handler: ChatHandler,
    shutdown: Arc<Notify>,
}

impl TelegramChannel {
    pub fn new(config: &Config, handler: ChatHandler) -> Self {
        Self {
            bot: Bot::new(&config.token),
            token: config.token.clone(),
            webhook_base: config.webhook_base.clone(),
            webhook_port: config.webhook_port,
            handler,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Listen for updates until `stop` is called or the stream ends.
    pub async fn run(&self) -> anyhow::Result<()> {
        if self.webhook_base.is_empty() {
            info!("no public URL configured, falling back to long polling");
            let listener = update_listeners::polling_default(self.bot.clone()).await;
            self.drive(listener).await
        } else {
            let url: url::Url = format!(
                "{}/{}",
                self.webhook_base.trim_end_matches('/'),
                self.token
            )
            .parse()?;
            let addr = SocketAddr::from(([0, 0, 0, 0], self.webhook_port));
            info!(port = self.webhook_port, "registering telegram webhook");
            let listener =
                webhooks::axum(self.bot.clone(), webhooks::Options::new(addr, url)).await?;
            self.drive(listener).await
        }
    }

    /// Stop the update loop; in-flight handling finishes on its own.
    pub fn stop(&self) {
        self.shutdown.notify_waiters();
    }

    async fn drive<L>(&self, mut listener: L) -> anyhow::Result<()>
    where
        L: UpdateListener,
        L::Err: std::fmt::Debug,
    {
        let stream = listener.as_stream();
        tokio::pin!(stream);
        loop {
            tokio::select! {
                update = stream.next() => match update {
                    Some(Ok(update)) => self.handle_update(update).await,
                    Some(Err(e)) => warn!(error = ?e, "telegram update error"),
                    None => {
                        info!("telegram update stream ended");
                        return Ok(());
                    }
                },
                _ = self.shutdown.notified() => {
                    info!("telegram channel shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_update(&self, update: Update) {
        let message = match update.kind {
            UpdateKind::Message(message) => message,
            _ => return,
        };
        let text = match message.text() {
            Some(text) => text,
            None => {
                debug!("ignoring non-text message");
                return;
            }
        };
        self.handler
            .on_message(message.chat.id.0, message.id.0, text)
            .await;
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
