//! Notifier — turns fetched mail into Telegram messages.
//!
//! One outgoing message per mail item: optional course hashtag,
//! bold subject, blank line, body. Overlong texts are cut to the
//! transport's budget with a fixed notice appended.

use std::sync::Arc;

use tracing::warn;

use utmail_core::{topics, FetchedMessage};

use crate::telegram::{ChatSender, Outgoing};

/// Byte length at which a message counts as overlong.
const MAX_TEXT_BYTES: usize = 2000;
/// Bytes of original content kept when truncating.
const TRUNCATED_BYTES: usize = 1900;
/// Appended to truncated messages.
const TRUNCATION_NOTICE: &str = "\n\n متن طولانی/در ایمیل اصلی بررسی شود";

/// Forwards fetched mail to a chat.
pub struct Notifier {
    sender: Arc<dyn ChatSender>,
}

impl Notifier {
    pub fn new(sender: Arc<dyn ChatSender>) -> Self {
        Self { sender }
    }

    /// Send one HTML message per fetched mail item, in order. Send
    /// failures are logged and do not stop the remaining items.
    pub async fn deliver(&self, chat_id: i64, mails: Vec<FetchedMessage>) {
        for mail in &mails {
            let text = build_text(mail);
            if let Err(e) = self.sender.send(Outgoing::html(chat_id, text)).await {
                warn!(chat_id = chat_id, error = %e, "failed to forward mail");
            }
        }
    }
}

/// Outgoing text: optional `#topic` line, bold subject, body.
fn build_text(mail: &FetchedMessage) -> String {
    let mut text = String::new();
    if let Some(topic) = topics::topic_for(&mail.subject) {
        text.push('#');
        text.push_str(topic);
        text.push_str("\n\n");
    }
    text.push_str("<b>");
    text.push_str(&mail.subject);
    text.push_str("</b>\n\n");
    text.push_str(&mail.body);
    truncate_overlong(text)
}

/// The length budget is in bytes, matching the chat transport's
/// limit. The cut backs off to the previous char boundary when 1900
/// would split a code point, since a Rust string cannot hold half of
/// one.
fn truncate_overlong(text: String) -> String {
    if text.len() < MAX_TEXT_BYTES {
        return text;
    }
    let mut cut = TRUNCATED_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut truncated = text[..cut].to_string();
    truncated.push_str(TRUNCATION_NOTICE);
    truncated
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
