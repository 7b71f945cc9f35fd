//! Chat handler — credential intake over Telegram.
//!
//! Two inputs exist: the `/start` command and a two-line
//! username/password submission. Anything else gets a
//! format-correction prompt. Handling is stateless apart from the
//! credential store write; replies keep the deployment's original
//! Persian wording.

use std::sync::Arc;

use tracing::{info, warn};

use utmail_core::{Credential, CredentialStore};

use crate::telegram::{ChatSender, Outgoing};

/// The registration command.
pub const START_COMMAND: &str = "/start";

/// Instructions sent in response to /start.
const START_REPLY: &str = "سلام
همونطور که میدونی برای اینکه بتونم ایمیل هات رو بفرستم اینجا باید یوزرنیم و پسوردت رو بدم به سامانه
برای ادامه کار لطفا یوزرنیم(تا قبل @) و پسوردت رو توی یه پیام و دو تا خط جدا بهم بده، اینجوری:";

/// Format example, sent after the instructions and after format
/// errors.
const SAMPLE_REPLY: &str = "s.aliemami\n12345678";

/// Format-error reply.
const WRONG_FORMAT_REPLY: &str = "لطفا فرمت زیر رو رعایت کن";

/// Registration confirmation.
const OK_REPLY: &str = "حله! ایمیل اومد خبر میدم";

/// Split a submission into `(username, password)`.
///
/// Tries CRLF first, then LF, so both line-ending conventions work.
/// Exactly two non-empty lines are required; the pieces are stored
/// verbatim.
pub fn parse_submission(text: &str) -> Option<(&str, &str)> {
    let mut pieces: Vec<&str> = text.split("\r\n").collect();
    if pieces.len() == 1 {
        pieces = text.split('\n').collect();
    }
    if pieces.len() != 2 || pieces[0].is_empty() || pieces[1].is_empty() {
        return None;
    }
    Some((pieces[0], pieces[1]))
}

/// Interprets incoming chat messages and writes the credential
/// store.
pub struct ChatHandler {
    store: Arc<CredentialStore>,
    sender: Arc<dyn ChatSender>,
}

impl ChatHandler {
    pub fn new(store: Arc<CredentialStore>, sender: Arc<dyn ChatSender>) -> Self {
        Self { store, sender }
    }

    /// Handle one incoming message; sends zero or more replies.
    pub async fn on_message(&self, chat_id: i64, message_id: i32, text: &str) {
        if text == START_COMMAND {
            self.reply(Outgoing::text(chat_id, START_REPLY).in_reply_to(message_id))
                .await;
            self.reply(Outgoing::text(chat_id, SAMPLE_REPLY)).await;
            return;
        }

        match parse_submission(text) {
            Some((username, password)) => {
                self.store
                    .set(
                        chat_id,
                        Credential {
                            username: username.to_string(),
                            password: password.to_string(),
                        },
                    )
                    .await;
                info!(chat_id = chat_id, "credentials registered");
                self.reply(Outgoing::text(chat_id, OK_REPLY).in_reply_to(message_id))
                    .await;
            }
            None => {
                self.reply(
                    Outgoing::text(chat_id, WRONG_FORMAT_REPLY).in_reply_to(message_id),
                )
                .await;
                self.reply(Outgoing::text(chat_id, SAMPLE_REPLY)).await;
            }
        }
    }

    async fn reply(&self, outgoing: Outgoing) {
        if let Err(e) = self.sender.send(outgoing).await {
            warn!(error = %e, "failed to send reply");
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
