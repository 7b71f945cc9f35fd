//! In-memory credential store.
//!
//! Maps a Telegram chat id to the university mailbox credentials
//! that chat registered. The chat handler writes, the poll scheduler
//! reads via `snapshot`. Entries live until the process exits; there
//! is no deletion and nothing is ever persisted.

use std::collections::HashMap;

use tokio::sync::RwLock;

/// University mailbox credentials for one chat.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

// Keeps the password out of log output.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Concurrency-safe chat-id → credential mapping.
///
/// Shared via `Arc` between the chat handler (writer) and the poll
/// scheduler (reader); never a package-level global.
#[derive(Debug, Default)]
pub struct CredentialStore {
    inner: RwLock<HashMap<i64, Credential>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register credentials for a chat, overwriting any previous
    /// entry unconditionally.
    pub async fn set(&self, chat_id: i64, credential: Credential) {
        let mut map = self.inner.write().await;
        map.insert(chat_id, credential);
    }

    /// Point-in-time copy of every registered credential.
    ///
    /// The copy can be iterated while new registrations keep
    /// arriving.
    pub async fn snapshot(&self) -> HashMap<i64, Credential> {
        self.inner.read().await.clone()
    }

    /// Number of registered chats.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
