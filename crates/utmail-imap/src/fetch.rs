//! The unseen-mail fetcher.
//!
//! `ImapFetcher` runs one poll: connect, authenticate, read-only
//! select, search unseen-since, then stream `BODY[]` fetches through
//! a bounded channel so fetching and MIME parsing overlap. It never
//! errors to its caller; every failure is logged and whatever was
//! gathered so far is returned.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use utmail_core::FetchedMessage;

use crate::client::ImapClient;
use crate::parse::{self, Extraction};

/// Depth of the fetch → parse pipeline.
const PIPELINE_CAPACITY: usize = 10;

/// Pulls unseen messages for one set of credentials.
///
/// The scheduler holds this as a trait object so tests can substitute
/// an in-memory fake.
#[async_trait]
pub trait MailFetcher: Send + Sync {
    /// Fetch unseen messages sent since `since`. Infallible by
    /// contract: failures are logged and reduce the result.
    async fn fetch(
        &self,
        username: &str,
        password: &str,
        since: DateTime<Utc>,
    ) -> Vec<FetchedMessage>;
}

/// Fetcher backed by the university IMAP server.
#[derive(Debug, Clone)]
pub struct ImapFetcher {
    host: String,
    port: u16,
    mailbox: String,
}

impl ImapFetcher {
    pub fn new(host: impl Into<String>, port: u16, mailbox: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            mailbox: mailbox.into(),
        }
    }

    /// Everything after the connection: login, examine, search,
    /// pipeline. Split from `fetch` so tests can run it over an
    /// in-memory stream.
    async fn run_session(
        mut client: ImapClient,
        username: &str,
        password: &str,
        mailbox: &str,
        since: DateTime<Utc>,
    ) -> Vec<FetchedMessage> {
        if let Err(e) = client.login(username, password).await {
            warn!(error = %e, "IMAP login failed");
            close(client).await;
            return Vec::new();
        }

        if let Err(e) = client.examine(mailbox).await {
            warn!(error = %e, mailbox = mailbox, "IMAP mailbox selection failed");
            close(client).await;
            return Vec::new();
        }

        let seqnums = match client.search_unseen_since(since).await {
            Ok(seqnums) => seqnums,
            Err(e) => {
                warn!(error = %e, "IMAP search failed");
                close(client).await;
                return Vec::new();
            }
        };

        // Zero matches: no fetch is issued at all.
        if seqnums.is_empty() {
            close(client).await;
            return Vec::new();
        }

        debug!(count = seqnums.len(), "unseen messages found");
        Self::stream_and_parse(client, seqnums).await
    }

    /// Stream `BODY[]` fetches through a bounded channel and parse
    /// them as they arrive. The producer task owns the session and
    /// logs out before it finishes, on every path.
    async fn stream_and_parse(
        mut client: ImapClient,
        seqnums: Vec<u32>,
    ) -> Vec<FetchedMessage> {
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(PIPELINE_CAPACITY);

        let producer = tokio::spawn(async move {
            let result = async {
                for seqnum in seqnums {
                    let raw = client.fetch_body(seqnum).await?;
                    if tx.send(raw).await.is_err() {
                        // Consumer halted early; stop fetching.
                        break;
                    }
                }
                anyhow::Ok(())
            }
            .await;
            close(client).await;
            result
        });

        let mut mails = Vec::new();
        while let Some(raw) = rx.recv().await {
            match parse::extract(&raw) {
                Extraction::Message(mail) => mails.push(mail),
                Extraction::Skip => continue,
                Extraction::Halt => break,
            }
        }
        drop(rx);

        // Completion signal of the producer half.
        match producer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "IMAP fetch error"),
            Err(e) => warn!(error = %e, "fetch task failed"),
        }

        mails
    }
}

/// Release the session; logout failures are non-fatal.
async fn close(mut client: ImapClient) {
    if let Err(e) = client.logout().await {
        debug!(error = %e, "IMAP logout error (non-fatal)");
    }
}

#[async_trait]
impl MailFetcher for ImapFetcher {
    async fn fetch(
        &self,
        username: &str,
        password: &str,
        since: DateTime<Utc>,
    ) -> Vec<FetchedMessage> {
        let client = match ImapClient::connect(&self.host, self.port).await {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, host = %self.host, "IMAP connect failed");
                return Vec::new();
            }
        };
        Self::run_session(client, username, password, &self.mailbox, since).await
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    /// A scripted IMAP mailbox: accepts any login, reports the given
    /// search result, serves bodies by sequence number. Returns the
    /// command verbs it saw, in order.
    struct FakeMailbox {
        search_result: Vec<u32>,
        bodies: HashMap<u32, Vec<u8>>,
        reject_login: bool,
    }

    impl FakeMailbox {
        fn new(search_result: Vec<u32>, bodies: Vec<(u32, &[u8])>) -> Self {
            Self {
                search_result,
                bodies: bodies
                    .into_iter()
                    .map(|(seq, raw)| (seq, raw.to_vec()))
                    .collect(),
                reject_login: false,
            }
        }

        async fn serve(self, io: DuplexStream) -> Vec<String> {
            let (read, mut write) = tokio::io::split(io);
            let mut lines = BufReader::new(read).lines();

            write.write_all(b"* OK IMAP4rev1 ready\r\n").await.unwrap();

            let mut verbs = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                let mut parts = line.splitn(3, ' ');
                let tag = parts.next().unwrap_or("").to_string();
                let verb = parts.next().unwrap_or("").to_uppercase();
                let rest = parts.next().unwrap_or("").to_string();
                verbs.push(verb.clone());

                match verb.as_str() {
                    "LOGIN" if self.reject_login => {
                        let reply = format!("{} NO LOGIN failed\r\n", tag);
                        write.write_all(reply.as_bytes()).await.unwrap();
                    }
                    "LOGIN" => {
                        let reply = format!("{} OK LOGIN completed\r\n", tag);
                        write.write_all(reply.as_bytes()).await.unwrap();
                    }
                    "EXAMINE" => {
                        let reply = format!(
                            "* {} EXISTS\r\n{} OK [READ-ONLY] EXAMINE completed\r\n",
                            self.bodies.len(),
                            tag
                        );
                        write.write_all(reply.as_bytes()).await.unwrap();
                    }
                    "SEARCH" => {
                        let mut hits = String::from("* SEARCH");
                        for seq in &self.search_result {
                            hits.push_str(&format!(" {}", seq));
                        }
                        let reply =
                            format!("{}\r\n{} OK SEARCH completed\r\n", hits, tag);
                        write.write_all(reply.as_bytes()).await.unwrap();
                    }
                    "FETCH" => {
                        let seq: u32 = rest
                            .split_whitespace()
                            .next()
                            .and_then(|s| s.parse().ok())
                            .unwrap();
                        let raw = self.bodies.get(&seq).cloned().unwrap_or_default();
                        let header =
                            format!("* {} FETCH (BODY[] {{{}}}\r\n", seq, raw.len());
                        write.write_all(header.as_bytes()).await.unwrap();
                        write.write_all(&raw).await.unwrap();
                        write.write_all(b")\r\n").await.unwrap();
                        let reply = format!("{} OK FETCH completed\r\n", tag);
                        write.write_all(reply.as_bytes()).await.unwrap();
                    }
                    "LOGOUT" => {
                        let reply =
                            format!("* BYE\r\n{} OK LOGOUT completed\r\n", tag);
                        write.write_all(reply.as_bytes()).await.unwrap();
                        break;
                    }
                    other => panic!("unexpected command: {}", other),
                }
            }
            verbs
        }
    }

    async fn run_against(
        mailbox: FakeMailbox,
    ) -> (Vec<FetchedMessage>, Vec<String>) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let server = tokio::spawn(mailbox.serve(server_io));
        let client = ImapClient::handshake(Box::new(client_io)).await.unwrap();

        let since = Utc.with_ymd_and_hms(2021, 2, 5, 0, 0, 0).unwrap();
        let mails =
            ImapFetcher::run_session(client, "alice", "password1", "INBOX", since).await;
        let verbs = server.await.unwrap();
        (mails, verbs)
    }

    const PLAIN_ONE: &[u8] = b"Subject: First\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        body one\r\n";

    const PLAIN_TWO: &[u8] = b"Subject: Second\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        body two\r\n";

    const NO_PARTS: &[u8] = b"Subject: Broken\r\n\
        Content-Type: multipart/mixed; boundary=\"b\"\r\n\
        \r\n\
        nothing delimited here\r\n";

    #[tokio::test]
    async fn test_fetches_messages_in_stream_order() {
        let mailbox =
            FakeMailbox::new(vec![1, 2], vec![(1, PLAIN_ONE), (2, PLAIN_TWO)]);
        let (mails, verbs) = run_against(mailbox).await;

        assert_eq!(mails.len(), 2);
        assert_eq!(mails[0].subject, "First");
        assert_eq!(mails[0].body.trim(), "body one");
        assert_eq!(mails[1].subject, "Second");
        assert_eq!(verbs.last().map(String::as_str), Some("LOGOUT"));
    }

    #[tokio::test]
    async fn test_empty_search_skips_fetch() {
        let mailbox = FakeMailbox::new(vec![], vec![]);
        let (mails, verbs) = run_against(mailbox).await;

        assert!(mails.is_empty());
        assert!(!verbs.iter().any(|v| v == "FETCH"));
        assert_eq!(verbs, vec!["LOGIN", "EXAMINE", "SEARCH", "LOGOUT"]);
    }

    #[tokio::test]
    async fn test_partless_message_halts_remaining() {
        // Message 1 has no MIME leaf part; message 2 is fine but is
        // never reached.
        let mailbox =
            FakeMailbox::new(vec![1, 2], vec![(1, NO_PARTS), (2, PLAIN_TWO)]);
        let (mails, verbs) = run_against(mailbox).await;

        assert!(mails.is_empty());
        assert_eq!(verbs.last().map(String::as_str), Some("LOGOUT"));
    }

    #[tokio::test]
    async fn test_rejected_login_returns_empty_and_logs_out() {
        let mut mailbox = FakeMailbox::new(vec![1], vec![(1, PLAIN_ONE)]);
        mailbox.reject_login = true;
        let (mails, verbs) = run_against(mailbox).await;

        assert!(mails.is_empty());
        assert_eq!(verbs, vec!["LOGIN", "LOGOUT"]);
    }

    #[tokio::test]
    async fn test_partial_results_survive_halt() {
        // First message parses, second halts, third is dropped.
        let mailbox = FakeMailbox::new(
            vec![1, 2, 3],
            vec![(1, PLAIN_ONE), (2, NO_PARTS), (3, PLAIN_TWO)],
        );
        let (mails, _verbs) = run_against(mailbox).await;

        assert_eq!(mails.len(), 1);
        assert_eq!(mails[0].subject, "First");
    }
}
