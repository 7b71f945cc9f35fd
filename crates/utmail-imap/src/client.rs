//! Minimal async IMAP client.
//!
//! Speaks just enough IMAP to poll a mailbox: greeting handshake,
//! LOGIN, EXAMINE (read-only select), SEARCH, FETCH with literal
//! bodies, LOGOUT. TLS via rustls with webpki roots. The client can
//! also be built from any in-memory stream, which is how the tests
//! drive it against a scripted server.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

/// Async read+write stream marker.
pub trait ImapStream: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send {}
impl<T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send> ImapStream for T {}

/// A connected, greeted IMAP session.
pub struct ImapClient {
    reader: tokio::io::BufReader<tokio::io::ReadHalf<Box<dyn ImapStream>>>,
    writer: tokio::io::WriteHalf<Box<dyn ImapStream>>,
    tag_counter: u32,
}

impl std::fmt::Debug for ImapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapClient")
            .field("tag_counter", &self.tag_counter)
            .finish_non_exhaustive()
    }
}

impl ImapClient {
    /// Open a TLS connection to an IMAPS server and read its
    /// greeting.
    pub async fn connect(host: &str, port: u16) -> anyhow::Result<Self> {
        use tokio::net::TcpStream;

        let tcp = TcpStream::connect((host, port)).await?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let connector = tokio_rustls::TlsConnector::from(Arc::new(config));
        let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
            .map_err(|e| anyhow::anyhow!("invalid server name '{}': {}", host, e))?;
        let tls = connector.connect(server_name, tcp).await?;

        Self::handshake(Box::new(tls)).await
    }

    /// Wrap an established stream and read the server greeting.
    pub async fn handshake(stream: Box<dyn ImapStream>) -> anyhow::Result<Self> {
        use tokio::io::BufReader;

        let (read, write) = tokio::io::split(stream);
        let mut client = Self {
            reader: BufReader::new(read),
            writer: write,
            tag_counter: 0,
        };

        // e.g. "* OK IMAP4rev1 server ready"
        let greeting = client.read_line().await?;
        if !greeting.starts_with("* OK") && !greeting.starts_with("* ok") {
            anyhow::bail!("unexpected IMAP greeting: {}", greeting);
        }
        debug!(greeting = %greeting, "IMAP connected");

        Ok(client)
    }

    /// Read a single CRLF-terminated line.
    async fn read_line(&mut self) -> anyhow::Result<String> {
        use tokio::io::AsyncBufReadExt;
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            anyhow::bail!("IMAP connection closed unexpectedly");
        }
        Ok(line
            .trim_end_matches("\r\n")
            .trim_end_matches('\n')
            .to_string())
    }

    /// Read exactly `n` bytes (a literal).
    async fn read_exact(&mut self, n: usize) -> anyhow::Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;
        let mut buf = vec![0u8; n];
        self.reader.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Send a tagged IMAP command. Returns the tag.
    async fn send_command(&mut self, cmd: &str) -> anyhow::Result<String> {
        use tokio::io::AsyncWriteExt;
        self.tag_counter += 1;
        let tag = format!("A{:04}", self.tag_counter);
        let line = format!("{} {}\r\n", tag, cmd);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(tag)
    }

    /// Read responses until the tagged completion line.
    /// Returns (untagged_lines, tagged_status_line).
    async fn read_response(&mut self, tag: &str) -> anyhow::Result<(Vec<String>, String)> {
        let mut untagged = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.starts_with(tag) {
                return Ok((untagged, line));
            }
            untagged.push(line);
        }
    }

    /// LOGIN
    pub async fn login(&mut self, user: &str, pass: &str) -> anyhow::Result<()> {
        let cmd = format!(
            "LOGIN \"{}\" \"{}\"",
            user.replace('\\', "\\\\").replace('"', "\\\""),
            pass.replace('\\', "\\\\").replace('"', "\\\""),
        );
        let tag = self.send_command(&cmd).await?;
        let (_, status) = self.read_response(&tag).await?;
        if !status.to_uppercase().contains("OK") {
            anyhow::bail!("IMAP LOGIN failed: {}", status);
        }
        Ok(())
    }

    /// EXAMINE — select a mailbox read-only.
    pub async fn examine(&mut self, mailbox: &str) -> anyhow::Result<()> {
        let cmd = format!("EXAMINE \"{}\"", mailbox);
        let tag = self.send_command(&cmd).await?;
        let (_, status) = self.read_response(&tag).await?;
        if !status.to_uppercase().contains("OK") {
            anyhow::bail!("IMAP EXAMINE failed: {}", status);
        }
        Ok(())
    }

    /// SEARCH UNSEEN SENTSINCE — message sequence numbers of unseen
    /// mail sent on or after `since`.
    pub async fn search_unseen_since(
        &mut self,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<u32>> {
        let cmd = format!("SEARCH UNSEEN SENTSINCE {}", since.format("%-d-%b-%Y"));
        let tag = self.send_command(&cmd).await?;
        let (lines, status) = self.read_response(&tag).await?;
        if !status.to_uppercase().contains("OK") {
            anyhow::bail!("IMAP SEARCH failed: {}", status);
        }

        let mut seqnums = Vec::new();
        for line in &lines {
            if line.to_uppercase().starts_with("* SEARCH") {
                let nums: Vec<u32> = line
                    .split_whitespace()
                    .skip(2) // skip "* SEARCH"
                    .filter_map(|s| s.parse().ok())
                    .collect();
                seqnums.extend(nums);
            }
        }
        Ok(seqnums)
    }

    /// FETCH the full body of one message by sequence number.
    ///
    /// Deliberately `BODY[]`, not `BODY.PEEK[]`: fetching sets
    /// `\Seen`, which is what keeps the message from being forwarded
    /// again on the next tick.
    pub async fn fetch_body(&mut self, seqnum: u32) -> anyhow::Result<Vec<u8>> {
        let cmd = format!("FETCH {} (BODY[])", seqnum);
        let tag = self.send_command(&cmd).await?;

        let mut body = Vec::new();

        loop {
            let line = self.read_line().await?;

            // Tagged response = done
            if line.starts_with(&tag) {
                if !line.to_uppercase().contains("OK") {
                    anyhow::bail!("IMAP FETCH failed: {}", line);
                }
                break;
            }

            // Untagged FETCH response: * N FETCH (BODY[] {size}
            if line.starts_with("* ") && line.to_uppercase().contains("FETCH") {
                if let Some(brace_start) = line.rfind('{') {
                    if let Some(brace_end) = line.rfind('}') {
                        if brace_end > brace_start {
                            if let Ok(size) =
                                line[brace_start + 1..brace_end].parse::<usize>()
                            {
                                body = self.read_exact(size).await?;
                                // Closing line after the literal data
                                let _closing = self.read_line().await?;
                            }
                        }
                    }
                }
            }
        }

        Ok(body)
    }

    /// LOGOUT
    pub async fn logout(&mut self) -> anyhow::Result<()> {
        let tag = self.send_command("LOGOUT").await?;
        // Server may send * BYE before the tagged OK
        let _ = self.read_response(&tag).await;
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
