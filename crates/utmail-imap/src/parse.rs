//! MIME extraction for fetched messages.
//!
//! The forwarding contract takes the decoded subject plus the text
//! of the first leaf part, and only when that part's disposition is
//! inline. A message without any leaf part halts the whole fetch
//! loop for the tick — see [`Extraction::Halt`].

use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use tracing::{debug, warn};

use utmail_core::FetchedMessage;

/// Outcome of extracting one raw message.
#[derive(Debug, PartialEq, Eq)]
pub enum Extraction {
    /// Subject and body extracted; forward it.
    Message(FetchedMessage),
    /// Unparseable message; skip it and keep going.
    Skip,
    /// The message has no MIME leaf part. The fetch loop treats this
    /// as end-of-stream and drops the remaining messages of the
    /// tick. Known early-termination behavior, kept on purpose.
    Halt,
}

/// Extract `{subject, body}` from a raw RFC 2822 message.
pub fn extract(raw: &[u8]) -> Extraction {
    let parsed = match mailparse::parse_mail(raw) {
        Ok(mail) => mail,
        Err(e) => {
            warn!(error = %e, "failed to parse fetched message");
            return Extraction::Skip;
        }
    };

    let subject = decoded_subject(&parsed);

    let part = match first_leaf(&parsed) {
        Some(part) => part,
        None => return Extraction::Halt,
    };

    Extraction::Message(FetchedMessage {
        subject,
        body: inline_text(part),
    })
}

/// Decoded subject header; empty (and logged) when absent.
fn decoded_subject(mail: &ParsedMail) -> String {
    match mail.headers.get_first_value("Subject") {
        Some(subject) => subject,
        None => {
            debug!("message has no subject header");
            String::new()
        }
    }
}

/// First leaf part, depth-first. A non-multipart message is its own
/// leaf; a multipart without parsed children has none.
fn first_leaf<'a>(mail: &'a ParsedMail<'a>) -> Option<&'a ParsedMail<'a>> {
    if !mail.ctype.mimetype.to_lowercase().starts_with("multipart/") {
        return Some(mail);
    }
    mail.subparts.iter().find_map(|part| first_leaf(part))
}

/// Decoded text of an inline part; attachments yield an empty body.
fn inline_text(part: &ParsedMail) -> String {
    if part.get_content_disposition().disposition != DispositionType::Inline {
        return String::new();
    }
    match part.get_body() {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "failed to decode message body");
            String::new()
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
