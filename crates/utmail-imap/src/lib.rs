//! utmail IMAP — minimal async IMAP client and the mail fetcher.
//!
//! This crate provides:
//! - **client**: raw IMAP over TLS, just the commands polling needs
//!   (LOGIN, EXAMINE, SEARCH, FETCH, LOGOUT)
//! - **parse**: MIME extraction of `{subject, body}` via `mailparse`
//! - **fetch**: the `MailFetcher` trait and `ImapFetcher`, a bounded
//!   fetch/parse pipeline over one IMAP session per poll

pub mod client;
pub mod fetch;
pub mod parse;

pub use fetch::{ImapFetcher, MailFetcher};
