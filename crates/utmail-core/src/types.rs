//! Data passed between components.

/// One mail item pulled from the university mailbox.
///
/// Built transiently during a poll cycle and handed straight to the
/// notifier; nothing retains it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    /// Decoded subject line (empty when the header is missing).
    pub subject: String,
    /// Decoded text of the first inline body part (empty when the
    /// first part is an attachment).
    pub body: String,
}
