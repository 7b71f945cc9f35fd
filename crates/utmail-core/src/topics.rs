//! Course topic table.
//!
//! University course codes as they appear in mail subjects, mapped
//! to hashtag labels. The table is an ordered slice: when a subject
//! contains more than one known code, the earliest entry here wins,
//! which keeps classification deterministic.

/// Course code → topic label, in priority order.
pub const COURSE_TOPICS: &[(&str, &str)] = &[
    ("3991810128301", "سیستم_عامل"),
    ("3991810139702", "هوش_مصنوعی"),
    ("3991810120905", "زبان_تخصصی"),
    ("3991810153803", "سیگنال"),
    ("3991810153601", "CAD"),
    ("3991810157401", "کامپایلر"),
    ("3991810121801", "سیستم_هوشمند"),
    ("3991810114901", "نرم۱"),
];

/// Topic label for a mail subject, if any known course code occurs
/// in it as a substring.
pub fn topic_for(subject: &str) -> Option<&'static str> {
    COURSE_TOPICS
        .iter()
        .find(|(code, _)| subject.contains(code))
        .map(|&(_, topic)| topic)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
