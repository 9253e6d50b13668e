/// Canonical form used for wake-word classification and command emission:
/// trimmed and lower-cased, otherwise untouched.
pub fn normalize_transcript(text: &str) -> String {
    text.trim().to_lowercase()
}

pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
