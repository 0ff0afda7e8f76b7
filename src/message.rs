//! Decoded protocol frames

use std::fmt;
use std::sync::OnceLock;

use crate::constants::{HEADER_CONTENT_LENGTH, HEADER_CONTENT_TYPE, HEADER_REPLY_TEXT};
use crate::protocol::MessageType;

/// One frame received from the switch: an ordered header block and the body split into lines.
///
/// Header values are kept exactly as they arrived. Frames are immutable once decoded.
#[derive(Clone)]
pub struct EslMessage {
    headers: Vec<(String, String)>,
    body: Vec<String>,
    content_length: OnceLock<Option<usize>>,
}

impl EslMessage {
    /// Build a frame from already-split parts. A repeated header name replaces the
    /// earlier value but keeps its position.
    pub fn new(headers: impl IntoIterator<Item = (String, String)>, body: Vec<String>) -> Self {
        let mut unique: Vec<(String, String)> = Vec::new();
        for (name, value) in headers {
            match unique
                .iter_mut()
                .find(|(existing, _)| *existing == name)
            {
                Some(slot) => slot.1 = value,
                None => unique.push((name, value)),
            }
        }
        Self {
            headers: unique,
            body,
            content_length: OnceLock::new(),
        }
    }

    /// Exact-name header lookup.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_header(&self, name: impl AsRef<str>) -> bool {
        self.header(name)
            .is_some()
    }

    /// Headers in arrival order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn header_count(&self) -> usize {
        self.headers
            .len()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(HEADER_CONTENT_TYPE)
    }

    /// Parsed `Content-Length`, computed on first use.
    pub fn content_length(&self) -> Option<usize> {
        *self
            .content_length
            .get_or_init(|| {
                self.header(HEADER_CONTENT_LENGTH)
                    .and_then(|v| v.parse().ok())
            })
    }

    pub fn has_content_length(&self) -> bool {
        self.content_length()
            .is_some()
    }

    pub fn message_type(&self) -> MessageType {
        MessageType::from_content_type(
            self.content_type()
                .unwrap_or(""),
        )
    }

    pub fn reply_text(&self) -> Option<&str> {
        self.header(HEADER_REPLY_TEXT)
    }

    pub fn body_lines(&self) -> &[String] {
        &self.body
    }

    /// Body lines joined with `\n`.
    pub fn body(&self) -> String {
        self.body
            .join("\n")
    }

    pub fn has_body(&self) -> bool {
        !self
            .body
            .is_empty()
    }
}

impl PartialEq for EslMessage {
    fn eq(&self, other: &Self) -> bool {
        self.headers == other.headers && self.body == other.body
    }
}

impl Eq for EslMessage {}

impl fmt::Display for EslMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EslMessage: content-type=[{}] headers={}, body={} lines",
            self.content_type()
                .unwrap_or("<none>"),
            self.headers
                .len(),
            self.body
                .len()
        )
    }
}

// Bodies can carry credentials or large dumps; Debug stays a summary too.
impl fmt::Debug for EslMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EslMessage")
            .field("content_type", &self.content_type())
            .field("headers", &self.headers.len())
            .field("body_lines", &self.body.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(headers: &[(&str, &str)], body: &[&str]) -> EslMessage {
        EslMessage::new(
            headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string())),
            body.iter()
                .map(|l| l.to_string())
                .collect(),
        )
    }

    #[test]
    fn absent_header_is_none() {
        let msg = message(&[("Content-Type", "command/reply")], &[]);
        assert_eq!(msg.header("Reply-Text"), None);
        assert!(!msg.has_header("Reply-Text"));
        assert_eq!(msg.content_type(), Some("command/reply"));
    }

    #[test]
    fn header_lookup_is_exact() {
        let msg = message(&[("Reply-Text", "+OK")], &[]);
        assert_eq!(msg.header("reply-text"), None);
        assert_eq!(msg.reply_text(), Some("+OK"));
    }

    #[test]
    fn duplicate_header_replaces_in_place() {
        let msg = message(&[("A", "1"), ("B", "2"), ("A", "3")], &[]);
        let headers: Vec<_> = msg
            .headers()
            .collect();
        assert_eq!(headers, vec![("A", "3"), ("B", "2")]);
    }

    #[test]
    fn content_length_parsed_and_cached() {
        let msg = message(&[("Content-Length", "42")], &[]);
        assert_eq!(msg.content_length(), Some(42));
        assert_eq!(msg.content_length(), Some(42));
        assert!(msg.has_content_length());

        let bad = message(&[("Content-Length", "x")], &[]);
        assert_eq!(bad.content_length(), None);
    }

    #[test]
    fn display_is_summary_only() {
        let msg = message(
            &[("Content-Type", "api/response"), ("Content-Length", "14")],
            &["secret-output"],
        );
        let shown = msg.to_string();
        assert_eq!(
            shown,
            "EslMessage: content-type=[api/response] headers=2, body=1 lines"
        );
        assert!(!format!("{:?}", msg).contains("secret"));
    }

    #[test]
    fn body_joined_with_newlines() {
        let msg = message(&[], &["line1", "", "line3"]);
        assert_eq!(msg.body(), "line1\n\nline3");
        assert!(msg.has_body());
    }
}
