//! Relayed payloads.

use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes};

/// A data frame as received, forwarded without inspection.
///
/// Both variants are reference counted, so cloning per recipient does not
/// copy the payload.
#[derive(Debug, Clone)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(Utf8Bytes),
    /// Binary frame.
    Binary(Bytes),
}

impl Frame {
    /// Extract a data frame. Control frames yield `None`.
    pub fn from_message(msg: Message) -> Option<Self> {
        match msg {
            Message::Text(text) => Some(Self::Text(text)),
            Message::Binary(bytes) => Some(Self::Binary(bytes)),
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) => None,
        }
    }

    /// Convert back into a socket message, keeping the frame kind.
    pub fn into_message(self) -> Message {
        match self {
            Self::Text(text) => Message::Text(text),
            Self::Binary(bytes) => Message::Binary(bytes),
        }
    }

    /// Text payload, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Binary(_) => None,
        }
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.as_str().len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_keeps_kind() {
        let frame = Frame::from_message(Message::Text("hello".into())).unwrap();
        assert_eq!(frame.as_text(), Some("hello"));
        assert_eq!(frame.len(), 5);
        assert!(matches!(frame.into_message(), Message::Text(t) if t.as_str() == "hello"));
    }

    #[test]
    fn binary_keeps_kind() {
        let frame = Frame::from_message(Message::Binary(Bytes::from_static(&[1, 2, 3]))).unwrap();
        assert!(frame.as_text().is_none());
        assert_eq!(frame.len(), 3);
        assert!(matches!(frame.into_message(), Message::Binary(b) if b.as_ref() == [1, 2, 3]));
    }

    #[test]
    fn control_frames_are_not_relayed() {
        assert!(Frame::from_message(Message::Ping(Bytes::new())).is_none());
        assert!(Frame::from_message(Message::Pong(Bytes::new())).is_none());
        assert!(Frame::from_message(Message::Close(None)).is_none());
    }

    #[test]
    fn empty_text_is_a_frame() {
        let frame = Frame::from_message(Message::Text("".into())).unwrap();
        assert!(frame.is_empty());
    }
}
