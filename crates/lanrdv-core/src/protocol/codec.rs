//! Text codec for encoding and decoding discovery and rendezvous messages.
//!
//! Wire format:
//! ```text
//! <KIND>:<body>
//! ```
//! `KIND` is one of the tokens in [`MessageKind`]; `body` is everything after
//! the first `:` and may itself contain `:`.  The whole message is UTF-8 and
//! at most [`MAX_MESSAGE_LEN`] bytes.  A single trailing `\n` or `\r\n` is
//! tolerated on decode so line-oriented tools can talk to a host.

use thiserror::Error;

use crate::protocol::messages::{MessageKind, WireMessage, KIND_SEPARATOR, MAX_MESSAGE_LEN};

/// Longest kind token echoed back in an [`ProtocolError::UnknownKind`] error.
const MAX_REPORTED_TOKEN: usize = 32;

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The message contained no bytes at all.
    #[error("empty message")]
    Empty,

    /// The message is larger than the protocol allows.
    #[error("message too long: {len} bytes exceeds the {max}-byte limit")]
    MessageTooLong { len: usize, max: usize },

    /// The bytes are not valid UTF-8.
    #[error("message is not valid UTF-8")]
    InvalidUtf8,

    /// No `:` separates the kind from the body.
    #[error("missing ':' kind separator")]
    MissingSeparator,

    /// The kind token is not one of the known kinds.
    #[error("unknown message kind: {0:?}")]
    UnknownKind(String),

    /// The body after the separator is empty.
    #[error("{0} message has an empty body")]
    EmptyBody(MessageKind),

    /// The body contains control characters.
    #[error("{0} message body contains control characters")]
    InvalidBody(MessageKind),

    /// The message parsed but is not the kind this channel expects.
    #[error("expected {expected} message, got {got}")]
    UnexpectedKind {
        expected: MessageKind,
        got: MessageKind,
    },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`WireMessage`] into its UTF-8 wire bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::EmptyBody`] or [`ProtocolError::InvalidBody`] if
/// the body would not survive a decode, and [`ProtocolError::MessageTooLong`]
/// if the encoded form exceeds [`MAX_MESSAGE_LEN`].
///
/// # Examples
///
/// ```rust
/// use lanrdv_core::protocol::{decode_message, encode_message, WireMessage};
///
/// let msg = WireMessage::Hello { client_tag: "laptop".to_string() };
/// let bytes = encode_message(&msg).unwrap();
/// assert_eq!(bytes, b"HELLO:laptop");
/// assert_eq!(decode_message(&bytes).unwrap(), msg);
/// ```
pub fn encode_message(msg: &WireMessage) -> Result<Vec<u8>, ProtocolError> {
    let kind = msg.kind();
    validate_body(kind, msg.body())?;

    let token = kind.as_str();
    let len = token.len() + KIND_SEPARATOR.len_utf8() + msg.body().len();
    if len > MAX_MESSAGE_LEN {
        return Err(ProtocolError::MessageTooLong {
            len,
            max: MAX_MESSAGE_LEN,
        });
    }

    let mut buf = Vec::with_capacity(len);
    buf.extend_from_slice(token.as_bytes());
    buf.push(KIND_SEPARATOR as u8);
    buf.extend_from_slice(msg.body().as_bytes());
    Ok(buf)
}

/// Decodes one [`WireMessage`] from `bytes`.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes do not form a valid message.
pub fn decode_message(bytes: &[u8]) -> Result<WireMessage, ProtocolError> {
    if bytes.is_empty() {
        return Err(ProtocolError::Empty);
    }
    if bytes.len() > MAX_MESSAGE_LEN {
        return Err(ProtocolError::MessageTooLong {
            len: bytes.len(),
            max: MAX_MESSAGE_LEN,
        });
    }

    let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
    let text = strip_line_ending(text);

    let (token, body) = text
        .split_once(KIND_SEPARATOR)
        .ok_or(ProtocolError::MissingSeparator)?;

    let kind = MessageKind::from_token(token).ok_or_else(|| {
        ProtocolError::UnknownKind(token.chars().take(MAX_REPORTED_TOKEN).collect())
    })?;
    validate_body(kind, body)?;

    Ok(WireMessage::from_parts(kind, body.to_string()))
}

/// Decodes `bytes` and checks that the message is of the `expected` kind.
///
/// Returns the body on success.  Listeners use this to accept only the one
/// kind their channel carries.
///
/// # Errors
///
/// Returns [`ProtocolError::UnexpectedKind`] for a well-formed message of
/// another kind, or any error from [`decode_message`].
pub fn decode_expected(bytes: &[u8], expected: MessageKind) -> Result<String, ProtocolError> {
    let msg = decode_message(bytes)?;
    let got = msg.kind();
    if got != expected {
        return Err(ProtocolError::UnexpectedKind { expected, got });
    }
    Ok(msg.into_body())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn strip_line_ending(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

fn validate_body(kind: MessageKind, body: &str) -> Result<(), ProtocolError> {
    if body.is_empty() {
        return Err(ProtocolError::EmptyBody(kind));
    }
    if body.chars().any(char::is_control) {
        return Err(ProtocolError::InvalidBody(kind));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_announce_produces_schema_text() {
        // Arrange
        let msg = WireMessage::Announce {
            client_tag: "client-7".to_string(),
        };

        // Act
        let bytes = encode_message(&msg).unwrap();

        // Assert
        assert_eq!(bytes, b"ANNOUNCE:client-7");
    }

    #[test]
    fn test_encode_reply_uses_hyphenated_kind() {
        let msg = WireMessage::AnnounceReply {
            host_identity: "den-pc".to_string(),
        };
        assert_eq!(encode_message(&msg).unwrap(), b"ANNOUNCE-REPLY:den-pc");
    }

    #[test]
    fn test_encode_rejects_empty_body() {
        let msg = WireMessage::Hello {
            client_tag: String::new(),
        };
        assert_eq!(
            encode_message(&msg),
            Err(ProtocolError::EmptyBody(MessageKind::Hello))
        );
    }

    #[test]
    fn test_encode_rejects_body_with_newline() {
        let msg = WireMessage::Welcome {
            host_identity: "a\nb".to_string(),
        };
        assert_eq!(
            encode_message(&msg),
            Err(ProtocolError::InvalidBody(MessageKind::Welcome))
        );
    }

    #[test]
    fn test_encode_rejects_oversize_message() {
        // Arrange: "HELLO:" is 6 bytes, so a body of MAX-5 bytes overflows by one.
        let msg = WireMessage::Hello {
            client_tag: "x".repeat(MAX_MESSAGE_LEN - 5),
        };

        // Act
        let result = encode_message(&msg);

        // Assert
        assert_eq!(
            result,
            Err(ProtocolError::MessageTooLong {
                len: MAX_MESSAGE_LEN + 1,
                max: MAX_MESSAGE_LEN
            })
        );
    }

    #[test]
    fn test_encode_accepts_message_exactly_at_limit() {
        let msg = WireMessage::Hello {
            client_tag: "x".repeat(MAX_MESSAGE_LEN - 6),
        };
        assert_eq!(encode_message(&msg).unwrap().len(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn test_decode_keeps_colons_inside_body() {
        // Arrange: an identity that looks like an address must stay opaque.
        let bytes = b"ANNOUNCE-REPLY:host:10.0.0.9:2505";

        // Act
        let msg = decode_message(bytes).unwrap();

        // Assert
        assert_eq!(
            msg,
            WireMessage::AnnounceReply {
                host_identity: "host:10.0.0.9:2505".to_string()
            }
        );
    }

    #[test]
    fn test_decode_tolerates_single_trailing_newline() {
        assert_eq!(
            decode_message(b"HELLO:cli\r\n").unwrap(),
            WireMessage::Hello {
                client_tag: "cli".to_string()
            }
        );
        assert_eq!(decode_message(b"HELLO:cli\n").unwrap().body(), "cli");
    }

    #[test]
    fn test_decode_empty_returns_empty_error() {
        assert_eq!(decode_message(b""), Err(ProtocolError::Empty));
    }

    #[test]
    fn test_decode_invalid_utf8_is_rejected() {
        assert_eq!(
            decode_message(&[b'H', b'I', 0xFF, 0xFE]),
            Err(ProtocolError::InvalidUtf8)
        );
    }

    #[test]
    fn test_decode_without_separator_is_rejected() {
        // The classic free-form greeting from older scripts has no kind.
        assert_eq!(
            decode_message(b"Hi from python client"),
            Err(ProtocolError::MissingSeparator)
        );
    }

    #[test]
    fn test_decode_unknown_kind_reports_token() {
        assert_eq!(
            decode_message(b"GOODBYE:x"),
            Err(ProtocolError::UnknownKind("GOODBYE".to_string()))
        );
    }

    #[test]
    fn test_decode_unknown_kind_truncates_long_token() {
        let mut bytes = "Z".repeat(100).into_bytes();
        bytes.extend_from_slice(b":body");

        match decode_message(&bytes) {
            Err(ProtocolError::UnknownKind(token)) => assert_eq!(token.len(), MAX_REPORTED_TOKEN),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_empty_body_is_rejected() {
        assert_eq!(
            decode_message(b"ANNOUNCE:"),
            Err(ProtocolError::EmptyBody(MessageKind::Announce))
        );
    }

    #[test]
    fn test_decode_oversize_is_rejected_before_parsing() {
        let bytes = vec![b'A'; MAX_MESSAGE_LEN + 1];
        assert_eq!(
            decode_message(&bytes),
            Err(ProtocolError::MessageTooLong {
                len: MAX_MESSAGE_LEN + 1,
                max: MAX_MESSAGE_LEN
            })
        );
    }

    #[test]
    fn test_decode_expected_returns_body_for_matching_kind() {
        assert_eq!(
            decode_expected(b"ANNOUNCE:tag-1", MessageKind::Announce),
            Ok("tag-1".to_string())
        );
    }

    #[test]
    fn test_decode_expected_rejects_other_kind() {
        // A reply looped back to a responder must not be answered.
        assert_eq!(
            decode_expected(b"ANNOUNCE-REPLY:host", MessageKind::Announce),
            Err(ProtocolError::UnexpectedKind {
                expected: MessageKind::Announce,
                got: MessageKind::AnnounceReply
            })
        );
    }
}
