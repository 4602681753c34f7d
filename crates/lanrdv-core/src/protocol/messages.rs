//! All discovery and rendezvous wire message types.
//!
//! Every message is UTF-8 text of the form `<KIND>:<body>`.  The kind is the
//! discriminant; the body is an opaque identity tag or identity string.
//!
//! | Kind             | Channel       | Sender    | Body            |
//! |------------------|---------------|-----------|-----------------|
//! | `ANNOUNCE`       | UDP multicast | client    | client tag      |
//! | `ANNOUNCE-REPLY` | UDP unicast   | host      | host identity   |
//! | `HELLO`          | TCP           | client    | client tag      |
//! | `WELCOME`        | TCP           | host      | host identity   |

// ── Protocol constants ────────────────────────────────────────────────────────

/// Separator between the kind and the body.
pub const KIND_SEPARATOR: char = ':';

/// Upper bound on the size of any encoded message, in bytes.
///
/// Applies to UDP datagrams and to the single TCP greeting/reply alike.
pub const MAX_MESSAGE_LEN: usize = 1024;

// ── Message kinds ─────────────────────────────────────────────────────────────

/// The discriminant carried at the start of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Announce,
    AnnounceReply,
    Hello,
    Welcome,
}

impl MessageKind {
    /// All kinds, in wire-table order.
    pub const ALL: [MessageKind; 4] = [
        MessageKind::Announce,
        MessageKind::AnnounceReply,
        MessageKind::Hello,
        MessageKind::Welcome,
    ];

    /// The literal kind token written on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Announce => "ANNOUNCE",
            MessageKind::AnnounceReply => "ANNOUNCE-REPLY",
            MessageKind::Hello => "HELLO",
            MessageKind::Welcome => "WELCOME",
        }
    }

    /// Looks up a kind by its exact wire token.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == token)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// A fully parsed wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// Discovery probe sent by a client to the multicast group.
    Announce { client_tag: String },
    /// Discovery reply sent by a host to the probe's observed source.
    AnnounceReply { host_identity: String },
    /// Rendezvous greeting written by the client after connecting.
    Hello { client_tag: String },
    /// Rendezvous reply written by the host before closing.
    Welcome { host_identity: String },
}

impl WireMessage {
    /// Returns the [`MessageKind`] of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            WireMessage::Announce { .. } => MessageKind::Announce,
            WireMessage::AnnounceReply { .. } => MessageKind::AnnounceReply,
            WireMessage::Hello { .. } => MessageKind::Hello,
            WireMessage::Welcome { .. } => MessageKind::Welcome,
        }
    }

    /// Returns the body (tag or identity) carried by this message.
    pub fn body(&self) -> &str {
        match self {
            WireMessage::Announce { client_tag } | WireMessage::Hello { client_tag } => client_tag,
            WireMessage::AnnounceReply { host_identity } | WireMessage::Welcome { host_identity } => {
                host_identity
            }
        }
    }

    /// Builds the message of `kind` carrying `body`.
    pub fn from_parts(kind: MessageKind, body: String) -> Self {
        match kind {
            MessageKind::Announce => WireMessage::Announce { client_tag: body },
            MessageKind::AnnounceReply => WireMessage::AnnounceReply {
                host_identity: body,
            },
            MessageKind::Hello => WireMessage::Hello { client_tag: body },
            MessageKind::Welcome => WireMessage::Welcome {
                host_identity: body,
            },
        }
    }

    /// Consumes the message and returns its body.
    pub fn into_body(self) -> String {
        match self {
            WireMessage::Announce { client_tag } | WireMessage::Hello { client_tag } => client_tag,
            WireMessage::AnnounceReply { host_identity } | WireMessage::Welcome { host_identity } => {
                host_identity
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tokens_match_wire_table() {
        assert_eq!(MessageKind::Announce.as_str(), "ANNOUNCE");
        assert_eq!(MessageKind::AnnounceReply.as_str(), "ANNOUNCE-REPLY");
        assert_eq!(MessageKind::Hello.as_str(), "HELLO");
        assert_eq!(MessageKind::Welcome.as_str(), "WELCOME");
    }

    #[test]
    fn test_from_token_is_exact_and_case_sensitive() {
        assert_eq!(MessageKind::from_token("HELLO"), Some(MessageKind::Hello));
        assert_eq!(MessageKind::from_token("hello"), None);
        assert_eq!(MessageKind::from_token("ANNOUNCE-"), None);
        assert_eq!(MessageKind::from_token(""), None);
    }

    #[test]
    fn test_from_token_inverts_as_str_for_every_kind() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_token(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_from_parts_builds_matching_variant() {
        // Arrange
        let msg = WireMessage::from_parts(MessageKind::Welcome, "host-a".to_string());

        // Assert
        assert_eq!(
            msg,
            WireMessage::Welcome {
                host_identity: "host-a".to_string()
            }
        );
        assert_eq!(msg.kind(), MessageKind::Welcome);
        assert_eq!(msg.body(), "host-a");
    }

    #[test]
    fn test_into_body_returns_tag() {
        let msg = WireMessage::Hello {
            client_tag: "cli-1".to_string(),
        };
        assert_eq!(msg.into_body(), "cli-1");
    }
}
