//! Messages exchanged between simulated nodes.

use std::fmt;

use crate::node::NodeId;

/// Application-level identifier of a message.
///
/// Protocols pick their own ids (`1`, `"M1"`, ...); the transport never
/// interprets them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Protocol-specific message variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Liveness probe, answered with a [`MessageKind::Pong`].
    Ping,
    /// Reply to a [`MessageKind::Ping`].
    Pong,
    /// Total-order multicast envelope; sequenced once the sequencer has
    /// stamped it.
    Multicast,
}

impl MessageKind {
    /// Get a human-readable name for this message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            MessageKind::Ping => "PING",
            MessageKind::Pong => "PONG",
            MessageKind::Multicast => "MULTICAST",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A message in the simulated network.
///
/// Immutable once built, except for the sequence number, which only the
/// sequencer stamps and only once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    src: NodeId,
    dest: NodeId,
    kind: MessageKind,
    payload: Option<String>,
    sequence_number: Option<u64>,
}

impl Message {
    pub fn new(id: impl Into<MessageId>, src: NodeId, dest: NodeId, kind: MessageKind) -> Self {
        Self {
            id: id.into(),
            src,
            dest,
            kind,
            payload: None,
            sequence_number: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Node that created the message.
    pub fn src(&self) -> NodeId {
        self.src
    }

    /// Node the message was originally addressed to.
    pub fn dest(&self) -> NodeId {
        self.dest
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    pub fn sequence_number(&self) -> Option<u64> {
        self.sequence_number
    }

    pub fn is_sequenced(&self) -> bool {
        self.sequence_number.is_some()
    }

    /// Stamps the global sequence number.
    pub(crate) fn with_sequence_number(mut self, sequence_number: u64) -> Self {
        debug_assert!(
            self.sequence_number.is_none(),
            "sequence number of {} assigned twice",
            self.id
        );
        self.sequence_number = Some(sequence_number);
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Type {}::{}=>{}", self.id, self.kind, self.src, self.dest)?;
        if let Some(seq) = self.sequence_number {
            write!(f, " #{seq}")?;
        }
        if let Some(payload) = &self.payload {
            write!(f, "--[{payload}]")?;
        }
        Ok(())
    }
}
