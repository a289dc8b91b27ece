//! Control-plane messages.
//!
//! Messages arrive keyed by topic and carry a YAML/JSON document. The payload
//! is kept raw until the worker handles it.

use bytes::Bytes;
use cec_profile::Profile;
use std::fmt;

/// Topic prefix shared by all control-plane messages
pub const MESSAGE_PREFIX: &str = "hdmicec";
/// Topic of command messages
pub const TOPIC_COMMAND: &str = "hdmicec/command";
/// Topic of state messages
pub const TOPIC_STATE: &str = "hdmicec/state";
/// Topic of event messages
pub const TOPIC_EVENT: &str = "hdmicec/event";
/// Topic of config messages
pub const TOPIC_CONFIG: &str = "hdmicec/config";

/// Kind of a control-plane message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Simulated CEC traffic towards the driver
    Command,
    /// Event notification
    Event,
    /// Configuration change
    Config,
    /// Topology change or status request
    State,
}

impl MessageKind {
    /// Every kind, in detection order
    pub const ALL: [MessageKind; 4] = [
        MessageKind::Command,
        MessageKind::State,
        MessageKind::Event,
        MessageKind::Config,
    ];

    /// Kind registered for `topic`
    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            TOPIC_COMMAND => Some(MessageKind::Command),
            TOPIC_STATE => Some(MessageKind::State),
            TOPIC_EVENT => Some(MessageKind::Event),
            TOPIC_CONFIG => Some(MessageKind::Config),
            _ => None,
        }
    }

    /// Topic of this kind
    pub fn topic(self) -> &'static str {
        match self {
            MessageKind::Command => TOPIC_COMMAND,
            MessageKind::State => TOPIC_STATE,
            MessageKind::Event => TOPIC_EVENT,
            MessageKind::Config => TOPIC_CONFIG,
        }
    }

    /// Key of this kind inside a message document, without the prefix
    pub fn key(self) -> &'static str {
        match self {
            MessageKind::Command => "command",
            MessageKind::State => "state",
            MessageKind::Event => "event",
            MessageKind::Config => "config",
        }
    }

    /// Infer the kind from the keys present in a message document
    pub fn detect(document: &Profile) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| field(document, kind.key()).is_some())
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic())
    }
}

/// Entry of the message queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Control-plane message with its raw document
    Control {
        /// Message kind
        kind: MessageKind,
        /// Raw YAML/JSON payload
        payload: Bytes,
    },
    /// Stops the worker once every earlier message has been handled
    ExitRequested,
}

impl Message {
    /// Build a control-plane message
    pub fn control(kind: MessageKind, payload: impl Into<Bytes>) -> Self {
        Message::Control {
            kind,
            payload: payload.into(),
        }
    }
}

/// Resolve a message field, looking under the `hdmicec/` prefix first.
///
/// Documents may nest their fields under `hdmicec:` or keep them top-level.
pub fn field(document: &Profile, key: &str) -> Option<String> {
    let prefixed = format!("{}/{}", MESSAGE_PREFIX, key);
    document
        .get_str(&prefixed)
        .or_else(|_| document.get_str(key))
        .ok()
}

/// Key path of a message field, preferring the `hdmicec/` prefix
pub fn field_path(document: &Profile, key: &str) -> String {
    let prefixed = format!("{}/{}", MESSAGE_PREFIX, key);
    if document.contains(&prefixed) {
        prefixed
    } else {
        key.to_string()
    }
}
