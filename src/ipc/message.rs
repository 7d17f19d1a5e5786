//! Frames exchanged between the primary and its workers.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Worker → primary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// The worker process is up and its IPC link works.
    Online,
    /// The worker's HTTP listener is bound.
    Listening { address: SocketAddr },
    /// Payload to fan out to every live worker, sender included.
    Broadcast { payload: Value },
}

/// Primary → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrimaryMessage {
    /// A relayed broadcast for the worker's `IPM` handler.
    Ipm { payload: Value },
}

/// Payload of a broadcast as seen by the `IPM` handler.
///
/// Objects carrying both a string `type` and a `message` key are tagged;
/// every other payload is delivered raw.
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastMessage {
    Tagged { kind: String, message: Value },
    Raw(Value),
}

impl BroadcastMessage {
    pub fn tagged(kind: impl Into<String>, message: impl Into<Value>) -> Self {
        Self::Tagged {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn raw(payload: impl Into<Value>) -> Self {
        Self::Raw(payload.into())
    }

    /// Interpret a relayed payload.
    pub fn from_payload(payload: Value) -> Self {
        if let Value::Object(map) = &payload {
            if let (Some(Value::String(kind)), Some(message)) = (map.get("type"), map.get("message")) {
                return Self::Tagged {
                    kind: kind.clone(),
                    message: message.clone(),
                };
            }
        }
        Self::Raw(payload)
    }

    /// Wire form of this message.
    pub fn into_payload(self) -> Value {
        match self {
            Self::Tagged { kind, message } => {
                let mut map = Map::new();
                map.insert("type".to_string(), Value::String(kind));
                map.insert("message".to_string(), message);
                Value::Object(map)
            }
            Self::Raw(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn worker_message_wire_format() {
        let frame = serde_json::to_string(&WorkerMessage::Broadcast {
            payload: json!({"type": "reload", "message": 1}),
        })
        .unwrap();
        assert_eq!(
            frame,
            r#"{"kind":"broadcast","payload":{"type":"reload","message":1}}"#
        );

        let online: WorkerMessage = serde_json::from_str(r#"{"kind":"online"}"#).unwrap();
        assert_eq!(online, WorkerMessage::Online);
    }

    #[test]
    fn payload_with_type_and_message_is_tagged() {
        let msg = BroadcastMessage::from_payload(json!({"type": "cache", "message": {"flush": true}}));
        assert_eq!(msg, BroadcastMessage::tagged("cache", json!({"flush": true})));
    }

    #[test]
    fn incomplete_envelopes_stay_raw() {
        let only_type = json!({"type": "cache"});
        assert_eq!(
            BroadcastMessage::from_payload(only_type.clone()),
            BroadcastMessage::Raw(only_type)
        );

        let numeric_type = json!({"type": 3, "message": "x"});
        assert_eq!(
            BroadcastMessage::from_payload(numeric_type.clone()),
            BroadcastMessage::Raw(numeric_type)
        );

        assert_eq!(
            BroadcastMessage::from_payload(json!("hello")),
            BroadcastMessage::raw("hello")
        );
    }

    #[test]
    fn tagged_payload_keeps_its_shape_on_the_wire() {
        let payload = BroadcastMessage::tagged("tick", 5).into_payload();
        assert_eq!(payload, json!({"type": "tick", "message": 5}));
    }
}
