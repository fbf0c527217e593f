use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Routing key carried in the `Id` field of every inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for MessageId {
    fn from(id: i32) -> Self {
        MessageId(id)
    }
}

/// A decoded inbound message.
///
/// Fields other than `Id` and `Name` are kept untouched in `extra` so that
/// newer clients can attach data the broker does not understand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "Id")]
    pub id: MessageId,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(id: impl Into<MessageId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extra: Map::new(),
        }
    }
}

/// A message as it sits in a subscription queue.
///
/// `priority` is advisory; the broker never reorders on it.
#[derive(Debug, Clone, PartialEq)]
pub struct PrioritizedMessage {
    pub message: Arc<Message>,
    pub priority: i32,
}

impl PrioritizedMessage {
    pub fn new(message: Arc<Message>, priority: i32) -> Self {
        Self { message, priority }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes one frame payload into a [`Message`].
pub fn decode_message(payload: &[u8]) -> Result<Message, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    Ok(serde_json::from_str(text)?)
}

/// Serializes a [`Message`] as a newline-terminated wire frame.
pub fn encode_message(message: &Message) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = serde_json::to_vec(message)?;
    buf.push(b'\n');
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_shape() {
        let msg = decode_message(br#"{"Id":1,"Name":"a"}"#).unwrap();
        assert_eq!(msg, Message::new(1, "a"));
    }

    #[test]
    fn unknown_fields_are_carried_opaquely() {
        let msg = decode_message(br#"{"Id":7,"Name":"x","Source":"plc-3","Seq":12}"#).unwrap();
        assert_eq!(msg.id, MessageId(7));
        assert_eq!(msg.extra.get("Source"), Some(&Value::from("plc-3")));
        assert_eq!(msg.extra.get("Seq"), Some(&Value::from(12)));
    }

    #[test]
    fn missing_name_defaults_to_empty() {
        let msg = decode_message(br#"{"Id":3}"#).unwrap();
        assert_eq!(msg.name, "");
    }

    #[test]
    fn missing_id_is_rejected() {
        assert!(matches!(
            decode_message(br#"{"Name":"orphan"}"#),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(decode_message(br#"{"Id":1,"Name":"#).is_err());
        assert!(decode_message(b"not json").is_err());
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        assert!(matches!(
            decode_message(&[b'{', 0xff, b'}']),
            Err(DecodeError::Utf8(_))
        ));
    }

    #[test]
    fn encoded_frame_is_newline_terminated() {
        let frame = encode_message(&Message::new(2, "b")).unwrap();
        assert_eq!(frame.last(), Some(&b'\n'));
        let decoded = decode_message(&frame[..frame.len() - 1]).unwrap();
        assert_eq!(decoded, Message::new(2, "b"));
    }
}
