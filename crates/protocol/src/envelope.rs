//! Tag-routed envelope around protocol messages.
//!
//! Bodies are serialized on their own and the routing `tag` is injected into
//! the resulting JSON object, so `{tag, ...body}` stays flat on the wire.

use serde::Serialize;
use serde_json::Value;

use crate::ProtocolError;
use crate::constants::{FILE_TAG, HANDSHAKE_TAG};
use crate::messages::{FileCommand, FileEvent, HandshakeFrame};

/// Serializes `body` and injects `tag` into the top-level object.
pub fn encode<T: Serialize>(tag: &str, body: &T) -> Result<String, ProtocolError> {
    let mut value = serde_json::to_value(body)?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| ProtocolError::InvalidMessage("message body must be a JSON object".into()))?;
    obj.insert("tag".into(), Value::String(tag.to_string()));
    Ok(serde_json::to_string(&value)?)
}

/// Encodes a command for the file channel.
pub fn encode_command(command: &FileCommand) -> Result<String, ProtocolError> {
    encode(FILE_TAG, command)
}

/// Encodes a handshake frame with the given sequence number.
pub fn encode_handshake(sequence: u32) -> Result<String, ProtocolError> {
    encode(HANDSHAKE_TAG, &HandshakeFrame::new(sequence))
}

/// A decoded inbound message, routed by tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    File(FileEvent),
    Handshake(HandshakeFrame),
    /// Valid envelope on a channel this crate does not handle.
    Unknown(String),
}

impl Inbound {
    /// Decodes an inbound payload.
    ///
    /// Accepts either a JSON object or a string holding one, since some
    /// bridges hand over the raw text the receiver sent.
    pub fn parse(payload: &Value) -> Result<Self, ProtocolError> {
        match payload {
            Value::Object(_) => Self::parse_object(payload),
            Value::String(text) => Self::parse_str(text),
            other => Err(ProtocolError::InvalidMessage(format!(
                "expected a JSON object, got {}",
                kind_of(other)
            ))),
        }
    }

    /// Decodes an inbound payload from JSON text.
    pub fn parse_str(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::InvalidMessage(format!("not JSON: {e}")))?;
        if !value.is_object() {
            return Err(ProtocolError::InvalidMessage(format!(
                "expected a JSON object, got {}",
                kind_of(&value)
            )));
        }
        Self::parse_object(&value)
    }

    fn parse_object(value: &Value) -> Result<Self, ProtocolError> {
        let tag = value
            .get("tag")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::InvalidMessage("missing tag".into()))?;

        match tag {
            FILE_TAG => {
                let event = serde_json::from_value::<FileEvent>(value.clone())
                    .map_err(|e| ProtocolError::InvalidMessage(format!("file event: {e}")))?;
                Ok(Inbound::File(event))
            }
            HANDSHAKE_TAG => {
                let frame = serde_json::from_value::<HandshakeFrame>(value.clone())
                    .map_err(|e| ProtocolError::InvalidMessage(format!("handshake: {e}")))?;
                Ok(Inbound::Handshake(frame))
            }
            other => Ok(Inbound::Unknown(other.to_string())),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
