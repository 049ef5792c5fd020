//! OCPP-J envelope codec
//!
//! Every OCPP-J frame is a JSON array whose first element is the message
//! type id:
//! ```text
//! [2, "<messageId>", "<action>", {payload}]                        CALL
//! [3, "<messageId>", {payload}]                                    CALLRESULT
//! [4, "<messageId>", "<errorCode>", "<description>", {details}]    CALLERROR
//! ```
//! Only the envelope is interpreted here. Payloads stay a generic
//! [`ValueTree`] so the validator can search them without knowing the
//! message schema.

use serde_json::{json, Value};

use crate::common::{Error, Result};

/// Generic nested payload: string, number, boolean, null, sequence or mapping
pub type ValueTree = Value;

/// OCPP-J message type id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Call,
    CallResult,
    CallError,
}

impl MessageKind {
    fn from_type_id(id: u64) -> Option<Self> {
        match id {
            2 => Some(Self::Call),
            3 => Some(Self::CallResult),
            4 => Some(Self::CallError),
            _ => None,
        }
    }

    pub fn type_id(self) -> u64 {
        match self {
            Self::Call => 2,
            Self::CallResult => 3,
            Self::CallError => 4,
        }
    }
}

/// Outgoing request
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub message_id: String,
    pub action: String,
    pub payload: ValueTree,
}

/// Successful reply to a [`Call`]
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub message_id: String,
    pub payload: ValueTree,
}

/// Error reply to a [`Call`]
#[derive(Debug, Clone, PartialEq)]
pub struct CallError {
    pub message_id: String,
    pub error_code: String,
    pub error_description: String,
    pub error_details: ValueTree,
}

/// Any decoded OCPP-J frame
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Call(Call),
    CallResult(CallResult),
    CallError(CallError),
}

impl Call {
    /// Build a call with a fresh message id
    pub fn new(action: impl Into<String>, payload: ValueTree) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            action: action.into(),
            payload,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        json!([
            MessageKind::Call.type_id(),
            self.message_id,
            self.action,
            self.payload
        ])
        .to_string()
        .into_bytes()
    }

    /// Decode bytes that must hold a CALL frame
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match Envelope::decode(bytes)? {
            Envelope::Call(call) => Ok(call),
            other => Err(Error::malformed(format!(
                "expected CALL, got {:?}",
                other.kind()
            ))),
        }
    }
}

impl CallResult {
    pub fn new(message_id: impl Into<String>, payload: ValueTree) -> Self {
        Self {
            message_id: message_id.into(),
            payload,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        json!([
            MessageKind::CallResult.type_id(),
            self.message_id,
            self.payload
        ])
        .to_string()
        .into_bytes()
    }
}

impl CallError {
    pub fn new(
        message_id: impl Into<String>,
        error_code: impl Into<String>,
        error_description: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            error_code: error_code.into(),
            error_description: error_description.into(),
            error_details: json!({}),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        json!([
            MessageKind::CallError.type_id(),
            self.message_id,
            self.error_code,
            self.error_description,
            self.error_details
        ])
        .to_string()
        .into_bytes()
    }
}

impl Envelope {
    /// Decode a raw OCPP-J frame
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::malformed(format!("invalid JSON: {}", e)))?;

        let items = value
            .as_array()
            .ok_or_else(|| Error::malformed("frame is not a JSON array"))?;

        let type_id = items
            .first()
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::malformed("missing message type id"))?;
        let kind = MessageKind::from_type_id(type_id)
            .ok_or_else(|| Error::malformed(format!("unknown message type id {}", type_id)))?;

        let message_id = string_at(items, 1, "messageId")?;

        let expected_len = match kind {
            MessageKind::Call => 4,
            MessageKind::CallResult => 3,
            MessageKind::CallError => 5,
        };
        if items.len() != expected_len {
            return Err(Error::malformed(format!(
                "{:?} frame must have {} elements, got {}",
                kind,
                expected_len,
                items.len()
            )));
        }

        let envelope = match kind {
            MessageKind::Call => Envelope::Call(Call {
                message_id,
                action: string_at(items, 2, "action")?,
                payload: object_at(items, 3, "payload")?,
            }),
            MessageKind::CallResult => Envelope::CallResult(CallResult {
                message_id,
                payload: object_at(items, 2, "payload")?,
            }),
            MessageKind::CallError => Envelope::CallError(CallError {
                message_id,
                error_code: string_at(items, 2, "errorCode")?,
                error_description: string_at(items, 3, "errorDescription")?,
                error_details: items[4].clone(),
            }),
        };

        Ok(envelope)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Envelope::Call(_) => MessageKind::Call,
            Envelope::CallResult(_) => MessageKind::CallResult,
            Envelope::CallError(_) => MessageKind::CallError,
        }
    }

    /// Correlation identifier shared by a call and its reply
    pub fn message_id(&self) -> &str {
        match self {
            Envelope::Call(c) => &c.message_id,
            Envelope::CallResult(r) => &r.message_id,
            Envelope::CallError(e) => &e.message_id,
        }
    }

    pub fn payload(&self) -> &ValueTree {
        match self {
            Envelope::Call(c) => &c.payload,
            Envelope::CallResult(r) => &r.payload,
            Envelope::CallError(e) => &e.error_details,
        }
    }
}

fn string_at(items: &[Value], index: usize, field: &str) -> Result<String> {
    items
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::malformed(format!("{} must be a string", field)))
}

fn object_at(items: &[Value], index: usize, field: &str) -> Result<Value> {
    match items.get(index) {
        Some(value @ Value::Object(_)) => Ok(value.clone()),
        _ => Err(Error::malformed(format!("{} must be a JSON object", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_call() {
        let raw = br#"[2,"19223201","BootNotification",{"reason":"PowerUp"}]"#;
        let envelope = Envelope::decode(raw).unwrap();

        assert_eq!(envelope.kind(), MessageKind::Call);
        assert_eq!(envelope.message_id(), "19223201");
        match envelope {
            Envelope::Call(call) => {
                assert_eq!(call.action, "BootNotification");
                assert_eq!(call.payload["reason"], "PowerUp");
            }
            other => panic!("unexpected envelope {:?}", other),
        }
    }

    #[test]
    fn test_decode_call_result() {
        let raw = br#"[3,"19223201",{"status":"Accepted","interval":300}]"#;
        let envelope = Envelope::decode(raw).unwrap();

        assert_eq!(envelope.kind(), MessageKind::CallResult);
        assert_eq!(envelope.payload()["interval"], 300);
    }

    #[test]
    fn test_decode_call_error() {
        let raw = br#"[4,"abc","NotImplemented","Unknown action",{}]"#;
        match Envelope::decode(raw).unwrap() {
            Envelope::CallError(e) => {
                assert_eq!(e.error_code, "NotImplemented");
                assert_eq!(e.error_description, "Unknown action");
            }
            other => panic!("unexpected envelope {:?}", other),
        }
    }

    #[test]
    fn test_encoded_call_decodes_to_same_call() {
        let call = Call::new("Heartbeat", json!({}));
        assert_eq!(Call::decode(&call.encode()).unwrap(), call);
    }

    #[test]
    fn test_fresh_message_ids() {
        let a = Call::new("Heartbeat", json!({}));
        let b = Call::new("Heartbeat", json!({}));
        assert_ne!(a.message_id, b.message_id);
    }

    #[test]
    fn test_rejects_malformed_frames() {
        let cases: &[&[u8]] = &[
            b"not json",
            br#"{"messageId":"1"}"#,
            br#"[]"#,
            br#"[9,"1",{}]"#,
            br#"[3,1,{}]"#,
            br#"[3,"1"]"#,
            br#"[3,"1","Accepted"]"#,
            br#"[2,"1",{}]"#,
        ];
        for raw in cases {
            let err = Envelope::decode(raw).unwrap_err();
            assert!(
                matches!(err, Error::MalformedMessage(_)),
                "{} decoded as {:?}",
                String::from_utf8_lossy(raw),
                err
            );
        }
    }

    #[test]
    fn test_call_decode_rejects_result() {
        assert!(Call::decode(br#"[3,"1",{}]"#).is_err());
    }
}
