//! Request and reply documents
//!
//! Requests arrive as `{"cmd": string, "arg"?: any, "id"?: string}`.
//! Replies are `{"status": "ok"|"error"|"notify", "id"?: string, "msg"?: any}`.

use alloc::string::{String, ToString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors that can occur while parsing a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Input is not a JSON object
    Malformed,
    /// The object has no string `cmd` field
    MissingCommand,
}

#[derive(Deserialize)]
struct RawRequest {
    cmd: Option<Value>,
    #[serde(default)]
    arg: Value,
    id: Option<Value>,
}

/// A parsed command request
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Registered command name
    pub cmd: String,
    /// Argument, `Value::Null` when absent
    pub arg: Value,
    /// Correlation id echoed in the reply
    pub id: Option<String>,
}

impl Request {
    /// Parse a raw message
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let raw: RawRequest = serde_json::from_slice(raw).map_err(|_| ParseError::Malformed)?;
        let cmd = match raw.cmd {
            Some(Value::String(cmd)) => cmd,
            _ => return Err(ParseError::MissingCommand),
        };
        let id = match raw.id {
            Some(Value::String(id)) => Some(id),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Ok(Self {
            cmd,
            arg: raw.arg,
            id,
        })
    }

    /// Build a request in code (used for remote server commands and tests)
    pub fn new(cmd: &str, arg: Value) -> Self {
        Self {
            cmd: cmd.to_string(),
            arg,
            id: None,
        }
    }

    /// The argument as a string, if it is one
    pub fn arg_str(&self) -> Option<&str> {
        self.arg.as_str()
    }

    /// The argument as a number
    ///
    /// Clients send numbers both bare and quoted, so numeric strings are
    /// accepted too.
    pub fn arg_number(&self) -> Option<f64> {
        number(&self.arg)
    }

    /// A field of an object argument
    pub fn arg_field(&self, key: &str) -> Option<&Value> {
        self.arg.as_object().and_then(|obj| obj.get(key))
    }

    /// A numeric field of an object argument (bare or quoted)
    pub fn arg_field_number(&self, key: &str) -> Option<f64> {
        self.arg_field(key).and_then(number)
    }
}

/// Interpret a JSON value as a number, accepting numeric strings
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Reply status field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
    Notify,
}

/// Reply or notification envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub status: ReplyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<Value>,
}

impl Default for Reply {
    fn default() -> Self {
        Self::ok()
    }
}

impl Reply {
    /// Empty success reply
    pub fn ok() -> Self {
        Self {
            status: ReplyStatus::Ok,
            id: None,
            msg: None,
        }
    }

    /// Error reply carrying a user-visible message
    pub fn error(msg: &str) -> Self {
        Self {
            status: ReplyStatus::Error,
            id: None,
            msg: Some(Value::String(msg.to_string())),
        }
    }

    /// Notification on `channel`
    pub fn notify(channel: &str, msg: Value) -> Self {
        Self {
            status: ReplyStatus::Notify,
            id: Some(channel.to_string()),
            msg: Some(msg),
        }
    }

    /// Attach a payload
    pub fn set_msg(&mut self, msg: impl Into<Value>) {
        self.msg = Some(msg.into());
    }

    /// Turn this reply into an error with `msg`
    pub fn set_error(&mut self, msg: &str) {
        self.status = ReplyStatus::Error;
        self.msg = Some(Value::String(msg.to_string()));
    }

    pub fn is_error(&self) -> bool {
        self.status == ReplyStatus::Error
    }

    /// Serialize to a compact JSON document
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_request() {
        let req = Request::parse(br#"{"cmd":"forward","arg":"100","id":"a1"}"#).unwrap();
        assert_eq!(req.cmd, "forward");
        assert_eq!(req.arg_str(), Some("100"));
        assert_eq!(req.arg_number(), Some(100.0));
        assert_eq!(req.id.as_deref(), Some("a1"));
    }

    #[test]
    fn test_parse_without_arg_or_id() {
        let req = Request::parse(br#"{"cmd":"ping"}"#).unwrap();
        assert_eq!(req.arg, Value::Null);
        assert_eq!(req.id, None);
        assert_eq!(req.arg_number(), None);
    }

    #[test]
    fn test_parse_numeric_arg() {
        let req = Request::parse(br#"{"cmd":"left","arg":90}"#).unwrap();
        assert_eq!(req.arg_number(), Some(90.0));
        assert_eq!(req.arg_str(), None);
    }

    #[test]
    fn test_parse_object_arg() {
        let req =
            Request::parse(br#"{"cmd":"pinServo","arg":{"pin":"5","angle":90}}"#).unwrap();
        assert_eq!(req.arg_field_number("pin"), Some(5.0));
        assert_eq!(req.arg_field_number("angle"), Some(90.0));
        assert_eq!(req.arg_field("missing"), None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Request::parse(b"not json"), Err(ParseError::Malformed));
        assert_eq!(Request::parse(b"42"), Err(ParseError::Malformed));
        assert_eq!(
            Request::parse(br#"{"arg":"1"}"#),
            Err(ParseError::MissingCommand)
        );
        assert_eq!(
            Request::parse(br#"{"cmd":5}"#),
            Err(ParseError::MissingCommand)
        );
    }

    #[test]
    fn test_reply_serialization() {
        let mut reply = Reply::ok();
        assert_eq!(reply.to_json(), r#"{"status":"ok"}"#);

        reply.id = Some("a1".into());
        reply.set_msg("23");
        assert_eq!(reply.to_json(), r#"{"status":"ok","id":"a1","msg":"23"}"#);
    }

    #[test]
    fn test_error_reply() {
        let mut reply = Reply::ok();
        reply.set_error("Invalid argument");
        assert!(reply.is_error());
        assert_eq!(
            reply.to_json(),
            r#"{"status":"error","msg":"Invalid argument"}"#
        );
    }

    #[test]
    fn test_notify_envelope() {
        let reply = Reply::notify("boot", json!("3.0"));
        assert_eq!(
            reply.to_json(),
            r#"{"status":"notify","id":"boot","msg":"3.0"}"#
        );
    }
}
