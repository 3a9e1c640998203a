//! Wire protocol
//!
//! The device-control service speaks JSON-RPC 2.0 over a websocket. Every
//! socket message is one JSON object: either a reply to a request we issued
//! (`{id, result}` or `{id, error}`), or a push frame carrying stream data
//! for one of the open sessions.

use num_enum::{FromPrimitive, IntoPrimitive};
use serde::Serialize;
use serde_json::{Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";

pub type RequestId = u64;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("message is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("message is not a JSON object")]
    NotAnObject,
    #[error("reply id is not an unsigned integer: {0}")]
    InvalidId(Value),
}

/// Outgoing request. Params are always sent, as an empty object if there
/// are none, since the service rejects requests without them.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    pub method: String,
    pub params: Value,
}

impl Request {
    pub fn new(id: RequestId, method: &str, params: Value) -> Request {
        Request {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.to_string(),
            params: if params.is_null() {
                Value::Object(Map::new())
            } else {
                params
            },
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
#[derive(FromPrimitive, IntoPrimitive)]
pub enum RpcErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
    NoHeadsetConnected = -32001,
    InvalidLicense = -32002,
    HeadsetUnavailable = -32004,
    SessionAlreadyExists = -32005,
    SessionNotActivated = -32012,
    InvalidToken = -32014,
    TokenExpired = -32015,
    InvalidStream = -32016,
    InvalidClientCredentials = -32021,
    NotApproved = -32102,
    #[num_enum(catch_all)]
    Unknown(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcErrorPayload {
    pub code: RpcErrorCode,
    pub message: String,
}

impl RpcErrorPayload {
    pub fn from_value(v: &Value) -> RpcErrorPayload {
        let code = v
            .get("code")
            .and_then(Value::as_i64)
            .and_then(|c| i32::try_from(c).ok())
            .unwrap_or(0);
        let message = match v.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        RpcErrorPayload {
            code: RpcErrorCode::from(code),
            message,
        }
    }
}

impl std::fmt::Display for RpcErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code: i32 = self.code.into();
        write!(f, "{} ({:?}, code {})", self.message, self.code, code)
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub id: RequestId,
    pub outcome: Result<Value, RpcErrorPayload>,
}

/// Service warnings, pushed outside of any session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
#[derive(FromPrimitive, IntoPrimitive)]
pub enum WarningCode {
    StreamStopped = 0,
    SessionAutoClosed = 1,
    UserLogin = 2,
    UserLogout = 3,
    AccessRightGranted = 9,
    AccessRightRejected = 10,
    HeadsetConnectTimeout = 100,
    HeadsetDisconnectedTimeout = 101,
    HeadsetConnected = 102,
    HeadsetScanFinished = 142,
    #[num_enum(catch_all)]
    Unknown(i32),
}

/// Data streams a session can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Command,
    Motion,
    Metrics,
    System,
}

impl StreamKind {
    pub const ALL: [StreamKind; 4] = [
        StreamKind::Command,
        StreamKind::Motion,
        StreamKind::Metrics,
        StreamKind::System,
    ];

    /// Key of the stream both in `subscribe` params and in push frames.
    pub fn key(&self) -> &'static str {
        match self {
            StreamKind::Command => "com",
            StreamKind::Motion => "mot",
            StreamKind::Metrics => "met",
            StreamKind::System => "sys",
        }
    }

    pub fn from_key(key: &str) -> Option<StreamKind> {
        match key {
            "com" => Some(StreamKind::Command),
            "mot" => Some(StreamKind::Motion),
            "met" => Some(StreamKind::Metrics),
            "sys" => Some(StreamKind::System),
            _ => None,
        }
    }
}

impl std::str::FromStr for StreamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamKind::from_key(s).ok_or_else(|| format!("unknown stream '{}'", s))
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Response(Response),
    Push(Map<String, Value>),
}

impl Message {
    /// A message is a response if it carries an `id` together with either a
    /// `result` or an `error`. Everything else is a push frame.
    pub fn parse(text: &str) -> Result<Message, Error> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut obj) = value else {
            return Err(Error::NotAnObject);
        };
        let is_response =
            obj.contains_key("id") && (obj.contains_key("result") || obj.contains_key("error"));
        if !is_response {
            return Ok(Message::Push(obj));
        }
        let id = match obj.get("id") {
            Some(Value::Number(n)) => n.as_u64(),
            _ => None,
        };
        let Some(id) = id else {
            return Err(Error::InvalidId(obj.remove("id").unwrap_or(Value::Null)));
        };
        let outcome = match obj.remove("error") {
            Some(err) if !err.is_null() => Err(RpcErrorPayload::from_value(&err)),
            _ => Ok(obj.remove("result").unwrap_or(Value::Null)),
        };
        Ok(Message::Response(Response { id, outcome }))
    }
}
