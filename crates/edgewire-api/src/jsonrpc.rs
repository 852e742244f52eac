// ── JSON-RPC 2.0 message types ──
//
// The four message shapes exchanged with an Edge: request, success
// response, error response, notification. Inbound text is classified
// exactly once, in `JsonrpcMessage::parse`, by field presence. Every
// outbound message carries `"jsonrpc": "2.0"`; the field is tolerated
// and ignored inbound.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;

// ── Version marker ───────────────────────────────────────────────────

/// Zero-sized `"jsonrpc": "2.0"` marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Version;

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Self)
    }
}

fn empty_params() -> Value {
    Value::Object(serde_json::Map::new())
}

// ── Request ──────────────────────────────────────────────────────────

/// A JSON-RPC request. Ids are UUID strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonrpcRequest {
    #[serde(default)]
    pub jsonrpc: Version,
    pub id: String,
    pub method: String,
    #[serde(default = "empty_params")]
    pub params: Value,
}

impl JsonrpcRequest {
    /// Build a request with a fresh random id.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: Version,
            id: Uuid::new_v4().to_string(),
            method: method.into(),
            params,
        }
    }

    /// Serialize a typed params struct into a request.
    pub fn with_params<P: Serialize>(method: impl Into<String>, params: &P) -> Result<Self, Error> {
        Ok(Self::new(method, serde_json::to_value(params)?))
    }

    pub fn to_text(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Notification ─────────────────────────────────────────────────────

/// A JSON-RPC notification: no id, no response expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonrpcNotification {
    #[serde(default)]
    pub jsonrpc: Version,
    pub method: String,
    #[serde(default = "empty_params")]
    pub params: Value,
}

impl JsonrpcNotification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: Version,
            method: method.into(),
            params,
        }
    }
}

// ── Responses ────────────────────────────────────────────────────────

/// Successful response carrying a `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonrpcResponseSuccess {
    #[serde(default)]
    pub jsonrpc: Version,
    pub id: String,
    pub result: Value,
}

impl JsonrpcResponseSuccess {
    pub fn new(id: impl Into<String>, result: Value) -> Self {
        Self {
            jsonrpc: Version,
            id: id.into(),
            result,
        }
    }

    /// Decode the `result` object into a typed value.
    pub fn parse_result<T: serde::de::DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(self.result.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: self.result.to_string(),
        })
    }
}

/// The `error` member of an error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonrpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Error response carrying an `error` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonrpcResponseError {
    #[serde(default)]
    pub jsonrpc: Version,
    pub id: String,
    pub error: JsonrpcError,
}

impl JsonrpcResponseError {
    pub fn new(id: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: Version,
            id: id.into(),
            error: JsonrpcError {
                code,
                message: message.into(),
                data: None,
            },
        }
    }
}

impl From<JsonrpcResponseError> for Error {
    fn from(response: JsonrpcResponseError) -> Self {
        Error::Remote {
            code: response.error.code,
            message: response.error.message,
            data: response.error.data,
        }
    }
}

/// A response, already discriminated into success or error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonrpcResponse {
    Success(JsonrpcResponseSuccess),
    Error(JsonrpcResponseError),
}

impl JsonrpcResponse {
    pub fn id(&self) -> &str {
        match self {
            Self::Success(r) => &r.id,
            Self::Error(r) => &r.id,
        }
    }

    /// Classify a JSON value as a success or error response.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        match JsonrpcMessage::from_value(value)? {
            JsonrpcMessage::Response(response) => Ok(response),
            other => Err(Error::Deserialization {
                message: "expected a JSON-RPC response".into(),
                body: serde_json::to_string(&other).unwrap_or_default(),
            }),
        }
    }

    /// Turn into a `Result`, mapping error responses to [`Error::Remote`].
    pub fn into_result(self) -> Result<JsonrpcResponseSuccess, Error> {
        match self {
            Self::Success(success) => Ok(success),
            Self::Error(error) => Err(error.into()),
        }
    }
}

// ── Message ──────────────────────────────────────────────────────────

/// Any inbound or outbound JSON-RPC message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonrpcMessage {
    Request(JsonrpcRequest),
    Response(JsonrpcResponse),
    Notification(JsonrpcNotification),
}

impl JsonrpcMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.to_owned(),
        })?;
        Self::from_value(value)
    }

    /// Classify by field presence: `method` + `id` is a request, `method`
    /// alone a notification, `id` + `result` a success, `id` + `error`
    /// an error response.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let (has_method, has_id, has_result, has_error) = match value.as_object() {
            Some(obj) => (
                obj.contains_key("method"),
                obj.get("id").is_some_and(|id| !id.is_null()),
                obj.contains_key("result"),
                obj.contains_key("error"),
            ),
            None => {
                return Err(Error::Deserialization {
                    message: "JSON-RPC message is not an object".into(),
                    body: value.to_string(),
                });
            }
        };

        let body = || value.to_string();
        let decode = |e: serde_json::Error, body: String| Error::Deserialization {
            message: e.to_string(),
            body,
        };

        match (has_method, has_id, has_result, has_error) {
            (true, true, _, _) => {
                let b = body();
                serde_json::from_value(value)
                    .map(Self::Request)
                    .map_err(|e| decode(e, b))
            }
            (true, false, _, _) => {
                let b = body();
                serde_json::from_value(value)
                    .map(Self::Notification)
                    .map_err(|e| decode(e, b))
            }
            (false, true, true, _) => {
                let b = body();
                serde_json::from_value(value)
                    .map(|r| Self::Response(JsonrpcResponse::Success(r)))
                    .map_err(|e| decode(e, b))
            }
            (false, true, false, true) => {
                let b = body();
                serde_json::from_value(value)
                    .map(|r| Self::Response(JsonrpcResponse::Error(r)))
                    .map_err(|e| decode(e, b))
            }
            _ => Err(Error::Deserialization {
                message: "not a JSON-RPC request, response or notification".into(),
                body: body(),
            }),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
