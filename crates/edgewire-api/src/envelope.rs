// ── edgeRpc envelope codec ──
//
// Requests for a specific Edge travel wrapped in an `edgeRpc` request
// whose params carry the target edge id and the inner request. The
// matching response carries the inner response under `result.payload`.
// Edge-scoped notifications arrive the same way.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::jsonrpc::{
    JsonrpcMessage, JsonrpcNotification, JsonrpcRequest, JsonrpcResponse, JsonrpcResponseSuccess,
};

/// Method name of the routing envelope.
pub const EDGE_RPC: &str = "edgeRpc";

/// `params` of an `edgeRpc` request or notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRpcParams {
    #[serde(rename = "edgeId")]
    pub target_id: String,
    pub payload: Value,
}

/// Wrap `payload` for delivery to `target_id`.
///
/// The inner request is cloned into the envelope; the caller's value is
/// left untouched and keeps its own id.
pub fn wrap(target_id: &str, payload: &JsonrpcRequest) -> Result<JsonrpcRequest, Error> {
    let params = EdgeRpcParams {
        target_id: target_id.to_owned(),
        payload: serde_json::to_value(payload)?,
    };
    JsonrpcRequest::with_params(EDGE_RPC, &params)
}

/// Extract the inner response from an `edgeRpc` success.
pub fn unwrap(response: &JsonrpcResponseSuccess) -> Result<JsonrpcResponse, Error> {
    let payload = response
        .result
        .get("payload")
        .ok_or_else(|| Error::MalformedEnvelope(format!("response {} has no payload", response.id)))?;

    match JsonrpcMessage::from_value(payload.clone()) {
        Ok(JsonrpcMessage::Response(inner)) => Ok(inner),
        Ok(_) => Err(Error::MalformedEnvelope(format!(
            "payload of response {} is not a response",
            response.id
        ))),
        Err(e) => Err(Error::MalformedEnvelope(e.to_string())),
    }
}

/// Extract `(edge id, inner notification)` from an `edgeRpc` notification.
pub fn unwrap_notification(
    notification: &JsonrpcNotification,
) -> Result<(String, JsonrpcNotification), Error> {
    if notification.method != EDGE_RPC {
        return Err(Error::MalformedEnvelope(format!(
            "expected {EDGE_RPC}, got {}",
            notification.method
        )));
    }

    let params: EdgeRpcParams = serde_json::from_value(notification.params.clone())
        .map_err(|e| Error::MalformedEnvelope(e.to_string()))?;

    match JsonrpcMessage::from_value(params.payload) {
        Ok(JsonrpcMessage::Notification(inner)) => Ok((params.target_id, inner)),
        Ok(_) => Err(Error::MalformedEnvelope(
            "payload of notification is not a notification".into(),
        )),
        Err(e) => Err(Error::MalformedEnvelope(e.to_string())),
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn wrap_embeds_inner_request_without_touching_it() {
        let inner = JsonrpcRequest::new("getEdgeConfig", json!({}));
        let before = inner.clone();

        let outer = wrap("edge0", &inner).unwrap();

        assert_eq!(inner, before);
        assert_eq!(outer.method, EDGE_RPC);
        assert_ne!(outer.id, inner.id);
        assert_eq!(outer.params["edgeId"], json!("edge0"));
        assert_eq!(outer.params["payload"]["id"], json!(inner.id));
        assert_eq!(outer.params["payload"]["method"], json!("getEdgeConfig"));
    }

    #[test]
    fn unwrap_success_payload() {
        let outer = JsonrpcResponseSuccess::new(
            "outer",
            json!({"payload": {"jsonrpc": "2.0", "id": "inner", "result": {"x": 1}}}),
        );
        match unwrap(&outer).unwrap() {
            JsonrpcResponse::Success(r) => {
                assert_eq!(r.id, "inner");
                assert_eq!(r.result, json!({"x": 1}));
            }
            JsonrpcResponse::Error(e) => panic!("unexpected {e:?}"),
        }
    }

    #[test]
    fn unwrap_error_payload() {
        let outer = JsonrpcResponseSuccess::new(
            "outer",
            json!({"payload": {"id": "inner", "error": {"code": 1, "message": "denied"}}}),
        );
        assert!(matches!(unwrap(&outer).unwrap(), JsonrpcResponse::Error(_)));
    }

    #[test]
    fn unwrap_without_payload_is_malformed() {
        let outer = JsonrpcResponseSuccess::new("outer", json!({}));
        assert!(matches!(unwrap(&outer), Err(Error::MalformedEnvelope(_))));

        let outer = JsonrpcResponseSuccess::new("outer", json!({"payload": {"method": "x"}}));
        assert!(matches!(unwrap(&outer), Err(Error::MalformedEnvelope(_))));
    }

    #[test]
    fn unwrap_edge_notification() {
        let outer = JsonrpcNotification::new(
            EDGE_RPC,
            json!({"edgeId": "edge0", "payload": {"method": "currentData", "params": {"_sum/EssSoc": 50}}}),
        );
        let (edge_id, inner) = unwrap_notification(&outer).unwrap();
        assert_eq!(edge_id, "edge0");
        assert_eq!(inner.method, "currentData");
        assert_eq!(inner.params, json!({"_sum/EssSoc": 50}));
    }

    #[test]
    fn unwrap_notification_rejects_other_methods() {
        let n = JsonrpcNotification::new("currentData", json!({}));
        assert!(matches!(unwrap_notification(&n), Err(Error::MalformedEnvelope(_))));
    }
}
