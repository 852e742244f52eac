#![allow(clippy::unwrap_used)]
// Integration tests for `WebSocketHandle` + `Correlator` against a local
// WebSocket server that answers edgeRpc requests.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use edgewire_api::{
    Correlator, Error, JsonrpcMessage, JsonrpcRequest, ReconnectConfig, TransportConfig,
    TransportEvent, WebSocketHandle, envelope,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Accept one client, answer every request with its own method name
/// wrapped in an edgeRpc payload, then push one notification.
async fn spawn_edge_server() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let notification = json!({
            "jsonrpc": "2.0",
            "method": "edgeRpc",
            "params": {
                "edgeId": "edge0",
                "payload": {"jsonrpc": "2.0", "method": "currentData", "params": {"_sum/EssSoc": 42}}
            }
        });
        ws.send(Message::text(notification.to_string())).await.unwrap();

        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let request: Value = serde_json::from_str(text.as_str()).unwrap();
            let inner = &request["params"]["payload"];
            let reply = json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "result": {
                    "payload": {
                        "jsonrpc": "2.0",
                        "id": inner["id"],
                        "result": {"echo": inner["method"]}
                    }
                }
            });
            ws.send(Message::text(reply.to_string())).await.unwrap();
        }
    });

    Url::parse(&format!("ws://{addr}/")).unwrap()
}

async fn next_event(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<TransportEvent>,
) -> TransportEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("transport event within 5s")
        .expect("transport still running")
}

// ── Round trip ──────────────────────────────────────────────────────

#[tokio::test]
async fn request_round_trip_through_envelope() {
    let url = spawn_edge_server().await;
    let cancel = CancellationToken::new();
    let (handle, mut events) = WebSocketHandle::connect(
        url,
        &TransportConfig::default(),
        ReconnectConfig::default(),
        cancel.clone(),
    )
    .unwrap();

    assert!(matches!(next_event(&mut events).await, TransportEvent::Connected));
    assert!(handle.is_connected());

    // The server pushes a notification first.
    match next_event(&mut events).await {
        TransportEvent::Message(JsonrpcMessage::Notification(n)) => {
            let (edge_id, inner) = envelope::unwrap_notification(&n).unwrap();
            assert_eq!(edge_id, "edge0");
            assert_eq!(inner.method, "currentData");
        }
        other => panic!("unexpected {other:?}"),
    }

    let correlator = Correlator::new(Some(Duration::from_secs(5)));
    let inner = JsonrpcRequest::new("getEdgeConfig", json!({}));
    let outer = envelope::wrap("edge0", &inner).unwrap();
    let mut call = tokio_test::task::spawn(correlator.send(outer, &handle));
    tokio_test::assert_pending!(call.poll());

    match next_event(&mut events).await {
        TransportEvent::Message(JsonrpcMessage::Response(response)) => {
            correlator.on_response_received(response).unwrap();
        }
        other => panic!("unexpected {other:?}"),
    }

    let success = call.await.unwrap();
    let inner_response = envelope::unwrap(&success).unwrap().into_result().unwrap();
    assert_eq!(inner_response.id, inner.id);
    assert_eq!(inner_response.result, json!({"echo": "getEdgeConfig"}));

    handle.shutdown();
}

#[tokio::test]
async fn shutdown_reports_disconnect_and_refuses_sends() {
    let url = spawn_edge_server().await;
    let cancel = CancellationToken::new();
    let (handle, mut events) = WebSocketHandle::connect(
        url,
        &TransportConfig::default(),
        ReconnectConfig::default(),
        cancel.clone(),
    )
    .unwrap();

    assert!(matches!(next_event(&mut events).await, TransportEvent::Connected));

    cancel.cancel();
    loop {
        match next_event(&mut events).await {
            TransportEvent::Disconnected => break,
            TransportEvent::Message(_) => {}
            TransportEvent::Connected => panic!("should not reconnect after shutdown"),
        }
    }

    let correlator = Correlator::default();
    let result = correlator
        .send(JsonrpcRequest::new("getEdgeConfig", json!({})), &handle)
        .await;
    assert!(matches!(result, Err(Error::Transport(_))));
    assert_eq!(correlator.pending_count(), 0);
}
