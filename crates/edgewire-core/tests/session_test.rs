#![allow(clippy::unwrap_used)]
// End-to-end tests for `Session` + `Edge` against a simulated Edge that
// answers every request on the same event channel the session reads.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use url::Url;

use edgewire_api::{JsonrpcMessage, Transport, TransportEvent};
use edgewire_core::graph::natures;
use edgewire_core::{
    AuthCredentials, ChannelAddress, CoreError, PropertyUpdate, Session, SessionConfig,
};

// ── Simulated Edge ──────────────────────────────────────────────────

struct SimulatedEdge {
    events: mpsc::UnboundedSender<TransportEvent>,
    /// Inner `(method, params)` of every edgeRpc request, in order.
    log: Mutex<Vec<(String, Value)>>,
}

impl SimulatedEdge {
    fn config() -> Value {
        json!({
            "components": {
                "_sum": {"factoryId": "Core.Sum", "properties": {}},
                "meter0": {"alias": "Grid", "factoryId": "Meter.Socomec",
                           "properties": {"type": "GRID", "enabled": true}},
                "meter1": {"factoryId": "Meter.Legacy", "properties": {"type": "PRODUCTION"}},
                "ess0": {"factoryId": "Ess.Generic", "properties": {"enabled": true}}
            },
            "factories": {
                "Core.Sum": {"name": "Sum"},
                "Meter.Socomec": {"natureIds": [natures::ELECTRICITY_METER]},
                "Meter.Legacy": {"natureIds": [natures::SYMMETRIC_METER]},
                "Ess.Generic": {"natureIds": [natures::SYMMETRIC_ESS]}
            }
        })
    }

    fn answer(method: &str, params: &Value) -> Result<Value, (i64, String)> {
        match method {
            "getEdgeConfig" => Ok(Self::config()),
            "subscribeChannels" | "subscribeSystemLog" | "updateComponentConfig" => Ok(json!({})),
            "componentJsonApi" => match params["payload"]["method"].as_str() {
                Some("getChannelsOfComponent") => Ok(json!({"channels": [
                    {"id": "ActivePower", "type": "INTEGER", "accessMode": "RO", "unit": "W"}
                ]})),
                _ => Err((-32601, "unknown component method".into())),
            },
            other => Err((-32601, format!("method not found: {other}"))),
        }
    }

    fn count(&self, method: &str) -> usize {
        self.log.lock().iter().filter(|(m, _)| m == method).count()
    }

    fn last_params(&self, method: &str) -> Value {
        self.log
            .lock()
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .unwrap()
    }

    fn push(&self, value: Value) {
        let message = JsonrpcMessage::from_value(value).unwrap();
        self.events.send(TransportEvent::Message(message)).unwrap();
    }
}

impl Transport for SimulatedEdge {
    fn send(&self, text: String) -> Result<(), edgewire_api::Error> {
        let outer: Value = serde_json::from_str(&text).unwrap();
        let inner = outer["params"]["payload"].clone();
        let method = inner["method"].as_str().unwrap().to_owned();
        self.log.lock().push((method.clone(), inner["params"].clone()));

        let payload = match Self::answer(&method, &inner["params"]) {
            Ok(result) => json!({"jsonrpc": "2.0", "id": inner["id"], "result": result}),
            Err((code, message)) => json!({
                "jsonrpc": "2.0", "id": inner["id"], "error": {"code": code, "message": message}
            }),
        };
        self.push(json!({"jsonrpc": "2.0", "id": outer["id"], "result": {"payload": payload}}));
        Ok(())
    }
}

async fn connected_session() -> (Arc<SimulatedEdge>, Session) {
    let (events, rx) = mpsc::unbounded_channel();
    let edge = Arc::new(SimulatedEdge {
        events: events.clone(),
        log: Mutex::new(Vec::new()),
    });
    let mut config = SessionConfig::new(Url::parse("ws://127.0.0.1:8085/websocket").unwrap());
    config.auth = AuthCredentials::None;

    let session = Session::with_transport(config, Arc::clone(&edge) as Arc<dyn Transport>, rx);
    events.send(TransportEvent::Connected).unwrap();
    session.wait_connected(Duration::from_secs(1)).await.unwrap();
    (edge, session)
}

fn addr(s: &str) -> ChannelAddress {
    s.parse().unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn config_is_fetched_once_and_queried() {
    let (sim, session) = connected_session().await;
    let edge = session.edge("0");

    let config = edge.first_valid_config().await;
    for _ in 0..5 {
        assert!(edge.config().is_valid());
    }
    assert_eq!(sim.count("getEdgeConfig"), 1);

    assert_eq!(
        config.component_ids_implementing_nature(natures::ELECTRICITY_METER),
        vec!["meter0", "meter1"]
    );
    assert!(config.has_storage());
    assert!(config.is_type_grid(config.component("meter0").unwrap()));
    assert_eq!(config.component("meter0").unwrap().display_name(), "Grid");
}

#[tokio::test(start_paused = true)]
async fn widgets_share_one_subscription() {
    let (sim, session) = connected_session().await;
    let edge = session.edge("0");

    edge.subscribe_channels("grid", vec![addr("_sum/GridActivePower"), addr("_sum/EssSoc")]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    edge.subscribe_channels("soc", vec![addr("_sum/EssSoc"), addr("ess0/Soc")]);
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(sim.count("subscribeChannels"), 1);
    assert_eq!(
        sim.last_params("subscribeChannels"),
        json!({"channels": ["_sum/GridActivePower", "_sum/EssSoc", "ess0/Soc"]})
    );
    assert!(edge.subscriptions().is_last_successful());

    edge.unsubscribe("grid");
    tokio::time::sleep(Duration::from_millis(110)).await;
    assert_eq!(
        sim.last_params("subscribeChannels"),
        json!({"channels": ["_sum/EssSoc", "ess0/Soc"]})
    );
}

#[tokio::test(start_paused = true)]
async fn pushed_current_data_reaches_late_listeners() {
    let (sim, session) = connected_session().await;
    let edge = session.edge("0");

    sim.push(json!({
        "jsonrpc": "2.0",
        "method": "edgeRpc",
        "params": {"edgeId": "0", "payload": {
            "jsonrpc": "2.0", "method": "currentData",
            "params": {"_sum/EssSoc": 63, "_sum/GridActivePower": -250}
        }}
    }));

    let mut stream = edge.current_data();
    let data = tokio::time::timeout(Duration::from_secs(1), stream.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data.get(&addr("_sum/EssSoc")), Some(&json!(63)));

    // A second listener attached afterwards sees the same snapshot.
    let late = edge.current_data();
    assert_eq!(late.current().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn component_updates_and_remote_errors() {
    let (sim, session) = connected_session().await;
    let edge = session.edge("0");

    edge.update_component_config("ess0", vec![PropertyUpdate::new("enabled", false)])
        .await
        .unwrap();
    assert_eq!(
        sim.last_params("updateComponentConfig"),
        json!({"componentId": "ess0", "properties": [{"name": "enabled", "value": false}]})
    );

    let err = edge.delete_component_config("ess0").await.unwrap_err();
    assert!(matches!(err, CoreError::Remote { code: -32601, .. }));
}

#[tokio::test(start_paused = true)]
async fn channels_fall_back_to_component_manager() {
    let (sim, session) = connected_session().await;
    let edge = session.edge("0");

    let channels = edge.channels("meter0").await.unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].id, "ActivePower");
    assert_eq!(channels[0].channel.unit, "W");

    let params = sim.last_params("componentJsonApi");
    assert_eq!(params["componentId"], "_componentManager");
    assert_eq!(params["payload"]["params"], json!({"componentId": "meter0"}));

    let missing = edge.channels("nope").await.unwrap_err();
    assert!(matches!(missing, CoreError::ComponentNotFound { .. }));
}
