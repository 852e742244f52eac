// ── Edge request payloads ──
//
// Typed params and results of the requests sent to an Edge (inside the
// `edgeRpc` envelope) or to the endpoint itself (authentication).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use edgewire_api::{Error, JsonrpcRequest};

use crate::model::{ChannelAddress, ComponentChannel, EdgeMetadata, Factory, FactoryProperty};

/// Pseudo component id that answers component-manager queries.
pub const COMPONENT_MANAGER: &str = "_componentManager";

// ── Method names ─────────────────────────────────────────────────────

pub mod method {
    pub const AUTHENTICATE_WITH_PASSWORD: &str = "authenticateWithPassword";
    pub const GET_EDGE_CONFIG: &str = "getEdgeConfig";
    pub const SUBSCRIBE_CHANNELS: &str = "subscribeChannels";
    pub const SUBSCRIBE_SYSTEM_LOG: &str = "subscribeSystemLog";
    pub const CREATE_COMPONENT_CONFIG: &str = "createComponentConfig";
    pub const UPDATE_COMPONENT_CONFIG: &str = "updateComponentConfig";
    pub const DELETE_COMPONENT_CONFIG: &str = "deleteComponentConfig";
    pub const SET_CHANNEL_VALUE: &str = "setChannelValue";
    pub const COMPONENT_JSON_API: &str = "componentJsonApi";
    pub const GET_CHANNEL: &str = "getChannel";
    pub const GET_CHANNELS_OF_COMPONENT: &str = "getChannelsOfComponent";
    pub const GET_PROPERTIES_OF_FACTORY: &str = "getPropertiesOfFactory";

    pub const CURRENT_DATA: &str = "currentData";
    pub const EDGE_CONFIG: &str = "edgeConfig";
    pub const SYSTEM_LOG: &str = "systemLog";
}

// ── Params ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeChannelsParams {
    pub channels: Vec<ChannelAddress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeSystemLogParams {
    pub subscribe: bool,
}

/// One `{name, value}` entry of a component configuration update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyUpdate {
    pub name: String,
    pub value: Value,
}

impl PropertyUpdate {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComponentConfigParams {
    pub factory_pid: String,
    pub properties: Vec<PropertyUpdate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateComponentConfigParams {
    pub component_id: String,
    pub properties: Vec<PropertyUpdate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteComponentConfigParams {
    pub component_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetChannelValueParams {
    pub component_id: String,
    pub channel_id: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentJsonApiParams {
    pub component_id: String,
    pub payload: JsonrpcRequest,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetChannelParams {
    pub component_id: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetChannelsOfComponentParams {
    pub component_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPropertiesOfFactoryParams {
    pub factory_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthenticateWithPasswordParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password: String,
}

// ── Builders ─────────────────────────────────────────────────────────

pub fn get_edge_config() -> JsonrpcRequest {
    JsonrpcRequest::new(method::GET_EDGE_CONFIG, Value::Object(serde_json::Map::new()))
}

pub fn subscribe_channels(channels: Vec<ChannelAddress>) -> Result<JsonrpcRequest, Error> {
    JsonrpcRequest::with_params(method::SUBSCRIBE_CHANNELS, &SubscribeChannelsParams { channels })
}

pub fn subscribe_system_log(subscribe: bool) -> Result<JsonrpcRequest, Error> {
    JsonrpcRequest::with_params(
        method::SUBSCRIBE_SYSTEM_LOG,
        &SubscribeSystemLogParams { subscribe },
    )
}

pub fn create_component_config(
    factory_pid: impl Into<String>,
    properties: Vec<PropertyUpdate>,
) -> Result<JsonrpcRequest, Error> {
    JsonrpcRequest::with_params(
        method::CREATE_COMPONENT_CONFIG,
        &CreateComponentConfigParams {
            factory_pid: factory_pid.into(),
            properties,
        },
    )
}

pub fn update_component_config(
    component_id: impl Into<String>,
    properties: Vec<PropertyUpdate>,
) -> Result<JsonrpcRequest, Error> {
    JsonrpcRequest::with_params(
        method::UPDATE_COMPONENT_CONFIG,
        &UpdateComponentConfigParams {
            component_id: component_id.into(),
            properties,
        },
    )
}

pub fn delete_component_config(component_id: impl Into<String>) -> Result<JsonrpcRequest, Error> {
    JsonrpcRequest::with_params(
        method::DELETE_COMPONENT_CONFIG,
        &DeleteComponentConfigParams {
            component_id: component_id.into(),
        },
    )
}

pub fn set_channel_value(address: &ChannelAddress, value: Value) -> Result<JsonrpcRequest, Error> {
    JsonrpcRequest::with_params(
        method::SET_CHANNEL_VALUE,
        &SetChannelValueParams {
            component_id: address.component_id().to_owned(),
            channel_id: address.channel_id().to_owned(),
            value,
        },
    )
}

/// Route `payload` to the JSON API of `component_id`.
pub fn component_json_api(
    component_id: impl Into<String>,
    payload: JsonrpcRequest,
) -> Result<JsonrpcRequest, Error> {
    JsonrpcRequest::with_params(
        method::COMPONENT_JSON_API,
        &ComponentJsonApiParams {
            component_id: component_id.into(),
            payload,
        },
    )
}

pub fn get_channel(address: &ChannelAddress) -> Result<JsonrpcRequest, Error> {
    component_json_api(
        COMPONENT_MANAGER,
        JsonrpcRequest::with_params(
            method::GET_CHANNEL,
            &GetChannelParams {
                component_id: address.component_id().to_owned(),
                channel_id: address.channel_id().to_owned(),
            },
        )?,
    )
}

pub fn get_channels_of_component(component_id: &str) -> Result<JsonrpcRequest, Error> {
    component_json_api(
        COMPONENT_MANAGER,
        JsonrpcRequest::with_params(
            method::GET_CHANNELS_OF_COMPONENT,
            &GetChannelsOfComponentParams {
                component_id: component_id.to_owned(),
            },
        )?,
    )
}

pub fn get_properties_of_factory(factory_id: &str) -> Result<JsonrpcRequest, Error> {
    component_json_api(
        COMPONENT_MANAGER,
        JsonrpcRequest::with_params(
            method::GET_PROPERTIES_OF_FACTORY,
            &GetPropertiesOfFactoryParams {
                factory_id: factory_id.to_owned(),
            },
        )?,
    )
}

pub fn authenticate_with_password(
    username: Option<String>,
    password: String,
) -> Result<JsonrpcRequest, Error> {
    JsonrpcRequest::with_params(
        method::AUTHENTICATE_WITH_PASSWORD,
        &AuthenticateWithPasswordParams { username, password },
    )
}

// ── Results ──────────────────────────────────────────────────────────

/// A channel's metadata together with its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    #[serde(flatten)]
    pub channel: ComponentChannel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetChannelResult {
    pub channel: ChannelInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetChannelsOfComponentResult {
    pub channels: Vec<ChannelInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetPropertiesOfFactoryResult {
    pub factory: Factory,
    #[serde(default)]
    pub properties: Vec<FactoryProperty>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemLogParams {
    pub line: crate::model::SystemLog,
}

/// Authentication reply. Backends list the edges the user may access;
/// a direct Edge connection typically omits them.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticateResult {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(default)]
    pub edges: Vec<EdgeMetadata>,
}
