//! Alexa Message Types
//!
//! Wire model for smart-home directives, responses and event envelopes
//! (payload version 3).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload version of every message this crate sends or accepts.
pub const PAYLOAD_VERSION: &str = "3";

pub const NAMESPACE_ALEXA: &str = "Alexa";
pub const NAMESPACE_DISCOVERY: &str = "Alexa.Discovery";
pub const NAMESPACE_POWER_CONTROLLER: &str = "Alexa.PowerController";
pub const NAMESPACE_AUTHORIZATION: &str = "Alexa.Authorization";
pub const NAMESPACE_ENDPOINT_HEALTH: &str = "Alexa.EndpointHealth";

/// Message header.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub namespace: String,
    pub name: String,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_token: Option<String>,
    pub payload_version: String,
}

impl Header {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            message_id: message_id.into(),
            correlation_token: None,
            payload_version: PAYLOAD_VERSION.to_string(),
        }
    }

    /// Header of a reply: same correlation token, message id suffixed with `-R`.
    pub fn reply(&self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            message_id: format!("{}-R", self.message_id),
            correlation_token: self.correlation_token.clone(),
            payload_version: self.payload_version.clone(),
        }
    }
}

/// Authorization scope attached to an endpoint or payload.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    #[serde(rename = "type")]
    pub scope_type: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Scope {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            scope_type: "BearerToken".to_string(),
            token: token.into(),
            partition: None,
            user_id: None,
        }
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("scope_type", &self.scope_type)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Endpoint addressed by a directive or event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    pub endpoint_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<Value>,
}

/// Reported property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub name: String,
    pub value: Value,
    pub time_of_sample: String,
    pub uncertainty_in_milliseconds: u64,
}

impl Property {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        value: Value,
        sampled_at: DateTime<Utc>,
        uncertainty_in_milliseconds: u64,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            instance: None,
            name: name.into(),
            value,
            time_of_sample: sampled_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            uncertainty_in_milliseconds,
        }
    }

    /// `Alexa.PowerController.powerState` sample.
    pub fn power_state(value: impl Into<String>, sampled_at: DateTime<Utc>) -> Self {
        Self::new(
            NAMESPACE_POWER_CONTROLLER,
            "powerState",
            Value::String(value.into()),
            sampled_at,
            50,
        )
    }

    /// `Alexa.EndpointHealth.connectivity` sample reporting OK.
    pub fn connectivity_ok(sampled_at: DateTime<Utc>) -> Self {
        Self::new(
            NAMESPACE_ENDPOINT_HEALTH,
            "connectivity",
            serde_json::json!({"value": "OK"}),
            sampled_at,
            0,
        )
    }
}

/// Context block carrying property samples.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub properties: Vec<Property>,
}

/// Inbound directive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    #[serde(default)]
    pub payload: Value,
}

/// Inbound request envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlexaRequest {
    pub directive: Directive,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
}

/// Outbound event body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    pub payload: Value,
}

/// Outbound envelope: directive responses and proactive events share this shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlexaResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    pub event: Event,
}

/// Error types carried by an `ErrorResponse` payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlexaErrorType {
    AcceptGrantFailed,
    BridgeUnreachable,
    EndpointBusy,
    EndpointUnreachable,
    ExpiredAuthorizationCredential,
    InternalError,
    InvalidAuthorizationCredential,
    InvalidDirective,
    InvalidValue,
    NoSuchEndpoint,
    NotSupportedInCurrentMode,
    RateLimitExceeded,
}

/// Payload of an `ErrorResponse`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(rename = "type")]
    pub error_type: AlexaErrorType,
    pub message: String,
}

/// Payload of an `Alexa.Authorization.AcceptGrant` directive.
#[derive(Clone, Debug, Deserialize)]
pub struct AcceptGrantPayload {
    pub grant: Grant,
    pub grantee: Scope,
}

/// Authorization grant handed over by Alexa.
#[derive(Clone, Deserialize)]
pub struct Grant {
    #[serde(rename = "type")]
    pub grant_type: String,
    pub code: String,
}

impl std::fmt::Debug for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grant")
            .field("grant_type", &self.grant_type)
            .field("code", &"[REDACTED]")
            .finish()
    }
}

/// Cause of a reported change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CauseType {
    AppInteraction,
    PeriodicPoll,
    #[default]
    PhysicalInteraction,
    VoiceInteraction,
}

/// Power state of a switchable endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint description used by discovery and `AddOrUpdateReport`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescription {
    pub endpoint_id: String,
    pub manufacturer_name: String,
    pub friendly_name: String,
    pub description: String,
    pub display_categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_attributes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<Value>,
    pub capabilities: Vec<Capability>,
}

/// Interface an endpoint supports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    #[serde(rename = "type")]
    pub capability_type: String,
    pub interface: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<CapabilityProperties>,
}

impl Capability {
    /// `AlexaInterface` capability with retrievable properties.
    pub fn interface(
        interface: impl Into<String>,
        version: impl Into<String>,
        supported: &[&str],
        proactively_reported: bool,
    ) -> Self {
        Self {
            capability_type: "AlexaInterface".to_string(),
            interface: interface.into(),
            version: version.into(),
            properties: Some(CapabilityProperties {
                supported: supported
                    .iter()
                    .map(|name| SupportedProperty {
                        name: name.to_string(),
                    })
                    .collect(),
                proactively_reported: proactively_reported.then_some(true),
                retrievable: Some(true),
            }),
        }
    }

    /// Base `Alexa` interface every endpoint declares.
    pub fn alexa() -> Self {
        Self {
            capability_type: "AlexaInterface".to_string(),
            interface: NAMESPACE_ALEXA.to_string(),
            version: PAYLOAD_VERSION.to_string(),
            properties: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityProperties {
    pub supported: Vec<SupportedProperty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proactively_reported: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrievable: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupportedProperty {
    pub name: String,
}

impl EndpointDescription {
    /// Switchable light bulb reporting power state and connectivity.
    pub fn light(endpoint_id: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            manufacturer_name: "Smart Device Company".to_string(),
            friendly_name: friendly_name.into(),
            description: "Virtual smart light bulb".to_string(),
            display_categories: vec!["LIGHT".to_string()],
            additional_attributes: None,
            cookie: None,
            capabilities: vec![
                Capability::interface(NAMESPACE_POWER_CONTROLLER, "3", &["powerState"], true),
                Capability::interface(NAMESPACE_ENDPOINT_HEALTH, "3.2", &["connectivity"], false),
                Capability::alexa(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_power_directive() {
        let request: AlexaRequest = serde_json::from_value(json!({
            "directive": {
                "header": {
                    "namespace": "Alexa.PowerController",
                    "name": "TurnOn",
                    "messageId": "msg-1",
                    "correlationToken": "corr",
                    "payloadVersion": "3"
                },
                "endpoint": {
                    "scope": {"type": "BearerToken", "token": "tok"},
                    "endpointId": "lamp-1",
                    "cookie": {}
                },
                "payload": {}
            }
        }))
        .unwrap();

        let header = &request.directive.header;
        assert_eq!(header.correlation_token.as_deref(), Some("corr"));
        let endpoint = request.directive.endpoint.unwrap();
        assert_eq!(endpoint.endpoint_id, "lamp-1");
        assert_eq!(endpoint.scope.unwrap().token, "tok");
    }

    #[test]
    fn test_reply_header() {
        let header = Header {
            correlation_token: Some("corr".to_string()),
            ..Header::new(NAMESPACE_POWER_CONTROLLER, "TurnOn", "msg-1")
        };
        let reply = header.reply(NAMESPACE_ALEXA, "Response");

        assert_eq!(reply.message_id, "msg-1-R");
        assert_eq!(reply.name, "Response");
        assert_eq!(reply.correlation_token.as_deref(), Some("corr"));
    }

    #[test]
    fn test_property_serialization() {
        let sampled_at = Utc.with_ymd_and_hms(2024, 3, 9, 22, 43, 17).unwrap();
        let value = serde_json::to_value(Property::power_state("ON", sampled_at)).unwrap();

        assert_eq!(
            value,
            json!({
                "namespace": "Alexa.PowerController",
                "name": "powerState",
                "value": "ON",
                "timeOfSample": "2024-03-09T22:43:17.000Z",
                "uncertaintyInMilliseconds": 50
            })
        );
    }

    #[test]
    fn test_error_and_cause_types_wire_names() {
        assert_eq!(
            serde_json::to_value(AlexaErrorType::NoSuchEndpoint).unwrap(),
            json!("NO_SUCH_ENDPOINT")
        );
        assert_eq!(
            serde_json::to_value(AlexaErrorType::AcceptGrantFailed).unwrap(),
            json!("ACCEPT_GRANT_FAILED")
        );
        assert_eq!(CauseType::default(), CauseType::PhysicalInteraction);
        assert_eq!(
            serde_json::to_value(CauseType::VoiceInteraction).unwrap(),
            json!("VOICE_INTERACTION")
        );
    }

    #[test]
    fn test_light_description() {
        let value = serde_json::to_value(EndpointDescription::light("lamp-1", "Lamp")).unwrap();

        assert_eq!(value["endpointId"], json!("lamp-1"));
        assert_eq!(value["displayCategories"], json!(["LIGHT"]));
        let power = &value["capabilities"][0];
        assert_eq!(power["interface"], json!("Alexa.PowerController"));
        assert_eq!(power["properties"]["proactivelyReported"], json!(true));
        assert_eq!(
            value["capabilities"][2],
            json!({"type": "AlexaInterface", "interface": "Alexa", "version": "3"})
        );
    }

    #[test]
    fn test_scope_debug_redacts_token() {
        assert!(!format!("{:?}", Scope::bearer("secret-token")).contains("secret-token"));
    }
}
