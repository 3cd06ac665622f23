//! Event Messages
//!
//! Proactive events sent to the Alexa event gateway.

use serde_json::{json, Value};

use super::directive::{
    AlexaResponse, CauseType, Context, EndpointDescription, Endpoint, Event, Header, Property,
    Scope, NAMESPACE_ALEXA, NAMESPACE_DISCOVERY,
};

/// Event sent to the gateway; same envelope as a directive response.
pub type EventMessage = AlexaResponse;

/// `Alexa.Discovery.AddOrUpdateReport` announcing new or changed endpoints.
pub fn add_or_update_report(
    message_id: &str,
    access_token: &str,
    endpoints: &[EndpointDescription],
) -> EventMessage {
    EventMessage {
        context: None,
        event: Event {
            header: Header::new(NAMESPACE_DISCOVERY, "AddOrUpdateReport", message_id),
            endpoint: None,
            payload: json!({
                "endpoints": endpoints,
                "scope": Scope::bearer(access_token),
            }),
        },
    }
}

/// `Alexa.Discovery.DeleteReport` removing endpoints.
pub fn delete_report(
    message_id: &str,
    access_token: &str,
    endpoint_ids: &[String],
) -> EventMessage {
    let endpoints: Vec<Value> = endpoint_ids
        .iter()
        .map(|id| json!({ "endpointId": id }))
        .collect();

    EventMessage {
        context: None,
        event: Event {
            header: Header::new(NAMESPACE_DISCOVERY, "DeleteReport", message_id),
            endpoint: None,
            payload: json!({
                "endpoints": endpoints,
                "scope": Scope::bearer(access_token),
            }),
        },
    }
}

/// `Alexa.ChangeReport` for a single endpoint.
pub fn change_report(
    message_id: &str,
    access_token: &str,
    endpoint_id: &str,
    cause: CauseType,
    change_properties: Vec<Property>,
    context_properties: Vec<Property>,
) -> EventMessage {
    EventMessage {
        context: Some(Context {
            properties: context_properties,
        }),
        event: Event {
            header: Header::new(NAMESPACE_ALEXA, "ChangeReport", message_id),
            endpoint: Some(Endpoint {
                scope: Some(Scope::bearer(access_token)),
                endpoint_id: endpoint_id.to_string(),
                cookie: None,
            }),
            payload: json!({
                "change": {
                    "cause": { "type": cause },
                    "properties": change_properties,
                }
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_add_or_update_report_shape() {
        let message = add_or_update_report(
            "msg-1",
            "Atza|token",
            &[EndpointDescription::light("lamp-1", "Lamp")],
        );
        let value = serde_json::to_value(&message).unwrap();

        assert!(value.get("context").is_none());
        assert_eq!(
            value["event"]["header"],
            json!({
                "namespace": "Alexa.Discovery",
                "name": "AddOrUpdateReport",
                "messageId": "msg-1",
                "payloadVersion": "3"
            })
        );
        assert_eq!(
            value["event"]["payload"]["scope"],
            json!({"type": "BearerToken", "token": "Atza|token"})
        );
        assert_eq!(value["event"]["payload"]["endpoints"][0]["endpointId"], json!("lamp-1"));
    }

    #[test]
    fn test_delete_report_shape() {
        let message = delete_report("msg-2", "tok", &["a".to_string(), "b".to_string()]);
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["event"]["header"]["name"], json!("DeleteReport"));
        assert_eq!(
            value["event"]["payload"]["endpoints"],
            json!([{"endpointId": "a"}, {"endpointId": "b"}])
        );
    }

    #[test]
    fn test_change_report_shape() {
        let sampled_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let property = Property::power_state("ON", sampled_at);
        let message = change_report(
            "msg-3",
            "tok",
            "lamp-1",
            CauseType::default(),
            vec![property.clone()],
            vec![],
        );
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["context"], json!({"properties": []}));
        assert_eq!(value["event"]["header"]["namespace"], json!("Alexa"));
        assert_eq!(value["event"]["header"]["name"], json!("ChangeReport"));
        assert_eq!(
            value["event"]["endpoint"],
            json!({"scope": {"type": "BearerToken", "token": "tok"}, "endpointId": "lamp-1"})
        );
        assert_eq!(
            value["event"]["payload"]["change"]["cause"],
            json!({"type": "PHYSICAL_INTERACTION"})
        );
        assert_eq!(
            value["event"]["payload"]["change"]["properties"][0],
            serde_json::to_value(&property).unwrap()
        );
    }
}
