//! Integration tests using WireMock
//!
//! Drive the real reqwest transport against mock LWA and event gateway servers.

mod event_gateway;
mod token_endpoint;

use std::sync::Arc;
use std::time::Duration;

use alexa_smarthome::{
    AlexaRequest, InMemoryKeyValueStore, RetryConfig, SmartHomeConfig, SmartHomeService,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/auth/o2/token";
pub const GATEWAY_PATH: &str = "/v3/events";

/// Retry policy with a short delay so tests stay fast.
pub fn fast_retry() -> RetryConfig {
    RetryConfig::new(3, Duration::from_millis(10))
}

/// Configuration pointing both endpoints at `server`.
pub fn config_for(server: &MockServer) -> SmartHomeConfig {
    SmartHomeConfig::builder()
        .client_id("client-1")
        .client_secret("secret-1")
        .token_endpoint(format!("{}{}", server.uri(), TOKEN_PATH))
        .event_gateway_endpoint(format!("{}{}", server.uri(), GATEWAY_PATH))
        .retry(fast_retry())
        .timeout(Duration::from_secs(5))
        .build()
        .expect("valid test configuration")
}

pub fn service_for(server: &MockServer) -> SmartHomeService<InMemoryKeyValueStore> {
    SmartHomeService::new(config_for(server), Arc::new(InMemoryKeyValueStore::new()))
        .expect("service")
}

/// Unsigned JWT-shaped bearer token carrying `sub`.
pub fn bearer(sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{}"}}"#, sub));
    format!("{}.{}.c2ln", header, payload)
}

pub fn token_body(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "Bearer",
        "expires_in": 3600
    })
}

pub fn accept_grant(uid: &str, code: &str) -> AlexaRequest {
    serde_json::from_value(json!({
        "directive": {
            "header": {
                "namespace": "Alexa.Authorization",
                "name": "AcceptGrant",
                "messageId": "grant-msg-1",
                "payloadVersion": "3"
            },
            "payload": {
                "grant": {"type": "OAuth2.AuthorizationCode", "code": code},
                "grantee": {"type": "BearerToken", "token": bearer(uid)}
            }
        }
    }))
    .expect("valid directive")
}

/// Mount a code-grant answer on the token endpoint and link `uid` through AcceptGrant.
pub async fn link_account(
    server: &MockServer,
    service: &SmartHomeService<InMemoryKeyValueStore>,
    uid: &str,
    access: &str,
    refresh: &str,
) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access, refresh)))
        .up_to_n_times(1)
        .mount(server)
        .await;

    let response = service.handle(accept_grant(uid, "code-1")).await;
    assert_eq!(response.event.header.name, "AcceptGrant.Response");
}

/// Bodies of every event posted to the gateway, in arrival order.
pub async fn gateway_events(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == GATEWAY_PATH)
        .map(|request| serde_json::from_slice(&request.body).expect("json event"))
        .collect()
}
