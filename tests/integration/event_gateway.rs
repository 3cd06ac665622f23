//! Integration tests for event gateway delivery

use super::*;
use alexa_smarthome::{ErrorKind, TokenManager};
use wiremock::matchers::header;

#[tokio::test]
async fn test_event_accepted() {
    let server = MockServer::start().await;
    let service = service_for(&server);
    link_account(&server, &service, "user-1", "access-1", "refresh-1").await;

    Mock::given(method("POST"))
        .and(path(GATEWAY_PATH))
        .and(header("Authorization", "Bearer access-1"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    service
        .reporter()
        .delete_endpoint("user-1", "lamp-1")
        .await
        .unwrap();

    let events = gateway_events(&server).await;
    assert_eq!(events[0]["event"]["header"]["name"], json!("DeleteReport"));
    assert_eq!(events[0]["event"]["payload"]["scope"]["token"], json!("access-1"));
    assert_eq!(
        events[0]["event"]["payload"]["endpoints"],
        json!([{"endpointId": "lamp-1"}])
    );
}

#[tokio::test]
async fn test_server_errors_exhaust_retries_with_one_message_id() {
    let server = MockServer::start().await;
    let service = service_for(&server);
    link_account(&server, &service, "user-1", "access-1", "refresh-1").await;

    Mock::given(method("POST"))
        .and(path(GATEWAY_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "payload": {"code": "INTERNAL_SERVICE_EXCEPTION", "description": "try later"}
        })))
        .expect(4)
        .mount(&server)
        .await;

    let error = service
        .reporter()
        .delete_endpoint("user-1", "lamp-1")
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Transient);

    let events = gateway_events(&server).await;
    assert_eq!(events.len(), 4);
    let first_id = &events[0]["event"]["header"]["messageId"];
    assert!(events
        .iter()
        .all(|event| &event["event"]["header"]["messageId"] == first_id));
}

#[tokio::test]
async fn test_expired_token_refreshed_once() {
    let server = MockServer::start().await;
    let service = service_for(&server);
    link_account(&server, &service, "user-1", "access-1", "refresh-1").await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-2", "refresh-2")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(GATEWAY_PATH))
        .and(header("Authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "payload": {"code": "INVALID_ACCESS_TOKEN_EXCEPTION", "description": "expired"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(GATEWAY_PATH))
        .and(header("Authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    service
        .reporter()
        .delete_endpoint("user-1", "lamp-1")
        .await
        .unwrap();

    let events = gateway_events(&server).await;
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0]["event"]["header"]["messageId"],
        events[1]["event"]["header"]["messageId"]
    );
    assert_eq!(events[1]["event"]["payload"]["scope"]["token"], json!("access-2"));

    let stored = service
        .tokens()
        .get_valid_token("user-1", false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "access-2");
    assert_eq!(stored.refresh_token, "refresh-2");
}

#[tokio::test]
async fn test_second_unauthorized_is_terminal() {
    let server = MockServer::start().await;
    let service = service_for(&server);
    link_account(&server, &service, "user-1", "access-1", "refresh-1").await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-2", "refresh-2")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(GATEWAY_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let error = service
        .reporter()
        .delete_endpoint("user-1", "lamp-1")
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::AuthExpired);
}

#[tokio::test]
async fn test_user_without_token_sends_nothing() {
    let server = MockServer::start().await;
    let service = service_for(&server);

    Mock::given(method("POST"))
        .and(path(GATEWAY_PATH))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    service
        .reporter()
        .delete_endpoint("unlinked-user", "lamp-1")
        .await
        .unwrap();

    assert!(gateway_events(&server).await.is_empty());
}

#[tokio::test]
async fn test_malformed_event_not_retried() {
    let server = MockServer::start().await;
    let service = service_for(&server);
    link_account(&server, &service, "user-1", "access-1", "refresh-1").await;

    Mock::given(method("POST"))
        .and(path(GATEWAY_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "payload": {"code": "INVALID_REQUEST_EXCEPTION", "description": "bad endpoint"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let error = service
        .reporter()
        .delete_endpoint("user-1", "lamp-1")
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Malformed);
}
