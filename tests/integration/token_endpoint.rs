//! Integration tests for the LWA token endpoint

use super::*;
use alexa_smarthome::{
    ErrorKind, LwaTokenClient, OAuth2ErrorCode, ReqwestHttpTransport, RetryPolicy, SystemClock,
    TokenClient,
};
use secrecy::SecretString;
use alexa_smarthome::flows::FORM_CONTENT_TYPE;
use wiremock::matchers::header;

fn client_for(server: &MockServer) -> LwaTokenClient<ReqwestHttpTransport, SystemClock> {
    LwaTokenClient::new(
        format!("{}{}", server.uri(), TOKEN_PATH),
        Arc::new(ReqwestHttpTransport::new().unwrap()),
        Arc::new(SystemClock),
        RetryPolicy::new(fast_retry()),
        Duration::from_secs(5),
    )
}

fn secret() -> SecretString {
    SecretString::new("secret-1".to_string())
}

#[tokio::test]
async fn test_code_exchange_posts_form() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("Content-Type", FORM_CONTENT_TYPE))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=code-1"))
        .and(body_string_contains("client_id=client-1"))
        .and(body_string_contains("client_secret=secret-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1", "refresh-1")))
        .expect(1)
        .mount(&server)
        .await;

    let record = client_for(&server)
        .exchange_by_code("client-1", &secret(), "code-1")
        .await
        .unwrap();

    assert_eq!(record.access_token, "access-1");
    assert_eq!(record.refresh_token, "refresh-1");
    assert_eq!(record.expires_in, 3600);
    assert!(record.access_token_timestamp > 0);
}

#[tokio::test]
async fn test_refresh_exchange_posts_refresh_grant() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-2", "refresh-2")))
        .expect(1)
        .mount(&server)
        .await;

    let record = client_for(&server)
        .exchange_by_refresh_token("refresh-1", "client-1", &secret())
        .await
        .unwrap();

    assert_eq!(record.access_token, "access-2");
}

#[tokio::test]
async fn test_invalid_grant_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "The request has an invalid grant parameter"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let error = client_for(&server)
        .exchange_by_refresh_token("refresh-1", "client-1", &secret())
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Protocol(OAuth2ErrorCode::InvalidGrant));
    assert!(error.needs_reauth());
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1", "refresh-1")))
        .expect(1)
        .mount(&server)
        .await;

    let record = client_for(&server)
        .exchange_by_code("client-1", &secret(), "code-1")
        .await
        .unwrap();

    assert_eq!(record.access_token, "access-1");
}

#[tokio::test]
async fn test_retries_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let error = client_for(&server)
        .exchange_by_code("client-1", &secret(), "code-1")
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Transient);
}
