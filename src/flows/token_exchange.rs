//! LWA Token Exchange
//!
//! Authorization-code and refresh-token grants against the Login With Amazon token
//! endpoint, with bounded retry on transient failures.

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::{Clock, HttpRequest, HttpTransport};
use crate::error::{create_error_from_response, ProtocolError, SmartHomeError};
use crate::resilience::RetryPolicy;
use crate::types::{GrantType, TokenRecord, TokenResponse};

/// Content type expected by the LWA token endpoint.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// OAuth2 token client interface.
#[async_trait]
pub trait TokenClient: Send + Sync {
    /// Exchange an authorization code for tokens.
    async fn exchange_by_code(
        &self,
        client_id: &str,
        client_secret: &SecretString,
        code: &str,
    ) -> Result<TokenRecord, SmartHomeError>;

    /// Exchange a refresh token for new tokens.
    async fn exchange_by_refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: &SecretString,
    ) -> Result<TokenRecord, SmartHomeError>;
}

/// Token client for the LWA token endpoint.
pub struct LwaTokenClient<T: HttpTransport, C: Clock> {
    token_endpoint: String,
    transport: Arc<T>,
    clock: Arc<C>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl<T: HttpTransport, C: Clock> LwaTokenClient<T, C> {
    /// Create new token client.
    pub fn new(
        token_endpoint: impl Into<String>,
        transport: Arc<T>,
        clock: Arc<C>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            transport,
            clock,
            retry,
            timeout,
        }
    }

    fn build_request_body(
        grant_type: GrantType,
        grant: &str,
        client_id: &str,
        client_secret: &SecretString,
    ) -> String {
        let grant_field = match grant_type {
            GrantType::AuthorizationCode => "code",
            GrantType::RefreshToken => "refresh_token",
        };

        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", grant_type.as_str())
            .append_pair(grant_field, grant)
            .append_pair("client_id", client_id)
            .append_pair("client_secret", client_secret.expose_secret())
            .finish()
    }

    async fn request_token(
        &self,
        grant_type: GrantType,
        body: String,
    ) -> Result<TokenRecord, SmartHomeError> {
        // Stamped before the first attempt so retries never extend the lifetime.
        let started_at = self.clock.now();

        let body = &body;
        let response = self
            .retry
            .execute(move || async move {
                let request = HttpRequest::post(self.token_endpoint.clone(), body.clone())
                    .header("Content-Type", FORM_CONTENT_TYPE)
                    .timeout(self.timeout);

                let response = self.transport.send(request).await?;
                if !response.is_success() {
                    return Err(create_error_from_response(response.status, &response.body));
                }
                Ok(response)
            })
            .await?;

        let token: TokenResponse = serde_json::from_str(&response.body).map_err(|e| {
            SmartHomeError::Protocol(ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })?;

        debug!(
            grant_type = grant_type.as_str(),
            expires_in = token.expires_in,
            "Token exchange succeeded"
        );

        Ok(token.into_record(started_at))
    }
}

#[async_trait]
impl<T: HttpTransport, C: Clock> TokenClient for LwaTokenClient<T, C> {
    #[instrument(skip_all, name = "lwa_exchange_by_code")]
    async fn exchange_by_code(
        &self,
        client_id: &str,
        client_secret: &SecretString,
        code: &str,
    ) -> Result<TokenRecord, SmartHomeError> {
        let body = Self::build_request_body(
            GrantType::AuthorizationCode,
            code,
            client_id,
            client_secret,
        );
        self.request_token(GrantType::AuthorizationCode, body).await
    }

    #[instrument(skip_all, name = "lwa_exchange_by_refresh_token")]
    async fn exchange_by_refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: &SecretString,
    ) -> Result<TokenRecord, SmartHomeError> {
        let body = Self::build_request_body(
            GrantType::RefreshToken,
            refresh_token,
            client_id,
            client_secret,
        );
        self.request_token(GrantType::RefreshToken, body).await
    }
}

/// Exchange recorded by [`MockTokenClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenExchange {
    Code(String),
    RefreshToken(String),
}

/// Mock token client for testing.
///
/// Results are served first-in first-out; an empty queue fails with a network error.
#[derive(Default)]
pub struct MockTokenClient {
    results: Mutex<VecDeque<Result<TokenRecord, SmartHomeError>>>,
    history: Mutex<Vec<TokenExchange>>,
}

impl MockTokenClient {
    /// Create new mock token client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful exchange.
    pub fn queue_token(&self, record: TokenRecord) -> &Self {
        self.results.lock().push_back(Ok(record));
        self
    }

    /// Queue a failed exchange.
    pub fn queue_error(&self, error: SmartHomeError) -> &Self {
        self.results.lock().push_back(Err(error));
        self
    }

    /// Get exchange history.
    pub fn get_history(&self) -> Vec<TokenExchange> {
        self.history.lock().clone()
    }

    fn next_result(&self, exchange: TokenExchange) -> Result<TokenRecord, SmartHomeError> {
        self.history.lock().push(exchange);
        self.results.lock().pop_front().unwrap_or_else(|| {
            Err(SmartHomeError::Network(
                crate::error::NetworkError::ConnectionFailed {
                    message: "No mock token available".to_string(),
                },
            ))
        })
    }
}

#[async_trait]
impl TokenClient for MockTokenClient {
    async fn exchange_by_code(
        &self,
        _client_id: &str,
        _client_secret: &SecretString,
        code: &str,
    ) -> Result<TokenRecord, SmartHomeError> {
        self.next_result(TokenExchange::Code(code.to_string()))
    }

    async fn exchange_by_refresh_token(
        &self,
        refresh_token: &str,
        _client_id: &str,
        _client_secret: &SecretString,
    ) -> Result<TokenRecord, SmartHomeError> {
        self.next_result(TokenExchange::RefreshToken(refresh_token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MockClock, MockHttpTransport};
    use crate::error::{ErrorKind, OAuth2ErrorCode};
    use crate::resilience::RetryConfig;
    use serde_json::json;

    const ENDPOINT: &str = "https://lwa.test/auth/o2/token";

    fn client(
        transport: Arc<MockHttpTransport>,
        clock: Arc<MockClock>,
    ) -> LwaTokenClient<MockHttpTransport, MockClock> {
        LwaTokenClient::new(
            ENDPOINT,
            transport,
            clock,
            RetryPolicy::new(RetryConfig::new(3, Duration::from_millis(1))),
            Duration::from_secs(5),
        )
    }

    fn secret() -> SecretString {
        SecretString::new("s3cret&=".to_string())
    }

    fn token_json() -> serde_json::Value {
        json!({
            "access_token": "Atza|new",
            "refresh_token": "Atzr|new",
            "token_type": "bearer",
            "expires_in": 3600
        })
    }

    #[tokio::test]
    async fn test_exchange_by_code_sends_form() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &token_json());
        let clock = Arc::new(MockClock::new(1_700_000_000));

        let record = client(transport.clone(), clock)
            .exchange_by_code("client-1", &secret(), "code 123")
            .await
            .unwrap();

        assert_eq!(record.access_token, "Atza|new");
        assert_eq!(record.access_token_timestamp, 1_700_000_000);

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.url, ENDPOINT);
        assert_eq!(
            request.headers.get("content-type").map(String::as_str),
            Some(FORM_CONTENT_TYPE)
        );
        assert_eq!(
            request.body.as_deref(),
            Some(concat!(
                "grant_type=authorization_code&code=code+123",
                "&client_id=client-1&client_secret=s3cret%26%3D"
            ))
        );
    }

    #[tokio::test]
    async fn test_exchange_by_refresh_token_sends_grant() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &token_json());

        client(transport.clone(), Arc::new(MockClock::new(0)))
            .exchange_by_refresh_token("Atzr|old", "client-1", &secret())
            .await
            .unwrap();

        let body = transport.get_last_request().unwrap().body.unwrap();
        assert!(body.starts_with("grant_type=refresh_token&refresh_token=Atzr%7Cold&"));
    }

    #[tokio::test]
    async fn test_timestamp_taken_before_retries() {
        let transport = Arc::new(MockHttpTransport::new());
        transport
            .queue_connection_failure("reset")
            .queue_json_response(500, &json!({}))
            .queue_json_response(200, &token_json());
        let clock = Arc::new(MockClock::new(1_000));

        let record = client(transport.clone(), clock)
            .exchange_by_code("c", &secret(), "code")
            .await
            .unwrap();

        assert_eq!(record.access_token_timestamp, 1_000);
        assert_eq!(transport.get_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted_return_last_http_error() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.set_default_response(crate::core::HttpResponse::new(429, "slow down"));

        let error = client(transport.clone(), Arc::new(MockClock::new(0)))
            .exchange_by_code("c", &secret(), "code")
            .await
            .unwrap_err();

        assert_eq!(transport.get_requests().len(), 4);
        assert_eq!(error.kind(), ErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_oauth2_error_not_retried() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            400,
            &json!({"error": "invalid_grant", "error_description": "expired"}),
        );

        let error = client(transport.clone(), Arc::new(MockClock::new(0)))
            .exchange_by_refresh_token("Atzr|dead", "c", &secret())
            .await
            .unwrap_err();

        assert_eq!(transport.get_requests().len(), 1);
        assert_eq!(error.oauth2_code(), Some(&OAuth2ErrorCode::InvalidGrant));
    }

    #[tokio::test]
    async fn test_invalid_success_body_is_protocol_error() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"access_token": "only"}));

        let error = client(transport, Arc::new(MockClock::new(0)))
            .exchange_by_code("c", &secret(), "code")
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            SmartHomeError::Protocol(ProtocolError::InvalidJson { .. })
        ));
    }

    #[tokio::test]
    async fn test_mock_token_client() {
        let mock = MockTokenClient::new();
        mock.queue_error(create_error_from_response(
            400,
            r#"{"error":"invalid_client"}"#,
        ));

        assert!(mock.exchange_by_code("c", &secret(), "abc").await.is_err());
        assert!(mock
            .exchange_by_refresh_token("r", "c", &secret())
            .await
            .is_err());
        assert_eq!(
            mock.get_history(),
            vec![
                TokenExchange::Code("abc".to_string()),
                TokenExchange::RefreshToken("r".to_string()),
            ]
        );
    }
}
