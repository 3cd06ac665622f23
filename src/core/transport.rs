//! HTTP Transport
//!
//! HTTP client interface and implementations for the token endpoint and the event gateway.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::error::{NetworkError, ProtocolError, SmartHomeError};

/// HTTP request definition. Both upstreams only accept POST.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// Request URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<String>,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a POST request.
    pub fn post(url: impl Into<String>, body: String) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            body: Some(body),
            timeout: None,
        }
    }

    /// Add a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_lowercase(), value.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Parse the body as JSON.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body.as_deref().and_then(|b| serde_json::from_str(b).ok())
    }
}

/// HTTP response definition.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Create a response with a status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Create a JSON response.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        let mut response = Self::new(status, body.to_string());
        response
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        response
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport interface (for dependency injection).
///
/// Implementations return `Ok` for every HTTP response regardless of status and
/// `Err(SmartHomeError::Network)` only when no response was received.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SmartHomeError>;
}

/// Default reqwest-based HTTP transport.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl ReqwestHttpTransport {
    /// Create new transport with default settings.
    pub fn new() -> Result<Self, SmartHomeError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create transport with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, SmartHomeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                SmartHomeError::Network(NetworkError::ConnectionFailed {
                    message: format!("failed to create HTTP client: {}", e),
                })
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SmartHomeError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut req_builder = self.client.post(&request.url);

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let response = req_builder.timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                SmartHomeError::Network(NetworkError::Timeout { timeout })
            } else {
                SmartHomeError::Network(NetworkError::ConnectionFailed {
                    message: e.to_string(),
                })
            }
        })?;

        let status = response.status().as_u16();

        if (300..400).contains(&status) {
            let location = response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            return Err(SmartHomeError::Protocol(ProtocolError::UnexpectedRedirect {
                location,
            }));
        }

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string().to_lowercase(), v.to_string());
            }
        }

        // A body that breaks mid-stream means the response never fully arrived.
        let body = response.text().await.map_err(|e| {
            SmartHomeError::Network(NetworkError::ConnectionFailed {
                message: e.to_string(),
            })
        })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

enum MockReply {
    Response(HttpResponse),
    ConnectionFailure(String),
}

/// Mock HTTP transport for testing.
///
/// Replies are served first-in first-out. When the queue is empty the default
/// response is used, or a connection failure if none is set.
#[derive(Default)]
pub struct MockHttpTransport {
    replies: Mutex<VecDeque<MockReply>>,
    request_history: Mutex<Vec<HttpRequest>>,
    default_response: Mutex<Option<HttpResponse>>,
}

impl MockHttpTransport {
    /// Create new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to return.
    pub fn queue_response(&self, response: HttpResponse) -> &Self {
        self.replies.lock().push_back(MockReply::Response(response));
        self
    }

    /// Queue a JSON response.
    pub fn queue_json_response(&self, status: u16, body: &serde_json::Value) -> &Self {
        self.queue_response(HttpResponse::json(status, body))
    }

    /// Queue a transport failure (no response received).
    pub fn queue_connection_failure(&self, message: impl Into<String>) -> &Self {
        self.replies
            .lock()
            .push_back(MockReply::ConnectionFailure(message.into()));
        self
    }

    /// Set default response when queue is empty.
    pub fn set_default_response(&self, response: HttpResponse) -> &Self {
        *self.default_response.lock() = Some(response);
        self
    }

    /// Get request history.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        self.request_history.lock().clone()
    }

    /// Get requests sent to a URL.
    pub fn get_requests_to(&self, url: &str) -> Vec<HttpRequest> {
        self.request_history
            .lock()
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }

    /// Get last request.
    pub fn get_last_request(&self) -> Option<HttpRequest> {
        self.request_history.lock().last().cloned()
    }

}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SmartHomeError> {
        self.request_history.lock().push(request);

        let reply = self.replies.lock().pop_front();
        match reply {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::ConnectionFailure(message)) => {
                Err(SmartHomeError::Network(NetworkError::ConnectionFailed { message }))
            }
            None => self.default_response.lock().clone().ok_or_else(|| {
                SmartHomeError::Network(NetworkError::ConnectionFailed {
                    message: "No mock response available".to_string(),
                })
            }),
        }
    }
}
