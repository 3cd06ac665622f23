//! Smart Home Error Types
//!
//! Error hierarchy for the token lifecycle, the event gateway notifier and the
//! directive handlers, plus the retry taxonomy derived from it.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// HTTP statuses treated as transient by both the token endpoint and the event gateway.
pub const RETRYABLE_STATUSES: [u16; 3] = [429, 500, 503];

/// Root error type for the smart home integration.
#[derive(Error, Debug)]
pub enum SmartHomeError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Event gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("Directive error: {0}")]
    Directive(#[from] DirectiveError),
}

/// Failure classification driving retry and re-authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure or HTTP 429/500/503.
    Transient,
    /// Gateway rejected the access token (HTTP 401).
    AuthExpired,
    /// OAuth2 error body returned by the authorization server.
    Protocol(OAuth2ErrorCode),
    /// Device record does not exist.
    NotFound,
    /// Gateway rejected the message shape (HTTP 400).
    Malformed,
    /// Anything else; surfaced as-is.
    Fatal,
}

impl SmartHomeError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "SMARTHOME_CONFIG",
            Self::Network(_) => "SMARTHOME_NETWORK",
            Self::Protocol(_) => "SMARTHOME_PROTOCOL",
            Self::Provider(_) => "SMARTHOME_LWA",
            Self::Storage(_) => "SMARTHOME_STORAGE",
            Self::Gateway(_) => "SMARTHOME_GATEWAY",
            Self::Endpoint(_) => "SMARTHOME_ENDPOINT",
            Self::Directive(_) => "SMARTHOME_DIRECTIVE",
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Transient,
            Self::Provider(ProviderError::OAuth2 { code, .. }) => ErrorKind::Protocol(code.clone()),
            Self::Provider(ProviderError::UnexpectedStatus { status, .. })
                if RETRYABLE_STATUSES.contains(status) =>
            {
                ErrorKind::Transient
            }
            Self::Gateway(e) if RETRYABLE_STATUSES.contains(&e.status) => ErrorKind::Transient,
            Self::Gateway(e) if e.status == 401 => ErrorKind::AuthExpired,
            Self::Gateway(e) if e.status == 400 => ErrorKind::Malformed,
            Self::Endpoint(EndpointError::NoSuchEndpoint { .. }) => ErrorKind::NotFound,
            _ => ErrorKind::Fatal,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Check if the refresh token is permanently dead and the user must re-link.
    pub fn needs_reauth(&self) -> bool {
        self.oauth2_code() == Some(&OAuth2ErrorCode::InvalidGrant)
    }

    /// OAuth2 error code, if this is a protocol error from the authorization server.
    pub fn oauth2_code(&self) -> Option<&OAuth2ErrorCode> {
        match self {
            Self::Provider(ProviderError::OAuth2 { code, .. }) => Some(code),
            _ => None,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Network/transport error: no HTTP response was received.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },
}

/// OAuth2 error codes returned in the `error` field of a token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuth2ErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,
    ServerError,
    TemporarilyUnavailable,
    Other(String),
}

impl OAuth2ErrorCode {
    pub fn parse(code: &str) -> Self {
        match code {
            "invalid_request" => Self::InvalidRequest,
            "invalid_client" => Self::InvalidClient,
            "invalid_grant" => Self::InvalidGrant,
            "unauthorized_client" => Self::UnauthorizedClient,
            "unsupported_grant_type" => Self::UnsupportedGrantType,
            "invalid_scope" => Self::InvalidScope,
            "server_error" => Self::ServerError,
            "temporarily_unavailable" => Self::TemporarilyUnavailable,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for OAuth2ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization server (LWA) error.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("OAuth2 error {code}: {}", .description.as_deref().unwrap_or("no description"))]
    OAuth2 {
        status: u16,
        code: OAuth2ErrorCode,
        description: Option<String>,
    },

    #[error("Unexpected HTTP {status} from token endpoint")]
    UnexpectedStatus { status: u16, body: String },
}

/// Storage error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Delete failed: {message}")]
    DeleteFailed { message: String },

    #[error("Conditional check failed for {table}/{key}")]
    ConditionalCheckFailed { table: String, key: String },

    #[error("Corrupted data: {message}")]
    CorruptedData { message: String },
}

/// Machine-readable error codes returned by the event gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayErrorCode {
    InvalidRequest,
    InvalidAccessToken,
    SkillNeverEnabled,
    InsufficientPermission,
    AccountNotFound,
    SkillNotFound,
    RequestEntityTooLarge,
    Throttling,
    InternalService,
    ServiceUnavailable,
    Other(String),
}

impl GatewayErrorCode {
    pub fn parse(code: &str) -> Self {
        match code {
            "INVALID_REQUEST_EXCEPTION" => Self::InvalidRequest,
            "INVALID_ACCESS_TOKEN_EXCEPTION" => Self::InvalidAccessToken,
            "SKILL_NEVER_ENABLED_EXCEPTION" => Self::SkillNeverEnabled,
            "INSUFFICIENT_PERMISSION_EXCEPTION" => Self::InsufficientPermission,
            "ACCOUNT_NOT_FOUND_EXCEPTION" => Self::AccountNotFound,
            "SKILL_NOT_FOUND_EXCEPTION" => Self::SkillNotFound,
            "REQUEST_ENTITY_TOO_LARGE_EXCEPTION" => Self::RequestEntityTooLarge,
            "THROTTLING_EXCEPTION" => Self::Throttling,
            "INTERNAL_SERVICE_EXCEPTION" => Self::InternalService,
            "SERVICE_UNAVAILABLE_EXCEPTION" => Self::ServiceUnavailable,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST_EXCEPTION",
            Self::InvalidAccessToken => "INVALID_ACCESS_TOKEN_EXCEPTION",
            Self::SkillNeverEnabled => "SKILL_NEVER_ENABLED_EXCEPTION",
            Self::InsufficientPermission => "INSUFFICIENT_PERMISSION_EXCEPTION",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND_EXCEPTION",
            Self::SkillNotFound => "SKILL_NOT_FOUND_EXCEPTION",
            Self::RequestEntityTooLarge => "REQUEST_ENTITY_TOO_LARGE_EXCEPTION",
            Self::Throttling => "THROTTLING_EXCEPTION",
            Self::InternalService => "INTERNAL_SERVICE_EXCEPTION",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE_EXCEPTION",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error response from the event gateway.
#[derive(Error, Debug, Clone)]
#[error(
    "event gateway responded {status} (code: {}, description: {})",
    .code.as_ref().map(GatewayErrorCode::as_str).unwrap_or("none"),
    .description.as_deref().unwrap_or("none")
)]
pub struct GatewayError {
    pub status: u16,
    pub code: Option<GatewayErrorCode>,
    pub description: Option<String>,
}

/// Device endpoint error.
#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("No such endpoint {endpoint_id} for user {uid}")]
    NoSuchEndpoint { uid: String, endpoint_id: String },
}

/// Inbound directive could not be interpreted.
#[derive(Error, Debug)]
pub enum DirectiveError {
    #[error("Unsupported directive {namespace}.{name}")]
    Unsupported { namespace: String, name: String },

    #[error("Invalid directive: {message}")]
    Invalid { message: String },

    #[error("Invalid bearer token: {message}")]
    InvalidBearerToken { message: String },
}

/// Result type for smart home operations.
pub type SmartHomeResult<T> = Result<T, SmartHomeError>;

/// OAuth2 error response body from the authorization server.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Parse an OAuth2 error response body.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Create error from a non-success token endpoint response.
///
/// Retryable statuses stay HTTP errors even when they carry an OAuth2 body, so the
/// retry policy sees them as transient.
pub fn create_error_from_response(status: u16, body: &str) -> SmartHomeError {
    if !RETRYABLE_STATUSES.contains(&status) {
        if let Some(response) = parse_error_response(body) {
            return SmartHomeError::Provider(ProviderError::OAuth2 {
                status,
                code: OAuth2ErrorCode::parse(&response.error),
                description: response.error_description,
            });
        }
    }

    SmartHomeError::Provider(ProviderError::UnexpectedStatus {
        status,
        body: body.to_string(),
    })
}

#[derive(serde::Deserialize)]
struct GatewayErrorBody {
    payload: GatewayErrorPayload,
}

#[derive(serde::Deserialize)]
struct GatewayErrorPayload {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Create gateway error from a non-success event gateway response.
pub fn create_gateway_error(status: u16, body: &str) -> GatewayError {
    let payload = serde_json::from_str::<GatewayErrorBody>(body)
        .ok()
        .map(|b| b.payload);

    GatewayError {
        status,
        code: payload
            .as_ref()
            .and_then(|p| p.code.as_deref())
            .map(GatewayErrorCode::parse),
        description: payload.and_then(|p| p.description),
    }
}
