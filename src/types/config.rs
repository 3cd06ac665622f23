//! Configuration Types
//!
//! Skill backend configuration: LWA client credentials, endpoints and table names.

use secrecy::SecretString;
use std::time::Duration;

use crate::resilience::RetryConfig;

/// LWA token endpoint.
pub const DEFAULT_LWA_TOKEN_ENDPOINT: &str = "https://api.amazon.com/auth/o2/token";
/// Event gateway endpoint for the Far East region.
pub const DEFAULT_EVENT_GATEWAY_ENDPOINT: &str = "https://api.fe.amazonalexa.com/v3/events";
pub const DEFAULT_TOKEN_TABLE: &str = "lwa_token_manage_table";
pub const DEFAULT_DEVICE_TABLE: &str = "alexa_device_status_table";

/// Skill backend configuration.
#[derive(Clone, Debug)]
pub struct SmartHomeConfig {
    /// LWA client credentials.
    pub credentials: LwaCredentials,
    /// LWA token endpoint URL.
    pub token_endpoint: String,
    /// Event gateway URL.
    pub event_gateway_endpoint: String,
    /// Key-value table names.
    pub tables: TableNames,
    /// Retry policy shared by the token client and the notifier.
    pub retry: RetryConfig,
    /// HTTP timeout.
    pub timeout: Duration,
}

/// LWA client credentials.
#[derive(Clone)]
pub struct LwaCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
}

impl LwaCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }
}

impl std::fmt::Debug for LwaCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LwaCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Names of the two logical tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableNames {
    /// Token records keyed by `uid`.
    pub tokens: String,
    /// Device status records keyed by `(uid, device_id)`.
    pub devices: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            tokens: DEFAULT_TOKEN_TABLE.to_string(),
            devices: DEFAULT_DEVICE_TABLE.to_string(),
        }
    }
}

/// OAuth2 grant types used against the LWA token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}
