//! Configuration Builder
//!
//! Fluent builder for the skill backend configuration, with environment loading.

use std::time::Duration;

use crate::error::{ConfigurationError, SmartHomeError};
use crate::resilience::RetryConfig;
use crate::types::{
    LwaCredentials, SmartHomeConfig, TableNames, DEFAULT_EVENT_GATEWAY_ENDPOINT,
    DEFAULT_LWA_TOKEN_ENDPOINT,
};
use secrecy::SecretString;

pub const ENV_LWA_CLIENT_ID: &str = "LWA_CLIENT_ID";
pub const ENV_LWA_CLIENT_SECRET: &str = "LWA_CLIENT_SECRET";
pub const ENV_LWA_TOKEN_URI: &str = "LWA_TOKEN_URI";
pub const ENV_EVENT_GATEWAY_ENDPOINT: &str = "SMART_HOME_EVENT_GATEWAY_ENDPOINT";
pub const ENV_TOKEN_TABLE: &str = "LWA_TOKEN_MANAGE_TABLE";
pub const ENV_DEVICE_TABLE: &str = "ALEXA_DEVICE_STATUS_TABLE";

/// Skill backend configuration builder.
#[derive(Default)]
pub struct SmartHomeConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    token_endpoint: Option<String>,
    event_gateway_endpoint: Option<String>,
    tables: TableNames,
    retry: RetryConfig,
    timeout: Duration,
}

impl SmartHomeConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            ..Default::default()
        }
    }

    /// Load settings from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let mut builder = Self::new();

        if let Some(v) = get(ENV_LWA_CLIENT_ID) {
            builder = builder.client_id(v);
        }
        if let Some(v) = get(ENV_LWA_CLIENT_SECRET) {
            builder = builder.client_secret(v);
        }
        if let Some(v) = get(ENV_LWA_TOKEN_URI) {
            builder = builder.token_endpoint(v);
        }
        if let Some(v) = get(ENV_EVENT_GATEWAY_ENDPOINT) {
            builder = builder.event_gateway_endpoint(v);
        }
        if let Some(v) = get(ENV_TOKEN_TABLE) {
            builder = builder.token_table(v);
        }
        if let Some(v) = get(ENV_DEVICE_TABLE) {
            builder = builder.device_table(v);
        }

        builder
    }

    /// Set LWA client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set LWA client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set token endpoint.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Set event gateway endpoint.
    pub fn event_gateway_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.event_gateway_endpoint = Some(endpoint.into());
        self
    }

    /// Set token table name.
    pub fn token_table(mut self, table: impl Into<String>) -> Self {
        self.tables.tokens = table.into();
        self
    }

    /// Set device status table name.
    pub fn device_table(mut self, table: impl Into<String>) -> Self {
        self.tables.devices = table.into();
        self
    }

    /// Set retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<SmartHomeConfig, SmartHomeError> {
        let client_id = self.client_id.ok_or_else(|| missing(ENV_LWA_CLIENT_ID))?;
        let client_secret = self
            .client_secret
            .ok_or_else(|| missing(ENV_LWA_CLIENT_SECRET))?;

        let token_endpoint = validate_endpoint(
            self.token_endpoint
                .unwrap_or_else(|| DEFAULT_LWA_TOKEN_ENDPOINT.to_string()),
        )?;
        let event_gateway_endpoint = validate_endpoint(
            self.event_gateway_endpoint
                .unwrap_or_else(|| DEFAULT_EVENT_GATEWAY_ENDPOINT.to_string()),
        )?;

        if self.tables.tokens.is_empty() || self.tables.devices.is_empty() {
            return Err(SmartHomeError::Configuration(
                ConfigurationError::InvalidConfig {
                    message: "table names must not be empty".to_string(),
                },
            ));
        }

        Ok(SmartHomeConfig {
            credentials: LwaCredentials {
                client_id,
                client_secret,
            },
            token_endpoint,
            event_gateway_endpoint,
            tables: self.tables,
            retry: self.retry,
            timeout: self.timeout,
        })
    }
}

impl SmartHomeConfig {
    /// Create a configuration builder.
    pub fn builder() -> SmartHomeConfigBuilder {
        SmartHomeConfigBuilder::new()
    }

    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, SmartHomeError> {
        SmartHomeConfigBuilder::from_env().build()
    }
}

fn missing(field: &str) -> SmartHomeError {
    SmartHomeError::Configuration(ConfigurationError::MissingRequired {
        field: field.to_string(),
    })
}

fn validate_endpoint(endpoint: String) -> Result<String, SmartHomeError> {
    match url::Url::parse(&endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(endpoint),
        _ => Err(SmartHomeError::Configuration(
            ConfigurationError::InvalidEndpoint { url: endpoint },
        )),
    }
}

/// Create a new configuration builder.
pub fn smarthome_config() -> SmartHomeConfigBuilder {
    SmartHomeConfigBuilder::new()
}
