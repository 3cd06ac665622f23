//! Alexa Smart Home Skill Backend
//!
//! Directive handling and proactive event delivery for an Alexa smart-home skill,
//! with Login With Amazon (LWA) token lifecycle management.
//!
//! # Features
//!
//! - Authorization-code and refresh-token exchanges against the LWA token endpoint
//! - Per-user token persistence with refresh at 80% of the token lifetime
//! - Event gateway delivery (AddOrUpdateReport, DeleteReport, ChangeReport) with
//!   bounded retry and one forced token refresh on 401
//! - Discovery, PowerController, AcceptGrant and ReportState directive handling
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use alexa_smarthome::{InMemoryKeyValueStore, PowerState, SmartHomeConfig, SmartHomeService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SmartHomeConfig::from_env()?;
//!     let service = SmartHomeService::new(config, Arc::new(InMemoryKeyValueStore::new()))?;
//!
//!     service
//!         .reporter()
//!         .report_power_state("amzn1.account.XYZ", "sample-bulb-01", PowerState::On)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration, token records and Alexa message shapes
//! - `error`: error hierarchy and failure taxonomy
//! - `core`: HTTP transport and clock
//! - `store`: key-value store adapter and device status storage
//! - `flows`: LWA token client
//! - `token`: token persistence and lifecycle manager
//! - `gateway`: event gateway notifier
//! - `handlers`: directive handler and endpoint reports
//! - `service`: everything wired over one store

pub mod builders;
pub mod core;
pub mod error;
pub mod flows;
pub mod gateway;
pub mod handlers;
pub mod resilience;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod token;
pub mod types;

// Re-export service
pub use service::{default_catalog, SmartHomeService};

// Re-export builders
pub use builders::{smarthome_config, SmartHomeConfigBuilder};

// Re-export errors
pub use error::{
    create_error_from_response, create_gateway_error, parse_error_response, ConfigurationError,
    DirectiveError, EndpointError, ErrorKind, GatewayError, GatewayErrorCode, NetworkError,
    OAuth2ErrorCode, OAuth2ErrorResponse, ProtocolError, ProviderError, SmartHomeError,
    SmartHomeResult, StorageError,
};

// Re-export types
pub use types::{
    // Config
    GrantType, LwaCredentials, SmartHomeConfig, TableNames,
    // Token
    TokenRecord, TokenResponse,
    // Messages
    AlexaErrorType, AlexaRequest, AlexaResponse, CauseType, EndpointDescription, EventMessage,
    Header, PowerState, Property,
};

// Re-export core components
pub use core::{
    Clock, HttpRequest, HttpResponse, HttpTransport, MockClock, MockHttpTransport,
    ReqwestHttpTransport, SystemClock,
};

// Re-export storage
pub use store::{
    DeviceStatus, DeviceStatusStore, InMemoryKeyValueStore, ItemKey, KeyValueDeviceStore,
    KeyValueStore, MockKeyValueStore, StoreHandle,
};

// Re-export flows
pub use flows::{LwaTokenClient, MockTokenClient, TokenClient};

// Re-export token management
pub use token::{
    DefaultTokenManager, KeyValueTokenStorage, MockTokenManager, TokenManager, TokenStorage,
};

// Re-export notifier and handlers
pub use gateway::{EventGatewayNotifier, EventNotifier};
pub use handlers::{EndpointReporter, SmartHomeHandler};

// Re-export resilience
pub use resilience::{RetryConfig, RetryPolicy};

// Re-export telemetry
pub use telemetry::{LogFormat, LogLevel, LoggingConfig};
