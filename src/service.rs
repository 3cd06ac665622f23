//! Smart Home Service
//!
//! Wires the token client, token manager, notifier and handlers over one shared
//! key-value store.

use std::sync::Arc;

use crate::core::{HttpTransport, ReqwestHttpTransport, SystemClock};
use crate::error::SmartHomeError;
use crate::flows::LwaTokenClient;
use crate::gateway::EventGatewayNotifier;
use crate::handlers::{EndpointReporter, SmartHomeHandler};
use crate::resilience::RetryPolicy;
use crate::store::{KeyValueDeviceStore, KeyValueStore, StoreHandle};
use crate::token::{DefaultTokenManager, KeyValueTokenStorage};
use crate::types::{AlexaRequest, AlexaResponse, EndpointDescription, SmartHomeConfig};

/// Device store used by the service.
pub type ServiceDeviceStore<S> = KeyValueDeviceStore<Arc<S>>;

/// Token manager used by the service.
pub type ServiceTokenManager<S, T = ReqwestHttpTransport> = DefaultTokenManager<
    LwaTokenClient<T, SystemClock>,
    KeyValueTokenStorage<Arc<S>>,
    SystemClock,
>;

/// Notifier used by the service.
pub type ServiceNotifier<S, T = ReqwestHttpTransport> =
    EventGatewayNotifier<T, ServiceTokenManager<S, T>>;

/// Endpoints announced on discovery when no catalog is given.
pub fn default_catalog() -> Vec<EndpointDescription> {
    vec![EndpointDescription::light("sample-bulb-01", "Livingroom lamp")]
}

/// Skill backend: directive handling and endpoint reports for all users.
pub struct SmartHomeService<S: KeyValueStore, T: HttpTransport = ReqwestHttpTransport> {
    config: SmartHomeConfig,
    tokens: Arc<ServiceTokenManager<S, T>>,
    handler: SmartHomeHandler<ServiceDeviceStore<S>, ServiceTokenManager<S, T>>,
    reporter: EndpointReporter<ServiceDeviceStore<S>, ServiceNotifier<S, T>>,
}

impl<S: KeyValueStore + 'static> SmartHomeService<S, ReqwestHttpTransport> {
    /// Create a service over `store` with the default discovery catalog.
    pub fn new(config: SmartHomeConfig, store: Arc<S>) -> Result<Self, SmartHomeError> {
        Self::with_catalog(config, store, default_catalog())
    }

    /// Create a service over `store` answering discovery with `catalog`.
    pub fn with_catalog(
        config: SmartHomeConfig,
        store: Arc<S>,
        catalog: Vec<EndpointDescription>,
    ) -> Result<Self, SmartHomeError> {
        let transport = ReqwestHttpTransport::with_timeout(config.timeout)?;
        Ok(Self::with_components(config, store, transport, catalog))
    }

    /// Create a service over the process-wide store in `handle`, creating it
    /// with `init` on first use.
    pub fn from_handle<F>(
        config: SmartHomeConfig,
        handle: &StoreHandle<S>,
        init: F,
    ) -> Result<Self, SmartHomeError>
    where
        F: FnOnce() -> S,
    {
        Self::new(config, handle.get_or_init(init))
    }
}

impl<S: KeyValueStore + 'static, T: HttpTransport + 'static> SmartHomeService<S, T> {
    /// Create a service with a custom transport.
    pub fn with_components(
        config: SmartHomeConfig,
        store: Arc<S>,
        transport: T,
        catalog: Vec<EndpointDescription>,
    ) -> Self {
        let transport = Arc::new(transport);
        let clock = Arc::new(SystemClock);

        let client = Arc::new(LwaTokenClient::new(
            config.token_endpoint.clone(),
            transport.clone(),
            clock.clone(),
            RetryPolicy::new(config.retry.clone()),
            config.timeout,
        ));
        let storage = Arc::new(KeyValueTokenStorage::new(
            store.clone(),
            config.tables.tokens.clone(),
        ));
        let tokens = Arc::new(DefaultTokenManager::new(
            config.credentials.clone(),
            client,
            storage,
            clock,
        ));

        let devices = Arc::new(KeyValueDeviceStore::new(store, config.tables.devices.clone()));
        let notifier = Arc::new(EventGatewayNotifier::new(
            config.event_gateway_endpoint.clone(),
            transport,
            tokens.clone(),
            config.retry.clone(),
            config.timeout,
        ));

        Self {
            handler: SmartHomeHandler::new(devices.clone(), tokens.clone(), catalog),
            reporter: EndpointReporter::new(devices, notifier),
            tokens,
            config,
        }
    }

    /// Get configuration.
    pub fn config(&self) -> &SmartHomeConfig {
        &self.config
    }

    /// Answer a directive.
    pub async fn handle(&self, request: AlexaRequest) -> AlexaResponse {
        self.handler.handle(request).await
    }

    /// Get the directive handler.
    pub fn handler(&self) -> &SmartHomeHandler<ServiceDeviceStore<S>, ServiceTokenManager<S, T>> {
        &self.handler
    }

    /// Get the endpoint reporter.
    pub fn reporter(&self) -> &EndpointReporter<ServiceDeviceStore<S>, ServiceNotifier<S, T>> {
        &self.reporter
    }

    /// Get the token manager.
    pub fn tokens(&self) -> &ServiceTokenManager<S, T> {
        &self.tokens
    }
}
