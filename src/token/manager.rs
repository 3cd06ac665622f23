//! Token Manager
//!
//! Token lifecycle per user: read the cached record, refresh it when stale, persist
//! the result, and drop records whose refresh token has been revoked.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::core::Clock;
use crate::error::SmartHomeError;
use crate::flows::TokenClient;
use crate::token::TokenStorage;
use crate::types::{LwaCredentials, TokenRecord};

/// Token manager interface.
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Get a usable token for a user, refreshing it when stale or when forced.
    ///
    /// Returns `Ok(None)` when the user has no stored token.
    async fn get_valid_token(
        &self,
        uid: &str,
        force_refresh: bool,
    ) -> Result<Option<TokenRecord>, SmartHomeError>;

    /// Exchange an authorization code and store the result, replacing any prior record.
    async fn issue_by_authorization_code(
        &self,
        uid: &str,
        code: &str,
    ) -> Result<TokenRecord, SmartHomeError>;
}

/// Default token manager implementation.
pub struct DefaultTokenManager<C: TokenClient, S: TokenStorage, K: Clock> {
    credentials: LwaCredentials,
    client: Arc<C>,
    storage: Arc<S>,
    clock: Arc<K>,
}

impl<C: TokenClient, S: TokenStorage, K: Clock> DefaultTokenManager<C, S, K> {
    /// Create new token manager.
    pub fn new(
        credentials: LwaCredentials,
        client: Arc<C>,
        storage: Arc<S>,
        clock: Arc<K>,
    ) -> Self {
        Self {
            credentials,
            client,
            storage,
            clock,
        }
    }

    async fn refresh(
        &self,
        uid: &str,
        current: &TokenRecord,
    ) -> Result<TokenRecord, SmartHomeError> {
        let result = self
            .client
            .exchange_by_refresh_token(
                &current.refresh_token,
                &self.credentials.client_id,
                &self.credentials.client_secret,
            )
            .await;

        match result {
            Ok(record) => {
                self.storage.store(uid, &record).await?;
                debug!(uid, refresh_at = record.refresh_at(), "Token refreshed");
                Ok(record)
            }
            Err(e) if e.needs_reauth() => {
                warn!(uid, "Refresh token is invalid, removing stored token");
                if let Err(delete_error) = self.storage.delete(uid).await {
                    error!(uid, error = %delete_error, "Failed to remove invalid token");
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<C: TokenClient, S: TokenStorage, K: Clock> TokenManager for DefaultTokenManager<C, S, K> {
    #[instrument(skip(self))]
    async fn get_valid_token(
        &self,
        uid: &str,
        force_refresh: bool,
    ) -> Result<Option<TokenRecord>, SmartHomeError> {
        let Some(current) = self.storage.retrieve(uid).await? else {
            return Ok(None);
        };

        if force_refresh || current.is_stale(self.clock.now()) {
            return self.refresh(uid, &current).await.map(Some);
        }

        Ok(Some(current))
    }

    #[instrument(skip(self, code))]
    async fn issue_by_authorization_code(
        &self,
        uid: &str,
        code: &str,
    ) -> Result<TokenRecord, SmartHomeError> {
        let record = self
            .client
            .exchange_by_code(
                &self.credentials.client_id,
                &self.credentials.client_secret,
                code,
            )
            .await?;

        self.storage.store_with_code(uid, &record, code).await?;
        debug!(uid, "Token issued from authorization code");

        Ok(record)
    }
}

/// Mock token manager for testing.
///
/// Queued results are served first; afterwards lookups fall back to the tokens
/// added with [`MockTokenManager::add_token`].
#[derive(Default)]
pub struct MockTokenManager {
    tokens: Mutex<HashMap<String, TokenRecord>>,
    results: Mutex<VecDeque<Result<Option<TokenRecord>, SmartHomeError>>>,
    get_history: Mutex<Vec<(String, bool)>>,
    issue_history: Mutex<Vec<(String, String)>>,
    next_issue_error: Mutex<Option<SmartHomeError>>,
}

impl MockTokenManager {
    /// Create new mock token manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a token.
    pub fn add_token(&self, uid: &str, record: TokenRecord) -> &Self {
        self.tokens.lock().insert(uid.to_string(), record);
        self
    }

    /// Queue a result for the next `get_valid_token` call.
    pub fn queue_result(&self, result: Result<Option<TokenRecord>, SmartHomeError>) -> &Self {
        self.results.lock().push_back(result);
        self
    }

    /// Fail the next `issue_by_authorization_code` call.
    pub fn set_next_issue_error(&self, error: SmartHomeError) -> &Self {
        *self.next_issue_error.lock() = Some(error);
        self
    }

    /// `(uid, force_refresh)` of every `get_valid_token` call.
    pub fn get_history(&self) -> Vec<(String, bool)> {
        self.get_history.lock().clone()
    }

    /// `(uid, code)` of every `issue_by_authorization_code` call.
    pub fn get_issue_history(&self) -> Vec<(String, String)> {
        self.issue_history.lock().clone()
    }
}

#[async_trait]
impl TokenManager for MockTokenManager {
    async fn get_valid_token(
        &self,
        uid: &str,
        force_refresh: bool,
    ) -> Result<Option<TokenRecord>, SmartHomeError> {
        self.get_history
            .lock()
            .push((uid.to_string(), force_refresh));

        if let Some(result) = self.results.lock().pop_front() {
            return result;
        }

        Ok(self.tokens.lock().get(uid).cloned())
    }

    async fn issue_by_authorization_code(
        &self,
        uid: &str,
        code: &str,
    ) -> Result<TokenRecord, SmartHomeError> {
        self.issue_history
            .lock()
            .push((uid.to_string(), code.to_string()));

        if let Some(error) = self.next_issue_error.lock().take() {
            return Err(error);
        }

        let record = TokenRecord {
            access_token: format!("Atza|{}", code),
            refresh_token: format!("Atzr|{}", code),
            token_type: "bearer".to_string(),
            expires_in: 3600,
            access_token_timestamp: 0,
        };
        self.tokens.lock().insert(uid.to_string(), record.clone());
        Ok(record)
    }
}

/// Create mock token manager for testing.
pub fn create_mock_token_manager() -> MockTokenManager {
    MockTokenManager::new()
}
