//! Token Storage
//!
//! Persistence of LWA token records, one per user, in a key-value table.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{SmartHomeError, StorageError};
use crate::store::{Item, ItemKey, KeyValueStore};
use crate::types::TokenRecord;

/// Token storage interface.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Retrieve the record for a user.
    async fn retrieve(&self, uid: &str) -> Result<Option<TokenRecord>, SmartHomeError>;

    /// Store a refreshed record, replacing every token field.
    async fn store(&self, uid: &str, record: &TokenRecord) -> Result<(), SmartHomeError>;

    /// Store a record issued from an authorization code, overwriting any prior record.
    async fn store_with_code(
        &self,
        uid: &str,
        record: &TokenRecord,
        code: &str,
    ) -> Result<(), SmartHomeError>;

    /// Delete the record for a user. Returns whether it existed.
    async fn delete(&self, uid: &str) -> Result<bool, SmartHomeError>;
}

/// Token storage over a [`KeyValueStore`] table keyed by `uid`.
pub struct KeyValueTokenStorage<S> {
    store: S,
    table: String,
}

impl<S: KeyValueStore> KeyValueTokenStorage<S> {
    pub fn new(store: S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    fn to_item(record: &TokenRecord) -> Result<Item, SmartHomeError> {
        match serde_json::to_value(record) {
            Ok(Value::Object(item)) => Ok(item),
            Ok(_) => Err(SmartHomeError::Storage(StorageError::WriteFailed {
                message: "token record did not serialize to an object".to_string(),
            })),
            Err(e) => Err(SmartHomeError::Storage(StorageError::WriteFailed {
                message: e.to_string(),
            })),
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> TokenStorage for KeyValueTokenStorage<S> {
    async fn retrieve(&self, uid: &str) -> Result<Option<TokenRecord>, SmartHomeError> {
        let Some(item) = self.store.get(&self.table, &ItemKey::partition(uid)).await? else {
            return Ok(None);
        };

        // Extra attributes (uid, code) are ignored; a missing token field is not.
        serde_json::from_value(Value::Object(item))
            .map(Some)
            .map_err(|e| {
                SmartHomeError::Storage(StorageError::CorruptedData {
                    message: format!("token record for {}: {}", uid, e),
                })
            })
    }

    async fn store(&self, uid: &str, record: &TokenRecord) -> Result<(), SmartHomeError> {
        let key = ItemKey::partition(uid);
        let attributes = Self::to_item(record)?;

        // Keep the audit `code` from issuance when the record is still there.
        match self
            .store
            .update_existing(&self.table, &key, attributes.clone())
            .await
        {
            Err(SmartHomeError::Storage(StorageError::ConditionalCheckFailed { .. })) => {
                debug!(uid, "Token record vanished before refresh was saved, recreating");
                let mut item = attributes;
                item.insert("uid".to_string(), Value::String(uid.to_string()));
                self.store.put(&self.table, &key, item).await
            }
            other => other,
        }
    }

    async fn store_with_code(
        &self,
        uid: &str,
        record: &TokenRecord,
        code: &str,
    ) -> Result<(), SmartHomeError> {
        let mut item = Self::to_item(record)?;
        item.insert("uid".to_string(), Value::String(uid.to_string()));
        item.insert("code".to_string(), Value::String(code.to_string()));

        self.store
            .put(&self.table, &ItemKey::partition(uid), item)
            .await
    }

    async fn delete(&self, uid: &str) -> Result<bool, SmartHomeError> {
        self.store
            .delete(&self.table, &ItemKey::partition(uid))
            .await
    }
}
