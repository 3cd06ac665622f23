//! Key-Value Store
//!
//! Generic partitioned-table interface used to persist token records and device
//! status, with an in-memory implementation and a mock for testing.

pub mod devices;

pub use devices::{DeviceStatus, DeviceStatusStore, KeyValueDeviceStore, POWER_STATE};

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{SmartHomeError, StorageError};

/// Stored item: attribute name to value.
pub type Item = serde_json::Map<String, serde_json::Value>;

/// Primary key of an item: partition key plus optional sort key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub partition: String,
    pub sort: Option<String>,
}

impl ItemKey {
    /// Key for a table with only a partition key.
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    /// Key for a table with partition and sort keys.
    pub fn composite(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sort {
            Some(sort) => write!(f, "{}#{}", self.partition, sort),
            None => f.write_str(&self.partition),
        }
    }
}

/// Key-value store interface.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get an item.
    async fn get(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, SmartHomeError>;

    /// Put an item, replacing any existing item with the same key.
    async fn put(&self, table: &str, key: &ItemKey, item: Item) -> Result<(), SmartHomeError>;

    /// Set attributes on an existing item.
    ///
    /// Fails with `StorageError::ConditionalCheckFailed` when no item exists for the
    /// key; never creates one.
    async fn update_existing(
        &self,
        table: &str,
        key: &ItemKey,
        attributes: Item,
    ) -> Result<(), SmartHomeError>;

    /// Delete an item. Returns whether it existed.
    async fn delete(&self, table: &str, key: &ItemKey) -> Result<bool, SmartHomeError>;
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    async fn get(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, SmartHomeError> {
        (**self).get(table, key).await
    }

    async fn put(&self, table: &str, key: &ItemKey, item: Item) -> Result<(), SmartHomeError> {
        (**self).put(table, key, item).await
    }

    async fn update_existing(
        &self,
        table: &str,
        key: &ItemKey,
        attributes: Item,
    ) -> Result<(), SmartHomeError> {
        (**self).update_existing(table, key, attributes).await
    }

    async fn delete(&self, table: &str, key: &ItemKey) -> Result<bool, SmartHomeError> {
        (**self).delete(table, key).await
    }
}

type TableMap = HashMap<(String, ItemKey), Item>;

/// In-memory key-value store implementation.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    items: Mutex<TableMap>,
}

impl InMemoryKeyValueStore {
    /// Create new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items in a table.
    pub fn len(&self, table: &str) -> usize {
        self.items.lock().keys().filter(|(t, _)| t == table).count()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, SmartHomeError> {
        Ok(self
            .items
            .lock()
            .get(&(table.to_string(), key.clone()))
            .cloned())
    }

    async fn put(&self, table: &str, key: &ItemKey, item: Item) -> Result<(), SmartHomeError> {
        self.items
            .lock()
            .insert((table.to_string(), key.clone()), item);
        Ok(())
    }

    async fn update_existing(
        &self,
        table: &str,
        key: &ItemKey,
        attributes: Item,
    ) -> Result<(), SmartHomeError> {
        let mut items = self.items.lock();
        match items.get_mut(&(table.to_string(), key.clone())) {
            Some(item) => {
                item.extend(attributes);
                Ok(())
            }
            None => Err(SmartHomeError::Storage(
                StorageError::ConditionalCheckFailed {
                    table: table.to_string(),
                    key: key.to_string(),
                },
            )),
        }
    }

    async fn delete(&self, table: &str, key: &ItemKey) -> Result<bool, SmartHomeError> {
        Ok(self
            .items
            .lock()
            .remove(&(table.to_string(), key.clone()))
            .is_some())
    }
}

/// Store operation recorded by [`MockKeyValueStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreOperation {
    Get(String, ItemKey),
    Put(String, ItemKey),
    Update(String, ItemKey),
    Delete(String, ItemKey),
}

/// Mock key-value store for testing: in-memory behavior plus history and failure injection.
#[derive(Default)]
pub struct MockKeyValueStore {
    inner: InMemoryKeyValueStore,
    history: Mutex<Vec<StoreOperation>>,
    next_error: Mutex<Option<SmartHomeError>>,
    fail_deletes: Mutex<bool>,
    should_fail: Mutex<bool>,
}

impl MockKeyValueStore {
    /// Create new mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next operation with `error`.
    pub fn set_next_error(&self, error: SmartHomeError) -> &Self {
        *self.next_error.lock() = Some(error);
        self
    }

    /// Fail every delete.
    pub fn set_fail_deletes(&self, fail: bool) -> &Self {
        *self.fail_deletes.lock() = fail;
        self
    }

    /// Fail every operation.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *self.should_fail.lock() = should_fail;
        self
    }

    /// Operation history.
    pub fn get_history(&self) -> Vec<StoreOperation> {
        self.history.lock().clone()
    }

    /// Underlying in-memory store.
    pub fn inner(&self) -> &InMemoryKeyValueStore {
        &self.inner
    }

    fn check_error(&self, operation: StoreOperation) -> Result<(), SmartHomeError> {
        let is_delete = matches!(operation, StoreOperation::Delete(..));
        self.history.lock().push(operation);

        if *self.should_fail.lock() {
            return Err(SmartHomeError::Storage(StorageError::WriteFailed {
                message: "Mock storage failure".to_string(),
            }));
        }

        if is_delete && *self.fail_deletes.lock() {
            return Err(SmartHomeError::Storage(StorageError::DeleteFailed {
                message: "Mock delete failure".to_string(),
            }));
        }

        if let Some(error) = self.next_error.lock().take() {
            return Err(error);
        }

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MockKeyValueStore {
    async fn get(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, SmartHomeError> {
        self.check_error(StoreOperation::Get(table.to_string(), key.clone()))?;
        self.inner.get(table, key).await
    }

    async fn put(&self, table: &str, key: &ItemKey, item: Item) -> Result<(), SmartHomeError> {
        self.check_error(StoreOperation::Put(table.to_string(), key.clone()))?;
        self.inner.put(table, key, item).await
    }

    async fn update_existing(
        &self,
        table: &str,
        key: &ItemKey,
        attributes: Item,
    ) -> Result<(), SmartHomeError> {
        self.check_error(StoreOperation::Update(table.to_string(), key.clone()))?;
        self.inner.update_existing(table, key, attributes).await
    }

    async fn delete(&self, table: &str, key: &ItemKey) -> Result<bool, SmartHomeError> {
        self.check_error(StoreOperation::Delete(table.to_string(), key.clone()))?;
        self.inner.delete(table, key).await
    }
}

/// Process-lifetime store handle, created on first use and shared afterwards.
///
/// Usable in a `static`; concurrent first calls race to initialize but only one
/// value is ever kept.
pub struct StoreHandle<S> {
    cell: OnceCell<Arc<S>>,
}

impl<S> StoreHandle<S> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Get the store, creating it with `init` on first use.
    pub fn get_or_init<F>(&self, init: F) -> Arc<S>
    where
        F: FnOnce() -> S,
    {
        self.cell.get_or_init(|| Arc::new(init())).clone()
    }

    /// Get the store if it has been created.
    pub fn get(&self) -> Option<Arc<S>> {
        self.cell.get().cloned()
    }
}

impl<S> Default for StoreHandle<S> {
    fn default() -> Self {
        Self::new()
    }
}
