//! Device Status Store
//!
//! Per-user device status records keyed by `(uid, device_id)`. The status map is
//! stored as an opaque JSON string.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{Item, ItemKey, KeyValueStore};
use crate::error::{EndpointError, SmartHomeError, StorageError};

/// Status attribute carrying the power state of a switchable device.
pub const POWER_STATE: &str = "powerState";

/// Free-form device status, e.g. `{"powerState": "ON"}`.
pub type DeviceStatus = serde_json::Map<String, Value>;

/// Device status persistence interface.
#[async_trait]
pub trait DeviceStatusStore: Send + Sync {
    /// Create or replace the device record.
    async fn register(
        &self,
        uid: &str,
        device_id: &str,
        status: &DeviceStatus,
    ) -> Result<(), SmartHomeError>;

    /// Read the device status. Fails with `EndpointError::NoSuchEndpoint` when absent.
    async fn get(&self, uid: &str, device_id: &str) -> Result<DeviceStatus, SmartHomeError>;

    /// Replace the status of an existing device and return the new status.
    ///
    /// Fails with `EndpointError::NoSuchEndpoint` when the device was never
    /// registered; no record is created.
    async fn update(
        &self,
        uid: &str,
        device_id: &str,
        status: DeviceStatus,
    ) -> Result<DeviceStatus, SmartHomeError>;
}

/// Device status store over a [`KeyValueStore`] table.
pub struct KeyValueDeviceStore<S> {
    store: S,
    table: String,
}

impl<S: KeyValueStore> KeyValueDeviceStore<S> {
    pub fn new(store: S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    fn no_such_endpoint(uid: &str, device_id: &str) -> SmartHomeError {
        SmartHomeError::Endpoint(EndpointError::NoSuchEndpoint {
            uid: uid.to_string(),
            endpoint_id: device_id.to_string(),
        })
    }

    fn encode(status: &DeviceStatus) -> Value {
        Value::String(Value::Object(status.clone()).to_string())
    }

    fn decode(item: &Item) -> Result<DeviceStatus, SmartHomeError> {
        let raw = item.get("status").and_then(Value::as_str).ok_or_else(|| {
            SmartHomeError::Storage(StorageError::CorruptedData {
                message: "device record has no status".to_string(),
            })
        })?;

        serde_json::from_str(raw).map_err(|e| {
            SmartHomeError::Storage(StorageError::CorruptedData {
                message: format!("device status is not a JSON object: {}", e),
            })
        })
    }
}

#[async_trait]
impl<S: KeyValueStore> DeviceStatusStore for KeyValueDeviceStore<S> {
    async fn register(
        &self,
        uid: &str,
        device_id: &str,
        status: &DeviceStatus,
    ) -> Result<(), SmartHomeError> {
        let mut item = Item::new();
        item.insert("uid".to_string(), Value::String(uid.to_string()));
        item.insert("device_id".to_string(), Value::String(device_id.to_string()));
        item.insert("status".to_string(), Self::encode(status));

        debug!(uid, device_id, "Registering device");
        self.store
            .put(&self.table, &ItemKey::composite(uid, device_id), item)
            .await
    }

    async fn get(&self, uid: &str, device_id: &str) -> Result<DeviceStatus, SmartHomeError> {
        let item = self
            .store
            .get(&self.table, &ItemKey::composite(uid, device_id))
            .await?
            .ok_or_else(|| Self::no_such_endpoint(uid, device_id))?;

        Self::decode(&item)
    }

    async fn update(
        &self,
        uid: &str,
        device_id: &str,
        status: DeviceStatus,
    ) -> Result<DeviceStatus, SmartHomeError> {
        let mut attributes = Item::new();
        attributes.insert("status".to_string(), Self::encode(&status));

        match self
            .store
            .update_existing(&self.table, &ItemKey::composite(uid, device_id), attributes)
            .await
        {
            Ok(()) => Ok(status),
            Err(SmartHomeError::Storage(StorageError::ConditionalCheckFailed { .. })) => {
                Err(Self::no_such_endpoint(uid, device_id))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::InMemoryKeyValueStore;
    use serde_json::json;
    use std::sync::Arc;

    fn status(value: Value) -> DeviceStatus {
        value.as_object().cloned().unwrap()
    }

    type TestDevices = KeyValueDeviceStore<Arc<InMemoryKeyValueStore>>;

    fn device_store() -> (Arc<InMemoryKeyValueStore>, TestDevices) {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        (kv.clone(), KeyValueDeviceStore::new(kv, "devices"))
    }

    #[tokio::test]
    async fn test_register_then_get_returns_same_status() {
        let (_, store) = device_store();
        let registered = status(json!({"powerState": "OFF", "brightness": 40}));

        store.register("user-1", "lamp", &registered).await.unwrap();

        assert_eq!(store.get("user-1", "lamp").await.unwrap(), registered);
    }

    #[tokio::test]
    async fn test_status_stored_as_json_string() {
        let (kv, store) = device_store();
        store
            .register("user-1", "lamp", &status(json!({"powerState": "ON"})))
            .await
            .unwrap();

        let item = kv
            .get("devices", &ItemKey::composite("user-1", "lamp"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.get("uid"), Some(&json!("user-1")));
        assert_eq!(item.get("device_id"), Some(&json!("lamp")));
        assert_eq!(item.get("status"), Some(&json!(r#"{"powerState":"ON"}"#)));
    }

    #[tokio::test]
    async fn test_get_missing_device_is_no_such_endpoint() {
        let (_, store) = device_store();
        let error = store.get("user-1", "ghost").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_existing_device() {
        let (_, store) = device_store();
        store
            .register("user-1", "lamp", &status(json!({"powerState": "OFF"})))
            .await
            .unwrap();

        let updated = store
            .update("user-1", "lamp", status(json!({"powerState": "ON"})))
            .await
            .unwrap();

        assert_eq!(updated.get(POWER_STATE), Some(&json!("ON")));
        assert_eq!(store.get("user-1", "lamp").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_missing_device_creates_nothing() {
        let (kv, store) = device_store();

        let error = store
            .update("user-1", "ghost", status(json!({"powerState": "ON"})))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            SmartHomeError::Endpoint(EndpointError::NoSuchEndpoint { .. })
        ));
        assert_eq!(kv.len("devices"), 0);
    }

    #[tokio::test]
    async fn test_corrupted_status_reported() {
        let (kv, store) = device_store();
        let mut item = Item::new();
        item.insert("status".to_string(), json!("not json"));
        kv.put("devices", &ItemKey::composite("user-1", "lamp"), item)
            .await
            .unwrap();

        assert!(matches!(
            store.get("user-1", "lamp").await,
            Err(SmartHomeError::Storage(StorageError::CorruptedData { .. }))
        ));
    }
}
