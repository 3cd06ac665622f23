//! Endpoint Reports
//!
//! Device-side changes pushed to Alexa: endpoints added or removed, and power
//! state changes made outside of a directive.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::SmartHomeError;
use crate::gateway::EventNotifier;
use crate::store::{DeviceStatus, DeviceStatusStore, POWER_STATE};
use crate::types::{CauseType, EndpointDescription, PowerState, Property};

/// Reports endpoint changes for a user.
pub struct EndpointReporter<D: DeviceStatusStore, N: EventNotifier> {
    devices: Arc<D>,
    notifier: Arc<N>,
}

impl<D: DeviceStatusStore, N: EventNotifier> EndpointReporter<D, N> {
    pub fn new(devices: Arc<D>, notifier: Arc<N>) -> Self {
        Self { devices, notifier }
    }

    /// Register a new endpoint, switched off, and announce it.
    #[instrument(skip(self, endpoint), fields(endpoint_id = %endpoint.endpoint_id))]
    pub async fn add_endpoint(
        &self,
        uid: &str,
        endpoint: EndpointDescription,
    ) -> Result<(), SmartHomeError> {
        let mut status = DeviceStatus::new();
        status.insert(
            POWER_STATE.to_string(),
            Value::String(PowerState::Off.to_string()),
        );
        self.devices
            .register(uid, &endpoint.endpoint_id, &status)
            .await?;

        self.notifier
            .notify_add_or_update_report(uid, std::slice::from_ref(&endpoint))
            .await?;

        info!("Endpoint added");
        Ok(())
    }

    /// Announce that an endpoint was removed.
    #[instrument(skip(self))]
    pub async fn delete_endpoint(
        &self,
        uid: &str,
        endpoint_id: &str,
    ) -> Result<(), SmartHomeError> {
        self.notifier
            .notify_delete_report(uid, &[endpoint_id.to_string()])
            .await?;

        info!("Endpoint deleted");
        Ok(())
    }

    /// Store a power state changed on the device and report it.
    #[instrument(skip(self))]
    pub async fn report_power_state(
        &self,
        uid: &str,
        endpoint_id: &str,
        state: PowerState,
    ) -> Result<(), SmartHomeError> {
        let mut status = self.devices.get(uid, endpoint_id).await?;
        status.insert(POWER_STATE.to_string(), Value::String(state.to_string()));
        self.devices.update(uid, endpoint_id, status).await?;

        let properties = vec![Property::power_state(state.as_str(), Utc::now())];
        self.notifier
            .notify_change_report(
                uid,
                endpoint_id,
                CauseType::PhysicalInteraction,
                properties.clone(),
                properties,
            )
            .await?;

        info!("Power state reported");
        Ok(())
    }
}
