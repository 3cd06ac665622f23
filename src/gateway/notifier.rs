//! Event Gateway Notifier
//!
//! Delivers proactive events to the Alexa event gateway on behalf of a user,
//! refreshing the user's token and resending as the gateway requires.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::core::{HttpRequest, HttpTransport};
use crate::error::{create_gateway_error, ErrorKind, SmartHomeError};
use crate::resilience::RetryConfig;
use crate::token::TokenManager;
use crate::types::event::{add_or_update_report, change_report, delete_report};
use crate::types::{CauseType, EndpointDescription, EventMessage, Property, TokenRecord};

/// Status the gateway answers an accepted event with.
pub const STATUS_ACCEPTED: u16 = 202;

/// Outbound event operations.
#[async_trait]
pub trait EventNotifier: Send + Sync {
    /// Announce new or changed endpoints.
    async fn notify_add_or_update_report(
        &self,
        uid: &str,
        endpoints: &[EndpointDescription],
    ) -> Result<(), SmartHomeError>;

    /// Announce removed endpoints.
    async fn notify_delete_report(
        &self,
        uid: &str,
        endpoint_ids: &[String],
    ) -> Result<(), SmartHomeError>;

    /// Report a state change of one endpoint.
    async fn notify_change_report(
        &self,
        uid: &str,
        endpoint_id: &str,
        cause: CauseType,
        change_properties: Vec<Property>,
        context_properties: Vec<Property>,
    ) -> Result<(), SmartHomeError>;
}

/// Delivery progress of a single event.
#[derive(Debug)]
enum DeliveryState {
    /// Sending with the cached token.
    Attempting { retries_used: u32, reauthed: bool },
    /// The gateway rejected the token; send once more with a forcibly refreshed one.
    ForcedReauth { retries_used: u32 },
    Succeeded,
    Failed(SmartHomeError),
}

/// Result of one POST.
enum Attempt {
    NoToken,
    Delivered(u16),
    Rejected {
        error: SmartHomeError,
        message: EventMessage,
    },
}

/// Event gateway client.
pub struct EventGatewayNotifier<T: HttpTransport, M: TokenManager> {
    endpoint: String,
    transport: Arc<T>,
    tokens: Arc<M>,
    retry: RetryConfig,
    timeout: Duration,
}

impl<T: HttpTransport, M: TokenManager> EventGatewayNotifier<T, M> {
    /// Create new notifier.
    pub fn new(
        endpoint: impl Into<String>,
        transport: Arc<T>,
        tokens: Arc<M>,
        retry: RetryConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport,
            tokens,
            retry,
            timeout,
        }
    }

    /// Send the event produced by `build` for `uid`.
    ///
    /// The message id is generated once and reused by every resend. A user without
    /// a stored token is skipped with a warning and `Ok(())`.
    #[instrument(skip(self, build), fields(message_id = tracing::field::Empty))]
    pub async fn notify<F>(&self, uid: &str, build: F) -> Result<(), SmartHomeError>
    where
        F: Fn(&TokenRecord, &str) -> EventMessage + Send + Sync,
    {
        let message_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("message_id", message_id.as_str());

        let mut state = DeliveryState::Attempting {
            retries_used: 0,
            reauthed: false,
        };

        loop {
            state = match state {
                DeliveryState::Attempting {
                    retries_used,
                    reauthed,
                } => {
                    match self.attempt(uid, &message_id, &build, false).await? {
                        Attempt::NoToken => return Ok(()),
                        Attempt::Delivered(status) => self.delivered(status),
                        Attempt::Rejected { error, message } => {
                            self.rejected(error, &message, retries_used, reauthed).await
                        }
                    }
                }
                DeliveryState::ForcedReauth { retries_used } => {
                    match self.attempt(uid, &message_id, &build, true).await? {
                        Attempt::NoToken => return Ok(()),
                        Attempt::Delivered(status) => self.delivered(status),
                        Attempt::Rejected { error, message } => {
                            self.rejected(error, &message, retries_used, true).await
                        }
                    }
                }
                DeliveryState::Succeeded => return Ok(()),
                DeliveryState::Failed(error) => return Err(error),
            };
        }
    }

    async fn attempt<F>(
        &self,
        uid: &str,
        message_id: &str,
        build: &F,
        force_refresh: bool,
    ) -> Result<Attempt, SmartHomeError>
    where
        F: Fn(&TokenRecord, &str) -> EventMessage + Send + Sync,
    {
        let Some(token) = self.tokens.get_valid_token(uid, force_refresh).await? else {
            warn!(uid, "Token not found for user, event not sent");
            return Ok(Attempt::NoToken);
        };

        let message = build(&token, message_id);
        let body = serde_json::to_string(&message).map_err(|e| {
            SmartHomeError::Protocol(crate::error::ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })?;

        let request = HttpRequest::post(self.endpoint.clone(), body)
            .header("Content-Type", "application/json")
            .header("Authorization", token.authorization_header())
            .timeout(self.timeout);

        debug!(uid, force_refresh, "Posting event to gateway");

        match self.transport.send(request).await {
            Ok(response) if response.is_success() => Ok(Attempt::Delivered(response.status)),
            Ok(response) => Ok(Attempt::Rejected {
                error: SmartHomeError::Gateway(create_gateway_error(
                    response.status,
                    &response.body,
                )),
                message,
            }),
            Err(error) => Ok(Attempt::Rejected { error, message }),
        }
    }

    fn delivered(&self, status: u16) -> DeliveryState {
        if status == STATUS_ACCEPTED {
            info!(status, "Event accepted by gateway");
        } else {
            warn!(status, "Unexpected success status from event gateway");
        }
        DeliveryState::Succeeded
    }

    async fn rejected(
        &self,
        error: SmartHomeError,
        message: &EventMessage,
        retries_used: u32,
        reauthed: bool,
    ) -> DeliveryState {
        match error.kind() {
            ErrorKind::Transient if retries_used < self.retry.max_retries => {
                debug!(
                    attempt = retries_used + 1,
                    max_retries = self.retry.max_retries,
                    error = %error,
                    "Resending event after transient failure"
                );
                tokio::time::sleep(self.retry.retry_delay).await;
                DeliveryState::Attempting {
                    retries_used: retries_used + 1,
                    reauthed,
                }
            }
            ErrorKind::AuthExpired if !reauthed => {
                debug!("Gateway rejected access token, forcing refresh");
                DeliveryState::ForcedReauth { retries_used }
            }
            ErrorKind::Malformed => {
                error!(
                    event = %redacted(message),
                    error = %error,
                    "Event gateway rejected malformed event"
                );
                DeliveryState::Failed(error)
            }
            _ => {
                warn!(error = %error, retries_used, "Event delivery failed");
                DeliveryState::Failed(error)
            }
        }
    }
}

/// Serialized message with bearer tokens masked.
fn redacted(message: &EventMessage) -> Value {
    let mut message = message.clone();
    if let Some(scope) = message.event.endpoint.as_mut().and_then(|e| e.scope.as_mut()) {
        scope.token = "[REDACTED]".to_string();
    }
    if let Some(token) = message.event.payload.pointer_mut("/scope/token") {
        *token = Value::String("[REDACTED]".to_string());
    }
    serde_json::to_value(&message).unwrap_or(Value::Null)
}

#[async_trait]
impl<T: HttpTransport, M: TokenManager> EventNotifier for EventGatewayNotifier<T, M> {
    async fn notify_add_or_update_report(
        &self,
        uid: &str,
        endpoints: &[EndpointDescription],
    ) -> Result<(), SmartHomeError> {
        self.notify(uid, |token, message_id| {
            add_or_update_report(message_id, &token.access_token, endpoints)
        })
        .await
    }

    async fn notify_delete_report(
        &self,
        uid: &str,
        endpoint_ids: &[String],
    ) -> Result<(), SmartHomeError> {
        self.notify(uid, |token, message_id| {
            delete_report(message_id, &token.access_token, endpoint_ids)
        })
        .await
    }

    async fn notify_change_report(
        &self,
        uid: &str,
        endpoint_id: &str,
        cause: CauseType,
        change_properties: Vec<Property>,
        context_properties: Vec<Property>,
    ) -> Result<(), SmartHomeError> {
        self.notify(uid, |token, message_id| {
            change_report(
                message_id,
                &token.access_token,
                endpoint_id,
                cause,
                change_properties.clone(),
                context_properties.clone(),
            )
        })
        .await
    }
}
