//! Directive Handler
//!
//! Answers Alexa smart-home directives from device storage and the token manager.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::identity::subject_from_bearer_token;
use crate::error::{DirectiveError, EndpointError, SmartHomeError};
use crate::store::{DeviceStatusStore, POWER_STATE};
use crate::token::TokenManager;
use crate::types::{
    AcceptGrantPayload, AlexaErrorType, AlexaRequest, AlexaResponse, Context, Directive,
    Endpoint, EndpointDescription, ErrorPayload, Event, Header, PowerState, Property, Scope,
    NAMESPACE_ALEXA, NAMESPACE_AUTHORIZATION, NAMESPACE_DISCOVERY, NAMESPACE_POWER_CONTROLLER,
};

/// Smart-home directive handler.
pub struct SmartHomeHandler<D: DeviceStatusStore, M: TokenManager> {
    devices: Arc<D>,
    tokens: Arc<M>,
    catalog: Vec<EndpointDescription>,
}

impl<D: DeviceStatusStore, M: TokenManager> SmartHomeHandler<D, M> {
    /// Create a handler answering discovery with `catalog`.
    pub fn new(devices: Arc<D>, tokens: Arc<M>, catalog: Vec<EndpointDescription>) -> Self {
        Self {
            devices,
            tokens,
            catalog,
        }
    }

    /// Endpoints returned by discovery.
    pub fn catalog(&self) -> &[EndpointDescription] {
        &self.catalog
    }

    /// Handle a directive. Failures are answered with an `ErrorResponse`.
    #[instrument(
        skip_all,
        fields(
            namespace = %request.directive.header.namespace,
            name = %request.directive.header.name,
            message_id = %request.directive.header.message_id,
        )
    )]
    pub async fn handle(&self, request: AlexaRequest) -> AlexaResponse {
        let directive = &request.directive;
        let header = &directive.header;

        let result = match (header.namespace.as_str(), header.name.as_str()) {
            (NAMESPACE_DISCOVERY, "Discover") => Ok(self.discover(header)),
            (NAMESPACE_POWER_CONTROLLER, "TurnOn") => {
                self.set_power_state(directive, PowerState::On).await
            }
            (NAMESPACE_POWER_CONTROLLER, "TurnOff") => {
                self.set_power_state(directive, PowerState::Off).await
            }
            (NAMESPACE_AUTHORIZATION, "AcceptGrant") => return self.accept_grant(directive).await,
            (NAMESPACE_ALEXA, "ReportState") => self.report_state(directive).await,
            (namespace, name) => Err(SmartHomeError::Directive(DirectiveError::Unsupported {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })),
        };

        result.unwrap_or_else(|error| {
            warn!(error = %error, "Directive failed");
            error_response(directive, &error)
        })
    }

    fn discover(&self, header: &Header) -> AlexaResponse {
        debug!(endpoints = self.catalog.len(), "Answering discovery");
        AlexaResponse {
            context: None,
            event: Event {
                header: header.reply(NAMESPACE_DISCOVERY, "Discover.Response"),
                endpoint: None,
                payload: json!({ "endpoints": self.catalog }),
            },
        }
    }

    async fn set_power_state(
        &self,
        directive: &Directive,
        state: PowerState,
    ) -> Result<AlexaResponse, SmartHomeError> {
        let (endpoint, token) = addressed_endpoint(directive)?;
        let uid = subject_from_bearer_token(token)?;

        let mut status = self.devices.get(&uid, &endpoint.endpoint_id).await?;
        status.insert(POWER_STATE.to_string(), Value::String(state.to_string()));
        self.devices
            .update(&uid, &endpoint.endpoint_id, status)
            .await?;

        debug!(
            uid = %uid,
            endpoint_id = %endpoint.endpoint_id,
            state = %state,
            "Power state changed"
        );

        let now = Utc::now();
        Ok(endpoint_response(
            directive.header.reply(NAMESPACE_ALEXA, "Response"),
            endpoint,
            token,
            vec![Property::power_state(state.as_str(), now), Property::connectivity_ok(now)],
        ))
    }

    async fn report_state(&self, directive: &Directive) -> Result<AlexaResponse, SmartHomeError> {
        let (endpoint, token) = addressed_endpoint(directive)?;
        let uid = subject_from_bearer_token(token)?;

        let status = self.devices.get(&uid, &endpoint.endpoint_id).await?;

        let now = Utc::now();
        let mut properties = Vec::new();
        if let Some(Value::String(power)) = status.get(POWER_STATE) {
            properties.push(Property::power_state(power.clone(), now));
        }
        properties.push(Property::connectivity_ok(now));

        Ok(endpoint_response(
            directive.header.reply(NAMESPACE_ALEXA, "StateReport"),
            endpoint,
            token,
            properties,
        ))
    }

    async fn accept_grant(&self, directive: &Directive) -> AlexaResponse {
        match self.issue_grant(directive).await {
            Ok(()) => AlexaResponse {
                context: None,
                event: Event {
                    header: directive
                        .header
                        .reply(NAMESPACE_AUTHORIZATION, "AcceptGrant.Response"),
                    endpoint: None,
                    payload: json!({}),
                },
            },
            Err(error) => {
                warn!(error = %error, "AcceptGrant failed");
                AlexaResponse {
                    context: None,
                    event: Event {
                        header: directive
                            .header
                            .reply(NAMESPACE_AUTHORIZATION, "ErrorResponse"),
                        endpoint: None,
                        payload: error_payload(AlexaErrorType::AcceptGrantFailed, &error),
                    },
                }
            }
        }
    }

    async fn issue_grant(&self, directive: &Directive) -> Result<(), SmartHomeError> {
        let payload: AcceptGrantPayload = serde_json::from_value(directive.payload.clone())
            .map_err(|e| {
                SmartHomeError::Directive(DirectiveError::Invalid {
                    message: format!("AcceptGrant payload: {}", e),
                })
            })?;

        let uid = subject_from_bearer_token(&payload.grantee.token)?;
        self.tokens
            .issue_by_authorization_code(&uid, &payload.grant.code)
            .await?;

        debug!(uid = %uid, "Grant accepted");
        Ok(())
    }
}

/// Endpoint and bearer token of a directive addressed to one endpoint.
fn addressed_endpoint(directive: &Directive) -> Result<(&Endpoint, &str), SmartHomeError> {
    let endpoint = directive.endpoint.as_ref().ok_or_else(|| {
        SmartHomeError::Directive(DirectiveError::Invalid {
            message: "directive has no endpoint".to_string(),
        })
    })?;

    let token = endpoint
        .scope
        .as_ref()
        .map(|scope| scope.token.as_str())
        .ok_or_else(|| {
            SmartHomeError::Directive(DirectiveError::InvalidBearerToken {
                message: "endpoint has no scope".to_string(),
            })
        })?;

    Ok((endpoint, token))
}

fn endpoint_response(
    header: Header,
    endpoint: &Endpoint,
    token: &str,
    properties: Vec<Property>,
) -> AlexaResponse {
    AlexaResponse {
        context: Some(Context { properties }),
        event: Event {
            header,
            endpoint: Some(Endpoint {
                scope: Some(Scope::bearer(token)),
                endpoint_id: endpoint.endpoint_id.clone(),
                cookie: None,
            }),
            payload: json!({}),
        },
    }
}

/// Alexa error type for a failed directive.
pub fn error_type_for(error: &SmartHomeError) -> AlexaErrorType {
    match error {
        SmartHomeError::Endpoint(EndpointError::NoSuchEndpoint { .. }) => {
            AlexaErrorType::NoSuchEndpoint
        }
        SmartHomeError::Directive(DirectiveError::InvalidBearerToken { .. }) => {
            AlexaErrorType::InvalidAuthorizationCredential
        }
        SmartHomeError::Directive(DirectiveError::Unsupported { .. })
        | SmartHomeError::Directive(DirectiveError::Invalid { .. }) => {
            AlexaErrorType::InvalidDirective
        }
        _ => AlexaErrorType::InternalError,
    }
}

fn error_payload(error_type: AlexaErrorType, error: &SmartHomeError) -> Value {
    serde_json::to_value(ErrorPayload {
        error_type,
        message: error.to_string(),
    })
    .unwrap_or(Value::Null)
}

/// `Alexa.ErrorResponse` answering `directive`.
pub fn error_response(directive: &Directive, error: &SmartHomeError) -> AlexaResponse {
    AlexaResponse {
        context: None,
        event: Event {
            header: directive.header.reply(NAMESPACE_ALEXA, "ErrorResponse"),
            endpoint: directive.endpoint.as_ref().map(|endpoint| Endpoint {
                scope: endpoint.scope.clone(),
                endpoint_id: endpoint.endpoint_id.clone(),
                cookie: None,
            }),
            payload: error_payload(error_type_for(error), error),
        },
    }
}
