//! Event Gateway
//!
//! Proactive event delivery to Alexa.

pub mod notifier;

pub use notifier::{EventGatewayNotifier, EventNotifier, STATUS_ACCEPTED};
