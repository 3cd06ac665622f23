//! Skill Handlers
//!
//! Inbound directive handling and outbound endpoint reports.

pub mod directive;
pub mod identity;
pub mod reports;

pub use directive::{error_response, error_type_for, SmartHomeHandler};
pub use identity::subject_from_bearer_token;
pub use reports::EndpointReporter;
