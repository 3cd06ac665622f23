//! Smart Home Types
//!
//! Configuration, token, and Alexa message type definitions.

pub mod config;
pub mod directive;
pub mod event;
pub mod token;

pub use config::*;
pub use directive::*;
pub use event::EventMessage;
pub use token::*;
