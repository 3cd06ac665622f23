//! OAuth2 Flows
//!
//! The two grants the skill backend performs against Login With Amazon.

pub mod token_exchange;

pub use token_exchange::{
    LwaTokenClient, MockTokenClient, TokenClient, TokenExchange, FORM_CONTENT_TYPE,
};
