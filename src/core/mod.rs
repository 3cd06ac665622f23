//! Core Components
//!
//! Core infrastructure shared by the token lifecycle and the notifier.

pub mod clock;
pub mod transport;

pub use clock::*;
pub use transport::*;
