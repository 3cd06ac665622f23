//! Token Management
//!
//! LWA token lifecycle: persistence of per-user token records and refresh on demand.

pub mod manager;
pub mod storage;

pub use manager::{create_mock_token_manager, DefaultTokenManager, MockTokenManager, TokenManager};
pub use storage::{KeyValueTokenStorage, TokenStorage};
