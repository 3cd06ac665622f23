//! Token Types
//!
//! LWA token response and the persisted token record.

use serde::{Deserialize, Serialize};

/// Fraction of the token lifetime after which a cached token is refreshed.
pub const REFRESH_RATIO_NUMERATOR: u64 = 8;
pub const REFRESH_RATIO_DENOMINATOR: u64 = 10;

/// Token response from the LWA token endpoint.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// Token type (LWA returns "bearer").
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

impl TokenResponse {
    /// Stamp the response with the time the exchange started.
    pub fn into_record(self, access_token_timestamp: i64) -> TokenRecord {
        TokenRecord {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            access_token_timestamp,
        }
    }
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Token record persisted per user.
///
/// All five fields are always present together; a stored item missing any of
/// them is treated as corrupted rather than partially loaded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    /// Unix epoch seconds at which the exchange that produced this token started.
    pub access_token_timestamp: i64,
}

impl TokenRecord {
    /// Unix epoch seconds from which the token is considered stale.
    ///
    /// Tokens are refreshed at 80% of their lifetime rather than at expiry so that
    /// in-flight requests and clock skew do not race the real expiration.
    pub fn refresh_at(&self) -> i64 {
        let threshold = self.expires_in.saturating_mul(REFRESH_RATIO_NUMERATOR)
            / REFRESH_RATIO_DENOMINATOR;
        self.access_token_timestamp
            .saturating_add(i64::try_from(threshold).unwrap_or(i64::MAX))
    }

    /// Check if the token should be refreshed at `now` (unix epoch seconds).
    pub fn is_stale(&self, now: i64) -> bool {
        now >= self.refresh_at()
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("access_token_timestamp", &self.access_token_timestamp)
            .finish()
    }
}
