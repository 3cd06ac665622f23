//! User Identity
//!
//! Resolves the `uid` of a request from the subject claim of its bearer token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::error::{DirectiveError, SmartHomeError};

#[derive(Deserialize)]
struct Claims {
    sub: Option<String>,
}

fn invalid(message: impl Into<String>) -> SmartHomeError {
    SmartHomeError::Directive(DirectiveError::InvalidBearerToken {
        message: message.into(),
    })
}

/// Extract the `sub` claim of a JWT bearer token.
///
/// The signature is not checked: the token was issued to Alexa by the account
/// linking provider and only identifies the user here.
pub fn subject_from_bearer_token(token: &str) -> Result<String, SmartHomeError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => return Err(invalid("bearer token is not a JWT")),
    };

    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| invalid(format!("bearer token payload is not base64url: {}", e)))?;

    let claims: Claims = serde_json::from_slice(&decoded)
        .map_err(|e| invalid(format!("bearer token payload is not JSON: {}", e)))?;

    match claims.sub {
        Some(sub) if !sub.is_empty() => Ok(sub),
        _ => Err(invalid("bearer token has no subject")),
    }
}

#[cfg(test)]
pub(crate) fn test_token(sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{}","aud":"skill"}}"#, sub));
    format!("{}.{}.c2lnbmF0dXJl", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_extracted() {
        assert_eq!(
            subject_from_bearer_token(&test_token("user-42")).unwrap(),
            "user-42"
        );
    }

    #[test]
    fn test_padded_payload_accepted() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"sub":"abcd"}"#);
        assert_eq!(payload, "eyJzdWIiOiJhYmNkIn0=");
        let token = format!("h.{}.s", payload);
        assert_eq!(subject_from_bearer_token(&token).unwrap(), "abcd");
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        for token in ["", "opaque-token", "a.b", "a.!!!.c"] {
            assert!(matches!(
                subject_from_bearer_token(token),
                Err(SmartHomeError::Directive(DirectiveError::InvalidBearerToken { .. }))
            ));
        }

        let no_sub = format!("h.{}.s", URL_SAFE_NO_PAD.encode(br#"{"aud":"x"}"#));
        assert!(subject_from_bearer_token(&no_sub).is_err());
    }
}
