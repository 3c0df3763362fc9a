//! Unverified decoding of compact token claims.
//!
//! Only the payload segment of `header.payload.signature` is read. The
//! signature is not checked here; the party that issued the token and the
//! services that accept it are the ones that verify it.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};

/// Standard alphabet that tolerates missing padding and trailing bits.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Identity claims, in the order they are consulted.
const IDENTITY_CLAIMS: [&str; 3] = ["upn", "email", "preferred_username"];

/// The decoded payload object of a compact token.
#[derive(Debug, Clone, PartialEq)]
pub struct JwtClaims {
    claims: Map<String, Value>,
}

impl JwtClaims {
    /// The `upn` claim, if present as a string.
    pub fn upn(&self) -> Option<&str> {
        self.string_claim("upn")
    }

    /// The `email` claim, if present as a string.
    pub fn email(&self) -> Option<&str> {
        self.string_claim("email")
    }

    /// The `preferred_username` claim, if present as a string.
    pub fn preferred_username(&self) -> Option<&str> {
        self.string_claim("preferred_username")
    }

    /// First non-empty of `upn`, `email`, `preferred_username`.
    pub fn resolved_identity(&self) -> Option<&str> {
        IDENTITY_CLAIMS
            .iter()
            .filter_map(|name| self.string_claim(name))
            .find(|value| !value.is_empty())
    }

    /// Any claim by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    fn string_claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }
}

/// Decode the payload segment of `token`.
///
/// Returns `None` if the token has no second segment, the segment is not
/// base64, the bytes are not UTF-8, or the text is not a JSON object.
pub fn decode_claims(token: &str) -> Option<JwtClaims> {
    let Some(segment) = token.split('.').nth(1) else {
        tracing::debug!("token has no payload segment");
        return None;
    };

    let standard: String = segment
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let bytes = match LENIENT_STANDARD.decode(standard) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "token payload is not base64");
            return None;
        }
    };

    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, "token payload is not UTF-8");
            return None;
        }
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(claims)) => Some(JwtClaims { claims }),
        Ok(_) => {
            tracing::debug!("token payload is JSON but not an object");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "token payload is not JSON");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
