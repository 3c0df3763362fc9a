//! Provider configuration and authorization URL construction.
//!
//! The authorization URL is the only thing this crate sends to the identity
//! provider directly; the browser navigates to it and the provider answers
//! by redirecting to `redirect_uri` with `?code=...&state=...`.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthFlowError, Result};

/// Fixed `response_type` for the authorization code grant.
const RESPONSE_TYPE: &str = "code";

/// Forces the provider's account picker even when a session exists.
const PROMPT: &str = "select_account";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Static OAuth settings for the single identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// The OAuth client ID.
    pub client_id: String,

    /// The redirect URI registered with the provider.
    pub redirect_uri: String,

    /// Identifier of the resource the token is requested for.
    pub resource_id: String,

    /// Value sent as the `state` parameter.
    pub state_parameter: String,

    /// The provider's authorization endpoint.
    pub authorization_endpoint: String,

    /// The intermediary's code-for-token exchange endpoint.
    pub token_exchange_endpoint: String,
}

impl OAuthConfig {
    /// Check that every field is set and the URLs are absolute.
    ///
    /// # Errors
    ///
    /// Returns [`AuthFlowError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("client_id", &self.client_id),
            ("redirect_uri", &self.redirect_uri),
            ("resource_id", &self.resource_id),
            ("state_parameter", &self.state_parameter),
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_exchange_endpoint", &self.token_exchange_endpoint),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(AuthFlowError::InvalidConfig {
                    reason: format!("oauth.{name} must not be empty"),
                });
            }
        }

        for (name, value) in [
            ("redirect_uri", &self.redirect_uri),
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_exchange_endpoint", &self.token_exchange_endpoint),
        ] {
            // `Url::parse` only accepts absolute URLs.
            Url::parse(value).map_err(|e| AuthFlowError::InvalidConfig {
                reason: format!("oauth.{name} is not an absolute URL: {e}"),
            })?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// URL builder
// ---------------------------------------------------------------------------

/// Build the URL the authorization popup navigates to.
///
/// Parameters are appended in a fixed order (`client_id`, `response_type`,
/// `redirect_uri`, `resource`, `state`, `prompt`, `login_hint`) and each
/// value is form-encoded. Query parameters already present on the endpoint
/// are preserved ahead of them.
///
/// # Errors
///
/// Returns [`AuthFlowError::UrlParse`] if `authorization_endpoint` is not a
/// valid URL.
pub fn authorization_url(config: &OAuthConfig, email: &str) -> Result<String> {
    let mut url = Url::parse(&config.authorization_endpoint)?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("client_id", &config.client_id);
        params.append_pair("response_type", RESPONSE_TYPE);
        params.append_pair("redirect_uri", &config.redirect_uri);
        params.append_pair("resource", &config.resource_id);
        params.append_pair("state", &config.state_parameter);
        params.append_pair("prompt", PROMPT);
        params.append_pair("login_hint", email);
    }

    Ok(url.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
