//! Error types for the login flow crate.
//!
//! Every fallible operation surfaces errors through [`AuthFlowError`]. The
//! `Display` text carries diagnostic detail intended for logs, while
//! [`AuthFlowError::user_message`] yields the fixed text that may be shown
//! to the person signing in.

use crate::controller::FlowState;

/// Broad category an [`AuthFlowError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad email format or disallowed domain.
    Validation,
    /// No authorization code could be recovered from a pasted URL.
    Extraction,
    /// The code-for-token exchange failed.
    Exchange,
    /// The returned token could not be decoded or lacks an identity.
    Claims,
    /// Configuration is missing or malformed.
    Config,
    /// An action was not valid for the current flow state.
    Flow,
}

/// Unified error type for the login flow.
#[derive(Debug, thiserror::Error)]
pub enum AuthFlowError {
    /// The submitted email was blank.
    #[error("email address is empty")]
    EmptyEmail,

    /// The submitted email failed the shape or domain check.
    #[error("email address rejected: {email}")]
    InvalidEmail {
        /// The rejected input.
        email: String,
    },

    /// The pasted redirect URL was blank.
    #[error("pasted redirect URL is empty")]
    MissingUrl,

    /// Neither structured parsing nor the fallback scan found a code.
    #[error("no authorization code found in redirect URL")]
    NoCodeFound,

    /// The HTTP request to the exchange endpoint failed in transport.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The exchange endpoint answered with a non-success status.
    #[error("exchange endpoint returned HTTP {status}: {body}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// The raw response body (never shown to the user).
        body: String,
    },

    /// The exchange endpoint answered with a body that is not JSON.
    #[error("exchange response is not valid JSON: {reason}")]
    InvalidResponseBody {
        /// Parser diagnostic.
        reason: String,
    },

    /// The exchange response was JSON but had no usable `access_token`.
    #[error("exchange response has no access_token")]
    MissingAccessToken,

    /// The token payload segment could not be decoded into a JSON object.
    #[error("token payload could not be decoded")]
    UndecodableToken,

    /// The token decoded but carries none of the identity claims.
    #[error("token carries no upn, email or preferred_username claim")]
    MissingIdentity,

    /// Configuration is missing or malformed.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The action is not accepted in the current state.
    #[error("cannot {action} while in state {state}")]
    InvalidTransition {
        /// The rejected action.
        action: &'static str,
        /// The state the controller was in.
        state: FlowState,
    },

    /// The controller was torn down and accepts no further actions.
    #[error("login flow has been torn down")]
    TornDown,

    /// The popup or browser window could not be opened.
    #[error("failed to open authorization window: {reason}")]
    PopupFailed {
        /// Launcher diagnostic.
        reason: String,
    },

    /// I/O error (config file, launcher process).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl AuthFlowError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyEmail | Self::InvalidEmail { .. } => ErrorKind::Validation,
            Self::MissingUrl | Self::NoCodeFound => ErrorKind::Extraction,
            Self::NetworkError(_)
            | Self::HttpStatus { .. }
            | Self::InvalidResponseBody { .. }
            | Self::MissingAccessToken => ErrorKind::Exchange,
            Self::UndecodableToken | Self::MissingIdentity => ErrorKind::Claims,
            Self::InvalidConfig { .. } | Self::ConfigParse(_) | Self::UrlParse(_) => {
                ErrorKind::Config
            }
            Self::InvalidTransition { .. }
            | Self::TornDown
            | Self::PopupFailed { .. }
            | Self::Io(_) => ErrorKind::Flow,
        }
    }

    /// Text suitable for display next to the input that caused the error.
    ///
    /// All exchange failures collapse into one generic message.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyEmail => "Please enter your email address",
            Self::InvalidEmail { .. } => "Please enter a valid email address",
            Self::MissingUrl => "Please paste a URL first",
            Self::NoCodeFound => "No authorization code found in URL",
            Self::UndecodableToken => "Error parsing token",
            Self::MissingIdentity => "Could not extract email from token",
            _ => match self.kind() {
                ErrorKind::Exchange => "Failed to exchange code for token",
                ErrorKind::Config => "Sign-in is not configured correctly",
                _ => "Something went wrong, please try again",
            },
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AuthFlowError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
