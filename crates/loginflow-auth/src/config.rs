//! Flow configuration.
//!
//! [`FlowConfig`] is built once and injected into the controller; nothing in
//! the crate reads settings from globals. It deserializes from TOML:
//!
//! ```toml
//! allowed_domains = ["example.com"]
//!
//! [oauth]
//! client_id = "my-client"
//! redirect_uri = "http://localhost:8400/"
//! resource_id = "https://resource.example.com/"
//! state_parameter = "ab12cd34"
//! authorization_endpoint = "https://login.example.com/oauth2/authorize"
//! token_exchange_endpoint = "http://127.0.0.1:3001/exchange-token"
//!
//! [timing]
//! fallback_timeout_secs = 10
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuthFlowError, Result};
use crate::popup::PopupConfig;
use crate::request::OAuthConfig;
use crate::validator::AllowedDomainSet;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Delays that drive the popup and fallback timers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Delay between entering `authenticating` and opening the popup.
    ///
    /// Default: **500 ms**.
    pub popup_delay_ms: u64,

    /// How long to wait for the popup before offering manual paste.
    ///
    /// Default: **10 s**.
    pub fallback_timeout_secs: u64,

    /// Delay between entering `troubleshooting` and focusing the input.
    ///
    /// Default: **100 ms**.
    pub focus_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            popup_delay_ms: 500,
            fallback_timeout_secs: 10,
            focus_delay_ms: 100,
        }
    }
}

impl TimingConfig {
    pub fn popup_delay(&self) -> Duration {
        Duration::from_millis(self.popup_delay_ms)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }

    pub fn focus_delay(&self) -> Duration {
        Duration::from_millis(self.focus_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Flow configuration
// ---------------------------------------------------------------------------

/// Everything the controller needs to know up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    pub oauth: OAuthConfig,
    pub allowed_domains: AllowedDomainSet,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub popup: PopupConfig,
}

impl FlowConfig {
    /// Create a configuration with default timing and popup settings.
    pub fn new(oauth: OAuthConfig, allowed_domains: AllowedDomainSet) -> Self {
        Self {
            oauth,
            allowed_domains,
            timing: TimingConfig::default(),
            popup: PopupConfig::default(),
        }
    }

    /// Replace the timing settings.
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Replace the popup settings.
    pub fn with_popup(mut self, popup: PopupConfig) -> Self {
        self.popup = popup;
        self
    }

    /// Point the exchange client at a different intermediary.
    pub fn with_exchange_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.oauth.token_exchange_endpoint = endpoint.into();
        self
    }

    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// [`AuthFlowError::ConfigParse`] for malformed TOML or a schema
    /// mismatch, [`AuthFlowError::InvalidConfig`] if validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// [`AuthFlowError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loaded flow configuration");
        Self::from_toml_str(&content)
    }

    /// Check the invariants the controller relies on.
    ///
    /// # Errors
    ///
    /// [`AuthFlowError::InvalidConfig`] naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        self.oauth.validate()?;

        if self.timing.fallback_timeout_secs == 0 {
            return Err(AuthFlowError::InvalidConfig {
                reason: "timing.fallback_timeout_secs must be greater than zero".to_string(),
            });
        }
        // The fallback timer cancels the pending popup when it fires.
        if self.timing.popup_delay() >= self.timing.fallback_timeout() {
            return Err(AuthFlowError::InvalidConfig {
                reason: "timing.popup_delay_ms must be shorter than timing.fallback_timeout_secs"
                    .to_string(),
            });
        }
        if self.popup.window_name.trim().is_empty() {
            return Err(AuthFlowError::InvalidConfig {
                reason: "popup.window_name must not be empty".to_string(),
            });
        }
        if self.popup.width == 0 || self.popup.height == 0 {
            return Err(AuthFlowError::InvalidConfig {
                reason: "popup.width and popup.height must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
