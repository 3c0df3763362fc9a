//! Email-gated OAuth 2.0 authorization-code login flow.
//!
//! This crate drives a single interactive sign-in from an email address to
//! a resolved user identity:
//!
//! - **Email gate**: the address must be well formed and belong to an
//!   allowed domain before anything is sent anywhere.
//! - **Authorization popup**: a centered window opens the provider's
//!   authorize endpoint with the email as login hint.
//! - **Manual fallback**: after a timeout the user pastes the redirect URL
//!   and the authorization code is pulled out of it.
//! - **Exchange**: the code is traded for a token by a trusted intermediary
//!   and the identity is read from the token's JWT claims.
//!
//! # Architecture
//!
//! ```text
//! AuthFlowController
//! ├── EmailDomainValidator  (shape + allowed domains)
//! ├── authorization_url     (authorize request builder)
//! ├── Scheduler             (cancellable popup / fallback / focus timers)
//! ├── PopupLauncher         (opens the authorization window)
//! ├── extract_redirect      (code + state from a pasted URL)
//! ├── TokenExchanger        (code → token via the intermediary)
//! └── decode_claims         (identity from the JWT payload)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use loginflow_auth::{
//!     AuthFlowController, FlowConfig, SystemBrowserLauncher, TokenExchangeClient,
//!     TokioScheduler,
//! };
//!
//! # async fn example() -> loginflow_auth::error::Result<()> {
//! let config = FlowConfig::load("config/default.toml")?;
//! let (scheduler, mut fired) = TokioScheduler::new();
//! let exchanger = TokenExchangeClient::new(&config.oauth.token_exchange_endpoint)?;
//!
//! let mut flow = AuthFlowController::new(
//!     config,
//!     Arc::new(scheduler),
//!     Arc::new(SystemBrowserLauncher),
//!     Arc::new(exchanger),
//! )?;
//!
//! flow.submit_email("jane@example.com")?;
//! while let Some(timer) = fired.recv().await {
//!     flow.handle_timer(timer);
//! }
//! # Ok(())
//! # }
//! ```

pub mod claims;
pub mod config;
pub mod controller;
pub mod error;
pub mod exchange;
pub mod extract;
pub mod popup;
pub mod request;
pub mod scheduler;
pub mod validator;

pub use claims::{JwtClaims, decode_claims};
pub use config::{FlowConfig, TimingConfig};
pub use controller::{AuthFlowController, FlowObserver, FlowState, NoopObserver};
pub use error::{AuthFlowError, ErrorKind};
pub use exchange::{TokenExchangeClient, TokenExchanger, TokenResponse};
pub use extract::{RedirectParams, extract_code, extract_redirect};
pub use popup::{PopupConfig, PopupLauncher, PopupRequest, ScreenSize, SystemBrowserLauncher};
pub use request::{OAuthConfig, authorization_url};
pub use scheduler::{
    FiredTimer, ManualScheduler, Scheduler, TimerEvent, TimerHandle, TokioScheduler,
};
pub use validator::{AllowedDomainSet, EmailDomainValidator};
