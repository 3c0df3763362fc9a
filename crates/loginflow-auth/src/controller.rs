//! The login flow state machine.
//!
//! # States
//!
//! ```text
//! Login ──submit_email──▶ Authenticating ──timeout──▶ Troubleshooting
//!   ▲                           │                          │
//!   │                           │ (popup redirect is       │ submit_pasted_url
//!   │                           │  not observable)         ▼
//!   └──────── back / restart / exchange failure ──── Success
//! ```
//!
//! The controller owns one session at a time and processes one user
//! action at a time (every action takes `&mut self`). Timers are requested
//! from the injected [`Scheduler`]; the host feeds fired timers back through
//! [`AuthFlowController::handle_timer`]. A fired timer is honoured only if
//! its handle is still the one armed in the session, so a late delivery can
//! never move a discarded or completed session.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::claims::decode_claims;
use crate::config::FlowConfig;
use crate::error::{AuthFlowError, Result};
use crate::exchange::TokenExchanger;
use crate::extract::extract_redirect;
use crate::popup::{PopupLauncher, PopupRequest};
use crate::request::authorization_url;
use crate::scheduler::{FiredTimer, Scheduler, TimerEvent, TimerHandle};
use crate::validator::EmailDomainValidator;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Where the login flow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    /// Waiting for an email address.
    Login,
    /// Popup requested; waiting for the fallback timer.
    Authenticating,
    /// Waiting for the user to paste the redirect URL.
    Troubleshooting,
    /// Token obtained and identity resolved.
    Success,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Login => "login",
            Self::Authenticating => "authenticating",
            Self::Troubleshooting => "troubleshooting",
            Self::Success => "success",
        };
        f.write_str(name)
    }
}

/// Mutable data of one login attempt.
#[derive(Debug, Default, Clone)]
pub(crate) struct AuthSession {
    user_email: String,
    error_message: String,
    pasted_url: String,
    authorization_url: Option<String>,
    access_token: Option<String>,
    resolved_email: Option<String>,
    popup_timer: Option<TimerHandle>,
    fallback_timer: Option<TimerHandle>,
    focus_timer: Option<TimerHandle>,
}

impl AuthSession {
    /// A fresh session that remembers only the email.
    fn carrying_email(user_email: String) -> Self {
        Self {
            user_email,
            ..Self::default()
        }
    }

    fn armed_timers(&mut self) -> impl Iterator<Item = TimerHandle> {
        [
            self.popup_timer.take(),
            self.fallback_timer.take(),
            self.focus_timer.take(),
        ]
        .into_iter()
        .flatten()
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// View-side reactions to the flow. All methods default to no-ops.
pub trait FlowObserver: Send + Sync {
    /// Called after every state change.
    fn state_changed(&self, _from: FlowState, _to: FlowState) {}

    /// The pasted-URL input should take focus.
    fn focus_url_input(&self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FlowObserver for NoopObserver {}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Drives one login attempt at a time from email to resolved identity.
pub struct AuthFlowController {
    config: FlowConfig,
    validator: EmailDomainValidator,
    scheduler: Arc<dyn Scheduler>,
    launcher: Arc<dyn PopupLauncher>,
    exchanger: Arc<dyn TokenExchanger>,
    observer: Arc<dyn FlowObserver>,
    state: FlowState,
    session: AuthSession,
    torn_down: bool,
}

impl AuthFlowController {
    /// Create a controller in the `login` state.
    ///
    /// # Errors
    ///
    /// Returns [`AuthFlowError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        config: FlowConfig,
        scheduler: Arc<dyn Scheduler>,
        launcher: Arc<dyn PopupLauncher>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> Result<Self> {
        config.validate()?;
        let validator = EmailDomainValidator::new(config.allowed_domains.clone());

        Ok(Self {
            config,
            validator,
            scheduler,
            launcher,
            exchanger,
            observer: Arc::new(NoopObserver),
            state: FlowState::Login,
            session: AuthSession::default(),
            torn_down: false,
        })
    }

    /// Attach an observer for view-side reactions.
    pub fn with_observer(mut self, observer: Arc<dyn FlowObserver>) -> Self {
        self.observer = observer;
        self
    }

    // -- accessors ----------------------------------------------------------

    /// The current flow state.
    pub fn state(&self) -> FlowState {
        self.state
    }

    /// The user-visible error, if any.
    pub fn error_message(&self) -> Option<&str> {
        Some(self.session.error_message.as_str()).filter(|m| !m.is_empty())
    }

    /// The last accepted email, kept across `back` and failures.
    pub fn user_email(&self) -> &str {
        &self.session.user_email
    }

    /// Current contents of the pasted-URL input.
    pub fn pasted_url(&self) -> &str {
        &self.session.pasted_url
    }

    /// The exchanged access token; set only in `success`.
    pub fn access_token(&self) -> Option<&str> {
        self.session.access_token.as_deref()
    }

    /// Identity read from the token claims; set only in `success`.
    pub fn resolved_email(&self) -> Option<&str> {
        self.session.resolved_email.as_deref()
    }

    /// The URL the current attempt opens, once an email was accepted.
    pub fn authorization_url(&self) -> Option<&str> {
        self.session.authorization_url.as_deref()
    }

    /// The configuration the controller was built with.
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Whether [`on_teardown`](Self::on_teardown) has run.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Mirror the pasted-URL input field.
    pub fn set_pasted_url(&mut self, value: impl Into<String>) {
        self.session.pasted_url = value.into();
    }

    // -- actions ------------------------------------------------------------

    /// Submit the email typed on the login screen.
    ///
    /// On success the flow enters `authenticating`, the popup launch is
    /// scheduled after the popup delay and the fallback timer is armed.
    /// Submitting again while `authenticating` abandons the previous
    /// attempt's timers and starts over with the new email.
    ///
    /// # Errors
    ///
    /// Validation errors leave the state unchanged and set the error text.
    pub fn submit_email(&mut self, raw: &str) -> Result<()> {
        self.ensure_live()?;
        if !matches!(self.state, FlowState::Login | FlowState::Authenticating) {
            return Err(self.reject("submit an email"));
        }

        let email = raw.trim();
        if let Err(e) = self.validator.check(email) {
            tracing::debug!(error = %e, "email rejected");
            self.session.error_message = e.user_message().to_string();
            return Err(e);
        }

        let url = match authorization_url(&self.config.oauth, email) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "cannot build authorization URL");
                self.session.error_message = e.user_message().to_string();
                return Err(e);
            }
        };

        if self.state == FlowState::Authenticating {
            tracing::info!("restarting authorization attempt");
            self.cancel_timers();
        }

        self.session = AuthSession::carrying_email(email.to_string());
        self.session.authorization_url = Some(url);
        self.transition(FlowState::Authenticating);

        let timing = &self.config.timing;
        self.session.popup_timer =
            Some(self.scheduler.schedule(timing.popup_delay(), TimerEvent::LaunchPopup));
        self.session.fallback_timer = Some(
            self.scheduler
                .schedule(timing.fallback_timeout(), TimerEvent::FallbackTimeout),
        );

        Ok(())
    }

    /// React to a timer the scheduler reports as fired.
    ///
    /// Stale timers (cancelled, superseded, or from before a teardown) are
    /// ignored.
    pub fn handle_timer(&mut self, fired: FiredTimer) {
        if self.torn_down {
            tracing::debug!(event = ?fired.event, "ignoring timer after teardown");
            return;
        }

        let slot = match fired.event {
            TimerEvent::LaunchPopup => &mut self.session.popup_timer,
            TimerEvent::FallbackTimeout => &mut self.session.fallback_timer,
            TimerEvent::FocusInput => &mut self.session.focus_timer,
        };
        if *slot != Some(fired.handle) {
            tracing::debug!(event = ?fired.event, "ignoring stale timer");
            return;
        }
        *slot = None;

        match (fired.event, self.state) {
            (TimerEvent::LaunchPopup, FlowState::Authenticating) => self.launch_popup(),
            (TimerEvent::FallbackTimeout, FlowState::Authenticating) => {
                tracing::info!(
                    timeout_secs = self.config.timing.fallback_timeout_secs,
                    "no redirect observed, offering manual paste"
                );
                self.on_enter_troubleshooting();
            }
            (TimerEvent::FocusInput, FlowState::Troubleshooting) => {
                self.observer.focus_url_input();
            }
            (event, state) => {
                tracing::debug!(?event, %state, "timer no longer applicable");
            }
        }
    }

    /// Submit the redirect URL the user pasted, then exchange the code.
    ///
    /// # Errors
    ///
    /// - [`AuthFlowError::MissingUrl`] / [`AuthFlowError::NoCodeFound`]:
    ///   the flow stays in `troubleshooting` and no request is made.
    /// - Exchange and claims errors: the flow falls back to `login`.
    pub async fn submit_pasted_url(&mut self, input: &str) -> Result<()> {
        self.ensure_live()?;
        if self.state != FlowState::Troubleshooting {
            return Err(self.reject("submit a redirect URL"));
        }
        self.session.pasted_url = input.to_string();

        if input.trim().is_empty() {
            return Err(self.fail_in_place(AuthFlowError::MissingUrl));
        }

        let Some(params) = extract_redirect(input) else {
            return Err(self.fail_in_place(AuthFlowError::NoCodeFound));
        };

        if let Some(returned) = params.state.as_deref()
            && returned != self.config.oauth.state_parameter
        {
            tracing::warn!(
                expected = %self.config.oauth.state_parameter,
                returned = %returned,
                "redirect state does not match the state that was sent"
            );
        }

        self.session.pasted_url.clear();
        self.session.error_message.clear();
        self.resolve_code(&params.code).await
    }

    /// Return to `login` from any state.
    ///
    /// Cancels pending timers, clears the error and every session field
    /// except the email.
    pub fn back(&mut self) {
        if self.torn_down {
            return;
        }
        self.cancel_timers();
        let email = std::mem::take(&mut self.session.user_email);
        self.session = AuthSession::carrying_email(email);
        self.transition(FlowState::Login);
    }

    /// Start over after a successful login.
    ///
    /// # Errors
    ///
    /// [`AuthFlowError::InvalidTransition`] outside `success`.
    pub fn restart(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.state != FlowState::Success {
            return Err(self.reject("restart"));
        }
        self.back();
        Ok(())
    }

    /// Release the session when the host goes away.
    ///
    /// Cancels every armed timer; afterwards all actions are rejected and
    /// fired timers are ignored. Idempotent.
    pub fn on_teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.cancel_timers();
        self.torn_down = true;
        tracing::debug!(state = %self.state, "login flow torn down");
    }

    // -- internals ----------------------------------------------------------

    fn on_enter_troubleshooting(&mut self) {
        self.transition(FlowState::Troubleshooting);
        self.session.pasted_url.clear();
        self.session.focus_timer = Some(
            self.scheduler
                .schedule(self.config.timing.focus_delay(), TimerEvent::FocusInput),
        );
    }

    fn launch_popup(&mut self) {
        let Some(url) = self.session.authorization_url.clone() else {
            return;
        };
        let request = PopupRequest::centered(url, &self.config.popup, self.launcher.screen_size());
        tracing::info!(
            window = %request.window_name,
            width = request.width,
            height = request.height,
            "opening authorization popup"
        );
        // Fire-and-forget: the fallback timer covers a popup that never shows.
        if let Err(e) = self.launcher.launch(&request) {
            tracing::warn!(error = %e, "authorization popup failed to open");
        }
    }

    async fn resolve_code(&mut self, code: &str) -> Result<()> {
        let exchanger = Arc::clone(&self.exchanger);
        let token = match exchanger.exchange(code).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "token exchange failed");
                return Err(self.fail_to_login(e));
            }
        };

        let Some(claims) = decode_claims(&token.access_token) else {
            tracing::warn!("access token payload could not be decoded");
            return Err(self.fail_to_login(AuthFlowError::UndecodableToken));
        };

        let Some(identity) = claims.resolved_identity().map(str::to_string) else {
            tracing::warn!("access token carries no identity claim");
            return Err(self.fail_to_login(AuthFlowError::MissingIdentity));
        };

        self.session.access_token = Some(token.access_token);
        self.session.resolved_email = Some(identity);
        self.transition(FlowState::Success);
        tracing::info!(identity = ?self.session.resolved_email, "login flow completed");
        Ok(())
    }

    /// Record an error without changing state.
    fn fail_in_place(&mut self, err: AuthFlowError) -> AuthFlowError {
        tracing::debug!(error = %err, state = %self.state, "action rejected");
        self.session.error_message = err.user_message().to_string();
        err
    }

    /// Fall back to `login` and show the error's user message.
    fn fail_to_login(&mut self, err: AuthFlowError) -> AuthFlowError {
        self.back();
        self.session.error_message = err.user_message().to_string();
        err
    }

    fn reject(&self, action: &'static str) -> AuthFlowError {
        AuthFlowError::InvalidTransition {
            action,
            state: self.state,
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.torn_down {
            return Err(AuthFlowError::TornDown);
        }
        Ok(())
    }

    fn cancel_timers(&mut self) {
        for handle in self.session.armed_timers() {
            self.scheduler.cancel(handle);
        }
    }

    fn transition(&mut self, to: FlowState) {
        let from = self.state;

        if from == FlowState::Authenticating && to != FlowState::Authenticating {
            for handle in [
                self.session.popup_timer.take(),
                self.session.fallback_timer.take(),
            ]
            .into_iter()
            .flatten()
            {
                self.scheduler.cancel(handle);
            }
        }
        if from == FlowState::Troubleshooting
            && let Some(handle) = self.session.focus_timer.take()
        {
            self.scheduler.cancel(handle);
        }

        self.session.error_message.clear();
        self.state = to;

        if from != to {
            tracing::info!(%from, %to, "login flow state changed");
        }
        self.observer.state_changed(from, to);
    }
}

impl Drop for AuthFlowController {
    fn drop(&mut self) {
        self.on_teardown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
