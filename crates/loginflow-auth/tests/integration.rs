//! Integration tests for the loginflow-auth crate.
//!
//! These tests drive the controller through complete login attempts with a
//! virtual-clock scheduler, a recording popup launcher, and either a
//! scripted exchanger or the real HTTP client against a local fake
//! intermediary.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod common;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tokio::task::JoinHandle;

use loginflow_auth::{
    AllowedDomainSet, AuthFlowController, AuthFlowError, FlowConfig, FlowObserver, FlowState,
    ManualScheduler, OAuthConfig, PopupLauncher, PopupRequest, TimerEvent, TimingConfig,
    TokenExchangeClient, TokenExchanger, TokenResponse, TokioScheduler,
};

use common::serve_once;

// ═══════════════════════════════════════════════════════════════════════
//  Fixtures
// ═══════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct RecordingLauncher {
    launched: Mutex<Vec<PopupRequest>>,
}

impl PopupLauncher for RecordingLauncher {
    fn launch(&self, request: &PopupRequest) -> loginflow_auth::error::Result<()> {
        self.launched.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// Exchanger that replays a fixed body and counts calls.
struct ScriptedExchanger {
    body: String,
    calls: AtomicU32,
}

impl ScriptedExchanger {
    fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl TokenExchanger for ScriptedExchanger {
    async fn exchange(&self, _code: &str) -> loginflow_auth::error::Result<TokenResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        TokenResponse::from_body(&self.body)
    }
}

#[derive(Default)]
struct FocusCounter(AtomicU32);

impl FlowObserver for FocusCounter {
    fn focus_url_input(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn config(exchange_endpoint: &str) -> FlowConfig {
    FlowConfig::new(
        OAuthConfig {
            client_id: "loginflow-test".to_string(),
            redirect_uri: "http://localhost:8400/".to_string(),
            resource_id: "https://resource.example.com/".to_string(),
            state_parameter: "ab12cd34".to_string(),
            authorization_endpoint: "https://login.example.com/oauth2/authorize".to_string(),
            token_exchange_endpoint: exchange_endpoint.to_string(),
        },
        AllowedDomainSet::new(["gmail.com", "example.com"]).unwrap(),
    )
}

fn token_with(payload: &str) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(payload)
    )
}

/// Fake intermediary answering once on its `/exchange-token` endpoint.
async fn fake_intermediary(
    status_line: &'static str,
    body: impl Into<String>,
) -> (String, JoinHandle<String>) {
    let (base, server) = serve_once(status_line, body).await;
    (format!("{base}/exchange-token"), server)
}

/// Run the fired timers of one clock advance through the controller.
fn advance(scheduler: &ManualScheduler, flow: &mut AuthFlowController, by: Duration) {
    for fired in scheduler.advance(by) {
        flow.handle_timer(fired);
    }
}

/// Bring a fresh controller to `troubleshooting`.
fn to_troubleshooting(
    exchanger: Arc<dyn TokenExchanger>,
    endpoint: &str,
) -> (Arc<ManualScheduler>, Arc<RecordingLauncher>, AuthFlowController) {
    let scheduler = Arc::new(ManualScheduler::new());
    let launcher = Arc::new(RecordingLauncher::default());
    let mut flow = AuthFlowController::new(
        config(endpoint),
        scheduler.clone(),
        launcher.clone(),
        exchanger,
    )
    .unwrap();

    flow.submit_email("user@gmail.com").unwrap();
    advance(&scheduler, &mut flow, Duration::from_secs(10));
    assert_eq!(flow.state(), FlowState::Troubleshooting);
    (scheduler, launcher, flow)
}

// ═══════════════════════════════════════════════════════════════════════
//  End-to-end scenarios
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn email_then_timeout_reaches_troubleshooting() {
    let scheduler = Arc::new(ManualScheduler::new());
    let launcher = Arc::new(RecordingLauncher::default());
    let mut flow = AuthFlowController::new(
        config("http://127.0.0.1:3001/exchange-token"),
        scheduler.clone(),
        launcher.clone(),
        Arc::new(ScriptedExchanger::new("{}")),
    )
    .unwrap();

    flow.submit_email("user@gmail.com").unwrap();
    assert_eq!(flow.state(), FlowState::Authenticating);

    advance(&scheduler, &mut flow, Duration::from_millis(500));
    assert_eq!(flow.state(), FlowState::Authenticating);
    assert_eq!(launcher.launched.lock().unwrap().len(), 1);

    advance(&scheduler, &mut flow, Duration::from_millis(9_500));
    assert_eq!(flow.state(), FlowState::Troubleshooting);
    assert_eq!(scheduler.pending_events(), vec![TimerEvent::FocusInput]);
}

#[tokio::test]
async fn pasted_url_exchanged_over_http_reaches_success() {
    let token = token_with(r#"{"upn":"jane@gmail.com","name":"Jane"}"#);
    let (endpoint, server) =
        fake_intermediary("200 OK", format!(r#"{{"access_token":"{token}"}}"#)).await;
    let exchanger = Arc::new(TokenExchangeClient::new(&endpoint).unwrap());
    let (scheduler, _launcher, mut flow) = to_troubleshooting(exchanger, &endpoint);

    flow.submit_pasted_url("http://localhost:8400/?code=abc&state=ab12cd34")
        .await
        .unwrap();

    assert_eq!(flow.state(), FlowState::Success);
    assert_eq!(flow.resolved_email(), Some("jane@gmail.com"));
    assert_eq!(flow.access_token(), Some(token.as_str()));
    assert_eq!(flow.error_message(), None);
    assert!(scheduler.pending_events().is_empty());

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /exchange-token HTTP/1.1"));
    assert!(request.ends_with(r#"{"code":"abc"}"#));
}

#[tokio::test]
async fn pasted_url_without_code_makes_no_request() {
    let exchanger = Arc::new(ScriptedExchanger::new("{}"));
    let (_scheduler, _launcher, mut flow) =
        to_troubleshooting(exchanger.clone(), "http://127.0.0.1:3001/exchange-token");

    let err = flow
        .submit_pasted_url("http://localhost:8400/?state=ab12cd34")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthFlowError::NoCodeFound));
    assert_eq!(flow.state(), FlowState::Troubleshooting);
    assert_eq!(
        flow.error_message(),
        Some("No authorization code found in URL")
    );
    assert_eq!(exchanger.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn intermediary_failure_returns_to_login() {
    let (endpoint, server) = fake_intermediary(
        "500 Internal Server Error",
        r#"{"error":"upstream unavailable"}"#,
    )
    .await;
    let exchanger = Arc::new(TokenExchangeClient::new(&endpoint).unwrap());
    let (_scheduler, _launcher, mut flow) = to_troubleshooting(exchanger, &endpoint);

    let err = flow
        .submit_pasted_url("http://localhost:8400/?code=abc&state=ab12cd34")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthFlowError::HttpStatus { status: 500, .. }));
    assert_eq!(flow.state(), FlowState::Login);
    assert_eq!(
        flow.error_message(),
        Some("Failed to exchange code for token")
    );
    assert_eq!(flow.access_token(), None);
    assert_eq!(flow.resolved_email(), None);
    assert_eq!(flow.user_email(), "user@gmail.com");
    server.await.unwrap();
}

// ═══════════════════════════════════════════════════════════════════════
//  Lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn bare_code_and_mismatched_state_are_accepted() {
    let body = format!(
        r#"{{"access_token":"{}"}}"#,
        token_with(r#"{"preferred_username":"sam@example.com"}"#)
    );
    let exchanger = Arc::new(ScriptedExchanger::new(body));
    let (_scheduler, _launcher, mut flow) =
        to_troubleshooting(exchanger.clone(), "http://127.0.0.1:3001/exchange-token");

    flow.submit_pasted_url("  code=xyz&state=somethingelse  ")
        .await
        .unwrap();

    assert_eq!(flow.state(), FlowState::Success);
    assert_eq!(flow.resolved_email(), Some("sam@example.com"));
    assert_eq!(exchanger.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retry_after_failure_starts_clean() {
    let exchanger = Arc::new(ScriptedExchanger::new(r#"{"error":"invalid_grant"}"#));
    let (scheduler, launcher, mut flow) =
        to_troubleshooting(exchanger.clone(), "http://127.0.0.1:3001/exchange-token");

    assert!(flow.submit_pasted_url("?code=used").await.is_err());
    assert_eq!(flow.state(), FlowState::Login);

    flow.submit_email("user@gmail.com").unwrap();
    assert_eq!(flow.error_message(), None);
    advance(&scheduler, &mut flow, Duration::from_secs(10));

    assert_eq!(flow.state(), FlowState::Troubleshooting);
    assert_eq!(launcher.launched.lock().unwrap().len(), 2);
}

#[test]
fn focus_hook_fires_once_per_troubleshooting_entry() {
    let scheduler = Arc::new(ManualScheduler::new());
    let focus = Arc::new(FocusCounter::default());
    let mut flow = AuthFlowController::new(
        config("http://127.0.0.1:3001/exchange-token"),
        scheduler.clone(),
        Arc::new(RecordingLauncher::default()),
        Arc::new(ScriptedExchanger::new("{}")),
    )
    .unwrap()
    .with_observer(focus.clone());

    flow.submit_email("user@gmail.com").unwrap();
    advance(&scheduler, &mut flow, Duration::from_secs(10));
    assert_eq!(focus.0.load(Ordering::SeqCst), 0);
    advance(&scheduler, &mut flow, Duration::from_millis(100));
    assert_eq!(focus.0.load(Ordering::SeqCst), 1);

    // Leaving before the focus delay elapses cancels the focus timer.
    flow.back();
    flow.submit_email("user@gmail.com").unwrap();
    advance(&scheduler, &mut flow, Duration::from_secs(10));
    flow.back();
    advance(&scheduler, &mut flow, Duration::from_secs(1));
    assert_eq!(focus.0.load(Ordering::SeqCst), 1);
}

#[test]
fn teardown_ignores_timers_already_fired() {
    let scheduler = Arc::new(ManualScheduler::new());
    let launcher = Arc::new(RecordingLauncher::default());
    let mut flow = AuthFlowController::new(
        config("http://127.0.0.1:3001/exchange-token"),
        scheduler.clone(),
        launcher.clone(),
        Arc::new(ScriptedExchanger::new("{}")),
    )
    .unwrap();

    flow.submit_email("user@gmail.com").unwrap();
    let fired = scheduler.advance(Duration::from_secs(10));
    flow.on_teardown();

    for timer in fired {
        flow.handle_timer(timer);
    }
    assert_eq!(flow.state(), FlowState::Authenticating);
    assert!(launcher.launched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn tokio_scheduler_drives_fallback() {
    let (scheduler, mut fired) = TokioScheduler::new();
    let timing = TimingConfig {
        popup_delay_ms: 10,
        fallback_timeout_secs: 1,
        focus_delay_ms: 10,
    };
    let launcher = Arc::new(RecordingLauncher::default());
    let mut flow = AuthFlowController::new(
        config("http://127.0.0.1:3001/exchange-token").with_timing(timing),
        Arc::new(scheduler),
        launcher.clone(),
        Arc::new(ScriptedExchanger::new("{}")),
    )
    .unwrap();

    flow.submit_email("user@example.com").unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while flow.state() != FlowState::Troubleshooting {
        let timer = tokio::time::timeout_at(deadline, fired.recv())
            .await
            .unwrap()
            .unwrap();
        flow.handle_timer(timer);
    }

    assert_eq!(launcher.launched.lock().unwrap().len(), 1);
}

#[test]
fn config_file_round_trip_into_controller() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loginflow.toml");
    std::fs::write(
        &path,
        r#"
allowed_domains = ["example.com"]

[oauth]
client_id = "loginflow-test"
redirect_uri = "http://localhost:8400/"
resource_id = "https://resource.example.com/"
state_parameter = "ab12cd34"
authorization_endpoint = "https://login.example.com/oauth2/authorize"
token_exchange_endpoint = "http://127.0.0.1:3001/exchange-token"

[popup]
window_name = "SignIn"
"#,
    )
    .unwrap();

    let scheduler = Arc::new(ManualScheduler::new());
    let launcher = Arc::new(RecordingLauncher::default());
    let mut flow = AuthFlowController::new(
        FlowConfig::load(&path).unwrap(),
        scheduler.clone(),
        launcher.clone(),
        Arc::new(ScriptedExchanger::new("{}")),
    )
    .unwrap();

    assert!(flow.submit_email("someone@gmail.com").is_err());
    flow.submit_email("someone@example.com").unwrap();
    advance(&scheduler, &mut flow, Duration::from_millis(500));

    let launched = launcher.launched.lock().unwrap();
    assert_eq!(launched[0].window_name, "SignIn");
    assert!(launched[0].url.contains("client_id=loginflow-test"));
}
