//! One-shot HTTP listener receiving the OAuth redirect of the consent page.

use crate::error::CompyleError;
use axum::{
    Router,
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};
use url::Url;

const SUCCESS_PAGE: &str =
    "<html><body><h1>compyle is authorized</h1><p>You may close this window.</p></body></html>";

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

type CodeSender = oneshot::Sender<Result<String, CompyleError>>;

#[derive(Clone)]
pub struct CallbackState {
    expected_state: Arc<str>,
    sender: Arc<Mutex<Option<CodeSender>>>,
}

impl CallbackState {
    pub fn new(expected_state: String) -> (Self, oneshot::Receiver<Result<String, CompyleError>>) {
        let (tx, rx) = oneshot::channel();
        let state = Self {
            expected_state: Arc::from(expected_state),
            sender: Arc::new(Mutex::new(Some(tx))),
        };
        (state, rx)
    }

    fn deliver(&self, outcome: Result<String, CompyleError>) {
        let sender = self.sender.lock().ok().and_then(|mut guard| guard.take());
        match sender {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => warn!("OAuth callback received after the flow completed"),
        }
    }
}

/// What a hit on the redirect path means for the waiting flow.
#[derive(Debug, PartialEq)]
enum Callback {
    Code(String),
    /// Google answered with `error=`; the flow cannot succeed anymore.
    Denied(String),
    /// Stale or forged request; the flow keeps waiting.
    Invalid(String),
}

fn check_callback(expected_state: &str, query: AuthCallbackQuery) -> Callback {
    let Some(state) = query.state else {
        return Callback::Invalid("missing `state` in callback".to_string());
    };
    if !bool::from(state.as_bytes().ct_eq(expected_state.as_bytes())) {
        return Callback::Invalid("CSRF token mismatch".to_string());
    }
    if let Some(error) = query.error {
        return Callback::Denied(format!("authorization denied: {error}"));
    }
    match query.code.filter(|c| !c.is_empty()) {
        Some(code) => Callback::Code(code),
        None => Callback::Invalid("missing `code` in callback".to_string()),
    }
}

/// GET <redirect path> -> hands the authorization code over to the waiting flow.
pub async fn google_oauth_callback(
    State(state): State<CallbackState>,
    Query(query): Query<AuthCallbackQuery>,
) -> Response {
    match check_callback(&state.expected_state, query) {
        Callback::Code(code) => {
            info!("OAuth callback received an authorization code");
            state.deliver(Ok(code));
            Html(SUCCESS_PAGE).into_response()
        }
        Callback::Denied(reason) => {
            state.deliver(Err(CompyleError::OauthFlow(reason.clone())));
            CompyleError::OauthFlow(reason).into_response()
        }
        Callback::Invalid(reason) => {
            warn!(reason = %reason, "ignoring OAuth callback");
            CompyleError::OauthFlow(reason).into_response()
        }
    }
}

pub fn callback_router(path: &str, state: CallbackState) -> Router {
    let path = if path.is_empty() { "/" } else { path };
    Router::new()
        .route(path, get(google_oauth_callback))
        .with_state(state)
}

/// Serve `redirect` until the consent page redirects back, then shut down.
pub async fn wait_for_code(redirect: &Url, expected_state: String) -> Result<String, CompyleError> {
    let host = redirect.host_str().unwrap_or("localhost").to_string();
    let port = redirect.port().unwrap_or(80);
    let listener = TcpListener::bind((host.as_str(), port)).await?;
    info!("OAuth callback listening on {}:{}", host, port);

    let (state, code_rx) = CallbackState::new(expected_state);
    let app = callback_router(redirect.path(), state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = tokio::select! {
        received = code_rx => received.unwrap_or_else(|_| {
            Err(CompyleError::OauthFlow("callback listener stopped".to_string()))
        }),
        _ = tokio::signal::ctrl_c() => {
            Err(CompyleError::OauthFlow("interrupted while waiting for consent".to_string()))
        }
    };

    let _ = shutdown_tx.send(());
    match tokio::time::timeout(Duration::from_secs(5), server).await {
        Ok(Ok(Err(e))) => warn!(error = %e, "OAuth callback listener failed"),
        Ok(Err(e)) => warn!(error = %e, "OAuth callback task panicked"),
        Err(_) => warn!("OAuth callback listener did not stop in time"),
        Ok(Ok(Ok(()))) => {}
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(code: Option<&str>, state: Option<&str>, error: Option<&str>) -> AuthCallbackQuery {
        AuthCallbackQuery {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn matching_state_yields_code() {
        assert_eq!(
            check_callback("csrf", query(Some("4/0Ab"), Some("csrf"), None)),
            Callback::Code("4/0Ab".to_string())
        );
    }

    #[test]
    fn invalid_callbacks_are_ignored() {
        assert_eq!(
            check_callback("csrf", query(Some("4/0Ab"), Some("other"), None)),
            Callback::Invalid("CSRF token mismatch".to_string())
        );
        assert!(matches!(
            check_callback("csrf", query(Some("4/0Ab"), None, None)),
            Callback::Invalid(_)
        ));
        assert!(matches!(
            check_callback("csrf", query(None, Some("csrf"), None)),
            Callback::Invalid(_)
        ));
        // A forged denial must not end the flow either.
        assert!(matches!(
            check_callback("csrf", query(None, Some("other"), Some("access_denied"))),
            Callback::Invalid(_)
        ));
    }

    #[test]
    fn denial_ends_the_flow() {
        assert_eq!(
            check_callback("csrf", query(None, Some("csrf"), Some("access_denied"))),
            Callback::Denied("authorization denied: access_denied".to_string())
        );
    }
}
