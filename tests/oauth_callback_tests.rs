use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use compyle::google_oauth::callback::{CallbackState, callback_router};
use tokio::sync::oneshot::error::TryRecvError;
use tower::ServiceExt;

fn callback_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request")
}

#[tokio::test]
async fn valid_callback_forwards_the_code() {
    let (state, code_rx) = CallbackState::new("expected-state".to_string());
    let app = callback_router("/oauth/callback", state);

    let resp = app
        .oneshot(callback_request(
            "/oauth/callback?state=expected-state&code=4%2F0AfJohX",
        ))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);

    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let body_str = std::str::from_utf8(&body).expect("response body was not utf-8");
    assert!(body_str.contains("compyle is authorized"));

    let code = code_rx
        .await
        .expect("code channel closed")
        .expect("callback should succeed");
    assert_eq!(code, "4/0AfJohX");
}

#[tokio::test]
async fn stale_callbacks_keep_the_flow_waiting() {
    let (state, mut code_rx) = CallbackState::new("expected-state".to_string());
    let app = callback_router("/", state.clone());

    for uri in ["/?state=forged&code=abc", "/", "/?state=expected-state"] {
        let resp = app
            .clone()
            .oneshot(callback_request(uri))
            .await
            .expect("request failed");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");

        let body = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let body_str = std::str::from_utf8(&body).expect("response body was not utf-8");
        assert!(body_str.contains(r#""code":"OAUTH_FLOW""#));
    }
    assert!(matches!(code_rx.try_recv(), Err(TryRecvError::Empty)));

    let resp = app
        .oneshot(callback_request("/?state=expected-state&code=abc"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let code = code_rx
        .await
        .expect("code channel closed")
        .expect("callback should succeed");
    assert_eq!(code, "abc");
    drop(state);
}

#[tokio::test]
async fn denied_consent_is_reported() {
    let (state, code_rx) = CallbackState::new("expected-state".to_string());
    let app = callback_router("/", state);

    let resp = app
        .oneshot(callback_request("/?error=access_denied&state=expected-state"))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let err = code_rx
        .await
        .expect("code channel closed")
        .expect_err("consent was denied");
    assert!(err.to_string().contains("access_denied"));
}
