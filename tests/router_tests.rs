use axum::{Router as AxumRouter, extract::State, http::StatusCode, routing::get};
use compyle::CompyleError;
use compyle::api::http_client;
use compyle::api::{Endpoint, RequestBody, Router};
use reqwest::Method;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;

/// Answers `failures` times with `status`, then 200.
#[derive(Clone)]
struct Flaky {
    hits: Arc<AtomicUsize>,
    failures: usize,
    status: StatusCode,
}

async fn flaky(State(flaky): State<Flaky>) -> (StatusCode, &'static str) {
    let hit = flaky.hits.fetch_add(1, Ordering::SeqCst);
    if hit < flaky.failures {
        (flaky.status, "unavailable")
    } else {
        (StatusCode::OK, "{}")
    }
}

async fn serve(failures: usize, status: StatusCode) -> (Router, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = AxumRouter::new().route("/api/things", get(flaky)).with_state(Flaky {
        hits: hits.clone(),
        failures,
        status,
    });
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake api");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let mut router = Router::new(http_client().expect("http client"), false);
    router
        .register(
            "things",
            Endpoint::new(&format!("http://{addr}/api"), "things", &[], &[]).expect("endpoint"),
        )
        .expect("register");
    (router, hits)
}

async fn get_things(router: &Router) -> Result<reqwest::Response, CompyleError> {
    router
        .request(Method::GET, "things", HeaderMap::new(), RequestBody::Empty, &[])
        .await
}

#[tokio::test]
async fn server_errors_are_retried_then_reported() {
    let (router, hits) = serve(usize::MAX, StatusCode::SERVICE_UNAVAILABLE).await;

    let err = get_things(&router).await.expect_err("upstream keeps failing");
    assert!(matches!(
        err,
        CompyleError::UpstreamStatus { status, ref endpoint, ref body }
            if status == reqwest::StatusCode::SERVICE_UNAVAILABLE
                && endpoint == "things"
                && body == "unavailable"
    ));
    // First attempt plus three retries.
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn transient_server_error_recovers() {
    let (router, hits) = serve(1, StatusCode::BAD_GATEWAY).await;

    let response = get_things(&router).await.expect("second attempt succeeds");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (router, hits) = serve(usize::MAX, StatusCode::NOT_FOUND).await;

    let err = get_things(&router).await.expect_err("not found");
    assert!(matches!(
        err,
        CompyleError::UpstreamStatus { status, .. } if status == reqwest::StatusCode::NOT_FOUND
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
