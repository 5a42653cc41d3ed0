use axum::{
    Json, Router,
    extract::Query,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use compyle::CompyleError;
use compyle::api::http_client;
use compyle::api::twitch::{TwitchApi, TwitchUrls};
use compyle::service::selector::ClipSelection;
use serde_json::{Value, json};
use std::collections::HashMap;
use tokio::net::TcpListener;

fn clip(id: &str, broadcaster: &str, views: u64, vod_offset: i64) -> Value {
    json!({
        "id": id,
        "url": format!("https://clips.twitch.tv/{id}"),
        "broadcaster_id": format!("{broadcaster}-id"),
        "broadcaster_name": broadcaster,
        "video_id": "vod-1",
        "game_id": "21779",
        "language": "fr",
        "title": format!("clip {id}"),
        "view_count": views,
        "created_at": "2023-09-21T18:00:00Z",
        "thumbnail_url": format!("https://clips-media-assets2.twitch.tv/{id}-preview-480x272.jpg"),
        "duration": 20.0,
        "vod_offset": vod_offset,
    })
}

async fn games(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(
        headers.get("client-id").and_then(|v| v.to_str().ok()),
        Some("client")
    );
    match query.get("name").map(String::as_str) {
        Some("League of Legends") => Json(json!({
            "data": [{"id": "21779", "name": "League of Legends", "box_art_url": "", "igdb_id": "115"}],
            "pagination": {}
        })),
        _ => Json(json!({"data": [], "pagination": {}})),
    }
}

async fn top_games(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    // Echo the page size so callers can see what was requested.
    let first = query.get("first").cloned().unwrap_or_default();
    Json(json!({
        "data": [{"id": first, "name": "Just Chatting", "box_art_url": "", "igdb_id": ""}],
        "pagination": {}
    }))
}

async fn validate(headers: HeaderMap) -> StatusCode {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("OAuth app-token") => StatusCode::OK,
        _ => StatusCode::UNAUTHORIZED,
    }
}

async fn clips(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    if let Some(id) = query.get("id") {
        let data = if id == "a" {
            vec![clip("a", "gotaga", 900, 100)]
        } else {
            Vec::new()
        };
        return Json(json!({"data": data, "pagination": {}}));
    }
    assert_eq!(query.get("game_id").map(String::as_str), Some("21779"));
    assert!(query.contains_key("started_at"));
    match query.get("after").map(String::as_str) {
        None => Json(json!({
            "data": [clip("a", "gotaga", 900, 100), clip("b", "kameto", 800, 110)],
            "pagination": {"cursor": "page-2"}
        })),
        Some("page-2") => Json(json!({
            "data": [clip("c", "domingo", 700, 5000), clip("d", "locklear", 10, 9000)],
            "pagination": {"cursor": "page-3"}
        })),
        Some(_) => Json(json!({"data": [], "pagination": {}})),
    }
}

async fn token() -> Json<Value> {
    Json(json!({"access_token": "app-token", "token_type": "bearer", "expires_in": 5000}))
}

async fn fake_twitch() -> TwitchUrls {
    let app = Router::new()
        .route("/oauth2/token", post(token))
        .route("/oauth2/validate", get(validate))
        .route("/helix/games", get(games))
        .route("/helix/games/top", get(top_games))
        .route("/helix/clips", get(clips));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake twitch");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    TwitchUrls {
        auth: format!("http://{addr}/oauth2"),
        helix: format!("http://{addr}/helix"),
    }
}

async fn connect(urls: &TwitchUrls) -> TwitchApi {
    let http = http_client().expect("http client");
    TwitchApi::connect("client", "secret", http.clone(), &http, urls)
        .await
        .expect("client credentials grant")
}

#[tokio::test]
async fn game_is_resolved_by_name() {
    let urls = fake_twitch().await;
    let twitch = connect(&urls).await;

    let game = twitch.get_game("League of Legends").await.expect("game");
    assert_eq!(game.id, "21779");
    assert_eq!(game.igdb_url.as_deref(), Some("https://www.igdb.com/g/115"));

    let err = twitch.get_game("Unknown").await.expect_err("no such game");
    assert!(matches!(err, CompyleError::GameNotFound(name) if name == "Unknown"));
}

#[tokio::test]
async fn clips_are_paged_and_selected() {
    let urls = fake_twitch().await;
    let twitch = connect(&urls).await;

    let criteria = ClipSelection {
        pages: 5,
        ..ClipSelection::default()
    };
    let clips = twitch
        .get_game_clips("21779", criteria)
        .await
        .expect("clips");

    // `b` overlaps `a` on the same VOD, `d` is under the view threshold and
    // the empty third page ends the scan.
    let ids: Vec<&str> = clips.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(
        clips[0].clip_url.as_deref(),
        Some("https://clips-media-assets2.twitch.tv/a.mp4")
    );
    assert_eq!(
        clips[0].broadcaster_url.as_deref(),
        Some("https://www.twitch.tv/gotaga")
    );
}

#[tokio::test]
async fn expired_tokens_are_reported_invalid() {
    let urls = fake_twitch().await;
    let twitch = connect(&urls).await;

    assert!(twitch
        .is_access_token_valid("app-token")
        .await
        .expect("validate"));
    assert!(!twitch
        .is_access_token_valid("expired")
        .await
        .expect("validate"));
}

#[tokio::test]
async fn top_games_limit_is_clamped() {
    let urls = fake_twitch().await;
    let twitch = connect(&urls).await;

    let requested = |games: Vec<compyle::types::twitch::Game>| {
        games.into_iter().next().map(|g| g.id).unwrap_or_default()
    };
    assert_eq!(requested(twitch.get_top_games(500).await.expect("games")), "100");
    assert_eq!(requested(twitch.get_top_games(0).await.expect("games")), "1");
    assert_eq!(requested(twitch.get_top_games(20).await.expect("games")), "20");
}

#[tokio::test]
async fn single_clip_is_fetched_by_id() {
    let urls = fake_twitch().await;
    let twitch = connect(&urls).await;

    let clip = twitch
        .get_clip("a")
        .await
        .expect("clip request")
        .expect("clip exists");
    assert_eq!(clip.broadcaster_name, "gotaga");
    assert_eq!(
        clip.clip_url.as_deref(),
        Some("https://clips-media-assets2.twitch.tv/a.mp4")
    );
    assert!(twitch.get_clip("missing").await.expect("clip request").is_none());
}
