pub mod routing;
pub mod twitch;
pub mod youtube;

use crate::error::Result;
use std::time::Duration;

pub use routing::{Endpoint, RequestBody, Router};
pub use twitch::TwitchApi;
pub use youtube::YoutubeApi;

/// Shared HTTP client; per-request timeouts are set by the [`Router`].
pub fn http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("compyle/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .http2_adaptive_window(true)
        .build()?;
    Ok(client)
}

/// Client used by the OAuth2 exchanges; redirects are never followed there.
pub fn oauth_http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("compyle/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(15))
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    Ok(client)
}
