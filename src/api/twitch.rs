use crate::api::routing::{Endpoint, Query, RequestBody, Router};
use crate::error::{CompyleError, Result};
use crate::service::selector::{ClipSelection, Selector};
use crate::types::clip::Clip;
use crate::types::twitch::{Game, HelixPage};
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use oauth2::basic::BasicClient;
use oauth2::{AuthType, ClientId, ClientSecret, TokenResponse, TokenUrl};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use tracing::{debug, info};

pub use crate::types::clip::broadcaster_url;

pub const TWITCH_AUTH_URL: &str = "https://id.twitch.tv/oauth2";
pub const TWITCH_HELIX_URL: &str = "https://api.twitch.tv/helix";

/// Helix allows 800 points per minute for an app token.
const HELIX_REQUESTS_PER_MINUTE: u32 = 800;

const CLIENT_ID_HEADER: &str = "client-id";

/// Base URLs of the Twitch services, overridable for tests.
#[derive(Debug, Clone)]
pub struct TwitchUrls {
    pub auth: String,
    pub helix: String,
}

impl Default for TwitchUrls {
    fn default() -> Self {
        Self {
            auth: TWITCH_AUTH_URL.to_string(),
            helix: TWITCH_HELIX_URL.to_string(),
        }
    }
}

/// Helix client authenticated with an app access token.
pub struct TwitchApi {
    router: Router,
    client_id: String,
    access_token: String,
}

impl TwitchApi {
    /// Register the routes and obtain an app access token through the client
    /// credentials grant.
    pub async fn connect(
        client_id: &str,
        client_secret: &str,
        http: reqwest::Client,
        oauth_http: &reqwest::Client,
        urls: &TwitchUrls,
    ) -> Result<Self> {
        if client_id.trim().is_empty() {
            return Err(CompyleError::MissingConfig("TWITCH_APP_CLIENT_ID"));
        }
        if client_secret.trim().is_empty() {
            return Err(CompyleError::MissingConfig("TWITCH_APP_CLIENT_SECRET"));
        }

        let router = build_router(http, urls)?;
        let token_url = router.endpoint("auth")?.url()?;
        let oauth = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_client_secret(ClientSecret::new(client_secret.to_string()))
            .set_token_uri(TokenUrl::from_url(token_url))
            .set_auth_type(AuthType::RequestBody);
        let token = oauth.exchange_client_credentials().request_async(oauth_http).await?;
        info!("Twitch app access token obtained");

        Ok(Self::with_token(
            router,
            client_id.to_string(),
            token.access_token().secret().to_string(),
        ))
    }

    pub fn with_token(router: Router, client_id: String, access_token: String) -> Self {
        Self {
            router,
            client_id,
            access_token,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    fn helix_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_ID_HEADER, header_value(&self.client_id)?);
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", self.access_token))?,
        );
        Ok(headers)
    }

    async fn helix_get<T: DeserializeOwned>(
        &self,
        namespace: &str,
        query: &Query<'_>,
    ) -> Result<HelixPage<T>> {
        let response = self
            .router
            .request(
                Method::GET,
                namespace,
                self.helix_headers()?,
                RequestBody::Empty,
                query,
            )
            .await?;
        Ok(response.json().await?)
    }

    /// Whether Twitch still accepts `token`.
    pub async fn is_access_token_valid(&self, token: &str) -> Result<bool> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&format!("OAuth {token}"))?);
        match self
            .router
            .request(Method::GET, "validate", headers, RequestBody::Empty, &[])
            .await
        {
            Ok(_) => Ok(true),
            Err(CompyleError::UpstreamStatus { status, .. }) if status == StatusCode::UNAUTHORIZED => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_top_games(&self, limit: u32) -> Result<Vec<Game>> {
        let first = limit.clamp(1, 100);
        let page: HelixPage<Game> = self
            .helix_get("games", &[("first", first.to_string())])
            .await?;
        Ok(page.data.into_iter().map(Game::with_igdb_url).collect())
    }

    pub async fn get_game(&self, name: &str) -> Result<Game> {
        let page: HelixPage<Game> = self.helix_get("game", &[("name", name.to_string())]).await?;
        page.data
            .into_iter()
            .next()
            .map(Game::with_igdb_url)
            .ok_or_else(|| CompyleError::GameNotFound(name.to_string()))
    }

    pub async fn get_game_id(&self, name: &str) -> Result<String> {
        Ok(self.get_game(name).await?.id)
    }

    pub async fn get_clip(&self, id: &str) -> Result<Option<Clip>> {
        let page: HelixPage<Clip> = self.helix_get("clips", &[("id", id.to_string())]).await?;
        Ok(page.data.into_iter().next().map(|mut clip| {
            clip.clip_url = clip.derive_clip_url();
            clip.broadcaster_url = Some(broadcaster_url(&clip.broadcaster_name));
            clip
        }))
    }

    /// Most viewed clips of `game_id` over the selection period, filtered by
    /// the selection rules.
    pub async fn get_game_clips(&self, game_id: &str, criteria: ClipSelection) -> Result<Vec<Clip>> {
        let ended_at = Utc::now();
        let started_at = ended_at - ChronoDuration::days(i64::from(criteria.period.max(1)));
        let started_at = started_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let ended_at = ended_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let pages = criteria.pages;
        let first = criteria.page_size.to_string();

        let mut selector = Selector::new(criteria);
        let mut cursor: Option<String> = None;
        for page_index in 0..pages {
            let mut query = vec![
                ("game_id", game_id.to_string()),
                ("started_at", started_at.clone()),
                ("ended_at", ended_at.clone()),
                ("first", first.clone()),
            ];
            if let Some(after) = cursor.take() {
                query.push(("after", after));
            }

            let page: HelixPage<Clip> = self.helix_get("clips", &query).await?;
            if page.data.is_empty() {
                break;
            }
            let next = page.next_cursor().map(str::to_string);
            debug!(page = page_index, clips = page.data.len(), "clips page received");
            if selector.offer_page(page.data) {
                break;
            }
            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let clips = selector.finish();
        info!(game_id = %game_id, count = clips.len(), "clips selected");
        Ok(clips)
    }
}

/// Downloadable mp4 of `clip`, if it can be derived.
pub fn clip_url(clip: &Clip) -> Option<String> {
    clip.derive_clip_url()
}

pub fn build_router(http: reqwest::Client, urls: &TwitchUrls) -> Result<Router> {
    let per_minute = NonZeroU32::new(HELIX_REQUESTS_PER_MINUTE).unwrap_or(NonZeroU32::MIN);
    let mut router = Router::new(http, false).with_rate_limit(per_minute);
    router.register("auth", Endpoint::new(&urls.auth, "token", &[], &[])?)?;
    router.register("validate", Endpoint::new(&urls.auth, "validate", &[], &[])?)?;
    router.register(
        "games",
        Endpoint::new(&urls.helix, "games/top", &[], &["after", "before", "first"])?,
    )?;
    router.register(
        "game",
        Endpoint::new(&urls.helix, "games", &[], &["id", "name", "igdb_id"])?,
    )?;
    router.register(
        "clips",
        Endpoint::new(
            &urls.helix,
            "clips",
            &[],
            &[
                "broadcaster_id",
                "game_id",
                "id",
                "started_at",
                "ended_at",
                "first",
                "before",
                "after",
            ],
        )?,
    )?;
    Ok(router)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| CompyleError::UnexpectedResponse(e.to_string()))
}
