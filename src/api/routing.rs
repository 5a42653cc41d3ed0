//! Named HTTP endpoints and a small router performing requests against them.
//!
//! An [`Endpoint`] is a base URL, a slug and the query parameters it accepts.
//! A [`Router`] maps namespaces to endpoints and sends requests with retries,
//! rate limiting and request logging.

use crate::error::{CompyleError, IsRetryable, Result};
use backon::{ExponentialBuilder, Retryable};
use bytes::Bytes;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, Response};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Query parameters, in order. Keys may repeat (`id=a&id=b`).
pub type Query<'a> = [(&'a str, String)];

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    base_url: Url,
    slug: String,
    required: BTreeSet<String>,
    optional: BTreeSet<String>,
}

impl Endpoint {
    pub fn new(base_url: &str, slug: &str, required: &[&str], optional: &[&str]) -> Result<Self> {
        let required: BTreeSet<String> = required.iter().map(|p| p.to_string()).collect();
        let optional: BTreeSet<String> = optional.iter().map(|p| p.to_string()).collect();
        let overlap: Vec<String> = required.intersection(&optional).cloned().collect();
        if !overlap.is_empty() {
            return Err(CompyleError::OverlappingParams(overlap));
        }
        Ok(Self {
            base_url: Url::parse(base_url)?,
            slug: slug.to_string(),
            required,
            optional,
        })
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn url(&self) -> Result<Url> {
        let slug = self.slug.trim_start_matches('/');
        if slug.is_empty() {
            return Ok(self.base_url.clone());
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{slug}"))?)
    }

    /// Full URL for `query`. Unknown parameters and empty optional ones are
    /// dropped; every required parameter must be present and non-empty.
    pub fn build_url(&self, query: &Query<'_>) -> Result<Url> {
        let mut missing: Vec<String> = self
            .required
            .iter()
            .filter(|name| {
                !query
                    .iter()
                    .any(|(key, value)| *key == name.as_str() && !value.is_empty())
            })
            .cloned()
            .collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(CompyleError::MissingParams(missing));
        }

        let mut url = self.url()?;
        let kept: Vec<&(&str, String)> = query
            .iter()
            .filter(|(key, value)| {
                let known = self.required.contains(*key) || self.optional.contains(*key);
                if !known {
                    debug!(endpoint = %self.slug, param = %key, "dropping unknown parameter");
                }
                known && !value.is_empty()
            })
            .collect();
        if !kept.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in kept {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// Payload of a request.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Bytes { content_type: String, data: Bytes },
}

pub struct Router {
    routes: BTreeMap<String, Endpoint>,
    trailing_slash: bool,
    client: reqwest::Client,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    retry: ExponentialBuilder,
    timeout: Duration,
}

impl Router {
    pub fn new(client: reqwest::Client, trailing_slash: bool) -> Self {
        Self {
            routes: BTreeMap::new(),
            trailing_slash,
            client,
            limiter: None,
            retry: default_retry_policy(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_rate_limit(mut self, per_minute: NonZeroU32) -> Self {
        self.limiter = Some(Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn register(&mut self, namespace: &str, endpoint: Endpoint) -> Result<()> {
        let namespace = namespace.trim();
        if namespace.is_empty() {
            return Err(CompyleError::MalformedNamespace);
        }
        self.routes.insert(namespace.to_string(), endpoint);
        Ok(())
    }

    pub fn is_registered(&self, namespace: &str) -> bool {
        self.routes.contains_key(namespace)
    }

    /// Registered namespaces, sorted.
    pub fn registered(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }

    pub fn endpoint(&self, namespace: &str) -> Result<&Endpoint> {
        self.routes
            .get(namespace)
            .ok_or_else(|| CompyleError::UnknownRoute(namespace.to_string()))
    }

    pub fn route(&self, namespace: &str, query: &Query<'_>) -> Result<Url> {
        let mut url = self.endpoint(namespace)?.build_url(query)?;
        let path = url.path().to_string();
        if self.trailing_slash {
            if !path.ends_with('/') {
                url.set_path(&format!("{path}/"));
            }
        } else if path.len() > 1 && path.ends_with('/') {
            url.set_path(path.trim_end_matches('/'));
        }
        Ok(url)
    }

    /// Request a registered endpoint and return the successful response.
    pub async fn request(
        &self,
        method: Method,
        namespace: &str,
        headers: HeaderMap,
        body: RequestBody,
        query: &Query<'_>,
    ) -> Result<Response> {
        let url = self.route(namespace, query)?;
        let label = self.endpoint(namespace)?.slug().to_string();
        self.execute(method, &label, url, headers, body).await
    }

    /// Request an arbitrary URL (e.g. a resumable upload session) with the
    /// router's retry, rate limit and timeout.
    pub async fn execute(
        &self,
        method: Method,
        label: &str,
        url: Url,
        headers: HeaderMap,
        body: RequestBody,
    ) -> Result<Response> {
        (|| async { self.send_once(method.clone(), label, url.clone(), &headers, &body).await })
            .retry(self.retry)
            .when(|e: &CompyleError| e.is_retryable())
            .notify(|err, dur: Duration| {
                warn!(endpoint = %label, "request retrying after error {}, sleeping {:?}", err, dur);
            })
            .await
    }

    async fn send_once(
        &self,
        method: Method,
        label: &str,
        url: Url,
        headers: &HeaderMap,
        body: &RequestBody,
    ) -> Result<Response> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let mut builder = self
            .client
            .request(method.clone(), url)
            .headers(headers.clone())
            .timeout(self.timeout);
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Bytes { content_type, data } => {
                let content_type = HeaderValue::from_str(content_type)
                    .map_err(|e| CompyleError::UnexpectedResponse(e.to_string()))?;
                builder.header(CONTENT_TYPE, content_type).body(data.clone())
            }
        };

        let started = Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        info!(
            method = %method,
            endpoint = %label,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );

        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CompyleError::UpstreamStatus {
            status,
            endpoint: label.to_string(),
            body,
        })
    }
}

/// Query parameters of `url`, in order.
pub fn extract_url_params(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// `url` with `params` merged into its query; a given key replaces every
/// existing value of that key.
pub fn add_url_params(url: &Url, params: &Query<'_>) -> Url {
    let mut merged: Vec<(String, String)> = extract_url_params(url)
        .into_iter()
        .filter(|(key, _)| !params.iter().any(|(k, _)| k == key))
        .collect();
    merged.extend(params.iter().map(|(k, v)| (k.to_string(), v.clone())));

    let mut out = url.clone();
    out.set_query(None);
    if !merged.is_empty() {
        out.query_pairs_mut().extend_pairs(merged);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clips_endpoint() -> Endpoint {
        Endpoint::new(
            "https://api.twitch.tv/helix",
            "/clips",
            &[],
            &["game_id", "first", "after", "id"],
        )
        .expect("endpoint should build")
    }

    #[test]
    fn overlapping_parameters_are_rejected() {
        let err = Endpoint::new("https://example.com", "a", &["id", "part"], &["part"])
            .expect_err("overlap must fail");
        assert!(matches!(err, CompyleError::OverlappingParams(p) if p == vec!["part".to_string()]));
    }

    #[test]
    fn build_url_drops_unknown_and_empty_params() {
        let url = clips_endpoint()
            .build_url(&[
                ("game_id", "21779".to_string()),
                ("after", String::new()),
                ("broadcaster_login", "gotaga".to_string()),
            ])
            .expect("url should build");
        assert_eq!(url.as_str(), "https://api.twitch.tv/helix/clips?game_id=21779");
    }

    #[test]
    fn build_url_keeps_repeated_keys() {
        let url = clips_endpoint()
            .build_url(&[("id", "a".to_string()), ("id", "b".to_string())])
            .expect("url should build");
        assert_eq!(url.query(), Some("id=a&id=b"));
    }

    #[test]
    fn build_url_lists_missing_required_params() {
        let endpoint = Endpoint::new(
            "https://www.googleapis.com/upload/youtube/v3",
            "videos",
            &["uploadType", "part"],
            &["notifySubscribers"],
        )
        .expect("endpoint should build");
        let err = endpoint
            .build_url(&[("uploadType", String::new())])
            .expect_err("missing params must fail");
        assert!(matches!(
            err,
            CompyleError::MissingParams(p) if p == vec!["part".to_string(), "uploadType".to_string()]
        ));
    }

    #[test]
    fn trailing_slash_policy_applies_both_ways() {
        let mut with_slash = Router::new(reqwest::Client::new(), true);
        with_slash.register("clips", clips_endpoint()).expect("register");
        assert_eq!(
            with_slash.route("clips", &[]).expect("route").as_str(),
            "https://api.twitch.tv/helix/clips/"
        );

        let mut without = Router::new(reqwest::Client::new(), false);
        without
            .register(
                "games",
                Endpoint::new("https://api.twitch.tv/helix/", "games/", &[], &[]).expect("endpoint"),
            )
            .expect("register");
        assert_eq!(
            without.route("games", &[]).expect("route").as_str(),
            "https://api.twitch.tv/helix/games"
        );
    }

    #[test]
    fn unknown_and_blank_routes_fail() {
        let mut router = Router::new(reqwest::Client::new(), false);
        assert!(matches!(
            router.register("  ", clips_endpoint()),
            Err(CompyleError::MalformedNamespace)
        ));
        router.register("clips", clips_endpoint()).expect("register");
        router.register("auth", clips_endpoint()).expect("register");
        assert_eq!(router.registered(), vec!["auth", "clips"]);
        assert!(router.is_registered("clips"));
        assert!(matches!(
            router.route("games", &[]),
            Err(CompyleError::UnknownRoute(name)) if name == "games"
        ));
    }

    #[test]
    fn url_params_are_merged() {
        let url = Url::parse("https://example.com/cb?a=1&b=2&a=3").expect("url");
        assert_eq!(
            extract_url_params(&url),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "3".to_string()),
            ]
        );
        let merged = add_url_params(&url, &[("a", "9".to_string()), ("c", "x y".to_string())]);
        assert_eq!(merged.query(), Some("b=2&a=9&c=x+y"));
    }
}
