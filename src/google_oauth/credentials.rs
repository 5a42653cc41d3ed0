use crate::error::CompyleError;
use chrono::{DateTime, Duration, Utc};
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::{debug, info};

/// Tokens expiring within this margin are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Google access lasts one hour when the response omits `expires_in`.
const DEFAULT_LIFETIME_SECS: i64 = 3600;

/// YouTube OAuth token persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YoutubeToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl YoutubeToken {
    /// Build from a token response. Google omits the refresh token on refresh,
    /// in which case `previous_refresh` is kept.
    pub fn from_response(response: &BasicTokenResponse, previous_refresh: Option<String>) -> Self {
        let lifetime = response
            .expires_in()
            .and_then(|d| i64::try_from(d.as_secs()).ok())
            .unwrap_or(DEFAULT_LIFETIME_SECS);
        Self {
            access_token: response.access_token().secret().to_string(),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or(previous_refresh),
            expiry: Utc::now() + Duration::seconds(lifetime),
            scopes: response
                .scopes()
                .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default(),
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expiry > now + Duration::seconds(EXPIRY_MARGIN_SECS)
    }

    /// Read the cached token; a missing file yields `None`.
    pub fn load(path: &Path) -> Result<Option<Self>, CompyleError> {
        if !path.exists() {
            debug!(path = %path.display(), "no cached YouTube token");
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), CompyleError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "YouTube token cached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn token(expiry: DateTime<Utc>) -> YoutubeToken {
        YoutubeToken {
            access_token: "ya29.token".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expiry,
            scopes: vec!["https://www.googleapis.com/auth/youtube.upload".to_string()],
        }
    }

    #[test]
    fn tokens_close_to_expiry_are_stale() {
        let now = Utc::now();
        assert!(token(now + Duration::minutes(30)).is_fresh(now));
        assert!(!token(now + Duration::seconds(30)).is_fresh(now));
        assert!(!token(now - Duration::minutes(1)).is_fresh(now));
    }

    #[test]
    fn refresh_response_keeps_previous_refresh_token() {
        let response: BasicTokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "ya29.new",
            "token_type": "Bearer",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/youtube.upload"
        }))
        .expect("token response should parse");

        let token = YoutubeToken::from_response(&response, Some("1//refresh".to_string()));
        assert_eq!(token.access_token, "ya29.new");
        assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(token.scopes.len(), 1);
        assert!(token.is_fresh(Utc::now()));
    }

    #[test]
    fn cache_file_round_trips() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!("compyle-token-{}-{}", std::process::id(), nanos));
        path.push("token.json");

        assert_eq!(YoutubeToken::load(&path).expect("load"), None);

        let original = token("2030-01-01T00:00:00Z".parse().expect("timestamp"));
        original.save(&path).expect("save");
        assert_eq!(YoutubeToken::load(&path).expect("load"), Some(original));

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }
}
