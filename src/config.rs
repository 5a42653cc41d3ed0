//! Runtime configuration.
//!
//! Values are merged with figment from (lowest precedence first):
//! 1. built-in defaults
//! 2. the process environment, after `.env` has been loaded by `main`
//!
//! Credentials keep the historical variable names (`TWITCH_APP_*`,
//! `YOUTUBE_APP_*`, `DEBUG`), tuning knobs use the `COMPYLE_` prefix.

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CompyleError, Result};

/// Folder used for collect reports when neither an output nor a database is configured.
pub const DEFAULT_REPORT_FOLDER: &str = "reports/";

/// Folder receiving the edited videos and their metadata.
pub const DEFAULT_VIDEO_FOLDER: &str = "videos/";

const ROOT_KEYS: &[&str] = &[
    "debug",
    "loglevel",
    "database_url",
    "twitch_app_client_id",
    "twitch_app_client_secret",
    "twitch_app_redirect_uri",
    "youtube_app_client_id",
    "youtube_app_client_secret",
    "youtube_app_redirect_uri",
    "youtube_app_email_address",
    "youtube_token_path",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_flag")]
    pub debug: bool,
    pub loglevel: Option<String>,
    pub database_url: Option<String>,

    pub twitch_app_client_id: Option<String>,
    pub twitch_app_client_secret: Option<String>,
    pub twitch_app_redirect_uri: String,

    pub youtube_app_client_id: Option<String>,
    pub youtube_app_client_secret: Option<String>,
    pub youtube_app_redirect_uri: String,
    pub youtube_app_email_address: Option<String>,
    pub youtube_token_path: PathBuf,

    pub settings: Settings,
}

/// Collect, edit and publish tuning, read from `COMPYLE_*` variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub game_name: String,
    /// Past period, in days, to retrieve the clips from.
    pub period: u32,
    /// Clips with fewer views end the scan of the current page.
    pub min_views: u64,
    pub max_clips: usize,
    pub min_duration: f64,
    pub max_duration: f64,
    /// ISO-639-1 code; empty accepts every language.
    pub language: String,
    /// Broadcaster ids whose clips are kept regardless of the other criteria.
    #[serde(deserialize_with = "deserialize_ids")]
    pub whitelist: Vec<String>,
    #[serde(deserialize_with = "deserialize_ids")]
    pub blacklist: Vec<String>,
    pub pages: usize,
    pub page_size: u32,
    /// ISO 3166-1 alpha-2 region used to resolve YouTube categories.
    pub region_code: String,
    pub category_id: String,
    pub ffmpeg: String,
    pub edit_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            loglevel: None,
            database_url: None,
            twitch_app_client_id: None,
            twitch_app_client_secret: None,
            twitch_app_redirect_uri: "http://localhost".to_string(),
            youtube_app_client_id: None,
            youtube_app_client_secret: None,
            youtube_app_redirect_uri: "http://localhost:3000".to_string(),
            youtube_app_email_address: None,
            youtube_token_path: PathBuf::from(".youtube_token.json"),
            settings: Settings::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            game_name: "League of Legends".to_string(),
            period: 2,
            min_views: 50,
            max_clips: 20,
            min_duration: 5.0,
            max_duration: 40.0,
            language: "fr".to_string(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            pages: 10,
            page_size: 100,
            region_code: "FR".to_string(),
            category_id: "20".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            edit_concurrency: 4,
        }
    }
}

impl Config {
    /// Load the configuration from defaults and the environment.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Env::raw().only(ROOT_KEYS))
            .merge(
                Env::prefixed("COMPYLE_")
                    .map(|key| format!("settings.{}", key.as_str()).into()),
            );

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.settings;
        if s.min_duration >= s.max_duration {
            return Err(CompyleError::ConfigValidation(format!(
                "min_duration ({}) must be lower than max_duration ({})",
                s.min_duration, s.max_duration
            )));
        }
        if s.period == 0 {
            return Err(CompyleError::ConfigValidation(
                "period must be at least 1 day".to_string(),
            ));
        }
        if !(1..=100).contains(&s.page_size) {
            return Err(CompyleError::ConfigValidation(format!(
                "page_size ({}) must be between 1 and 100",
                s.page_size
            )));
        }
        if s.edit_concurrency == 0 {
            return Err(CompyleError::ConfigValidation(
                "edit_concurrency must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether clips are stored in a database instead of report files.
    pub fn has_database(&self) -> bool {
        self.database_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    /// Log level used when `RUST_LOG` is not set and no `-v` flag was given.
    pub fn default_loglevel(&self) -> String {
        match (&self.loglevel, self.debug) {
            (Some(level), _) => level.clone(),
            (None, true) => "debug".to_string(),
            (None, false) => "warn".to_string(),
        }
    }

    pub fn twitch_credentials(&self) -> Result<(String, String)> {
        let id = non_empty(&self.twitch_app_client_id).ok_or(CompyleError::MissingConfig(
            "TWITCH_APP_CLIENT_ID",
        ))?;
        let secret = non_empty(&self.twitch_app_client_secret).ok_or(
            CompyleError::MissingConfig("TWITCH_APP_CLIENT_SECRET"),
        )?;
        Ok((id, secret))
    }

    pub fn youtube_credentials(&self) -> Result<(String, String)> {
        let id = non_empty(&self.youtube_app_client_id).ok_or(CompyleError::MissingConfig(
            "YOUTUBE_APP_CLIENT_ID",
        ))?;
        let secret = non_empty(&self.youtube_app_client_secret).ok_or(
            CompyleError::MissingConfig("YOUTUBE_APP_CLIENT_SECRET"),
        )?;
        Ok((id, secret))
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Accepts booleans as well as the `"True"`/`"1"`/`"yes"` strings found in `.env` files.
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
        Flag::Text(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
    })
}

/// Broadcaster ids are numeric, so env values such as `[71092938, 50985620]`,
/// `71092938` or `"a,b"` must all end up as strings.
fn deserialize_ids<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Int(i64),
        Text(String),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ids {
        Many(Vec<Id>),
        One(Id),
    }

    let ids = match Ids::deserialize(deserializer)? {
        Ids::Many(ids) => ids,
        Ids::One(id) => vec![id],
    };
    Ok(ids
        .into_iter()
        .flat_map(|id| match id {
            Id::Int(i) => vec![i.to_string()],
            Id::Text(s) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        })
        .collect())
}
