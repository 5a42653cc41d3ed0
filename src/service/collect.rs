use crate::api::twitch::{TwitchApi, TwitchUrls};
use crate::api::{http_client, oauth_http_client};
use crate::config::{Config, DEFAULT_REPORT_FOLDER};
use crate::db::ClipStorage;
use crate::error::CompyleError;
use crate::service::files;
use crate::service::selector::ClipSelection;
use std::path::PathBuf;
use tracing::info;

/// Where the collected clips ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum Collected {
    Stored { count: usize },
    Written { path: PathBuf, count: usize },
}

#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    /// Report destination; the database is used when absent and configured.
    pub output: Option<String>,
    pub game_name: Option<String>,
    pub period: Option<u32>,
}

/// Retrieve the clips of a game and save them to the database or a report.
pub async fn collect(config: &Config, options: CollectOptions) -> Result<Collected, CompyleError> {
    let output = match options.output {
        Some(output) => Some(output),
        None if config.has_database() => None,
        None => Some(DEFAULT_REPORT_FOLDER.to_string()),
    };
    let game_name = options
        .game_name
        .unwrap_or_else(|| config.settings.game_name.clone());
    let mut criteria = ClipSelection::from(&config.settings);
    if let Some(period) = options.period {
        criteria.period = period.max(1);
    }

    let (client_id, client_secret) = config.twitch_credentials()?;
    let twitch = TwitchApi::connect(
        &client_id,
        &client_secret,
        http_client()?,
        &oauth_http_client()?,
        &TwitchUrls::default(),
    )
    .await?;

    let game_id = twitch.get_game_id(&game_name).await?;
    info!(game = %game_name, game_id = %game_id, period = criteria.period, "collecting clips");
    let clips = twitch.get_game_clips(&game_id, criteria).await?;

    match output {
        Some(output) => {
            let stamp = files::stamp(&chrono::Local::now());
            let path = files::resolve_report_path(&output, &game_name, &stamp);
            files::write_report(&path, &clips)?;
            Ok(Collected::Written {
                path,
                count: clips.len(),
            })
        }
        None => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or(CompyleError::MissingConfig("DATABASE_URL"))?;
            let storage = ClipStorage::connect(database_url).await?;
            let ids = storage.insert_clips(&clips).await?;
            Ok(Collected::Stored { count: ids.len() })
        }
    }
}
