use crate::api::youtube::{YoutubeApi, YoutubeUrls, video_url};
use crate::api::{http_client, oauth_http_client};
use crate::config::{Config, DEFAULT_VIDEO_FOLDER};
use crate::error::CompyleError;
use crate::google_oauth::GoogleOauthService;
use crate::service::edit::METADATA_FILE;
use crate::service::files;
use crate::types::video::{PrivacyStatus, VideoMetadata};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub input: Option<PathBuf>,
    pub privacy: Option<PrivacyStatus>,
    pub category: Option<String>,
}

/// The metadata file for `input`: the file itself, the one in the directory,
/// or the one of the most recent output directory.
pub fn resolve_metadata(input: &Path) -> Result<PathBuf, CompyleError> {
    if input.is_file() {
        return Ok(input.to_path_buf());
    }
    let direct = input.join(METADATA_FILE);
    if direct.is_file() {
        return Ok(direct);
    }
    if input.is_dir() {
        if let Some(dir) = files::latest_entry(input, |p| p.join(METADATA_FILE).is_file())? {
            return Ok(dir.join(METADATA_FILE));
        }
    }
    Err(CompyleError::NothingToLoad(input.to_path_buf()))
}

pub fn load_metadata(path: &Path) -> Result<VideoMetadata, CompyleError> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Fail unless `id` is a YouTube category, listing the assignable ones of
/// `region_code` in the error.
pub async fn ensure_category(
    youtube: &YoutubeApi,
    id: &str,
    region_code: &str,
) -> Result<(), CompyleError> {
    if youtube.is_category(id).await? {
        return Ok(());
    }
    let available: Vec<String> = youtube
        .get_categories(region_code)
        .await?
        .into_iter()
        .map(|c| format!("{} ({})", c.id, c.title))
        .collect();
    Err(CompyleError::ConfigValidation(format!(
        "unknown YouTube category `{id}`; assignable in {region_code}: {}",
        available.join(", ")
    )))
}

/// Upload the latest (or given) compilation and return its YouTube URL.
pub async fn publish(config: &Config, options: PublishOptions) -> Result<String, CompyleError> {
    let input = options
        .input
        .unwrap_or_else(|| PathBuf::from(DEFAULT_VIDEO_FOLDER));
    let metadata_path = resolve_metadata(&input)?;
    let mut metadata = load_metadata(&metadata_path)?;
    if let Some(privacy) = options.privacy {
        metadata.privacy_status = privacy;
    }
    if let Some(category) = options.category {
        metadata.category_id = category;
    }
    if let Some(id) = metadata.youtube_id.as_deref() {
        warn!(path = %metadata_path.display(), video_id = %id, "compilation already published");
        return Ok(video_url(id));
    }
    let dir = metadata_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let (client_id, client_secret) = config.youtube_credentials()?;
    let mut youtube = YoutubeApi::new(http_client()?, &YoutubeUrls::default())?;
    let redirect_url = Url::parse(&config.youtube_app_redirect_uri)?;
    let oauth = GoogleOauthService::new(
        youtube.oauth_endpoints(&client_id, &client_secret, redirect_url.clone())?,
        oauth_http_client()?,
        redirect_url,
        config.youtube_token_path.clone(),
        config.youtube_app_email_address.clone(),
    );
    let token = oauth.access_token().await?;
    youtube.set_access_token(token.access_token);

    ensure_category(&youtube, &metadata.category_id, &config.settings.region_code).await?;

    let video_id = youtube.upload_video(&metadata, &dir).await?;
    metadata.youtube_id = Some(video_id.clone());
    fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;

    let url = video_url(&video_id);
    info!(url = %url, privacy = %metadata.privacy_status, "video published");
    Ok(url)
}
