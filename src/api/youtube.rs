use crate::api::routing::{Endpoint, RequestBody, Router};
use crate::error::{CompyleError, Result};
use crate::google_oauth::endpoints::{GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, GoogleOauthEndpoints};
use crate::types::video::VideoMetadata;
use crate::types::youtube::{Category, CategoryList, UploadedVideo, VideoResource};
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, LOCATION};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const YOUTUBE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3";

/// Uploads of a full compilation take a while.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct YoutubeUrls {
    pub auth: String,
    pub token: String,
    pub api: String,
    pub upload: String,
}

impl Default for YoutubeUrls {
    fn default() -> Self {
        Self {
            auth: GOOGLE_AUTH_URL.to_string(),
            token: GOOGLE_TOKEN_URL.to_string(),
            api: YOUTUBE_API_URL.to_string(),
            upload: YOUTUBE_UPLOAD_URL.to_string(),
        }
    }
}

/// YouTube Data API client.
pub struct YoutubeApi {
    router: Router,
    access_token: Option<String>,
}

impl YoutubeApi {
    pub fn new(http: reqwest::Client, urls: &YoutubeUrls) -> Result<Self> {
        Ok(Self {
            router: build_router(http, urls)?,
            access_token: None,
        })
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// OAuth endpoints bound to the registered `auth` and `token` routes.
    pub fn oauth_endpoints(
        &self,
        client_id: &str,
        client_secret: &str,
        redirect_url: Url,
    ) -> Result<GoogleOauthEndpoints> {
        Ok(GoogleOauthEndpoints::new(
            client_id,
            client_secret,
            self.router.endpoint("auth")?.url()?,
            self.router.endpoint("token")?.url()?,
            redirect_url,
        ))
    }

    pub fn set_access_token(&mut self, access_token: String) {
        self.access_token = Some(access_token);
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let token = self
            .access_token
            .as_ref()
            .ok_or(CompyleError::MissingAccessToken)?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
        Ok(headers)
    }

    /// Assignable categories of `region_code`, as `(title, id)`.
    pub async fn get_categories(&self, region_code: &str) -> Result<Vec<Category>> {
        let response = self
            .router
            .request(
                Method::GET,
                "categories",
                self.auth_headers()?,
                RequestBody::Empty,
                &[("part", "snippet".to_string()), ("regionCode", region_code.to_string())],
            )
            .await?;
        let list: CategoryList = response.json().await?;
        Ok(list.assignable())
    }

    pub async fn is_category(&self, id: &str) -> Result<bool> {
        let response = self
            .router
            .request(
                Method::GET,
                "categories",
                self.auth_headers()?,
                RequestBody::Empty,
                &[("part", "snippet".to_string()), ("id", id.to_string())],
            )
            .await?;
        let list: CategoryList = response.json().await?;
        Ok(!list.items.is_empty())
    }

    /// Upload the video described by `metadata` (files relative to `dir`)
    /// and return its id. The thumbnail is set when one is present; failing
    /// to set it does not fail the upload.
    pub async fn upload_video(&self, metadata: &VideoMetadata, dir: &Path) -> Result<String> {
        let video_path = dir.join(&metadata.video_file);
        let data = Bytes::from(tokio::fs::read(&video_path).await?);
        info!(path = %video_path.display(), bytes = data.len(), "uploading video");

        let session = self.start_upload_session(metadata, data.len()).await?;
        let response = self
            .router
            .execute(
                Method::PUT,
                "upload",
                session,
                self.auth_headers()?,
                RequestBody::Bytes {
                    content_type: "video/*".to_string(),
                    data,
                },
            )
            .await?;
        let uploaded: UploadedVideo = response.json().await?;
        info!(video_id = %uploaded.id, "video uploaded");

        // Unverified channels answer 403 here; the video exists either way.
        if let Some(thumbnail) = metadata.thumbnail_file.as_deref() {
            if let Err(e) = self.set_thumbnail(&uploaded.id, &dir.join(thumbnail)).await {
                warn!(video_id = %uploaded.id, error = %e, "thumbnail not set");
            }
        }
        Ok(uploaded.id)
    }

    /// Start a resumable upload and return the session URL.
    async fn start_upload_session(&self, metadata: &VideoMetadata, length: usize) -> Result<Url> {
        let mut headers = self.auth_headers()?;
        headers.insert("x-upload-content-type", HeaderValue::from_static("video/*"));
        headers.insert("x-upload-content-length", HeaderValue::from(length));

        let resource = VideoResource::from(metadata);
        let response = self
            .router
            .request(
                Method::POST,
                "upload",
                headers,
                RequestBody::Json(serde_json::to_value(&resource)?),
                &[
                    ("uploadType", "resumable".to_string()),
                    ("part", "snippet,status".to_string()),
                    ("notifySubscribers", "true".to_string()),
                ],
            )
            .await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                CompyleError::UnexpectedResponse("resumable session without Location".to_string())
            })?;
        Ok(Url::parse(location)?)
    }

    pub async fn set_thumbnail(&self, video_id: &str, path: &Path) -> Result<()> {
        let data = Bytes::from(tokio::fs::read(path).await?);
        self.router
            .request(
                Method::POST,
                "thumbnail",
                self.auth_headers()?,
                RequestBody::Bytes {
                    content_type: "image/jpeg".to_string(),
                    data,
                },
                &[
                    ("videoId", video_id.to_string()),
                    ("uploadType", "media".to_string()),
                ],
            )
            .await?;
        info!(video_id = %video_id, "thumbnail set");
        Ok(())
    }
}

pub fn video_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

pub fn build_router(http: reqwest::Client, urls: &YoutubeUrls) -> Result<Router> {
    let mut router = Router::new(http, false).with_timeout(UPLOAD_TIMEOUT);
    router.register("auth", Endpoint::new(&urls.auth, "auth", &[], &[])?)?;
    router.register("token", Endpoint::new(&urls.token, "token", &[], &[])?)?;
    router.register(
        "categories",
        Endpoint::new(&urls.api, "videoCategories", &["part"], &["id", "regionCode", "hl"])?,
    )?;
    router.register(
        "upload",
        Endpoint::new(
            &urls.upload,
            "videos",
            &["uploadType", "part"],
            &["notifySubscribers"],
        )?,
    )?;
    router.register(
        "thumbnail",
        Endpoint::new(&urls.upload, "thumbnails/set", &["videoId"], &["uploadType"])?,
    )?;
    Ok(router)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| CompyleError::UnexpectedResponse(e.to_string()))
}
