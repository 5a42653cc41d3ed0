//! Turns a clip selection into a compilation ready to publish.

use crate::api::http_client;
use crate::config::{Config, DEFAULT_REPORT_FOLDER, DEFAULT_VIDEO_FOLDER};
use crate::db::ClipStorage;
use crate::error::CompyleError;
use crate::service::ffmpeg::{Encoding, Ffmpeg};
use crate::service::files;
use crate::service::rearrange::{MAX_REARRANGE_LEN, rearrange_clips};
use crate::service::timeline::{self, Timeline};
use crate::types::clip::Clip;
use crate::types::video::{PrivacyStatus, VideoMetadata};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub const VIDEO_FILE: &str = "clips.mp4";
pub const THUMBNAIL_FILE: &str = "thumbnail.jpg";
pub const METADATA_FILE: &str = "metadata.json";

/// Removes the working directory when the run ends, also on error.
struct WorkDir(PathBuf);

impl WorkDir {
    fn create(parent: &Path) -> Result<Self, CompyleError> {
        let path = parent.join(format!(".work-{}", std::process::id()));
        std::fs::create_dir_all(&path)?;
        Ok(Self(path))
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.0) {
            warn!(path = %self.0.display(), error = %e, "failed to remove working directory");
        }
    }
}

pub struct Editor {
    http: reqwest::Client,
    ffmpeg: Ffmpeg,
    concurrency: usize,
    category_id: String,
}

/// A downloaded clip waiting for normalization.
struct Source {
    clip: Clip,
    path: PathBuf,
}

/// A clip rendered as a segment of the compilation.
struct Segment {
    source: Source,
    path: PathBuf,
    faded: bool,
}

impl Editor {
    pub fn new(http: reqwest::Client, ffmpeg: Ffmpeg, concurrency: usize, category_id: String) -> Self {
        Self {
            http,
            ffmpeg,
            concurrency: concurrency.max(1),
            category_id,
        }
    }

    /// Render `clips` into `<output>/<stamp>/` and return the metadata path.
    pub async fn edit(&self, clips: Vec<Clip>, output: &Path) -> Result<PathBuf, CompyleError> {
        if clips.is_empty() {
            return Err(CompyleError::EmptySelection);
        }
        let clips = rearrange_clips(clips, MAX_REARRANGE_LEN);

        // ffmpeg resolves concat entries against the list location
        let target = std::path::absolute(output.join(files::stamp(&chrono::Local::now())))?;
        tokio::fs::create_dir_all(&target).await?;
        let work = WorkDir::create(&target)?;
        info!(clips = clips.len(), output = %target.display(), "editing compilation");

        let segments = self.render_all(clips, &work.0).await;
        if segments.is_empty() {
            drop(work);
            if let Err(e) = tokio::fs::remove_dir_all(&target).await {
                warn!(path = %target.display(), error = %e, "failed to remove output directory");
            }
            return Err(CompyleError::EmptySelection);
        }

        let paths: Vec<PathBuf> = segments.iter().map(|s| s.path.clone()).collect();
        self.ffmpeg.concat(&paths, &target.join(VIDEO_FILE)).await?;

        let clips: Vec<Clip> = segments.into_iter().map(|s| s.source.clip).collect();
        let thumbnail_file = match self.download_thumbnail(&clips[0], &target).await {
            Ok(()) => Some(THUMBNAIL_FILE.to_string()),
            Err(e) => {
                warn!(error = %e, "thumbnail unavailable");
                None
            }
        };

        let metadata = build_metadata(&clips, &self.category_id, thumbnail_file);
        let metadata_path = target.join(METADATA_FILE);
        tokio::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?).await?;
        drop(work);

        info!(
            path = %metadata_path.display(),
            duration = metadata.duration,
            "compilation ready"
        );
        Ok(metadata_path)
    }

    /// Download then normalize every clip, in order, skipping the failures.
    /// Only the first segment of the compilation has no fade-in.
    async fn render_all(&self, clips: Vec<Clip>, work: &Path) -> Vec<Segment> {
        let sources: Vec<Source> = stream::iter(clips.into_iter().enumerate())
            .map(|(index, clip)| async move {
                match self.fetch(index, &clip, work).await {
                    Ok(path) => Some(Source { clip, path }),
                    Err(e) => {
                        warn!(clip = %clip.id, error = %e, "clip skipped");
                        None
                    }
                }
            })
            .buffered(self.concurrency)
            .filter_map(|source| async move { source })
            .collect()
            .await;

        let mut segments: Vec<Segment> = stream::iter(sources.into_iter().enumerate())
            .map(|(index, source)| async move {
                let fade_in = index > 0;
                match self.normalize(index, &source, work, fade_in).await {
                    Ok(path) => Some(Segment {
                        source,
                        path,
                        faded: fade_in,
                    }),
                    Err(e) => {
                        warn!(clip = %source.clip.id, error = %e, "clip skipped");
                        None
                    }
                }
            })
            .buffered(self.concurrency)
            .filter_map(|segment| async move { segment })
            .collect()
            .await;

        // The first clip failed to normalize: its successor now opens the video.
        while let Some(first) = segments.first_mut().filter(|s| s.faded) {
            let outcome = self
                .ffmpeg
                .normalize(
                    &first.source.path,
                    &first.path,
                    first.source.clip.duration,
                    &first.source.clip.broadcaster_name,
                    false,
                )
                .await;
            match outcome {
                Ok(()) => first.faded = false,
                Err(e) => {
                    warn!(clip = %first.source.clip.id, error = %e, "clip skipped");
                    segments.remove(0);
                }
            }
        }
        segments
    }

    async fn fetch(&self, index: usize, clip: &Clip, work: &Path) -> Result<PathBuf, CompyleError> {
        let url = clip
            .clip_url
            .clone()
            .or_else(|| clip.derive_clip_url())
            .ok_or_else(|| CompyleError::UnexpectedResponse(format!("clip {} has no url", clip.id)))?;
        let source = work.join(format!("{index:03}-source.mp4"));
        download(&self.http, &url, &source).await?;
        debug!(clip = %clip.id, "clip downloaded");
        Ok(source)
    }

    async fn normalize(
        &self,
        index: usize,
        source: &Source,
        work: &Path,
        fade_in: bool,
    ) -> Result<PathBuf, CompyleError> {
        let segment = work.join(format!("{index:03}-segment.mp4"));
        self.ffmpeg
            .normalize(
                &source.path,
                &segment,
                source.clip.duration,
                &source.clip.broadcaster_name,
                fade_in,
            )
            .await?;
        debug!(clip = %source.clip.id, "clip normalized");
        Ok(segment)
    }

    async fn download_thumbnail(&self, clip: &Clip, target: &Path) -> Result<(), CompyleError> {
        if clip.thumbnail_url.is_empty() {
            return Err(CompyleError::UnexpectedResponse(format!(
                "clip {} has no thumbnail",
                clip.id
            )));
        }
        download(&self.http, &clip.thumbnail_url, &target.join(THUMBNAIL_FILE)).await
    }
}

/// Stream `url` into `path`.
async fn download(http: &reqwest::Client, url: &str, path: &Path) -> Result<(), CompyleError> {
    let response = http.get(url).send().await?.error_for_status()?;
    let mut file = tokio::fs::File::create(path).await?;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct EditOptions {
    /// Report file or folder; the database (or the default report folder) when absent.
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Clips to edit: the given report, else the latest clips of the database,
/// else the most recent report.
pub async fn load_clips(config: &Config, input: Option<&Path>) -> Result<Vec<Clip>, CompyleError> {
    let report = match input {
        Some(input) => files::resolve_input_file(input)?,
        None => match config.database_url.as_deref().filter(|_| config.has_database()) {
            Some(url) => {
                let storage = ClipStorage::connect(url).await?;
                let stored = storage
                    .list_latest_clips(Some(config.settings.max_clips))
                    .await?;
                info!(count = stored.len(), "clips loaded from database");
                return Ok(stored.into_iter().map(Clip::from).collect());
            }
            None => files::resolve_input_file(Path::new(DEFAULT_REPORT_FOLDER))?,
        },
    };
    let clips = files::read_report(&report)?;
    info!(path = %report.display(), count = clips.len(), "clips loaded from report");
    Ok(clips)
}

/// Edit the selected clips and return the path of the compilation metadata.
pub async fn edit(config: &Config, options: EditOptions) -> Result<PathBuf, CompyleError> {
    let clips = load_clips(config, options.input.as_deref()).await?;
    let output = options
        .output
        .unwrap_or_else(|| PathBuf::from(DEFAULT_VIDEO_FOLDER));
    let editor = Editor::new(
        http_client()?,
        Ffmpeg::new(config.settings.ffmpeg.clone(), Encoding::new(config.debug)),
        config.settings.edit_concurrency,
        config.settings.category_id.clone(),
    );
    editor.edit(clips, &output).await
}

/// Metadata of a compilation made of `clips`, in order.
pub fn build_metadata(
    clips: &[Clip],
    category_id: &str,
    thumbnail_file: Option<String>,
) -> VideoMetadata {
    let timeline = Timeline::new(clips.iter().map(|c| (c, c.duration)));
    VideoMetadata {
        title: timeline::title(clips),
        description: timeline.description(),
        tags: timeline::tags(clips),
        category_id: category_id.to_string(),
        privacy_status: PrivacyStatus::default(),
        video_file: VIDEO_FILE.to_string(),
        thumbnail_file,
        clips: clips.iter().map(|c| c.id.clone()).collect(),
        duration: timeline.duration,
        created_at: Utc::now(),
        youtube_id: None,
    }
}
