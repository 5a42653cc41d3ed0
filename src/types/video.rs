use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upload privacy of a YouTube video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Public,
    #[default]
    Private,
    Unlisted,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Unlisted => "unlisted",
        }
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sidecar written by `edit` next to the video and consumed by `publish`.
///
/// File names are relative to the directory holding the metadata file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    #[serde(default)]
    pub privacy_status: PrivacyStatus,
    pub video_file: String,
    #[serde(default)]
    pub thumbnail_file: Option<String>,
    pub clips: Vec<String>,
    /// Seconds.
    pub duration: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub youtube_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privacy_status_uses_youtube_names() {
        assert_eq!(
            serde_json::to_string(&PrivacyStatus::Unlisted).expect("serialize"),
            r#""unlisted""#
        );
        assert_eq!(PrivacyStatus::default(), PrivacyStatus::Private);
        assert_eq!(PrivacyStatus::Public.to_string(), "public");
    }
}
