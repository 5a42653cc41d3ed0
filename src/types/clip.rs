use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const PREVIEW_MARKER: &str = "-preview-";

/// Twitch Helix clip, enriched with the download and channel URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub embed_url: String,
    pub broadcaster_id: String,
    pub broadcaster_name: String,
    #[serde(default)]
    pub creator_id: String,
    #[serde(default)]
    pub creator_name: String,
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub game_id: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub view_count: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub thumbnail_url: String,
    /// Seconds.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub vod_offset: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcaster_url: Option<String>,

    /// Fields Twitch may add later; kept so reports round-trip untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Clip {
    /// Downloadable mp4 derived from the thumbnail location.
    ///
    /// `https://clips-media-assets2.twitch.tv/vod-1669323688-offset-22038-preview-480x272.jpg`
    /// becomes `https://clips-media-assets2.twitch.tv/vod-1669323688-offset-22038.mp4`.
    pub fn derive_clip_url(&self) -> Option<String> {
        let index = self.thumbnail_url.find(PREVIEW_MARKER)?;
        Some(format!("{}.mp4", &self.thumbnail_url[..index]))
    }

    /// Whether the VOD this clip was cut from is still available.
    pub fn has_vod(&self) -> bool {
        !self.video_id.is_empty() && self.vod_offset.is_some()
    }

    /// Two clips overlap when they come from the same VOD and their offsets are
    /// closer than the longest of the two.
    pub fn overlaps(&self, other: &Clip) -> bool {
        match (self.vod_offset, other.vod_offset) {
            (Some(a), Some(b)) if self.video_id == other.video_id => {
                ((a - b).abs() as f64) <= self.duration.max(other.duration)
            }
            _ => false,
        }
    }
}

pub fn broadcaster_url(broadcaster_name: &str) -> String {
    format!("https://www.twitch.tv/{broadcaster_name}")
}


#[cfg(test)]
mod tests {
    use super::fixtures::clip;
    use super::*;

    #[test]
    fn clip_url_is_derived_from_thumbnail() {
        let mut c = clip("AwesomeClip", "gotaga", 100);
        c.thumbnail_url =
            "https://clips-media-assets2.twitch.tv/vod-1669323688-offset-22038-preview-480x272.jpg"
                .to_string();
        assert_eq!(
            c.derive_clip_url().as_deref(),
            Some("https://clips-media-assets2.twitch.tv/vod-1669323688-offset-22038.mp4")
        );
    }

    #[test]
    fn clip_url_requires_preview_marker() {
        let mut c = clip("AwesomeClip", "gotaga", 100);
        c.thumbnail_url = "https://static-cdn.jtvnw.net/thumb.jpg".to_string();
        assert!(c.derive_clip_url().is_none());
    }

    #[test]
    fn overlapping_clips_share_a_vod() {
        let mut a = clip("a", "gotaga", 100);
        let mut b = clip("b", "gotaga", 90);
        b.video_id = a.video_id.clone();
        a.vod_offset = Some(100);
        b.vod_offset = Some(115);
        assert!(a.overlaps(&b));

        b.vod_offset = Some(200);
        assert!(!a.overlaps(&b));

        b.vod_offset = Some(115);
        b.video_id = "other".to_string();
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let payload = serde_json::json!({
            "id": "abc",
            "broadcaster_id": "1",
            "broadcaster_name": "kameto",
            "created_at": "2023-09-21T18:00:00Z",
            "duration": 12.5,
            "vod_offset": null,
            "is_featured": true
        });
        let parsed: Clip = serde_json::from_value(payload).expect("clip should parse");
        assert_eq!(parsed.extra.get("is_featured"), Some(&Value::Bool(true)));
        assert!(!parsed.has_vod());

        let back = serde_json::to_value(&parsed).expect("clip should serialize");
        assert_eq!(back["is_featured"], Value::Bool(true));
        assert!(back.get("clip_url").is_none());
    }
}
