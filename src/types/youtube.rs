use serde::{Deserialize, Serialize};

use super::video::VideoMetadata;

/// Assignable video category of a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub title: String,
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryList {
    #[serde(default)]
    pub items: Vec<CategoryItem>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryItem {
    pub id: String,
    pub snippet: CategorySnippet,
}

#[derive(Debug, Deserialize)]
pub struct CategorySnippet {
    pub title: String,
    #[serde(default)]
    pub assignable: bool,
}

impl CategoryList {
    pub fn assignable(self) -> Vec<Category> {
        self.items
            .into_iter()
            .filter(|item| item.snippet.assignable)
            .map(|item| Category {
                title: item.snippet.title,
                id: item.id,
            })
            .collect()
    }
}

/// YouTube refuses longer titles.
pub const MAX_TITLE_CHARS: usize = 100;
/// YouTube refuses longer descriptions (in bytes).
pub const MAX_DESCRIPTION_BYTES: usize = 5000;

/// `videos.insert` resource body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResource {
    pub snippet: VideoSnippet,
    pub status: VideoStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    pub privacy_status: String,
    pub self_declared_made_for_kids: bool,
}

impl From<&VideoMetadata> for VideoResource {
    fn from(meta: &VideoMetadata) -> Self {
        Self {
            snippet: VideoSnippet {
                title: truncate_chars(&meta.title, MAX_TITLE_CHARS),
                description: truncate_bytes(&meta.description, MAX_DESCRIPTION_BYTES),
                tags: meta.tags.clone(),
                category_id: meta.category_id.clone(),
            },
            status: VideoStatus {
                privacy_status: meta.privacy_status.to_string(),
                self_declared_made_for_kids: false,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadedVideo {
    pub id: String,
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn truncate_bytes(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
