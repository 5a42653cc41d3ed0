use serde::{Deserialize, Serialize};

/// Paginated Helix envelope: `{"data": [...], "pagination": {"cursor": "..."}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct HelixPage<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub cursor: Option<String>,
}

impl<T> HelixPage<T> {
    /// Cursor of the next page, if Twitch returned a usable one.
    pub fn next_cursor(&self) -> Option<&str> {
        self.pagination.cursor.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub box_art_url: String,
    #[serde(default)]
    pub igdb_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub igdb_url: Option<String>,
}

impl Game {
    pub fn with_igdb_url(mut self) -> Self {
        if !self.igdb_id.is_empty() {
            self.igdb_url = Some(format!("https://www.igdb.com/g/{}", self.igdb_id));
        }
        self
    }
}
