use crate::types::clip::Clip;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A clip version persisted in the `clips` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredClip {
    pub row_id: i64,
    pub clip: Clip,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoredClip> for Clip {
    fn from(stored: StoredClip) -> Self {
        stored.clip
    }
}
