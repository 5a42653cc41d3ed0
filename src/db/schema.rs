//! SQL DDL for initializing the clip storage.

/// SQLite schema with:
/// - `row_id` INTEGER PRIMARY KEY AUTOINCREMENT
/// - `clip_id` the Twitch clip id; not unique, every collect run inserts a new version
/// - `view_count`, `created_at` and `broadcaster_name` mirrored from the payload for ordering
/// - `payload` the full clip as JSON
/// - timestamps as RFC3339 text in UTC
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS clips (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    clip_id TEXT NOT NULL,
    broadcaster_name TEXT NOT NULL,
    view_count INTEGER NOT NULL,
    created_at TEXT NOT NULL, -- RFC3339
    payload TEXT NOT NULL, -- JSON clip
    inserted_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_clips_clip_id ON clips(clip_id);

CREATE INDEX IF NOT EXISTS idx_clips_popularity ON clips(view_count DESC, created_at DESC);
"#;
