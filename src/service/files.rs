//! Report and output locations on the filesystem.

use crate::error::CompyleError;
use crate::types::clip::Clip;
use chrono::{DateTime, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

/// `YYYY-mm-dd-HH-MM-SS`, used for report files and edit output directories.
pub fn stamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%Y-%m-%d-%H-%M-%S").to_string()
}

/// Where a collect report goes for the `--output` value `output`.
///
/// - a directory (trailing `/` or existing) receives `<game_name>/<stamp>.json`
/// - a path with `/` is a file in the given directory
/// - a bare name is a file in the current directory
pub fn resolve_report_path(output: &str, game_name: &str, stamp: &str) -> PathBuf {
    if output.ends_with('/') || Path::new(output).is_dir() {
        return Path::new(output)
            .join(game_name)
            .join(format!("{stamp}.json"));
    }
    match output.rsplit_once('/') {
        Some((dir, file)) => Path::new(dir).join(file),
        None => PathBuf::from(output),
    }
}

/// Serialize `clips` as pretty JSON, creating the missing directories.
pub fn write_report(path: &Path, clips: &[Clip]) -> Result<(), CompyleError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(clips)?)?;
    info!(path = %path.display(), count = clips.len(), "report written");
    Ok(())
}

pub fn read_report(path: &Path) -> Result<Vec<Clip>, CompyleError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Most recently modified entry of `dir` accepted by `filter`.
pub fn latest_entry(
    dir: &Path,
    filter: impl Fn(&Path) -> bool,
) -> Result<Option<PathBuf>, CompyleError> {
    let latest = fs::read_dir(dir)?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!(error = %e, "failed to read dir entry");
                None
            }
        })
        .filter(|path| filter(path))
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path);
    Ok(latest)
}

/// `input` itself when it is a file, otherwise its most recent entry,
/// descending into directories (`reports/<game>/<stamp>.json`).
pub fn resolve_input_file(input: &Path) -> Result<PathBuf, CompyleError> {
    if input.is_dir() {
        let latest = latest_entry(input, |_| true)?
            .ok_or_else(|| CompyleError::NothingToLoad(input.to_path_buf()))?;
        return resolve_input_file(&latest);
    }
    if input.is_file() {
        return Ok(input.to_path_buf());
    }
    Err(CompyleError::NothingToLoad(input.to_path_buf()))
}
