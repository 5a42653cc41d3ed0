//! Clip selection rules applied to the pages returned by Twitch.

use crate::config::Settings;
use crate::types::clip::{Clip, broadcaster_url};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ClipSelection {
    pub min_views: u64,
    pub max_clips: usize,
    pub min_duration: f64,
    pub max_duration: f64,
    pub language: Option<String>,
    pub whitelist: HashSet<String>,
    pub blacklist: HashSet<String>,
    pub pages: usize,
    pub page_size: u32,
    pub period: u32,
}

impl From<&Settings> for ClipSelection {
    fn from(s: &Settings) -> Self {
        let language = s.language.trim();
        Self {
            min_views: s.min_views,
            max_clips: s.max_clips,
            min_duration: s.min_duration,
            max_duration: s.max_duration,
            language: (!language.is_empty()).then(|| language.to_string()),
            whitelist: s.whitelist.iter().cloned().collect(),
            blacklist: s.blacklist.iter().cloned().collect(),
            pages: s.pages,
            page_size: s.page_size.clamp(1, 100),
            period: s.period.max(1),
        }
    }
}

impl Default for ClipSelection {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl ClipSelection {
    fn is_eligible(&self, clip: &Clip) -> bool {
        if self.whitelist.contains(&clip.broadcaster_id) {
            return true;
        }
        let language_ok = self
            .language
            .as_deref()
            .is_none_or(|lang| clip.language == lang);
        clip.has_vod()
            && language_ok
            && clip.duration >= self.min_duration
            && clip.duration < self.max_duration
    }
}

/// Accumulates the selected clips page after page.
#[derive(Debug)]
pub struct Selector {
    criteria: ClipSelection,
    selected: Vec<Clip>,
}

impl Selector {
    pub fn new(criteria: ClipSelection) -> Self {
        Self {
            criteria,
            selected: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.selected.len() >= self.criteria.max_clips
    }

    /// Offer one page of clips, ordered by views as Twitch returns them.
    /// Returns `true` once `max_clips` clips have been selected.
    pub fn offer_page(&mut self, page: Vec<Clip>) -> bool {
        for mut clip in page {
            if self.is_full() {
                break;
            }
            if self.criteria.blacklist.contains(&clip.broadcaster_id) {
                debug!(clip = %clip.id, broadcaster = %clip.broadcaster_name, "blacklisted");
                continue;
            }
            if clip.view_count < self.criteria.min_views {
                break;
            }
            if !self.criteria.is_eligible(&clip) {
                continue;
            }
            let Some(clip_url) = clip.derive_clip_url() else {
                debug!(clip = %clip.id, "no downloadable url");
                continue;
            };
            if self.selected.iter().any(|kept| kept.overlaps(&clip)) {
                debug!(clip = %clip.id, "overlaps an already selected clip");
                continue;
            }
            clip.clip_url = Some(clip_url);
            clip.broadcaster_url = Some(broadcaster_url(&clip.broadcaster_name));
            self.selected.push(clip);
        }
        self.is_full()
    }

    /// Selected clips by view count then creation date, descending.
    pub fn finish(mut self) -> Vec<Clip> {
        sort_by_popularity(&mut self.selected);
        self.selected
    }
}

pub fn sort_by_popularity(clips: &mut [Clip]) {
    clips.sort_by(|a, b| match b.view_count.cmp(&a.view_count) {
        Ordering::Equal => b.created_at.cmp(&a.created_at),
        other => other,
    });
}
