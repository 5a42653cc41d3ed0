//! Title, description and tags of a compilation.

use crate::types::clip::{Clip, broadcaster_url};

/// `MM:SS` of an offset in seconds; minutes are not wrapped into hours.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    /// `MM:SS <broadcaster>` at the start of each clip.
    pub timestamps: Vec<String>,
    /// `<broadcaster> - <url>`, once per broadcaster.
    pub credits: Vec<String>,
    /// Seconds.
    pub duration: f64,
}

impl Timeline {
    /// Build the timeline of `segments`, each a clip and the seconds it lasts
    /// in the final video.
    pub fn new<'a>(segments: impl IntoIterator<Item = (&'a Clip, f64)>) -> Self {
        let mut timeline = Self::default();
        for (clip, duration) in segments {
            timeline.timestamps.push(format!(
                "{} {}",
                format_timestamp(timeline.duration),
                clip.broadcaster_name
            ));
            let url = clip
                .broadcaster_url
                .clone()
                .unwrap_or_else(|| broadcaster_url(&clip.broadcaster_name));
            let credit = format!("{} - {}", clip.broadcaster_name, url);
            if !timeline.credits.contains(&credit) {
                timeline.credits.push(credit);
            }
            timeline.duration += duration;
        }
        timeline
    }

    pub fn description(&self) -> String {
        format!(
            "🎥 Credits:\n{}\n\n⌚ Timestamps:\n{}",
            self.credits.join("\n"),
            self.timestamps.join("\n")
        )
    }
}

/// The top clip title, uppercased.
pub fn title(clips: &[Clip]) -> String {
    clips
        .first()
        .map(|c| c.title.trim().to_uppercase())
        .unwrap_or_default()
}

pub fn tags(clips: &[Clip]) -> Vec<String> {
    let mut tags = vec!["twitch".to_string(), "clips".to_string()];
    for clip in clips {
        if !tags.contains(&clip.broadcaster_name) {
            tags.push(clip.broadcaster_name.clone());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::clip::fixtures::clip;

    #[test]
    fn timestamps_are_zero_padded() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(59.9), "00:59");
        assert_eq!(format_timestamp(61.0), "01:01");
        assert_eq!(format_timestamp(6000.0), "100:00");
    }

    #[test]
    fn description_lists_credits_and_timestamps() {
        let a = clip("a", "gotaga", 300);
        let b = clip("b", "kameto", 200);
        let c = clip("c", "gotaga", 100);
        let timeline = Timeline::new([(&a, 25.5), (&b, 40.0), (&c, 10.0)]);

        assert_eq!(timeline.timestamps, vec!["00:00 gotaga", "00:25 kameto", "01:05 gotaga"]);
        assert_eq!(timeline.duration, 75.5);
        assert_eq!(
            timeline.description(),
            "🎥 Credits:\ngotaga - https://www.twitch.tv/gotaga\nkameto - https://www.twitch.tv/kameto\n\n⌚ Timestamps:\n00:00 gotaga\n00:25 kameto\n01:05 gotaga"
        );
    }

    #[test]
    fn title_and_tags_follow_the_top_clip() {
        let mut top = clip("a", "gotaga", 300);
        top.title = "quel ace !".to_string();
        let clips = vec![top, clip("b", "kameto", 200), clip("c", "gotaga", 100)];
        assert_eq!(title(&clips), "QUEL ACE !");
        assert_eq!(tags(&clips), vec!["twitch", "clips", "gotaga", "kameto"]);
        assert_eq!(title(&[]), "");
    }
}
