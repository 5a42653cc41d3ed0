pub mod clip;
pub mod twitch;
pub mod video;
pub mod youtube;

pub use clip::Clip;
pub use video::{PrivacyStatus, VideoMetadata};
