pub mod collect;
pub mod edit;
pub mod ffmpeg;
pub mod files;
pub mod publish;
pub mod rearrange;
pub mod selector;
pub mod timeline;

pub use collect::{CollectOptions, Collected, collect};
pub use edit::{EditOptions, Editor, edit};
pub use publish::{PublishOptions, publish};
