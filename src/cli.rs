//! Command-line interface of the `compyle` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::DEFAULT_REPORT_FOLDER;
use crate::service::{CollectOptions, EditOptions, PublishOptions};
use crate::types::video::PrivacyStatus;

/// Collect Twitch clips, edit them into a compilation and publish it on YouTube.
#[derive(Debug, Parser)]
#[command(name = "compyle")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true, args_override_self = true)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Retrieve the most viewed clips of a game
    #[command(visible_alias = "c")]
    Collect(CollectArgs),

    /// Edit the collected clips into a single video
    #[command(visible_alias = "e")]
    Edit(EditArgs),

    /// Upload the edited video on YouTube
    #[command(visible_alias = "p")]
    Publish(PublishArgs),
}

#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Report file or directory; clips go to the database when omitted
    #[arg(
        short,
        long,
        value_name = "FILE|DIRECTORY",
        num_args = 0..=1,
        default_missing_value = DEFAULT_REPORT_FOLDER
    )]
    pub output: Option<String>,

    /// Game to collect the clips of
    #[arg(short, long, value_name = "NAME")]
    pub game: Option<String>,

    /// Past days to retrieve the clips from
    #[arg(short, long, value_name = "DAYS", value_parser = clap::value_parser!(u32).range(1..))]
    pub period: Option<u32>,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Report file, or directory holding reports; the database when omitted
    #[arg(short, long, value_name = "FILE|DIRECTORY")]
    pub input: Option<PathBuf>,

    /// Directory receiving the compilation
    #[arg(short, long, value_name = "DIRECTORY")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// metadata.json, or directory holding compilations
    #[arg(short, long, value_name = "FILE|DIRECTORY")]
    pub input: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub privacy: Option<PrivacyStatus>,

    /// YouTube category id
    #[arg(long, value_name = "ID")]
    pub category: Option<String>,
}

impl From<CollectArgs> for CollectOptions {
    fn from(args: CollectArgs) -> Self {
        Self {
            output: args.output,
            game_name: args.game,
            period: args.period,
        }
    }
}

impl From<EditArgs> for EditOptions {
    fn from(args: EditArgs) -> Self {
        Self {
            input: args.input,
            output: args.output,
        }
    }
}

impl From<PublishArgs> for PublishOptions {
    fn from(args: PublishArgs) -> Self {
        Self {
            input: args.input,
            privacy: args.privacy,
            category: args.category,
        }
    }
}
