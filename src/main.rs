use anyhow::Context;
use clap::Parser;
use compyle::cli::{Cli, Command};
use compyle::config::Config;
use compyle::logging::{init_tracing, level_for};
use compyle::service::{self, Collected};
use mimalloc::MiMalloc;
use tracing::{debug, info};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&level_for(cli.verbose, &config.default_loglevel()));
    debug!(
        debug = config.debug,
        database = config.has_database(),
        game = %config.settings.game_name,
        "configuration loaded"
    );

    match cli.command {
        Command::Collect(args) => {
            match service::collect(&config, args.into())
                .await
                .context("collect failed")?
            {
                Collected::Written { path, count } => {
                    info!(count, "clips collected");
                    println!("{}", path.display());
                }
                Collected::Stored { count } => {
                    println!("{count} clips stored in the database");
                }
            }
        }
        Command::Edit(args) => {
            let metadata = service::edit(&config, args.into())
                .await
                .context("edit failed")?;
            println!("{}", metadata.display());
        }
        Command::Publish(args) => {
            let url = service::publish(&config, args.into())
                .await
                .context("publish failed")?;
            println!("{url}");
        }
    }
    Ok(())
}
