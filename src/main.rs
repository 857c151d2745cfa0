#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

mod cli;
mod config;
mod db;
mod scheduler;
mod scrape;
mod slack;
mod utils;

use cli::Cli;
use config::Config;
use db::DatabaseManager;
use scheduler::ScrapeScheduler;
use scrape::{MessageScraper, ScrapeJob};
use slack::{ChannelLister, ChannelLookup, HistoryFetcher, MockSlack, SlackClient, UserLookup};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if cli.offline {
        config.scrape.offline = true;
    }
    if let Some(url) = cli.database {
        config.database.url = Some(url);
    }
    config.validate()?;

    utils::logging::init_tracing(&config.logging.level);
    info!("jotter starting up");

    let db_manager = Arc::new(DatabaseManager::new(&config.database).await?);
    db_manager.migrate().await?;

    let (lister, fetcher, user_lookup, channel_lookup) = build_collaborators(&config)?;

    let job = Arc::new(ScrapeJob::new(
        MessageScraper::new(lister, fetcher),
        db_manager.roll_store(),
        db_manager.username_store(),
        db_manager.channel_store(),
        user_lookup,
        channel_lookup,
        config.scrape.backfill_horizon_years(),
    ));

    if cli.once {
        job.run().await?;
        return Ok(());
    }

    let mut scheduler = ScrapeScheduler::new(&config.scrape.cron, job).await?;
    scheduler.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("jotter shutting down");
    scheduler.shutdown().await?;
    Ok(())
}

type Collaborators = (
    Arc<dyn ChannelLister>,
    Arc<dyn HistoryFetcher>,
    Arc<dyn UserLookup>,
    Arc<dyn ChannelLookup>,
);

fn build_collaborators(config: &Config) -> Result<Collaborators> {
    if config.scrape.offline {
        info!("offline mode, using mock collaborators");
        let mock = Arc::new(MockSlack::new());
        return Ok((mock.clone(), mock.clone(), mock.clone(), mock));
    }

    let token = config
        .auth
        .oauth_token
        .clone()
        .context("auth.oauth_token missing after validation")?;
    let client = Arc::new(SlackClient::new(token));
    Ok((client.clone(), client.clone(), client.clone(), client))
}
