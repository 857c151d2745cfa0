use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "jotter", about = "Slack dice-roll scraper", version)]
pub struct Cli {
    /// Path to the YAML config file.
    #[arg(short, long, default_value = "jotter.yaml", env = "JOTTER_CONFIG")]
    pub config: PathBuf,

    /// Run against mock collaborators instead of the Slack API.
    #[arg(long)]
    pub offline: bool,

    /// Database URL override (sqlite://… or postgres://…).
    #[arg(long)]
    pub database: Option<String>,

    /// Run a single scrape immediately and exit instead of scheduling.
    #[arg(long)]
    pub once: bool,
}
