mod broker;
mod codec;
mod config;
mod database;
mod fetch;
mod models;
mod monitoring;
mod pipeline;
mod pool;
mod runtime;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::database::{EventRepository, SiteRepository, ensure_db_configured};

#[derive(Parser)]
#[command(name = "upcheck", about = "Periodic URL availability checker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full service: scheduler, checker pool and transfer
    /// pipeline, until interrupted.
    Run,
    /// Register a URL for periodic checking.
    AddSite {
        #[arg(long)]
        url: String,
        /// Pattern matched against response bytes on every check.
        #[arg(long)]
        regexp: Option<String>,
    },
    /// Print every configured site.
    ListSites,
    /// Delete all sites and events. Intended for tests and resets.
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Run => runtime::run(config).await,
        Command::AddSite { url, regexp } => {
            let (sites, _) = open_repositories(&config).await?;
            let site = sites.create(&url, regexp.as_deref()).await?;
            if let Some(id) = site.id {
                println!("created site {id}: {}", site.url);
            }
            Ok(())
        }
        Command::ListSites => {
            let (sites, _) = open_repositories(&config).await?;
            let mut cursor = sites.get_all();
            while let Some(site) = cursor.next().await? {
                let id = site.id.unwrap_or_default();
                match site.regexp {
                    Some(regexp) => println!("{id}\t{}\t{regexp}", site.url),
                    None => println!("{id}\t{}", site.url),
                }
            }
            Ok(())
        }
        Command::Reset => {
            let (sites, events) = open_repositories(&config).await?;
            sites.delete_all().await?;
            events.delete_all().await?;
            println!("deleted all sites and events");
            Ok(())
        }
    }
}

async fn open_repositories(
    config: &Config,
) -> Result<(Arc<SiteRepository>, Arc<EventRepository>)> {
    let db_pool = pool::connect(&config.database_path).await?;
    let sites = Arc::new(SiteRepository::new(db_pool.clone(), config.db_fetch_chunk_size));
    let events = Arc::new(EventRepository::new(db_pool, config.db_fetch_chunk_size));
    ensure_db_configured(&sites, &events).await?;
    Ok((sites, events))
}
