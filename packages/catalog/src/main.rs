use std::str::FromStr;

use anyhow::{Context, bail};
use catalog::config::AppConfig;
use catalog::database::{init_db, open_catalog};
use catalog::seed::seed_system_defaults;
use catalog::{Catalog, EntityKind, Postgres};
use clap::{Parser, Subcommand, ValueEnum};
use store::StatusFilter;
use tracing::{Level, info, warn};

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Botanical catalog maintenance and inspection")]
struct Cli {
    /// Config file without extension (default: config/catalog)
    #[arg(short, long, env = "CATALOG_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert the system-default families and variants
    Seed,
    /// Print counts and breakdowns for one entity kind
    Stats {
        entity: EntityKind,
    },
    /// List visible rows of one entity kind
    List {
        entity: EntityKind,
        /// Case-insensitive match on name or description
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(long, value_enum, default_value_t = Status::All)]
        status: Status,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Check whether the database is reachable
    Ping {
        /// Keep probing and report every change until interrupted
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Status {
    All,
    Active,
    Inactive,
}

impl From<Status> for StatusFilter {
    fn from(status: Status) -> Self {
        match status {
            Status::All => StatusFilter::All,
            Status::Active => StatusFilter::Active,
            Status::Inactive => StatusFilter::Inactive,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("Failed to load config")?;

    let level = Level::from_str(&config.log.level).unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .init();

    match cli.command {
        Command::Seed => {
            let db = init_db(&config.database.url)
                .await
                .context("Failed to initialize database")?;
            let inserted = seed_system_defaults(&db)
                .await
                .context("Failed to seed system defaults")?;
            info!(inserted, "Seeding finished");
        }
        Command::Stats { entity } => {
            let catalog = open(&config).await?;
            let stats = catalog.statistics(entity).await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::List {
            entity,
            search,
            status,
            json,
        } => {
            let catalog = open(&config).await?;
            let rows = catalog.list(entity, &search, status.into()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in &rows {
                    let parent = row.parent.as_deref().unwrap_or("-");
                    let flags = format!(
                        "{}{}{}",
                        if row.is_active { "" } else { " inactive" },
                        if row.is_favorite { " favorite" } else { "" },
                        if row.system_default { " system" } else { "" },
                    );
                    println!("{}  {:<32} {:<24}{}", row.id, row.name, parent, flags);
                }
                println!("{} {} row(s)", rows.len(), entity);
            }
        }
        Command::Ping { watch } => {
            let catalog = open(&config).await?;
            let online = catalog.ping().await;
            println!("{}", if online { "online" } else { "offline" });

            if watch {
                let mut changes = catalog.connectivity().subscribe();
                let probe = catalog.spawn_probe(config.connectivity.probe_interval());
                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => break,
                        changed = changes.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            let online = *changes.borrow_and_update();
                            println!("{}", if online { "online" } else { "offline" });
                        }
                    }
                }
                probe.abort();
            } else if !online {
                bail!("database is unreachable");
            }
        }
    }

    Ok(())
}

async fn open(config: &AppConfig) -> anyhow::Result<Catalog<Postgres>> {
    let catalog = open_catalog(config)
        .await
        .context("Failed to open catalog")?;
    if config.session.user_id.is_none() {
        warn!("No session user configured, showing system defaults only");
    }
    Ok(catalog)
}
