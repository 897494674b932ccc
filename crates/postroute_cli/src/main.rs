//! Operator CLI for the correspondence route core.
//!
//! # Responsibility
//! - Wire database, geocoder, cache and services from `POSTROUTE_*` config.
//! - Print routes and route sets as JSON / GeoJSON on stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use postroute_core::db::open_db;
use postroute_core::{
    init_logging, BackfillOptions, CoreConfig, LocationDirectory, MemoryRouteStore,
    NominatimGeocoder, RouteAggregator, RouteCache, SqliteCorrespondenceRepository,
    SqlitePlaceRepository, ThrottledGeocoder, WaypointBuilder,
};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "postroute", version, about = "Correspondence route tools")]
struct Cli {
    /// Archive database; overrides POSTROUTE_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Log level; overrides POSTROUTE_LOG_LEVEL.
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Absolute log directory; overrides POSTROUTE_LOG_DIR.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the core library version.
    Version,
    /// Get or create a place and print it.
    AddPlace {
        #[arg(long)]
        town: String,
        #[arg(long, default_value = "")]
        province: String,
        #[arg(long, default_value = "")]
        country: String,
    },
    /// Print the route of one correspondence item.
    Route { item_id: Uuid },
    /// Print the route set as GeoJSON.
    Map {
        #[arg(long)]
        dedupe: bool,
        /// Only items sent or received by this correspondent.
        #[arg(long)]
        correspondent: Option<String>,
        /// Print waypoint markers instead of route lines.
        #[arg(long)]
        points: bool,
    },
    /// Geocode places that still lack coordinates.
    Backfill {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        retry_unresolved: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CoreConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    if let Some(dir) = cli.log_dir {
        config.log.dir = Some(dir);
    }

    if let Command::Version = cli.command {
        println!("postroute_core {}", postroute_core::core_version());
        return Ok(());
    }

    init_logging(&config.log.level, config.log.dir.as_deref())?;
    let conn = open_db(&config.db_path)
        .with_context(|| format!("opening archive `{}`", config.db_path.display()))?;

    let cache = RouteCache::new(
        SqliteCorrespondenceRepository::new(&conn),
        MemoryRouteStore::new(),
        WaypointBuilder,
        &config.cache,
    );

    match cli.command {
        Command::Version => {}
        Command::AddPlace {
            town,
            province,
            country,
        } => {
            let geocoder = ThrottledGeocoder::new(
                NominatimGeocoder::new(&config.geocoder)?,
                config.geocoder.min_interval,
            );
            let directory = LocationDirectory::new(
                SqlitePlaceRepository::new(&conn),
                geocoder,
                config.directory.clone(),
            )
            .with_observer(&cache);
            let place = directory.get_or_create(&town, &province, &country)?;
            println!("{}", serde_json::to_string_pretty(&place)?);
        }
        Command::Route { item_id } => {
            let route = cache.get_route(item_id);
            println!("{}", serde_json::to_string_pretty(&route)?);
        }
        Command::Map {
            dedupe,
            correspondent,
            points,
        } => {
            let mut aggregate = config.aggregate.clone();
            aggregate.dedupe_edges |= dedupe;
            let aggregator = RouteAggregator::new(&cache, aggregate);
            let set = match correspondent {
                Some(name) => aggregator.build_for_correspondent(&name)?,
                None => aggregator.build_all()?,
            };
            let geojson = if points {
                set.points_geojson()
            } else {
                set.to_geojson()
            };
            println!("{}", serde_json::to_string_pretty(&geojson)?);
        }
        Command::Backfill {
            limit,
            retry_unresolved,
        } => {
            let geocoder = ThrottledGeocoder::new(
                NominatimGeocoder::new(&config.geocoder)?,
                config.geocoder.min_interval,
            );
            let directory = LocationDirectory::new(
                SqlitePlaceRepository::new(&conn),
                geocoder,
                config.directory.clone(),
            )
            .with_observer(&cache);
            let report = directory.backfill_coordinates(&BackfillOptions {
                limit,
                retry_unresolved,
            })?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
