use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hvcatalog::{
    config::Config,
    database::{
        catalog::{get_catalog_work, list_catalog_works, CatalogFilter},
        catalog_view::catalog_view_definition,
        db_loader::open_db,
        init,
        migration::applied_migrations,
    },
    errors::HvcError,
    version::{current_version, recorded_version},
};

#[derive(Parser, Debug)]
struct PrgmArgs {
    /// SQLite database file (overrides the config file)
    #[arg(long)]
    db: Option<String>,

    /// Configuration file (defaults to ~/.hvcatalog/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bring the database to the current schema
    Migrate,
    /// Print the schema version of this build and of the database
    Version,
    /// List applied migration steps
    Status,
    /// Print the stored catalog view definition
    ViewSql,
    /// Print the catalog record of one work as JSON
    Show {
        work_id: i64,
    },
    /// Print catalog records as JSON
    List {
        #[arg(long, conflicts_with_all = ["tag", "va", "series"])]
        circle: Option<i64>,
        #[arg(long, conflicts_with_all = ["va", "series"])]
        tag: Option<i64>,
        #[arg(long, conflicts_with = "series")]
        va: Option<String>,
        #[arg(long)]
        series: Option<i64>,
    },
    /// Write a sample configuration file
    InitConfig,
}

fn run(args: PrgmArgs, mut config: Config, config_path: PathBuf) -> Result<(), HvcError> {
    if let Some(db) = args.db {
        config.database.path = Some(db);
    }
    let open = || -> Result<Connection, HvcError> { open_db(&config.database.resolve_path()?) };

    match args.command {
        Command::InitConfig => Config::create_sample(&config_path)?,
        Command::Migrate => {
            let db = open()?;
            init(&db, config.database.check_version)?;
        }
        Command::Version => {
            let db = open()?;
            println!("binary:   {}", current_version());
            match recorded_version(&db)? {
                Some(v) => println!("database: {v}"),
                None => println!("database: unversioned"),
            }
        }
        Command::Status => {
            let db = open()?;
            for (step, version, applied_at) in applied_migrations(&db)? {
                println!("{applied_at}  {step}  ({version})");
            }
        }
        Command::ViewSql => {
            let db = open()?;
            match catalog_view_definition(&db)? {
                Some(sql) => println!("{sql}"),
                None => println!("Catalog view is not defined; run migrate first."),
            }
        }
        Command::Show { work_id } => {
            let db = open()?;
            init(&db, config.database.check_version)?;
            match get_catalog_work(&db, work_id)? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("No catalog entry for work {work_id}"),
            }
        }
        Command::List { circle, tag, va, series } => {
            let db = open()?;
            init(&db, config.database.check_version)?;
            let filter = match (circle, tag, va, series) {
                (Some(id), _, _, _) => CatalogFilter::Circle(id),
                (_, Some(id), _, _) => CatalogFilter::Tag(id),
                (_, _, Some(id), _) => CatalogFilter::VoiceActor(id),
                (_, _, _, Some(id)) => CatalogFilter::Series(id),
                _ => CatalogFilter::All,
            };
            let records = list_catalog_works(&db, &filter)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            info!("{} works", records.len());
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = PrgmArgs::parse();

    let config_path = match &args.config {
        Some(p) => p.clone(),
        None => Config::get_config_path()?,
    };
    let config = Config::load_from(&config_path)?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .try_init()?;

    if let Err(e) = run(args, config, config_path) {
        error!("{e}");
        return Err(e.into());
    }
    Ok(())
}
