//! LifeFlow command-line tool.
//!
//! Compatibility and eligibility lookups work without a database; the
//! remaining commands operate on the SQLite store named in the configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use lifeflow::adapters::sanitize::SanitizingMakeWriter;
use lifeflow::adapters::SqliteStore;
use lifeflow::application::{DonorService, HospitalService, NotificationService};
use lifeflow::config::{LifeflowConfig, LogMode, LoggingConfig, DEFAULT_CONFIG_FILE};
use lifeflow::domain::compatibility::{compatible_donors, compatible_recipients};
use lifeflow::domain::eligibility::{next_eligible_date_on, today_utc, validate_donor_eligibility_on};
use lifeflow::domain::BloodType;

#[derive(Parser)]
#[command(name = "lifeflow", version, about = "Blood donation coordination")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (missing is fine)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Database file, overriding the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Red-cell compatibility lookups
    Compat {
        #[command(subcommand)]
        query: CompatQuery,
    },
    /// Screen a prospective donor on age and weight
    Eligibility {
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: NaiveDate,
        /// Weight in kilograms
        #[arg(long)]
        weight: f64,
        /// Evaluate as of this date instead of today (UTC)
        #[arg(long)]
        on: Option<NaiveDate>,
    },
    /// Date from which a donor may give again
    NextDate {
        /// Date of the last donation
        #[arg(long)]
        last: Option<NaiveDate>,
    },
    /// Create the database schema
    InitDb,
    /// Donor search
    Donors {
        #[command(subcommand)]
        action: DonorsCommand,
    },
    /// Blood requests
    Requests {
        #[command(subcommand)]
        action: RequestsCommand,
    },
    /// Hospital dashboards
    Hospital {
        #[command(subcommand)]
        action: HospitalCommand,
    },
    /// Hospital stock
    Inventory {
        #[command(subcommand)]
        action: InventoryCommand,
    },
    /// Remind donors whose donation window reopens today
    Reminders,
}

#[derive(Subcommand)]
enum CompatQuery {
    /// Donor types a recipient may receive from
    Donors { blood_type: BloodType },
    /// Recipient types a donor may give to
    Recipients { blood_type: BloodType },
}

#[derive(Subcommand)]
enum DonorsCommand {
    /// Donors who can give today
    Search {
        blood_type: BloodType,
        #[arg(long)]
        city: Option<String>,
        /// Include every compatible donor type, not just an exact match
        #[arg(long)]
        compatible: bool,
    },
}

#[derive(Subcommand)]
enum RequestsCommand {
    /// Open requests, most urgent first
    Active,
}

#[derive(Subcommand)]
enum HospitalCommand {
    /// Verified hospitals by name
    List,
    /// Totals and recent donations
    Stats { id: Uuid },
    /// Most recent donations
    Donations { id: Uuid },
}

#[derive(Subcommand)]
enum InventoryCommand {
    /// Stock per blood type
    Show { id: Uuid },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = LifeflowConfig::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(db) = cli.db {
        cfg.database.path = db;
    }

    let _guard = init_logging(&cfg.logging)?;
    tracing::debug!(db = %cfg.database.path.display(), "Configuration loaded");

    match cli.command {
        Commands::Compat { query } => {
            let (label, types) = match query {
                CompatQuery::Donors { blood_type } => ("can receive from", compatible_donors(blood_type)),
                CompatQuery::Recipients { blood_type } => ("can give to", compatible_recipients(blood_type)),
            };
            let list: Vec<&str> = types.iter().map(BloodType::as_str).collect();
            println!("{label}: {}", list.join(", "));
        }
        Commands::Eligibility { dob, weight, on } => {
            let report = validate_donor_eligibility_on(dob, weight, on.unwrap_or_else(today_utc));
            print_json(&report)?;
        }
        Commands::NextDate { last } => {
            println!("{}", next_eligible_date_on(last, today_utc()));
        }
        Commands::InitDb => {
            open_store(&cfg.database.path)?;
            println!("database ready at {}", cfg.database.path.display());
        }
        Commands::Donors {
            action: DonorsCommand::Search { blood_type, city, compatible },
        } => {
            let donors = DonorService::new(open_store(&cfg.database.path)?);
            let today = today_utc();
            let found = if compatible {
                donors.compatible_eligible_donors(blood_type, city.as_deref(), today)?
            } else {
                donors.eligible_donors(blood_type, city.as_deref(), today)?
            };
            print_json(&found)?;
        }
        Commands::Requests {
            action: RequestsCommand::Active,
        } => {
            let hospitals = hospital_service(&cfg)?;
            print_json(&hospitals.active_requests()?)?;
        }
        Commands::Hospital { action } => {
            let hospitals = hospital_service(&cfg)?;
            match action {
                HospitalCommand::List => print_json(&hospitals.verified_hospitals()?)?,
                HospitalCommand::Stats { id } => print_json(&hospitals.stats(id, today_utc())?)?,
                HospitalCommand::Donations { id } => {
                    print_json(&hospitals.donations(id, cfg.donations.history_limit)?)?;
                }
            }
        }
        Commands::Inventory {
            action: InventoryCommand::Show { id },
        } => {
            let thresholds = cfg.inventory.thresholds();
            let rows = hospital_service(&cfg)?.inventory(id)?;
            println!("{:<4} {:>9} {:>8}  LEVEL", "TYPE", "AVAILABLE", "RESERVED");
            for row in rows {
                println!(
                    "{:<4} {:>9} {:>8}  {}",
                    row.blood_type.as_str(),
                    row.units_available,
                    row.units_reserved,
                    row.level(&thresholds)
                );
            }
        }
        Commands::Reminders => {
            let notifier = NotificationService::new(open_store(&cfg.database.path)?);
            let sent = notifier.send_eligibility_reminders(today_utc())?;
            println!("sent {sent} reminder(s)");
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<WorkerGuard> {
    // stdout carries command output, so logs go to stderr or a file.
    let (writer, guard) = match logging.mode {
        LogMode::File => {
            if let Some(parent) = logging.file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&logging.file)
                .with_context(|| format!("opening log file {}", logging.file.display()))?;
            tracing_appender::non_blocking(file)
        }
        LogMode::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    Ok(guard)
}

fn open_store(path: &Path) -> Result<Arc<SqliteStore>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let store = SqliteStore::open(path)
        .with_context(|| format!("opening database {}", path.display()))?;
    Ok(Arc::new(store))
}

fn hospital_service(cfg: &LifeflowConfig) -> Result<HospitalService<SqliteStore>> {
    Ok(HospitalService::new(open_store(&cfg.database.path)?)
        .with_thresholds(cfg.inventory.thresholds())
        .with_stats_window(cfg.stats.window_days))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
