//! Mortality Atlas CLI - department and monthly female mortality rates
//!
//! # Main Commands
//!
//! ```bash
//! mortality-atlas serve                          # Start HTTP server (port 3000)
//! mortality-atlas map --start 2015 --end 2020    # Department rates as JSON
//! mortality-atlas dashboard --year 2020          # Monthly rates and breakdowns
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! mortality-atlas options                        # Years, departments and scales
//! mortality-atlas check                          # Load every source, report joins
//! ```

use clap::{Parser, Subcommand};
use mortality_atlas::api::{DashboardResponse, DatasetSummary, MapResponse, OptionsResponse};
use mortality_atlas::{
    dashboard_view, load_dataset, map_view, start_server, AppConfig, Dataset, DepartmentFilter,
    Scale, YearSelection,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mortality-atlas")]
#[command(about = "Female mortality rates per Colombian department", long_about = None)]
struct Cli {
    /// Directory holding the input files (overrides ATLAS_DATA_DIR)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (overrides ATLAS_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Department rates, summary and choropleth for a year range
    Map {
        /// First year
        #[arg(long)]
        start: i32,

        /// Last year
        #[arg(long)]
        end: i32,

        /// Scale factor: 100, 1000, 10000, 100000 or 1000000
        #[arg(short, long)]
        k: Option<u64>,
    },

    /// Monthly rates, KPIs and breakdowns
    Dashboard {
        /// A year, a range `start-end`, or `Todos`
        #[arg(short, long, default_value = "Todos")]
        year: String,

        /// A department name or `Todos`
        #[arg(long, default_value = "Todos")]
        department: String,
    },

    /// Show filter options
    Options,

    /// Load every source and report row counts and join mismatches
    Check,
}

#[tokio::main]
async fn main() {
    // .env (if present) and ATLAS_* variables
    let mut config = AppConfig::from_env();

    let cli = Cli::parse();
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }

    let result = match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            cmd_serve(config).await
        }

        Commands::Map { start, end, k } => cmd_map(&config, start, end, k),

        Commands::Dashboard { year, department } => cmd_dashboard(&config, &year, &department),

        Commands::Options => cmd_options(&config),

        Commands::Check => cmd_check(&config),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    start_server(config).await?;
    Ok(())
}

fn load(config: &AppConfig) -> Result<Dataset, Box<dyn std::error::Error>> {
    eprintln!("📂 Loading: {}", config.data.totals.display());
    Ok(load_dataset(&config.data)?)
}

fn cmd_map(config: &AppConfig, start: i32, end: i32, k: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let scale = match k {
        Some(k) => Scale::try_from(k)?,
        None => Scale::default(),
    };
    let dataset = load(config)?;

    let view = map_view(&dataset, start, end, scale)?;
    eprintln!("🗺️  {} departments with rates", view.rates.len());
    if let Some(ref summary) = view.summary {
        eprintln!(
            "   Highest: {} ({:.2})  Lowest: {} ({:.2})  Mean: {:.2}",
            summary.highest.department, summary.highest.rate,
            summary.lowest.department, summary.lowest.rate,
            summary.mean
        );
    }

    print_json(&MapResponse::from(view))
}

fn cmd_dashboard(config: &AppConfig, year: &str, department: &str) -> Result<(), Box<dyn std::error::Error>> {
    let years: YearSelection = year.parse()?;
    let dataset = load(config)?;

    let view = dashboard_view(&dataset, years, DepartmentFilter::parse(department))?;
    eprintln!("📊 {}: {} deaths", view.monthly_title, view.monthly.total_deaths);

    print_json(&DashboardResponse::from(view))
}

fn cmd_options(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load(config)?;
    print_json(&OptionsResponse::from(&dataset))
}

fn cmd_check(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load(config)?;
    let summary = DatasetSummary::from(&dataset);

    eprintln!("✔️  Loaded:");
    eprintln!("   Deaths:     {}", summary.deaths);
    eprintln!("   Totals:     {}", summary.totals);
    eprintln!("   Monthly:    {}", summary.monthly);
    eprintln!("   Population: {}", summary.population);
    eprintln!("   Boundaries: {}", summary.boundaries);
    if summary.join_report.is_clean() {
        eprintln!("   ✅ Every department joins cleanly");
    } else {
        eprintln!("   ⚠️  Some departments do not join (see report)");
    }

    print_json(&summary)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
