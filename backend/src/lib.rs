//! # Mortality Atlas - female mortality rates per Colombian department
//!
//! Loads death records, yearly and monthly death totals, female population
//! and department boundaries, then serves the two dashboard views: a
//! choropleth of department rates and a monthly rate chart with breakdowns.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV/GeoJSON│────▶│   Loader    │────▶│   Filter    │────▶│  Aggregate  │
//! │  (ISO/UTF8) │     │ (normalize) │     │ (year/dept) │     │ (rates/map) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                           │ once                                   │
//!                     ┌─────────────┐                         ┌─────────────┐
//!                     │    Cache    │────────────────────────▶│  API / CLI  │
//!                     └─────────────┘                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mortality_atlas::{load_dataset, map_view, DataPaths, Scale};
//!
//! let dataset = load_dataset(&DataPaths::in_dir("data"))?;
//! let map = map_view(&dataset, 2015, 2020, Scale::HundredThousand)?;
//! println!("{} departments", map.rates.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Load, query and server error types
//! - [`config`] - Data paths and port from the environment
//! - [`parser`] - CSV parsing with encoding and delimiter detection
//! - [`models`] - Records, department keys, months, scales and filters
//! - [`loader`] - Typed loading of the five input sources
//! - [`cache`] - Load-once dataset cache
//! - [`filter`] - Year and department filtering
//! - [`aggregate`] - Rates, monthly series, breakdowns and views
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod config;
pub mod models;

// Input
pub mod parser;
pub mod loader;
pub mod cache;

// Computation
pub mod filter;
pub mod aggregate;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{LoadError, LoadResult, QueryError, QueryResult, ServerError, ServerResult};
pub use parser::CsvError;

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    DeathRecord,
    DepartmentFilter,
    DepartmentKey,
    GeoBoundary,
    Month,
    MonthlyMortality,
    MortalityTotal,
    PopulationRecord,
    Scale,
    YearSelection,
    ALL_SENTINEL,
};

// =============================================================================
// Re-exports - Loading
// =============================================================================

pub use cache::DatasetCache;
pub use config::{AppConfig, DataPaths};
pub use loader::{load_dataset, Dataset, JoinReport};
pub use parser::{parse_bytes_auto, Table};

// =============================================================================
// Re-exports - Aggregation
// =============================================================================

pub use aggregate::{
    dashboard_view, department_rates, map_view, month_rates, rate, summarize,
    DashboardView, DepartmentRate, DepartmentRates, MapView, MonthlyRates,
    PopulationReduction, RateSummary,
};
pub use filter::{filter, Filter, Filterable};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::start_server;
