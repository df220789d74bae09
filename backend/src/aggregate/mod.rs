//! Aggregation and rate computation.
//!
//! - [`department`] - deaths per department, rates, summary, choropleth join
//! - [`monthly`] - deaths per month on the fixed calendar axis, monthly rates
//! - [`breakdown`] - counts by municipality, age group and marital status
//! - [`pipeline`] - filter + aggregate for the map and dashboard views
//!
//! Rate = deaths / population × k. Population is reduced with a **sum** when
//! exactly one year is selected and with a **median** otherwise; the two
//! reductions intentionally differ and must not be unified.
//!
//! Group-bys, reductions and joins run as polars lazy queries over frames
//! built from the filtered rows.

pub mod breakdown;
pub mod department;
pub mod monthly;
pub mod pipeline;

use polars::df;
use polars::prelude::{col, Expr, IntoLazy, PolarsResult};
use serde::Serialize;

use crate::models::YearSelection;

pub use breakdown::{by_age_group, by_marital_status, by_municipality, chart_title, CategoryCount, Kpis};
pub use department::{choropleth, department_rates, summarize, Choropleth, DepartmentRate, DepartmentRates, RankedRate, RateSummary, UnmatchedDepartments};
pub use monthly::{group_by_month, month_rates, reindex_months, MonthDeaths, MonthRate, MonthlyRates, DASHBOARD_SCALE};
pub use pipeline::{dashboard_view, map_view, DashboardView, MapView};

// Frame columns
pub(crate) const KEY: &str = "key";
pub(crate) const DEATHS: &str = "deaths";
pub(crate) const WOMEN: &str = "women";

/// How population rows of a group collapse to one denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PopulationReduction {
    Sum,
    Median,
}

impl PopulationReduction {
    /// Sum for a single year, median for a range or all years.
    pub fn for_years(years: &YearSelection) -> Self {
        if years.is_single_year() {
            PopulationReduction::Sum
        } else {
            PopulationReduction::Median
        }
    }

    /// Aggregation of `column` within a group. The median of an even count
    /// is the mean of the two middle values.
    pub fn expr(self, column: &str) -> Expr {
        match self {
            PopulationReduction::Sum => col(column).sum(),
            PopulationReduction::Median => col(column).median(),
        }
    }

    /// Reduce all values as one group; `None` for an empty list.
    pub fn apply(self, values: &[f64]) -> PolarsResult<Option<f64>> {
        if values.is_empty() {
            return Ok(None);
        }
        let reduced = df!(WOMEN => values.to_vec())?
            .lazy()
            .select([self.expr(WOMEN)])
            .collect()?;
        Ok(reduced.column(WOMEN)?.f64()?.get(0))
    }
}

/// `deaths / population × k`; undefined when the population is not positive.
pub fn rate(deaths: u64, population: f64, k: f64) -> Option<f64> {
    if population.is_finite() && population > 0.0 {
        Some(deaths as f64 / population * k)
    } else {
        None
    }
}
