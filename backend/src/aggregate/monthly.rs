//! Monthly rates for the dashboard waterfall.

use polars::df;
use polars::prelude::{col, DataFrame, DataType, IntoLazy, PolarsResult};
use serde::Serialize;

use super::{rate, PopulationReduction, DEATHS};
use crate::models::{Month, MonthlyMortality, PopulationRecord, Scale, YearSelection};

/// The dashboard always reports deaths per 100,000 women.
pub const DASHBOARD_SCALE: Scale = Scale::HundredThousand;

/// Deaths in one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthDeaths {
    pub month: Month,
    pub deaths: u64,
}

/// One bar of the waterfall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthRate {
    pub month: Month,
    pub deaths: u64,
    pub rate: f64,
}

/// Result of [`month_rates`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRates {
    /// Always twelve entries, January first
    pub months: Vec<MonthRate>,
    /// Reduced population; `None` when no population rows matched
    pub population: Option<f64>,
    pub reduction: PopulationReduction,
    /// Sum of the twelve monthly rates. Additive rollup, only an
    /// approximation of a true annual rate.
    pub total_rate: f64,
    pub total_deaths: u64,
}

/// Zero-based month column of the grouped frame.
const MONTH: &str = "month";

/// Sum deaths per month: one row per month present, keyed by [`Month::index`].
pub fn group_by_month(rows: &[&MonthlyMortality]) -> PolarsResult<DataFrame> {
    df!(
        MONTH => rows.iter().map(|r| r.month.index() as u32).collect::<Vec<u32>>(),
        DEATHS => rows.iter().map(|r| r.deaths).collect::<Vec<u64>>()
    )?
    .lazy()
    .group_by([col(MONTH)])
    .agg([col(DEATHS).sum().cast(DataType::UInt64)])
    .collect()
}

/// Lay grouped counts on the twelve-month axis, zero-filling gaps.
pub fn reindex_months(grouped: &DataFrame) -> PolarsResult<Vec<MonthDeaths>> {
    let mut deaths = [0u64; 12];
    let months = grouped.column(MONTH)?.u32()?;
    let counts = grouped.column(DEATHS)?.u64()?;
    for (month, count) in months.into_iter().zip(counts) {
        if let (Some(month), Some(count)) = (month, count) {
            if let Some(slot) = deaths.get_mut(month as usize) {
                *slot = count;
            }
        }
    }

    Ok(Month::ALL
        .iter()
        .zip(deaths)
        .map(|(&month, deaths)| MonthDeaths { month, deaths })
        .collect())
}

/// Monthly rates over already filtered rows.
///
/// The population is reduced over every filtered row at once: summed for a
/// single year, median otherwise. When that leaves no positive denominator
/// every monthly rate is zero.
pub fn month_rates(
    mortality: &[&MonthlyMortality],
    population: &[&PopulationRecord],
    years: &YearSelection,
) -> PolarsResult<MonthlyRates> {
    let deaths = reindex_months(&group_by_month(mortality)?)?;

    let reduction = PopulationReduction::for_years(years);
    let women: Vec<f64> = population.iter().map(|p| p.women).collect();
    let reduced = reduction.apply(&women)?;

    let months: Vec<MonthRate> = deaths
        .iter()
        .map(|d| MonthRate {
            month: d.month,
            deaths: d.deaths,
            rate: reduced
                .and_then(|pop| rate(d.deaths, pop, DASHBOARD_SCALE.factor()))
                .unwrap_or(0.0),
        })
        .collect();

    Ok(MonthlyRates {
        total_rate: months.iter().map(|m| m.rate).sum(),
        total_deaths: months.iter().map(|m| m.deaths).sum(),
        months,
        population: reduced,
        reduction,
    })
}
