//! Filter + aggregate for each view.
//!
//! ```rust,ignore
//! let dataset = cache.get_or_load()?;
//! let map = map_view(&dataset, 2015, 2020, Scale::HundredThousand)?;
//! println!("{} departments, mean rate {:?}", map.rates.len(), map.summary.map(|s| s.mean));
//! ```

use serde::Serialize;

use super::breakdown::{by_age_group, by_marital_status, by_municipality, chart_title, CategoryCount, Kpis};
use super::department::{choropleth, department_rates, summarize, Choropleth, DepartmentRate, RateSummary, UnmatchedDepartments};
use super::monthly::{month_rates, MonthlyRates};
use super::PopulationReduction;
use crate::api::logs::log_warning;
use crate::error::QueryResult;
use crate::filter::{filter, Filter};
use crate::loader::Dataset;
use crate::models::{DepartmentFilter, Scale, YearSelection};

pub const MONTHLY_TITLE: &str = "Tasa de Mortalidad Mensual";
pub const MUNICIPALITY_TITLE: &str = "Muertes por Municipio";

/// Everything the map page needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub year_start: i32,
    pub year_end: i32,
    pub scale: Scale,
    pub reduction: PopulationReduction,
    pub rates: Vec<DepartmentRate>,
    /// `None` when no department has a defined rate
    pub summary: Option<RateSummary>,
    pub unmatched: UnmatchedDepartments,
    pub choropleth: Choropleth,
}

/// Department rates for `[year_start, year_end]` at scale `k`.
pub fn map_view(dataset: &Dataset, year_start: i32, year_end: i32, scale: Scale) -> QueryResult<MapView> {
    let (mortality, population) = filter(
        &dataset.totals,
        &dataset.population,
        year_start,
        year_end,
        &DepartmentFilter::All,
    )?;
    let years = YearSelection::range(year_start, year_end)?;

    let rates = department_rates(&mortality, &population, &years, scale, &dataset.names)?;
    if !rates.unmatched.without_population.is_empty() {
        log_warning(format!(
            "{} department(s) without population in {}: {}",
            rates.unmatched.without_population.len(),
            years.label(),
            rates.unmatched.without_population.join(", ")
        ));
    }

    let summary = summarize(&rates.rows);
    let choropleth = choropleth(&dataset.boundaries, &rates)?;

    Ok(MapView {
        year_start,
        year_end,
        scale,
        reduction: rates.reduction,
        rates: rates.rows,
        summary,
        unmatched: rates.unmatched,
        choropleth,
    })
}

/// Everything the dashboard page needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub years: String,
    /// Display name of the selected department, `None` for all
    pub department: Option<String>,
    pub kpis: Kpis,
    pub monthly_title: String,
    pub monthly: MonthlyRates,
    pub municipality_title: String,
    pub municipalities: Vec<CategoryCount>,
    pub age_groups: Vec<CategoryCount>,
    pub marital_status: Vec<CategoryCount>,
}

/// Monthly rates and breakdowns for one year (or all) and one department (or all).
pub fn dashboard_view(
    dataset: &Dataset,
    years: YearSelection,
    department: DepartmentFilter,
) -> QueryResult<DashboardView> {
    let active = Filter::new(years, department);
    let department_name = match &active.department {
        DepartmentFilter::All => None,
        DepartmentFilter::Only(key) => Some(dataset.display_name(key)),
    };

    let monthly = month_rates(
        &active.apply(&dataset.monthly),
        &active.apply(&dataset.population),
        &active.years,
    )?;

    let deaths = active.apply(&dataset.deaths);

    Ok(DashboardView {
        years: active.years.label(),
        kpis: Kpis {
            total_records: dataset.deaths.len(),
            filtered_records: deaths.len(),
        },
        monthly_title: chart_title(MONTHLY_TITLE, department_name.as_deref(), &active.years),
        monthly,
        municipality_title: chart_title(MUNICIPALITY_TITLE, department_name.as_deref(), &active.years),
        municipalities: by_municipality(&deaths),
        age_groups: by_age_group(&deaths),
        marital_status: by_marital_status(&deaths),
        department: department_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::loader::tests::fixture_dataset;
    use crate::models::DepartmentKey;

    #[test]
    fn test_map_view_inner_join_row_count() {
        let ds = fixture_dataset();
        let map = map_view(&ds, 2019, 2020, Scale::HundredThousand).unwrap();

        // ANTIOQUIA and BOGOTA have both sides; CALDAS has no population
        assert_eq!(map.rates.len(), 2);
        assert_eq!(map.unmatched.without_population, vec!["CALDAS"]);
        assert_eq!(map.reduction, PopulationReduction::Median);

        let antioquia = &map.rates[0];
        assert_eq!(antioquia.deaths, 90);
        assert_eq!(antioquia.population, 950_000.0);
    }

    #[test]
    fn test_map_view_single_year() {
        let ds = fixture_dataset();
        let map = map_view(&ds, 2020, 2020, Scale::HundredThousand).unwrap();

        let antioquia = map
            .rates
            .iter()
            .find(|r| r.key == DepartmentKey::from_name("ANTIOQUIA"))
            .unwrap();
        assert_eq!(antioquia.rate, Some(5.0));
        assert_eq!(map.reduction, PopulationReduction::Sum);

        let summary = map.summary.unwrap();
        assert_eq!(summary.highest.department, "ANTIOQUIA");
        assert_eq!(summary.lowest.department, "BOGOTÁ, D.C.");

        // every boundary kept, AMAZONAS without a rate
        assert_eq!(map.choropleth.features["features"].as_array().unwrap().len(), 3);
        assert_eq!(map.choropleth.without_rate, vec!["AMAZONAS"]);
    }

    #[test]
    fn test_map_view_empty_range() {
        let ds = fixture_dataset();
        let map = map_view(&ds, 1990, 1995, Scale::Thousand).unwrap();
        assert!(map.rates.is_empty());
        assert!(map.summary.is_none());
        assert!(map.choropleth.color_range.is_none());
    }

    #[test]
    fn test_map_view_rejects_reversed_range() {
        let ds = fixture_dataset();
        assert_eq!(
            map_view(&ds, 2020, 2019, Scale::Thousand).unwrap_err(),
            QueryError::InvalidYearRange { start: 2020, end: 2019 }
        );
    }

    #[test]
    fn test_monthly_and_department_sums_agree() {
        let ds = fixture_dataset();
        for (start, end) in [(2019, 2019), (2020, 2020), (2019, 2020)] {
            let years = YearSelection::range(start, end).unwrap();
            let f = Filter::new(years, DepartmentFilter::All);

            let monthly: u64 = f.apply(&ds.monthly).iter().map(|r| r.deaths).sum();
            let by_dept: u64 = f.apply(&ds.totals).iter().map(|r| r.deaths).sum();
            let view = dashboard_view(&ds, years, DepartmentFilter::All).unwrap();

            assert_eq!(monthly, by_dept);
            assert_eq!(view.monthly.total_deaths, by_dept);
        }
    }

    #[test]
    fn test_dashboard_for_one_department_and_year() {
        let ds = fixture_dataset();
        let view = dashboard_view(&ds, YearSelection::Single(2020), DepartmentFilter::parse("Antioquia")).unwrap();

        assert_eq!(view.department.as_deref(), Some("ANTIOQUIA"));
        assert_eq!(view.kpis, Kpis { total_records: 5, filtered_records: 3 });
        assert_eq!(view.monthly.population, Some(1_000_000.0));
        assert_eq!(view.monthly.months[0].rate, 2.0);
        assert_eq!(view.monthly.months[11].rate, 3.0);
        assert_eq!(view.monthly.total_rate, 5.0);
        assert_eq!(view.monthly_title, "Tasa de Mortalidad Mensual en ANTIOQUIA (2020)");
        assert_eq!(view.municipalities[0].label, "MEDELLIN");
        assert_eq!(view.municipalities[0].count, 2);
    }

    #[test]
    fn test_dashboard_all_years_uses_median_population() {
        let ds = fixture_dataset();
        let view = dashboard_view(&ds, YearSelection::All, DepartmentFilter::parse("ANTIOQUIA")).unwrap();

        assert_eq!(view.monthly.population, Some(950_000.0));
        assert_eq!(view.monthly_title, "Tasa de Mortalidad Mensual en ANTIOQUIA (Todos los años)");
    }

    #[test]
    fn test_dashboard_without_population_is_all_zero() {
        let ds = fixture_dataset();
        let view = dashboard_view(&ds, YearSelection::Single(2020), DepartmentFilter::parse("Caldas")).unwrap();

        assert_eq!(view.monthly.total_deaths, 7);
        assert!(view.monthly.months.iter().all(|m| m.rate == 0.0));
        assert_eq!(view.kpis.filtered_records, 0);
    }
}
