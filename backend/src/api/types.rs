//! REST API types for the dashboard front-end.
//!
//! Views are flattened into the response body next to a request id and a
//! generation timestamp.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::aggregate::{DashboardView, MapView};
use crate::loader::{Dataset, JoinReport};
use crate::models::{Scale, ALL_SENTINEL};

/// Query string of `/api/map`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapParams {
    /// First year; defaults to the earliest year available
    pub start: Option<i32>,
    /// Last year; defaults to the latest year available
    pub end: Option<i32>,
    /// Scale factor; defaults to 100
    pub k: Option<u64>,
}

/// Query string of `/api/dashboard`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardParams {
    /// A year, `start-end`, or `Todos`
    pub year: Option<String>,
    /// A department name or `Todos`
    pub department: Option<String>,
}

/// Response of `/api/map`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapResponse {
    pub request_id: String,
    /// "ready", "warning" (departments dropped by the join) or "empty"
    pub status: String,
    pub generated_at: String,
    #[serde(flatten)]
    pub view: MapView,
}

impl From<MapView> for MapResponse {
    fn from(view: MapView) -> Self {
        let status = if view.rates.is_empty() {
            "empty"
        } else if !view.unmatched.without_population.is_empty() {
            "warning"
        } else {
            "ready"
        };
        MapResponse {
            request_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            view,
        }
    }
}

/// Response of `/api/dashboard`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub request_id: String,
    /// "ready", or "empty" when the filter matched no deaths
    pub status: String,
    pub generated_at: String,
    #[serde(flatten)]
    pub view: DashboardView,
}

impl From<DashboardView> for DashboardResponse {
    fn from(view: DashboardView) -> Self {
        let status = if view.monthly.total_deaths == 0 && view.kpis.filtered_records == 0 {
            "empty"
        } else {
            "ready"
        };
        DashboardResponse {
            request_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            view,
        }
    }
}

/// Selector values for both pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsResponse {
    pub map: MapOptions,
    pub dashboard: DashboardOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    pub years: Vec<i32>,
    /// Full available range, the initial slider position
    pub default_range: Option<(i32, i32)>,
    pub scales: Vec<u64>,
    pub default_scale: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOptions {
    /// `Todos` followed by the years
    pub years: Vec<String>,
    /// `Todos` followed by the department names
    pub departments: Vec<String>,
}

impl From<&Dataset> for OptionsResponse {
    fn from(dataset: &Dataset) -> Self {
        let years = dataset.total_years();
        let default_range = years.first().zip(years.last()).map(|(a, b)| (*a, *b));

        let with_all = |values: Vec<String>| -> Vec<String> {
            std::iter::once(ALL_SENTINEL.to_string()).chain(values).collect()
        };

        OptionsResponse {
            map: MapOptions {
                years,
                default_range,
                scales: Scale::ALL.iter().map(|s| s.value()).collect(),
                default_scale: Scale::default().value(),
            },
            dashboard: DashboardOptions {
                years: with_all(dataset.monthly_years().iter().map(|y| y.to_string()).collect()),
                departments: with_all(dataset.monthly_departments()),
            },
        }
    }
}

/// Row counts and join mismatches of the loaded data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub deaths: usize,
    pub totals: usize,
    pub monthly: usize,
    pub population: usize,
    pub boundaries: usize,
    pub join_report: JoinReport,
}

impl From<&Dataset> for DatasetSummary {
    fn from(dataset: &Dataset) -> Self {
        DatasetSummary {
            deaths: dataset.deaths.len(),
            totals: dataset.totals.len(),
            monthly: dataset.monthly.len(),
            population: dataset.population.len(),
            boundaries: dataset.boundaries.len(),
            join_report: dataset.join_report(),
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "requestId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{dashboard_view, map_view};
    use crate::loader::tests::fixture_dataset;
    use crate::models::{DepartmentFilter, YearSelection};

    #[test]
    fn test_options_from_dataset() {
        let options = OptionsResponse::from(&fixture_dataset());

        assert_eq!(options.map.years, vec![2019, 2020]);
        assert_eq!(options.map.default_range, Some((2019, 2020)));
        assert_eq!(options.map.scales, vec![100, 1_000, 10_000, 100_000, 1_000_000]);
        assert_eq!(options.map.default_scale, 100);
        assert_eq!(options.dashboard.years, vec!["Todos", "2019", "2020"]);
        assert_eq!(options.dashboard.departments[0], "Todos");
        assert_eq!(options.dashboard.departments.len(), 4);
    }

    #[test]
    fn test_options_for_empty_dataset() {
        let options = OptionsResponse::from(&Dataset::default());
        assert_eq!(options.map.default_range, None);
        assert_eq!(options.dashboard.departments, vec!["Todos"]);
    }

    #[test]
    fn test_map_response_status_and_shape() {
        let ds = fixture_dataset();
        let response = MapResponse::from(map_view(&ds, 2019, 2020, Scale::HundredThousand).unwrap());
        assert_eq!(response.status, "warning");

        let json = serde_json::to_value(&response).unwrap();
        assert!(json["requestId"].is_string());
        assert_eq!(json["yearStart"], 2019);
        assert_eq!(json["scale"], 100_000);
        assert_eq!(json["rates"][0]["department"], "ANTIOQUIA");
        assert!(json["rates"][0].get("key").is_none());
        assert_eq!(json["choropleth"]["features"]["type"], "FeatureCollection");

        let empty = MapResponse::from(map_view(&ds, 1990, 1991, Scale::Hundred).unwrap());
        assert_eq!(empty.status, "empty");
        assert!(serde_json::to_value(&empty).unwrap()["summary"].is_null());
    }

    #[test]
    fn test_dashboard_response_shape() {
        let ds = fixture_dataset();
        let response = DashboardResponse::from(dashboard_view(&ds, YearSelection::All, DepartmentFilter::All).unwrap());
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "ready");
        assert_eq!(json["monthly"]["months"].as_array().unwrap().len(), 12);
        assert_eq!(json["monthly"]["months"][0]["month"], "Enero");
        assert_eq!(json["kpis"]["totalRecords"], 5);
        assert_eq!(json["years"], "Todos los años");
    }

    #[test]
    fn test_error_response() {
        let body = error_response("Invalid year range: 2020 > 2019");
        assert_eq!(body["status"], "error");
        assert!(body["error"].as_str().unwrap().contains("2020 > 2019"));
    }
}
