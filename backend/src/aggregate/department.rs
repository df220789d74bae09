//! Department rates for the map view.
//!
//! ```text
//! totals ──group by dept──▶ deaths ─┐
//!                                    ├─inner join─▶ rate = deaths / pop × k ─left join─▶ boundaries
//! population ─sum|median──▶ pop ────┘
//! ```

use polars::df;
use polars::prelude::{col, DataFrame, DataType, IntoLazy, JoinArgs, JoinType, PolarsResult};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

use super::{rate, PopulationReduction, DEATHS, KEY, WOMEN};
use crate::loader::NameBook;
use crate::models::{DepartmentKey, GeoBoundary, MortalityTotal, PopulationRecord, Scale, YearSelection};

/// One row of the department-rate table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRate {
    #[serde(skip)]
    pub key: DepartmentKey,
    pub department: String,
    pub deaths: u64,
    pub population: f64,
    /// `None` when the reduced population is zero
    pub rate: Option<f64>,
}

/// Keys dropped by the inner join.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedDepartments {
    /// Deaths recorded but no population in range
    pub without_population: Vec<String>,
    /// Population in range but no deaths recorded
    pub without_deaths: Vec<String>,
}

impl UnmatchedDepartments {
    pub fn is_empty(&self) -> bool {
        self.without_population.is_empty() && self.without_deaths.is_empty()
    }
}

/// Department with its rate, for the summary panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRate {
    pub department: String,
    pub rate: f64,
}

/// Highest, lowest and unweighted mean rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSummary {
    pub highest: RankedRate,
    pub mean: f64,
    pub lowest: RankedRate,
}

/// Result of [`department_rates`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRates {
    pub scale: Scale,
    pub reduction: PopulationReduction,
    pub rows: Vec<DepartmentRate>,
    pub unmatched: UnmatchedDepartments,
}

impl DepartmentRates {
    pub fn get(&self, key: &DepartmentKey) -> Option<&DepartmentRate> {
        self.rows.iter().find(|r| &r.key == key)
    }

    /// Largest defined rate.
    pub fn max_rate(&self) -> Option<f64> {
        self.rows.iter().filter_map(|r| r.rate).reduce(f64::max)
    }
}

fn display(names: &NameBook, key: &DepartmentKey) -> String {
    names.get(key).cloned().unwrap_or_else(|| key.to_string())
}

fn deaths_by_department(rows: &[&MortalityTotal]) -> PolarsResult<DataFrame> {
    df!(
        KEY => rows.iter().map(|r| r.department.as_str()).collect::<Vec<_>>(),
        DEATHS => rows.iter().map(|r| r.deaths).collect::<Vec<u64>>()
    )?
    .lazy()
    .group_by([col(KEY)])
    .agg([col(DEATHS).sum().cast(DataType::UInt64)])
    .collect()
}

fn population_by_department(rows: &[&PopulationRecord], reduction: PopulationReduction) -> PolarsResult<DataFrame> {
    df!(
        KEY => rows.iter().map(|r| r.department.as_str()).collect::<Vec<_>>(),
        WOMEN => rows.iter().map(|r| r.women).collect::<Vec<f64>>()
    )?
    .lazy()
    .group_by([col(KEY)])
    .agg([reduction.expr(WOMEN)])
    .collect()
}

fn key_set(frame: &DataFrame) -> PolarsResult<BTreeSet<DepartmentKey>> {
    Ok(frame
        .column(KEY)?
        .str()?
        .into_iter()
        .flatten()
        .map(DepartmentKey::from_normalized)
        .collect())
}

/// Rates per department over already filtered rows.
///
/// Departments present on only one side of the inner join are left out of
/// `rows` and listed in `unmatched`. Rows come back ordered by key.
pub fn department_rates(
    mortality: &[&MortalityTotal],
    population: &[&PopulationRecord],
    years: &YearSelection,
    scale: Scale,
    names: &NameBook,
) -> PolarsResult<DepartmentRates> {
    let reduction = PopulationReduction::for_years(years);
    let deaths = deaths_by_department(mortality)?;
    let women = population_by_department(population, reduction)?;

    let with_deaths = key_set(&deaths)?;
    let with_population = key_set(&women)?;
    let unmatched = UnmatchedDepartments {
        without_population: with_deaths.difference(&with_population).map(|k| display(names, k)).collect(),
        without_deaths: with_population.difference(&with_deaths).map(|k| display(names, k)).collect(),
    };

    let joined = deaths
        .lazy()
        .join(women.lazy(), [col(KEY)], [col(KEY)], JoinArgs::new(JoinType::Inner))
        .collect()?;

    let keys = joined.column(KEY)?.str()?;
    let totals = joined.column(DEATHS)?.u64()?;
    let reduced = joined.column(WOMEN)?.f64()?;

    let mut rows: Vec<DepartmentRate> = keys
        .into_iter()
        .zip(totals)
        .zip(reduced)
        .filter_map(|((key, deaths), population)| Some((key?, deaths?, population?)))
        .map(|(key, deaths, population)| {
            let key = DepartmentKey::from_normalized(key);
            DepartmentRate {
                department: display(names, &key),
                deaths,
                population,
                rate: rate(deaths, population, scale.factor()),
                key,
            }
        })
        .collect();
    rows.sort_by(|a, b| a.key.cmp(&b.key));

    Ok(DepartmentRates {
        scale,
        reduction,
        rows,
        unmatched,
    })
}

/// Max / min / mean over the defined rates; `None` when there are none.
///
/// Ties keep the first department in table order.
pub fn summarize(rows: &[DepartmentRate]) -> Option<RateSummary> {
    let defined: Vec<(&DepartmentRate, f64)> = rows
        .iter()
        .filter_map(|r| r.rate.filter(|v| v.is_finite()).map(|v| (r, v)))
        .collect();

    let (first, rest) = defined.split_first()?;
    let mut highest = *first;
    let mut lowest = *first;
    for &(row, value) in rest {
        if value > highest.1 {
            highest = (row, value);
        }
        if value < lowest.1 {
            lowest = (row, value);
        }
    }
    let mean = defined.iter().map(|(_, v)| v).sum::<f64>() / defined.len() as f64;

    Some(RateSummary {
        highest: RankedRate {
            department: highest.0.department.clone(),
            rate: highest.1,
        },
        mean,
        lowest: RankedRate {
            department: lowest.0.department.clone(),
            rate: lowest.1,
        },
    })
}

/// Boundaries joined with rates, ready for a choropleth layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Choropleth {
    /// GeoJSON FeatureCollection; `properties.rate` is `null` where undefined
    pub features: Value,
    /// Colour scale bounds `(0, max rate)`; `None` without any defined rate
    pub color_range: Option<(f64, f64)>,
    /// Shapes drawn without a rate
    pub without_rate: Vec<String>,
}

const SHAPE: &str = "shape";
const POPULATION: &str = "population";
const RATE: &str = "rate";

fn rate_frame(rates: &DepartmentRates) -> PolarsResult<DataFrame> {
    df!(
        KEY => rates.rows.iter().map(|r| r.key.as_str()).collect::<Vec<_>>(),
        DEATHS => rates.rows.iter().map(|r| r.deaths).collect::<Vec<u64>>(),
        POPULATION => rates.rows.iter().map(|r| r.population).collect::<Vec<f64>>(),
        RATE => rates.rows.iter().map(|r| r.rate).collect::<Vec<Option<f64>>>()
    )
}

/// Deaths, population and rate matched to each boundary, by position.
type ShapeRow = Option<(u64, f64, Option<f64>)>;

/// Left join of every boundary with the rate table.
pub fn choropleth(boundaries: &[GeoBoundary], rates: &DepartmentRates) -> PolarsResult<Choropleth> {
    let shapes = df!(
        SHAPE => (0..boundaries.len() as u32).collect::<Vec<u32>>(),
        KEY => boundaries.iter().map(|b| b.department.as_str()).collect::<Vec<_>>()
    )?;
    let joined = shapes
        .lazy()
        .join(rate_frame(rates)?.lazy(), [col(KEY)], [col(KEY)], JoinArgs::new(JoinType::Left))
        .collect()?;

    // join output order is unspecified; place rows back by shape index
    let mut matched: Vec<ShapeRow> = vec![None; boundaries.len()];
    let shape = joined.column(SHAPE)?.u32()?;
    let deaths = joined.column(DEATHS)?.u64()?;
    let population = joined.column(POPULATION)?.f64()?;
    let rate = joined.column(RATE)?.f64()?;
    for (((shape, deaths), population), rate) in shape.into_iter().zip(deaths).zip(population).zip(rate) {
        if let (Some(shape), Some(deaths), Some(population)) = (shape, deaths, population) {
            if let Some(slot) = matched.get_mut(shape as usize) {
                *slot = Some((deaths, population, rate));
            }
        }
    }

    let mut without_rate = Vec::new();
    let features: Vec<Value> = boundaries
        .iter()
        .zip(&matched)
        .map(|(boundary, row)| {
            let rate = row.and_then(|(_, _, rate)| rate);
            if rate.is_none() {
                without_rate.push(boundary.name.clone());
            }

            let mut properties = Map::new();
            properties.insert("NOMBRE_DPT".to_string(), json!(boundary.name));
            properties.insert("rate".to_string(), json!(rate));
            properties.insert("deaths".to_string(), json!(row.map(|(deaths, _, _)| deaths)));
            properties.insert("population".to_string(), json!(row.map(|(_, population, _)| population)));

            json!({
                "type": "Feature",
                "id": boundary.department.as_str(),
                "properties": properties,
                "geometry": boundary.geometry,
            })
        })
        .collect();

    Ok(Choropleth {
        features: json!({
            "type": "FeatureCollection",
            "features": features,
        }),
        color_range: rates.max_rate().map(|max| (0.0, max)),
        without_rate,
    })
}
