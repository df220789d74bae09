//! Reads the input files into an immutable [`Dataset`].
//!
//! Every department name is normalized into a [`DepartmentKey`] here, once,
//! so the filter and aggregation stages only ever compare keys.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::api::logs::{log_info, log_success, log_warning};
use crate::config::DataPaths;
use crate::error::{LoadError, LoadResult};
use crate::models::{
    DeathRecord, DepartmentKey, GeoBoundary, Month, MonthlyMortality, MortalityTotal,
    PopulationRecord,
};
use crate::parser::{parse_bytes_auto, CsvError, Table};

/// Department name column shared by all tabular sources.
pub const COL_DEPARTMENT: &str = "NOMBRE_DPT";
pub const COL_MUNICIPALITY: &str = "NOMBRE_MPIO";
pub const COL_DEATH_YEAR: &str = "ANIO_DEF";
pub const COL_DEATH_MONTH: &str = "MES_DEF";
pub const COL_AGE_GROUP: &str = "GRUPO_EDAD";
pub const COL_MARITAL_STATUS: &str = "ESTADO_CIVIL";
pub const COL_TOTAL_DEATHS: &str = "TOTAL_MUERTES";
pub const COL_MONTHLY_DEATHS: &str = "NUM_MUERTES";
pub const COL_YEAR: &str = "ANIO";
pub const COL_WOMEN: &str = "TOTAL_MUJERES";

/// Feature properties tried, in order, for the department name.
pub const BOUNDARY_NAME_PROPERTIES: &[&str] = &["NOMBRE_DPT", "DPTO_CNMBR", "NOMBRE_DEPTO"];

/// Department display names, first spelling seen wins.
pub type NameBook = BTreeMap<DepartmentKey, String>;

/// All input tables, loaded once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub deaths: Vec<DeathRecord>,
    pub totals: Vec<MortalityTotal>,
    pub monthly: Vec<MonthlyMortality>,
    pub population: Vec<PopulationRecord>,
    pub boundaries: Vec<GeoBoundary>,
    /// Display name per key; boundary-file spelling takes precedence
    pub names: NameBook,
}

impl Dataset {
    /// Human-readable name for a key.
    pub fn display_name(&self, key: &DepartmentKey) -> String {
        self.names
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Sorted distinct years of the map-view totals.
    pub fn total_years(&self) -> Vec<i32> {
        distinct(self.totals.iter().map(|r| r.year))
    }

    /// Sorted distinct years of the monthly table.
    pub fn monthly_years(&self) -> Vec<i32> {
        distinct(self.monthly.iter().map(|r| r.year))
    }

    /// Sorted display names of departments present in the monthly table.
    pub fn monthly_departments(&self) -> Vec<String> {
        let keys: BTreeSet<&DepartmentKey> = self.monthly.iter().map(|r| &r.department).collect();
        let mut names: Vec<String> = keys.into_iter().map(|k| self.display_name(k)).collect();
        names.sort();
        names
    }

    /// Departments that will not line up across sources.
    pub fn join_report(&self) -> JoinReport {
        let mortality: BTreeSet<&DepartmentKey> = self
            .totals
            .iter()
            .map(|r| &r.department)
            .chain(self.monthly.iter().map(|r| &r.department))
            .chain(self.deaths.iter().map(|r| &r.department))
            .collect();
        let population: BTreeSet<&DepartmentKey> =
            self.population.iter().map(|r| &r.department).collect();
        let geography: BTreeSet<&DepartmentKey> =
            self.boundaries.iter().map(|b| &b.department).collect();

        let names = |keys: Vec<&DepartmentKey>| -> Vec<String> {
            keys.into_iter().map(|k| self.display_name(k)).collect()
        };

        JoinReport {
            missing_population: names(mortality.difference(&population).copied().collect()),
            missing_boundary: names(mortality.difference(&geography).copied().collect()),
            boundaries_without_data: names(geography.difference(&mortality).copied().collect()),
        }
    }
}

fn distinct(years: impl Iterator<Item = i32>) -> Vec<i32> {
    years.collect::<BTreeSet<_>>().into_iter().collect()
}

/// Department keys that fail to match across sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinReport {
    /// In mortality data, absent from population (rates undefined / dropped)
    pub missing_population: Vec<String>,
    /// In mortality data, absent from the boundary file (not drawn)
    pub missing_boundary: Vec<String>,
    /// Drawn on the map but without any mortality rows
    pub boundaries_without_data: Vec<String>,
}

impl JoinReport {
    pub fn is_clean(&self) -> bool {
        self.missing_population.is_empty() && self.missing_boundary.is_empty()
    }
}

/// Load every source named in `paths`.
pub fn load_dataset(paths: &DataPaths) -> LoadResult<Dataset> {
    log_info("📖 Loading mortality atlas data...");
    let mut names = NameBook::new();

    let boundaries = load_boundaries(&paths.boundaries, &mut names)?;
    log_success(format!("{} department boundaries", boundaries.len()));
    let totals = load_totals(&paths.totals, &mut names)?;
    log_success(format!("{} department-year death totals", totals.len()));
    let monthly = load_monthly(&paths.monthly, &mut names)?;
    log_success(format!("{} department-month death counts", monthly.len()));
    let deaths = load_deaths(&paths.deaths, &mut names)?;
    log_success(format!("{} death records", deaths.len()));
    let population = load_population(&paths.population, &mut names)?;
    log_success(format!("{} population rows", population.len()));

    let dataset = Dataset {
        deaths,
        totals,
        monthly,
        population,
        boundaries,
        names,
    };

    let report = dataset.join_report();
    if !report.missing_population.is_empty() {
        log_warning(format!(
            "No population for {} department(s): {}",
            report.missing_population.len(),
            report.missing_population.join(", ")
        ));
    }
    if !report.missing_boundary.is_empty() {
        log_warning(format!(
            "No boundary for {} department(s): {}",
            report.missing_boundary.len(),
            report.missing_boundary.join(", ")
        ));
    }

    Ok(dataset)
}

/// Read and parse a delimited file.
pub fn read_table(path: &Path) -> LoadResult<Table> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
    let table = parse_bytes_auto(&bytes).map_err(|e| LoadError::csv(path, e))?;
    log_info(format!(
        "{}: encoding {}, delimiter '{}', {} rows",
        path.display(),
        table.encoding,
        format_delimiter(table.delimiter),
        table.len()
    ));
    Ok(table)
}

fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

/// Column index or [`LoadError::MissingColumn`].
fn require(table: &Table, path: &Path, column: &str) -> LoadResult<usize> {
    table.column(column).ok_or_else(|| LoadError::MissingColumn {
        path: path.to_path_buf(),
        column: column.to_string(),
    })
}

/// Normalize a department cell and remember its spelling.
fn department(table: &Table, row: usize, col: usize, names: &mut NameBook) -> Result<DepartmentKey, CsvError> {
    let name = table.text(row, col)?;
    let key = DepartmentKey::from_name(&name);
    names.entry(key.clone()).or_insert(name);
    Ok(key)
}

fn year(table: &Table, row: usize, col: usize) -> Result<i32, CsvError> {
    let value = table.parse_integer(row, col)?;
    i32::try_from(value).map_err(|_| {
        CsvError::new(row + 2, "year out of range").with_value(value.to_string())
    })
}

fn count(table: &Table, row: usize, col: usize) -> Result<u64, CsvError> {
    let value = table.parse_integer(row, col)?;
    u64::try_from(value).map_err(|_| {
        CsvError::new(row + 2, "negative death count").with_value(value.to_string())
    })
}

/// One row per death: department, municipality, year, month, age group, marital status.
pub fn load_deaths(path: &Path, names: &mut NameBook) -> LoadResult<Vec<DeathRecord>> {
    let table = read_table(path)?;
    let dept = require(&table, path, COL_DEPARTMENT)?;
    let muni = require(&table, path, COL_MUNICIPALITY)?;
    let yr = require(&table, path, COL_DEATH_YEAR)?;
    let month = require(&table, path, COL_DEATH_MONTH)?;
    let age = require(&table, path, COL_AGE_GROUP)?;
    let civil = require(&table, path, COL_MARITAL_STATUS)?;

    (0..table.len())
        .map(|row| -> Result<DeathRecord, CsvError> {
            Ok(DeathRecord {
                department: department(&table, row, dept, names)?,
                municipality: table.cell(row, muni).to_string(),
                year: year(&table, row, yr)?,
                month: table.parse::<Month>(row, month)?,
                age_group: table.cell(row, age).to_string(),
                marital_status: table.cell(row, civil).to_string(),
            })
        })
        .collect::<Result<Vec<_>, CsvError>>()
        .map_err(|e| LoadError::csv(path, e))
}

/// Deaths per department and year.
pub fn load_totals(path: &Path, names: &mut NameBook) -> LoadResult<Vec<MortalityTotal>> {
    let table = read_table(path)?;
    let dept = require(&table, path, COL_DEPARTMENT)?;
    let yr = require(&table, path, COL_DEATH_YEAR)?;
    let deaths = require(&table, path, COL_TOTAL_DEATHS)?;

    (0..table.len())
        .map(|row| -> Result<MortalityTotal, CsvError> {
            Ok(MortalityTotal {
                department: department(&table, row, dept, names)?,
                year: year(&table, row, yr)?,
                deaths: count(&table, row, deaths)?,
            })
        })
        .collect::<Result<Vec<_>, CsvError>>()
        .map_err(|e| LoadError::csv(path, e))
}

/// Deaths per department, year and month.
pub fn load_monthly(path: &Path, names: &mut NameBook) -> LoadResult<Vec<MonthlyMortality>> {
    let table = read_table(path)?;
    let dept = require(&table, path, COL_DEPARTMENT)?;
    let yr = require(&table, path, COL_DEATH_YEAR)?;
    let month = require(&table, path, COL_DEATH_MONTH)?;
    let deaths = require(&table, path, COL_MONTHLY_DEATHS)?;

    (0..table.len())
        .map(|row| -> Result<MonthlyMortality, CsvError> {
            Ok(MonthlyMortality {
                department: department(&table, row, dept, names)?,
                year: year(&table, row, yr)?,
                month: table.parse::<Month>(row, month)?,
                deaths: count(&table, row, deaths)?,
            })
        })
        .collect::<Result<Vec<_>, CsvError>>()
        .map_err(|e| LoadError::csv(path, e))
}

/// Female population per department and year.
pub fn load_population(path: &Path, names: &mut NameBook) -> LoadResult<Vec<PopulationRecord>> {
    let table = read_table(path)?;
    let dept = require(&table, path, COL_DEPARTMENT)?;
    let yr = require(&table, path, COL_YEAR)?;
    let women = require(&table, path, COL_WOMEN)?;

    (0..table.len())
        .map(|row| -> Result<PopulationRecord, CsvError> {
            let value: f64 = table.parse(row, women)?;
            if value < 0.0 || !value.is_finite() {
                return Err(CsvError::new(row + 2, "population must be a non-negative number")
                    .with_column(COL_WOMEN)
                    .with_value(table.cell(row, women)));
            }
            Ok(PopulationRecord {
                department: department(&table, row, dept, names)?,
                year: year(&table, row, yr)?,
                women: value,
            })
        })
        .collect::<Result<Vec<_>, CsvError>>()
        .map_err(|e| LoadError::csv(path, e))
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Value,
}

/// Department polygons from a GeoJSON FeatureCollection.
pub fn load_boundaries(path: &Path, names: &mut NameBook) -> LoadResult<Vec<GeoBoundary>> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
    let collection: FeatureCollection =
        serde_json::from_slice(&bytes).map_err(|e| LoadError::geojson(path, e.to_string()))?;

    if collection.kind != "FeatureCollection" {
        return Err(LoadError::geojson(
            path,
            format!("expected a FeatureCollection, found '{}'", collection.kind),
        ));
    }

    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(i, feature)| {
            let name = feature
                .properties
                .as_ref()
                .and_then(boundary_name)
                .ok_or_else(|| LoadError::MissingColumn {
                    path: path.to_path_buf(),
                    column: format!("{} (feature {})", BOUNDARY_NAME_PROPERTIES[0], i),
                })?;
            let key = DepartmentKey::from_name(&name);
            names.entry(key.clone()).or_insert_with(|| name.clone());
            Ok(GeoBoundary {
                department: key,
                name,
                geometry: feature.geometry,
            })
        })
        .collect()
}

fn boundary_name(properties: &Map<String, Value>) -> Option<String> {
    BOUNDARY_NAME_PROPERTIES.iter().find_map(|wanted| {
        properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(wanted))
            .and_then(|(_, v)| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    pub const BOUNDARIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"NOMBRE_DPT": "ANTIOQUIA"},
             "geometry": {"type": "Polygon", "coordinates": [[[-76.0, 6.0], [-75.0, 6.0], [-75.0, 7.0], [-76.0, 6.0]]]}},
            {"type": "Feature", "properties": {"NOMBRE_DPT": "BOGOTÁ, D.C."},
             "geometry": {"type": "Polygon", "coordinates": [[[-74.2, 4.5], [-74.0, 4.5], [-74.0, 4.8], [-74.2, 4.5]]]}},
            {"type": "Feature", "properties": {"NOMBRE_DPT": "AMAZONAS"},
             "geometry": {"type": "Polygon", "coordinates": [[[-72.0, -1.0], [-70.0, -1.0], [-70.0, 0.0], [-72.0, -1.0]]]}}
        ]
    }"#;

    pub const TOTALS: &str = "NOMBRE_DPT;ANIO_DEF;TOTAL_MUERTES\n\
        ANTIOQUIA;2019;40\n\
        ANTIOQUIA;2020;50\n\
        Bogotá D.C.;2019;90\n\
        Bogotá D.C.;2020;110\n\
        CALDAS;2020;7\n";

    pub const MONTHLY: &str = "NOMBRE_DPT;ANIO_DEF;MES_DEF;NUM_MUERTES\n\
        ANTIOQUIA;2019;Enero;15\n\
        ANTIOQUIA;2019;Marzo;25\n\
        ANTIOQUIA;2020;Enero;20\n\
        ANTIOQUIA;2020;Diciembre;30\n\
        BOGOTA D.C.;2019;Febrero;90\n\
        BOGOTA D.C.;2020;Junio;110\n\
        CALDAS;2020;Julio;7\n";

    pub const DEATHS: &str = "NOMBRE_DPT;NOMBRE_MPIO;ANIO_DEF;MES_DEF;GRUPO_EDAD;ESTADO_CIVIL\n\
        ANTIOQUIA;MEDELLIN;2020;Enero;60-64;CASADA\n\
        ANTIOQUIA;MEDELLIN;2020;Diciembre;65-69;VIUDA\n\
        ANTIOQUIA;ENVIGADO;2020;Diciembre;60-64;SOLTERA\n\
        ANTIOQUIA;BELLO;2019;Marzo;50-54;CASADA\n\
        BOGOTA D.C.;BOGOTA D.C.;2020;Junio;60-64;CASADA\n";

    pub const POPULATION: &str = "NOMBRE_DPT;ANIO;TOTAL_MUJERES\n\
        ANTIOQUIA;2019;900000\n\
        ANTIOQUIA;2020;1000000\n\
        BOGOTA D.C.;2019;4000000\n\
        BOGOTA D.C.;2020;4400000\n\
        AMAZONAS;2020;40000\n";

    /// Writes the fixture files and returns the directory guard with its paths.
    pub fn fixture_dir() -> (TempDir, DataPaths) {
        let dir = tempdir().unwrap();
        let paths = DataPaths::in_dir(dir.path());
        fs::write(&paths.boundaries, BOUNDARIES).unwrap();
        fs::write(&paths.totals, TOTALS).unwrap();
        fs::write(&paths.monthly, MONTHLY).unwrap();
        fs::write(&paths.deaths, DEATHS).unwrap();
        fs::write(&paths.population, POPULATION).unwrap();
        (dir, paths)
    }

    pub fn fixture_dataset() -> Dataset {
        let (_dir, paths) = fixture_dir();
        load_dataset(&paths).unwrap()
    }

    #[test]
    fn test_load_all_sources() {
        let ds = fixture_dataset();

        assert_eq!(ds.boundaries.len(), 3);
        assert_eq!(ds.totals.len(), 5);
        assert_eq!(ds.monthly.len(), 7);
        assert_eq!(ds.deaths.len(), 5);
        assert_eq!(ds.population.len(), 5);
        assert_eq!(ds.monthly[1].month, Month::Marzo);
        assert_eq!(ds.deaths[0].municipality, "MEDELLIN");
    }

    #[test]
    fn test_department_spellings_share_a_key() {
        let ds = fixture_dataset();
        let bogota = DepartmentKey::from_name("BOGOTA D.C.");

        assert_eq!(ds.totals[2].department, bogota);
        assert_eq!(ds.boundaries[1].department, bogota);
        // boundary spelling wins
        assert_eq!(ds.display_name(&bogota), "BOGOTÁ, D.C.");
    }

    #[test]
    fn test_latin1_population_joins_utf8_boundaries() {
        let (_dir, paths) = fixture_dir();
        let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(
            "NOMBRE_DPT;ANIO;TOTAL_MUJERES\n\
             ANTIOQUIA;2020;1000000\n\
             BOGOTÁ, D.C.;2020;4400000\n\
             NARIÑO;2020;800000\n",
        );
        fs::write(&paths.population, &bytes).unwrap();
        fs::write(
            &paths.boundaries,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"NOMBRE_DPT": "BOGOTÁ, D.C."}, "geometry": null},
                {"type": "Feature", "properties": {"NOMBRE_DPT": "NARIÑO"}, "geometry": null}
            ]}"#,
        )
        .unwrap();

        let ds = load_dataset(&paths).unwrap();

        assert_eq!(ds.population[1].department, ds.boundaries[0].department);
        assert_eq!(ds.population[2].department, ds.boundaries[1].department);
        assert_eq!(ds.population[2].department.as_str(), "NARINO");
        assert_eq!(ds.display_name(&ds.population[2].department), "NARIÑO");
    }

    #[test]
    fn test_year_and_department_listings() {
        let ds = fixture_dataset();
        assert_eq!(ds.total_years(), vec![2019, 2020]);
        assert_eq!(ds.monthly_years(), vec![2019, 2020]);
        assert_eq!(ds.monthly_departments(), vec!["ANTIOQUIA", "BOGOTÁ, D.C.", "CALDAS"]);
    }

    #[test]
    fn test_join_report() {
        let report = fixture_dataset().join_report();
        assert_eq!(report.missing_population, vec!["CALDAS"]);
        assert_eq!(report.missing_boundary, vec!["CALDAS"]);
        assert_eq!(report.boundaries_without_data, vec!["AMAZONAS"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = load_dataset(&DataPaths::in_dir(dir.path())).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_missing_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("poblacion.csv");
        fs::write(&path, "NOMBRE_DPT;ANIO\nANTIOQUIA;2020\n").unwrap();

        let err = load_population(&path, &mut NameBook::new()).unwrap_err();
        match err {
            LoadError::MissingColumn { column, .. } => assert_eq!(column, "TOTAL_MUJERES"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_value_reports_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("muertes.csv");
        fs::write(&path, "NOMBRE_DPT;ANIO_DEF;TOTAL_MUERTES\nANTIOQUIA;2020;5\nCALDAS;2020;muchas\n").unwrap();

        let err = load_totals(&path, &mut NameBook::new()).unwrap_err();
        match err {
            LoadError::Csv { source, .. } => {
                assert_eq!(source.line, 3);
                assert_eq!(source.value.as_deref(), Some("muchas"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_month_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mes.csv");
        fs::write(&path, "NOMBRE_DPT;ANIO_DEF;MES_DEF;NUM_MUERTES\nANTIOQUIA;2020;Enerro;5\n").unwrap();

        assert!(matches!(
            load_monthly(&path, &mut NameBook::new()),
            Err(LoadError::Csv { .. })
        ));
    }

    #[test]
    fn test_negative_population_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pob.csv");
        fs::write(&path, "NOMBRE_DPT;ANIO;TOTAL_MUJERES\nANTIOQUIA;2020;-3\n").unwrap();

        assert!(load_population(&path, &mut NameBook::new()).is_err());
    }

    #[test]
    fn test_boundaries_must_be_feature_collection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geo.geojson");
        fs::write(&path, r#"{"type": "Feature", "features": []}"#).unwrap();
        assert!(matches!(
            load_boundaries(&path, &mut NameBook::new()),
            Err(LoadError::GeoJson { .. })
        ));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            load_boundaries(&path, &mut NameBook::new()),
            Err(LoadError::GeoJson { .. })
        ));
    }
}
