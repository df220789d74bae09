//! Application configuration.
//!
//! Paths of the five input files and the server port, read from the
//! environment (and `.env` when present). CLI flags override these;
//! `--data-dir` swaps the directory but keeps `ATLAS_*_FILE` paths.

use std::env;
use std::path::{Path, PathBuf};

/// Default directory holding the input files.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

pub const DEFAULT_DEATHS_FILE: &str = "defunciones.csv";
pub const DEFAULT_TOTALS_FILE: &str = "muertes_completo.csv";
pub const DEFAULT_MONTHLY_FILE: &str = "dep_anio_mes.csv";
pub const DEFAULT_POPULATION_FILE: &str = "poblacion.csv";
pub const DEFAULT_BOUNDARIES_FILE: &str = "colombia_departamentos.geojson";

/// Location of every input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    /// One row per death
    pub deaths: PathBuf,
    /// Deaths per department and year
    pub totals: PathBuf,
    /// Deaths per department, year and month
    pub monthly: PathBuf,
    /// Female population per department and year
    pub population: PathBuf,
    /// Department polygons (GeoJSON)
    pub boundaries: PathBuf,
}

impl DataPaths {
    /// Default file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            deaths: dir.join(DEFAULT_DEATHS_FILE),
            totals: dir.join(DEFAULT_TOTALS_FILE),
            monthly: dir.join(DEFAULT_MONTHLY_FILE),
            population: dir.join(DEFAULT_POPULATION_FILE),
            boundaries: dir.join(DEFAULT_BOUNDARIES_FILE),
        }
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::in_dir(DEFAULT_DATA_DIR)
    }
}

/// Per-file paths from `ATLAS_*_FILE`; they win over any data directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOverrides {
    pub deaths: Option<PathBuf>,
    pub totals: Option<PathBuf>,
    pub monthly: Option<PathBuf>,
    pub population: Option<PathBuf>,
    pub boundaries: Option<PathBuf>,
}

impl FileOverrides {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str| lookup(key).map(PathBuf::from);
        Self {
            deaths: path("ATLAS_DEATHS_FILE"),
            totals: path("ATLAS_TOTALS_FILE"),
            monthly: path("ATLAS_MONTHLY_FILE"),
            population: path("ATLAS_POPULATION_FILE"),
            boundaries: path("ATLAS_BOUNDARIES_FILE"),
        }
    }

    fn apply(&self, mut data: DataPaths) -> DataPaths {
        let slots = [
            (&self.deaths, &mut data.deaths),
            (&self.totals, &mut data.totals),
            (&self.monthly, &mut data.monthly),
            (&self.population, &mut data.population),
            (&self.boundaries, &mut data.boundaries),
        ];
        for (path, slot) in slots {
            if let Some(path) = path {
                *slot = path.clone();
            }
        }
        data
    }
}

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data: DataPaths,
    pub port: u16,
    pub overrides: FileOverrides,
}

impl AppConfig {
    /// Read `ATLAS_*` variables, loading `.env` first if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let dir = lookup("ATLAS_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let overrides = FileOverrides::from_lookup(&lookup);

        let port = lookup("ATLAS_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            data: overrides.apply(DataPaths::in_dir(&dir)),
            port,
            overrides,
        }
    }

    /// Default file names inside `dir`, except files overridden one by one.
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data = self.overrides.apply(DataPaths::in_dir(dir));
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataPaths::default(),
            port: DEFAULT_PORT,
            overrides: FileOverrides::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.data.population, Path::new("data").join("poblacion.csv"));
        assert_eq!(cfg.port, 3000);
    }

    #[test]
    fn test_data_dir_and_file_override() {
        let cfg = config(&[
            ("ATLAS_DATA_DIR", "/srv/atlas"),
            ("ATLAS_POPULATION_FILE", "/tmp/pob.csv"),
            ("ATLAS_PORT", "8080"),
        ]);
        assert_eq!(cfg.data.totals, Path::new("/srv/atlas").join("muertes_completo.csv"));
        assert_eq!(cfg.data.population, PathBuf::from("/tmp/pob.csv"));
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn test_invalid_port_falls_back() {
        assert_eq!(config(&[("ATLAS_PORT", "http")]).port, DEFAULT_PORT);
    }

    #[test]
    fn test_with_data_dir() {
        let cfg = AppConfig::default().with_data_dir("fixtures");
        assert_eq!(cfg.data.boundaries, Path::new("fixtures").join("colombia_departamentos.geojson"));
    }

    #[test]
    fn test_data_dir_keeps_file_overrides() {
        let cfg = config(&[
            ("ATLAS_DATA_DIR", "/srv/atlas"),
            ("ATLAS_POPULATION_FILE", "/tmp/pob.csv"),
        ])
        .with_data_dir("fixtures");

        assert_eq!(cfg.data.population, PathBuf::from("/tmp/pob.csv"));
        assert_eq!(cfg.data.totals, Path::new("fixtures").join("muertes_completo.csv"));
    }
}
