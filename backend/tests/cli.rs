//! The query subcommands print nothing but JSON on stdout; progress goes to stderr.

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

const BOUNDARIES: &str = r#"{"type": "FeatureCollection", "features": [
    {"type": "Feature", "properties": {"NOMBRE_DPT": "ANTIOQUIA"}, "geometry": null},
    {"type": "Feature", "properties": {"NOMBRE_DPT": "CALDAS"}, "geometry": null}
]}"#;

fn write_fixture(dir: &Path) {
    fs::write(dir.join("colombia_departamentos.geojson"), BOUNDARIES).unwrap();
    fs::write(
        dir.join("muertes_completo.csv"),
        "NOMBRE_DPT;ANIO_DEF;TOTAL_MUERTES\nANTIOQUIA;2019;40\nANTIOQUIA;2020;50\nCALDAS;2020;7\n",
    )
    .unwrap();
    fs::write(
        dir.join("dep_anio_mes.csv"),
        "NOMBRE_DPT;ANIO_DEF;MES_DEF;NUM_MUERTES\nANTIOQUIA;2020;Enero;20\nANTIOQUIA;2020;Diciembre;30\nCALDAS;2020;Julio;7\n",
    )
    .unwrap();
    fs::write(
        dir.join("defunciones.csv"),
        "NOMBRE_DPT;NOMBRE_MPIO;ANIO_DEF;MES_DEF;GRUPO_EDAD;ESTADO_CIVIL\nANTIOQUIA;MEDELLIN;2020;Enero;60-64;CASADA\n",
    )
    .unwrap();
    fs::write(
        dir.join("poblacion.csv"),
        "NOMBRE_DPT;ANIO;TOTAL_MUJERES\nANTIOQUIA;2019;900000\nANTIOQUIA;2020;1000000\nCALDAS;2020;500000\n",
    )
    .unwrap();
}

fn run(dir: &Path, args: &[&str]) -> (Value, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_mortality-atlas"))
        .arg("--data-dir")
        .arg(dir)
        .args(args)
        .env_remove("ATLAS_DATA_DIR")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let json = serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("stdout is not JSON ({e}):\n{stdout}"));
    (json, String::from_utf8_lossy(&output.stderr).into_owned())
}

#[test]
fn test_map_prints_only_json() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());

    let (json, stderr) = run(dir.path(), &["map", "--start", "2020", "--end", "2020", "-k", "100000"]);

    assert_eq!(json["yearStart"], 2020);
    assert_eq!(json["rates"][0]["department"], "ANTIOQUIA");
    assert_eq!(json["rates"][0]["rate"], 5.0);
    assert!(stderr.contains("population rows"));
}

#[test]
fn test_dashboard_options_and_check_print_only_json() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());

    let (dashboard, _) = run(dir.path(), &["dashboard", "--year", "2020", "--department", "Antioquia"]);
    assert_eq!(dashboard["monthly"]["months"].as_array().unwrap().len(), 12);

    let (options, _) = run(dir.path(), &["options"]);
    assert_eq!(options["map"]["years"], serde_json::json!([2019, 2020]));

    let (check, _) = run(dir.path(), &["check"]);
    assert_eq!(check["boundaries"], 2);
}

#[test]
fn test_failure_exits_non_zero() {
    let dir = tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_mortality-atlas"))
        .arg("--data-dir")
        .arg(dir.path())
        .arg("options")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
}
