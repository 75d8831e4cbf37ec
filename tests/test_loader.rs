//! Integration test: reading the raw exports from disk

use bikeflow::data::schema::{COUNT_TOWARDS_DANMARKSPLASS, COUNT_TOWARDS_FLORIDA, RELATIVE_HUMIDITY};
use bikeflow::data::{load_directory, load_traffic_file, load_weather_file};
use bikeflow::error::ForecastError;
use chrono::NaiveDate;
use std::fs;
use std::path::Path;

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

const WEATHER_2021: &str = "\
Dato,Tid,Globalstraling,Solskinstid,Lufttemperatur,Vindretning,Vindstyrke,Lufttrykk,Vindkast
2021-12-31,23:00,0.0,0.0,1.0,180,2.0,1001.0,4.0
2021-12-31,23:10,0.0,0.0,3.0,190,2.5,1001.5,4.5
2021-12-31,23:20,0.0,0.0,-,200,3.0,1002.0,5.0
";

const WEATHER_2022: &str = "\
Dato,Tid,Globalstraling,Solskinstid,Lufttemperatur,Vindretning,Vindstyrke,Lufttrykk,Vindkast,Relativ luftfuktighet
2022-01-01,00:00,1.0,0.0,2.0,170,1.0,1000.0,3.0,80
2022-01-01,00:30,3.0,0.0,4.0,170,1.0,1000.0,3.0,82
2022-01-01,02:50,5.0,0.0,6.0,160,2.0,999.0,4.0,85
";

const TRAFFIC: &str = "\
Navn;Fra;Til;Felt;Trafikkmengde
Nygaardsbroen;2021-12-31T23:00+01:00;2022-01-01T00:00+01:00;Totalt;30
Nygaardsbroen;2021-12-31T23:00+01:00;2022-01-01T00:00+01:00;Totalt i retning Danmarksplass;10
Nygaardsbroen;2021-12-31T23:00+01:00;2022-01-01T00:00+01:00;Totalt i retning Florida;20
Nygaardsbroen|2022-01-01T00:00+01:00|2022-01-01T01:00+01:00|Totalt i retning Danmarksplass|-
Nygaardsbroen|2022-01-01T00:00+01:00|2022-01-01T01:00+01:00|Totalt i retning Florida|7
";

#[test]
fn test_weather_file_is_resampled_hourly() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Florida_2022.csv", WEATHER_2022);

    let table = load_weather_file(&dir.path().join("Florida_2022.csv")).unwrap();

    // 00:00, 01:00 (empty), 02:00
    assert_eq!(table.height(), 3);
    assert_eq!(table.column("Globalstraling").unwrap()[0], 2.0);
    assert!(table.column("Lufttemperatur").unwrap()[1].is_nan());
    assert_eq!(table.column("Lufttemperatur").unwrap()[2], 6.0);
    assert!(table.has_column(RELATIVE_HUMIDITY));
}

#[test]
fn test_non_numeric_weather_values_become_missing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Florida_2021.csv", WEATHER_2021);

    let table = load_weather_file(&dir.path().join("Florida_2021.csv")).unwrap();

    assert_eq!(table.height(), 1);
    // "-" is skipped by the hourly mean
    assert_eq!(table.column("Lufttemperatur").unwrap()[0], 2.0);
}

#[test]
fn test_traffic_file_is_pivoted_by_direction() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "trafikkdata.csv", TRAFFIC);

    let table = load_traffic_file(&dir.path().join("trafikkdata.csv")).unwrap();

    let expected_first = NaiveDate::from_ymd_opt(2021, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 0, 0))
        .unwrap();
    assert_eq!(table.height(), 2);
    assert_eq!(table.index()[0], expected_first);
    assert_eq!(table.width(), 2);
    assert_eq!(table.column(COUNT_TOWARDS_DANMARKSPLASS).unwrap()[0], 10.0);
    assert_eq!(table.column(COUNT_TOWARDS_FLORIDA).unwrap()[0], 20.0);
    assert!(table.column(COUNT_TOWARDS_DANMARKSPLASS).unwrap()[1].is_nan());
    assert_eq!(table.column(COUNT_TOWARDS_FLORIDA).unwrap()[1], 7.0);
}

#[test]
fn test_directory_concatenates_weather_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Florida_2021.csv", WEATHER_2021);
    write(dir.path(), "Florida_2022.csv", WEATHER_2022);
    write(dir.path(), "trafikkdata.csv", TRAFFIC);
    write(dir.path(), "notes.txt", "unrelated");

    let sources = load_directory(dir.path()).unwrap();

    assert_eq!(sources.weather.height(), 4);
    // humidity only exists in the newer export
    assert!(sources.weather.column(RELATIVE_HUMIDITY).unwrap()[0].is_nan());
    assert_eq!(sources.traffic.height(), 2);
    assert_eq!(sources.into_frames().len(), 2);
}

#[test]
fn test_directory_without_traffic_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Florida_2022.csv", WEATHER_2022);

    assert!(matches!(load_directory(dir.path()), Err(ForecastError::SchemaError(_))));
}
