use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use hydws_core::rules::RawTable;
use uuid::Uuid;

use crate::errors::ParserError;
use crate::formats::{
    build_catalogue, parse_plan, read_borehole_table, read_section_table, CsvTableParser,
    GeomonitorParser, LocalOrigin, Trajectory,
};
use crate::registry::{parse_raw_file, RawFormat, RawParser};

fn fixture(path: &str) -> Vec<u8> {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let full_path = base.join("tests/data").join(path);
    fs::read(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

fn ts(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").unwrap()
}

#[test]
fn geomonitor_cleans_and_resamples_channels() {
    let content = fixture("geomonitor_ST1.dat");
    let df = GeomonitorParser::with_sample_rate(60)
        .parse(&content)
        .expect("geomonitor parse failed");

    // Empty never reported, Q_off and the second Q_inj never rose above zero
    assert_eq!(df.get_column_names(), vec!["datetime", "P_inj", "Q_inj"]);
    assert_eq!(df.height(), 3);

    let table = RawTable::from_dataframe(&df).unwrap();
    assert_eq!(
        table.timestamps(),
        &[
            ts("2022-03-01T00:00:00"),
            ts("2022-03-01T00:01:00"),
            ts("2022-03-01T00:02:00"),
        ]
    );
    // padded gaps feed the bucket means; negative readings clip to zero
    assert_eq!(table.column("P_inj").unwrap(), &[1.0, 4.0, 6.0]);
    assert_eq!(table.column("Q_inj").unwrap(), &[2.0, 3.0, 3.0]);
}

#[test]
fn geomonitor_rejects_foreign_header() {
    let content = b"banner\ndate time P_inj\n-\n-\n-\n01.03.2022 00:00:00 1.0\n";
    let err = GeomonitorParser::default().parse(content).unwrap_err();
    assert!(matches!(err, ParserError::FormatMismatch { .. }));
}

#[test]
fn geomonitor_rejects_overlong_rows() {
    let content = b"banner\ndd/mm/yyyy hh:mm:ss P\n-\n-\n-\n01.03.2022 00:00:00 1.0 2.0\n";
    let err = GeomonitorParser::default().parse(content).unwrap_err();
    match err {
        ParserError::DataRow { line_index, .. } => assert_eq!(line_index, 5),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn geomonitor_rejects_zero_sample_rate() {
    let content = fixture("geomonitor_ST1.dat");
    let err = GeomonitorParser::with_sample_rate(0)
        .parse(&content)
        .unwrap_err();
    assert!(matches!(err, ParserError::Validation { .. }));
}

#[test]
fn geomonitor_emits_empty_buckets_as_nulls() {
    let content = b"banner\ndd/mm/yyyy hh:mm:ss P\n-\n-\n-\n01.03.2022 00:00:00 1.0\n01.03.2022 00:03:00 4.0\n";
    let df = GeomonitorParser::with_sample_rate(60)
        .parse(content)
        .expect("geomonitor parse failed");

    assert_eq!(df.height(), 4);
    assert_eq!(df.column("P").unwrap().null_count(), 2);

    let table = RawTable::from_dataframe(&df).unwrap();
    assert_eq!(table.timestamps()[1], ts("2022-03-01T00:01:00"));
    assert_eq!(table.column("P").unwrap(), &[1.0, 0.0, 0.0, 4.0]);
}

#[test]
fn geomonitor_rejects_out_of_range_sample_rate() {
    let content = fixture("geomonitor_ST1.dat");
    let err = GeomonitorParser::with_sample_rate(i64::MAX)
        .parse(&content)
        .unwrap_err();
    assert!(matches!(err, ParserError::Validation { .. }));
}

#[test]
fn csv_table_keeps_missing_readings_as_nulls() {
    let content = fixture("raw_sensors.csv");
    let df = CsvTableParser::default().parse(&content).expect("csv parse failed");

    assert_eq!(
        df.get_column_names(),
        vec!["datetime", "flow_a", "flow_b", "pressure"]
    );
    assert_eq!(df.height(), 3);
    assert_eq!(df.column("flow_b").unwrap().null_count(), 1);
    assert_eq!(df.column("pressure").unwrap().null_count(), 1);

    // the rule engine reads nulls as zero
    let table = RawTable::from_dataframe(&df).unwrap();
    assert_eq!(table.column("flow_a").unwrap(), &[1.0, 2.0, 0.0]);
    assert_eq!(table.timestamps()[2], ts("2022-03-01T00:02:00"));
}

#[test]
fn csv_table_requires_timestamp_column() {
    let content = fixture("raw_sensors.csv");
    let err = parse_raw_file(
        &content,
        &RawFormat::Csv {
            timestamp_column: "time".to_string(),
        },
    )
    .unwrap_err();
    assert!(matches!(err, ParserError::FormatMismatch { .. }));
}

#[test]
fn csv_table_reports_bad_values_with_line() {
    let content = b"datetime,flow\n2022-03-01T00:00:00,1.0\n2022-03-01T00:01:00,abc\n";
    let err = CsvTableParser::default().parse(content).unwrap_err();
    match err {
        ParserError::DataRow { line_index, message, .. } => {
            assert_eq!(line_index, 2);
            assert!(message.contains("flow"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn csv_table_rejects_header_only_files() {
    let err = CsvTableParser::default()
        .parse(b"datetime,flow\n")
        .unwrap_err();
    assert!(matches!(err, ParserError::EmptyData { .. }));
}

#[test]
fn plan_parses_padded_columns() {
    let plan = parse_plan(&fixture("plan_ST1.csv")).expect("plan parse failed");

    assert_eq!(plan.len(), 2);
    let first = &plan.intervals()[0];
    assert_eq!(first.start, ts("2022-03-01T00:00:00"));
    assert_eq!(first.end, ts("2022-03-01T00:01:30"));
    assert_eq!(first.target_section, "int-1");
    assert_eq!(plan.intervals()[1].target_section, "int-2");
    plan.validate("plan_ST1").unwrap();
}

#[test]
fn plan_requires_interval_column() {
    let err = parse_plan(b"date_from,date_until,section\n").unwrap_err();
    assert!(matches!(err, ParserError::InvalidHeader { .. }));
}

#[test]
fn trajectory_interpolates_between_enclosing_points() {
    let trajectory = Trajectory::from_csv(&fixture("trajectory_ST1.csv")).unwrap();

    assert_eq!(trajectory.points().len(), 3);
    assert_eq!(trajectory.position_at(40.0).unwrap(), (10.0, 20.0, 60.0));
    assert_eq!(trajectory.position_at(20.0).unwrap(), (10.0, 20.0, 80.0));
    assert_eq!(trajectory.position_at(70.0).unwrap(), (13.0, 24.0, 40.0));
}

#[test]
fn trajectory_needs_two_points() {
    let trajectory = Trajectory::from_csv(b"depth,x,y,z\n0.0,0.0,0.0,0.0\n").unwrap();
    assert!(trajectory.position_at(0.0).is_ok());
    assert!(matches!(
        trajectory.position_at(5.0),
        Err(ParserError::Validation { .. })
    ));
}

#[test]
fn catalogue_places_sections_along_trajectory() {
    let boreholes = read_borehole_table(&fixture("boreholes.csv")).unwrap();
    let sections = read_section_table(&fixture("sections.csv")).unwrap();
    let trajectories = HashMap::from([(
        "ST1".to_string(),
        Trajectory::from_csv(&fixture("trajectory_ST1.csv")).unwrap(),
    )]);
    let origin = LocalOrigin {
        easting: 1000.0,
        northing: 2000.0,
        elevation: 0.0,
    };

    let store = build_catalogue(&boreholes, &sections, &trajectories, &origin).unwrap();
    assert_eq!(store.len(), 1);

    let borehole_id = Uuid::parse_str("4d8c7e3a-5b3f-4f2a-9f0e-2f6a1c3b9d10").unwrap();
    let borehole = store.borehole(borehole_id).unwrap();
    assert_eq!(borehole.name.as_deref(), Some("ST1"));
    assert_eq!(borehole.institution.as_deref(), Some("SED"));
    assert_eq!(borehole.location.longitude.value, 1010.0);
    assert_eq!(borehole.location.latitude.value, 2020.0);
    assert_eq!(borehole.reference_altitude(), 100.0);
    assert_eq!(borehole.len(), 2);

    let upper = store.section_by_name("int-1").unwrap();
    assert!(upper.geometry.topclosed);
    assert!(!upper.geometry.bottomclosed);
    assert_eq!(upper.casingtype.as_deref(), Some("steel"));
    assert_eq!(upper.starttime, Some(ts("2022-03-01T00:00:00")));
    assert_eq!(upper.geometry.topaltitude.value, 80.0);
    assert_eq!(upper.geometry.bottomlongitude.value, 1013.0);
    assert_eq!(upper.geometry.bottomlatitude.value, 2024.0);
    assert_eq!(upper.bottom_altitude(), 40.0);

    let lower = store.section_by_name("int-2").unwrap();
    assert_eq!(lower.casingtype, None);
    assert_eq!(lower.starttime, None);
    assert_eq!(lower.bottom_altitude(), 20.0);
    assert_eq!(lower.geometry.bottomlongitude.value, 1016.0);
}

#[test]
fn catalogue_requires_trajectory_for_sections() {
    let boreholes = read_borehole_table(&fixture("boreholes.csv")).unwrap();
    let sections = read_section_table(&fixture("sections.csv")).unwrap();

    let err = build_catalogue(&boreholes, &sections, &HashMap::new(), &LocalOrigin::default())
        .unwrap_err();
    assert!(matches!(err, ParserError::Validation { .. }));
}

#[test]
fn section_flags_must_be_boolean() {
    let content = b"borehole,publicid,topmeasureddepth,bottommeasureddepth,topclosed,bottomclosed\n\
4d8c7e3a-5b3f-4f2a-9f0e-2f6a1c3b9d10,9a1f0c52-7d3e-4b8a-8c1d-5e2f3a4b6c71,0.0,1.0,maybe,False\n";
    let err = read_section_table(content).unwrap_err();
    assert!(matches!(err, ParserError::Csv { .. }));
}
