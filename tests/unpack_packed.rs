use std::time::Duration;

use efd_client::{
    unpack, Error, FallbackInterval, FieldSchema, Frame, PackedGroups, SchemaMismatch, TimeScale,
    TimestampSource, TopicSchema, UnpackOptions, UnpackWarning, Value,
};

/// `rows[r][i]` becomes column `{base}{i}` of record `r`.
fn packed(index: Vec<i64>, base: &str, rows: &[Vec<f64>]) -> Frame {
    let mut frame = Frame::new(index);
    add_group(&mut frame, base, rows);
    frame
}

fn add_group(frame: &mut Frame, base: &str, rows: &[Vec<f64>]) {
    for i in 0..rows[0].len() {
        let values = rows.iter().map(|r| Value::Float(r[i])).collect();
        frame.push_column(format!("{base}{i}"), values).expect("column");
    }
}

fn floats(frame: &Frame, name: &str) -> Vec<f64> {
    frame
        .column(name)
        .expect("column")
        .values()
        .iter()
        .map(|v| v.as_f64().expect("numeric"))
        .collect()
}

#[test]
fn four_samples_between_records() {
    let frame = packed(
        vec![0, 4],
        "x",
        &[vec![10.0, 11.0, 12.0, 13.0], vec![20.0, 21.0, 22.0, 23.0]],
    );
    let groups = PackedGroups::new().with_group("x", 4);
    let outcome = unpack(&frame, &groups, &UnpackOptions::default()).expect("unpack");

    assert_eq!(&outcome.frame.index()[..4], &[0, 1, 2, 3]);
    assert_eq!(
        floats(&outcome.frame, "x"),
        vec![10.0, 11.0, 12.0, 13.0, 20.0, 21.0, 22.0, 23.0]
    );
    assert!(outcome.warnings.is_empty());
    assert!(outcome.failures.is_empty());
}

#[test]
fn single_sample_groups_are_identity() {
    let index = vec![3, 17, 18, 250];
    let values = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
    let mut frame = packed(index.clone(), "temp", &values);
    frame
        .push_column(
            "salIndex",
            vec![Value::Int(1), Value::Int(1), Value::Int(2), Value::Int(2)],
        )
        .expect("scalar");

    let groups = PackedGroups::new().with_group("temp", 1);
    let outcome = unpack(&frame, &groups, &UnpackOptions::default()).expect("unpack");

    assert_eq!(outcome.frame.index(), index.as_slice());
    assert_eq!(floats(&outcome.frame, "temp"), vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(
        outcome.frame.column("salIndex").expect("salIndex").values(),
        frame.column("salIndex").expect("salIndex").values()
    );
    assert!(outcome.warnings.is_empty());
}

#[test]
fn row_count_and_even_spacing() {
    let rows: Vec<Vec<f64>> = (0..5).map(|r| (0..8).map(|i| (r * 8 + i) as f64).collect()).collect();
    let index = vec![0, 800, 1_600, 2_000, 4_400];
    let frame = packed(index.clone(), "accel", &rows);
    let groups = PackedGroups::new().with_group("accel", 8);
    let outcome = unpack(&frame, &groups, &UnpackOptions::default()).expect("unpack");

    assert_eq!(outcome.frame.len(), 5 * 8);
    let out = outcome.frame.index();
    assert!(out.windows(2).all(|w| w[0] < w[1]));
    for (record, chunk) in out.chunks(8).enumerate() {
        assert_eq!(chunk[0], index[record]);
        let step = chunk[1] - chunk[0];
        assert!(step > 0);
        assert!(chunk.windows(2).all(|w| w[1] - w[0] == step));
        if let Some(next) = index.get(record + 1) {
            assert!(chunk[7] < *next);
        }
    }
}

#[test]
fn groups_share_one_span() {
    let mut frame = packed(vec![0, 30], "x", &[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    add_group(&mut frame, "y", &[vec![-1.0, -2.0, -3.0], vec![-4.0, -5.0, -6.0]]);
    frame
        .push_column("mode", vec![Value::from("a"), Value::from("b")])
        .expect("scalar");

    let groups = PackedGroups::new().with_group("x", 3).with_group("y", 3);
    let outcome = unpack(&frame, &groups, &UnpackOptions::default()).expect("unpack");

    assert_eq!(outcome.frame.index(), &[0, 10, 20, 30, 40, 50]);
    assert_eq!(floats(&outcome.frame, "y"), vec![-1.0, -2.0, -3.0, -4.0, -5.0, -6.0]);
    let names: Vec<&str> = outcome.frame.column_names().collect();
    assert_eq!(names, vec!["x", "y", "mode"]);
    assert_eq!(
        outcome.frame.column("mode").expect("mode").values()[2..4],
        [Value::from("a"), Value::from("b")]
    );
}

#[test]
fn stride_keeps_every_nth_sample() {
    let frame = packed(vec![0, 8], "x", &[vec![0.0, 1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0, 7.0]]);
    let groups = PackedGroups::new().with_group("x", 4);
    let options = UnpackOptions::default().stride(2);
    let outcome = unpack(&frame, &groups, &options).expect("unpack");
    assert_eq!(outcome.frame.index(), &[0, 4, 8, 12]);
    assert_eq!(floats(&outcome.frame, "x"), vec![0.0, 2.0, 4.0, 6.0]);

    let err = unpack(&frame, &groups, &UnpackOptions::default().stride(3)).unwrap_err();
    assert!(matches!(err, Error::InvalidStride { stride: 3, count: 4 }));
}

#[test]
fn nominal_cadence_is_used_when_it_fits() {
    let frame = packed(vec![0, 100], "x", &[vec![1.0, 2.0], vec![3.0, 4.0]]);
    let groups = PackedGroups::new().with_group("x", 2);
    let options = UnpackOptions::default().cadence(Duration::from_nanos(20));
    let outcome = unpack(&frame, &groups, &options).expect("unpack");
    assert_eq!(outcome.frame.index(), &[0, 20, 100, 120]);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn last_record_fallbacks() {
    let frame = packed(vec![0, 4], "x", &[vec![1.0, 2.0], vec![3.0, 4.0]]);
    let groups = PackedGroups::new().with_group("x", 2);

    let previous = unpack(&frame, &groups, &UnpackOptions::default()).expect("previous");
    assert_eq!(previous.frame.index(), &[0, 2, 4, 6]);

    let fixed = UnpackOptions::default().fallback(FallbackInterval::fixed(Duration::from_nanos(1)));
    let fixed = unpack(&frame, &groups, &fixed).expect("fixed");
    assert_eq!(fixed.frame.index(), &[0, 2, 4, 5]);

    let none = UnpackOptions::default().fallback(FallbackInterval::None);
    let collapsed = unpack(&frame, &groups, &none).expect("collapsed");
    assert_eq!(collapsed.frame.index(), &[0, 2, 4]);
    assert_eq!(floats(&collapsed.frame, "x"), vec![1.0, 2.0, 3.0]);
    assert_eq!(
        collapsed.warnings,
        vec![UnpackWarning::Collapsed {
            row: 1,
            timestamp_ns: 4
        }]
    );
}

#[test]
fn lone_record_without_fallback_collapses() {
    let frame = packed(vec![42], "x", &[vec![1.0, 2.0, 3.0]]);
    let groups = PackedGroups::new().with_group("x", 3);
    let outcome = unpack(&frame, &groups, &UnpackOptions::default()).expect("unpack");
    assert_eq!(outcome.frame.index(), &[42]);
    assert_eq!(outcome.warnings.len(), 1);
}

#[test]
fn incomplete_record_fails_alone() {
    let mut frame = Frame::new(vec![0, 10, 20]);
    frame
        .push_column("x0", vec![Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)])
        .expect("x0");
    frame
        .push_column("x1", vec![Value::Float(1.5), Value::Missing, Value::Float(3.5)])
        .expect("x1");
    let groups = PackedGroups::new().with_group("x", 2);
    let outcome = unpack(&frame, &groups, &UnpackOptions::default()).expect("unpack");

    assert_eq!(outcome.frame.index(), &[0, 5, 20, 25]);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].row, 1);
    assert_eq!(
        outcome.failures[0].error,
        SchemaMismatch::IncompleteRecord {
            timestamp_ns: 10,
            field: "x".to_string(),
            present: 1,
            expected: 2
        }
    );
}

#[test]
fn batch_fails_when_every_record_fails() {
    let mut frame = Frame::new(vec![0, 10]);
    frame
        .push_column("x0", vec![Value::Float(1.0), Value::Float(2.0)])
        .expect("x0");
    frame
        .push_column("x1", vec![Value::Missing, Value::Missing])
        .expect("x1");
    let groups = PackedGroups::new().with_group("x", 2);
    let err = unpack(&frame, &groups, &UnpackOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::SchemaMismatch(SchemaMismatch::BatchFailed(_))
    ));
}

#[test]
fn differing_declared_counts_fail_the_batch() {
    let mut frame = packed(vec![0], "x", &[vec![1.0, 2.0]]);
    add_group(&mut frame, "y", &[vec![1.0, 2.0, 3.0]]);
    let groups = PackedGroups::new().with_group("x", 2).with_group("y", 3);
    let err = unpack(&frame, &groups, &UnpackOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::SchemaMismatch(SchemaMismatch::InconsistentCounts { .. })
    ));
}

#[test]
fn unsorted_input_is_an_alignment_error() {
    let frame = packed(vec![10, 0], "x", &[vec![1.0], vec![2.0]]);
    let groups = PackedGroups::new().with_group("x", 1);
    let err = unpack(&frame, &groups, &UnpackOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Alignment(_)));
}

#[test]
fn reference_column_in_tai_seconds() {
    // 2023-01-01T00:00:00 UTC as unix_tai seconds.
    let tai_secs = 1_672_531_200.0 + 37.0;
    let mut frame = packed(vec![0, 1], "x", &[vec![1.0, 2.0], vec![3.0, 4.0]]);
    frame
        .push_column(
            "cRIO_timestamp",
            vec![Value::Float(tai_secs), Value::Float(tai_secs + 1.0)],
        )
        .expect("reference");
    let groups = PackedGroups::new().with_group("x", 2);
    let options = UnpackOptions::default().timestamps(TimestampSource::Column {
        name: "cRIO_timestamp".to_string(),
        scale: TimeScale::Tai,
    });
    let outcome = unpack(&frame, &groups, &options).expect("unpack");

    let start = 1_672_531_200_000_000_000_i64;
    assert_eq!(
        outcome.frame.index(),
        &[start, start + 500_000_000, start + 1_000_000_000, start + 1_500_000_000]
    );
    assert!(!outcome.frame.has_column("cRIO_timestamp"));
}

#[test]
fn groups_resolved_from_schema() {
    let schema = TopicSchema::new(
        "lsst.sal.MTM1M3.forceActuatorData",
        vec![
            FieldSchema::array("force", None),
            FieldSchema::array("forceX", None),
            FieldSchema::scalar("timestamp"),
        ],
    );
    let columns: Vec<String> = ["force0", "force1", "forceX0", "forceX1", "timestamp"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let groups = PackedGroups::resolve(&schema, &["force"], &columns).expect("resolve");
    assert_eq!(groups.column_names(), vec!["force0", "force1"]);
}

fn tai_reference() -> UnpackOptions {
    UnpackOptions::default().timestamps(TimestampSource::Column {
        name: "cRIO_timestamp".to_string(),
        scale: TimeScale::Tai,
    })
}

#[test]
fn bad_reference_timestamp_fails_its_record_only() {
    let tai_secs = 1_672_531_200.0 + 37.0;
    let mut frame = packed(
        vec![0, 1, 2],
        "x",
        &[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
    );
    frame
        .push_column(
            "cRIO_timestamp",
            vec![Value::Float(tai_secs), Value::Missing, Value::Float(tai_secs + 2.0)],
        )
        .expect("reference");
    let groups = PackedGroups::new().with_group("x", 2);
    let outcome = unpack(&frame, &groups, &tai_reference()).expect("unpack");

    // Row 1 is skipped, so row 0 spans the two seconds up to row 2.
    let start = 1_672_531_200_000_000_000_i64;
    assert_eq!(
        outcome.frame.index(),
        &[start, start + 1_000_000_000, start + 2_000_000_000, start + 3_000_000_000]
    );
    assert_eq!(floats(&outcome.frame, "x"), vec![1.0, 2.0, 5.0, 6.0]);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].row, 1);
    assert_eq!(
        outcome.failures[0].error,
        SchemaMismatch::BadTimestampColumn {
            column: "cRIO_timestamp".to_string(),
            row: 1
        }
    );
}

#[test]
fn out_of_range_reference_timestamp_is_a_record_failure() {
    let mut frame = packed(vec![0, 1], "x", &[vec![1.0, 2.0], vec![3.0, 4.0]]);
    frame
        .push_column(
            "cRIO_timestamp",
            vec![Value::Float(-1.0e11), Value::Float(1_672_531_237.0)],
        )
        .expect("reference");
    let groups = PackedGroups::new().with_group("x", 2);
    let outcome = unpack(&frame, &groups, &tai_reference()).expect("unpack");
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].row, 0);
    assert_eq!(outcome.frame.index()[0], 1_672_531_200_000_000_000);

    let mut all_bad = packed(vec![0], "x", &[vec![1.0, 2.0]]);
    all_bad
        .push_column("cRIO_timestamp", vec![Value::Float(f64::NAN)])
        .expect("reference");
    let err = unpack(&all_bad, &groups, &tai_reference()).unwrap_err();
    assert!(matches!(
        err,
        Error::SchemaMismatch(SchemaMismatch::BatchFailed(_))
    ));
}
