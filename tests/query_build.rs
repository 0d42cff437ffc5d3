use std::time::Duration;

use efd_client::query::CURRENT_INDEX_FIELD;
use efd_client::{
    ClientConfig, Instant, QueryBuildError, QueryBuilder, RangeQuery, TimeRange, TimeScale,
    TopNQuery,
};

fn utc(text: &str) -> Instant {
    Instant::parse_isot(text, TimeScale::Utc).expect("timestamp")
}

fn hour_range() -> TimeRange {
    TimeRange::new(utc("2023-01-01T00:00:00"), utc("2023-01-01T01:00:00"))
}

#[test]
fn legacy_index_uses_component_field() {
    let query = RangeQuery::new("lsst.sal.MTM1M3.forceActuatorData", ["xForce0"], hour_range())
        .index(5)
        .use_old_indexing(true);
    let text = QueryBuilder::default()
        .build_time_range_query(&query)
        .expect("query");

    assert_eq!(
        text,
        "SELECT xForce0 FROM \"efd\".\"autogen\".\"lsst.sal.MTM1M3.forceActuatorData\" \
         WHERE time >= '2023-01-01T00:00:00.000Z' AND time <= '2023-01-01T01:00:00.000Z' \
         AND MTM1M3ID = 5"
    );
    assert!(!text.contains(CURRENT_INDEX_FIELD));
}

#[test]
fn current_index_uses_sal_index() {
    let query = RangeQuery::new("lsst.sal.MTM1M3.forceActuatorData", ["xForce0"], hour_range())
        .index(5);
    let text = QueryBuilder::default()
        .build_time_range_query(&query)
        .expect("query");
    assert!(text.ends_with("AND salIndex = 5"));
    assert!(!text.contains("MTM1M3ID"));
}

#[test]
fn no_index_means_no_index_filter() {
    let query = RangeQuery::new("lsst.sal.ATDome.position", ["azimuthPosition"], hour_range());
    let text = QueryBuilder::default()
        .build_time_range_query(&query)
        .expect("query");
    assert!(text.ends_with("time <= '2023-01-01T01:00:00.000Z'"));
}

#[test]
fn build_errors_are_raised_before_any_text() {
    let builder = QueryBuilder::default();

    let empty = RangeQuery::new("lsst.sal.ATDome.position", Vec::<String>::new(), hour_range());
    assert_eq!(
        builder.build_time_range_query(&empty),
        Err(QueryBuildError::EmptyFields)
    );

    let reversed = TimeRange::new(utc("2023-01-01T01:00:00"), utc("2023-01-01T00:00:00"));
    let query = RangeQuery::new("lsst.sal.ATDome.position", ["a"], reversed);
    assert!(matches!(
        builder.build_time_range_query(&query),
        Err(QueryBuildError::InvalidRange { .. })
    ));

    let bad_field = RangeQuery::new("lsst.sal.ATDome.position", ["a\nb"], hour_range());
    assert!(matches!(
        builder.build_time_range_query(&bad_field),
        Err(QueryBuildError::InvalidIdentifier { kind: "field", .. })
    ));

    let bare = RangeQuery::new("position", ["a"], hour_range())
        .index(1)
        .use_old_indexing(true);
    assert!(matches!(
        builder.build_time_range_query(&bare),
        Err(QueryBuildError::UnsupportedIndexConvention { .. })
    ));

    let zero = RangeQuery::new("lsst.sal.ATDome.position", ["a"], hour_range()).limit(0);
    assert_eq!(
        builder.build_time_range_query(&zero),
        Err(QueryBuildError::InvalidLimit)
    );
}

#[test]
fn window_is_centred() {
    let range = TimeRange::window(utc("2023-01-01T00:30:00"), Duration::from_secs(3600));
    let query = RangeQuery::new("lsst.sal.ATDome.position", ["a"], range);
    let windowed = QueryBuilder::default()
        .build_time_range_query(&query)
        .expect("window");
    let explicit = QueryBuilder::default()
        .build_time_range_query(&RangeQuery::new(
            "lsst.sal.ATDome.position",
            ["a"],
            hour_range(),
        ))
        .expect("explicit");
    assert_eq!(windowed, explicit);

    let offset = TimeRange::from_start(utc("2023-01-01T00:00:00"), Duration::from_secs(3600));
    assert_eq!(offset.bounds().expect("bounds"), hour_range().bounds().expect("bounds"));
}

#[test]
fn limit_orders_descending() {
    let query = RangeQuery::new("lsst.sal.ATDome.position", ["a", "b"], hour_range()).limit(10);
    let text = QueryBuilder::default()
        .build_time_range_query(&query)
        .expect("query");
    assert!(text.starts_with("SELECT a, b FROM"));
    assert!(text.ends_with("ORDER BY time DESC LIMIT 10"));
}

#[test]
fn tai_archive_shifts_literals() {
    let builder = QueryBuilder::default().with_index_scale(TimeScale::Tai);
    let query = RangeQuery::new("lsst.sal.ATDome.position", ["a"], hour_range());
    let text = builder.build_time_range_query(&query).expect("query");
    // TAI - UTC is 37 s in 2023.
    assert!(text.contains("time >= '2023-01-01T00:00:37.000Z'"));
    assert!(text.contains("time <= '2023-01-01T01:00:37.000Z'"));
}

#[test]
fn config_selects_database_and_policy() {
    let config = ClientConfig {
        database: "efd_test".to_string(),
        retention_policy: "weekly".to_string(),
        ..ClientConfig::default()
    };
    let query = RangeQuery::new("lsst.sal.ATDome.position", ["a"], hour_range());
    let text = QueryBuilder::from_config(&config)
        .build_time_range_query(&query)
        .expect("query");
    assert!(text.contains("FROM \"efd_test\".\"weekly\".\"lsst.sal.ATDome.position\""));
}

#[test]
fn top_n_query_groups_and_limits() {
    let query = TopNQuery::new("lsst.sal.MTMount.azimuth", ["actualPosition"], 3)
        .time_cut(utc("2023-01-01T00:00:00"))
        .index(2)
        .use_old_indexing(true);
    let text = QueryBuilder::default()
        .build_select_top_n_query(&query)
        .expect("top-n");
    assert_eq!(
        text,
        "SELECT actualPosition FROM \"efd\".\"autogen\".\"lsst.sal.MTMount.azimuth\" \
         WHERE time < '2023-01-01T00:00:00.000Z' AND MTMountID = 2 \
         GROUP BY * ORDER BY time DESC LIMIT 3"
    );

    let unbounded = TopNQuery::new("lsst.sal.MTMount.azimuth", ["*"], 1);
    let text = QueryBuilder::default()
        .build_select_top_n_query(&unbounded)
        .expect("top-n");
    assert_eq!(
        text,
        "SELECT * FROM \"efd\".\"autogen\".\"lsst.sal.MTMount.azimuth\" \
         GROUP BY * ORDER BY time DESC LIMIT 1"
    );

    let none = TopNQuery::new("lsst.sal.MTMount.azimuth", ["*"], 0);
    assert_eq!(
        QueryBuilder::default().build_select_top_n_query(&none),
        Err(QueryBuildError::InvalidLimit)
    );
}

#[test]
fn metadata_statements() {
    let builder = QueryBuilder::default();
    assert_eq!(builder.build_show_measurements(), "SHOW MEASUREMENTS");
    assert_eq!(
        builder
            .build_show_field_keys("lsst.sal.ATDome.position")
            .expect("field keys"),
        "SHOW FIELD KEYS FROM \"efd\".\"autogen\".\"lsst.sal.ATDome.position\""
    );
}

#[test]
fn tai_rendering_beyond_range_is_out_of_range() {
    let range = TimeRange::from_start(Instant::from_utc_ns(i64::MAX - 1), Duration::ZERO);
    let query = RangeQuery::new("lsst.sal.ATDome.position", ["azimuthPosition"], range);
    let err = QueryBuilder::default()
        .with_index_scale(TimeScale::Tai)
        .build_time_range_query(&query)
        .unwrap_err();
    assert!(matches!(err, QueryBuildError::TimestampOutOfRange(_)));
}
