//! End-to-end pipeline: resolve identities, embed the id predicate,
//! compose, stream, and map with resolved identities.

mod common;

use common::{
    EventMapper, event_query, event_row, live_predicate, schema, session, session_row,
};
use telarc_core::{
    error::ErrorClass,
    exec::{DryRunExecutor, ScriptedExecutor},
    fetch::FetchSession,
    identity::Venue,
    query::{Filter, Predicate},
    config::FetchConfig,
};

#[test]
fn resolved_identities_flow_into_the_main_predicate_and_row_mapping() {
    let executor = ScriptedExecutor::new();
    // Pre-query result: two sessions on one host.
    executor.push_rows(vec![
        session_row(1, 10, "atlas-ops", "OPS"),
        session_row(1, 11, "atlas-ops", "OPS"),
    ]);
    // Main query result.
    executor.push_rows(vec![
        event_row(1, 10, 100, "BOOT", None),
        event_row(1, 11, 101, "SHUTDOWN", None),
    ]);

    let fetch = session(executor.clone());

    let resolved = fetch
        .resolve_identities("Session", Predicate::new())
        .expect("resolution should succeed");
    assert_eq!(resolved.len(), 2);

    let event_table = schema().table("Event").expect("Event table is configured");
    let id_filter = resolved.id_predicate(&event_table, fetch.schema());
    assert_eq!(
        id_filter.clause(),
        "((e.hostId = 1) AND (e.sessionId IN (10,11)))"
    );

    let identities = resolved.into_context(fetch.schema());
    let query = event_query(Predicate::new().with(id_filter));

    let mut cursor = fetch.open(&query).expect("main query should open");
    let batch = cursor
        .next_batch(10, &EventMapper, &identities)
        .expect("batch should map");

    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].host, "atlas-ops");
    assert_eq!(batch[0].venue, Venue::Ops);

    // Pre-query ran first, then the main query: exactly two statements.
    let prepared = executor.prepared_sql();
    assert_eq!(prepared.len(), 2);
    assert!(prepared[0].contains("FROM Session AS s"));
    assert!(prepared[1].contains("FROM Event AS e"));
}

#[test]
fn empty_resolution_fails_closed_in_the_main_predicate() {
    let executor = ScriptedExecutor::new();
    executor.push_rows(vec![]); // no sessions match

    let fetch = session(executor);
    let resolved = fetch
        .resolve_identities("Session", Predicate::new())
        .expect("empty resolution is not an error");

    assert!(resolved.is_empty());

    let event_table = schema().table("Event").expect("Event table is configured");
    let id_filter = resolved.id_predicate(&event_table, fetch.schema());

    // Never an empty string: an empty filter would silently match the
    // whole archive.
    assert_eq!(id_filter.clause(), "(0=1)");
}

#[test]
fn resolution_failure_aborts_before_any_main_query() {
    let executor = ScriptedExecutor::new();
    executor.push_execute_failure("connection refused");

    let fetch = session(executor.clone());
    let err = fetch
        .resolve_identities("Session", Predicate::new())
        .expect_err("resolution must surface the read error");

    assert_eq!(err.class, ErrorClass::Resolution);
    assert!(err.sql().is_some_and(|sql| sql.contains("FROM Session AS s")));

    // Only the pre-query was ever prepared; its statement was released.
    assert_eq!(executor.prepared_sql().len(), 1);
    assert_eq!(executor.statement_closes(), 1);
}

#[test]
fn resolver_drains_the_pre_query_completely() {
    let executor = ScriptedExecutor::new();
    let rows: Vec<_> = (0..1000_u64)
        .map(|id| session_row(2, id, "bulk", "TESTBED"))
        .collect();
    executor.push_rows(rows);

    let fetch = session(executor.clone());
    let resolved = fetch
        .resolve_identities("Session", Predicate::new())
        .expect("resolution should succeed");

    assert_eq!(resolved.len(), 1000);
    assert_eq!(executor.stream_closes(), 1);
    assert_eq!(executor.statement_closes(), 1);
}

#[test]
fn resolver_criteria_render_into_the_pre_query() {
    let executor = ScriptedExecutor::new();
    executor.push_rows(vec![]);

    let fetch = session(executor.clone());
    let session_table = schema().table("Session").expect("Session table is configured");
    let criteria = Predicate::new().with(Filter::equals(&session_table, "user", "jdoe"));

    fetch
        .resolve_identities("Session", criteria)
        .expect("resolution should succeed");

    let prepared = executor.prepared_sql();
    assert!(prepared[0].ends_with(" WHERE (s.user = ?)"));
}

#[test]
fn unknown_identities_map_to_the_sentinel_not_null() {
    let executor = ScriptedExecutor::new();
    executor.push_rows(vec![session_row(1, 10, "atlas-ops", "OPS")]);
    // Main rows reference a session the pre-query never saw.
    executor.push_rows(vec![event_row(9, 99, 1, "ORPHAN", None)]);

    let fetch = session(executor);
    let resolved = fetch
        .resolve_identities("Session", Predicate::new())
        .expect("resolution should succeed");
    let identities = resolved.into_context(fetch.schema());

    let mut cursor = fetch
        .open(&event_query(live_predicate()))
        .expect("main query should open");
    let batch = cursor
        .next_batch(10, &EventMapper, &identities)
        .expect("batch should map");

    assert_eq!(batch[0].host, "");
    assert_eq!(batch[0].venue, Venue::Unknown);
}

#[test]
fn dry_run_executor_captures_sql_and_streams_nothing() {
    let fetch = FetchSession::new(
        DryRunExecutor::new(),
        schema(),
        FetchConfig {
            batch_size: 64,
            dry_run: true,
        },
    )
    .expect("dry-run session should construct");

    let resolved = fetch
        .resolve_identities("Session", Predicate::new())
        .expect("dry-run resolution yields nothing");
    assert!(resolved.is_empty());

    let mut cursor = fetch
        .open(&event_query(live_predicate()))
        .expect("dry-run open should succeed");
    let batch = cursor
        .next_batch(10, &EventMapper, &telarc_core::identity::IdentityContext::detached())
        .expect("dry-run batch is empty");
    assert!(batch.is_empty());

    let captured = fetch.executor().captured();
    assert_eq!(captured.len(), 2);
    assert!(captured[0].starts_with("SELECT s.hostId,s.sessionId"));
    assert!(captured[1].contains("FROM Event AS e WHERE (e.isRealtime = ?)"));
}

#[test]
fn venue_strings_resolve_with_unknown_fallback() {
    let executor = ScriptedExecutor::new();
    executor.push_rows(vec![
        session_row(1, 10, "h", "OPS"),
        session_row(1, 11, "h", "something-new"),
    ]);

    let fetch = session(executor);
    let resolved = fetch
        .resolve_identities("Session", Predicate::new())
        .expect("unrecognized venue must not fail resolution");

    assert_eq!(resolved.lookup(1, 10).venue, Venue::Ops);
    assert_eq!(resolved.lookup(1, 11).venue, Venue::Unknown);
}
