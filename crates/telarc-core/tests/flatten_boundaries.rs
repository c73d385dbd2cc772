//! Join-flattening correctness across caller-visible batch boundaries.

mod common;

use common::{EventFlattenMapper, EventRecord, event_query, event_row, live_predicate, session};
use telarc_core::{
    exec::{JoinFlattener, ScriptedExecutor, ScriptedRow},
    identity::{IdentityContext, Venue},
};

// Three child rows for event 1, two for event 2, the canonical
// straddling layout.
fn three_two_rows() -> Vec<ScriptedRow> {
    vec![
        event_row(1, 10, 1, "TEMP_LIMIT", Some(("sensor", "a"))),
        event_row(1, 10, 1, "TEMP_LIMIT", Some(("threshold", "b"))),
        event_row(1, 10, 1, "TEMP_LIMIT", Some(("reading", "c"))),
        event_row(1, 10, 2, "MODE_CHANGE", Some(("from", "safe"))),
        event_row(1, 10, 2, "MODE_CHANGE", Some(("to", "nominal"))),
    ]
}

fn open_flattener(rows: Vec<ScriptedRow>) -> JoinFlattener<ScriptedExecutor, EventFlattenMapper> {
    let executor = ScriptedExecutor::new();
    executor.push_rows(rows);

    session(executor)
        .open_flattened(
            &event_query(live_predicate()),
            EventFlattenMapper,
            IdentityContext::detached(),
        )
        .expect("flattened fetch should open")
}

fn drain(flattener: &mut JoinFlattener<ScriptedExecutor, EventFlattenMapper>, n: usize) -> Vec<EventRecord> {
    let mut all = Vec::new();
    loop {
        let batch = flattener.next_batch(n).expect("next_batch should succeed");
        if batch.is_empty() {
            return all;
        }
        all.extend(batch);
    }
}

fn assert_three_two(records: &[EventRecord]) {
    assert_eq!(records.len(), 2, "exactly two logical parents");

    assert_eq!(records[0].event_id, 1);
    assert_eq!(
        records[0].metadata,
        vec![
            ("sensor".to_string(), "a".to_string()),
            ("threshold".to_string(), "b".to_string()),
            ("reading".to_string(), "c".to_string()),
        ]
    );

    assert_eq!(records[1].event_id, 2);
    assert_eq!(
        records[1].metadata,
        vec![
            ("from".to_string(), "safe".to_string()),
            ("to".to_string(), "nominal".to_string()),
        ]
    );
}

#[test]
fn parent_straddling_a_batch_boundary_appears_exactly_once() {
    let mut flattener = open_flattener(three_two_rows());

    let records = drain(&mut flattener, 2);
    assert_three_two(&records);
}

#[test]
fn every_batch_size_reconstructs_the_same_parents() {
    // The 3/2 row split must come out identical no matter where the
    // batch boundary falls.
    for n in 1..=6 {
        let mut flattener = open_flattener(three_two_rows());

        let records = drain(&mut flattener, n);
        assert_three_two(&records);
    }
}

#[test]
fn exhaustion_flush_emits_the_final_parent_without_a_key_change() {
    let rows = vec![
        event_row(1, 10, 7, "SINGLE", Some(("k1", "v1"))),
        event_row(1, 10, 7, "SINGLE", Some(("k2", "v2"))),
        event_row(1, 10, 7, "SINGLE", Some(("k3", "v3"))),
    ];
    let mut flattener = open_flattener(rows);

    let batch = flattener.next_batch(10).expect("next_batch should succeed");

    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].event_id, 7);
    assert_eq!(batch[0].metadata.len(), 3);

    let empty = flattener.next_batch(10).expect("exhausted stream is not an error");
    assert!(empty.is_empty());
}

#[test]
fn boundary_flush_may_exceed_the_batch_size_by_one() {
    // Two single-row parents with n = 1: the second parent becomes
    // pending exactly as the batch fills, and the exhaustion flush lands
    // on the boundary. The contract allows n + 1 records in that batch.
    let rows = vec![
        event_row(1, 10, 1, "FIRST", None),
        event_row(1, 10, 2, "SECOND", None),
    ];
    let mut flattener = open_flattener(rows);

    let batch = flattener.next_batch(1).expect("next_batch should succeed");

    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].event_id, 1);
    assert_eq!(batch[1].event_id, 2);
}

#[test]
fn rows_without_metadata_produce_empty_attribute_lists() {
    let rows = vec![
        event_row(1, 10, 1, "BARE", None),
        event_row(1, 10, 2, "DRESSED", Some(("k", "v"))),
    ];
    let mut flattener = open_flattener(rows);

    let records = drain(&mut flattener, 10);

    assert_eq!(records.len(), 2);
    assert!(records[0].metadata.is_empty());
    assert_eq!(records[1].metadata.len(), 1);
}

#[test]
fn detached_identity_context_yields_the_unknown_sentinel() {
    let mut flattener = open_flattener(vec![event_row(1, 10, 1, "X", None)]);

    let records = drain(&mut flattener, 10);

    assert_eq!(records[0].host, "");
    assert_eq!(records[0].venue, Venue::Unknown);
}

#[test]
fn same_event_id_under_different_sessions_is_a_distinct_parent() {
    // The composite key spans the identity pair, not just the event id.
    let rows = vec![
        event_row(1, 10, 5, "A", Some(("k", "v"))),
        event_row(1, 11, 5, "A", Some(("k", "v"))),
    ];
    let mut flattener = open_flattener(rows);

    let records = drain(&mut flattener, 10);
    assert_eq!(records.len(), 2);
}
