use crate::{query::filter::Filter, schema::TableRef};
use std::collections::{BTreeMap, BTreeSet};

/// Partition key scoping local identifiers (e.g. an originating host id).
pub type PartitionId = i32;

/// Identifier local to one partition (e.g. a session number).
pub type LocalId = u64;

/// Minimum run length worth collapsing into a BETWEEN range. Below this an
/// IN-list member is cheaper for the planner than an extra range term.
const MIN_RANGE_RUN: usize = 3;

///
/// PartitionedIdSet
///
/// Sparse per-partition integer id sets, deduplicated and totally ordered
/// so the rendered clause is deterministic. Encoding is fail-closed: an
/// empty set renders the always-false `(0=1)`, never an empty string:
/// "no identities resolved" must produce no rows, not an unbounded scan.
///

#[derive(Clone, Debug, Default)]
pub struct PartitionedIdSet {
    partitions: BTreeMap<PartitionId, BTreeSet<LocalId>>,
}

impl PartitionedIdSet {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            partitions: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, partition: PartitionId, id: LocalId) {
        self.partitions.entry(partition).or_default().insert(id);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Number of `(partition, id)` pairs across all partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.values().map(BTreeSet::len).sum()
    }

    pub fn partitions(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.partitions.keys().copied()
    }

    #[must_use]
    pub fn contains(&self, partition: PartitionId, id: LocalId) -> bool {
        self.partitions
            .get(&partition)
            .is_some_and(|ids| ids.contains(&id))
    }

    /// Encode the set as one boolean expression over the given table's
    /// partition and local-id columns.
    #[must_use]
    pub fn encode(&self, table: &TableRef, partition_column: &str, id_column: &str) -> Filter {
        if self.partitions.is_empty() {
            return Filter::raw("(0=1)".to_string(), Vec::new());
        }

        let terms: Vec<String> = self
            .partitions
            .iter()
            .map(|(partition, ids)| {
                format!(
                    "(({} = {partition}) AND {})",
                    table.col(partition_column),
                    encode_ids(&table.col(id_column), ids),
                )
            })
            .collect();

        let clause = if terms.len() == 1 {
            terms.into_iter().next().unwrap_or_default()
        } else {
            format!("({})", terms.join(" OR "))
        };

        Filter::raw(clause, Vec::new())
    }
}

// Render one partition's id disjunction: maximal contiguous runs of at
// least MIN_RANGE_RUN become BETWEEN terms, everything else pools into a
// single IN list (collapsed to equality for a lone id).
fn encode_ids(id_col: &str, ids: &BTreeSet<LocalId>) -> String {
    let mut loose: Vec<LocalId> = Vec::new();
    let mut ranges: Vec<(LocalId, LocalId)> = Vec::new();

    let mut run: Vec<LocalId> = Vec::new();
    for &id in ids {
        match run.last() {
            Some(&prev) if prev.checked_add(1) == Some(id) => run.push(id),
            _ => {
                flush_run(&mut run, &mut loose, &mut ranges);
                run.push(id);
            }
        }
    }
    flush_run(&mut run, &mut loose, &mut ranges);

    let mut terms: Vec<String> = Vec::with_capacity(ranges.len() + 1);

    match loose.len() {
        0 => {}
        1 => terms.push(format!("({id_col} = {})", loose[0])),
        _ => {
            let members: Vec<String> = loose.iter().map(ToString::to_string).collect();
            terms.push(format!("({id_col} IN ({}))", members.join(",")));
        }
    }

    for (lo, hi) in ranges {
        terms.push(format!("({id_col} BETWEEN {lo} AND {hi})"));
    }

    if terms.len() == 1 {
        terms.into_iter().next().unwrap_or_default()
    } else {
        format!("({})", terms.join(" OR "))
    }
}

fn flush_run(run: &mut Vec<LocalId>, loose: &mut Vec<LocalId>, ranges: &mut Vec<(LocalId, LocalId)>) {
    if run.len() >= MIN_RANGE_RUN {
        let lo = run[0];
        let hi = run[run.len() - 1];
        ranges.push((lo, hi));
    } else {
        loose.append(run);
    }
    run.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table() -> TableRef {
        TableRef::new("Evr", "e")
    }

    fn encode(set: &PartitionedIdSet) -> String {
        set.encode(&table(), "hostId", "sessionId")
            .clause()
            .to_string()
    }

    #[test]
    fn empty_set_fails_closed() {
        let set = PartitionedIdSet::new();

        assert_eq!(encode(&set), "(0=1)");
    }

    #[test]
    fn single_id_collapses_to_equality() {
        let mut set = PartitionedIdSet::new();
        set.insert(7, 42);

        assert_eq!(encode(&set), "((e.hostId = 7) AND (e.sessionId = 42))");
    }

    #[test]
    fn scattered_ids_render_as_in_list() {
        let mut set = PartitionedIdSet::new();
        set.insert(7, 10);
        set.insert(7, 20);
        set.insert(7, 30);

        assert_eq!(
            encode(&set),
            "((e.hostId = 7) AND (e.sessionId IN (10,20,30)))"
        );
    }

    #[test]
    fn contiguous_run_collapses_to_between() {
        let mut set = PartitionedIdSet::new();
        for id in 5..=9 {
            set.insert(7, id);
        }

        assert_eq!(
            encode(&set),
            "((e.hostId = 7) AND (e.sessionId BETWEEN 5 AND 9))"
        );
    }

    #[test]
    fn mixed_runs_and_loose_ids_form_a_disjunction() {
        let mut set = PartitionedIdSet::new();
        set.insert(7, 1);
        for id in 100..=103 {
            set.insert(7, id);
        }

        assert_eq!(
            encode(&set),
            "((e.hostId = 7) AND ((e.sessionId = 1) OR (e.sessionId BETWEEN 100 AND 103)))"
        );
    }

    #[test]
    fn multiple_partitions_are_ored_and_parenthesized() {
        let mut set = PartitionedIdSet::new();
        set.insert(1, 5);
        set.insert(2, 6);

        assert_eq!(
            encode(&set),
            "(((e.hostId = 1) AND (e.sessionId = 5)) OR ((e.hostId = 2) AND (e.sessionId = 6)))"
        );
    }

    #[test]
    fn duplicate_inserts_are_deduplicated() {
        let mut set = PartitionedIdSet::new();
        set.insert(1, 5);
        set.insert(1, 5);

        assert_eq!(set.len(), 1);
        assert!(set.contains(1, 5));
    }

    proptest! {
        // Encoding never renders the dangerous empty string and always
        // parenthesizes, regardless of the id population.
        #[test]
        fn encoding_is_never_empty_and_always_parenthesized(
            pairs in proptest::collection::vec((0_i32..4, 0_u64..200), 0..64)
        ) {
            let mut set = PartitionedIdSet::new();
            for (partition, id) in pairs {
                set.insert(partition, id);
            }

            let clause = encode(&set);
            prop_assert!(!clause.is_empty());
            prop_assert!(clause.starts_with('('));
            prop_assert!(clause.ends_with(')'));
        }
    }
}
