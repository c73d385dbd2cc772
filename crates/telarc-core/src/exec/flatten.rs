use crate::{
    error::FetchError,
    exec::{RowStream, StatementExecutor, cursor::BatchCursor},
    identity::{IdentityContext, ResolvedIdentity},
    obs::{self, MetricsEvent},
};

///
/// KeyPart
///
/// One comparable field of a composite key. Restricted to the scalar kinds
/// a key may legally contain so keys stay `Eq`.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum KeyPart {
    Long(i64),
    Ulong(u64),
    Text(String),
}

impl From<i64> for KeyPart {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<u64> for KeyPart {
    fn from(v: u64) -> Self {
        Self::Ulong(v)
    }
}

impl From<&str> for KeyPart {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

///
/// CompositeKey
///
/// Ordered tuple uniquely identifying one logical parent record among the
/// flattened child rows. Derivable purely from columns present in every
/// row.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CompositeKey(Vec<KeyPart>);

impl CompositeKey {
    #[must_use]
    pub fn new(parts: impl IntoIterator<Item = KeyPart>) -> Self {
        Self(parts.into_iter().collect())
    }

    #[must_use]
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }
}

///
/// FlattenRowMapper
///
/// Per-entity strategy for the flattener: derive the parent key from a
/// row, start a new aggregate from a row's parent fields (absorbing its
/// first child attribute, if the row carries one), and merge a
/// duplicate-parent row's child attribute into an existing aggregate.
///

pub trait FlattenRowMapper {
    type Aggregate;

    fn key(&self, row: &dyn RowStream) -> Result<CompositeKey, FetchError>;

    fn start(
        &self,
        row: &dyn RowStream,
        identity: &ResolvedIdentity,
    ) -> Result<Self::Aggregate, FetchError>;

    fn merge(
        &self,
        aggregate: &mut Self::Aggregate,
        row: &dyn RowStream,
    ) -> Result<(), FetchError>;
}

struct Pending<A> {
    key: CompositeKey,
    aggregate: A,
}

///
/// JoinFlattener
///
/// Key-change-detection aggregator layered on a [`BatchCursor`]. A
/// one-to-many join delivers one physical row per child attribute, so one
/// logical parent arrives as several adjacent rows; this reconstructs the
/// parent exactly once, even when its rows straddle a caller-visible
/// batch boundary.
///
/// Between calls at most one incomplete aggregate exists, held in
/// `pending`; emitted aggregates are owned by the caller. The final batch
/// may carry one extra record beyond `n` when the exhaustion flush lands
/// exactly on the batch boundary; acceptable by contract.
///

pub struct JoinFlattener<X: StatementExecutor, F: FlattenRowMapper> {
    cursor: BatchCursor<X>,
    mapper: F,
    identities: IdentityContext,
    pending: Option<Pending<F::Aggregate>>,
    primed: bool,
    done: bool,
}

impl<X: StatementExecutor, F: FlattenRowMapper> JoinFlattener<X, F> {
    #[must_use]
    pub fn new(cursor: BatchCursor<X>, mapper: F, identities: IdentityContext) -> Self {
        Self {
            cursor,
            mapper,
            identities,
            pending: None,
            primed: false,
            done: false,
        }
    }

    /// Generated SQL the underlying cursor is consuming.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.cursor.sql()
    }

    /// Fetch up to `n` flattened aggregates (n+1 on a boundary flush). An
    /// empty vec means the stream is exhausted.
    pub fn next_batch(&mut self, n: usize) -> Result<Vec<F::Aggregate>, FetchError> {
        let mut batch: Vec<F::Aggregate> = Vec::with_capacity(n.min(1024));

        if self.done {
            return Ok(batch);
        }

        // The very first row of the whole query.
        if !self.primed {
            self.primed = true;
            if !self.advance()? {
                return Ok(batch);
            }
        }

        while batch.len() < n && !self.done {
            self.consume_current(&mut batch)?;

            if !self.advance()? {
                break;
            }
        }

        // Exhaustion flush: without it the last logical record would be
        // silently lost, since no further row triggers a key change.
        if self.done
            && let Some(pending) = self.pending.take()
        {
            batch.push(pending.aggregate);
        }

        obs::record(MetricsEvent::BatchEmitted {
            records: batch.len(),
        });

        Ok(batch)
    }

    // Merge the current row into `pending`, or emit `pending` and start a
    // new aggregate on a key change.
    fn consume_current(&mut self, batch: &mut Vec<F::Aggregate>) -> Result<(), FetchError> {
        let outcome = self.consume_current_inner(batch);
        if outcome.is_err() {
            self.pending = None;
            self.cursor.close();
        }
        outcome
    }

    fn consume_current_inner(&mut self, batch: &mut Vec<F::Aggregate>) -> Result<(), FetchError> {
        let row = self.cursor.current_row()?;
        let key = self.mapper.key(row)?;

        let same_parent = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.key == key);

        if same_parent {
            // Duplicate-parent row: one more child attribute, no emission.
            if let Some(pending) = self.pending.as_mut() {
                self.mapper.merge(&mut pending.aggregate, row)?;
            }
        } else {
            let identity = self.identities.identity_for(row)?;
            let aggregate = self.mapper.start(row, identity)?;

            if let Some(previous) = self.pending.replace(Pending { key, aggregate }) {
                batch.push(previous.aggregate);
            }
        }

        Ok(())
    }

    fn advance(&mut self) -> Result<bool, FetchError> {
        match self.cursor.advance_row() {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.done = true;
                Ok(false)
            }
            Err(err) => {
                self.pending = None;
                self.done = true;
                Err(err)
            }
        }
    }

    /// Cooperative cancellation; discards any pending aggregate.
    pub fn abort(&mut self) {
        self.pending = None;
        self.done = true;
        self.cursor.abort();
    }

    /// Idempotent close. A pending aggregate is deliberately discarded:
    /// the caller abandoned the fetch before exhaustion.
    pub fn close(&mut self) {
        self.pending = None;
        self.cursor.close();
    }
}
