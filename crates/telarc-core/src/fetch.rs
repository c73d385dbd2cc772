//! One-stop orchestration of the fetch data flow:
//! predicate assembly → identity pre-resolution → union composition →
//! streaming cursor → (optionally) join flattening.
//!
//! Entity fetch clients supply predicates, branch layouts, and a row
//! mapper; everything stateful lives in the cursor or flattener handed
//! back. Identity resolution always completes before the main query
//! opens, because the main predicate embeds the resolved id set.

use crate::{
    config::FetchConfig,
    error::FetchError,
    exec::{
        BatchCursor, FlattenRowMapper, JoinFlattener, StatementExecutor,
    },
    identity::{IdentityContext, IdentityResolver, ResolvedIdentitySet},
    query::{Predicate, UnionQuery},
    schema::ArchiveSchema,
};

///
/// FetchSession
///
/// Shared context for one logical caller: the executor seam plus the
/// immutable schema metadata and tuning injected at construction.
/// Single-threaded; callers needing concurrency create separate sessions
/// over separate connections.
///

pub struct FetchSession<X: StatementExecutor> {
    executor: X,
    schema: ArchiveSchema,
    config: FetchConfig,
}

impl<X: StatementExecutor> FetchSession<X> {
    pub fn new(executor: X, schema: ArchiveSchema, config: FetchConfig) -> Result<Self, FetchError> {
        config.validate()?;

        Ok(Self {
            executor,
            schema,
            config,
        })
    }

    #[must_use]
    pub const fn schema(&self) -> &ArchiveSchema {
        &self.schema
    }

    #[must_use]
    pub const fn config(&self) -> &FetchConfig {
        &self.config
    }

    #[must_use]
    pub const fn executor(&self) -> &X {
        &self.executor
    }

    /// Preferred records-per-batch for this session.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Run the one-shot identity pre-query over `table` and drain it.
    /// Failure aborts the fetch before any main query is attempted.
    pub fn resolve_identities(
        &self,
        table: &str,
        criteria: Predicate,
    ) -> Result<ResolvedIdentitySet, FetchError> {
        let table = self.schema.table(table)?;
        let resolver = IdentityResolver::new(table, criteria);

        resolver.resolve(&self.executor, &self.schema)
    }

    /// Compose the union and open a streaming batch cursor over it.
    pub fn open(&self, query: &UnionQuery) -> Result<BatchCursor<X>, FetchError> {
        let composed = query.compose()?;

        BatchCursor::open(&self.executor, &composed)
    }

    /// Compose, open, and layer a join flattener for entities whose
    /// logical records arrive as several adjacent child rows.
    pub fn open_flattened<F: FlattenRowMapper>(
        &self,
        query: &UnionQuery,
        mapper: F,
        identities: IdentityContext,
    ) -> Result<JoinFlattener<X, F>, FetchError> {
        let cursor = self.open(query)?;

        Ok(JoinFlattener::new(cursor, mapper, identities))
    }
}
