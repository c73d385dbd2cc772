//! Identity pre-resolution.
//!
//! One cheap up-front query replaces per-row joins against the session
//! table: every matching `(partition, local id)` row is drained into an
//! in-memory lookup table, and the resulting id set becomes the main
//! query's identity predicate. The main query must never run against a
//! partially-resolved set; any read error here aborts the fetch first.

use crate::{
    error::{ErrorOrigin, FetchError},
    exec::{CursorMode, ExecutorError, PreparedStatement, RowStream, StatementExecutor},
    obs::{self, MetricsEvent},
    query::{
        Filter, Predicate,
        keyset::{LocalId, PartitionId, PartitionedIdSet},
    },
    schema::{ArchiveSchema, TableRef},
    value::SqlValue,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Pre-query projection beyond the identity pair itself.
const HOST_NAME_COL: &str = "host";
const VENUE_COL: &str = "venueType";
const SPACECRAFT_COL: &str = "spacecraftId";
const STATION_COL: &str = "dssId";

///
/// Venue
///
/// Mission venue a session ran in. Archive rows carry free text; anything
/// unrecognized resolves to `Unknown` rather than failing resolution.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Venue {
    #[default]
    Unknown,
    TestSet,
    TestBed,
    Atlo,
    Ops,
    Cruise,
    Surface,
    Orbit,
}

impl Venue {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "TESTSET" => Self::TestSet,
            "TESTBED" => Self::TestBed,
            "ATLO" => Self::Atlo,
            "OPS" => Self::Ops,
            "CRUISE" => Self::Cruise,
            "SURFACE" => Self::Surface,
            "ORBIT" => Self::Orbit,
            _ => Self::Unknown,
        }
    }
}

///
/// ResolvedIdentity
///
/// Immutable lookup record for one `(partition, local id)` pair. Holds
/// only the fields row mapping needs; never a live database resource.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedIdentity {
    pub host_name: String,
    pub venue: Venue,
    pub spacecraft_id: i64,
    pub station: i64,
}

impl ResolvedIdentity {
    /// The well-defined "unknown" sentinel handed out for absent entries.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            host_name: String::new(),
            venue: Venue::Unknown,
            spacecraft_id: 0,
            station: 0,
        }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.host_name.is_empty() && self.venue == Venue::Unknown
    }
}

static UNKNOWN_IDENTITY: ResolvedIdentity = ResolvedIdentity::unknown();

///
/// IdentityLookup
///
/// The `(partition, local id) → ResolvedIdentity` table built by the
/// resolver. `get` never returns an absent value; unknown pairs map to the
/// shared sentinel so row mappers stay total.
///

#[derive(Clone, Debug, Default)]
pub struct IdentityLookup {
    entries: BTreeMap<(PartitionId, LocalId), ResolvedIdentity>,
}

impl IdentityLookup {
    pub fn insert(&mut self, partition: PartitionId, id: LocalId, identity: ResolvedIdentity) {
        self.entries.insert((partition, id), identity);
    }

    #[must_use]
    pub fn get(&self, partition: PartitionId, id: LocalId) -> &ResolvedIdentity {
        self.entries
            .get(&(partition, id))
            .unwrap_or(&UNKNOWN_IDENTITY)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

///
/// IdentityContext
///
/// Row-mapping view over the lookup: reads the identity column pair from
/// the current row and resolves it. A detached context skips the read and
/// always yields the sentinel, for queries with no identity columns.
///

#[derive(Clone, Debug)]
pub struct IdentityContext {
    lookup: Option<IdentityLookup>,
    partition_column: String,
    local_id_column: String,
}

impl IdentityContext {
    #[must_use]
    pub fn new(schema: &ArchiveSchema, lookup: IdentityLookup) -> Self {
        Self {
            lookup: Some(lookup),
            partition_column: schema.partition_column().to_string(),
            local_id_column: schema.local_id_column().to_string(),
        }
    }

    #[must_use]
    pub const fn detached() -> Self {
        Self {
            lookup: None,
            partition_column: String::new(),
            local_id_column: String::new(),
        }
    }

    /// Resolve the current row's identity.
    pub fn identity_for(&self, row: &dyn RowStream) -> Result<&ResolvedIdentity, FetchError> {
        let Some(lookup) = &self.lookup else {
            return Ok(&UNKNOWN_IDENTITY);
        };

        let partition = read_partition(row, &self.partition_column)?;
        let id = read_local_id(row, &self.local_id_column)?;

        Ok(lookup.get(partition, id))
    }
}

fn read_partition<R: RowStream + ?Sized>(row: &R, column: &str) -> Result<PartitionId, FetchError> {
    let value = row
        .get(column)
        .map_err(|err| row_read_error(column, &err))?;

    value
        .as_long()
        .and_then(|v| PartitionId::try_from(v).ok())
        .ok_or_else(|| {
            FetchError::row_decoding(
                ErrorOrigin::Identity,
                format!("partition column '{column}' is not a valid partition id: {value}"),
            )
        })
}

fn read_local_id<R: RowStream + ?Sized>(row: &R, column: &str) -> Result<LocalId, FetchError> {
    let value = row
        .get(column)
        .map_err(|err| row_read_error(column, &err))?;

    value.as_ulong().ok_or_else(|| {
        FetchError::row_decoding(
            ErrorOrigin::Identity,
            format!("local-id column '{column}' is not a valid id: {value}"),
        )
    })
}

fn row_read_error(column: &str, err: &ExecutorError) -> FetchError {
    FetchError::row_decoding(
        ErrorOrigin::Identity,
        format!("failed to read identity column '{column}': {err}"),
    )
}

///
/// ResolvedIdentitySet
///
/// Everything the resolver produced: the id set for the main predicate and
/// the lookup table for row mapping.
///

#[derive(Clone, Debug, Default)]
pub struct ResolvedIdentitySet {
    ids: PartitionedIdSet,
    lookup: IdentityLookup,
}

impl ResolvedIdentitySet {
    /// Encode the resolved set as the main query's identity predicate.
    /// Empty resolution fails closed (`(0=1)`).
    #[must_use]
    pub fn id_predicate(&self, table: &TableRef, schema: &ArchiveSchema) -> Filter {
        self.ids
            .encode(table, schema.partition_column(), schema.local_id_column())
    }

    #[must_use]
    pub fn lookup(&self, partition: PartitionId, id: LocalId) -> &ResolvedIdentity {
        self.lookup.get(partition, id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn into_context(self, schema: &ArchiveSchema) -> IdentityContext {
        IdentityContext::new(schema, self.lookup)
    }
}

///
/// IdentityResolver
///
/// Runs exactly one pre-query against the session table and drains it to
/// completion, with no batching. Rows stream through a forward-only cursor;
/// each one feeds the id set and upserts the lookup entry.
///

#[derive(Clone, Debug)]
pub struct IdentityResolver {
    table: TableRef,
    criteria: Predicate,
}

impl IdentityResolver {
    #[must_use]
    pub const fn new(table: TableRef, criteria: Predicate) -> Self {
        Self { table, criteria }
    }

    /// Render the pre-query. No ordering: the drain is total, so row order
    /// is irrelevant and a sort would only cost the planner.
    #[must_use]
    pub fn pre_query_sql(&self, schema: &ArchiveSchema) -> String {
        let cols = [
            schema.partition_column(),
            schema.local_id_column(),
            HOST_NAME_COL,
            VENUE_COL,
            SPACECRAFT_COL,
            STATION_COL,
        ]
        .map(|col| self.table.col(col))
        .join(",");

        format!(
            "SELECT {cols} FROM {}{}",
            self.table.from_clause(),
            self.criteria.render(),
        )
    }

    /// Execute the pre-query and build the resolved set.
    pub fn resolve<X: StatementExecutor>(
        &self,
        executor: &X,
        schema: &ArchiveSchema,
    ) -> Result<ResolvedIdentitySet, FetchError> {
        let sql = self.pre_query_sql(schema);

        let mut statement = executor
            .prepare(&sql)
            .map_err(|err| resolution_error(&sql, "prepare failed", &err))?;

        let outcome = self.drain(&mut statement, schema, &sql);

        // Stream first, then statement; a failed drain still releases both.
        release(&mut statement);

        let resolved = outcome?;
        obs::record(MetricsEvent::ResolutionCompleted {
            identities: resolved.len(),
        });

        Ok(resolved)
    }

    fn drain<S: PreparedStatement>(
        &self,
        statement: &mut S,
        schema: &ArchiveSchema,
        sql: &str,
    ) -> Result<ResolvedIdentitySet, FetchError> {
        for (index, value) in self.criteria.binds().into_iter().enumerate() {
            statement
                .bind(index, value)
                .map_err(|err| resolution_error(sql, "bind failed", &err))?;
        }

        let mut rows = statement
            .execute(CursorMode::StreamingForwardOnly)
            .map_err(|err| resolution_error(sql, "execute failed", &err))?;

        let mut resolved = ResolvedIdentitySet::default();

        let outcome = Self::drain_rows(&mut rows, schema, sql, &mut resolved);

        if let Err(err) = rows.close() {
            log::warn!("identity pre-query stream close failed: {err}");
        }

        outcome.map(|()| resolved)
    }

    fn drain_rows<R: RowStream>(
        rows: &mut R,
        schema: &ArchiveSchema,
        sql: &str,
        resolved: &mut ResolvedIdentitySet,
    ) -> Result<(), FetchError> {
        loop {
            let advanced = rows
                .advance()
                .map_err(|err| resolution_error(sql, "row fetch failed", &err))?;
            if !advanced {
                return Ok(());
            }

            let partition = read_partition(rows, schema.partition_column())?;
            let id = read_local_id(rows, schema.local_id_column())?;

            let identity = ResolvedIdentity {
                host_name: opt_text(rows, HOST_NAME_COL)?,
                venue: Venue::from_name(&opt_text(rows, VENUE_COL)?),
                spacecraft_id: opt_long(rows, SPACECRAFT_COL)?,
                station: opt_long(rows, STATION_COL)?,
            };

            resolved.ids.insert(partition, id);
            resolved.lookup.insert(partition, id, identity);
        }
    }
}

// Null-protected text read; missing values become the empty string, the
// same degraded-but-total behavior the unknown sentinel provides.
fn opt_text<R: RowStream + ?Sized>(rows: &R, column: &str) -> Result<String, FetchError> {
    let value = rows
        .get(column)
        .map_err(|err| row_read_error(column, &err))?;

    match value {
        SqlValue::Null => Ok(String::new()),
        SqlValue::Text(text) => Ok(text.clone()),
        other => Err(FetchError::row_decoding(
            ErrorOrigin::Identity,
            format!("column '{column}' is not text: {other}"),
        )),
    }
}

fn opt_long<R: RowStream + ?Sized>(rows: &R, column: &str) -> Result<i64, FetchError> {
    let value = rows
        .get(column)
        .map_err(|err| row_read_error(column, &err))?;

    match value {
        SqlValue::Null => Ok(0),
        other => other.as_long().ok_or_else(|| {
            FetchError::row_decoding(
                ErrorOrigin::Identity,
                format!("column '{column}' is not an integer: {other}"),
            )
        }),
    }
}

fn resolution_error(sql: &str, stage: &str, err: &ExecutorError) -> FetchError {
    FetchError::resolution(format!("identity pre-query {stage}: {err}")).with_sql(sql)
}

fn release<S: PreparedStatement>(statement: &mut S) {
    if let Err(err) = statement.close() {
        log::warn!("identity pre-query statement close failed: {err}");
    }
}
