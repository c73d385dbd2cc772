use crate::{
    error::{ErrorOrigin, FetchError},
    exec::{CursorMode, ExecutorError, PreparedStatement, RowStream, StatementExecutor},
    identity::{IdentityContext, ResolvedIdentity},
    obs::{self, MetricsEvent, ReleaseStage},
    query::union::ComposedQuery,
};

///
/// RowMapper
///
/// Per-entity row-mapping strategy: given the stream positioned at a row
/// and that row's resolved identity, produce one domain record. Mappers
/// are downstream of, and unaware of, batching mechanics.
///

pub trait RowMapper {
    type Record;

    fn map_row(
        &self,
        row: &dyn RowStream,
        identity: &ResolvedIdentity,
    ) -> Result<Self::Record, FetchError>;
}

// Lifecycle: Closed → Open → Exhausted → Closed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CursorState {
    Open,
    Exhausted,
    Closed,
}

///
/// BatchCursor
///
/// Owns the single live prepared statement and its row stream, exclusively.
/// `open` requests a streaming forward-only cursor; anything else silently
/// materializes the full result set client-side, which an unbounded
/// archive query cannot survive. Any error on the consumption path
/// releases both resources before it propagates; Drop is the backstop for
/// abandoned cursors.
///
/// Not safe for concurrent use; one cursor per logical caller, one
/// underlying connection per cursor.
///

pub struct BatchCursor<X: StatementExecutor> {
    statement: Option<X::Statement>,
    rows: Option<<X::Statement as PreparedStatement>::Rows>,
    state: CursorState,
    sql: String,
}

impl<X: StatementExecutor> BatchCursor<X> {
    /// Prepare, bind, and execute the composed query with a streaming
    /// cursor.
    pub fn open(executor: &X, query: &ComposedQuery) -> Result<Self, FetchError> {
        let mut statement = executor
            .prepare(&query.sql)
            .map_err(|err| execution_error(&query.sql, "prepare failed", &err))?;

        for (index, value) in query.binds.iter().enumerate() {
            if let Err(err) = statement.bind(index, value.clone()) {
                release_statement(&mut statement);
                return Err(execution_error(&query.sql, "bind failed", &err));
            }
        }

        let rows = match statement.execute(CursorMode::StreamingForwardOnly) {
            Ok(rows) => rows,
            Err(err) => {
                release_statement(&mut statement);
                return Err(execution_error(&query.sql, "execute failed", &err));
            }
        };

        obs::record(MetricsEvent::QueryOpened);

        Ok(Self {
            statement: Some(statement),
            rows: Some(rows),
            state: CursorState::Open,
            sql: query.sql.clone(),
        })
    }

    /// Generated SQL this cursor is consuming.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self.state, CursorState::Exhausted)
    }

    /// Fetch up to `n` mapped records. An empty vec means the stream is
    /// exhausted, and resources are already released at that point. Calling
    /// this on a closed cursor is a usage error, not a silent empty
    /// return.
    pub fn next_batch<M: RowMapper>(
        &mut self,
        n: usize,
        mapper: &M,
        identities: &IdentityContext,
    ) -> Result<Vec<M::Record>, FetchError> {
        self.ensure_usable()?;

        let mut batch = Vec::with_capacity(n.min(1024));

        while batch.len() < n {
            if !self.advance_row()? {
                break;
            }

            let record = self.map_current(mapper, identities)?;
            batch.push(record);
        }

        obs::record(MetricsEvent::BatchEmitted {
            records: batch.len(),
        });

        Ok(batch)
    }

    // Map the current row, releasing everything on failure so a decoding
    // error cannot leak the statement (fail fast, leak nothing).
    fn map_current<M: RowMapper>(
        &mut self,
        mapper: &M,
        identities: &IdentityContext,
    ) -> Result<M::Record, FetchError> {
        let outcome = {
            let Some(rows) = self.rows.as_ref() else {
                return Err(self.usage_error("cursor stream already released"));
            };

            identities
                .identity_for(rows)
                .and_then(|identity| mapper.map_row(rows, identity))
        };

        match outcome {
            Ok(record) => Ok(record),
            Err(err) => {
                self.release_all();
                Err(err)
            }
        }
    }

    /// Advance the underlying stream one row. `false` means exhaustion:
    /// the stream and statement are released immediately, in that order.
    pub(crate) fn advance_row(&mut self) -> Result<bool, FetchError> {
        match self.state {
            CursorState::Open => {}
            CursorState::Exhausted => return Ok(false),
            CursorState::Closed => {
                return Err(self.usage_error("advance on a closed cursor"));
            }
        }

        let Some(rows) = self.rows.as_mut() else {
            return Err(self.usage_error("cursor stream already released"));
        };

        match rows.advance() {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.state = CursorState::Exhausted;
                self.release_resources();
                obs::record(MetricsEvent::StreamExhausted);
                Ok(false)
            }
            Err(err) => {
                let err = execution_error(&self.sql, "row fetch failed", &err);
                self.release_all();
                Err(err)
            }
        }
    }

    /// Current row view. Usable only while [`Self::advance_row`] last
    /// returned `true`.
    pub(crate) fn current_row(&self) -> Result<&dyn RowStream, FetchError> {
        match self.rows.as_ref() {
            Some(rows) => Ok(rows),
            None => Err(FetchError::usage(
                ErrorOrigin::Cursor,
                "no current row: cursor is not open",
            )),
        }
    }

    /// Request cancellation of the in-flight statement, then release all
    /// resources. Secondary errors from cancelling an already-completed
    /// statement are tolerated, never propagated.
    pub fn abort(&mut self) {
        if let Some(statement) = self.statement.as_mut()
            && let Err(err) = statement.cancel()
        {
            obs::record(MetricsEvent::ReleaseFailed {
                stage: ReleaseStage::Cancel,
            });
            log::warn!("statement cancel failed (tolerated): {err}");
        }

        obs::record(MetricsEvent::QueryAborted);
        self.release_all();
    }

    /// Idempotent close, safe from any state. Releases the row stream and
    /// the statement, in that order, logging secondary release errors
    /// rather than letting them mask a primary error.
    pub fn close(&mut self) {
        self.release_all();
    }

    fn ensure_usable(&self) -> Result<(), FetchError> {
        if matches!(self.state, CursorState::Closed) {
            return Err(self.usage_error("next_batch on a closed cursor"));
        }

        Ok(())
    }

    fn usage_error(&self, message: &str) -> FetchError {
        FetchError::usage(ErrorOrigin::Cursor, message)
    }

    fn release_all(&mut self) {
        self.release_resources();
        self.state = CursorState::Closed;
    }

    // Stream first, then statement.
    fn release_resources(&mut self) {
        if let Some(mut rows) = self.rows.take()
            && let Err(err) = rows.close()
        {
            obs::record(MetricsEvent::ReleaseFailed {
                stage: ReleaseStage::RowStream,
            });
            log::warn!("row stream close failed: {err}");
        }

        if let Some(mut statement) = self.statement.take() {
            release_statement(&mut statement);
        }
    }
}

impl<X: StatementExecutor> Drop for BatchCursor<X> {
    fn drop(&mut self) {
        self.release_resources();
    }
}

fn release_statement<S: PreparedStatement>(statement: &mut S) {
    if let Err(err) = statement.close() {
        obs::record(MetricsEvent::ReleaseFailed {
            stage: ReleaseStage::Statement,
        });
        log::warn!("statement close failed: {err}");
    }
}

fn execution_error(sql: &str, stage: &str, err: &ExecutorError) -> FetchError {
    FetchError::query_execution(ErrorOrigin::Cursor, sql, format!("{stage}: {err}"))
}
