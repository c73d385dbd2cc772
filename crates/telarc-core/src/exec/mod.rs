//! Execution seams and the streaming consumption layer: executor traits,
//! the batch cursor state machine, and the join flattener. The engine
//! consumes a parameterized-statement executor but never implements one
//! against a real driver; [`dry_run`] and [`scripted`] are the shipped
//! implementations.

pub mod cursor;
pub mod dry_run;
pub mod flatten;
pub mod scripted;

pub use cursor::{BatchCursor, RowMapper};
pub use dry_run::DryRunExecutor;
pub use flatten::{CompositeKey, FlattenRowMapper, JoinFlattener, KeyPart};
pub use scripted::{ScriptedExecutor, ScriptedRow};

use crate::value::SqlValue;
use thiserror::Error as ThisError;

///
/// ExecutorError
///
/// Driver-side failure crossing the executor seam. The engine wraps it
/// into a classified [`crate::error::FetchError`] with the generated SQL
/// attached; implementations only supply the message.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct ExecutorError {
    pub message: String,
}

impl ExecutorError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

///
/// CursorMode
///
/// How the driver should produce rows. The engine always requests
/// `StreamingForwardOnly` for archive queries: naive cursor modes silently
/// fall back to materializing the full result set client-side, which is
/// fatal against unbounded archives. Implementations must map this mode to
/// whatever their driver needs (forward-only/read-only plus a row-by-row
/// fetch hint on MySQL-family drivers).
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CursorMode {
    StreamingForwardOnly,
    Buffered,
}

///
/// RowStream
///
/// Forward-only view over query results. `get` returns
/// [`SqlValue::Null`] for SQL NULL, subsuming a separate was-null
/// accessor. `advance` must be called before the first `get`.
///

pub trait RowStream {
    /// Move to the next row; `false` once the stream is exhausted.
    fn advance(&mut self) -> Result<bool, ExecutorError>;

    /// Column value of the current row.
    fn get(&self, column: &str) -> Result<&SqlValue, ExecutorError>;

    /// Release the stream. Idempotent.
    fn close(&mut self) -> Result<(), ExecutorError>;
}

///
/// PreparedStatement
///
/// One prepared query with zero-based bind indices. The statement stays
/// alive alongside its row stream so an in-flight query can be cancelled.
///

pub trait PreparedStatement {
    type Rows: RowStream;

    fn bind(&mut self, index: usize, value: SqlValue) -> Result<(), ExecutorError>;

    fn execute(&mut self, mode: CursorMode) -> Result<Self::Rows, ExecutorError>;

    /// Request cancellation of an in-flight execution. Cancelling an
    /// already-completed statement may fail; callers tolerate that.
    fn cancel(&mut self) -> Result<(), ExecutorError>;

    /// Release the statement. Idempotent.
    fn close(&mut self) -> Result<(), ExecutorError>;
}

///
/// StatementExecutor
///
/// The seam to whatever owns connections. The engine never pools,
/// reconnects, or retries through it.
///

pub trait StatementExecutor {
    type Statement: PreparedStatement;

    fn prepare(&self, sql: &str) -> Result<Self::Statement, ExecutorError>;
}
