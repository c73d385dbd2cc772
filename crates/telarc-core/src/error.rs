use std::fmt;
use thiserror::Error as ThisError;

///
/// FetchError
///
/// Structured runtime error with a stable internal classification.
/// The engine's contract is fail fast, fail loud, leak nothing: there is no
/// automatic retry anywhere, and release-path errors are logged rather than
/// allowed to mask a primary error already in flight.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct FetchError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Generated SQL text, attached to query-execution failures for
    /// diagnosability. Never attached to configuration or usage errors.
    pub sql: Option<String>,
}

impl FetchError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            sql: None,
        }
    }

    /// Construct a configuration error (malformed filter combination).
    /// Surfaced immediately, never retried.
    pub(crate) fn configuration(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Configuration, origin, message)
    }

    /// Construct a resolution error: the identity pre-query failed and the
    /// main query must never run against a partially-resolved set.
    pub(crate) fn resolution(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Resolution, ErrorOrigin::Identity, message)
    }

    /// Construct a query-execution error carrying the generated SQL text.
    pub(crate) fn query_execution(
        origin: ErrorOrigin,
        sql: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            class: ErrorClass::QueryExecution,
            origin,
            message: message.into(),
            sql: Some(sql.into()),
        }
    }

    /// Construct a row-decoding error. Fatal for the current fetch: a
    /// skipped row would make archive results misleadingly incomplete.
    pub(crate) fn row_decoding(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::RowDecoding, origin, message)
    }

    /// Construct an API-usage error (e.g. next_batch on a closed cursor).
    pub(crate) fn usage(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Usage, origin, message)
    }

    /// Attach generated SQL text for diagnosability.
    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self.class, ErrorClass::Configuration)
    }

    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self.class, ErrorClass::Usage)
    }

    /// Generated SQL attached to this error, if any.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Failure taxonomy mirroring the engine's abort semantics.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// Malformed caller input (e.g. inverted time-range bounds).
    Configuration,
    /// Identity pre-query failed before the main query was attempted.
    Resolution,
    /// Statement preparation or execution failed.
    QueryExecution,
    /// A row violated an expected invariant.
    RowDecoding,
    /// API misuse by the caller.
    Usage,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::Resolution => "resolution",
            Self::QueryExecution => "query_execution",
            Self::RowDecoding => "row_decoding",
            Self::Usage => "usage",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Component that raised the error.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Predicate,
    KeySet,
    Identity,
    Union,
    Cursor,
    Flatten,
    Executor,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Predicate => "predicate",
            Self::KeySet => "keyset",
            Self::Identity => "identity",
            Self::Union => "union",
            Self::Cursor => "cursor",
            Self::Flatten => "flatten",
            Self::Executor => "executor",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}
