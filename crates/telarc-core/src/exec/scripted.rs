use crate::{
    exec::{CursorMode, ExecutorError, PreparedStatement, RowStream, StatementExecutor},
    value::SqlValue,
};
use std::{
    cell::RefCell,
    collections::{BTreeMap, VecDeque},
    rc::Rc,
};

///
/// ScriptedRow
///
/// One in-memory result row, column name to value.
///

#[derive(Clone, Debug, Default)]
pub struct ScriptedRow {
    columns: BTreeMap<String, SqlValue>,
}

impl ScriptedRow {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }
}

enum Script {
    Rows(Vec<ScriptedRow>),
    FailExecute(String),
    FailAdvanceAfter(Vec<ScriptedRow>),
}

#[derive(Default)]
struct ScriptState {
    scripts: VecDeque<Script>,
    prepared: Vec<String>,
    requested_modes: Vec<CursorMode>,
    stream_closes: usize,
    statement_closes: usize,
    cancels: usize,
    cancel_fails: bool,
}

///
/// ScriptedExecutor
///
/// In-memory statement executor: each `prepare` consumes the next script
/// in FIFO order. Scripts either serve rows, fail at execute, or fail
/// mid-stream. Close/cancel calls are counted so resource-discipline
/// tests can assert exactly-once release. Single-threaded by design, like
/// the engine itself.
///

#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptedExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next prepared statement to serve `rows`.
    pub fn push_rows(&self, rows: Vec<ScriptedRow>) {
        self.state.borrow_mut().scripts.push_back(Script::Rows(rows));
    }

    /// Script the next prepared statement to fail at execute time.
    pub fn push_execute_failure(&self, message: impl Into<String>) {
        self.state
            .borrow_mut()
            .scripts
            .push_back(Script::FailExecute(message.into()));
    }

    /// Script the next prepared statement to serve `rows` and then fail on
    /// the following advance.
    pub fn push_rows_then_advance_failure(&self, rows: Vec<ScriptedRow>) {
        self.state
            .borrow_mut()
            .scripts
            .push_back(Script::FailAdvanceAfter(rows));
    }

    /// Make every cancel request fail, mimicking cancellation of an
    /// already-completed statement.
    pub fn fail_cancels(&self) {
        self.state.borrow_mut().cancel_fails = true;
    }

    #[must_use]
    pub fn prepared_sql(&self) -> Vec<String> {
        self.state.borrow().prepared.clone()
    }

    #[must_use]
    pub fn requested_modes(&self) -> Vec<CursorMode> {
        self.state.borrow().requested_modes.clone()
    }

    #[must_use]
    pub fn stream_closes(&self) -> usize {
        self.state.borrow().stream_closes
    }

    #[must_use]
    pub fn statement_closes(&self) -> usize {
        self.state.borrow().statement_closes
    }

    #[must_use]
    pub fn cancels(&self) -> usize {
        self.state.borrow().cancels
    }
}

impl StatementExecutor for ScriptedExecutor {
    type Statement = ScriptedStatement;

    fn prepare(&self, sql: &str) -> Result<Self::Statement, ExecutorError> {
        let mut state = self.state.borrow_mut();
        state.prepared.push(sql.to_string());

        let script = state.scripts.pop_front().unwrap_or(Script::Rows(Vec::new()));

        Ok(ScriptedStatement {
            state: Rc::clone(&self.state),
            script: Some(script),
            binds: Vec::new(),
            closed: false,
        })
    }
}

///
/// ScriptedStatement
///

pub struct ScriptedStatement {
    state: Rc<RefCell<ScriptState>>,
    script: Option<Script>,
    binds: Vec<(usize, SqlValue)>,
    closed: bool,
}

impl ScriptedStatement {
    #[must_use]
    pub fn bound_values(&self) -> &[(usize, SqlValue)] {
        &self.binds
    }
}

impl PreparedStatement for ScriptedStatement {
    type Rows = ScriptedRows;

    fn bind(&mut self, index: usize, value: SqlValue) -> Result<(), ExecutorError> {
        self.binds.push((index, value));
        Ok(())
    }

    fn execute(&mut self, mode: CursorMode) -> Result<Self::Rows, ExecutorError> {
        self.state.borrow_mut().requested_modes.push(mode);

        match self.script.take() {
            Some(Script::Rows(rows)) => Ok(ScriptedRows {
                state: Rc::clone(&self.state),
                rows: rows.into(),
                current: None,
                fail_at_end: false,
                closed: false,
            }),
            Some(Script::FailAdvanceAfter(rows)) => Ok(ScriptedRows {
                state: Rc::clone(&self.state),
                rows: rows.into(),
                current: None,
                fail_at_end: true,
                closed: false,
            }),
            Some(Script::FailExecute(message)) => Err(ExecutorError::new(message)),
            None => Err(ExecutorError::new("statement already executed")),
        }
    }

    fn cancel(&mut self) -> Result<(), ExecutorError> {
        let mut state = self.state.borrow_mut();
        state.cancels += 1;

        if state.cancel_fails {
            return Err(ExecutorError::new("statement already completed"));
        }

        Ok(())
    }

    fn close(&mut self) -> Result<(), ExecutorError> {
        if !self.closed {
            self.closed = true;
            self.state.borrow_mut().statement_closes += 1;
        }
        Ok(())
    }
}

///
/// ScriptedRows
///

pub struct ScriptedRows {
    state: Rc<RefCell<ScriptState>>,
    rows: VecDeque<ScriptedRow>,
    current: Option<ScriptedRow>,
    fail_at_end: bool,
    closed: bool,
}

impl RowStream for ScriptedRows {
    fn advance(&mut self) -> Result<bool, ExecutorError> {
        match self.rows.pop_front() {
            Some(row) => {
                self.current = Some(row);
                Ok(true)
            }
            None => {
                self.current = None;
                if self.fail_at_end {
                    self.fail_at_end = false;
                    return Err(ExecutorError::new("connection lost mid-stream"));
                }
                Ok(false)
            }
        }
    }

    fn get(&self, column: &str) -> Result<&SqlValue, ExecutorError> {
        let Some(current) = &self.current else {
            return Err(ExecutorError::new("no current row"));
        };

        current
            .columns
            .get(column)
            .ok_or_else(|| ExecutorError::new(format!("no such column: '{column}'")))
    }

    fn close(&mut self) -> Result<(), ExecutorError> {
        if !self.closed {
            self.closed = true;
            self.state.borrow_mut().stream_closes += 1;
        }
        Ok(())
    }
}
