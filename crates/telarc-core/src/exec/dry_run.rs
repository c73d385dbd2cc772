use crate::{
    exec::{CursorMode, ExecutorError, PreparedStatement, RowStream, StatementExecutor},
    value::SqlValue,
};
use std::{cell::RefCell, rc::Rc};

///
/// DryRunExecutor
///
/// Print-SQL-instead-of-executing as an executor capability: statements
/// are captured (and echoed at debug level) and every execution yields an
/// empty stream. The engine itself never branches on dry-run mode.
///

#[derive(Clone, Debug, Default)]
pub struct DryRunExecutor {
    captured: Rc<RefCell<Vec<String>>>,
}

impl DryRunExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every statement text prepared so far, in order.
    #[must_use]
    pub fn captured(&self) -> Vec<String> {
        self.captured.borrow().clone()
    }
}

impl StatementExecutor for DryRunExecutor {
    type Statement = DryRunStatement;

    fn prepare(&self, sql: &str) -> Result<Self::Statement, ExecutorError> {
        log::debug!("dry-run SQL: {sql}");
        self.captured.borrow_mut().push(sql.to_string());

        Ok(DryRunStatement)
    }
}

///
/// DryRunStatement
///

#[derive(Debug)]
pub struct DryRunStatement;

impl PreparedStatement for DryRunStatement {
    type Rows = EmptyRows;

    fn bind(&mut self, _index: usize, _value: SqlValue) -> Result<(), ExecutorError> {
        Ok(())
    }

    fn execute(&mut self, _mode: CursorMode) -> Result<Self::Rows, ExecutorError> {
        Ok(EmptyRows)
    }

    fn cancel(&mut self) -> Result<(), ExecutorError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), ExecutorError> {
        Ok(())
    }
}

///
/// EmptyRows
///

#[derive(Debug)]
pub struct EmptyRows;

impl RowStream for EmptyRows {
    fn advance(&mut self) -> Result<bool, ExecutorError> {
        Ok(false)
    }

    fn get(&self, column: &str) -> Result<&SqlValue, ExecutorError> {
        Err(ExecutorError::new(format!(
            "dry-run stream has no rows (column '{column}')"
        )))
    }

    fn close(&mut self) -> Result<(), ExecutorError> {
        Ok(())
    }
}
