use super::statement::Statement;
use crate::error::{OciError, Result};
use crate::native::StmtHandle;
use crate::protocol::{FetchAllResult, FetchStyle, Row, Value};

/// Outcome of a successful execute: the executed handle plus the statement
/// it belongs to, for cursor and fetch access.
pub struct StatementResult<'a> {
    statement: &'a mut Statement,
    handle: StmtHandle,
}

impl<'a> StatementResult<'a> {
    pub(crate) fn new(statement: &'a mut Statement, handle: StmtHandle) -> Self {
        Self { statement, handle }
    }

    pub fn resource(&self) -> StmtHandle {
        self.handle
    }

    /// Rows affected by a DML execute, or rows fetched so far for a query.
    pub fn affected_rows(&self) -> Result<u64> {
        self.statement
            .connection()
            .client()
            .num_rows(self.handle)
            .map_err(|e| OciError::query("Failed to read the row count", e))
    }

    pub fn field_count(&self) -> Result<usize> {
        self.statement
            .connection()
            .client()
            .column_names(self.handle)
            .map(|names| names.len())
            .map_err(|e| OciError::query("Failed to describe the result set", e))
    }

    pub fn statement(&mut self) -> &mut Statement {
        self.statement
    }

    pub fn fetch(
        &mut self,
        style: Option<FetchStyle>,
        cursor: Option<&str>,
    ) -> Result<Option<Row>> {
        self.statement.fetch(style, cursor)
    }

    pub fn fetch_all(
        &mut self,
        style: Option<FetchStyle>,
        column: usize,
        cursor: Option<&str>,
    ) -> Result<FetchAllResult> {
        self.statement.fetch_all(style, column, cursor)
    }

    pub fn fetch_column(&mut self, index: usize, cursor: Option<&str>) -> Result<Option<Value>> {
        self.statement.fetch_column(index, cursor)
    }
}
