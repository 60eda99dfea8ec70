use super::binder::TypeBinder;
use super::connection::OciConnection;
use super::cursor::{ActiveCursor, CursorRegistry, RefCursor};
use super::fetch;
use super::result::StatementResult;
use crate::config::EngineConfig;
use crate::error::{OciError, Result};
use crate::native::{CommitMode, StatementType, StmtHandle};
use crate::protocol::{FetchAllResult, FetchStyle, ParamValue, ParameterContainer, Row, Value};
use std::sync::Arc;

/// Parameters handed to [`Statement::execute`].
#[derive(Debug, Clone, Default)]
pub enum ExecuteParams {
    #[default]
    None,
    /// Raw values merged into the statement's container.
    Values(Vec<(String, ParamValue)>),
    /// Adopted when the statement has no container yet.
    Container(ParameterContainer),
}

impl From<()> for ExecuteParams {
    fn from(_: ()) -> Self {
        ExecuteParams::None
    }
}

impl From<ParameterContainer> for ExecuteParams {
    fn from(container: ParameterContainer) -> Self {
        ExecuteParams::Container(container)
    }
}

impl<K: AsRef<str>, V: Into<ParamValue>> From<Vec<(K, V)>> for ExecuteParams {
    fn from(values: Vec<(K, V)>) -> Self {
        ExecuteParams::Values(
            values
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.into()))
                .collect(),
        )
    }
}

/// One server-side statement: prepare, bind, execute, fetch.
///
/// The statement owns its native handle and every ref-cursor produced by
/// binding until a fetch consumes it. Both are released exactly once, by
/// [`Statement::close_cursor`] or on drop. Not meant to be shared between
/// threads without external locking.
pub struct Statement {
    conn: Arc<OciConnection>,
    config: EngineConfig,
    sql: Option<String>,
    resource: Option<StmtHandle>,
    parameters: Option<ParameterContainer>,
    cursors: CursorRegistry,
}

impl Statement {
    pub fn new(conn: Arc<OciConnection>) -> Self {
        Self::with_config(conn, EngineConfig::default())
    }

    pub fn with_config(conn: Arc<OciConnection>, config: EngineConfig) -> Self {
        Self {
            conn,
            config,
            sql: None,
            resource: None,
            parameters: None,
            cursors: CursorRegistry::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn connection(&self) -> &Arc<OciConnection> {
        &self.conn
    }

    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    pub fn set_sql(&mut self, sql: impl Into<String>) -> &mut Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn set_parameter_container(&mut self, container: ParameterContainer) -> &mut Self {
        self.parameters = Some(container);
        self
    }

    pub fn parameter_container(&self) -> Option<&ParameterContainer> {
        self.parameters.as_ref()
    }

    pub fn parameter_container_mut(&mut self) -> &mut ParameterContainer {
        self.parameters.get_or_insert_with(ParameterContainer::new)
    }

    pub fn resource(&self) -> Option<StmtHandle> {
        self.resource
    }

    pub fn is_prepared(&self) -> bool {
        self.resource.is_some()
    }

    /// Names of the ref-cursors not yet consumed by a fetch.
    pub fn pending_cursors(&self) -> Vec<String> {
        self.cursors.names()
    }

    /// Adopts a statement handle parsed elsewhere. The statement takes
    /// ownership and releases it on close.
    pub fn set_resource(&mut self, handle: StmtHandle) -> Result<()> {
        if self.resource.is_some() {
            return Err(already_prepared());
        }
        match self.conn.client().statement_type(handle) {
            Ok(StatementType::Unknown) => Err(OciError::InvalidArgument(format!(
                "Invalid resource provided: statement {} has an unknown type",
                handle.id()
            ))),
            Ok(kind) => {
                log::debug!("Adopted statement {} ({:?})", handle.id(), kind);
                self.resource = Some(handle);
                Ok(())
            }
            Err(e) => Err(OciError::InvalidArgument(format!(
                "Invalid resource provided: {}",
                e
            ))),
        }
    }

    /// Parses `sql`, or the stored SQL when `None`, into a native handle.
    pub fn prepare(&mut self, sql: Option<&str>) -> Result<()> {
        if self.resource.is_some() {
            return Err(already_prepared());
        }

        let text = sql.or(self.sql.as_deref()).unwrap_or("").to_string();
        let handle = self
            .conn
            .client()
            .parse(self.conn.handle(), &text)
            .map_err(|e| OciError::InvalidQuery {
                message: format!("Statement couldn't be produced with sql: {}", text),
                native: Some(e),
            })?;

        log::debug!("Prepared statement {}: {}", handle.id(), text);
        self.sql = Some(text);
        self.resource = Some(handle);
        Ok(())
    }

    /// Binds the parameter container and executes, preparing first if needed.
    ///
    /// The commit mode follows the connection: no auto-commit inside a
    /// transaction, commit-on-success outside one. A failed execute leaves
    /// the statement prepared.
    pub fn execute(&mut self, params: impl Into<ExecuteParams>) -> Result<StatementResult<'_>> {
        if self.resource.is_none() {
            self.prepare(None)?;
        }
        let handle = self.resource.ok_or_else(|| {
            OciError::Internal("statement handle missing after prepare".to_string())
        })?;

        match params.into() {
            ExecuteParams::None => {}
            ExecuteParams::Container(container) => {
                if self.parameters.is_some() {
                    log::warn!(
                        "Statement {} already has a parameter container; ignoring the new one",
                        handle.id()
                    );
                } else {
                    self.parameters = Some(container);
                }
            }
            ExecuteParams::Values(values) => {
                self.parameter_container_mut().merge_values(values);
            }
        }

        let client = Arc::clone(self.conn.client());
        let mut scratch = match self.parameters.as_ref().filter(|p| !p.is_empty()) {
            Some(params) => TypeBinder::new(client.as_ref(), self.conn.handle(), &self.config)
                .bind(handle, params, &mut self.cursors)?,
            None => Default::default(),
        };

        let mode = CommitMode::for_transaction(self.conn.in_transaction());
        log::debug!("Executing statement {} with {:?}", handle.id(), mode);
        let outcome = client.execute(handle, mode);
        scratch.release(client.as_ref());

        outcome.map_err(|e| OciError::Runtime {
            message: e.message.clone(),
            native: Some(e),
        })?;
        Ok(StatementResult::new(self, handle))
    }

    /// Resolves the row source for a fetch.
    ///
    /// Without registered ref-cursors this is the statement's own handle.
    /// Otherwise the named cursor (or the first registered one) is executed,
    /// removed from the registry and handed to the caller. A name that was
    /// already fetched is invalid until it is bound again.
    pub fn get_cursor(&mut self, name: Option<&str>) -> Result<ActiveCursor> {
        let consumed = name.is_some_and(|n| self.cursors.was_consumed(n));
        if self.cursors.is_empty() && !consumed {
            return self.resource.map(ActiveCursor::Statement).ok_or_else(|| {
                OciError::CursorNotFound("statement has not been prepared".to_string())
            });
        }

        let (name, handle) = self.cursors.take(name)?;
        let mode = CommitMode::for_transaction(self.conn.in_transaction());
        RefCursor::open(Arc::clone(self.conn.client()), name, handle, mode).map(ActiveCursor::Ref)
    }

    /// Releases every outstanding ref-cursor, then the statement handle.
    ///
    /// Returns `Ok(false)` when there was nothing to release. Every release
    /// is attempted; the first failure is reported once all have run.
    pub fn close_cursor(&mut self) -> Result<bool> {
        let handle = match self.resource.take() {
            Some(handle) => handle,
            None => return Ok(false),
        };

        let client = Arc::clone(self.conn.client());
        let mut first_error = None;
        for (name, cursor) in self.cursors.drain() {
            if let Err(e) = client.free_statement(cursor) {
                log::warn!("Failed to release cursor {}: {}", name, e);
                first_error.get_or_insert(OciError::runtime(
                    format!("Failed to release cursor {}", name),
                    e,
                ));
            }
        }
        if let Err(e) = client.free_statement(handle) {
            log::warn!("Failed to release statement {}: {}", handle.id(), e);
            first_error.get_or_insert(OciError::runtime("Failed to release statement", e));
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                log::debug!("Closed statement {}", handle.id());
                Ok(true)
            }
        }
    }

    /// Next row from the resolved cursor, `None` when exhausted or when the
    /// statement was never prepared.
    pub fn fetch(
        &mut self,
        style: Option<FetchStyle>,
        cursor: Option<&str>,
    ) -> Result<Option<Row>> {
        if self.resource.is_none() {
            return Ok(None);
        }
        let style = style.unwrap_or(self.config.default_fetch_style);
        if style == FetchStyle::Column {
            return Err(OciError::InvalidQuery {
                message: "Invalid fetch mode specified".to_string(),
                native: None,
            });
        }

        let active = self.get_cursor(cursor)?;
        fetch::fetch_row(self.conn.client().as_ref(), active.handle()?, style)
    }

    /// Every remaining row. `column` is only used by [`FetchStyle::Column`].
    pub fn fetch_all(
        &mut self,
        style: Option<FetchStyle>,
        column: usize,
        cursor: Option<&str>,
    ) -> Result<FetchAllResult> {
        if self.resource.is_none() {
            return Ok(FetchAllResult::Rows(Vec::new()));
        }
        let style = style.unwrap_or(self.config.default_fetch_style);
        if style == FetchStyle::Both {
            return Err(OciError::InvalidQuery {
                message: "Bulk fetch does not support the both style".to_string(),
                native: None,
            });
        }

        let active = self.get_cursor(cursor)?;
        fetch::fetch_all(self.conn.client().as_ref(), active.handle()?, style, column)
    }

    /// Value at 0-based `index` of the current row of the resolved cursor.
    pub fn fetch_column(&mut self, index: usize, cursor: Option<&str>) -> Result<Option<Value>> {
        if self.resource.is_none() {
            return Ok(None);
        }
        let active = self.get_cursor(cursor)?;
        fetch::fetch_column(self.conn.client().as_ref(), active.handle()?, index).map(Some)
    }
}

fn already_prepared() -> OciError {
    OciError::Runtime {
        message: "This statement has already been prepared".to_string(),
        native: None,
    }
}

/// A fresh, unprepared statement with the same SQL and a copy of the
/// parameter container. Cursors are not copied.
impl Clone for Statement {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            config: self.config.clone(),
            sql: self.sql.clone(),
            resource: None,
            parameters: self.parameters.clone(),
            cursors: CursorRegistry::new(),
        }
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        if let Err(e) = self.close_cursor() {
            log::warn!("Statement cleanup failed: {}", e.message());
        }
    }
}
