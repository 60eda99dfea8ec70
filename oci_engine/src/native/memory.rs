//! Scriptable in-memory [`OciClient`].
//!
//! Query outcomes are registered per SQL text with [`MemoryClient::on_query`].
//! Every native call is recorded as a [`ClientEvent`], handles are tracked so
//! a second release of the same handle fails like it would against a real
//! server, and parse/execute/fetch failures can be injected by SQL fragment.

use super::{
    BindType, BindValue, CollectionHandle, CommitMode, ConnectionHandle, FetchOrientation,
    LobHandle, NativeError, NativeResult, OciClient, StatementType, StmtHandle,
};
use crate::protocol::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

const ORA_INVALID_SQL: i32 = 900;
const ORA_FETCH_OUT_OF_SEQUENCE: i32 = 1002;
const ORA_NOT_IN_SELECT_LIST: i32 = 1007;
const ORA_TYPE_NOT_FOUND: i32 = 22303;
const ORA_NOT_EXECUTED: i32 = 24338;
const ORA_FETCH_BEFORE_EXECUTE: i32 = 24374;
const INVALID_HANDLE: i32 = -2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new<S: Into<String>>(columns: Vec<S>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }
}

/// What a scripted query produces when executed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub result: Option<ResultSet>,
    pub affected_rows: u64,
    pub cursors: Vec<(String, ResultSet)>,
}

impl QueryOutput {
    pub fn rows<S: Into<String>>(columns: Vec<S>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            result: Some(ResultSet::new(columns, rows)),
            ..Self::default()
        }
    }

    pub fn affected(n: u64) -> Self {
        Self {
            affected_rows: n,
            ..Self::default()
        }
    }

    /// Populates the ref-cursor bound under `bind_name`.
    pub fn with_cursor(mut self, bind_name: &str, result: ResultSet) -> Self {
        self.cursors.push((bind_name.to_string(), result));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundVar {
    pub name: String,
    pub value: BindValue,
    pub max_length: i64,
    pub bind_type: BindType,
}

/// Snapshot handed to query handlers.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub sql: String,
    pub binds: Vec<BoundVar>,
    pub mode: CommitMode,
    collections: HashMap<CollectionHandle, Vec<Value>>,
    lobs: HashMap<LobHandle, String>,
}

impl ExecContext {
    pub fn bind(&self, name: &str) -> Option<&BoundVar> {
        self.binds.iter().find(|b| b.name == name)
    }

    /// Scalar value of a bind; LOB descriptors resolve to their content.
    pub fn value(&self, name: &str) -> Option<Value> {
        match &self.bind(name)?.value {
            BindValue::Null => Some(Value::Null),
            BindValue::Text(s) => Some(Value::Text(s.clone())),
            BindValue::Integer(n) => Some(Value::Integer(*n)),
            BindValue::Binary(b) => Some(Value::Binary(b.clone())),
            BindValue::Lob(h) => self.lobs.get(h).cloned().map(Value::Text),
            BindValue::Collection(_) | BindValue::Cursor(_) => None,
        }
    }

    pub fn collection(&self, name: &str) -> Option<Vec<Value>> {
        match &self.bind(name)?.value {
            BindValue::Collection(h) => self.collections.get(h).cloned(),
            _ => None,
        }
    }
}

type QueryHandler = Arc<dyn Fn(&ExecContext) -> NativeResult<QueryOutput> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Parse { stmt: StmtHandle, sql: String },
    NewCursor(StmtHandle),
    NewCollection { coll: CollectionHandle, type_name: String },
    NewLob(LobHandle),
    Bind { stmt: StmtHandle, bind: BoundVar },
    Execute { stmt: StmtHandle, mode: CommitMode },
    FreeStatement(StmtHandle),
    FreeCollection(CollectionHandle),
    FreeLob(LobHandle),
    Commit(ConnectionHandle),
    Rollback(ConnectionHandle),
}

#[derive(Debug, Default)]
struct StmtState {
    /// `None` for ref-cursors allocated with `new_cursor`.
    sql: Option<String>,
    binds: Vec<BoundVar>,
    /// Rows a parent execute produced for this cursor, not yet executed.
    pending: Option<ResultSet>,
    result: Option<ResultSet>,
    position: usize,
    current: Option<Vec<Value>>,
    affected: u64,
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    statements: HashMap<StmtHandle, StmtState>,
    collections: HashMap<CollectionHandle, (String, Vec<Value>)>,
    lobs: HashMap<LobHandle, String>,
    collection_types: HashSet<String>,
    handlers: HashMap<String, QueryHandler>,
    parse_failures: Vec<(String, NativeError)>,
    execute_failures: Vec<(String, NativeError)>,
    fetch_failures: Vec<(String, NativeError)>,
    events: Vec<ClientEvent>,
}

impl MemoryState {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn stmt(&self, stmt: StmtHandle) -> NativeResult<&StmtState> {
        self.statements.get(&stmt).ok_or_else(|| invalid_handle(stmt.0))
    }

    fn stmt_mut(&mut self, stmt: StmtHandle) -> NativeResult<&mut StmtState> {
        self.statements
            .get_mut(&stmt)
            .ok_or_else(|| invalid_handle(stmt.0))
    }

    fn injected(failures: &[(String, NativeError)], sql: Option<&str>) -> Option<NativeError> {
        let sql = sql?;
        failures
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, err)| err.clone())
    }
}

fn invalid_handle(id: u64) -> NativeError {
    NativeError::new(INVALID_HANDLE, format!("invalid handle {}", id))
}

pub struct MemoryClient {
    state: Mutex<MemoryState>,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        state.collection_types.insert("T_ARRNUM".to_string());
        state.collection_types.insert("T_ARRCHAR".to_string());
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            log::error!("MemoryClient mutex poisoned");
            poisoned.into_inner()
        })
    }

    /// Scripts the outcome of executing exactly `sql` (surrounding whitespace ignored).
    pub fn on_query<F>(&self, sql: &str, handler: F)
    where
        F: Fn(&ExecContext) -> NativeResult<QueryOutput> + Send + Sync + 'static,
    {
        self.lock()
            .handlers
            .insert(sql.trim().to_string(), Arc::new(handler));
    }

    pub fn register_collection_type(&self, type_name: &str) {
        self.lock().collection_types.insert(type_name.to_string());
    }

    pub fn fail_parse(&self, sql_fragment: &str, err: NativeError) {
        self.lock()
            .parse_failures
            .push((sql_fragment.to_string(), err));
    }

    pub fn fail_execute(&self, sql_fragment: &str, err: NativeError) {
        self.lock()
            .execute_failures
            .push((sql_fragment.to_string(), err));
    }

    pub fn fail_fetch(&self, sql_fragment: &str, err: NativeError) {
        self.lock()
            .fetch_failures
            .push((sql_fragment.to_string(), err));
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.lock().events.clone()
    }

    pub fn parse_count(&self) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|e| matches!(e, ClientEvent::Parse { .. }))
            .count()
    }

    pub fn executions(&self) -> Vec<(StmtHandle, CommitMode)> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                ClientEvent::Execute { stmt, mode } => Some((*stmt, *mode)),
                _ => None,
            })
            .collect()
    }

    pub fn binds(&self, stmt: StmtHandle) -> Vec<BoundVar> {
        self.lock()
            .statements
            .get(&stmt)
            .map(|s| s.binds.clone())
            .unwrap_or_default()
    }

    pub fn freed_statements(&self) -> Vec<StmtHandle> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                ClientEvent::FreeStatement(h) => Some(*h),
                _ => None,
            })
            .collect()
    }

    pub fn live_statements(&self) -> usize {
        self.lock().statements.len()
    }

    pub fn live_collections(&self) -> usize {
        self.lock().collections.len()
    }

    pub fn live_lobs(&self) -> usize {
        self.lock().lobs.len()
    }

    pub fn is_live(&self, stmt: StmtHandle) -> bool {
        self.lock().statements.contains_key(&stmt)
    }
}

impl OciClient for MemoryClient {
    fn parse(&self, _conn: ConnectionHandle, sql: &str) -> NativeResult<StmtHandle> {
        let mut state = self.lock();
        if sql.trim().is_empty() {
            return Err(NativeError::new(ORA_INVALID_SQL, "invalid SQL statement"));
        }
        if let Some(err) = MemoryState::injected(&state.parse_failures, Some(sql)) {
            return Err(err);
        }
        let stmt = StmtHandle(state.next());
        state.statements.insert(
            stmt,
            StmtState {
                sql: Some(sql.to_string()),
                ..StmtState::default()
            },
        );
        state.events.push(ClientEvent::Parse {
            stmt,
            sql: sql.to_string(),
        });
        Ok(stmt)
    }

    fn statement_type(&self, stmt: StmtHandle) -> NativeResult<StatementType> {
        let state = self.lock();
        Ok(match &state.stmt(stmt)?.sql {
            Some(sql) => StatementType::from_sql(sql),
            None => StatementType::Select,
        })
    }

    fn new_collection(
        &self,
        _conn: ConnectionHandle,
        type_name: &str,
    ) -> NativeResult<CollectionHandle> {
        let mut state = self.lock();
        if !state.collection_types.contains(type_name) {
            return Err(NativeError::new(
                ORA_TYPE_NOT_FOUND,
                format!("type \"{}\" not found", type_name),
            ));
        }
        let coll = CollectionHandle(state.next());
        state
            .collections
            .insert(coll, (type_name.to_string(), Vec::new()));
        state.events.push(ClientEvent::NewCollection {
            coll,
            type_name: type_name.to_string(),
        });
        Ok(coll)
    }

    fn collection_append(&self, coll: CollectionHandle, element: &Value) -> NativeResult<()> {
        let mut state = self.lock();
        let (_, items) = state
            .collections
            .get_mut(&coll)
            .ok_or_else(|| invalid_handle(coll.0))?;
        items.push(element.clone());
        Ok(())
    }

    fn free_collection(&self, coll: CollectionHandle) -> NativeResult<()> {
        let mut state = self.lock();
        state
            .collections
            .remove(&coll)
            .ok_or_else(|| invalid_handle(coll.0))?;
        state.events.push(ClientEvent::FreeCollection(coll));
        Ok(())
    }

    fn new_cursor(&self, _conn: ConnectionHandle) -> NativeResult<StmtHandle> {
        let mut state = self.lock();
        let stmt = StmtHandle(state.next());
        state.statements.insert(stmt, StmtState::default());
        state.events.push(ClientEvent::NewCursor(stmt));
        Ok(stmt)
    }

    fn new_temporary_clob(&self, _conn: ConnectionHandle, data: &str) -> NativeResult<LobHandle> {
        let mut state = self.lock();
        let lob = LobHandle(state.next());
        state.lobs.insert(lob, data.to_string());
        state.events.push(ClientEvent::NewLob(lob));
        Ok(lob)
    }

    fn free_lob(&self, lob: LobHandle) -> NativeResult<()> {
        let mut state = self.lock();
        state.lobs.remove(&lob).ok_or_else(|| invalid_handle(lob.0))?;
        state.events.push(ClientEvent::FreeLob(lob));
        Ok(())
    }

    fn bind_by_name(
        &self,
        stmt: StmtHandle,
        name: &str,
        value: &BindValue,
        max_length: i64,
        bind_type: BindType,
    ) -> NativeResult<()> {
        let mut state = self.lock();
        let bind = BoundVar {
            name: name.to_string(),
            value: value.clone(),
            max_length,
            bind_type,
        };
        let entry = state.stmt_mut(stmt)?;
        entry.binds.retain(|b| b.name != name);
        entry.binds.push(bind.clone());
        state.events.push(ClientEvent::Bind { stmt, bind });
        Ok(())
    }

    fn execute(&self, stmt: StmtHandle, mode: CommitMode) -> NativeResult<()> {
        let mut state = self.lock();
        state.events.push(ClientEvent::Execute { stmt, mode });

        let sql = match state.stmt(stmt)?.sql.clone() {
            Some(sql) => sql,
            None => {
                // Ref-cursor: exposes whatever its parent execute produced.
                let cursor = state.stmt_mut(stmt)?;
                let result = cursor.pending.take().ok_or_else(|| {
                    NativeError::new(ORA_NOT_EXECUTED, "cursor was not opened by a statement")
                })?;
                cursor.result = Some(result);
                cursor.position = 0;
                cursor.current = None;
                return Ok(());
            }
        };

        if let Some(err) = MemoryState::injected(&state.execute_failures, Some(&sql)) {
            return Err(err);
        }

        let handler = state.handlers.get(sql.trim()).cloned();
        let binds = state.stmt(stmt)?.binds.clone();
        let ctx = ExecContext {
            sql: sql.clone(),
            mode,
            collections: state
                .collections
                .iter()
                .map(|(h, (_, items))| (*h, items.clone()))
                .collect(),
            lobs: state.lobs.clone(),
            binds,
        };
        drop(state);

        let output = match handler {
            Some(handler) => handler(&ctx)?,
            None => match StatementType::from_sql(&sql) {
                StatementType::Select => QueryOutput::rows(Vec::<String>::new(), Vec::new()),
                _ => QueryOutput::default(),
            },
        };

        let mut state = self.lock();
        for (bind_name, result) in output.cursors {
            let target = ctx.bind(&bind_name).and_then(|b| match b.value {
                BindValue::Cursor(h) => Some(h),
                _ => None,
            });
            if let Some(cursor) = target {
                state.stmt_mut(cursor)?.pending = Some(result);
            }
        }
        let entry = state.stmt_mut(stmt)?;
        entry.result = output.result;
        entry.affected = output.affected_rows;
        entry.position = 0;
        entry.current = None;
        Ok(())
    }

    fn column_names(&self, stmt: StmtHandle) -> NativeResult<Vec<String>> {
        let state = self.lock();
        match &state.stmt(stmt)?.result {
            Some(result) => Ok(result.columns.clone()),
            None => Ok(Vec::new()),
        }
    }

    fn num_rows(&self, stmt: StmtHandle) -> NativeResult<u64> {
        let state = self.lock();
        let entry = state.stmt(stmt)?;
        Ok(match &entry.result {
            Some(_) => entry.position as u64,
            None => entry.affected,
        })
    }

    fn fetch_row(&self, stmt: StmtHandle) -> NativeResult<Option<Vec<Value>>> {
        let mut state = self.lock();
        let sql = state.stmt(stmt)?.sql.as_deref();
        if let Some(err) = MemoryState::injected(&state.fetch_failures, sql) {
            return Err(err);
        }
        let entry = state.stmt_mut(stmt)?;
        let result = entry.result.as_ref().ok_or_else(|| {
            NativeError::new(ORA_FETCH_BEFORE_EXECUTE, "fetch before execute")
        })?;
        let row = result.rows.get(entry.position).cloned();
        if row.is_some() {
            entry.position += 1;
        }
        entry.current = row.clone();
        Ok(row)
    }

    fn fetch_all(
        &self,
        stmt: StmtHandle,
        orientation: FetchOrientation,
    ) -> NativeResult<Vec<Vec<Value>>> {
        let mut state = self.lock();
        let sql = state.stmt(stmt)?.sql.as_deref();
        if let Some(err) = MemoryState::injected(&state.fetch_failures, sql) {
            return Err(err);
        }
        let entry = state.stmt_mut(stmt)?;
        let result = entry.result.as_ref().ok_or_else(|| {
            NativeError::new(ORA_FETCH_BEFORE_EXECUTE, "fetch before execute")
        })?;
        let rows: Vec<Vec<Value>> = result.rows[entry.position.min(result.rows.len())..].to_vec();
        let width = result.columns.len();
        entry.position = result.rows.len();
        entry.current = None;

        Ok(match orientation {
            FetchOrientation::ByRow => rows,
            FetchOrientation::ByColumn => (0..width)
                .map(|col| {
                    rows.iter()
                        .map(|row| row.get(col).cloned().unwrap_or(Value::Null))
                        .collect()
                })
                .collect(),
        })
    }

    fn column_value(&self, stmt: StmtHandle, position: usize) -> NativeResult<Value> {
        let state = self.lock();
        let current = state.stmt(stmt)?.current.as_ref().ok_or_else(|| {
            NativeError::new(ORA_FETCH_OUT_OF_SEQUENCE, "fetch out of sequence")
        })?;
        position
            .checked_sub(1)
            .and_then(|idx| current.get(idx))
            .cloned()
            .ok_or_else(|| NativeError::new(ORA_NOT_IN_SELECT_LIST, "variable not in select list"))
    }

    fn free_statement(&self, stmt: StmtHandle) -> NativeResult<()> {
        let mut state = self.lock();
        state
            .statements
            .remove(&stmt)
            .ok_or_else(|| invalid_handle(stmt.0))?;
        state.events.push(ClientEvent::FreeStatement(stmt));
        Ok(())
    }

    fn commit(&self, conn: ConnectionHandle) -> NativeResult<()> {
        self.lock().events.push(ClientEvent::Commit(conn));
        Ok(())
    }

    fn rollback(&self, conn: ConnectionHandle) -> NativeResult<()> {
        self.lock().events.push(ClientEvent::Rollback(conn));
        Ok(())
    }
}
