//! [`OciClient`] over an established `oracle::Connection` (ODPI-C).
//!
//! Handles are keys into a table owned by the client. Query results are
//! buffered when the statement (or ref-cursor) executes, so fetches never
//! hold a borrow of the underlying statement. Opening the connection is the
//! caller's job.

use super::{
    BindType, BindValue, CollectionHandle, CommitMode, ConnectionHandle, FetchOrientation,
    LobHandle, NativeError, NativeResult, OciClient, StatementType, StmtHandle,
};
use crate::engine::OciConnection;
use crate::protocol::Value;
use ::oracle::sql_type::{Clob, Collection, OracleType, RefCursor};
use ::oracle::{Connection, ResultSet, Row, SqlValue, Statement};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

const ORA_FETCH_OUT_OF_SEQUENCE: i32 = 1002;
const ORA_NOT_IN_SELECT_LIST: i32 = 1007;
const ORA_FETCH_BEFORE_EXECUTE: i32 = 24374;
const INVALID_HANDLE: i32 = -2;

/// The only session an [`OracleClient`] serves.
pub const CONNECTION: ConnectionHandle = ConnectionHandle(1);

fn native_error(err: ::oracle::Error) -> NativeError {
    match err.db_error() {
        Some(db) => NativeError::new(db.code(), db.message()),
        None => NativeError::new(0, err.to_string()),
    }
}

fn invalid_handle(kind: &str, id: u64) -> NativeError {
    NativeError::new(INVALID_HANDLE, format!("invalid {} handle {}", kind, id))
}

fn to_value(sql: &SqlValue) -> ::oracle::Result<Value> {
    if sql.is_null()? {
        return Ok(Value::Null);
    }
    let value = match sql.oracle_type()? {
        // Unconstrained NUMBER columns report no scale; integral values stay integers.
        OracleType::Number(..) | OracleType::Int64 => {
            let text: String = sql.get()?;
            match text.parse::<i64>() {
                Ok(n) => Value::Integer(n),
                Err(_) => Value::Float(sql.get()?),
            }
        }
        OracleType::Float(_) | OracleType::BinaryFloat | OracleType::BinaryDouble => {
            Value::Float(sql.get()?)
        }
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => Value::Binary(sql.get()?),
        _ => Value::Text(sql.get()?),
    };
    Ok(value)
}

fn statement_type(kind: ::oracle::StatementType) -> StatementType {
    use ::oracle::StatementType as Ora;
    match kind {
        Ora::Select => StatementType::Select,
        Ora::Update => StatementType::Update,
        Ora::Delete => StatementType::Delete,
        Ora::Insert => StatementType::Insert,
        Ora::Create => StatementType::Create,
        Ora::Drop => StatementType::Drop,
        Ora::Alter => StatementType::Alter,
        Ora::Begin => StatementType::Begin,
        Ora::Declare => StatementType::Declare,
        Ora::Call => StatementType::Call,
        _ => StatementType::Unknown,
    }
}

/// Rows produced by one execute, consumed front to back.
#[derive(Debug, Default, Clone, PartialEq)]
struct RowBuffer {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
    fetched: u64,
}

impl RowBuffer {
    fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            current: None,
            fetched: 0,
        }
    }

    fn from_result_set(result: ResultSet<'_, Row>) -> NativeResult<Self> {
        let columns = result
            .column_info()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let mut rows = Vec::new();
        for row in result {
            let row = row.map_err(native_error)?;
            let values = row
                .sql_values()
                .iter()
                .map(to_value)
                .collect::<::oracle::Result<Vec<_>>>()
                .map_err(native_error)?;
            rows.push(values);
        }
        Ok(Self::new(columns, rows))
    }

    fn next_row(&mut self) -> Option<Vec<Value>> {
        let row = self.rows.pop_front();
        if row.is_some() {
            self.fetched += 1;
        }
        self.current = row.clone();
        row
    }

    fn drain(&mut self, orientation: FetchOrientation) -> Vec<Vec<Value>> {
        let rows: Vec<Vec<Value>> = self.rows.drain(..).collect();
        self.fetched += rows.len() as u64;
        self.current = None;
        match orientation {
            FetchOrientation::ByRow => rows,
            FetchOrientation::ByColumn => {
                let mut columns = vec![Vec::with_capacity(rows.len()); self.columns.len()];
                for row in rows {
                    for (column, value) in columns.iter_mut().zip(row) {
                        column.push(value);
                    }
                }
                columns
            }
        }
    }

    fn column_value(&self, position: usize) -> NativeResult<Value> {
        let row = self.current.as_ref().ok_or_else(|| {
            NativeError::new(ORA_FETCH_OUT_OF_SEQUENCE, "fetch out of sequence")
        })?;
        position
            .checked_sub(1)
            .and_then(|idx| row.get(idx))
            .cloned()
            .ok_or_else(|| {
                NativeError::new(
                    ORA_NOT_IN_SELECT_LIST,
                    format!("column {} is not in the select list", position),
                )
            })
    }
}

enum Slot {
    Statement {
        stmt: Statement,
        /// Ref-cursor binds, filled in by the next execute.
        cursors: Vec<(String, StmtHandle)>,
        rows: Option<RowBuffer>,
        affected: u64,
    },
    Cursor {
        cursor: Option<RefCursor>,
        rows: Option<RowBuffer>,
    },
}

impl Slot {
    fn rows_mut(&mut self) -> NativeResult<&mut RowBuffer> {
        let rows = match self {
            Slot::Statement { rows, .. } | Slot::Cursor { rows, .. } => rows,
        };
        rows.as_mut()
            .ok_or_else(|| NativeError::new(ORA_FETCH_BEFORE_EXECUTE, "fetch before execute"))
    }
}

struct OracleState {
    conn: Connection,
    next_id: u64,
    slots: HashMap<u64, Slot>,
    collections: HashMap<u64, Collection>,
    lobs: HashMap<u64, Clob>,
}

impl OracleState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn slot_mut(&mut self, stmt: StmtHandle) -> NativeResult<&mut Slot> {
        self.slots
            .get_mut(&stmt.id())
            .ok_or_else(|| invalid_handle("statement", stmt.id()))
    }
}

/// Client library backed by the `oracle` crate.
pub struct OracleClient {
    state: Mutex<OracleState>,
}

impl OracleClient {
    pub fn new(conn: Connection) -> Self {
        Self {
            state: Mutex::new(OracleState {
                conn,
                next_id: 0,
                slots: HashMap::new(),
                collections: HashMap::new(),
                lobs: HashMap::new(),
            }),
        }
    }

    /// Wraps `conn` into an engine connection.
    pub fn connection(conn: Connection) -> Arc<OciConnection> {
        OciConnection::new(Arc::new(Self::new(conn)), CONNECTION)
    }

    fn lock(&self) -> MutexGuard<'_, OracleState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            log::error!("OracleClient mutex poisoned");
            poisoned.into_inner()
        })
    }

    fn check_conn(conn: ConnectionHandle) -> NativeResult<()> {
        if conn == CONNECTION {
            Ok(())
        } else {
            Err(invalid_handle("connection", conn.id()))
        }
    }
}

impl OciClient for OracleClient {
    fn parse(&self, conn: ConnectionHandle, sql: &str) -> NativeResult<StmtHandle> {
        Self::check_conn(conn)?;
        let mut state = self.lock();
        let stmt = state.conn.statement(sql).build().map_err(native_error)?;
        let id = state.next_id();
        state.slots.insert(
            id,
            Slot::Statement {
                stmt,
                cursors: Vec::new(),
                rows: None,
                affected: 0,
            },
        );
        Ok(StmtHandle(id))
    }

    fn statement_type(&self, stmt: StmtHandle) -> NativeResult<StatementType> {
        match self.lock().slot_mut(stmt)? {
            Slot::Statement { stmt, .. } => Ok(statement_type(stmt.statement_type())),
            Slot::Cursor { .. } => Ok(StatementType::Select),
        }
    }

    fn new_collection(
        &self,
        conn: ConnectionHandle,
        type_name: &str,
    ) -> NativeResult<CollectionHandle> {
        Self::check_conn(conn)?;
        let mut state = self.lock();
        let collection = state
            .conn
            .object_type(type_name)
            .and_then(|t| t.new_collection())
            .map_err(native_error)?;
        let id = state.next_id();
        state.collections.insert(id, collection);
        Ok(CollectionHandle(id))
    }

    fn collection_append(&self, coll: CollectionHandle, element: &Value) -> NativeResult<()> {
        let mut state = self.lock();
        let collection = state
            .collections
            .get_mut(&coll.id())
            .ok_or_else(|| invalid_handle("collection", coll.id()))?;
        let pushed = match element {
            Value::Null => collection.push(&None::<String>),
            Value::Integer(n) => collection.push(n),
            Value::Float(f) => collection.push(f),
            Value::Text(s) => collection.push(s),
            Value::Binary(b) => collection.push(b),
        };
        pushed.map_err(native_error)
    }

    fn free_collection(&self, coll: CollectionHandle) -> NativeResult<()> {
        self.lock()
            .collections
            .remove(&coll.id())
            .map(drop)
            .ok_or_else(|| invalid_handle("collection", coll.id()))
    }

    fn new_cursor(&self, conn: ConnectionHandle) -> NativeResult<StmtHandle> {
        Self::check_conn(conn)?;
        let mut state = self.lock();
        let id = state.next_id();
        state.slots.insert(
            id,
            Slot::Cursor {
                cursor: None,
                rows: None,
            },
        );
        Ok(StmtHandle(id))
    }

    fn new_temporary_clob(&self, conn: ConnectionHandle, data: &str) -> NativeResult<LobHandle> {
        Self::check_conn(conn)?;
        let mut state = self.lock();
        let mut clob = Clob::new(&state.conn).map_err(native_error)?;
        clob.write_all(data.as_bytes())
            .map_err(|e| NativeError::new(0, format!("Failed to write CLOB: {}", e)))?;
        let id = state.next_id();
        state.lobs.insert(id, clob);
        Ok(LobHandle(id))
    }

    fn free_lob(&self, lob: LobHandle) -> NativeResult<()> {
        self.lock()
            .lobs
            .remove(&lob.id())
            .map(drop)
            .ok_or_else(|| invalid_handle("LOB", lob.id()))
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
        let OracleState {
            slots,
            collections,
            lobs,
            ..
        } = &mut *state;
        let (inner, cursors) = match slots.get_mut(&stmt.id()) {
            Some(Slot::Statement { stmt, cursors, .. }) => (stmt, cursors),
            _ => return Err(invalid_handle("statement", stmt.id())),
        };
        let name = name.trim_start_matches(':');
        log::trace!("Binding {} as {:?}", name, bind_type);

        let bound = match value {
            BindValue::Null => inner.bind(name, &None::<String>),
            BindValue::Text(s) if max_length > 0 => {
                let sized = OracleType::Varchar2(u32::try_from(max_length).unwrap_or(u32::MAX));
                inner.bind(name, &(s, &sized))
            }
            BindValue::Text(s) => inner.bind(name, s),
            BindValue::Integer(n) => inner.bind(name, n),
            BindValue::Binary(b) => inner.bind(name, b),
            BindValue::Collection(h) => {
                let collection = collections
                    .get(&h.id())
                    .ok_or_else(|| invalid_handle("collection", h.id()))?;
                inner.bind(name, collection)
            }
            BindValue::Lob(h) => {
                let clob = lobs
                    .get(&h.id())
                    .ok_or_else(|| invalid_handle("LOB", h.id()))?;
                inner.bind(name, clob)
            }
            BindValue::Cursor(h) => {
                cursors.retain(|(n, _)| n != name);
                cursors.push((name.to_string(), *h));
                inner.bind(name, &OracleType::RefCursor)
            }
        };
        bound.map_err(native_error)
    }

    fn execute(&self, stmt: StmtHandle, mode: CommitMode) -> NativeResult<()> {
        let mut state = self.lock();
        let OracleState { conn, slots, .. } = &mut *state;
        conn.set_autocommit(mode == CommitMode::CommitOnSuccess);

        let mut opened = Vec::new();
        match slots
            .get_mut(&stmt.id())
            .ok_or_else(|| invalid_handle("statement", stmt.id()))?
        {
            Slot::Statement {
                stmt: inner,
                cursors,
                rows,
                affected,
            } => {
                if inner.is_query() {
                    let result = inner.query(&[]).map_err(native_error)?;
                    *rows = Some(RowBuffer::from_result_set(result)?);
                    *affected = 0;
                } else {
                    inner.execute(&[]).map_err(native_error)?;
                    *rows = None;
                    *affected = inner.row_count().map_err(native_error)?;
                    for (name, handle) in cursors.iter() {
                        let cursor: RefCursor =
                            inner.bind_value(name.as_str()).map_err(native_error)?;
                        opened.push((*handle, cursor));
                    }
                }
            }
            Slot::Cursor { cursor, rows } => {
                let cursor = cursor.as_mut().ok_or_else(|| {
                    NativeError::new(
                        ORA_FETCH_BEFORE_EXECUTE,
                        "cursor was not opened by a statement",
                    )
                })?;
                let result = cursor.query().map_err(native_error)?;
                *rows = Some(RowBuffer::from_result_set(result)?);
            }
        }

        for (handle, opened_cursor) in opened {
            // Cursors freed before their parent ran are simply skipped.
            if let Some(Slot::Cursor { cursor, rows }) = slots.get_mut(&handle.id()) {
                *cursor = Some(opened_cursor);
                *rows = None;
            }
        }
        Ok(())
    }

    fn column_names(&self, stmt: StmtHandle) -> NativeResult<Vec<String>> {
        let mut state = self.lock();
        let columns = match state.slot_mut(stmt)? {
            Slot::Statement { rows, .. } | Slot::Cursor { rows, .. } => rows
                .as_ref()
                .map(|r| r.columns.clone())
                .unwrap_or_default(),
        };
        Ok(columns)
    }

    fn num_rows(&self, stmt: StmtHandle) -> NativeResult<u64> {
        let mut state = self.lock();
        match state.slot_mut(stmt)? {
            Slot::Statement {
                rows: Some(rows), ..
            }
            | Slot::Cursor {
                rows: Some(rows), ..
            } => Ok(rows.fetched),
            Slot::Statement { affected, .. } => Ok(*affected),
            Slot::Cursor { .. } => Ok(0),
        }
    }

    fn fetch_row(&self, stmt: StmtHandle) -> NativeResult<Option<Vec<Value>>> {
        let mut state = self.lock();
        Ok(state.slot_mut(stmt)?.rows_mut()?.next_row())
    }

    fn fetch_all(
        &self,
        stmt: StmtHandle,
        orientation: FetchOrientation,
    ) -> NativeResult<Vec<Vec<Value>>> {
        let mut state = self.lock();
        Ok(state.slot_mut(stmt)?.rows_mut()?.drain(orientation))
    }

    fn column_value(&self, stmt: StmtHandle, position: usize) -> NativeResult<Value> {
        let mut state = self.lock();
        state.slot_mut(stmt)?.rows_mut()?.column_value(position)
    }

    fn free_statement(&self, stmt: StmtHandle) -> NativeResult<()> {
        self.lock()
            .slots
            .remove(&stmt.id())
            .map(drop)
            .ok_or_else(|| invalid_handle("statement", stmt.id()))
    }

    fn commit(&self, conn: ConnectionHandle) -> NativeResult<()> {
        Self::check_conn(conn)?;
        self.lock().conn.commit().map_err(native_error)
    }

    fn rollback(&self, conn: ConnectionHandle) -> NativeResult<()> {
        Self::check_conn(conn)?;
        self.lock().conn.rollback().map_err(native_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> RowBuffer {
        RowBuffer::new(
            vec!["ID".to_string(), "NAME".to_string()],
            vec![
                vec![Value::Integer(1), Value::from("ann")],
                vec![Value::Integer(2), Value::from("bob")],
            ],
        )
    }

    #[test]
    fn test_row_buffer_fetches_in_order() {
        let mut buffer = users();
        assert_eq!(buffer.next_row().unwrap()[1], Value::from("ann"));
        assert_eq!(buffer.column_value(1).unwrap(), Value::Integer(1));
        assert_eq!(buffer.next_row().unwrap()[1], Value::from("bob"));
        assert_eq!(buffer.next_row(), None);
        assert_eq!(buffer.fetched, 2);
        assert_eq!(
            buffer.column_value(1).unwrap_err().code,
            ORA_FETCH_OUT_OF_SEQUENCE
        );
    }

    #[test]
    fn test_row_buffer_column_value_bounds() {
        let mut buffer = users();
        buffer.next_row();
        assert_eq!(buffer.column_value(0).unwrap_err().code, ORA_NOT_IN_SELECT_LIST);
        assert_eq!(buffer.column_value(3).unwrap_err().code, ORA_NOT_IN_SELECT_LIST);
    }

    #[test]
    fn test_row_buffer_drain_by_column() {
        let mut buffer = users();
        buffer.next_row();
        let columns = buffer.drain(FetchOrientation::ByColumn);
        assert_eq!(
            columns,
            vec![vec![Value::Integer(2)], vec![Value::from("bob")]]
        );
        assert_eq!(buffer.fetched, 2);
        assert!(buffer.drain(FetchOrientation::ByRow).is_empty());
    }

    #[test]
    fn test_statement_type_mapping() {
        assert_eq!(
            statement_type(::oracle::StatementType::Begin),
            StatementType::Begin
        );
        assert_eq!(
            statement_type(::oracle::StatementType::Select),
            StatementType::Select
        );
        assert_eq!(
            statement_type(::oracle::StatementType::Commit),
            StatementType::Unknown
        );
    }
}
