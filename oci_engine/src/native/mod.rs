//! Seam to the Oracle client library.
//!
//! The engine never talks to the wire itself. Everything it needs from the
//! client library (parsing, binding, executing, fetching, releasing) goes
//! through [`OciClient`], and every resource the library hands out is an
//! opaque, copyable handle. Releasing a handle is the owner's job and must
//! happen exactly once.

#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;
#[cfg(feature = "oracle")]
pub mod oracle;

use crate::protocol::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub fn id(self) -> u64 {
                self.0
            }
        }
    };
}

native_handle!(
    /// Session the statements are parsed against.
    ConnectionHandle
);
native_handle!(
    /// Parsed statement or ref-cursor.
    StmtHandle
);
native_handle!(
    /// Named collection object (`T_ARRNUM`, `T_ARRCHAR`, ...).
    CollectionHandle
);
native_handle!(
    /// LOB descriptor.
    LobHandle
);

/// (code, message) pair reported by the client library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeError {
    pub code: i32,
    pub message: String,
}

impl NativeError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ORA-{:05}: {}", self.code, self.message)
    }
}

impl std::error::Error for NativeError {}

pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// Native bind types, valued with the client library's type codes.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindType {
    /// Untyped bind, used for NULL.
    Generic = 0,
    Chr = 1,
    Int = 3,
    Bin = 23,
    Nty = 108,
    Clob = 112,
    Rset = 116,
}

impl BindType {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Execute flag: inside a transaction the commit is left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitMode {
    NoAutoCommit,
    CommitOnSuccess,
}

impl CommitMode {
    pub fn for_transaction(in_transaction: bool) -> Self {
        if in_transaction {
            Self::NoAutoCommit
        } else {
            Self::CommitOnSuccess
        }
    }

    pub fn flag(self) -> u32 {
        match self {
            Self::NoAutoCommit => 0x00,
            Self::CommitOnSuccess => 0x20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementType {
    Select,
    Update,
    Delete,
    Insert,
    Create,
    Drop,
    Alter,
    Begin,
    Declare,
    Call,
    Unknown,
}

impl StatementType {
    /// Classifies SQL text by its leading keyword.
    pub fn from_sql(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();
        match keyword.as_str() {
            "SELECT" | "WITH" => Self::Select,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "INSERT" => Self::Insert,
            "CREATE" => Self::Create,
            "DROP" => Self::Drop,
            "ALTER" => Self::Alter,
            "BEGIN" => Self::Begin,
            "DECLARE" => Self::Declare,
            "CALL" => Self::Call,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrientation {
    ByRow,
    ByColumn,
}

/// Value handed to the native bind call.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Text(String),
    Integer(i64),
    Binary(Vec<u8>),
    Collection(CollectionHandle),
    Cursor(StmtHandle),
    Lob(LobHandle),
}

/// The client library operations the engine consumes.
///
/// Implementations must be usable behind `Arc<dyn OciClient>`. All calls are
/// blocking. "No more rows" is `Ok(None)` from [`OciClient::fetch_row`], never
/// an error.
pub trait OciClient: Send + Sync {
    fn parse(&self, conn: ConnectionHandle, sql: &str) -> NativeResult<StmtHandle>;

    fn statement_type(&self, stmt: StmtHandle) -> NativeResult<StatementType>;

    fn new_collection(&self, conn: ConnectionHandle, type_name: &str)
        -> NativeResult<CollectionHandle>;

    fn collection_append(&self, coll: CollectionHandle, element: &Value) -> NativeResult<()>;

    fn free_collection(&self, coll: CollectionHandle) -> NativeResult<()>;

    fn new_cursor(&self, conn: ConnectionHandle) -> NativeResult<StmtHandle>;

    /// Allocates a LOB descriptor and writes `data` into a temporary CLOB.
    fn new_temporary_clob(&self, conn: ConnectionHandle, data: &str) -> NativeResult<LobHandle>;

    fn free_lob(&self, lob: LobHandle) -> NativeResult<()>;

    /// `max_length` of `-1` means unbounded.
    fn bind_by_name(
        &self,
        stmt: StmtHandle,
        name: &str,
        value: &BindValue,
        max_length: i64,
        bind_type: BindType,
    ) -> NativeResult<()>;

    fn execute(&self, stmt: StmtHandle, mode: CommitMode) -> NativeResult<()>;

    fn column_names(&self, stmt: StmtHandle) -> NativeResult<Vec<String>>;

    /// Rows affected by the last execute (or fetched so far for queries).
    fn num_rows(&self, stmt: StmtHandle) -> NativeResult<u64>;

    fn fetch_row(&self, stmt: StmtHandle) -> NativeResult<Option<Vec<Value>>>;

    /// Fetches every remaining row. `ByRow` yields rows, `ByColumn` yields
    /// one vector per column.
    fn fetch_all(
        &self,
        stmt: StmtHandle,
        orientation: FetchOrientation,
    ) -> NativeResult<Vec<Vec<Value>>>;

    /// Value at 1-based `position` of the current row.
    fn column_value(&self, stmt: StmtHandle, position: usize) -> NativeResult<Value>;

    fn free_statement(&self, stmt: StmtHandle) -> NativeResult<()>;

    fn commit(&self, conn: ConnectionHandle) -> NativeResult<()>;

    fn rollback(&self, conn: ConnectionHandle) -> NativeResult<()>;
}
