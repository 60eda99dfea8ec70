pub mod binder;
pub mod connection;
pub mod cursor;
pub mod fetch;
pub mod result;
pub mod statement;
pub mod transaction;

pub use binder::{BindScratch, TypeBinder, UNBOUNDED_LENGTH};
pub use connection::OciConnection;
pub use cursor::{ActiveCursor, CursorRegistry, RefCursor};
pub use result::StatementResult;
pub use statement::{ExecuteParams, Statement};
pub use transaction::{Transaction, TransactionState};
