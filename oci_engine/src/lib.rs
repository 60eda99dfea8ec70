//! Prepared-statement engine over an Oracle client library.
//!
//! [`Statement`] drives prepare, bind and execute against the
//! [`native::OciClient`] seam, binding parameters by their declared errata
//! and fetching rows in several representations, from the statement itself
//! or from ref-cursors it produced. [`jobs`] holds the job client and worker
//! adapters.

pub mod config;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod native;
pub mod observability;
pub mod protocol;
#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use config::EngineConfig;
pub use engine::{
    ActiveCursor, ExecuteParams, OciConnection, RefCursor, Statement, StatementResult,
    Transaction, TransactionState,
};
pub use error::{ErrorCategory, OciError, Result};
pub use native::{BindType, CommitMode, NativeError, OciClient};
pub use protocol::{
    Errata, FetchAllResult, FetchStyle, ParamValue, ParameterContainer, Row, Value,
};
