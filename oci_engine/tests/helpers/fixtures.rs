//! Scripted database fixtures for integration tests.

use oci_engine::native::memory::{MemoryClient, QueryOutput, ResultSet};
use oci_engine::test_helpers::load_dotenv;
use oci_engine::{OciConnection, Value};
use std::sync::Arc;

/// Stored procedure call opening one ref-cursor.
pub const PROC_SQL: &str = "BEGIN pkg_users.list(:p_status, :out_cur); END;";

pub const USERS: [(i64, &str); 3] = [(1, "ann"), (2, "bob"), (3, "cyd")];

pub fn init_logging() {
    load_dotenv();
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn memory_connection() -> (Arc<MemoryClient>, Arc<OciConnection>) {
    init_logging();
    oci_engine::test_helpers::memory_connection()
}

/// Scripts `PROC_SQL` to fill `out_cur` with `USERS`.
pub fn scripted_procedure(client: &MemoryClient) {
    client.on_query(PROC_SQL, |_| {
        let rows = USERS
            .iter()
            .map(|(id, name)| vec![Value::Integer(*id), Value::from(*name)])
            .collect();
        Ok(QueryOutput::default().with_cursor("out_cur", ResultSet::new(vec!["ID", "NAME"], rows)))
    });
}
