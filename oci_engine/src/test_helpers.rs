//! Shared setup for tests and benches.

use crate::engine::OciConnection;
use crate::native::memory::MemoryClient;
use crate::native::ConnectionHandle;
use std::sync::{Arc, Once};

static DOTENV: Once = Once::new();

/// Loads `.env` from the working directory (or a parent) once per process.
/// A missing file is not an error.
pub fn load_dotenv() {
    DOTENV.call_once(|| {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Failed to load .env: {}", e);
            }
        }
    });
}

/// A fresh in-memory client and a connection over it.
pub fn memory_connection() -> (Arc<MemoryClient>, Arc<OciConnection>) {
    let client = Arc::new(MemoryClient::new());
    let conn = OciConnection::new(client.clone(), ConnectionHandle(1));
    (client, conn)
}

/// Credentials for tests against a live database:
/// `OCI_ENGINE_TEST_USER`, `OCI_ENGINE_TEST_PASSWORD`, `OCI_ENGINE_TEST_CONNECT`.
/// `None` when any of them is unset or empty.
pub fn live_test_credentials() -> Option<(String, String, String)> {
    load_dotenv();
    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
    Some((
        var("OCI_ENGINE_TEST_USER")?,
        var("OCI_ENGINE_TEST_PASSWORD")?,
        var("OCI_ENGINE_TEST_CONNECT")?,
    ))
}
