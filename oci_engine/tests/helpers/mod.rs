pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{init_logging, memory_connection, scripted_procedure, PROC_SQL, USERS};
