mod helpers;
use helpers::memory_connection;
use oci_engine::native::memory::{ClientEvent, QueryOutput};
use oci_engine::native::{CommitMode, ConnectionHandle};
use oci_engine::{OciError, Statement, TransactionState};

const SQL: &str = "UPDATE accounts SET balance = balance - :amount WHERE id = :id";

fn run_update(stmt: &mut Statement) {
    stmt.execute(vec![("amount", 10), ("id", 1)]).unwrap();
}

#[test]
fn test_commit_mode_follows_transaction_flag() {
    let (client, conn) = memory_connection();
    client.on_query(SQL, |_| Ok(QueryOutput::affected(1)));

    let mut outside = Statement::new(conn.clone());
    outside.set_sql(SQL);
    run_update(&mut outside);

    let txn = conn.begin_transaction().unwrap();
    let mut inside = Statement::new(conn.clone());
    inside.set_sql(SQL);
    run_update(&mut inside);
    txn.commit().unwrap();

    let modes: Vec<CommitMode> = client.executions().into_iter().map(|(_, m)| m).collect();
    assert_eq!(
        modes,
        vec![CommitMode::CommitOnSuccess, CommitMode::NoAutoCommit]
    );
    assert_ne!(modes[0].flag(), modes[1].flag());
}

#[test]
fn test_same_statement_switches_mode_between_executes() {
    let (client, conn) = memory_connection();
    let mut stmt = Statement::new(conn.clone());
    stmt.set_sql(SQL);

    conn.with_transaction(|_| {
        run_update(&mut stmt);
        Ok(())
    })
    .unwrap();
    run_update(&mut stmt);

    let modes: Vec<CommitMode> = client.executions().into_iter().map(|(_, m)| m).collect();
    assert_eq!(
        modes,
        vec![CommitMode::NoAutoCommit, CommitMode::CommitOnSuccess]
    );
    assert_eq!(conn.transaction_state(), TransactionState::Committed);
}

#[test]
fn test_failed_work_rolls_back() {
    let (client, conn) = memory_connection();
    client.fail_execute("accounts", oci_engine::NativeError::new(1, "unique constraint violated"));
    let mut stmt = Statement::new(conn.clone());
    stmt.set_sql(SQL);

    let result: oci_engine::Result<()> = conn.with_transaction(|_| {
        stmt.execute(vec![("amount", 10), ("id", 1)])?;
        Ok(())
    });
    assert!(matches!(result, Err(OciError::Runtime { .. })));
    assert_eq!(conn.transaction_state(), TransactionState::RolledBack);
    assert!(client
        .events()
        .contains(&ClientEvent::Rollback(ConnectionHandle(1))));
}

#[test]
fn test_dropped_transaction_rolls_back() {
    let (client, conn) = memory_connection();
    {
        let txn = conn.begin_transaction().unwrap();
        assert!(txn.is_active());
        assert!(conn.in_transaction());
    }
    assert!(!conn.in_transaction());
    assert!(client
        .events()
        .contains(&ClientEvent::Rollback(ConnectionHandle(1))));
}
