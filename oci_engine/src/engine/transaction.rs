use super::connection::OciConnection;
use crate::error::{OciError, Result};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    None,
    Active,
    Committed,
    RolledBack,
}

/// Explicit transaction boundary. While it is active, statements executed on
/// the same connection run without auto-commit.
pub struct Transaction {
    conn: Arc<OciConnection>,
}

impl Transaction {
    pub fn begin(conn: Arc<OciConnection>) -> Result<Self> {
        if conn.in_transaction() {
            return Err(OciError::Runtime {
                message: "A transaction is already active on this connection".to_string(),
                native: None,
            });
        }
        conn.set_transaction_state(TransactionState::Active)?;
        log::debug!("Transaction started on connection {}", conn.handle().id());
        Ok(Self { conn })
    }

    fn ensure_active(&self, action: &str) -> Result<()> {
        let state = self.conn.transaction_state();
        if state != TransactionState::Active {
            return Err(OciError::Runtime {
                message: format!("Cannot {}: transaction state is {:?}", action, state),
                native: None,
            });
        }
        Ok(())
    }

    pub fn commit(self) -> Result<()> {
        self.ensure_active("commit")?;
        self.conn
            .client()
            .commit(self.conn.handle())
            .map_err(|e| OciError::runtime("Commit failed", e))?;
        self.conn.set_transaction_state(TransactionState::Committed)
    }

    pub fn rollback(self) -> Result<()> {
        self.ensure_active("rollback")?;
        self.conn
            .client()
            .rollback(self.conn.handle())
            .map_err(|e| OciError::runtime("Rollback failed", e))?;
        self.conn.set_transaction_state(TransactionState::RolledBack)
    }

    pub fn execute<F, T>(conn: Arc<OciConnection>, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        let txn = Self::begin(conn)?;
        match f(&txn) {
            Ok(result) => {
                txn.commit()?;
                Ok(result)
            }
            Err(e) => {
                let _ = txn.rollback();
                Err(e)
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.conn.in_transaction()
    }

    pub fn connection(&self) -> &Arc<OciConnection> {
        &self.conn
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.conn.in_transaction() {
            log::warn!("Transaction dropped without commit - auto-rollback");
            if let Err(e) = self.conn.client().rollback(self.conn.handle()) {
                log::warn!("Auto-rollback failed: {}", e);
            }
            let _ = self
                .conn
                .set_transaction_state(TransactionState::RolledBack);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::memory::{ClientEvent, MemoryClient};
    use crate::native::ConnectionHandle;

    fn setup() -> (Arc<MemoryClient>, Arc<OciConnection>) {
        let client = Arc::new(MemoryClient::new());
        let conn = OciConnection::new(client.clone(), ConnectionHandle(1));
        (client, conn)
    }

    #[test]
    fn test_commit_marks_connection_idle() {
        let (client, conn) = setup();
        let txn = conn.begin_transaction().unwrap();
        assert!(txn.is_active());
        txn.commit().unwrap();
        assert_eq!(conn.transaction_state(), TransactionState::Committed);
        assert!(client
            .events()
            .contains(&ClientEvent::Commit(ConnectionHandle(1))));
    }

    #[test]
    fn test_nested_begin_fails() {
        let (_client, conn) = setup();
        let _txn = conn.begin_transaction().unwrap();
        assert!(conn.begin_transaction().is_err());
    }

    #[test]
    fn test_drop_rolls_back_active_transaction() {
        let (client, conn) = setup();
        {
            let _txn = conn.begin_transaction().unwrap();
        }
        assert_eq!(conn.transaction_state(), TransactionState::RolledBack);
        assert!(client
            .events()
            .contains(&ClientEvent::Rollback(ConnectionHandle(1))));
    }

    #[test]
    fn test_with_transaction_rolls_back_on_error() {
        let (client, conn) = setup();
        let result: Result<()> = conn.with_transaction(|_| {
            Err(OciError::InvalidArgument("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(conn.transaction_state(), TransactionState::RolledBack);
        assert!(!client
            .events()
            .contains(&ClientEvent::Commit(ConnectionHandle(1))));
    }

    #[test]
    fn test_with_transaction_commits_on_success() {
        let (_client, conn) = setup();
        let value = conn.with_transaction(|txn| {
            assert!(txn.is_active());
            Ok(5)
        });
        assert_eq!(value.unwrap(), 5);
        assert_eq!(conn.transaction_state(), TransactionState::Committed);
    }
}
