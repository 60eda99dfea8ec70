use super::transaction::{Transaction, TransactionState};
use crate::error::{OciError, Result};
use crate::native::{ConnectionHandle, OciClient};
use std::sync::{Arc, Mutex};

/// An established session: the client library, the session handle and the
/// transaction flag statements consult to pick their commit mode.
pub struct OciConnection {
    client: Arc<dyn OciClient>,
    handle: ConnectionHandle,
    state: Mutex<TransactionState>,
}

impl OciConnection {
    pub fn new(client: Arc<dyn OciClient>, handle: ConnectionHandle) -> Arc<Self> {
        Arc::new(Self {
            client,
            handle,
            state: Mutex::new(TransactionState::None),
        })
    }

    pub fn client(&self) -> &Arc<dyn OciClient> {
        &self.client
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction_state() == TransactionState::Active
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(TransactionState::None)
    }

    pub(crate) fn set_transaction_state(&self, next: TransactionState) -> Result<()> {
        let mut s = self.state.lock().map_err(|_| {
            OciError::Internal("Failed to lock transaction state".to_string())
        })?;
        *s = next;
        Ok(())
    }

    pub fn begin_transaction(self: &Arc<Self>) -> Result<Transaction> {
        Transaction::begin(Arc::clone(self))
    }

    pub fn with_transaction<F, T>(self: &Arc<Self>, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        Transaction::execute(Arc::clone(self), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::memory::MemoryClient;

    fn connection() -> Arc<OciConnection> {
        OciConnection::new(Arc::new(MemoryClient::new()), ConnectionHandle(7))
    }

    #[test]
    fn test_oci_connection_new() {
        let conn = connection();
        assert_eq!(conn.handle(), ConnectionHandle(7));
        assert!(!conn.in_transaction());
        assert_eq!(conn.transaction_state(), TransactionState::None);
    }

    #[test]
    fn test_in_transaction_follows_state() {
        let conn = connection();
        conn.set_transaction_state(TransactionState::Active).unwrap();
        assert!(conn.in_transaction());
        conn.set_transaction_state(TransactionState::Committed).unwrap();
        assert!(!conn.in_transaction());
    }
}
