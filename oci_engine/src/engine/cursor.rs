use super::fetch;
use crate::error::{OciError, Result};
use crate::native::{CommitMode, OciClient, StmtHandle};
use crate::protocol::{FetchAllResult, FetchStyle, Row, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Ref-cursors produced by binding, in registration order.
///
/// Each entry is handed out at most once; whoever takes it becomes
/// responsible for releasing the native handle. Taken names are remembered
/// until they are registered again or the registry is drained.
#[derive(Debug, Default)]
pub struct CursorRegistry {
    entries: Vec<(String, StmtHandle)>,
    consumed: HashSet<String>,
}

impl CursorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` under `name`, returning the handle it replaced.
    pub fn register(&mut self, name: &str, handle: StmtHandle) -> Option<StmtHandle> {
        self.consumed.remove(name);
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, handle)),
            None => {
                self.entries.push((name.to_string(), handle));
                None
            }
        }
    }

    /// Removes and returns the named cursor, or the first registered one
    /// when no name is given.
    pub fn take(&mut self, name: Option<&str>) -> Result<(String, StmtHandle)> {
        if let Some(name) = name.filter(|n| self.was_consumed(n)) {
            return Err(OciError::InvalidCursor(format!(
                "Cursor {} was already fetched",
                name
            )));
        }
        if self.entries.is_empty() {
            return Err(OciError::CursorNotFound(
                "no ref-cursors are registered".to_string(),
            ));
        }
        let idx = match name {
            None => 0,
            Some(name) => self
                .entries
                .iter()
                .position(|(n, _)| n == name)
                .ok_or_else(|| {
                    OciError::InvalidCursor(format!("Cursor {} does not exist", name))
                })?,
        };
        let (name, handle) = self.entries.remove(idx);
        self.consumed.insert(name.clone());
        Ok((name, handle))
    }

    /// Removes every entry and forgets which names were taken.
    pub fn drain(&mut self) -> Vec<(String, StmtHandle)> {
        self.consumed.clear();
        std::mem::take(&mut self.entries)
    }

    /// Whether `name` was taken and not registered again since.
    pub fn was_consumed(&self, name: &str) -> bool {
        self.consumed.contains(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A ref-cursor taken out of a statement's registry.
///
/// Owns its native handle and releases it exactly once, on drop.
pub struct RefCursor {
    client: Arc<dyn OciClient>,
    name: String,
    handle: Option<StmtHandle>,
}

impl RefCursor {
    /// Executes the cursor and takes ownership of it. The handle is released
    /// even when the execute fails.
    pub(crate) fn open(
        client: Arc<dyn OciClient>,
        name: String,
        handle: StmtHandle,
        mode: CommitMode,
    ) -> Result<Self> {
        let cursor = Self {
            client,
            name,
            handle: Some(handle),
        };
        log::debug!("Opening ref-cursor {}", cursor.name);
        cursor.client.execute(handle, mode).map_err(|e| {
            OciError::query(format!("Cursor {} couldn't be executed", cursor.name), e)
        })?;
        Ok(cursor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> Option<StmtHandle> {
        self.handle
    }

    fn live_handle(&self) -> Result<StmtHandle> {
        self.handle
            .ok_or_else(|| OciError::InvalidCursor(format!("Cursor {} was closed", self.name)))
    }

    pub fn fetch(&self, style: FetchStyle) -> Result<Option<Row>> {
        fetch::fetch_row(self.client.as_ref(), self.live_handle()?, style)
    }

    pub fn fetch_all(&self, style: FetchStyle, column: usize) -> Result<FetchAllResult> {
        fetch::fetch_all(self.client.as_ref(), self.live_handle()?, style, column)
    }

    pub fn fetch_column(&self, index: usize) -> Result<Value> {
        fetch::fetch_column(self.client.as_ref(), self.live_handle()?, index)
    }

    /// Releases the native handle now instead of on drop.
    pub fn close(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => self.client.free_statement(handle).map_err(|e| {
                OciError::runtime(format!("Failed to release cursor {}", self.name), e)
            }),
            None => Ok(()),
        }
    }
}

impl Drop for RefCursor {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("{}", e.message());
        }
    }
}

/// The row source a fetch call resolved to.
pub enum ActiveCursor {
    /// No ref-cursors were registered: the statement's own handle.
    Statement(StmtHandle),
    Ref(RefCursor),
}

impl ActiveCursor {
    pub fn handle(&self) -> Result<StmtHandle> {
        match self {
            ActiveCursor::Statement(handle) => Ok(*handle),
            ActiveCursor::Ref(cursor) => cursor.live_handle(),
        }
    }

    pub fn is_ref_cursor(&self) -> bool {
        matches!(self, ActiveCursor::Ref(_))
    }

    pub fn into_ref_cursor(self) -> Option<RefCursor> {
        match self {
            ActiveCursor::Ref(cursor) => Some(cursor),
            ActiveCursor::Statement(_) => None,
        }
    }
}
