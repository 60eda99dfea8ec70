//! Turns a parameter container into native bind calls.
//!
//! The container is never modified. Native objects created for a single
//! execute (collections, temporary LOBs) are collected in a [`BindScratch`]
//! that the caller releases once the execute returns. Ref-cursors are the
//! exception: they outlive the execute and go to the statement's
//! [`CursorRegistry`].

use super::cursor::CursorRegistry;
use crate::config::EngineConfig;
use crate::error::{OciError, Result};
use crate::native::{
    BindType, BindValue, CollectionHandle, ConnectionHandle, LobHandle, OciClient, StmtHandle,
};
use crate::observability::StructuredLogger;
use crate::protocol::{Errata, ParamValue, ParameterContainer, ParameterEntry, Value};

/// Max-length passed when the container declares none.
pub const UNBOUNDED_LENGTH: i64 = -1;

/// Native objects that only live for one execute.
#[derive(Debug, Default)]
pub struct BindScratch {
    collections: Vec<CollectionHandle>,
    lobs: Vec<LobHandle>,
}

impl BindScratch {
    pub fn collections(&self) -> &[CollectionHandle] {
        &self.collections
    }

    pub fn lobs(&self) -> &[LobHandle] {
        &self.lobs
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.lobs.is_empty()
    }

    /// Frees everything, logging failures instead of stopping at the first.
    pub fn release(&mut self, client: &dyn OciClient) {
        for coll in self.collections.drain(..) {
            if let Err(e) = client.free_collection(coll) {
                log::warn!("Failed to free collection {}: {}", coll.id(), e);
            }
        }
        for lob in self.lobs.drain(..) {
            if let Err(e) = client.free_lob(lob) {
                log::warn!("Failed to free temporary LOB {}: {}", lob.id(), e);
            }
        }
    }
}

pub struct TypeBinder<'a> {
    client: &'a dyn OciClient,
    conn: ConnectionHandle,
    config: &'a EngineConfig,
}

impl<'a> TypeBinder<'a> {
    pub fn new(
        client: &'a dyn OciClient,
        conn: ConnectionHandle,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            client,
            conn,
            config,
        }
    }

    /// Binds every entry of `params` to `stmt`, in container order.
    ///
    /// Binding is not atomic: on failure the entries before the failing one
    /// stay bound, but the scratch objects created so far are released.
    pub fn bind(
        &self,
        stmt: StmtHandle,
        params: &ParameterContainer,
        cursors: &mut CursorRegistry,
    ) -> Result<BindScratch> {
        let debug_name = self.config.debug_parameter.as_str();
        let logger = StructuredLogger::new(
            params
                .get(debug_name)
                .map(ParamValue::is_truthy)
                .unwrap_or(false),
        );

        if self.config.strict_errata {
            if let Some(entry) = params
                .iter()
                .find(|e| e.name != debug_name && matches!(e.errata, Some(Errata::Other(_))))
            {
                return Err(OciError::InvalidArgument(format!(
                    "Unknown errata {:?} for parameter :{}",
                    entry.errata, entry.name
                )));
            }
        }

        let mut scratch = BindScratch::default();
        for entry in params.iter().filter(|e| e.name != debug_name) {
            if let Err(e) = self.bind_entry(stmt, entry, cursors, &mut scratch, &logger) {
                logger.log_error("bind", &e.message());
                scratch.release(self.client);
                return Err(e);
            }
        }
        Ok(scratch)
    }

    fn bind_entry(
        &self,
        stmt: StmtHandle,
        entry: &ParameterEntry,
        cursors: &mut CursorRegistry,
        scratch: &mut BindScratch,
        logger: &StructuredLogger,
    ) -> Result<()> {
        let name = entry.name.as_str();
        let max_length = entry.max_length.unwrap_or(UNBOUNDED_LENGTH);

        let (value, bind_type, detail) = match entry.errata.as_ref() {
            Some(Errata::NumberArray) => {
                let type_name = &self.config.number_array_type;
                let coll = self.collection(type_name, entry, scratch, number_element)?;
                (BindValue::Collection(coll), BindType::Nty, type_name.clone())
            }
            Some(Errata::CharArray) => {
                let type_name = &self.config.char_array_type;
                let coll = self.collection(type_name, entry, scratch, char_element)?;
                (BindValue::Collection(coll), BindType::Nty, type_name.clone())
            }
            Some(Errata::Cursor) => {
                return self.bind_cursor(stmt, name, max_length, cursors, logger)
            }
            Some(Errata::Null) => (BindValue::Null, BindType::Generic, "null".to_string()),
            Some(Errata::Integer) | Some(Errata::Double) => {
                let value = match &entry.value {
                    ParamValue::Null => BindValue::Null,
                    other => BindValue::Integer(other.coerce_integer().ok_or_else(|| {
                        OciError::InvalidArgument(format!(
                            "Parameter :{} cannot be bound as a number",
                            name
                        ))
                    })?),
                };
                (value, BindType::Int, format!("{:?}", entry.value))
            }
            Some(Errata::Binary) => {
                let value = match &entry.value {
                    ParamValue::Null => BindValue::Null,
                    ParamValue::Binary(bytes) => BindValue::Binary(bytes.clone()),
                    ParamValue::Array(_) => return Err(array_without_errata(name)),
                    other => BindValue::Binary(other.to_text().unwrap_or_default().into_bytes()),
                };
                (value, BindType::Bin, "binary".to_string())
            }
            Some(Errata::Lob) if !entry.value.is_empty() => {
                let text = scalar_text(entry)?;
                let lob = self
                    .client
                    .new_temporary_clob(self.conn, &text)
                    .map_err(|e| {
                        OciError::query(format!("Failed to create LOB for :{}", name), e)
                    })?;
                scratch.lobs.push(lob);
                (BindValue::Lob(lob), BindType::Clob, format!("clob({} bytes)", text.len()))
            }
            // Empty LOBs, strings and anything unrecognised go as characters.
            _ => {
                let value = match &entry.value {
                    ParamValue::Null => BindValue::Null,
                    _ => BindValue::Text(scalar_text(entry)?),
                };
                (value, BindType::Chr, format!("{:?}", entry.value))
            }
        };

        logger.log_bind(name, bind_type, max_length, &detail);
        self.client
            .bind_by_name(stmt, name, &value, max_length, bind_type)
            .map_err(|e| OciError::query(format!("Failed to bind :{}", name), e))
    }

    fn collection(
        &self,
        type_name: &str,
        entry: &ParameterEntry,
        scratch: &mut BindScratch,
        convert: fn(&str, &ParamValue) -> Result<Value>,
    ) -> Result<CollectionHandle> {
        let items: &[ParamValue] = match &entry.value {
            ParamValue::Array(items) => items,
            ParamValue::Null => &[],
            _ => {
                return Err(OciError::InvalidArgument(format!(
                    "Parameter :{} is declared as an array but holds a scalar",
                    entry.name
                )))
            }
        };

        let coll = self
            .client
            .new_collection(self.conn, type_name)
            .map_err(|e| OciError::query(format!("Failed to create {} collection", type_name), e))?;
        scratch.collections.push(coll);

        for item in items {
            let element = convert(&entry.name, item)?;
            self.client
                .collection_append(coll, &element)
                .map_err(|e| {
                    OciError::query(format!("Failed to fill collection for :{}", entry.name), e)
                })?;
        }
        Ok(coll)
    }

    fn bind_cursor(
        &self,
        stmt: StmtHandle,
        name: &str,
        max_length: i64,
        cursors: &mut CursorRegistry,
        logger: &StructuredLogger,
    ) -> Result<()> {
        let cursor = self
            .client
            .new_cursor(self.conn)
            .map_err(|e| OciError::query(format!("Failed to allocate cursor :{}", name), e))?;

        logger.log_bind(name, BindType::Rset, max_length, "cursor");
        if let Err(e) = self
            .client
            .bind_by_name(stmt, name, &BindValue::Cursor(cursor), max_length, BindType::Rset)
        {
            if let Err(free_err) = self.client.free_statement(cursor) {
                log::warn!("Failed to free unbound cursor :{}: {}", name, free_err);
            }
            return Err(OciError::query(format!("Failed to bind :{}", name), e));
        }

        if let Some(old) = cursors.register(name, cursor) {
            log::debug!("Cursor :{} rebound, releasing previous handle {}", name, old.id());
            if let Err(e) = self.client.free_statement(old) {
                log::warn!("Failed to free replaced cursor :{}: {}", name, e);
            }
        }
        Ok(())
    }
}

fn array_without_errata(name: &str) -> OciError {
    OciError::InvalidArgument(format!(
        "Parameter :{} holds an array but is not declared as array_num or array_char",
        name
    ))
}

fn scalar_text(entry: &ParameterEntry) -> Result<String> {
    match &entry.value {
        ParamValue::Array(_) => Err(array_without_errata(&entry.name)),
        other => Ok(other.to_text().unwrap_or_default()),
    }
}

fn number_element(name: &str, item: &ParamValue) -> Result<Value> {
    let invalid = || {
        OciError::InvalidArgument(format!(
            "Parameter :{} contains a non-numeric element {:?}",
            name, item
        ))
    };
    match item {
        ParamValue::Null => Ok(Value::Null),
        ParamValue::Integer(n) => Ok(Value::Integer(*n)),
        ParamValue::Double(f) => Ok(Value::Float(*f)),
        ParamValue::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                Ok(Value::Integer(n))
            } else {
                s.parse::<f64>().map(Value::Float).map_err(|_| invalid())
            }
        }
        ParamValue::Binary(_) | ParamValue::Array(_) => Err(invalid()),
    }
}

fn char_element(name: &str, item: &ParamValue) -> Result<Value> {
    match item {
        ParamValue::Null => Ok(Value::Null),
        ParamValue::Array(_) => Err(OciError::InvalidArgument(format!(
            "Parameter :{} contains a nested array",
            name
        ))),
        other => Ok(Value::Text(other.to_text().unwrap_or_default())),
    }
}
