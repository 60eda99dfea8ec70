//! Maps a fetch style onto the client library's row retrieval calls.

use crate::error::{OciError, Result};
use crate::native::{FetchOrientation, OciClient, StmtHandle};
use crate::protocol::{AssocRow, FetchAllResult, FetchStyle, Row, Value};

fn shape(values: Vec<Value>, names: &[String], style: FetchStyle) -> Row {
    match style {
        FetchStyle::Indexed => Row::Indexed(values),
        FetchStyle::Both => Row::Both {
            columns: AssocRow::new(names, values.clone()),
            values,
        },
        FetchStyle::Object => Row::Object(AssocRow::new(names, values).to_object()),
        FetchStyle::Associative | FetchStyle::Column => {
            Row::Associative(AssocRow::new(names, values))
        }
    }
}

fn column_names(client: &dyn OciClient, cursor: StmtHandle) -> Result<Vec<String>> {
    client
        .column_names(cursor)
        .map_err(|e| OciError::query("Failed to describe the result set", e))
}

/// Fetches the next row, `None` once the cursor is exhausted.
pub fn fetch_row(
    client: &dyn OciClient,
    cursor: StmtHandle,
    style: FetchStyle,
) -> Result<Option<Row>> {
    if style == FetchStyle::Column {
        return Err(OciError::InvalidQuery {
            message: "Invalid fetch mode specified".to_string(),
            native: None,
        });
    }

    let values = match client
        .fetch_row(cursor)
        .map_err(|e| OciError::query("Fetch failed", e))?
    {
        Some(values) => values,
        None => return Ok(None),
    };

    let names = match style {
        FetchStyle::Indexed => Vec::new(),
        _ => column_names(client, cursor)?,
    };
    Ok(Some(shape(values, &names, style)))
}

/// Fetches every remaining row.
///
/// Indexed and associative styles use a single bulk call; the object style
/// goes row by row; the column style returns position `column` (0-based) of
/// every row. The both style is rejected.
pub fn fetch_all(
    client: &dyn OciClient,
    cursor: StmtHandle,
    style: FetchStyle,
    column: usize,
) -> Result<FetchAllResult> {
    match style {
        FetchStyle::Both => Err(OciError::InvalidQuery {
            message: "Bulk fetch does not support the both style".to_string(),
            native: None,
        }),
        FetchStyle::Indexed | FetchStyle::Associative => {
            let rows = client
                .fetch_all(cursor, FetchOrientation::ByRow)
                .map_err(|e| OciError::query("Fetch failed", e))?;
            let names = match style {
                FetchStyle::Indexed => Vec::new(),
                _ => column_names(client, cursor)?,
            };
            Ok(FetchAllResult::Rows(
                rows.into_iter().map(|r| shape(r, &names, style)).collect(),
            ))
        }
        FetchStyle::Column => {
            let mut columns = client
                .fetch_all(cursor, FetchOrientation::ByColumn)
                .map_err(|e| OciError::query("Fetch failed", e))?;
            if columns.iter().all(|c| c.is_empty()) {
                return Ok(FetchAllResult::Column(Vec::new()));
            }
            if column >= columns.len() {
                return Err(OciError::InvalidQuery {
                    message: format!(
                        "Column index {} out of range ({} columns)",
                        column,
                        columns.len()
                    ),
                    native: None,
                });
            }
            Ok(FetchAllResult::Column(columns.swap_remove(column)))
        }
        FetchStyle::Object => {
            let mut rows = Vec::new();
            while let Some(row) = fetch_row(client, cursor, FetchStyle::Object)? {
                rows.push(row);
            }
            Ok(FetchAllResult::Rows(rows))
        }
    }
}

/// Value at 0-based `index` of the current row.
pub fn fetch_column(client: &dyn OciClient, cursor: StmtHandle, index: usize) -> Result<Value> {
    client
        .column_value(cursor, index + 1)
        .map_err(|e| OciError::query(format!("Failed to read column {}", index), e))
}
