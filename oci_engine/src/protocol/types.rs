use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A single fetched cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Binary(b) => serde_json::Value::String(
                b.iter().map(|x| format!("{:02x}", x)).collect::<String>(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

/// Column name to value pairs in select-list order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssocRow {
    columns: Vec<(String, Value)>,
}

impl AssocRow {
    pub fn new(names: &[String], values: Vec<Value>) -> Self {
        Self {
            columns: names.iter().cloned().zip(values).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn to_object(&self) -> serde_json::Map<String, serde_json::Value> {
        self.columns
            .iter()
            .map(|(n, v)| (n.clone(), v.to_json()))
            .collect()
    }
}

/// One fetched row in the representation the caller asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Indexed(Vec<Value>),
    Associative(AssocRow),
    Both { values: Vec<Value>, columns: AssocRow },
    Object(serde_json::Map<String, serde_json::Value>),
}

impl Row {
    /// Value by 0-based position, for representations that keep positions.
    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            Row::Indexed(values) | Row::Both { values, .. } => values.get(index),
            _ => None,
        }
    }

    /// Value by column name, for representations that keep names.
    pub fn named(&self, name: &str) -> Option<&Value> {
        match self {
            Row::Associative(columns) | Row::Both { columns, .. } => columns.get(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStyle {
    Indexed,
    #[default]
    Associative,
    Both,
    Object,
    Column,
}

impl FromStr for FetchStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "num" | "indexed" => Ok(Self::Indexed),
            "assoc" | "associative" => Ok(Self::Associative),
            "both" => Ok(Self::Both),
            "obj" | "object" => Ok(Self::Object),
            "column" => Ok(Self::Column),
            other => Err(format!("Unknown fetch style: {}", other)),
        }
    }
}

/// Result of a bulk fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchAllResult {
    Rows(Vec<Row>),
    Column(Vec<Value>),
}

impl FetchAllResult {
    pub fn len(&self) -> usize {
        match self {
            FetchAllResult::Rows(rows) => rows.len(),
            FetchAllResult::Column(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            FetchAllResult::Rows(rows) => rows,
            FetchAllResult::Column(values) => {
                values.into_iter().map(|v| Row::Indexed(vec![v])).collect()
            }
        }
    }

    pub fn into_column(self) -> Option<Vec<Value>> {
        match self {
            FetchAllResult::Column(values) => Some(values),
            FetchAllResult::Rows(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assoc_row_lookup_keeps_order() {
        let names = vec!["ID".to_string(), "NAME".to_string()];
        let row = AssocRow::new(&names, vec![Value::Integer(1), Value::from("a")]);
        assert_eq!(row.get("NAME"), Some(&Value::from("a")));
        assert_eq!(row.get("name"), None);
        let order: Vec<&str> = row.iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["ID", "NAME"]);
    }

    #[test]
    fn test_row_accessors() {
        let names = vec!["X".to_string()];
        let both = Row::Both {
            values: vec![Value::from("hello")],
            columns: AssocRow::new(&names, vec![Value::from("hello")]),
        };
        assert_eq!(both.at(0), Some(&Value::from("hello")));
        assert_eq!(both.named("X"), Some(&Value::from("hello")));
        assert_eq!(Row::Indexed(vec![]).named("X"), None);
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(Value::Null.to_json(), serde_json::Value::Null);
        assert_eq!(Value::Integer(7).to_json(), serde_json::json!(7));
        assert_eq!(Value::Binary(vec![0xde, 0xad]).to_json(), serde_json::json!("dead"));
    }

    #[test]
    fn test_fetch_style_from_str() {
        assert_eq!("ASSOC".parse::<FetchStyle>(), Ok(FetchStyle::Associative));
        assert_eq!("num".parse::<FetchStyle>(), Ok(FetchStyle::Indexed));
        assert_eq!("obj".parse::<FetchStyle>(), Ok(FetchStyle::Object));
        assert!("sideways".parse::<FetchStyle>().is_err());
        assert_eq!(FetchStyle::default(), FetchStyle::Associative);
    }

    #[test]
    fn test_fetch_all_result_into_column() {
        let col = FetchAllResult::Column(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(col.len(), 2);
        assert_eq!(
            col.into_column(),
            Some(vec![Value::Integer(1), Value::Integer(2)])
        );
        assert!(FetchAllResult::Rows(vec![]).is_empty());
    }
}
