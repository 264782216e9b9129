use chrono::{DateTime, Utc};

/// One untyped cell of a `SHOW` result.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
    Text(String),
    Bool(bool),
    Null,
    /// A column type the decoder does not understand, keyed by type name.
    Unsupported(String),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// A single result row: column names in query order paired with their cells.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawRow {
    cells: Vec<(String, Value)>,
}

impl RawRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.cells.push((column.into(), value.into()));
    }

    /// Cell of the first column called `column`, if the row has one.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for RawRow
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The complete result of one `SHOW <table>` query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl StatusTable {
    /// Builds a table from rows, taking the column list from the first row.
    #[must_use]
    pub fn from_rows(rows: Vec<RawRow>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.iter().map(|(name, _)| name.to_string()).collect())
            .unwrap_or_default();
        Self { columns, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_row_keeps_query_order() {
        let row: RawRow = [("hostname", "db1"), ("port", "5432"), ("status", "up")]
            .into_iter()
            .collect();

        let names: Vec<&str> = row.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["hostname", "port", "status"]);
        assert_eq!(row.get("port"), Some(&Value::Text("5432".to_string())));
        assert_eq!(row.get("role"), None);
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_status_table_from_rows() {
        let mut row = RawRow::new();
        row.push("pool_version", "4.2.1 (chichiriboshi)");
        let table = StatusTable::from_rows(vec![row]);
        assert_eq!(table.columns, vec!["pool_version".to_string()]);
        assert_eq!(table.rows.len(), 1);

        let empty = StatusTable::from_rows(Vec::new());
        assert!(empty.columns.is_empty());
    }
}
