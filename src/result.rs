//! Result sets assembled from the Simple Query message stream.
//!
//! A response cycle is RowDescription ('T'), any number of DataRow ('D'), then
//! CommandComplete ('C'). [`ResultAssembler`] consumes those payloads in order
//! and hands out a finished [`ResultSet`] on CommandComplete, resetting itself
//! for the next query.

use std::sync::Arc;

use crate::error::{PgWireError, Result};
use crate::protocol::messages::{parse_command_complete, parse_data_row, parse_row_description};
use crate::types::{TypeLookup, resolve};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub type_oid: u32,
    pub type_name: String,
}

/// One row of text-format values, ordered like [`ResultSet::columns`].
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[Column]>,
    values: Vec<Option<String>>,
}

impl Row {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    /// Position of the first column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Value of column `name`; `None` if the value is NULL or there is no such column.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.try_get(name).flatten()
    }

    /// Like [`Row::get`] but tells a missing column (`None`) apart from NULL (`Some(None)`).
    pub fn try_get(&self, name: &str) -> Option<Option<&str>> {
        let idx = self.column_index(name)?;
        Some(self.values[idx].as_deref())
    }

    pub fn get_idx(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }

    pub fn is_null(&self, name: &str) -> bool {
        matches!(self.try_get(name), Some(None))
    }

    /// `(column name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| (c.name.as_str(), v.as_deref()))
    }
}

#[derive(Debug, Clone)]
pub struct ResultSet {
    columns: Arc<[Column]>,
    rows: Vec<Row>,
    status: String,
}

impl Default for ResultSet {
    fn default() -> Self {
        Self {
            columns: Arc::from(Vec::new()),
            rows: Vec::new(),
            status: String::new(),
        }
    }
}

impl ResultSet {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in RowDescription order.
    pub fn fields(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Column type names, parallel to [`ResultSet::fields`].
    pub fn types(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.type_name.as_str()).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Command tag from CommandComplete, e.g. `SELECT 2` or `INSERT 0 1`.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Trailing row count of the command tag, when the command reports one.
    pub fn rows_affected(&self) -> Option<u64> {
        self.status.rsplit(' ').next()?.parse().ok()
    }
}

pub struct ResultAssembler {
    lookup: Arc<dyn TypeLookup>,
    columns: Option<Arc<[Column]>>,
    rows: Vec<Row>,
}

impl ResultAssembler {
    pub fn new(lookup: Arc<dyn TypeLookup>) -> Self {
        Self {
            lookup,
            columns: None,
            rows: Vec::new(),
        }
    }

    /// RowDescription ('T'): replaces the column list.
    pub fn row_description(&mut self, payload: &[u8]) -> Result<()> {
        let columns: Vec<Column> = parse_row_description(payload)?
            .into_iter()
            .map(|f| Column {
                type_name: resolve(self.lookup.as_ref(), f.type_oid).to_owned(),
                name: f.name,
                type_oid: f.type_oid,
            })
            .collect();
        self.columns = Some(Arc::from(columns));
        self.rows.clear();
        Ok(())
    }

    /// DataRow ('D'): appends one row. Requires a preceding RowDescription.
    pub fn data_row(&mut self, payload: &[u8]) -> Result<()> {
        let Some(columns) = &self.columns else {
            return Err(PgWireError::Protocol(
                "data row received before row description".into(),
            ));
        };

        let raw = parse_data_row(payload)?;
        if raw.len() != columns.len() {
            return Err(PgWireError::Protocol(format!(
                "data row has {} columns, row description declared {}",
                raw.len(),
                columns.len()
            )));
        }

        let mut values = Vec::with_capacity(raw.len());
        for (col, v) in columns.iter().zip(raw) {
            let v = match v {
                None => None,
                Some(bytes) => Some(String::from_utf8(bytes.to_vec()).map_err(|_| {
                    PgWireError::Protocol(format!("column {:?} is not valid UTF-8", col.name))
                })?),
            };
            values.push(v);
        }

        self.rows.push(Row {
            columns: Arc::clone(columns),
            values,
        });
        Ok(())
    }

    /// CommandComplete ('C'): hands out the finished result and resets.
    pub fn command_complete(&mut self, payload: &[u8]) -> Result<ResultSet> {
        let status = parse_command_complete(payload)?;
        let mut rs = self.take();
        rs.status = status;
        Ok(rs)
    }

    /// EmptyQueryResponse ('I'): the query string had no statements.
    pub fn empty_query(&mut self) -> ResultSet {
        self.take()
    }

    /// Drops any partially assembled result.
    pub fn reset(&mut self) {
        self.columns = None;
        self.rows.clear();
    }

    fn take(&mut self) -> ResultSet {
        let columns = self.columns.take().unwrap_or_else(|| Arc::from(Vec::new()));
        ResultSet {
            columns,
            rows: std::mem::take(&mut self.rows),
            status: String::new(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::BuiltinTypes;

    pub(crate) fn row_description(fields: &[(&str, u32)]) -> Vec<u8> {
        let mut v = (fields.len() as i16).to_be_bytes().to_vec();
        for (name, oid) in fields {
            v.extend_from_slice(name.as_bytes());
            v.push(0);
            v.extend_from_slice(&0u32.to_be_bytes());
            v.extend_from_slice(&0i16.to_be_bytes());
            v.extend_from_slice(&oid.to_be_bytes());
            v.extend_from_slice(&(-1i16).to_be_bytes());
            v.extend_from_slice(&(-1i32).to_be_bytes());
            v.extend_from_slice(&0i16.to_be_bytes());
        }
        v
    }

    pub(crate) fn data_row(values: &[Option<&str>]) -> Vec<u8> {
        let mut v = (values.len() as i16).to_be_bytes().to_vec();
        for value in values {
            match value {
                None => v.extend_from_slice(&(-1i32).to_be_bytes()),
                Some(s) => {
                    v.extend_from_slice(&(s.len() as i32).to_be_bytes());
                    v.extend_from_slice(s.as_bytes());
                }
            }
        }
        v
    }

    fn assembler() -> ResultAssembler {
        ResultAssembler::new(Arc::new(BuiltinTypes))
    }

    #[test]
    fn two_rows_with_null() {
        let mut a = assembler();
        a.row_description(&row_description(&[("id", 23), ("name", 25)]))
            .unwrap();
        a.data_row(&data_row(&[Some("1"), Some("alice")])).unwrap();
        a.data_row(&data_row(&[Some("2"), None])).unwrap();
        let rs = a.command_complete(b"SELECT 2\0").unwrap();

        assert_eq!(rs.fields(), vec!["id", "name"]);
        assert_eq!(rs.types(), vec!["int4", "text"]);
        assert_eq!(rs.rows().len(), 2);
        assert_eq!(rs.status(), "SELECT 2");
        assert_eq!(rs.rows_affected(), Some(2));

        let first = &rs.rows()[0];
        assert_eq!(first.get("id"), Some("1"));
        assert_eq!(first.get("name"), Some("alice"));

        let second = &rs.rows()[1];
        assert_eq!(second.get_idx(0), Some("2"));
        assert!(second.is_null("name"));
        assert_eq!(second.try_get("name"), Some(None));
        assert_eq!(second.try_get("missing"), None);
        assert_eq!(
            second.iter().collect::<Vec<_>>(),
            vec![("id", Some("2")), ("name", None)]
        );
    }

    #[test]
    fn resets_between_queries() {
        let mut a = assembler();
        a.row_description(&row_description(&[("n", 23)])).unwrap();
        a.data_row(&data_row(&[Some("1")])).unwrap();
        a.command_complete(b"SELECT 1\0").unwrap();

        let rs = a.command_complete(b"CREATE TABLE\0").unwrap();
        assert!(rs.fields().is_empty());
        assert!(rs.rows().is_empty());
        assert_eq!(rs.rows_affected(), None);

        // columns from the previous query must not leak into this one
        let err = a.data_row(&data_row(&[Some("1")])).unwrap_err();
        assert!(matches!(err, PgWireError::Protocol(_)));
    }

    #[test]
    fn data_row_before_row_description() {
        let mut a = assembler();
        let err = a.data_row(&data_row(&[Some("x")])).unwrap_err();
        assert!(err.to_string().contains("before row description"));
    }

    #[test]
    fn column_count_mismatch() {
        let mut a = assembler();
        a.row_description(&row_description(&[("a", 25), ("b", 25)]))
            .unwrap();
        let err = a.data_row(&data_row(&[Some("only one")])).unwrap_err();
        assert!(err.to_string().contains("declared 2"));
    }

    #[test]
    fn zero_column_rows_follow_zero_field_description() {
        let mut a = assembler();
        a.row_description(&row_description(&[])).unwrap();
        a.data_row(&data_row(&[])).unwrap();
        let rs = a.command_complete(b"SELECT 1\0").unwrap();
        assert!(rs.fields().is_empty());
        assert_eq!(rs.rows().len(), 1);
        assert!(rs.rows()[0].is_empty());
    }

    #[test]
    fn zero_column_row_against_nonempty_description() {
        let mut a = assembler();
        a.row_description(&row_description(&[("id", 23)])).unwrap();
        assert!(a.data_row(&data_row(&[])).is_err());
    }

    #[test]
    fn unknown_type_oid_resolves_to_unknown() {
        let mut a = assembler();
        a.row_description(&row_description(&[("m", 424_242)]))
            .unwrap();
        let rs = a.command_complete(b"SELECT 0\0").unwrap();
        assert_eq!(rs.types(), vec!["unknown"]);
        assert_eq!(rs.columns()[0].type_oid, 424_242);
    }

    #[test]
    fn invalid_utf8_value() {
        let mut a = assembler();
        a.row_description(&row_description(&[("b", 17)])).unwrap();
        let mut payload = 1i16.to_be_bytes().to_vec();
        payload.extend_from_slice(&2i32.to_be_bytes());
        payload.extend_from_slice(&[0xff, 0xfe]);
        assert!(a.data_row(&payload).is_err());
    }

    #[test]
    fn empty_query_gives_empty_result() {
        let mut a = assembler();
        let rs = a.empty_query();
        assert!(rs.rows().is_empty());
        assert_eq!(rs.status(), "");
    }
}
