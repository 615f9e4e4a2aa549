//! Rows flowing through the pipeline.
//!
//! A row maps positional column names (`c1`, `c2`, ...) to raw text. Sources
//! may supply fewer columns than the virtual schema declares; missing columns
//! bind as NULL.

use crate::schema::{Schema, VIRTUAL_COLUMN_COUNT};
use std::collections::HashMap;

/// Positional column name for a zero-based field index.
pub fn column_name(index: usize) -> String {
    format!("c{}", index + 1)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: HashMap<String, String>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from positional fields: the i-th field becomes `c{i+1}`.
    /// Fields past the ninth have no column to bind to and are dropped.
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fields
            .into_iter()
            .take(VIRTUAL_COLUMN_COUNT)
            .enumerate()
            .map(|(i, v)| (column_name(i), v))
            .collect()
    }

    /// Split a line on runs of whitespace into a row.
    pub fn from_line(line: &str) -> Self {
        Self::from_fields(line.split_whitespace())
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Present columns and their values, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Bind the row to a schema: one slot per schema field, `None` when absent.
    pub fn bind<'a>(&'a self, schema: &Schema) -> Vec<Option<&'a str>> {
        schema.fields().iter().map(|f| self.get(f.name())).collect()
    }

    /// Values of the schema's columns present in this row, in schema order,
    /// joined by single spaces.
    pub fn to_text(&self, schema: &Schema) -> String {
        self.bind(schema)
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_line_positional() {
        let row = Row::from_line("  alpha\tbeta   gamma ");
        assert_eq!(row.len(), 3);
        assert_eq!(row.get("c1"), Some("alpha"));
        assert_eq!(row.get("c2"), Some("beta"));
        assert_eq!(row.get("c3"), Some("gamma"));
        assert_eq!(row.get("c4"), None);
    }

    #[test]
    fn test_blank_line_is_empty_row() {
        let row = Row::from_line("   ");
        assert!(row.is_empty());
    }

    #[test]
    fn test_extra_fields_dropped() {
        let row = Row::from_line("1 2 3 4 5 6 7 8 9 10 11");
        assert_eq!(row.len(), VIRTUAL_COLUMN_COUNT);
        assert_eq!(row.get("c9"), Some("9"));
        assert!(!row.contains("c10"));
    }

    #[test]
    fn test_bind_and_text_skip_absent_columns() {
        let schema = Schema::virtual_table();
        let row = Row::new().with("c3", "z").with("c1", "x");
        let bound = row.bind(&schema);
        assert_eq!(bound[0], Some("x"));
        assert_eq!(bound[1], None);
        assert_eq!(bound[2], Some("z"));
        assert_eq!(row.to_text(&schema), "x z");
    }

    #[test]
    fn test_collect_and_iterate() {
        let row: Row = [("c2", "b"), ("c1", "a")].into_iter().collect();
        assert_eq!(row, Row::from_fields(["a", "b"]));

        let mut pairs: Vec<(&str, &str)> = row.iter().collect();
        pairs.sort();
        assert_eq!(pairs, vec![("c1", "a"), ("c2", "b")]);
    }
}
