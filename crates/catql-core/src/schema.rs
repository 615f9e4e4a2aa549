use crate::error::{QueryError, Result};
use crate::row::column_name;
use crate::types::DataType;

/// Number of positional columns every row is bound against: `c1` through `c9`.
pub const VIRTUAL_COLUMN_COUNT: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    data_type: DataType,
    nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self { fields: vec![] }
    }

    /// The fixed schema of nine nullable string columns `c1..c9`.
    pub fn virtual_table() -> Self {
        let fields = (0..VIRTUAL_COLUMN_COUNT)
            .map(|i| Field::new(column_name(i), DataType::Utf8, true))
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column lookup is case-insensitive, matching SQL identifier rules.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| QueryError::ColumnNotFound(name.to_string()))
    }

    pub fn field_with_name(&self, name: &str) -> Result<&Field> {
        let index = self.index_of(name)?;
        Ok(&self.fields[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_table_layout() {
        let schema = Schema::virtual_table();
        assert_eq!(schema.len(), VIRTUAL_COLUMN_COUNT);
        assert_eq!(schema.field(0).map(|f| f.name()), Some("c1"));
        assert_eq!(schema.field(8).map(|f| f.name()), Some("c9"));
        assert!(schema
            .fields()
            .iter()
            .all(|f| f.nullable() && *f.data_type() == DataType::Utf8));
    }

    #[test]
    fn test_index_of() {
        let schema = Schema::virtual_table();
        assert_eq!(schema.index_of("c3").unwrap(), 2);
        assert_eq!(schema.index_of("C3").unwrap(), 2);
        assert!(matches!(
            schema.index_of("c10"),
            Err(QueryError::ColumnNotFound(_))
        ));
    }
}
