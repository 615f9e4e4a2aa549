pub mod error;
pub mod row;
pub mod schema;
pub mod types;

pub use error::{QueryError, Result};
pub use row::{column_name, Row};
pub use schema::{Field, Schema, VIRTUAL_COLUMN_COUNT};
pub use types::*;
