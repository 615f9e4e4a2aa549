use crate::operators::{evaluate_expr, to_bool};
use crate::physical_expr::{create_physical_expr, PhysicalExpr};
use catql_core::{Result, Row, ScalarValue, Schema};
use catql_parser::Expr;

/// A compiled `WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expr: PhysicalExpr,
}

impl Predicate {
    pub fn compile(expr: &Expr, schema: &Schema) -> Result<Self> {
        Ok(Self {
            expr: create_physical_expr(expr, schema)?,
        })
    }

    pub fn expr(&self) -> &PhysicalExpr {
        &self.expr
    }

    /// A row matches only when the predicate is true; NULL counts as false.
    pub fn matches(&self, row: &Row, schema: &Schema) -> Result<bool> {
        let bound = row.bind(schema);
        let value = evaluate_expr(&self.expr, &bound)?;
        Ok(to_bool(&value)?.unwrap_or(false))
    }
}

/// Evaluate an expression that may not reference any column, e.g. a LIMIT bound.
pub fn evaluate_constant(expr: &Expr) -> Result<ScalarValue> {
    let physical = create_physical_expr(expr, &Schema::empty())?;
    evaluate_expr(&physical, &[])
}
