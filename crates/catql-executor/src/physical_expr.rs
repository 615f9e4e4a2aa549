//! Expressions bound to a schema.
//!
//! Compilation resolves every column reference to a schema position once, so
//! per-row evaluation is a positional lookup and never a name search.

use catql_core::{QueryError, Result, ScalarValue, Schema};
use catql_parser::{BinaryOperator, Expr, Literal, ScalarFunction, UnaryOperator};

#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalExpr {
    Column {
        index: usize,
        name: String,
    },
    Literal(ScalarValue),
    BinaryExpr {
        left: Box<PhysicalExpr>,
        op: BinaryOperator,
        right: Box<PhysicalExpr>,
    },
    Not(Box<PhysicalExpr>),
    Negative(Box<PhysicalExpr>),
    IsNull {
        expr: Box<PhysicalExpr>,
        negated: bool,
    },
    Between {
        expr: Box<PhysicalExpr>,
        low: Box<PhysicalExpr>,
        high: Box<PhysicalExpr>,
        negated: bool,
    },
    InList {
        expr: Box<PhysicalExpr>,
        list: Vec<PhysicalExpr>,
        negated: bool,
    },
    Like {
        expr: Box<PhysicalExpr>,
        pattern: Box<PhysicalExpr>,
        negated: bool,
    },
    ScalarFunction {
        func: ScalarFunction,
        args: Vec<PhysicalExpr>,
    },
}

pub fn create_physical_expr(expr: &Expr, schema: &Schema) -> Result<PhysicalExpr> {
    let physical = match expr {
        Expr::Column(name) | Expr::QualifiedColumn { column: name, .. } => {
            let index = schema.index_of(name)?;
            PhysicalExpr::Column {
                index,
                name: name.clone(),
            }
        }
        Expr::Literal(literal) => PhysicalExpr::Literal(literal_value(literal)?),
        Expr::BinaryOp { left, op, right } => PhysicalExpr::BinaryExpr {
            left: Box::new(create_physical_expr(left, schema)?),
            op: *op,
            right: Box::new(create_physical_expr(right, schema)?),
        },
        Expr::UnaryOp { op, expr } => {
            let inner = Box::new(create_physical_expr(expr, schema)?);
            match op {
                UnaryOperator::Not => PhysicalExpr::Not(inner),
                UnaryOperator::Minus => PhysicalExpr::Negative(inner),
            }
        }
        Expr::IsNull { expr, negated } => PhysicalExpr::IsNull {
            expr: Box::new(create_physical_expr(expr, schema)?),
            negated: *negated,
        },
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => PhysicalExpr::Between {
            expr: Box::new(create_physical_expr(expr, schema)?),
            low: Box::new(create_physical_expr(low, schema)?),
            high: Box::new(create_physical_expr(high, schema)?),
            negated: *negated,
        },
        Expr::InList {
            expr,
            list,
            negated,
        } => PhysicalExpr::InList {
            expr: Box::new(create_physical_expr(expr, schema)?),
            list: list
                .iter()
                .map(|e| create_physical_expr(e, schema))
                .collect::<Result<Vec<_>>>()?,
            negated: *negated,
        },
        Expr::Like {
            expr,
            pattern,
            negated,
        } => PhysicalExpr::Like {
            expr: Box::new(create_physical_expr(expr, schema)?),
            pattern: Box::new(create_physical_expr(pattern, schema)?),
            negated: *negated,
        },
        Expr::ScalarFunction { func, args } => {
            check_arity(*func, args.len())?;
            PhysicalExpr::ScalarFunction {
                func: *func,
                args: args
                    .iter()
                    .map(|e| create_physical_expr(e, schema))
                    .collect::<Result<Vec<_>>>()?,
            }
        }
        Expr::Subquery(_) => {
            return Err(QueryError::Unsupported(
                "scalar subqueries in expressions are not supported".to_string(),
            ));
        }
    };

    Ok(physical)
}

fn literal_value(literal: &Literal) -> Result<ScalarValue> {
    match literal {
        Literal::Number(n) => ScalarValue::parse_number(n)
            .ok_or_else(|| QueryError::ParseError(format!("Invalid number: {}", n))),
        Literal::String(s) => Ok(ScalarValue::Utf8(s.clone())),
        Literal::Boolean(b) => Ok(ScalarValue::Boolean(*b)),
        Literal::Null => Ok(ScalarValue::Null),
    }
}

fn check_arity(func: ScalarFunction, count: usize) -> Result<()> {
    let ok = match func {
        ScalarFunction::Upper
        | ScalarFunction::Lower
        | ScalarFunction::Length
        | ScalarFunction::Trim
        | ScalarFunction::Abs => count == 1,
        ScalarFunction::Concat | ScalarFunction::Coalesce => count >= 1,
    };

    if ok {
        Ok(())
    } else {
        Err(QueryError::ParseError(format!(
            "Wrong number of arguments to {}: {}",
            func.name(),
            count
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catql_parser::{parse, Statement};

    fn where_clause(sql: &str) -> Expr {
        let Statement::Select(select) = parse(sql).unwrap();
        select.selection.unwrap()
    }

    #[test]
    fn test_columns_bind_to_positions() {
        let schema = Schema::virtual_table();
        let expr = where_clause("select * from t where t.c3 = c1");
        let physical = create_physical_expr(&expr, &schema).unwrap();
        match physical {
            PhysicalExpr::BinaryExpr { left, right, .. } => {
                assert!(matches!(*left, PhysicalExpr::Column { index: 2, .. }));
                assert!(matches!(*right, PhysicalExpr::Column { index: 0, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_column_is_fatal() {
        let schema = Schema::virtual_table();
        let expr = where_clause("select * from t where name = 'x'");
        assert_eq!(
            create_physical_expr(&expr, &schema),
            Err(QueryError::ColumnNotFound("name".to_string()))
        );
    }

    #[test]
    fn test_function_arity() {
        let schema = Schema::virtual_table();
        let expr = where_clause("select * from t where upper(c1, c2) = 'A'");
        assert!(matches!(
            create_physical_expr(&expr, &schema),
            Err(QueryError::ParseError(_))
        ));
    }
}
