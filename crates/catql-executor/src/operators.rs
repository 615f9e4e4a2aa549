use crate::physical_expr::PhysicalExpr;
use catql_core::{QueryError, Result, ScalarValue};
use catql_parser::{BinaryOperator, ScalarFunction};
use std::cmp::Ordering;

/// Evaluate an expression against one bound row (one slot per schema column).
pub fn evaluate_expr(expr: &PhysicalExpr, row: &[Option<&str>]) -> Result<ScalarValue> {
    match expr {
        PhysicalExpr::Column { index, .. } => Ok(match row.get(*index).copied().flatten() {
            Some(text) => ScalarValue::Utf8(text.to_string()),
            None => ScalarValue::Null,
        }),
        PhysicalExpr::Literal(value) => Ok(value.clone()),
        PhysicalExpr::BinaryExpr { left, op, right } => match op {
            BinaryOperator::And => evaluate_and(left, right, row),
            BinaryOperator::Or => evaluate_or(left, right, row),
            _ => {
                let l = evaluate_expr(left, row)?;
                let r = evaluate_expr(right, row)?;
                evaluate_binary_op(&l, *op, &r)
            }
        },
        PhysicalExpr::Not(inner) => {
            let value = evaluate_expr(inner, row)?;
            Ok(match to_bool(&value)? {
                Some(b) => ScalarValue::Boolean(!b),
                None => ScalarValue::Null,
            })
        }
        PhysicalExpr::Negative(inner) => negate(&evaluate_expr(inner, row)?),
        PhysicalExpr::IsNull { expr, negated } => {
            let value = evaluate_expr(expr, row)?;
            Ok(ScalarValue::Boolean(value.is_null() != *negated))
        }
        PhysicalExpr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let value = evaluate_expr(expr, row)?;
            let low = evaluate_expr(low, row)?;
            let high = evaluate_expr(high, row)?;
            if value.is_null() || low.is_null() || high.is_null() {
                return Ok(ScalarValue::Null);
            }
            let inside = compare_values(&value, &low)? != Ordering::Less
                && compare_values(&value, &high)? != Ordering::Greater;
            Ok(ScalarValue::Boolean(inside != *negated))
        }
        PhysicalExpr::InList {
            expr,
            list,
            negated,
        } => evaluate_in_list(expr, list, *negated, row),
        PhysicalExpr::Like {
            expr,
            pattern,
            negated,
        } => {
            let value = evaluate_expr(expr, row)?;
            let pattern = evaluate_expr(pattern, row)?;
            if value.is_null() || pattern.is_null() {
                return Ok(ScalarValue::Null);
            }
            let matched = like_match(&to_text(&value), &to_text(&pattern));
            Ok(ScalarValue::Boolean(matched != *negated))
        }
        PhysicalExpr::ScalarFunction { func, args } => {
            let values = args
                .iter()
                .map(|arg| evaluate_expr(arg, row))
                .collect::<Result<Vec<_>>>()?;
            evaluate_scalar_function(*func, values)
        }
    }
}

/// SQL truthiness; `None` is unknown (NULL).
pub fn to_bool(value: &ScalarValue) -> Result<Option<bool>> {
    match value {
        ScalarValue::Null => Ok(None),
        ScalarValue::Boolean(b) => Ok(Some(*b)),
        ScalarValue::Int64(v) => Ok(Some(*v != 0)),
        ScalarValue::Float64(v) => Ok(Some(*v != 0.0)),
        ScalarValue::Utf8(s) => match ScalarValue::parse_number(s) {
            Some(n) => to_bool(&n),
            None => Err(QueryError::TypeMismatch {
                expected: "boolean".to_string(),
                found: format!("'{}'", s),
            }),
        },
    }
}

fn evaluate_and(
    left: &PhysicalExpr,
    right: &PhysicalExpr,
    row: &[Option<&str>],
) -> Result<ScalarValue> {
    let l = to_bool(&evaluate_expr(left, row)?)?;
    if l == Some(false) {
        return Ok(ScalarValue::Boolean(false));
    }
    let r = to_bool(&evaluate_expr(right, row)?)?;
    Ok(match (l, r) {
        (_, Some(false)) => ScalarValue::Boolean(false),
        (Some(true), Some(true)) => ScalarValue::Boolean(true),
        _ => ScalarValue::Null,
    })
}

fn evaluate_or(
    left: &PhysicalExpr,
    right: &PhysicalExpr,
    row: &[Option<&str>],
) -> Result<ScalarValue> {
    let l = to_bool(&evaluate_expr(left, row)?)?;
    if l == Some(true) {
        return Ok(ScalarValue::Boolean(true));
    }
    let r = to_bool(&evaluate_expr(right, row)?)?;
    Ok(match (l, r) {
        (_, Some(true)) => ScalarValue::Boolean(true),
        (Some(false), Some(false)) => ScalarValue::Boolean(false),
        _ => ScalarValue::Null,
    })
}

fn evaluate_in_list(
    expr: &PhysicalExpr,
    list: &[PhysicalExpr],
    negated: bool,
    row: &[Option<&str>],
) -> Result<ScalarValue> {
    let value = evaluate_expr(expr, row)?;
    if value.is_null() {
        return Ok(ScalarValue::Null);
    }

    let mut saw_null = false;
    for item in list {
        let candidate = evaluate_expr(item, row)?;
        if candidate.is_null() {
            saw_null = true;
            continue;
        }
        if compare_values(&value, &candidate)? == Ordering::Equal {
            return Ok(ScalarValue::Boolean(!negated));
        }
    }

    if saw_null {
        Ok(ScalarValue::Null)
    } else {
        Ok(ScalarValue::Boolean(negated))
    }
}

fn evaluate_binary_op(
    left: &ScalarValue,
    op: BinaryOperator,
    right: &ScalarValue,
) -> Result<ScalarValue> {
    if left.is_null() || right.is_null() {
        return Ok(ScalarValue::Null);
    }

    match op {
        BinaryOperator::Equal
        | BinaryOperator::NotEqual
        | BinaryOperator::Less
        | BinaryOperator::LessEqual
        | BinaryOperator::Greater
        | BinaryOperator::GreaterEqual => {
            let ordering = compare_values(left, right)?;
            let result = match op {
                BinaryOperator::Equal => ordering == Ordering::Equal,
                BinaryOperator::NotEqual => ordering != Ordering::Equal,
                BinaryOperator::Less => ordering == Ordering::Less,
                BinaryOperator::LessEqual => ordering != Ordering::Greater,
                BinaryOperator::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(ScalarValue::Boolean(result))
        }
        BinaryOperator::Plus
        | BinaryOperator::Minus
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => evaluate_arithmetic(left, op, right),
        BinaryOperator::And | BinaryOperator::Or => Err(QueryError::EvaluationError(
            "logical operator evaluated as a value operator".to_string(),
        )),
    }
}

/// Two strings compare as strings; otherwise both sides are coerced to numbers.
fn compare_values(left: &ScalarValue, right: &ScalarValue) -> Result<Ordering> {
    if let (ScalarValue::Utf8(l), ScalarValue::Utf8(r)) = (left, right) {
        return Ok(l.cmp(r));
    }

    let l = to_numeric(left)?;
    let r = to_numeric(right)?;
    l.partial_cmp_same(&r).ok_or_else(|| {
        QueryError::EvaluationError(format!("cannot compare {} with {}", left, right))
    })
}

fn to_numeric(value: &ScalarValue) -> Result<ScalarValue> {
    match value {
        ScalarValue::Int64(_) | ScalarValue::Float64(_) => Ok(value.clone()),
        ScalarValue::Boolean(b) => Ok(ScalarValue::Int64(i64::from(*b))),
        ScalarValue::Utf8(s) => {
            ScalarValue::parse_number(s).ok_or_else(|| QueryError::TypeMismatch {
                expected: "number".to_string(),
                found: format!("'{}'", s),
            })
        }
        ScalarValue::Null => Err(QueryError::EvaluationError(
            "NULL has no numeric value".to_string(),
        )),
    }
}

fn as_f64(value: &ScalarValue) -> f64 {
    match value {
        ScalarValue::Int64(v) => *v as f64,
        ScalarValue::Float64(v) => *v,
        _ => f64::NAN,
    }
}

fn evaluate_arithmetic(
    left: &ScalarValue,
    op: BinaryOperator,
    right: &ScalarValue,
) -> Result<ScalarValue> {
    let l = to_numeric(left)?;
    let r = to_numeric(right)?;
    let overflow = || QueryError::EvaluationError(format!("integer overflow in {:?}", op));

    if let (ScalarValue::Int64(a), ScalarValue::Int64(b)) = (&l, &r) {
        let (a, b) = (*a, *b);
        return match op {
            BinaryOperator::Plus => a.checked_add(b).map(ScalarValue::Int64).ok_or_else(overflow),
            BinaryOperator::Minus => a.checked_sub(b).map(ScalarValue::Int64).ok_or_else(overflow),
            BinaryOperator::Multiply => {
                a.checked_mul(b).map(ScalarValue::Int64).ok_or_else(overflow)
            }
            // Division always yields a double; a zero divisor yields NULL
            BinaryOperator::Divide if b == 0 => Ok(ScalarValue::Null),
            BinaryOperator::Divide => Ok(ScalarValue::Float64(a as f64 / b as f64)),
            BinaryOperator::Modulo if b == 0 => Ok(ScalarValue::Null),
            BinaryOperator::Modulo => a.checked_rem(b).map(ScalarValue::Int64).ok_or_else(overflow),
            _ => Err(overflow()),
        };
    }

    let (a, b) = (as_f64(&l), as_f64(&r));
    let result = match op {
        BinaryOperator::Plus => a + b,
        BinaryOperator::Minus => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide | BinaryOperator::Modulo if b == 0.0 => {
            return Ok(ScalarValue::Null)
        }
        BinaryOperator::Divide => a / b,
        BinaryOperator::Modulo => a % b,
        _ => {
            return Err(QueryError::EvaluationError(format!(
                "{:?} is not an arithmetic operator",
                op
            )))
        }
    };
    Ok(ScalarValue::Float64(result))
}

fn negate(value: &ScalarValue) -> Result<ScalarValue> {
    if value.is_null() {
        return Ok(ScalarValue::Null);
    }
    match to_numeric(value)? {
        ScalarValue::Int64(v) => v.checked_neg().map(ScalarValue::Int64).ok_or_else(|| {
            QueryError::EvaluationError("integer overflow in negation".to_string())
        }),
        ScalarValue::Float64(v) => Ok(ScalarValue::Float64(-v)),
        other => Err(QueryError::TypeMismatch {
            expected: "number".to_string(),
            found: other.to_string(),
        }),
    }
}

fn to_text(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Utf8(s) => s.clone(),
        other => other.to_string(),
    }
}

fn evaluate_scalar_function(func: ScalarFunction, args: Vec<ScalarValue>) -> Result<ScalarValue> {
    if func == ScalarFunction::Coalesce {
        return Ok(args
            .into_iter()
            .find(|v| !v.is_null())
            .unwrap_or(ScalarValue::Null));
    }

    if args.iter().any(ScalarValue::is_null) {
        return Ok(ScalarValue::Null);
    }

    let first = args.first().ok_or_else(|| {
        QueryError::EvaluationError(format!("{} called without arguments", func.name()))
    })?;

    match func {
        ScalarFunction::Upper => Ok(ScalarValue::Utf8(to_text(first).to_uppercase())),
        ScalarFunction::Lower => Ok(ScalarValue::Utf8(to_text(first).to_lowercase())),
        ScalarFunction::Trim => Ok(ScalarValue::Utf8(to_text(first).trim().to_string())),
        ScalarFunction::Length => Ok(ScalarValue::Int64(to_text(first).chars().count() as i64)),
        ScalarFunction::Concat => Ok(ScalarValue::Utf8(
            args.iter().map(to_text).collect::<String>(),
        )),
        ScalarFunction::Abs => match to_numeric(first)? {
            ScalarValue::Int64(v) => v.checked_abs().map(ScalarValue::Int64).ok_or_else(|| {
                QueryError::EvaluationError("integer overflow in ABS".to_string())
            }),
            other => Ok(ScalarValue::Float64(as_f64(&other).abs())),
        },
        ScalarFunction::Coalesce => Ok(first.clone()),
    }
}

enum LikeToken {
    AnySequence,
    AnyChar,
    Char(char),
}

/// SQL LIKE: `%` matches any run, `_` one character, `\` escapes the next.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::AnySequence,
            '_' => LikeToken::AnyChar,
            '\\' => LikeToken::Char(chars.next().unwrap_or('\\')),
            other => LikeToken::Char(other),
        });
    }

    let text: Vec<char> = text.chars().collect();
    let (mut t, mut p) = (0usize, 0usize);
    // Position of the last `%` and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(LikeToken::AnySequence) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(LikeToken::AnyChar) => {
                t += 1;
                p += 1;
            }
            Some(LikeToken::Char(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    tokens[p..]
        .iter()
        .all(|token| matches!(token, LikeToken::AnySequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical_expr::create_physical_expr;
    use catql_core::{Row, Schema};
    use catql_parser::{parse, Statement};

    fn eval(predicate: &str, row: &Row) -> Result<ScalarValue> {
        let Statement::Select(select) = parse(&format!("select * from t where {}", predicate))?;
        let schema = Schema::virtual_table();
        let expr = create_physical_expr(&select.selection.unwrap(), &schema)?;
        evaluate_expr(&expr, &row.bind(&schema))
    }

    fn row(fields: &[&str]) -> Row {
        Row::from_fields(fields.iter().copied())
    }

    #[test]
    fn test_numeric_comparison_coerces_strings() {
        assert_eq!(eval("c1 > 10", &row(&["15"])), Ok(ScalarValue::Boolean(true)));
        assert_eq!(eval("c1 > 10", &row(&["5"])), Ok(ScalarValue::Boolean(false)));
        assert_eq!(eval("c1 = 2.5", &row(&["2.50"])), Ok(ScalarValue::Boolean(true)));
    }

    #[test]
    fn test_string_comparison_is_lexicographic() {
        assert_eq!(
            eval("c1 < c2", &row(&["100", "20"])),
            Ok(ScalarValue::Boolean(true))
        );
        assert_eq!(eval("c1 = 'abc'", &row(&["abc"])), Ok(ScalarValue::Boolean(true)));
    }

    #[test]
    fn test_non_numeric_field_is_row_local_error() {
        let err = eval("c1 > 10", &row(&["abc"])).unwrap_err();
        assert!(err.is_row_local());
    }

    #[test]
    fn test_missing_column_is_null() {
        assert_eq!(eval("c3 > 1", &row(&["1"])), Ok(ScalarValue::Null));
        assert_eq!(eval("c3 is null", &row(&["1"])), Ok(ScalarValue::Boolean(true)));
        assert_eq!(eval("c1 is not null", &Row::new()), Ok(ScalarValue::Boolean(false)));
    }

    #[test]
    fn test_three_valued_logic() {
        let r = row(&["5"]);
        assert_eq!(eval("c2 > 1 and c1 > 10", &r), Ok(ScalarValue::Boolean(false)));
        assert_eq!(eval("c2 > 1 and c1 > 1", &r), Ok(ScalarValue::Null));
        assert_eq!(eval("c2 > 1 or c1 > 1", &r), Ok(ScalarValue::Boolean(true)));
        assert_eq!(eval("not c2 > 1", &r), Ok(ScalarValue::Null));
        // short circuit skips the failing right side
        assert_eq!(
            eval("c1 > 10 and c1 > 'x'", &r),
            Ok(ScalarValue::Boolean(false))
        );
    }

    #[test]
    fn test_arithmetic() {
        let r = row(&["7", "2"]);
        assert_eq!(eval("c1 + c2", &r), Ok(ScalarValue::Int64(9)));
        assert_eq!(eval("c1 % c2", &r), Ok(ScalarValue::Int64(1)));
        assert_eq!(eval("c1 / c2", &r), Ok(ScalarValue::Float64(3.5)));
        assert_eq!(eval("c1 / 0", &r), Ok(ScalarValue::Null));
        assert_eq!(eval("-c1 * 2", &r), Ok(ScalarValue::Int64(-14)));
    }

    #[test]
    fn test_between_and_in() {
        let r = row(&["15"]);
        assert_eq!(eval("c1 between 10 and 20", &r), Ok(ScalarValue::Boolean(true)));
        assert_eq!(
            eval("c1 not between 10 and 20", &r),
            Ok(ScalarValue::Boolean(false))
        );
        assert_eq!(eval("c1 in (1, 15, 30)", &r), Ok(ScalarValue::Boolean(true)));
        assert_eq!(eval("c1 not in (1, 2)", &r), Ok(ScalarValue::Boolean(true)));
        assert_eq!(eval("c1 in (1, null)", &r), Ok(ScalarValue::Null));
    }

    #[test]
    fn test_like() {
        assert!(like_match("error: disk full", "error%"));
        assert!(like_match("abc", "a_c"));
        assert!(like_match("abc", "%"));
        assert!(like_match("a%c", "a\\%c"));
        assert!(!like_match("abd", "a\\%c"));
        assert!(like_match("mississippi", "%iss%pi"));
        assert!(!like_match("abc", "ab"));
        assert_eq!(
            eval("c1 not like 'GET%'", &row(&["POST"])),
            Ok(ScalarValue::Boolean(true))
        );
    }

    #[test]
    fn test_scalar_functions() {
        let r = row(&["  Mixed ", "-4"]);
        assert_eq!(
            eval("upper(trim(c1))", &r),
            Ok(ScalarValue::Utf8("MIXED".to_string()))
        );
        assert_eq!(eval("length(c1)", &r), Ok(ScalarValue::Int64(8)));
        assert_eq!(eval("abs(c2)", &r), Ok(ScalarValue::Int64(4)));
        assert_eq!(
            eval("concat(c2, 'x')", &r),
            Ok(ScalarValue::Utf8("-4x".to_string()))
        );
        assert_eq!(
            eval("coalesce(c5, c2)", &r),
            Ok(ScalarValue::Utf8("-4".to_string()))
        );
    }

    #[test]
    fn test_to_bool() {
        assert_eq!(to_bool(&ScalarValue::Int64(3)), Ok(Some(true)));
        assert_eq!(to_bool(&ScalarValue::Utf8("0".into())), Ok(Some(false)));
        assert_eq!(to_bool(&ScalarValue::Null), Ok(None));
        assert!(to_bool(&ScalarValue::Utf8("yes".into())).is_err());
    }
}
