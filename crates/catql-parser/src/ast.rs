#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub distinct: bool,
    pub projection: Vec<SelectItem>,
    pub from: Option<TableReference>,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<LimitClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,
    QualifiedWildcard(String),
    UnnamedExpr(Expr),
    ExprWithAlias { expr: Expr, alias: String },
}

/// The `FROM` target of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum TableReference {
    /// table_name [AS alias]
    Table { name: String, alias: Option<String> },
    /// (SELECT ...) [AS alias]
    Subquery {
        query: Box<SelectStatement>,
        alias: Option<String>,
    },
    /// left JOIN right [ON expr]; a comma-separated list parses as a cross join.
    Join {
        left: Box<TableReference>,
        right: Box<TableReference>,
        join_type: JoinType,
        on: Option<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// `LIMIT count [OFFSET offset]` or `LIMIT offset, count`.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitClause {
    pub count: Option<Expr>,
    pub offset: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    QualifiedColumn {
        table: String,
        column: String,
    },
    Literal(Literal),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    /// Scalar function call: UPPER(x), CONCAT(a, b), etc.
    ScalarFunction {
        func: ScalarFunction,
        args: Vec<Expr>,
    },
    /// Scalar subquery: (SELECT ...)
    Subquery(Box<SelectStatement>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(String),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub asc: bool,
}

/// Built-in scalar functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunction {
    Upper,
    Lower,
    Length,
    Concat,
    Trim,
    Abs,
    Coalesce,
}

impl ScalarFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        let func = match name.to_uppercase().as_str() {
            "UPPER" => ScalarFunction::Upper,
            "LOWER" => ScalarFunction::Lower,
            "LENGTH" | "LEN" => ScalarFunction::Length,
            "CONCAT" => ScalarFunction::Concat,
            "TRIM" => ScalarFunction::Trim,
            "ABS" => ScalarFunction::Abs,
            "COALESCE" => ScalarFunction::Coalesce,
            _ => return None,
        };
        Some(func)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarFunction::Upper => "UPPER",
            ScalarFunction::Lower => "LOWER",
            ScalarFunction::Length => "LENGTH",
            ScalarFunction::Concat => "CONCAT",
            ScalarFunction::Trim => "TRIM",
            ScalarFunction::Abs => "ABS",
            ScalarFunction::Coalesce => "COALESCE",
        }
    }
}
