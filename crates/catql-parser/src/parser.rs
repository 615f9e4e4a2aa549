use crate::ast::*;
use crate::lexer::{Lexer, Token};
use catql_core::{QueryError, Result};

/// Deepest nesting of parentheses, subqueries and prefix operators accepted.
pub const MAX_NESTING_DEPTH: usize = 64;

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    pub fn new(sql: &str) -> Result<Self> {
        let mut lexer = Lexer::new(sql);
        let tokens = lexer.tokenize()?;
        Ok(Self {
            tokens,
            position: 0,
            depth: 0,
        })
    }

    pub fn parse(&mut self) -> Result<Statement> {
        let statement = match self.current_token() {
            Token::Select => Statement::Select(self.parse_select()?),
            Token::Create | Token::Drop | Token::Insert | Token::Update | Token::Delete => {
                return Err(QueryError::ParseError(format!(
                    "Only SELECT statements are supported, found {:?}",
                    self.current_token()
                )));
            }
            other => {
                return Err(QueryError::ParseError(format!(
                    "Expected SELECT, found {:?}",
                    other
                )));
            }
        };

        if self.current_token() == &Token::Union {
            return Err(QueryError::Unsupported(
                "set operations (UNION) are not supported".to_string(),
            ));
        }

        self.match_token(&Token::Semicolon);
        if self.current_token() != &Token::Eof {
            return Err(QueryError::ParseError(format!(
                "Unexpected token after statement: {:?}",
                self.current_token()
            )));
        }

        Ok(statement)
    }

    fn parse_select(&mut self) -> Result<SelectStatement> {
        self.expect_token(&Token::Select)?;

        let distinct = self.match_token(&Token::Distinct);
        let projection = self.parse_projection()?;

        let from = if self.match_token(&Token::From) {
            Some(self.parse_from()?)
        } else {
            None
        };

        let selection = if self.match_token(&Token::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let group_by = if self.match_token(&Token::Group) {
            self.expect_token(&Token::By)?;
            self.parse_expr_list()?
        } else {
            vec![]
        };

        let having = if self.match_token(&Token::Having) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let order_by = if self.match_token(&Token::Order) {
            self.expect_token(&Token::By)?;
            self.parse_order_by()?
        } else {
            vec![]
        };

        let limit = if self.match_token(&Token::Limit) {
            Some(self.parse_limit()?)
        } else {
            None
        };

        Ok(SelectStatement {
            distinct,
            projection,
            from,
            selection,
            group_by,
            having,
            order_by,
            limit,
        })
    }

    fn parse_limit(&mut self) -> Result<LimitClause> {
        let first = self.parse_additive_expr()?;

        if self.match_token(&Token::Comma) {
            // MySQL form: LIMIT offset, count
            let count = self.parse_additive_expr()?;
            return Ok(LimitClause {
                count: Some(count),
                offset: Some(first),
            });
        }

        let offset = if self.match_token(&Token::Offset) {
            Some(self.parse_additive_expr()?)
        } else {
            None
        };

        Ok(LimitClause {
            count: Some(first),
            offset,
        })
    }

    fn parse_projection(&mut self) -> Result<Vec<SelectItem>> {
        let mut items = vec![];

        loop {
            if self.match_token(&Token::Star) {
                items.push(SelectItem::Wildcard);
            } else if let (Token::Identifier(name), Token::Dot, Token::Star) =
                (self.peek_token(0), self.peek_token(1), self.peek_token(2))
            {
                let qualifier = name.clone();
                self.position += 3;
                items.push(SelectItem::QualifiedWildcard(qualifier));
            } else {
                let expr = self.parse_expr()?;
                match self.parse_alias()? {
                    Some(alias) => items.push(SelectItem::ExprWithAlias { expr, alias }),
                    None => items.push(SelectItem::UnnamedExpr(expr)),
                }
            }

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        Ok(items)
    }

    /// FROM list: table factors joined by JOIN clauses or commas.
    fn parse_from(&mut self) -> Result<TableReference> {
        let mut left = self.parse_table_factor()?;

        loop {
            if self.match_token(&Token::Comma) {
                let right = self.parse_table_factor()?;
                left = TableReference::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                    join_type: JoinType::Cross,
                    on: None,
                };
            } else if self.is_join_keyword() {
                let join_type = self.parse_join_type()?;
                self.expect_token(&Token::Join)?;
                let right = self.parse_table_factor()?;
                let on = if join_type != JoinType::Cross && self.match_token(&Token::On) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                left = TableReference::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                    join_type,
                    on,
                };
            } else {
                break;
            }
        }

        Ok(left)
    }

    fn parse_table_factor(&mut self) -> Result<TableReference> {
        if self.match_token(&Token::LeftParen) {
            if self.current_token() != &Token::Select {
                return Err(QueryError::ParseError(format!(
                    "Expected subquery after '(', found {:?}",
                    self.current_token()
                )));
            }
            let query = self.nested(Self::parse_select)?;
            self.expect_token(&Token::RightParen)?;
            let alias = self.parse_alias()?;
            return Ok(TableReference::Subquery {
                query: Box::new(query),
                alias,
            });
        }

        let mut name = self.parse_identifier()?;
        // schema-qualified names keep their dotted form
        while self.match_token(&Token::Dot) {
            name.push('.');
            name.push_str(&self.parse_identifier()?);
        }
        let alias = self.parse_alias()?;

        Ok(TableReference::Table { name, alias })
    }

    fn parse_alias(&mut self) -> Result<Option<String>> {
        if self.match_token(&Token::As) {
            return Ok(Some(self.parse_identifier()?));
        }
        if let Token::Identifier(id) = self.current_token() {
            let alias = id.clone();
            self.advance();
            return Ok(Some(alias));
        }
        Ok(None)
    }

    fn is_join_keyword(&self) -> bool {
        matches!(
            self.current_token(),
            Token::Join | Token::Inner | Token::Left | Token::Right | Token::Full | Token::Cross
        )
    }

    fn parse_join_type(&mut self) -> Result<JoinType> {
        let join_type = match self.current_token() {
            Token::Cross => {
                self.advance();
                JoinType::Cross
            }
            Token::Inner => {
                self.advance();
                JoinType::Inner
            }
            Token::Left => {
                self.advance();
                self.match_token(&Token::Outer);
                JoinType::Left
            }
            Token::Right => {
                self.advance();
                self.match_token(&Token::Outer);
                JoinType::Right
            }
            Token::Full => {
                self.advance();
                self.match_token(&Token::Outer);
                JoinType::Full
            }
            // bare JOIN, left for the caller to consume
            Token::Join => JoinType::Inner,
            _ => return Err(QueryError::ParseError("Expected JOIN keyword".to_string())),
        };

        Ok(join_type)
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.nested(Self::parse_or_expr)
    }

    /// Run one level of recursive descent, refusing input nested too deeply
    /// to parse without exhausting the stack.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(QueryError::ParseError(format!(
                "statement nested deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expr()?;

        while self.match_token(&Token::Or) {
            let right = self.parse_and_expr()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::Or,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_not_expr()?;

        while self.match_token(&Token::And) {
            let right = self.parse_not_expr()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::And,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr> {
        if self.match_token(&Token::Not) {
            let expr = self.nested(Self::parse_not_expr)?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: Box::new(expr),
            });
        }

        self.parse_comparison_expr()
    }

    fn parse_comparison_expr(&mut self) -> Result<Expr> {
        let left = self.parse_additive_expr()?;

        if self.match_token(&Token::Is) {
            let negated = self.match_token(&Token::Not);
            self.expect_token(&Token::Null)?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let negated = self.current_token() == &Token::Not
            && matches!(self.peek_token(1), Token::Between | Token::In | Token::Like);
        if negated {
            self.advance();
        }

        if self.match_token(&Token::Between) {
            let low = self.parse_additive_expr()?;
            self.expect_token(&Token::And)?;
            let high = self.parse_additive_expr()?;
            return Ok(Expr::Between {
                expr: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            });
        }

        if self.match_token(&Token::In) {
            self.expect_token(&Token::LeftParen)?;
            if self.current_token() == &Token::Select {
                return Err(QueryError::Unsupported(
                    "IN subqueries are not supported".to_string(),
                ));
            }
            let list = self.parse_expr_list()?;
            self.expect_token(&Token::RightParen)?;
            return Ok(Expr::InList {
                expr: Box::new(left),
                list,
                negated,
            });
        }

        if self.match_token(&Token::Like) {
            let pattern = self.parse_additive_expr()?;
            return Ok(Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            });
        }

        if let Some(op) = self.match_comparison_op() {
            let right = self.parse_additive_expr()?;
            return Ok(Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_additive_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative_expr()?;

        while let Some(op) = self.match_additive_op() {
            let right = self.parse_multiplicative_expr()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary_expr()?;

        while let Some(op) = self.match_multiplicative_op() {
            let right = self.parse_unary_expr()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        if self.match_token(&Token::Minus) {
            let expr = self.nested(Self::parse_unary_expr)?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr: Box::new(expr),
            });
        }

        if self.match_token(&Token::Plus) {
            return self.nested(Self::parse_unary_expr);
        }

        self.parse_primary_expr()
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        match self.current_token() {
            Token::Number(n) => {
                let num = n.clone();
                self.advance();
                Ok(Expr::Literal(Literal::Number(num)))
            }
            Token::String(s) => {
                let text = s.clone();
                self.advance();
                Ok(Expr::Literal(Literal::String(text)))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            Token::Null => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            Token::Identifier(id) => {
                let name = id.clone();
                self.advance();

                if self.current_token() == &Token::LeftParen {
                    return self.parse_function_call(&name);
                }

                if self.match_token(&Token::Dot) {
                    let column = self.parse_identifier()?;
                    Ok(Expr::QualifiedColumn {
                        table: name,
                        column,
                    })
                } else {
                    Ok(Expr::Column(name))
                }
            }
            Token::LeftParen => {
                self.advance();
                if self.current_token() == &Token::Select {
                    let query = self.nested(Self::parse_select)?;
                    self.expect_token(&Token::RightParen)?;
                    return Ok(Expr::Subquery(Box::new(query)));
                }
                let expr = self.parse_expr()?;
                self.expect_token(&Token::RightParen)?;
                Ok(expr)
            }
            _ => Err(QueryError::ParseError(format!(
                "Unexpected token: {:?}",
                self.current_token()
            ))),
        }
    }

    fn parse_function_call(&mut self, name: &str) -> Result<Expr> {
        let func = ScalarFunction::from_name(name)
            .ok_or_else(|| QueryError::ParseError(format!("Unknown function: {}", name)))?;

        self.expect_token(&Token::LeftParen)?;
        let args = if self.current_token() == &Token::RightParen {
            vec![]
        } else {
            self.parse_expr_list()?
        };
        self.expect_token(&Token::RightParen)?;

        Ok(Expr::ScalarFunction { func, args })
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut exprs = vec![];

        loop {
            exprs.push(self.parse_expr()?);

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        Ok(exprs)
    }

    fn parse_order_by(&mut self) -> Result<Vec<OrderByExpr>> {
        let mut order_by = vec![];

        loop {
            let expr = self.parse_expr()?;
            let asc = if self.match_token(&Token::Desc) {
                false
            } else {
                self.match_token(&Token::Asc);
                true
            };

            order_by.push(OrderByExpr { expr, asc });

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        Ok(order_by)
    }

    fn parse_identifier(&mut self) -> Result<String> {
        match self.current_token() {
            Token::Identifier(id) => {
                let name = id.clone();
                self.advance();
                Ok(name)
            }
            other => Err(QueryError::ParseError(format!(
                "Expected identifier, found {:?}",
                other
            ))),
        }
    }

    fn match_comparison_op(&mut self) -> Option<BinaryOperator> {
        let op = match self.current_token() {
            Token::Equal => Some(BinaryOperator::Equal),
            Token::NotEqual => Some(BinaryOperator::NotEqual),
            Token::Less => Some(BinaryOperator::Less),
            Token::LessEqual => Some(BinaryOperator::LessEqual),
            Token::Greater => Some(BinaryOperator::Greater),
            Token::GreaterEqual => Some(BinaryOperator::GreaterEqual),
            _ => None,
        };

        if op.is_some() {
            self.advance();
        }

        op
    }

    fn match_additive_op(&mut self) -> Option<BinaryOperator> {
        let op = match self.current_token() {
            Token::Plus => Some(BinaryOperator::Plus),
            Token::Minus => Some(BinaryOperator::Minus),
            _ => None,
        };

        if op.is_some() {
            self.advance();
        }

        op
    }

    fn match_multiplicative_op(&mut self) -> Option<BinaryOperator> {
        let op = match self.current_token() {
            Token::Star => Some(BinaryOperator::Multiply),
            Token::Slash => Some(BinaryOperator::Divide),
            Token::Percent => Some(BinaryOperator::Modulo),
            _ => None,
        };

        if op.is_some() {
            self.advance();
        }

        op
    }

    fn current_token(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn peek_token(&self, offset: usize) -> &Token {
        let index = (self.position + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.current_token() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, token: &Token) -> Result<()> {
        if self.current_token() == token {
            self.advance();
            Ok(())
        } else {
            Err(QueryError::ParseError(format!(
                "Expected {:?}, found {:?}",
                token,
                self.current_token()
            )))
        }
    }
}
