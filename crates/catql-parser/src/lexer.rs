use catql_core::{QueryError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Select,
    Distinct,
    From,
    Where,
    Group,
    Order,
    By,
    Having,
    Limit,
    Offset,
    Join,
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Outer,
    On,
    As,
    And,
    Or,
    Not,
    In,
    Between,
    Like,
    Is,
    Null,
    Asc,
    Desc,
    Union,
    True,
    False,
    // Statement keywords we recognise only to reject
    Create,
    Drop,
    Insert,
    Update,
    Delete,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,
    Dot,
    Semicolon,

    // Literals
    Number(String),
    String(String),
    Identifier(String),

    // Special
    Eof,
}

fn single_char_token(ch: char) -> Option<Token> {
    let token = match ch {
        '+' => Token::Plus,
        '-' => Token::Minus,
        '*' => Token::Star,
        '/' => Token::Slash,
        '%' => Token::Percent,
        '(' => Token::LeftParen,
        ')' => Token::RightParen,
        ',' => Token::Comma,
        '.' => Token::Dot,
        ';' => Token::Semicolon,
        _ => return None,
    };
    Some(token)
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while self.position < self.input.len() {
            self.skip_whitespace();

            if self.position >= self.input.len() {
                break;
            }

            tokens.push(self.next_token()?);
        }

        tokens.push(Token::Eof);
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current_char();

        if let Some(token) = single_char_token(ch) {
            self.advance();
            return Ok(token);
        }

        let token = match ch {
            '=' => {
                self.advance();
                // tolerate `==`
                self.eat('=');
                Token::Equal
            }
            '<' => {
                self.advance();
                if self.eat('=') {
                    Token::LessEqual
                } else if self.eat('>') {
                    Token::NotEqual
                } else {
                    Token::Less
                }
            }
            '>' => {
                self.advance();
                if self.eat('=') {
                    Token::GreaterEqual
                } else {
                    Token::Greater
                }
            }
            '!' => {
                self.advance();
                if !self.eat('=') {
                    return Err(QueryError::ParseError(
                        "Unexpected character '!'".to_string(),
                    ));
                }
                Token::NotEqual
            }
            '\'' | '"' => self.read_string()?,
            '`' => self.read_quoted_identifier()?,
            _ if ch.is_ascii_digit() => self.read_number(),
            _ if ch.is_alphabetic() || ch == '_' => self.read_identifier(),
            _ => {
                return Err(QueryError::ParseError(format!(
                    "Unexpected character: '{}'",
                    ch
                )));
            }
        };

        Ok(token)
    }

    /// Consume `expected` if it is the next character.
    fn eat(&mut self, expected: char) -> bool {
        if self.position < self.input.len() && self.current_char() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Quoted string; a doubled quote character stands for itself.
    fn read_string(&mut self) -> Result<Token> {
        let quote = self.current_char();
        self.advance();

        let mut value = String::new();
        loop {
            if self.position >= self.input.len() {
                return Err(QueryError::ParseError("Unterminated string".to_string()));
            }
            let ch = self.current_char();
            self.advance();
            if ch == quote {
                if self.position < self.input.len() && self.current_char() == quote {
                    value.push(quote);
                    self.advance();
                    continue;
                }
                break;
            }
            value.push(ch);
        }

        Ok(Token::String(value))
    }

    fn read_quoted_identifier(&mut self) -> Result<Token> {
        self.advance();

        let mut ident = String::new();
        while self.position < self.input.len() && self.current_char() != '`' {
            ident.push(self.current_char());
            self.advance();
        }

        if self.position >= self.input.len() {
            return Err(QueryError::ParseError(
                "Unterminated quoted identifier".to_string(),
            ));
        }

        self.advance();
        Ok(Token::Identifier(ident))
    }

    fn read_number(&mut self) -> Token {
        let mut number = String::new();

        while self.position < self.input.len()
            && (self.current_char().is_ascii_digit() || self.current_char() == '.')
        {
            number.push(self.current_char());
            self.advance();
        }

        Token::Number(number)
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while self.position < self.input.len()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            ident.push(self.current_char());
            self.advance();
        }

        match ident.to_uppercase().as_str() {
            "SELECT" => Token::Select,
            "DISTINCT" => Token::Distinct,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "GROUP" => Token::Group,
            "ORDER" => Token::Order,
            "BY" => Token::By,
            "HAVING" => Token::Having,
            "LIMIT" => Token::Limit,
            "OFFSET" => Token::Offset,
            "JOIN" => Token::Join,
            "INNER" => Token::Inner,
            "LEFT" => Token::Left,
            "RIGHT" => Token::Right,
            "FULL" => Token::Full,
            "CROSS" => Token::Cross,
            "OUTER" => Token::Outer,
            "ON" => Token::On,
            "AS" => Token::As,
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            "IN" => Token::In,
            "BETWEEN" => Token::Between,
            "LIKE" => Token::Like,
            "IS" => Token::Is,
            "NULL" => Token::Null,
            "ASC" => Token::Asc,
            "DESC" => Token::Desc,
            "UNION" => Token::Union,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            "CREATE" => Token::Create,
            "DROP" => Token::Drop,
            "INSERT" => Token::Insert,
            "UPDATE" => Token::Update,
            "DELETE" => Token::Delete,
            _ => Token::Identifier(ident),
        }
    }

    fn current_char(&self) -> char {
        if self.position < self.input.len() {
            self.input[self.position]
        } else {
            '\0'
        }
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.position < self.input.len() && self.current_char().is_whitespace() {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_select() {
        let tokens = Lexer::new("select c1 from t where c1 >= 10")
            .tokenize()
            .unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Select,
                Token::Identifier("c1".to_string()),
                Token::From,
                Token::Identifier("t".to_string()),
                Token::Where,
                Token::Identifier("c1".to_string()),
                Token::GreaterEqual,
                Token::Number("10".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes_and_quoted_identifiers() {
        let tokens = Lexer::new("'it''s' `my table`").tokenize().unwrap();
        assert_eq!(tokens[0], Token::String("it's".to_string()));
        assert_eq!(tokens[1], Token::Identifier("my table".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            Lexer::new("'abc").tokenize(),
            Err(QueryError::ParseError(_))
        ));
    }

    #[test]
    fn test_not_equal_forms() {
        let tokens = Lexer::new("<> !=").tokenize().unwrap();
        assert_eq!(tokens[0], Token::NotEqual);
        assert_eq!(tokens[1], Token::NotEqual);
    }
}
