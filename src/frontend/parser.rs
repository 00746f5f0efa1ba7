use crate::frontend::lexer::{Span, Spanned};
use crate::frontend::parser_error::ParseError;
use crate::frontend::token::Token;
use crate::lang::{BinaryOp, Expr, Stmt, UnaryOp};

/// Recursive-descent parser.
///
/// Grammar, lowest to highest precedence:
///
/// ```text
/// program      ::= statement*
/// statement    ::= ifStmt | whileStmt | funcDef | returnStmt | assignOrExpr
/// assignOrExpr ::= ID '=' expr | expr
/// expr         ::= term (('+' | '-') term)*
/// term         ::= factor (('*' | '/') factor)*
/// factor       ::= ('+' | '-') factor
///                | NUMBER | ID ['(' args ')'] | '(' expr ')'
/// ```
///
/// Any number of `;` may follow a statement. The parser never backtracks:
/// one token of lookahead decides every production except
/// assignment-vs-expression, which looks at the second token.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Span of the most recently consumed token.
    ///
    /// Used as the error location once the cursor runs past the last token.
    last_span: Option<Span>,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            pos: 0,
            last_span: None,
        }
    }

    fn current(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Spanned> {
        let token = self.tokens.get(self.pos);
        if let Some(s) = token {
            self.last_span = Some(s.span);
        }
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|s| &s.token)
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Eof))
    }

    /// Builds a `ParseError` for the token under the cursor.
    ///
    /// Location priority:
    /// 1. the current token's span,
    /// 2. `last_span` when the cursor is past the end,
    /// 3. (1,1) for an empty token list.
    fn error(&self, expected: &str) -> ParseError {
        let (found, span) = match self.current() {
            Some(spanned) => (spanned.token.describe(), spanned.span),
            None => (
                Token::Eof.describe(),
                self.last_span.unwrap_or(Span { line: 1, col: 1 }),
            ),
        };

        ParseError {
            expected: expected.to_string(),
            found,
            line: span.line,
            col: span.col,
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        if self.peek() == Some(&token) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("'{}'", token)))
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(token) if token.is_word(word) => {
                self.advance();
                Ok(())
            }
            _ => Err(self.error(&format!("'{}'", word))),
        }
    }

    /// Consumes a non-keyword identifier and returns its name.
    fn expect_name(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Identifier(name)) if !crate::frontend::token::is_keyword(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(what)),
        }
    }

    fn skip_semicolons(&mut self) {
        while matches!(self.peek(), Some(Token::Semicolon)) {
            self.advance();
        }
    }

    /// Parses the whole token sequence into top-level statements.
    pub fn parse(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();

        loop {
            self.skip_semicolons();
            if self.at_end() {
                break;
            }
            statements.push(self.parse_statement()?);
        }

        log::debug!("parsed {} top-level statements", statements.len());
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let stmt = match self.peek() {
            Some(token) if token.is_word("if") => self.parse_if()?,
            Some(token) if token.is_word("while") => self.parse_while()?,
            Some(token) if token.is_word("function") => self.parse_function()?,
            Some(token) if token.is_word("return") => {
                self.advance();
                Stmt::Return(self.parse_expr()?)
            }
            Some(token @ Token::Identifier(_))
                if !token.is_keyword() && self.peek_next() == Some(&Token::Assign) =>
            {
                self.parse_assignment()?
            }
            _ => Stmt::Expression(self.parse_expr()?),
        };

        self.skip_semicolons();
        Ok(stmt)
    }

    fn parse_assignment(&mut self) -> Result<Stmt, ParseError> {
        let name = self.expect_name("variable name")?;
        self.expect(Token::Assign)?;
        let value = self.parse_expr()?;
        Ok(Stmt::Assign { name, value })
    }

    /// Parses `'{' statement* '}'`.
    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(Token::LBrace)?;

        let mut body = Vec::new();
        loop {
            self.skip_semicolons();
            match self.peek() {
                Some(Token::RBrace) => break,
                None | Some(Token::Eof) => return Err(self.error("'}'")),
                _ => body.push(self.parse_statement()?),
            }
        }

        self.expect(Token::RBrace)?;
        Ok(body)
    }

    /// Parses `'(' expr ')'` as used by `if` and `while`.
    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        self.expect(Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(Token::RParen)?;
        Ok(cond)
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.expect_word("if")?;
        let cond = self.parse_condition()?;
        let then_body = self.parse_block()?;

        let else_body = match self.peek() {
            Some(token) if token.is_word("else") => {
                self.advance();
                self.parse_block()?
            }
            _ => Vec::new(),
        };

        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.expect_word("while")?;
        let cond = self.parse_condition()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_function(&mut self) -> Result<Stmt, ParseError> {
        self.expect_word("function")?;
        let name = self.expect_name("function name")?;
        self.expect(Token::LParen)?;

        let mut params: Vec<String> = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                let param = self.expect_name("parameter name")?;
                if params.contains(&param) {
                    // Point at the duplicate we just consumed.
                    self.pos -= 1;
                    return Err(self.error("distinct parameter name"));
                }
                params.push(param);

                if self.peek() == Some(&Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        self.expect(Token::RParen)?;
        let body = self.parse_block()?;

        Ok(Stmt::Function { name, params, body })
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_term()?;

        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            node = Expr::binary(op, node, self.parse_term()?);
        }

        Ok(node)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_factor()?;

        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            node = Expr::binary(op, node, self.parse_factor()?);
        }

        Ok(node)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.advance();
                Ok(Expr::unary(UnaryOp::Plus, self.parse_factor()?))
            }
            Some(Token::Minus) => {
                self.advance();
                Ok(Expr::unary(UnaryOp::Minus, self.parse_factor()?))
            }
            Some(Token::Number(n)) => {
                let n = *n;
                self.advance();
                Ok(Expr::Number(n))
            }
            Some(Token::Identifier(_)) => {
                let name = self.expect_name("expression")?;
                if self.peek() == Some(&Token::LParen) {
                    let args = self.parse_args()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                self.advance();
                let node = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(node)
            }
            _ => Err(self.error("expression")),
        }
    }

    /// Parses `'(' [expr (',' expr)*] ')'`.
    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(Token::LParen)?;

        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.peek() == Some(&Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        self.expect(Token::RParen)?;
        Ok(args)
    }
}
