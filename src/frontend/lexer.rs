use crate::frontend::token::Token;

/// 1-based source position of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("{line}:{col}: unexpected character: '{ch}'")]
    UnexpectedChar { ch: char, line: usize, col: usize },

    #[error("{line}:{col}: integer literal out of range: {literal}")]
    IntegerOverflow {
        literal: String,
        line: usize,
        col: usize,
    },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { line, col, .. } => Span {
                line: *line,
                col: *col,
            },
            LexError::IntegerOverflow { line, col, .. } => Span {
                line: *line,
                col: *col,
            },
        }
    }
}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn rewind(&mut self) {
        self.pos = 0;
        self.line = 1;
        self.col = 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.span();

        let mut digits = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Only fails when the literal does not fit in an i64.
        let value: i64 = digits.parse().map_err(|_| LexError::IntegerOverflow {
            literal: digits.clone(),
            line: start.line,
            col: start.col,
        })?;

        Ok(Token::Number(value))
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::Identifier(ident)
    }

    fn read_punct(&mut self) -> Option<Token> {
        let token = match self.current()? {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '=' => Token::Assign,
            ';' => Token::Semicolon,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            _ => return None,
        };

        self.advance();
        Some(token)
    }

    /// Tokenizes the whole source. The result always ends with `Token::Eof`.
    ///
    /// Calling this again on the same lexer starts over from the beginning
    /// and yields the same sequence.
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexError> {
        self.rewind();
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let span = self.span();

            match self.current() {
                None => {
                    tokens.push(Spanned {
                        token: Token::Eof,
                        span,
                    });
                    break;
                }
                Some(ch) if ch.is_ascii_digit() => {
                    let token = self.read_number()?;
                    tokens.push(Spanned { token, span });
                }
                Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                    let token = self.read_identifier();
                    tokens.push(Spanned { token, span });
                }
                Some(ch) => match self.read_punct() {
                    Some(token) => tokens.push(Spanned { token, span }),
                    None => {
                        return Err(LexError::UnexpectedChar {
                            ch,
                            line: span.line,
                            col: span.col,
                        });
                    }
                },
            }
        }

        log::debug!("lexed {} tokens", tokens.len());
        Ok(tokens)
    }
}
