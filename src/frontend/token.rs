/// Words the parser treats specially. The lexer emits them as plain
/// identifiers.
pub const KEYWORDS: [&str; 5] = ["if", "else", "while", "function", "return"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    // Literals
    Number(i64),

    // Identifier (variable, function name or keyword)
    Identifier(String),

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,

    // Punctuation
    Assign,
    Semicolon,
    Comma,

    // Delimiters
    LParen, // (
    RParen, // )
    LBrace, // {
    RBrace, // }

    // Special
    Eof,
}

impl Token {
    /// Returns true if this token is the identifier `word`.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, Token::Identifier(name) if name == word)
    }

    /// Returns true if this token is an identifier reserved as a keyword.
    pub fn is_keyword(&self) -> bool {
        match self {
            Token::Identifier(name) => is_keyword(name),
            _ => false,
        }
    }

    /// The integer payload of a `Number` token.
    pub fn value(&self) -> Option<i64> {
        match self {
            Token::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Short human-readable name of the token kind, used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Identifier(name) if is_keyword(name) => format!("keyword '{}'", name),
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::Eof => "end of input".to_string(),
            other => format!("'{}'", other),
        }
    }
}

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Assign => write!(f, "="),
            Token::Semicolon => write!(f, ";"),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}
