use crate::frontend::lexer::Spanned;
use crate::frontend::token::Token;

/// Prints a lexed token stream, one token per line, for the `--tokens` mode.
pub struct TokenDumper {
    pub color: bool,
    pub show_debug_repr: bool, // if false, prints the source lexeme instead
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_debug_repr: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";
    const BLU: &'static str = "\x1b[34m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.show_debug_repr = false;
        self
    }

    pub fn dump(&self, tokens: &[Spanned]) {
        for s in tokens {
            println!("{}", self.render(s));
        }
    }

    /// Formats one token as `[line:col] KIND value`.
    pub fn render(&self, s: &Spanned) -> String {
        let kind = kind(&s.token);
        let colr = if self.color { color(&s.token) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        let value = if self.show_debug_repr {
            format!("{:?}", s.token)
        } else {
            s.token.to_string()
        };

        format!(
            "[{:02}:{:02}] {}{:<8} {}{}",
            s.span.line, s.span.col, colr, kind, value, reset
        )
    }
}

fn kind(t: &Token) -> &'static str {
    use Token::*;
    match t {
        Eof => "EOF",
        Number(_) => "NUMBER",
        Identifier(_) if t.is_keyword() => "KEYWORD",
        Identifier(_) => "IDENT",
        Plus | Minus | Star | Slash | Assign => "OP",
        LParen | RParen => "PAREN",
        LBrace | RBrace => "BRACE",
        Semicolon | Comma => "PUNCT",
    }
}

fn color(t: &Token) -> &'static str {
    use Token::*;
    match t {
        Eof => TokenDumper::DIM,
        Number(_) => TokenDumper::CYN,
        Identifier(_) if t.is_keyword() => TokenDumper::BLU,
        Identifier(_) => TokenDumper::YEL,
        Plus | Minus | Star | Slash | Assign => TokenDumper::MAG,
        _ => TokenDumper::RESET,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    fn render_all(source: &str, dumper: &TokenDumper) -> Vec<String> {
        let tokens = Lexer::new(source).tokenize().unwrap();
        tokens.iter().map(|t| dumper.render(t)).collect()
    }

    #[test]
    fn test_plain_debug_output() {
        let lines = render_all("x = 1", &TokenDumper::new().no_color());
        assert_eq!(
            lines,
            vec![
                "[01:01] IDENT    Identifier(\"x\")",
                "[01:03] OP       Assign",
                "[01:05] NUMBER   Number(1)",
                "[01:06] EOF      Eof",
            ]
        );
    }

    #[test]
    fn test_pretty_output_shows_lexemes() {
        let lines = render_all("while {", &TokenDumper::new().no_color().pretty());
        assert_eq!(lines[0], "[01:01] KEYWORD  while");
        assert_eq!(lines[1], "[01:07] BRACE    {");
    }

    #[test]
    fn test_color_wraps_line() {
        let lines = render_all("7", &TokenDumper::new());
        assert!(lines[0].contains("\x1b[36m"));
        assert!(lines[0].ends_with("\x1b[0m"));
    }
}
