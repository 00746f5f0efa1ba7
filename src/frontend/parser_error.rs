/// A parsing error with source location.
///
/// `line` and `col` are 1-based positions coming from the lexer spans.
/// When input runs out early, `found` is `"end of input"` and the location
/// is that of the `Eof` token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{line}:{col}: expected {expected}, found {found}")]
pub struct ParseError {
    pub expected: String,
    pub found: String,
    pub line: usize,
    pub col: usize,
}
