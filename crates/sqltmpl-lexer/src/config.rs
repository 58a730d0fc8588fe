/// Lexer-wide knobs. The variable prefix is the only thing templates can
/// override; it is fixed for every template compiled after the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerConfig {
    pub prefix: char,
}

impl Default for LexerConfig {
    fn default() -> Self {
        Self { prefix: '@' }
    }
}
