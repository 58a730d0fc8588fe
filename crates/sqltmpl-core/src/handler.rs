/// Which of the two handler tables (see the handler registry component) a
/// letter belongs to. Decided once, at compile time, by whatever registry
/// the caller passes in -- the key registry then uses it to sort a handled
/// variable into bank 4 (special) or bank 5 (base).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Base,
    Special,
}

/// Lets the segment builder classify a handler letter without depending on
/// the crate that owns the actual handler functions.
pub trait HandlerClassifier {
    fn classify(&self, letter: char) -> Option<HandlerKind>;
}
