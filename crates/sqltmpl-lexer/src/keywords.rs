/// Single-word section keywords (terminate segments, excluded from them).
pub const SECTION_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "HAVING", "WITH", "UNION", "INTERSECT", "EXCEPT", "JOIN", "ON",
    "INSERT", "INTO", "VALUES", "UPDATE", "SET", "DELETE", "CASE", "WHEN", "THEN", "ELSE", "END",
    "OFFSET",
];

/// First word of a two-word section keyword, paired with its continuation.
pub const SECTION_KEYWORD_PAIRS: &[(&str, &str)] = &[
    ("GROUP", "BY"),
    ("ORDER", "BY"),
    ("UNION", "ALL"),
    ("INNER", "JOIN"),
    ("LEFT", "JOIN"),
    ("RIGHT", "JOIN"),
    ("FULL", "JOIN"),
    ("CROSS", "JOIN"),
];

/// Words that only make sense as the first half of a pair; standing alone
/// they are ordinary text (not a keyword at all).
pub const PAIR_ONLY_FIRST_WORDS: &[&str] = &["GROUP", "INNER", "LEFT", "RIGHT", "FULL", "CROSS"];

/// `FETCH` is explicitly NOT a keyword so `OFFSET ... FETCH NEXT ...` can
/// share one segment.
pub fn is_section_keyword(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    SECTION_KEYWORDS.contains(&upper.as_str())
}

pub fn is_pair_only_first_word(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    PAIR_ONLY_FIRST_WORDS.contains(&upper.as_str())
}

pub fn pair_continuation(word: &str) -> Option<&'static str> {
    let upper = word.to_ascii_uppercase();
    SECTION_KEYWORD_PAIRS
        .iter()
        .find(|(first, _)| *first == upper)
        .map(|(_, second)| *second)
}

pub fn is_logical_word(word: &str) -> bool {
    matches!(word.to_ascii_uppercase().as_str(), "AND" | "OR" | "NOT")
}
