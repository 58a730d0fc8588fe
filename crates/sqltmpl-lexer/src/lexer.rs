use sqltmpl_core::{CompileError, LogicalOp, Token, TokenKind};

use crate::config::LexerConfig;
use crate::keywords;

/// Turns template text into a flat token stream. Never fails except on
/// unterminated strings/comments or a malformed variable reference.
pub fn tokenize(src: &str, cfg: &LexerConfig) -> Result<Vec<Token>, CompileError> {
    let raw = scan(src, cfg)?;
    Ok(merge_multiword_keywords(raw, src))
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(offset)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn starts_with_ci(&self, s: &str) -> bool {
        self.src[self.pos..]
            .get(..s.len())
            .is_some_and(|slice| slice.eq_ignore_ascii_case(s))
    }

    fn eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn advance_by(&mut self, n: usize) -> usize {
        let start = self.pos;
        self.pos += n;
        start
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn slice_from(&self, start: usize) -> &'a str {
        &self.src[start..self.pos]
    }
}

fn scan(src: &str, cfg: &LexerConfig) -> Result<Vec<Token>, CompileError> {
    let mut s = Scanner::new(src);
    let mut out = Vec::new();

    while !s.eof() {
        let start = s.pos;
        let c = s.peek().unwrap();

        if c.is_whitespace() {
            s.advance_while(char::is_whitespace);
            out.push(Token::new(TokenKind::Ws, s.slice_from(start), start..s.pos));
            continue;
        }

        if s.starts_with("???") {
            s.advance_by(3);
            out.push(Token::new(
                TokenKind::ForcedBoundary,
                s.slice_from(start),
                start..s.pos,
            ));
            continue;
        }

        if c == '?' {
            lex_question(&mut s, cfg, &mut out)?;
            continue;
        }

        if c == cfg.prefix {
            lex_variable(&mut s, cfg, start, false, &mut out)?;
            continue;
        }

        if s.starts_with("/*") {
            lex_comment(&mut s, start, &mut out)?;
            continue;
        }

        if c == '\'' {
            lex_string(&mut s, start, &mut out)?;
            continue;
        }

        if c == '&' {
            s.advance_char();
            let rest_starts_keyword = |word: &str| {
                s.starts_with_ci(word)
                    && !s
                        .peek_at(word.chars().count())
                        .is_some_and(is_ident_continue)
            };
            if s.peek() == Some(',') || rest_starts_keyword("AND") || rest_starts_keyword("OR") {
                out.push(Token::new(
                    TokenKind::ContextJoin,
                    s.slice_from(start),
                    start..s.pos,
                ));
                continue;
            }
            out.push(Token::new(TokenKind::Text, s.slice_from(start), start..s.pos));
            continue;
        }

        if c == ',' {
            s.advance_char();
            out.push(Token::new(
                TokenKind::Separator,
                s.slice_from(start),
                start..s.pos,
            ));
            continue;
        }

        if c == '(' {
            s.advance_char();
            out.push(Token::new(
                TokenKind::ParenOpen,
                s.slice_from(start),
                start..s.pos,
            ));
            continue;
        }

        if c == ')' {
            s.advance_char();
            out.push(Token::new(
                TokenKind::ParenClose,
                s.slice_from(start),
                start..s.pos,
            ));
            continue;
        }

        if is_ident_start(c) {
            s.advance_while(is_ident_continue);
            let word = s.slice_from(start);
            let kind = if keywords::is_logical_word(word) {
                TokenKind::LogicalOp(LogicalOp::from_keyword(word).unwrap())
            } else {
                // Final classification (section vs plain keyword vs text)
                // happens in the multi-word merge pass, which needs to see
                // raw word boundaries.
                TokenKind::Keyword
            };
            out.push(Token::new(kind, word, start..s.pos));
            continue;
        }

        // Relational operators, used only to disambiguate sub-query parens.
        if "=!<>".contains(c) {
            s.advance_while(|c| "=!<>".contains(c));
            out.push(Token::new(TokenKind::Text, s.slice_from(start), start..s.pos));
            continue;
        }

        s.advance_char();
        out.push(Token::new(TokenKind::Text, s.slice_from(start), start..s.pos));
    }

    out.push(Token::new(TokenKind::EndOfFile, "", s.pos..s.pos));
    Ok(out)
}

impl<'a> Scanner<'a> {
    fn advance_while(&mut self, f: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !f(c) {
                break;
            }
            self.advance_char();
        }
    }
}

fn lex_question(s: &mut Scanner<'_>, cfg: &LexerConfig, out: &mut Vec<Token>) -> Result<(), CompileError> {
    let start = s.pos;
    // `?@Var` / `?@Var_L`
    if s.peek_at(1) == Some(cfg.prefix) {
        s.advance_char(); // consume '?'
        lex_variable(s, cfg, start, true, out)?;
        return Ok(());
    }
    // `?SELECT`: only the `?` is consumed here, as its own marker token;
    // `SELECT` itself is left for ordinary keyword lexing right after.
    if s.src[s.pos + 1..]
        .get(.."SELECT".len())
        .is_some_and(|w| w.eq_ignore_ascii_case("SELECT"))
        && !s.peek_at(7).is_some_and(is_ident_continue)
    {
        s.advance_char(); // consume '?'
        out.push(Token::new(
            TokenKind::DynamicSelectMarker,
            s.slice_from(start),
            start..s.pos,
        ));
        return Ok(());
    }
    s.advance_char();
    out.push(Token::new(TokenKind::Text, s.slice_from(start), start..s.pos));
    Ok(())
}

fn lex_variable(
    s: &mut Scanner<'_>,
    cfg: &LexerConfig,
    start: usize,
    optional: bool,
    out: &mut Vec<Token>,
) -> Result<(), CompileError> {
    let prefix_start = s.pos;
    s.advance_char(); // consume prefix char
    let ident_start = s.pos;
    if !s.peek().is_some_and(is_ident_start) {
        return Err(CompileError::TemplateSyntax {
            offset: start,
            message: format!("expected identifier after '{}'", cfg.prefix),
        });
    }
    s.advance_while(is_ident_continue);
    let ident = s.slice_from(ident_start);

    let (name, handler) = split_handler_suffix(ident);
    if let Some(letter) = handler {
        if !letter.is_ascii_alphabetic() {
            return Err(CompileError::TemplateSyntax {
                offset: start,
                message: format!("invalid handler letter '{letter}'"),
            });
        }
    }

    let text = &s.src[prefix_start..s.pos];
    out.push(Token::new(
        TokenKind::Variable {
            name: name.into(),
            optional,
            handler,
        },
        text,
        start..s.pos,
    ));
    Ok(())
}

/// Splits `Name_L` into (`Name`, Some(L)) when the identifier ends in a
/// single-letter suffix with a non-empty base name; otherwise the whole
/// identifier is the name.
fn split_handler_suffix(ident: &str) -> (&str, Option<char>) {
    let bytes = ident.as_bytes();
    if bytes.len() >= 3 && bytes[bytes.len() - 2] == b'_' {
        let letter = ident.chars().last().unwrap();
        if letter.is_ascii_alphabetic() {
            return (&ident[..ident.len() - 2], Some(letter.to_ascii_uppercase()));
        }
    }
    (ident, None)
}

fn lex_comment(s: &mut Scanner<'_>, start: usize, out: &mut Vec<Token>) -> Result<(), CompileError> {
    s.advance_by(2); // "/*"
    let body_start = s.pos;
    loop {
        if s.eof() {
            return Err(CompileError::TemplateSyntax {
                offset: start,
                message: "unterminated comment".into(),
            });
        }
        if s.starts_with("*/") {
            break;
        }
        s.advance_char();
    }
    let body = s.slice_from(body_start);
    s.advance_by(2); // "*/"

    let (literal_hint, text) = match body.strip_prefix('~') {
        Some(rest) => (true, rest),
        None => (false, body),
    };

    out.push(Token::new(
        TokenKind::Comment { literal_hint },
        text,
        start..s.pos,
    ));
    Ok(())
}

fn lex_string(s: &mut Scanner<'_>, start: usize, out: &mut Vec<Token>) -> Result<(), CompileError> {
    s.advance_char(); // opening quote
    loop {
        if s.eof() {
            return Err(CompileError::TemplateSyntax {
                offset: start,
                message: "unterminated string literal".into(),
            });
        }
        if s.peek() == Some('\'') {
            s.advance_char();
            if s.peek() == Some('\'') {
                s.advance_char(); // doubled quote, stays inside the literal
                continue;
            }
            break;
        }
        s.advance_char();
    }
    out.push(Token::new(
        TokenKind::StringLit,
        s.slice_from(start),
        start..s.pos,
    ));
    Ok(())
}

/// Second pass: combines adjacent `Keyword` words into two-word section
/// keywords (`GROUP BY`, `LEFT JOIN`, ...), and reclassifies the remaining
/// single `Keyword` tokens as `SectionKeyword` or plain `Text`.
fn merge_multiword_keywords(tokens: Vec<Token>, src: &str) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if matches!(tokens[i].kind, TokenKind::Keyword) {
            if let Some(second) = keywords::pair_continuation(&tokens[i].text) {
                if let Some((ws_idx, kw_idx)) = find_next_word(&tokens, i + 1) {
                    if matches!(tokens[kw_idx].kind, TokenKind::Keyword)
                        && tokens[kw_idx].text.eq_ignore_ascii_case(second)
                        && ws_idx == i + 1
                    {
                        let span = tokens[i].span.start..tokens[kw_idx].span.end;
                        out.push(Token::new(
                            TokenKind::SectionKeyword,
                            &src[span.clone()],
                            span,
                        ));
                        i = kw_idx + 1;
                        continue;
                    }
                }
            }
            if keywords::is_section_keyword(&tokens[i].text) {
                out.push(Token::new(
                    TokenKind::SectionKeyword,
                    tokens[i].text.clone(),
                    tokens[i].span.clone(),
                ));
            } else if keywords::is_pair_only_first_word(&tokens[i].text) {
                // Stray first-half word with no valid continuation: treat
                // as ordinary text rather than a dangling section anchor.
                out.push(Token::new(
                    TokenKind::Text,
                    tokens[i].text.clone(),
                    tokens[i].span.clone(),
                ));
            } else {
                out.push(Token::new(
                    TokenKind::Text,
                    tokens[i].text.clone(),
                    tokens[i].span.clone(),
                ));
            }
            i += 1;
            continue;
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

/// Finds the next non-whitespace, non-comment token starting at `from`,
/// returning (index of the whitespace run right before it if immediately
/// adjacent, its own index). Only a single `Ws` token may separate the two
/// keyword words.
fn find_next_word(tokens: &[Token], from: usize) -> Option<(usize, usize)> {
    if from < tokens.len() && matches!(tokens[from].kind, TokenKind::Ws) {
        Some((from, from + 1))
    } else {
        None
    }
}
