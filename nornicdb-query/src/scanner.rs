//! C1 -- word-boundary, quote-aware keyword scanning over raw query text.
//!
//! This is a set of small free functions over `&str`, not a stateful
//! lexer object: its job is to find where *clauses* start and end in the
//! raw query text before any clause's contents are handed to the
//! token-based expression [`crate::lexer::Lexer`]. A keyword only counts
//! as a match at "top level" -- not inside a string literal, and not
//! inside nested `()`/`[]`/`{}` -- and only on a word boundary (so `MATCHER`
//! does not match the keyword `MATCH`).

/// Tracks bracket nesting across all three bracket kinds simultaneously;
/// "top level" means this is zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Depth(i32);

impl Depth {
    fn is_top_level(self) -> bool {
        self.0 <= 0
    }

    fn adjust(&mut self, c: char) {
        match c {
            '(' | '[' | '{' => self.0 += 1,
            ')' | ']' | '}' => self.0 -= 1,
            _ => {}
        }
    }
}

/// A simple in-string/escape state machine shared by every scanner
/// function in this module.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct QuoteState {
    quote: Option<char>,
    escaped: bool,
}

impl QuoteState {
    fn in_string(self) -> bool {
        self.quote.is_some()
    }

    /// Updates state for `c`; returns `true` if `c` was consumed as part of
    /// an escape sequence or as the closing/opening quote character itself.
    fn advance(&mut self, c: char) {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == q {
                self.quote = None;
            }
        } else if c == '\'' || c == '"' || c == '`' {
            self.quote = Some(c);
        }
    }
}

/// Byte offset and line/column position, used by [`crate::error::Error::Syntax`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn at(text: &str, offset: usize) -> Self {
        let mut line = 1u32;
        let mut col = 1u32;
        for c in text[..offset.min(text.len())].chars() {
            if c == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        Position {
            offset,
            line,
            column: col,
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Strips `//` line comments and `/* */` block comments that are not
/// inside a string literal, replacing their contents with spaces so byte
/// offsets into the returned string stay aligned with the original text.
pub fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut quote = QuoteState::default();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if !quote.in_string() && c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                out.push(' ');
                i += 1;
            }
            continue;
        }
        if !quote.in_string() && c == '/' && chars.get(i + 1) == Some(&'*') {
            out.push(' ');
            out.push(' ');
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                out.push(if chars[i] == '\n' { '\n' } else { ' ' });
                i += 1;
            }
            if i < chars.len() {
                out.push(' ');
                out.push(' ');
                i += 2;
            }
            continue;
        }
        quote.advance(c);
        out.push(c);
        i += 1;
    }
    out
}

/// Finds every top-level, word-bounded, case-insensitive occurrence of
/// `keyword` in `text`, returning their starting byte offsets.
pub fn find_keyword(text: &str, keyword: &str) -> Vec<usize> {
    find_any_keyword(text, &[keyword])
        .into_iter()
        .map(|(offset, _)| offset)
        .collect()
}

/// Like [`find_keyword`] but scans for several keywords in one pass,
/// returning `(offset, keyword_index)` pairs in text order.
pub fn find_any_keyword(text: &str, keywords: &[&str]) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let lower = text.to_ascii_lowercase();
    let lower_bytes = lower.as_bytes();
    let keywords_lower: Vec<String> = keywords.iter().map(|k| k.to_ascii_lowercase()).collect();

    let mut hits = Vec::new();
    let mut quote = QuoteState::default();
    let mut depth = Depth::default();
    let mut i = 0usize;
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut ci = 0usize;
    while ci < chars.len() {
        let (offset, c) = chars[ci];
        if !quote.in_string() {
            depth.adjust(c);
        }
        quote.advance(c);

        if !quote.in_string() && depth.is_top_level() {
            for (ki, kw) in keywords_lower.iter().enumerate() {
                let end = offset + kw.len();
                if end <= bytes.len() && &lower_bytes[offset..end] == kw.as_bytes() {
                    let before_ok = offset == 0
                        || !is_word_char(text[..offset].chars().next_back().unwrap_or(' '));
                    let after_ok = end == bytes.len()
                        || !is_word_char(text[end..].chars().next().unwrap_or(' '));
                    if before_ok && after_ok {
                        hits.push((offset, ki));
                    }
                }
            }
        }
        i = offset + c.len_utf8();
        let _ = i;
        ci += 1;
    }
    hits
}

/// Splits `text` on top-level commas (not inside strings or any bracket
/// kind), used for comma-separated pattern lists, YIELD items, etc.
pub fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote = QuoteState::default();
    let mut depth = Depth::default();
    let mut start = 0usize;
    for (offset, c) in text.char_indices() {
        if !quote.in_string() {
            depth.adjust(c);
        }
        let was_in_string = quote.in_string();
        quote.advance(c);
        if c == separator && !was_in_string && depth.is_top_level() {
            parts.push(&text[start..offset]);
            start = offset + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Finds the matching close bracket for the open bracket at byte offset
/// `open_at` (which must point at `(`, `[`, or `{`). Returns the byte
/// offset of the matching close bracket.
pub fn matching_bracket(text: &str, open_at: usize) -> Option<usize> {
    let open = text[open_at..].chars().next()?;
    let close = match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        _ => return None,
    };
    let mut depth = 0i32;
    let mut quote = QuoteState::default();
    for (offset, c) in text[open_at..].char_indices() {
        quote.advance(c);
        if quote.in_string() {
            continue;
        }
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(open_at + offset);
            }
        }
    }
    None
}

/// Substitutes every top-level `$name` parameter reference with the
/// literal Cypher rendering of its bound value, skipping occurrences
/// inside string literals. Used only by the facade's `EXPLAIN`/debug
/// tooling -- the dispatcher itself prefers AST-level substitution (see
/// `crate::session`) since it is injection-safe; this textual form exists
/// for presenting a human-readable query.
pub fn render_parameters_textually(
    text: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote = QuoteState::default();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if !quote.in_string() && c == '$' {
            let mut j = i + 1;
            while j < chars.len() && is_word_char(chars[j]) {
                j += 1;
            }
            if j > i + 1 {
                let name: String = chars[i + 1..j].iter().collect();
                if let Some(rendered) = lookup(&name) {
                    out.push_str(&rendered);
                    i = j;
                    continue;
                }
            }
        }
        quote.advance(c);
        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_top_level_keyword_only() {
        let text = "MATCH (n) WHERE n.name = 'WHERE inside string' RETURN n";
        let hits = find_keyword(text, "WHERE");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0], text.find("WHERE n.name").unwrap());
    }

    #[test]
    fn ignores_keyword_without_word_boundary() {
        let text = "MATCH (n) RETURN n.matcher";
        assert!(find_keyword(text, "MATCH").len() == 1);
    }

    #[test]
    fn split_top_level_respects_brackets_and_strings() {
        let text = "a(1, 2), b['x, y'], c";
        let parts = split_top_level(text, ',');
        assert_eq!(parts, vec!["a(1, 2)", " b['x, y']", " c"]);
    }

    #[test]
    fn matching_bracket_finds_close() {
        let text = "(a, (b, c), d)";
        let close = matching_bracket(text, 0).unwrap();
        assert_eq!(close, text.len() - 1);
    }

    #[test]
    fn strip_comments_preserves_offsets() {
        let text = "MATCH (n) // comment\nRETURN n";
        let stripped = strip_comments(text);
        assert_eq!(stripped.len(), text.len());
        assert!(stripped.contains("RETURN n"));
        assert!(!stripped.contains("comment"));
    }
}
