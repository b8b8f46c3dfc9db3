//! C2 -- the tolerant query builder.
//!
//! [`parse_query`] first uses [`crate::scanner`] to find the top-level
//! clause keywords in the raw text (so a `WHERE` or `CALL` buried inside a
//! string literal or a nested `apoc.cypher.run('...')` argument is never
//! mistaken for a clause boundary), then hands each clause's own text
//! span to a dedicated clause parser built on the token-based
//! [`ExprParser`]. A clause whose span fails to parse is kept as
//! [`crate::ast::Clause::Raw`] instead of aborting the whole query, so a
//! later syntax error still carries a precise byte offset into the
//! original text.

mod clauses;
pub mod expr;
mod pattern;

use crate::ast::{Clause, Query};
use crate::error::Result;
use crate::scanner;
use expr::ExprParser;

const CLAUSE_KEYWORDS: &[&str] = &[
    "MATCH", "OPTIONAL", "UNWIND", "CREATE", "MERGE", "SET", "REMOVE", "DELETE", "DETACH", "WITH",
    "RETURN", "CALL", "FOREACH", "UNION",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClauseTag {
    Match { optional: bool },
    Unwind,
    Create,
    Merge,
    Set,
    Remove,
    Delete { detach: bool },
    With,
    Return,
    Call,
    Foreach,
    Union { all: bool },
}

struct ClauseSpan {
    tag: ClauseTag,
    start: usize,
    end: usize,
}

/// Splits `text` into top-level clause spans, folding `OPTIONAL MATCH`,
/// `DETACH DELETE`, and `UNION ALL` into single spans, and swallowing any
/// `SET` that is part of a `MERGE`'s `ON CREATE SET`/`ON MATCH SET`
/// subclause into the enclosing `MERGE` span.
fn split_clauses(text: &str) -> Vec<ClauseSpan> {
    let hits = scanner::find_any_keyword(text, CLAUSE_KEYWORDS);
    let mut spans: Vec<(usize, ClauseTag)> = Vec::new();
    let mut i = 0;
    while i < hits.len() {
        let (offset, kw_idx) = hits[i];
        let keyword = CLAUSE_KEYWORDS[kw_idx];
        match keyword {
            "OPTIONAL" => {
                // consume the following MATCH hit, if adjacent.
                if i + 1 < hits.len() && CLAUSE_KEYWORDS[hits[i + 1].1] == "MATCH" {
                    spans.push((offset, ClauseTag::Match { optional: true }));
                    i += 2;
                    continue;
                }
                i += 1;
            }
            "MATCH" => {
                spans.push((offset, ClauseTag::Match { optional: false }));
                i += 1;
            }
            "DETACH" => {
                if i + 1 < hits.len() && CLAUSE_KEYWORDS[hits[i + 1].1] == "DELETE" {
                    spans.push((offset, ClauseTag::Delete { detach: true }));
                    i += 2;
                    continue;
                }
                i += 1;
            }
            "DELETE" => {
                spans.push((offset, ClauseTag::Delete { detach: false }));
                i += 1;
            }
            "SET" => {
                if is_merge_subclause_set(text, offset) {
                    i += 1;
                    continue;
                }
                spans.push((offset, ClauseTag::Set));
                i += 1;
            }
            "UNION" => {
                let all = following_word_is(text, offset + keyword.len(), "ALL");
                spans.push((offset, ClauseTag::Union { all }));
                i += if all { 1 } else { 0 } + 1;
            }
            "UNWIND" => {
                spans.push((offset, ClauseTag::Unwind));
                i += 1;
            }
            "CREATE" => {
                spans.push((offset, ClauseTag::Create));
                i += 1;
            }
            "MERGE" => {
                spans.push((offset, ClauseTag::Merge));
                i += 1;
            }
            "REMOVE" => {
                spans.push((offset, ClauseTag::Remove));
                i += 1;
            }
            "WITH" => {
                spans.push((offset, ClauseTag::With));
                i += 1;
            }
            "RETURN" => {
                spans.push((offset, ClauseTag::Return));
                i += 1;
            }
            "CALL" => {
                spans.push((offset, ClauseTag::Call));
                i += 1;
            }
            "FOREACH" => {
                spans.push((offset, ClauseTag::Foreach));
                i += 1;
            }
            _ => i += 1,
        }
    }

    let mut result = Vec::with_capacity(spans.len());
    for idx in 0..spans.len() {
        let (start, tag) = spans[idx];
        let end = spans.get(idx + 1).map(|(o, _)| *o).unwrap_or(text.len());
        result.push(ClauseSpan { tag, start, end });
    }
    result
}

fn following_word_is(text: &str, from: usize, word: &str) -> bool {
    let rest = text[from..].trim_start();
    rest.to_ascii_uppercase().starts_with(word)
}

/// True if the `SET` keyword at byte offset `set_offset` is immediately
/// preceded (modulo whitespace) by `ON CREATE` or `ON MATCH`, i.e. it is a
/// `MERGE` subclause rather than a standalone top-level `SET` clause.
fn is_merge_subclause_set(text: &str, set_offset: usize) -> bool {
    let before = text[..set_offset].trim_end();
    let lower = before.to_ascii_lowercase();
    lower.ends_with("on create") || lower.ends_with("on match")
}

/// Parses a complete query, including `EXPLAIN`/`PROFILE` prefixes and
/// `UNION [ALL]`-chained sub-queries.
pub fn parse_query(text: &str) -> Result<Query> {
    let stripped = scanner::strip_comments(text);
    let (explain, body_start) = strip_explain_prefix(&stripped);
    let body = &stripped[body_start..];
    let spans = split_clauses(body);

    let mut clauses = Vec::with_capacity(spans.len());
    for span in &spans {
        if matches!(span.tag, ClauseTag::Union { .. }) {
            let union_body = &body[span.start..span.end];
            let after_union = skip_union_keyword(union_body);
            let all = matches!(span.tag, ClauseTag::Union { all: true });
            match parse_query(&union_body[after_union..]) {
                Ok(sub_query) => clauses.push(Clause::Union {
                    all,
                    query: Box::new(sub_query),
                }),
                Err(_) => clauses.push(Clause::Raw {
                    text: union_body.to_string(),
                    offset: body_start + span.start,
                }),
            }
            continue;
        }

        let clause_text = &body[span.start..span.end];
        match clauses::parse_clause(span.tag_kind(), clause_text) {
            Ok(clause) => clauses.push(clause),
            Err(_) => clauses.push(Clause::Raw {
                text: clause_text.to_string(),
                offset: body_start + span.start,
            }),
        }
    }

    Ok(Query { clauses, explain })
}

impl ClauseSpan {
    fn tag_kind(&self) -> ClauseTag {
        self.tag
    }
}

fn strip_explain_prefix(text: &str) -> (bool, usize) {
    let trimmed = text.trim_start();
    let leading_ws = text.len() - trimmed.len();
    let upper = trimmed.to_ascii_uppercase();
    if upper.starts_with("EXPLAIN") {
        let after = &trimmed[7..];
        let after_ws = after.len() - after.trim_start().len();
        (true, leading_ws + 7 + after_ws)
    } else if upper.starts_with("PROFILE") {
        let after = &trimmed[7..];
        let after_ws = after.len() - after.trim_start().len();
        (true, leading_ws + 7 + after_ws)
    } else {
        (false, 0)
    }
}

fn skip_union_keyword(text: &str) -> usize {
    let trimmed = text.trim_start();
    let leading_ws = text.len() - trimmed.len();
    let upper = trimmed.to_ascii_uppercase();
    if upper.starts_with("UNION ALL") {
        leading_ws + "UNION ALL".len()
    } else if upper.starts_with("UNION") {
        leading_ws + "UNION".len()
    } else {
        0
    }
}

pub(crate) fn tokenize(text: &str) -> Result<Vec<crate::lexer::Token>> {
    crate::lexer::Lexer::new(text).tokenize()
}

pub(crate) fn expr_parser(tokens: &[crate::lexer::Token]) -> ExprParser<'_> {
    ExprParser::new(tokens)
}

/// Parses a single, free-standing expression (used by procedures that
/// embed Cypher fragments, e.g. `apoc.cypher.run`).
pub fn parse_standalone_expression(text: &str) -> Result<crate::ast::Expression> {
    let tokens = tokenize(text)?;
    let mut parser = expr_parser(&tokens);
    let expr = parser.parse_expression()?;
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Clause;

    #[test]
    fn splits_match_where_return() {
        let q = parse_query("MATCH (n:Person) WHERE n.age > 30 RETURN n").unwrap();
        assert_eq!(q.clauses.len(), 2);
        assert!(matches!(q.clauses[0], Clause::Match(_)));
        assert!(matches!(q.clauses[1], Clause::Return(_)));
    }

    #[test]
    fn optional_match_is_one_clause() {
        let q = parse_query("MATCH (n) OPTIONAL MATCH (n)-[:KNOWS]->(m) RETURN n, m").unwrap();
        assert_eq!(q.clauses.len(), 3);
        match &q.clauses[1] {
            Clause::Match(m) => assert!(m.optional),
            other => panic!("expected optional match, got {other:?}"),
        }
    }

    #[test]
    fn merge_on_create_set_is_not_split() {
        let q = parse_query(
            "MERGE (n:Person {name: 'Al'}) ON CREATE SET n.created = true RETURN n",
        )
        .unwrap();
        assert_eq!(q.clauses.len(), 2);
        match &q.clauses[0] {
            Clause::Merge(m) => assert_eq!(m.on_create.len(), 1),
            other => panic!("expected merge clause, got {other:?}"),
        }
    }

    #[test]
    fn detach_delete_is_one_clause() {
        let q = parse_query("MATCH (n) DETACH DELETE n").unwrap();
        assert_eq!(q.clauses.len(), 2);
        match &q.clauses[1] {
            Clause::Delete(d) => assert!(d.detach),
            other => panic!("expected delete clause, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_clause_becomes_raw() {
        let q = parse_query("MATCH (n RETURN n").unwrap();
        assert!(q
            .clauses
            .iter()
            .any(|c| matches!(c, Clause::Raw { .. })));
    }

    #[test]
    fn explain_prefix_is_recorded() {
        let q = parse_query("EXPLAIN MATCH (n) RETURN n").unwrap();
        assert!(q.explain);
    }
}
