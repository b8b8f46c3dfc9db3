use super::expr::ExprParser;
use super::{tokenize, ClauseTag};
use crate::ast::*;
use crate::error::{Error, Result};
use crate::lexer::TokenKind;

pub(super) fn parse_clause(tag: ClauseTag, text: &str) -> Result<Clause> {
    let tokens = tokenize(text)?;
    let mut p = ExprParser::new(&tokens);
    match tag {
        ClauseTag::Match { optional } => {
            if optional {
                p.expect_ident_kw("OPTIONAL")?;
            }
            p.expect_ident_kw("MATCH")?;
            let patterns = parse_pattern_list(&mut p)?;
            let where_clause = if p.eat_ident_kw("WHERE") {
                Some(p.parse_expression()?)
            } else {
                None
            };
            Ok(Clause::Match(MatchClause {
                optional,
                patterns,
                where_clause,
            }))
        }
        ClauseTag::Unwind => {
            p.expect_ident_kw("UNWIND")?;
            let expression = p.parse_expression()?;
            p.expect_ident_kw("AS")?;
            let alias = p.read_ident()?;
            Ok(Clause::Unwind(UnwindClause { expression, alias }))
        }
        ClauseTag::Create => {
            p.expect_ident_kw("CREATE")?;
            let patterns = parse_pattern_list(&mut p)?;
            Ok(Clause::Create(CreateClause { patterns }))
        }
        ClauseTag::Merge => {
            p.expect_ident_kw("MERGE")?;
            let pattern = parse_one_pattern(&mut p)?;
            let mut on_create = Vec::new();
            let mut on_match = Vec::new();
            loop {
                if p.eat_ident_kw("ON") {
                    if p.eat_ident_kw("CREATE") {
                        p.expect_ident_kw("SET")?;
                        on_create.extend(parse_set_items(&mut p)?);
                    } else if p.eat_ident_kw("MATCH") {
                        p.expect_ident_kw("SET")?;
                        on_match.extend(parse_set_items(&mut p)?);
                    } else {
                        return Err(Error::syntax(p.offset(), "expected CREATE or MATCH after ON"));
                    }
                } else {
                    break;
                }
            }
            Ok(Clause::Merge(MergeClause {
                pattern,
                on_create,
                on_match,
            }))
        }
        ClauseTag::Set => {
            p.expect_ident_kw("SET")?;
            let items = parse_set_items(&mut p)?;
            Ok(Clause::Set(SetClause { items }))
        }
        ClauseTag::Remove => {
            p.expect_ident_kw("REMOVE")?;
            let mut items = Vec::new();
            loop {
                let target = p.parse_expression()?;
                items.push(expression_to_remove_item(target)?);
                if p.peek() == &TokenKind::Comma {
                    p.advance();
                    continue;
                }
                break;
            }
            Ok(Clause::Remove(RemoveClause { items }))
        }
        ClauseTag::Delete { detach } => {
            if detach {
                p.expect_ident_kw("DETACH")?;
            }
            p.expect_ident_kw("DELETE")?;
            let mut expressions = vec![p.parse_expression()?];
            while p.peek() == &TokenKind::Comma {
                p.advance();
                expressions.push(p.parse_expression()?);
            }
            Ok(Clause::Delete(DeleteClause { detach, expressions }))
        }
        ClauseTag::With => {
            p.expect_ident_kw("WITH")?;
            let (distinct, items) = parse_return_items(&mut p)?;
            let where_clause = if p.eat_ident_kw("WHERE") {
                Some(p.parse_expression()?)
            } else {
                None
            };
            let order_by = parse_order_by(&mut p)?;
            let skip = parse_skip(&mut p)?;
            let limit = parse_limit(&mut p)?;
            Ok(Clause::With(WithClause {
                distinct,
                items,
                where_clause,
                order_by,
                skip,
                limit,
            }))
        }
        ClauseTag::Return => {
            p.expect_ident_kw("RETURN")?;
            let (distinct, items) = parse_return_items(&mut p)?;
            let order_by = parse_order_by(&mut p)?;
            let skip = parse_skip(&mut p)?;
            let limit = parse_limit(&mut p)?;
            Ok(Clause::Return(ReturnClause {
                distinct,
                items,
                order_by,
                skip,
                limit,
            }))
        }
        ClauseTag::Call => {
            p.expect_ident_kw("CALL")?;
            if p.peek() == &TokenKind::LBrace {
                p.advance();
                let inner_tokens_start = p.pos();
                let depth_end = find_matching_brace(&tokens, inner_tokens_start)?;
                let sub_text = rebuild_text(&tokens, inner_tokens_start, depth_end);
                let sub_query = super::parse_query(&sub_text)?;
                return Ok(Clause::Call(CallClause {
                    name: String::new(),
                    arguments: vec![],
                    yield_items: vec![],
                    where_clause: None,
                    subquery: Some(Box::new(sub_query)),
                }));
            }
            let name = parse_qualified_name(&mut p)?;
            let mut arguments = Vec::new();
            if p.peek() == &TokenKind::LParen {
                p.advance();
                if p.peek() != &TokenKind::RParen {
                    arguments.push(p.parse_expression()?);
                    while p.peek() == &TokenKind::Comma {
                        p.advance();
                        arguments.push(p.parse_expression()?);
                    }
                }
                p.expect(&TokenKind::RParen)?;
            }
            let mut yield_items = Vec::new();
            if p.eat_ident_kw("YIELD") {
                loop {
                    let field = p.read_ident()?;
                    let alias = if p.eat_ident_kw("AS") {
                        Some(p.read_ident()?)
                    } else {
                        None
                    };
                    yield_items.push(YieldItem { name: field, alias });
                    if p.peek() == &TokenKind::Comma {
                        p.advance();
                        continue;
                    }
                    break;
                }
            }
            let where_clause = if p.eat_ident_kw("WHERE") {
                Some(p.parse_expression()?)
            } else {
                None
            };
            Ok(Clause::Call(CallClause {
                name,
                arguments,
                yield_items,
                where_clause,
                subquery: None,
            }))
        }
        ClauseTag::Foreach => {
            p.expect_ident_kw("FOREACH")?;
            p.expect(&TokenKind::LParen)?;
            let variable = p.read_ident()?;
            p.expect_ident_kw("IN")?;
            let list = p.parse_expression()?;
            p.expect(&TokenKind::Pipe)?;
            let start = p.pos();
            let end = find_matching_paren_from(&tokens, start)?;
            let inner_text = rebuild_text(&tokens, start, end);
            let inner_query = super::parse_query(&inner_text)?;
            Ok(Clause::Foreach(ForeachClause {
                variable,
                list,
                clauses: inner_query.clauses,
            }))
        }
        ClauseTag::Union { .. } => unreachable!("union handled by caller"),
    }
}

fn parse_qualified_name(p: &mut ExprParser<'_>) -> Result<String> {
    let mut name = p.read_ident()?;
    while p.peek() == &TokenKind::Dot {
        p.advance();
        name.push('.');
        name.push_str(&p.read_ident()?);
    }
    Ok(name)
}

fn parse_pattern_list(p: &mut ExprParser<'_>) -> Result<Vec<Pattern>> {
    let mut patterns = vec![parse_one_pattern(p)?];
    while p.peek() == &TokenKind::Comma {
        p.advance();
        patterns.push(parse_one_pattern(p)?);
    }
    Ok(patterns)
}

fn parse_one_pattern(p: &mut ExprParser<'_>) -> Result<Pattern> {
    if let TokenKind::Ident(name) = p.peek().clone() {
        if p.peek_at(1) == &TokenKind::Eq {
            p.advance();
            p.advance();
            let mut pattern = p.parse_pattern()?;
            pattern.path_alias = Some(name);
            return Ok(pattern);
        }
    }
    p.parse_pattern()
}

fn parse_set_items(p: &mut ExprParser<'_>) -> Result<Vec<SetItem>> {
    let mut items = vec![parse_one_set_item(p)?];
    while p.peek() == &TokenKind::Comma {
        p.advance();
        items.push(parse_one_set_item(p)?);
    }
    Ok(items)
}

fn parse_one_set_item(p: &mut ExprParser<'_>) -> Result<SetItem> {
    if let TokenKind::Ident(name) = p.peek().clone() {
        if p.peek_at(1) == &TokenKind::Colon {
            p.advance();
            let mut labels = Vec::new();
            while p.peek() == &TokenKind::Colon {
                p.advance();
                labels.push(p.read_ident()?);
            }
            return Ok(SetItem::Labels {
                variable: name,
                labels,
            });
        }
    }
    let target = p.parse_expression()?;
    if p.peek() == &TokenKind::PlusEq {
        p.advance();
        let value = p.parse_expression()?;
        return Ok(SetItem::Map {
            target,
            value,
            merge: true,
        });
    }
    p.expect(&TokenKind::Eq)?;
    let value = p.parse_expression()?;
    match target {
        Expression::Property { target, property } => Ok(SetItem::Property {
            target: *target,
            property,
            value,
        }),
        other => Ok(SetItem::Map {
            target: other,
            value,
            merge: false,
        }),
    }
}

fn expression_to_remove_item(expr: Expression) -> Result<RemoveItem> {
    match expr {
        Expression::Property { target, property } => Ok(RemoveItem::Property {
            target: *target,
            property,
        }),
        Expression::Variable(name) => Ok(RemoveItem::Labels {
            variable: name,
            labels: vec![],
        }),
        other => Err(Error::Internal(format!(
            "invalid REMOVE target: {other:?}"
        ))),
    }
}

fn parse_return_items(p: &mut ExprParser<'_>) -> Result<(bool, Vec<ReturnItem>)> {
    let distinct = p.eat_ident_kw("DISTINCT");
    if p.peek() == &TokenKind::Star {
        p.advance();
        return Ok((distinct, vec![]));
    }
    let mut items = vec![parse_one_return_item(p)?];
    while p.peek() == &TokenKind::Comma {
        p.advance();
        items.push(parse_one_return_item(p)?);
    }
    Ok((distinct, items))
}

fn parse_one_return_item(p: &mut ExprParser<'_>) -> Result<ReturnItem> {
    let expression = p.parse_expression()?;
    let alias = if p.eat_ident_kw("AS") {
        Some(p.read_ident()?)
    } else {
        None
    };
    Ok(ReturnItem { expression, alias })
}

fn parse_order_by(p: &mut ExprParser<'_>) -> Result<Option<OrderByClause>> {
    if !p.eat_ident_kw("ORDER") {
        return Ok(None);
    }
    p.expect_ident_kw("BY")?;
    let mut items = Vec::new();
    loop {
        let expression = p.parse_expression()?;
        let direction = if p.eat_ident_kw("DESC") || p.eat_ident_kw("DESCENDING") {
            SortDirection::Descending
        } else {
            p.eat_ident_kw("ASC");
            p.eat_ident_kw("ASCENDING");
            SortDirection::Ascending
        };
        items.push(OrderByItem {
            expression,
            direction,
        });
        if p.peek() == &TokenKind::Comma {
            p.advance();
            continue;
        }
        break;
    }
    Ok(Some(OrderByClause { items }))
}

fn parse_skip(p: &mut ExprParser<'_>) -> Result<Option<Expression>> {
    if p.eat_ident_kw("SKIP") {
        Ok(Some(p.parse_expression()?))
    } else {
        Ok(None)
    }
}

fn parse_limit(p: &mut ExprParser<'_>) -> Result<Option<Expression>> {
    if p.eat_ident_kw("LIMIT") {
        Ok(Some(p.parse_expression()?))
    } else {
        Ok(None)
    }
}

fn find_matching_brace(tokens: &[crate::lexer::Token], start: usize) -> Result<usize> {
    let mut depth = 1i32;
    let mut i = start;
    while i < tokens.len() {
        match tokens[i].kind {
            TokenKind::LBrace => depth += 1,
            TokenKind::RBrace => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(Error::syntax(tokens[start].offset, "unterminated '{' block"))
}

fn find_matching_paren_from(tokens: &[crate::lexer::Token], start: usize) -> Result<usize> {
    let mut depth = 1i32;
    let mut i = start;
    while i < tokens.len() {
        match tokens[i].kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(Error::syntax(tokens[start].offset, "unterminated '(' block"))
}

/// Re-renders a token range back into Cypher text so a nested `{ ... }`
/// or `( ... )` block can be parsed as its own sub-query via
/// [`super::parse_query`]. Token spans are used (rather than slicing the
/// original text) because the caller has already located the range by
/// token index, not byte offset.
fn rebuild_text(tokens: &[crate::lexer::Token], start: usize, end: usize) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    for tok in &tokens[start..end] {
        if !out.is_empty() {
            out.push(' ');
        }
        match &tok.kind {
            TokenKind::Ident(s) => out.push_str(s),
            TokenKind::Parameter(s) => {
                out.push('$');
                out.push_str(s);
            }
            TokenKind::Int(i) => {
                let _ = write!(out, "{i}");
            }
            TokenKind::Float(f) => {
                let _ = write!(out, "{f}");
            }
            TokenKind::String(s) => {
                let _ = write!(out, "'{}'", s.replace('\'', "\\'"));
            }
            TokenKind::LParen => out.push('('),
            TokenKind::RParen => out.push(')'),
            TokenKind::LBracket => out.push('['),
            TokenKind::RBracket => out.push(']'),
            TokenKind::LBrace => out.push('{'),
            TokenKind::RBrace => out.push('}'),
            TokenKind::Comma => out.push(','),
            TokenKind::Dot => out.push('.'),
            TokenKind::DotDot => out.push_str(".."),
            TokenKind::Colon => out.push(':'),
            TokenKind::Pipe => out.push('|'),
            TokenKind::Arrow => out.push_str("->"),
            TokenKind::BackArrow => out.push_str("<-"),
            TokenKind::Dash => out.push('-'),
            TokenKind::Plus => out.push('+'),
            TokenKind::Star => out.push('*'),
            TokenKind::Slash => out.push('/'),
            TokenKind::Percent => out.push('%'),
            TokenKind::Caret => out.push('^'),
            TokenKind::Eq => out.push('='),
            TokenKind::Ne => out.push_str("<>"),
            TokenKind::Lt => out.push('<'),
            TokenKind::Le => out.push_str("<="),
            TokenKind::Gt => out.push('>'),
            TokenKind::Ge => out.push_str(">="),
            TokenKind::PlusEq => out.push_str("+="),
            TokenKind::Tilde => out.push_str("=~"),
            TokenKind::Eof => {}
        }
    }
    out
}
