//! Pratt expression parser, operating over the token stream produced by
//! [`crate::lexer::Lexer`] for a single clause's text span.

use crate::ast::{AggregateFunction, BinaryOperator, Expression, Literal, UnaryOperator};
use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};
use crate::operators::{binary_operator_for_token, infix_binding_power, UNARY_BINDING_POWER};
use std::collections::BTreeMap;

pub struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> ExprParser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        ExprParser { tokens, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    pub fn peek_at(&self, lookahead: usize) -> &TokenKind {
        let idx = (self.pos + lookahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    pub fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].offset
    }

    pub fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    pub fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos.min(self.tokens.len() - 1)].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    pub fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        if self.peek() == kind {
            self.advance();
            Ok(())
        } else {
            Err(Error::syntax(
                self.offset(),
                format!("expected {kind:?}, found {:?}", self.peek()),
            ))
        }
    }

    pub fn is_ident_kw(&self, keyword: &str) -> bool {
        matches!(self.peek(), TokenKind::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }

    pub fn eat_ident_kw(&mut self, keyword: &str) -> bool {
        if self.is_ident_kw(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect_ident_kw(&mut self, keyword: &str) -> Result<()> {
        if self.eat_ident_kw(keyword) {
            Ok(())
        } else {
            Err(Error::syntax(
                self.offset(),
                format!("expected keyword '{keyword}', found {:?}", self.peek()),
            ))
        }
    }

    pub fn read_ident(&mut self) -> Result<String> {
        match self.advance() {
            TokenKind::Ident(s) => Ok(s),
            other => Err(Error::syntax(
                self.offset(),
                format!("expected identifier, found {other:?}"),
            )),
        }
    }

    /// Parses a full expression (lowest binding power).
    pub fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_bp(0)
    }

    fn parse_bp(&mut self, min_bp: u8) -> Result<Expression> {
        let mut lhs = self.parse_prefix()?;
        loop {
            if self.is_ident_kw("IS") {
                let save = self.pos;
                self.advance();
                let not = self.eat_ident_kw("NOT");
                if self.eat_ident_kw("NULL") {
                    lhs = Expression::Unary {
                        op: if not {
                            UnaryOperator::IsNotNull
                        } else {
                            UnaryOperator::IsNull
                        },
                        operand: Box::new(lhs),
                    };
                    continue;
                }
                self.pos = save;
            }
            if self.is_ident_kw("NOT") && self.peek_at(1) != &TokenKind::Eof {
                let save = self.pos;
                self.advance();
                if let Some(op) = self.try_parse_keyword_phrase_operator()? {
                    let (_, r_bp) = infix_binding_power(op);
                    let rhs = self.parse_bp(r_bp)?;
                    lhs = Expression::Unary {
                        op: UnaryOperator::Not,
                        operand: Box::new(Expression::Binary {
                            op,
                            left: Box::new(lhs),
                            right: Box::new(rhs),
                        }),
                    };
                    continue;
                }
                self.pos = save;
            }

            let op = if let Some(op) = binary_operator_for_token(self.peek()) {
                op
            } else if let TokenKind::Ident(name) = self.peek() {
                match name.to_ascii_uppercase().as_str() {
                    "AND" => BinaryOperator::And,
                    "OR" => BinaryOperator::Or,
                    "XOR" => BinaryOperator::Xor,
                    "IN" => BinaryOperator::In,
                    _ => {
                        if let Some(op) = self.try_parse_keyword_phrase_operator()? {
                            let (_, r_bp) = infix_binding_power(op);
                            if infix_binding_power(op).0 < min_bp {
                                break;
                            }
                            let rhs = self.parse_bp(r_bp)?;
                            lhs = Expression::Binary {
                                op,
                                left: Box::new(lhs),
                                right: Box::new(rhs),
                            };
                            continue;
                        }
                        break;
                    }
                }
            } else {
                break;
            };

            let (l_bp, r_bp) = infix_binding_power(op);
            if l_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_bp(r_bp)?;
            lhs = Expression::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    /// `STARTS WITH` / `ENDS WITH` are two-ident phrases that the base
    /// token-to-operator table in [`crate::operators`] cannot express.
    fn try_parse_keyword_phrase_operator(&mut self) -> Result<Option<BinaryOperator>> {
        if self.is_ident_kw("STARTS") {
            let save = self.pos;
            self.advance();
            if self.eat_ident_kw("WITH") {
                return Ok(Some(BinaryOperator::StartsWith));
            }
            self.pos = save;
        }
        if self.is_ident_kw("ENDS") {
            let save = self.pos;
            self.advance();
            if self.eat_ident_kw("WITH") {
                return Ok(Some(BinaryOperator::EndsWith));
            }
            self.pos = save;
        }
        if self.is_ident_kw("CONTAINS") {
            self.advance();
            return Ok(Some(BinaryOperator::Contains));
        }
        if self.is_ident_kw("IN") {
            self.advance();
            return Ok(Some(BinaryOperator::In));
        }
        Ok(None)
    }

    fn parse_prefix(&mut self) -> Result<Expression> {
        match self.peek().clone() {
            TokenKind::Dash => {
                self.advance();
                let operand = self.parse_bp(UNARY_BINDING_POWER)?;
                Ok(Expression::Unary {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                })
            }
            TokenKind::Ident(name) if name.eq_ignore_ascii_case("NOT") => {
                self.advance();
                let operand = self.parse_bp(UNARY_BINDING_POWER)?;
                Ok(Expression::Unary {
                    op: UnaryOperator::Not,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expression> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.read_ident()?;
                    expr = Expression::Property {
                        target: Box::new(expr),
                        property,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    if self.peek() == &TokenKind::DotDot {
                        self.advance();
                        let end = if self.peek() != &TokenKind::RBracket {
                            Some(Box::new(self.parse_expression()?))
                        } else {
                            None
                        };
                        self.expect(&TokenKind::RBracket)?;
                        expr = Expression::Slice {
                            target: Box::new(expr),
                            start: None,
                            end,
                        };
                        continue;
                    }
                    let first = self.parse_expression()?;
                    if self.peek() == &TokenKind::DotDot {
                        self.advance();
                        let end = if self.peek() != &TokenKind::RBracket {
                            Some(Box::new(self.parse_expression()?))
                        } else {
                            None
                        };
                        self.expect(&TokenKind::RBracket)?;
                        expr = Expression::Slice {
                            target: Box::new(expr),
                            start: Some(Box::new(first)),
                            end,
                        };
                    } else {
                        self.expect(&TokenKind::RBracket)?;
                        expr = Expression::Index {
                            target: Box::new(expr),
                            index: Box::new(first),
                        };
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expression> {
        match self.peek().clone() {
            TokenKind::Int(i) => {
                self.advance();
                Ok(Expression::Literal(Literal::Int(i)))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expression::Literal(Literal::Float(f)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expression::Literal(Literal::String(s)))
            }
            TokenKind::Parameter(name) => {
                self.advance();
                Ok(Expression::Parameter(name))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                self.parse_list_or_comprehension()
            }
            TokenKind::LBrace => {
                self.advance();
                self.parse_map_literal()
            }
            TokenKind::Ident(name) => self.parse_ident_led(name),
            other => Err(Error::syntax(
                self.offset(),
                format!("unexpected token in expression: {other:?}"),
            )),
        }
    }

    fn parse_list_or_comprehension(&mut self) -> Result<Expression> {
        if let TokenKind::Ident(_) = self.peek() {
            let save = self.pos;
            if let Ok(variable) = self.read_ident() {
                if self.eat_ident_kw("IN") {
                    let source = self.parse_expression()?;
                    let predicate = if self.eat_ident_kw("WHERE") {
                        Some(Box::new(self.parse_expression()?))
                    } else {
                        None
                    };
                    let projection = if self.peek() == &TokenKind::Pipe {
                        self.advance();
                        Some(Box::new(self.parse_expression()?))
                    } else {
                        None
                    };
                    self.expect(&TokenKind::RBracket)?;
                    return Ok(Expression::ListComprehension {
                        variable,
                        source: Box::new(source),
                        predicate,
                        projection,
                    });
                }
            }
            self.pos = save;
        }

        let mut items = Vec::new();
        if self.peek() != &TokenKind::RBracket {
            items.push(self.parse_expression()?);
            while self.peek() == &TokenKind::Comma {
                self.advance();
                items.push(self.parse_expression()?);
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(Expression::List(items))
    }

    fn parse_map_literal(&mut self) -> Result<Expression> {
        let mut map = BTreeMap::new();
        if self.peek() != &TokenKind::RBrace {
            loop {
                let key = self.read_ident()?;
                self.expect(&TokenKind::Colon)?;
                let value = self.parse_expression()?;
                map.insert(key, value);
                if self.peek() == &TokenKind::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expression::Map(map))
    }

    fn parse_ident_led(&mut self, name: String) -> Result<Expression> {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "TRUE" => {
                self.advance();
                return Ok(Expression::Literal(Literal::Bool(true)));
            }
            "FALSE" => {
                self.advance();
                return Ok(Expression::Literal(Literal::Bool(false)));
            }
            "NULL" => {
                self.advance();
                return Ok(Expression::Literal(Literal::Null));
            }
            "CASE" => {
                self.advance();
                return self.parse_case();
            }
            "EXISTS" => {
                self.advance();
                return self.parse_exists();
            }
            "COUNT" | "SUM" | "AVG" | "MIN" | "MAX" | "COLLECT" | "STDEV" => {
                if self.peek_at(1) == &TokenKind::LParen {
                    self.advance();
                    return self.parse_aggregate(&upper);
                }
            }
            _ => {}
        }
        self.advance();
        if self.peek() == &TokenKind::LParen {
            self.advance();
            return self.parse_function_call(name);
        }
        Ok(Expression::Variable(name))
    }

    fn parse_aggregate(&mut self, upper: &str) -> Result<Expression> {
        self.expect(&TokenKind::LParen)?;
        let function = match upper {
            "COUNT" => AggregateFunction::Count,
            "SUM" => AggregateFunction::Sum,
            "AVG" => AggregateFunction::Avg,
            "MIN" => AggregateFunction::Min,
            "MAX" => AggregateFunction::Max,
            "COLLECT" => AggregateFunction::Collect,
            "STDEV" => AggregateFunction::StdDev,
            _ => unreachable!(),
        };
        let distinct = self.eat_ident_kw("DISTINCT");
        let argument = if self.peek() == &TokenKind::Star {
            self.advance();
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect(&TokenKind::RParen)?;
        Ok(Expression::Aggregate {
            function,
            argument,
            distinct,
        })
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expression> {
        let distinct = self.eat_ident_kw("DISTINCT");
        let mut arguments = Vec::new();
        if self.peek() != &TokenKind::RParen {
            arguments.push(self.parse_expression()?);
            while self.peek() == &TokenKind::Comma {
                self.advance();
                arguments.push(self.parse_expression()?);
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(Expression::FunctionCall {
            name,
            arguments,
            distinct,
        })
    }

    fn parse_case(&mut self) -> Result<Expression> {
        let subject = if !self.is_ident_kw("WHEN") {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        let mut branches = Vec::new();
        while self.eat_ident_kw("WHEN") {
            let condition = self.parse_expression()?;
            self.expect_ident_kw("THEN")?;
            let result = self.parse_expression()?;
            branches.push((condition, result));
        }
        let default = if self.eat_ident_kw("ELSE") {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        self.expect_ident_kw("END")?;
        Ok(Expression::Case {
            subject,
            branches,
            default,
        })
    }

    /// `EXISTS(n.prop)` property-existence form. `EXISTS { ... }`
    /// pattern/subquery existence is recognized by the clause-level
    /// parser in [`super::clauses`] before expression parsing begins,
    /// since it needs pattern grammar this module does not implement.
    fn parse_exists(&mut self) -> Result<Expression> {
        self.expect(&TokenKind::LParen)?;
        let inner = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        Ok(Expression::FunctionCall {
            name: "exists".to_string(),
            arguments: vec![inner],
            distinct: false,
        })
    }
}
