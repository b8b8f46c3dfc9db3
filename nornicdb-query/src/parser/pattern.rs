//! Pattern grammar: `(n:Label {prop: 1})-[r:TYPE*1..3]->(m)`, shared by
//! `MATCH`/`CREATE`/`MERGE`/pattern comprehensions/pattern predicates.

use crate::ast::{
    NodePattern, PathElement, Pattern, PropertyMap, RelationshipPattern, ShortestPathKind,
    VariableLength,
};
use crate::error::{Error, Result};
use crate::lexer::TokenKind;
use nornicdb_api::Direction;

use super::expr::ExprParser;

impl<'a> ExprParser<'a> {
    /// Parses one full pattern: an optional `path = ` alias prefix (the
    /// caller handles the `path =` part; this only reads `shortestPath(`
    /// wrappers), then a node, then zero or more `-[...]- (node)` hops.
    pub fn parse_pattern(&mut self) -> Result<Pattern> {
        let shortest = if self.eat_ident_kw("shortestPath") {
            self.expect(&TokenKind::LParen)?;
            Some(ShortestPathKind::Single)
        } else if self.eat_ident_kw("allShortestPaths") {
            self.expect(&TokenKind::LParen)?;
            Some(ShortestPathKind::All)
        } else {
            None
        };

        let mut elements = Vec::new();
        elements.push(PathElement::Node(self.parse_node_pattern()?));
        loop {
            match self.peek() {
                TokenKind::Dash | TokenKind::BackArrow => {
                    let rel = self.parse_relationship_pattern()?;
                    elements.push(PathElement::Relationship(rel));
                    elements.push(PathElement::Node(self.parse_node_pattern()?));
                }
                _ => break,
            }
        }

        if shortest.is_some() {
            self.expect(&TokenKind::RParen)?;
        }

        Ok(Pattern {
            path_alias: None,
            shortest,
            elements,
        })
    }

    fn parse_node_pattern(&mut self) -> Result<NodePattern> {
        self.expect(&TokenKind::LParen)?;
        let variable = if let TokenKind::Ident(name) = self.peek().clone() {
            if !name.eq_ignore_ascii_case("WHERE") {
                self.advance();
                Some(name)
            } else {
                None
            }
        } else {
            None
        };
        let mut labels = Vec::new();
        while self.peek() == &TokenKind::Colon {
            self.advance();
            labels.push(self.read_ident()?);
        }
        let properties = if self.peek() == &TokenKind::LBrace {
            Some(self.parse_property_map()?)
        } else {
            None
        };
        self.expect(&TokenKind::RParen)?;
        Ok(NodePattern {
            variable,
            labels,
            properties,
        })
    }

    fn parse_relationship_pattern(&mut self) -> Result<RelationshipPattern> {
        let mut direction_in = false;
        if self.peek() == &TokenKind::BackArrow {
            self.advance();
            direction_in = true;
        } else {
            self.expect(&TokenKind::Dash)?;
        }

        let mut variable = None;
        let mut types = Vec::new();
        let mut properties = None;
        let mut var_length = None;

        if self.peek() == &TokenKind::LBracket {
            self.advance();
            if let TokenKind::Ident(name) = self.peek().clone() {
                self.advance();
                variable = Some(name);
            }
            while self.peek() == &TokenKind::Colon {
                self.advance();
                types.push(self.read_ident()?);
                while self.peek() == &TokenKind::Pipe {
                    self.advance();
                    if self.peek() == &TokenKind::Colon {
                        self.advance();
                    }
                    types.push(self.read_ident()?);
                }
            }
            if self.peek() == &TokenKind::Star {
                self.advance();
                var_length = Some(self.parse_variable_length()?);
            }
            if self.peek() == &TokenKind::LBrace {
                properties = Some(self.parse_property_map()?);
            }
            self.expect(&TokenKind::RBracket)?;
        }

        let direction_out;
        match self.peek() {
            TokenKind::Arrow => {
                self.advance();
                direction_out = true;
            }
            TokenKind::Dash => {
                self.advance();
                direction_out = false;
            }
            other => {
                return Err(Error::syntax(
                    self.offset(),
                    format!("expected '-' or '->' to close relationship pattern, found {other:?}"),
                ))
            }
        }

        let direction = match (direction_in, direction_out) {
            (true, false) => Direction::Incoming,
            (false, true) => Direction::Outgoing,
            _ => Direction::Both,
        };

        Ok(RelationshipPattern {
            variable,
            types,
            direction,
            properties,
            var_length,
        })
    }

    fn parse_variable_length(&mut self) -> Result<VariableLength> {
        let min = if let TokenKind::Int(i) = self.peek() {
            let i = *i as u32;
            self.advance();
            Some(i)
        } else {
            None
        };
        if self.peek() == &TokenKind::DotDot {
            self.advance();
            let max = if let TokenKind::Int(i) = self.peek() {
                let i = *i as u32;
                self.advance();
                Some(i)
            } else {
                None
            };
            Ok(VariableLength { min, max })
        } else {
            Ok(VariableLength { min, max: min })
        }
    }

    pub fn parse_property_map(&mut self) -> Result<PropertyMap> {
        self.expect(&TokenKind::LBrace)?;
        let mut pairs = Vec::new();
        if self.peek() != &TokenKind::RBrace {
            loop {
                let key = self.read_ident()?;
                self.expect(&TokenKind::Colon)?;
                let value = self.parse_expression()?;
                pairs.push((key, value));
                if self.peek() == &TokenKind::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(PropertyMap { pairs })
    }
}
