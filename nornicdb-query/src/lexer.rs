//! Token-based lexer feeding the expression/clause-internal Pratt parser
//! (C2/C3). Contrast with [`crate::scanner`], which finds clause
//! boundaries in raw text without ever producing a token stream.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Parameter(String),
    Int(i64),
    Float(f64),
    String(String),
    // punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    DotDot,
    Colon,
    Pipe,
    Arrow,        // ->
    BackArrow,    // <-
    Dash,         // -
    Plus,
    Star,
    Slash,
    Percent,
    Caret,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    PlusEq,
    Tilde,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

pub struct Lexer<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Self {
        Lexer {
            text,
            chars: text.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_char_at(&self, lookahead: usize) -> Option<char> {
        self.chars.get(self.pos + lookahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(o, _)| *o)
            .unwrap_or(self.text.len())
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let offset = self.offset();
            let Some(c) = self.peek_char() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    offset,
                });
                break;
            };
            let kind = match c {
                '(' => { self.advance(); TokenKind::LParen }
                ')' => { self.advance(); TokenKind::RParen }
                '[' => { self.advance(); TokenKind::LBracket }
                ']' => { self.advance(); TokenKind::RBracket }
                '{' => { self.advance(); TokenKind::LBrace }
                '}' => { self.advance(); TokenKind::RBrace }
                ',' => { self.advance(); TokenKind::Comma }
                ':' => { self.advance(); TokenKind::Colon }
                '|' => { self.advance(); TokenKind::Pipe }
                '+' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::PlusEq
                    } else {
                        TokenKind::Plus
                    }
                }
                '*' => { self.advance(); TokenKind::Star }
                '/' => { self.advance(); TokenKind::Slash }
                '%' => { self.advance(); TokenKind::Percent }
                '^' => { self.advance(); TokenKind::Caret }
                '~' => { self.advance(); TokenKind::Tilde }
                '.' => {
                    self.advance();
                    if self.peek_char() == Some('.') {
                        self.advance();
                        TokenKind::DotDot
                    } else {
                        TokenKind::Dot
                    }
                }
                '=' => {
                    self.advance();
                    if self.peek_char() == Some('~') {
                        self.advance();
                        TokenKind::Tilde
                    } else {
                        TokenKind::Eq
                    }
                }
                '<' => {
                    self.advance();
                    match self.peek_char() {
                        Some('>') => { self.advance(); TokenKind::Ne }
                        Some('=') => { self.advance(); TokenKind::Le }
                        Some('-') => { self.advance(); TokenKind::BackArrow }
                        _ => TokenKind::Lt,
                    }
                }
                '>' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }
                '-' => {
                    self.advance();
                    if self.peek_char() == Some('>') {
                        self.advance();
                        TokenKind::Arrow
                    } else {
                        TokenKind::Dash
                    }
                }
                '$' => {
                    self.advance();
                    let name = self.read_ident_text();
                    if name.is_empty() {
                        return Err(Error::syntax(offset, "expected parameter name after '$'"));
                    }
                    TokenKind::Parameter(name)
                }
                '\'' | '"' => self.read_string(c)?,
                c if c.is_ascii_digit() => self.read_number(),
                c if c.is_alphabetic() || c == '_' => TokenKind::Ident(self.read_ident_text()),
                '`' => TokenKind::Ident(self.read_backtick_ident()?),
                other => {
                    return Err(Error::syntax(
                        offset,
                        format!("unexpected character '{other}'"),
                    ))
                }
            };
            tokens.push(Token { kind, offset });
        }
        Ok(tokens)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn read_ident_text(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        s
    }

    fn read_backtick_ident(&mut self) -> Result<String> {
        let start = self.offset();
        self.advance();
        let mut s = String::new();
        loop {
            match self.advance() {
                Some('`') => return Ok(s),
                Some(c) => s.push(c),
                None => return Err(Error::syntax(start, "unterminated backtick identifier")),
            }
        }
    }

    fn read_string(&mut self, quote: char) -> Result<TokenKind> {
        let start = self.offset();
        self.advance();
        let mut s = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => return Ok(TokenKind::String(s)),
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('\\') => s.push('\\'),
                    Some(c) if c == quote => s.push(quote),
                    Some(c) => s.push(c),
                    None => return Err(Error::syntax(start, "unterminated string literal")),
                },
                Some(c) => s.push(c),
                None => return Err(Error::syntax(start, "unterminated string literal")),
            }
        }
    }

    fn read_number(&mut self) -> TokenKind {
        let start_pos = self.pos;
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let mut is_float = false;
        if self.peek_char() == Some('.') && matches!(self.peek_char_at(1), Some(c) if c.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            is_float = true;
            self.advance();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.advance();
            }
            while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let start_offset = self.chars[start_pos].0;
        let end_offset = self.offset();
        let text = &self.text[start_offset..end_offset];
        if is_float {
            TokenKind::Float(text.parse().unwrap_or(0.0))
        } else {
            match text.parse::<i64>() {
                Ok(i) => TokenKind::Int(i),
                Err(_) => TokenKind::Float(text.parse().unwrap_or(0.0)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        Lexer::new(text)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokenizes_property_access() {
        let kinds = kinds("n.age >= 30");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident("n".into()),
                TokenKind::Dot,
                TokenKind::Ident("age".into()),
                TokenKind::Ge,
                TokenKind::Int(30),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_parameter_and_string() {
        let kinds = kinds("$name = 'Al\\'ice'");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Parameter("name".into()),
                TokenKind::Eq,
                TokenKind::String("Al'ice".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_variable_length_range() {
        let kinds = kinds("[*1..3]");
        assert_eq!(
            kinds,
            vec![
                TokenKind::LBracket,
                TokenKind::Star,
                TokenKind::Int(1),
                TokenKind::DotDot,
                TokenKind::Int(3),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }
}
