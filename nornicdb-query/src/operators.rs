//! C4 -- the operator kernel: precedence/binding-power table the Pratt
//! parser in [`crate::parser`] consumes, and the arithmetic/comparison
//! functions the evaluator applies once operands are known.

use crate::ast::BinaryOperator;
use crate::lexer::TokenKind;

/// `(left binding power, right binding power)`. A higher number binds
/// tighter. Left-associative operators have `right = left + 1`.
pub fn infix_binding_power(op: BinaryOperator) -> (u8, u8) {
    use BinaryOperator::*;
    match op {
        Or => (1, 2),
        Xor => (3, 4),
        And => (5, 6),
        In | StartsWith | EndsWith | Contains | RegexMatch => (7, 8),
        Equal | NotEqual | LessThan | LessOrEqual | GreaterThan | GreaterOrEqual => (9, 10),
        Add | Subtract => (13, 14),
        Multiply | Divide | Modulo => (15, 16),
        Power => (18, 17), // right-associative
    }
}

pub const UNARY_BINDING_POWER: u8 = 19;
pub const POSTFIX_BINDING_POWER: u8 = 21; // property/index/call access binds tightest

/// Maps a token to the binary operator it introduces in infix position,
/// if any. Multi-keyword operators (`IS NULL`, `STARTS WITH`, ...) are
/// resolved by the parser, which looks ahead past this table.
pub fn binary_operator_for_token(kind: &TokenKind) -> Option<BinaryOperator> {
    match kind {
        TokenKind::Plus => Some(BinaryOperator::Add),
        TokenKind::Dash => Some(BinaryOperator::Subtract),
        TokenKind::Star => Some(BinaryOperator::Multiply),
        TokenKind::Slash => Some(BinaryOperator::Divide),
        TokenKind::Percent => Some(BinaryOperator::Modulo),
        TokenKind::Caret => Some(BinaryOperator::Power),
        TokenKind::Eq => Some(BinaryOperator::Equal),
        TokenKind::Ne => Some(BinaryOperator::NotEqual),
        TokenKind::Lt => Some(BinaryOperator::LessThan),
        TokenKind::Le => Some(BinaryOperator::LessOrEqual),
        TokenKind::Gt => Some(BinaryOperator::GreaterThan),
        TokenKind::Ge => Some(BinaryOperator::GreaterOrEqual),
        TokenKind::Tilde => Some(BinaryOperator::RegexMatch),
        _ => None,
    }
}

/// Keyword-identifier operators that need `ident` lookahead rather than a
/// single punctuation token: `AND`, `OR`, `XOR`, `IN`, `STARTS WITH`,
/// `ENDS WITH`, `CONTAINS`.
pub fn keyword_operator(ident: &str) -> Option<BinaryOperator> {
    match ident.to_ascii_uppercase().as_str() {
        "AND" => Some(BinaryOperator::And),
        "OR" => Some(BinaryOperator::Or),
        "XOR" => Some(BinaryOperator::Xor),
        "IN" => Some(BinaryOperator::In),
        "CONTAINS" => Some(BinaryOperator::Contains),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let (_, add_r) = infix_binding_power(BinaryOperator::Add);
        let (mul_l, _) = infix_binding_power(BinaryOperator::Multiply);
        assert!(mul_l > add_r);
    }

    #[test]
    fn power_is_right_associative() {
        let (l, r) = infix_binding_power(BinaryOperator::Power);
        assert!(l > r);
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let (_, or_r) = infix_binding_power(BinaryOperator::Or);
        let (and_l, _) = infix_binding_power(BinaryOperator::And);
        assert!(and_l > or_r);
    }
}
