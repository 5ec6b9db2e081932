//! Pratt expression parsing.
//!
//! Operands are reported before their operator, so the builder can fold them
//! off its staged list in the order they arrive.

use log::trace;

use super::lexer::TokenKind;
use super::{Parser, Result};
use crate::semantic::{ReductionSink, SyntaxChunkType};

/// Binding power for Pratt parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BindingPower(u8);

impl BindingPower {
    pub const MIN: Self = Self(0);
    pub const COMMA: Self = Self(1);
    pub const ASSIGNMENT: Self = Self(2);
    pub const CONDITIONAL: Self = Self(3);
    pub const LOGICAL_OR: Self = Self(4);
    pub const LOGICAL_AND: Self = Self(5);
    pub const BITWISE_OR: Self = Self(6);
    pub const BITWISE_XOR: Self = Self(7);
    pub const BITWISE_AND: Self = Self(8);
    pub const EQUALITY: Self = Self(9);
    pub const RELATIONAL: Self = Self(10);
    pub const SHIFT: Self = Self(11);
    pub const ADDITIVE: Self = Self(12);
    pub const MULTIPLICATIVE: Self = Self(13);

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

/// Infix operators and the event each one reduces to.
fn infix_binding_power(op: &str) -> Option<(BindingPower, Associativity, SyntaxChunkType)> {
    use SyntaxChunkType::{Assignment, BinaryOperator, Relational};
    let entry = match op {
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>=" => {
            (BindingPower::ASSIGNMENT, Associativity::Right, Assignment)
        }
        "," => (BindingPower::COMMA, Associativity::Left, BinaryOperator),
        "?" => (BindingPower::CONDITIONAL, Associativity::Right, BinaryOperator),
        "||" => (BindingPower::LOGICAL_OR, Associativity::Left, BinaryOperator),
        "&&" => (BindingPower::LOGICAL_AND, Associativity::Left, BinaryOperator),
        "|" => (BindingPower::BITWISE_OR, Associativity::Left, BinaryOperator),
        "^" => (BindingPower::BITWISE_XOR, Associativity::Left, BinaryOperator),
        "&" => (BindingPower::BITWISE_AND, Associativity::Left, BinaryOperator),
        "==" | "!=" => (BindingPower::EQUALITY, Associativity::Left, Relational),
        "<" | ">" | "<=" | ">=" => (BindingPower::RELATIONAL, Associativity::Left, Relational),
        "<<" | ">>" => (BindingPower::SHIFT, Associativity::Left, BinaryOperator),
        "+" | "-" => (BindingPower::ADDITIVE, Associativity::Left, BinaryOperator),
        "*" | "/" | "%" => (BindingPower::MULTIPLICATIVE, Associativity::Left, BinaryOperator),
        _ => return None,
    };
    Some(entry)
}

const PREFIX_OPERATORS: &[&str] = &["+", "-", "!", "~", "*", "&", "++", "--"];

impl<'a, S: ReductionSink> Parser<'a, S> {
    /// Parse an expression whose operators all bind at least as tight as `min`.
    pub(crate) fn parse_expression(&mut self, min: BindingPower) -> Result<()> {
        self.parse_unary()?;

        loop {
            let token = self.peek();
            if token.kind != TokenKind::Punct {
                break;
            }
            let op = self.text(token);
            let Some((power, associativity, event)) = infix_binding_power(op) else {
                break;
            };
            if power < min {
                break;
            }
            self.bump();
            trace!("infix `{op}` @{}", token.start);

            if op == "?" {
                self.parse_expression(BindingPower::COMMA)?;
                self.expect_punct(":")?;
                self.parse_expression(BindingPower::CONDITIONAL)?;
                // `c ? a : b` reduces as `?(c, :(a, b))`
                let end = self.last_end();
                self.emit(SyntaxChunkType::BinaryOperator, end, ":")?;
                self.emit(SyntaxChunkType::BinaryOperator, end, "?")?;
                continue;
            }

            let rhs_min = match associativity {
                Associativity::Left => power.next(),
                Associativity::Right => power,
            };
            self.parse_expression(rhs_min)?;
            let end = self.last_end();
            self.emit(event, end, op)?;
        }
        Ok(())
    }

    /// Prefix operators, casts and `sizeof`, then a postfix expression.
    fn parse_unary(&mut self) -> Result<()> {
        let token = self.peek();
        match token.kind {
            TokenKind::Punct if PREFIX_OPERATORS.contains(&self.text(token)) => {
                self.bump();
                self.emit(SyntaxChunkType::UnaryOperator, token.end, self.text(token))?;
                self.parse_unary()
            }
            TokenKind::Punct if self.is_punct(token, "(") && self.is_type_start(self.peek_at(1)) => {
                let close = self.matching_close(self.pos).ok_or_else(|| self.unexpected("`)`"))?;
                let close_token = self.tokens[close];
                if self.is_punct(self.tokens[close + 1], "{") {
                    return Err(self.unsupported("compound literal", token.start));
                }
                self.pos = close + 1;
                let cast = self.slice(token.start, close_token.end);
                self.emit_leaf(SyntaxChunkType::UnaryOperator, token.start, close_token.end, &cast)?;
                self.parse_unary()
            }
            TokenKind::Word if self.is_word(token, "sizeof") => self.parse_sizeof(),
            _ => {
                self.parse_primary()?;
                self.parse_postfix()
            }
        }
    }

    fn parse_sizeof(&mut self) -> Result<()> {
        let keyword = self.bump();
        if self.at_punct("(") && self.is_type_start(self.peek_at(1)) {
            // `sizeof(type)` has no operand node; keep its text whole
            let close = self.matching_close(self.pos).ok_or_else(|| self.unexpected("`)`"))?;
            let end = self.tokens[close].end;
            self.pos = close + 1;
            let text = self.slice(keyword.start, end);
            return self.emit_leaf(SyntaxChunkType::Constant, keyword.start, end, &text);
        }
        self.emit(SyntaxChunkType::UnaryOperator, keyword.end, "sizeof")?;
        self.parse_unary()
    }

    fn parse_primary(&mut self) -> Result<()> {
        let token = self.peek();
        match token.kind {
            TokenKind::Word if self.is_identifier(token) => {
                self.bump();
                self.emit_leaf(SyntaxChunkType::Identifier, token.start, token.end, &self.literal(token))
            }
            TokenKind::Number | TokenKind::CharLiteral => {
                self.bump();
                self.emit_leaf(SyntaxChunkType::Constant, token.start, token.end, &self.literal(token))
            }
            TokenKind::StringLiteral => {
                self.bump();
                let mut end = token.end;
                while self.peek().kind == TokenKind::StringLiteral {
                    end = self.bump().end;
                }
                let text = self.slice(token.start, end);
                self.emit_leaf(SyntaxChunkType::Constant, token.start, end, &text)
            }
            TokenKind::Punct if self.is_punct(token, "(") => {
                self.bump();
                if self.at_punct("{") {
                    return Err(self.unsupported("statement expression", token.start));
                }
                self.parse_expression(BindingPower::MIN)?;
                self.expect_punct(")")?;
                self.group_close = Some(self.pos - 1);
                Ok(())
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_postfix(&mut self) -> Result<()> {
        loop {
            let token = self.peek();
            if token.kind != TokenKind::Punct {
                return Ok(());
            }
            match self.text(token) {
                "(" => {
                    self.bump();
                    let mut count = 0usize;
                    if !self.at_punct(")") {
                        loop {
                            self.parse_expression(BindingPower::ASSIGNMENT)?;
                            count += 1;
                            if !self.eat_punct(",") {
                                break;
                            }
                        }
                    }
                    let close = self.expect_punct(")")?;
                    self.emit(SyntaxChunkType::PostfixCall, close.end, &count.to_string())?;
                }
                "[" => {
                    self.bump();
                    self.parse_expression(BindingPower::MIN)?;
                    let close = self.expect_punct("]")?;
                    self.emit(SyntaxChunkType::PostfixIndex, close.end, "")?;
                }
                op @ ("." | "->") => {
                    self.bump();
                    let field = self.peek();
                    if !self.is_identifier(field) {
                        return Err(self.unexpected("member name"));
                    }
                    self.bump();
                    let member = format!("{op}{}", self.literal(field));
                    self.emit(SyntaxChunkType::PostfixMember, field.end, &member)?;
                }
                op @ ("++" | "--") => {
                    self.bump();
                    self.emit(SyntaxChunkType::PostfixIncrement, token.end, op)?;
                }
                _ => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_table_orders_operators() {
        let power = |op| infix_binding_power(op).map(|(p, _, _)| p);
        assert!(power("*") > power("+"));
        assert!(power("+") > power("<<"));
        assert!(power("==") < power("<"));
        assert!(power("&&") > power("||"));
        assert!(power("=") > power(","));
        assert_eq!(power("->"), None);
    }

    #[test]
    fn operator_classes() {
        let class = |op| infix_binding_power(op).map(|(_, _, e)| e);
        assert_eq!(class("+="), Some(SyntaxChunkType::Assignment));
        assert_eq!(class("!="), Some(SyntaxChunkType::Relational));
        assert_eq!(class("&&"), Some(SyntaxChunkType::BinaryOperator));
    }
}
