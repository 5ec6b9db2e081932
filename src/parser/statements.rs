//! Statement parsing.

use log::debug;

use super::lexer::TokenKind;
use super::{BindingPower, Parser, Result};
use crate::semantic::{ReductionSink, SyntaxChunkType};

impl<'a, S: ReductionSink> Parser<'a, S> {
    /// `{ statement* }`
    pub(crate) fn parse_compound_statement(&mut self) -> Result<()> {
        let open = self.expect_punct("{")?;
        self.emit(SyntaxChunkType::ScopeStart, open.end, "")?;
        while !self.at_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("`}`"));
            }
            self.parse_statement()?;
        }
        let close = self.bump();
        self.emit(SyntaxChunkType::ScopeEnd, close.end, "")
    }

    /// Body of a selection or iteration statement. A body without braces
    /// still gets its own scope.
    fn parse_body(&mut self) -> Result<()> {
        if self.at_punct("{") {
            return self.parse_compound_statement();
        }
        let start = self.last_end();
        self.emit(SyntaxChunkType::ImplicitScopeStart, start, "")?;
        self.parse_statement()?;
        let end = self.last_end();
        self.emit(SyntaxChunkType::ImplicitScopeEnd, end, "")
    }

    pub(crate) fn parse_statement(&mut self) -> Result<()> {
        let token = self.peek();
        if token.kind == TokenKind::Punct {
            return match self.text(token) {
                "{" => self.parse_compound_statement(),
                ";" => {
                    self.bump();
                    self.emit(SyntaxChunkType::EmptyStatement, token.end, "")
                }
                _ => self.parse_expression_statement(),
            };
        }
        if token.kind == TokenKind::Word {
            match self.text(token) {
                "if" => return self.parse_if(),
                "for" => return self.parse_for(),
                "while" => return self.parse_while(),
                "do" => return self.parse_do(),
                "switch" => return self.parse_switch(),
                "case" => return self.parse_case_label(),
                "default" => {
                    self.bump();
                    let colon = self.expect_punct(":")?;
                    return self.emit(SyntaxChunkType::DefaultLabel, colon.end, "");
                }
                "return" => return self.parse_return(),
                "break" | "continue" => {
                    self.bump();
                    let semi = self.expect_punct(";")?;
                    return self.emit(SyntaxChunkType::Jump, semi.end, self.text(token));
                }
                "defer" => return self.parse_defer(),
                "goto" => return Err(self.unsupported("goto", token.start)),
                _ => {}
            }
            if self.is_identifier(token) && self.is_punct(self.peek_at(1), ":") {
                return Err(self.unsupported("label", token.start));
            }
            if self.at_declaration() {
                self.parse_declaration()?;
                let semi = self.expect_punct(";")?;
                return self.emit(SyntaxChunkType::StatementEnd, semi.end, "");
            }
        }
        self.parse_expression_statement()
    }

    fn parse_expression_statement(&mut self) -> Result<()> {
        self.parse_expression(BindingPower::MIN)?;
        let semi = self.expect_punct(";")?;
        self.emit(SyntaxChunkType::StatementEnd, semi.end, "")
    }

    /// `( expression )` of a header; returns the end of the `)`.
    fn parse_condition(&mut self) -> Result<u32> {
        self.expect_punct("(")?;
        self.parse_expression(BindingPower::MIN)?;
        Ok(self.expect_punct(")")?.end)
    }

    fn parse_if(&mut self) -> Result<()> {
        let keyword = self.bump();
        self.emit(SyntaxChunkType::IfHeader, keyword.end, "")?;
        let end = self.parse_condition()?;
        self.emit(SyntaxChunkType::IfCondition, end, "")?;
        self.parse_body()?;
        if self.at_word("else") {
            let keyword = self.bump();
            self.emit(SyntaxChunkType::Else, keyword.end, "")?;
            self.parse_body()?;
        }
        let end = self.last_end();
        self.emit(SyntaxChunkType::IfEnd, end, "")
    }

    fn parse_for(&mut self) -> Result<()> {
        let keyword = self.bump();
        self.emit(SyntaxChunkType::ForHeader, keyword.end, "")?;
        self.expect_punct("(")?;

        if !self.at_punct(";") {
            if self.at_declaration() {
                self.parse_declaration()?;
            } else {
                self.parse_expression(BindingPower::MIN)?;
            }
        }
        let semi = self.expect_punct(";")?;
        self.emit(SyntaxChunkType::ForInit, semi.end, "")?;

        if !self.at_punct(";") {
            self.parse_expression(BindingPower::MIN)?;
        }
        let semi = self.expect_punct(";")?;
        self.emit(SyntaxChunkType::ForCondition, semi.end, "")?;

        if !self.at_punct(")") {
            self.parse_expression(BindingPower::MIN)?;
        }
        let close = self.expect_punct(")")?;
        self.emit(SyntaxChunkType::ForChange, close.end, "")?;

        self.parse_body()?;
        let end = self.last_end();
        self.emit(SyntaxChunkType::LoopEnd, end, "")
    }

    fn parse_while(&mut self) -> Result<()> {
        let keyword = self.bump();
        self.emit(SyntaxChunkType::WhileHeader, keyword.end, "")?;
        let end = self.parse_condition()?;
        self.emit(SyntaxChunkType::WhileCondition, end, "")?;
        self.parse_body()?;
        let end = self.last_end();
        self.emit(SyntaxChunkType::LoopEnd, end, "")
    }

    fn parse_do(&mut self) -> Result<()> {
        let keyword = self.bump();
        self.emit(SyntaxChunkType::DoHeader, keyword.end, "")?;
        self.parse_body()?;
        if !self.at_word("while") {
            return Err(self.unexpected("`while`"));
        }
        self.bump();
        let end = self.parse_condition()?;
        self.emit(SyntaxChunkType::DoWhileCondition, end, "")?;
        let semi = self.expect_punct(";")?;
        self.emit(SyntaxChunkType::LoopEnd, semi.end, "")
    }

    fn parse_switch(&mut self) -> Result<()> {
        let keyword = self.bump();
        self.emit(SyntaxChunkType::SwitchHeader, keyword.end, "")?;
        let end = self.parse_condition()?;
        self.emit(SyntaxChunkType::SwitchCondition, end, "")?;
        if !self.at_punct("{") {
            return Err(self.unsupported("switch body without braces", self.peek().start));
        }
        self.parse_compound_statement()?;
        let end = self.last_end();
        self.emit(SyntaxChunkType::SwitchEnd, end, "")
    }

    /// `case <constant-expression> :` reports the label text verbatim.
    fn parse_case_label(&mut self) -> Result<()> {
        let keyword = self.bump();
        let mut depth = 0usize;
        let mut pending_colons = 0usize;
        let colon = loop {
            let token = self.peek();
            match (token.kind, self.text(token)) {
                (TokenKind::Eof, _) => return Err(self.unexpected("`:`")),
                (TokenKind::Punct, "(" | "[") => depth += 1,
                (TokenKind::Punct, ")" | "]") => depth = depth.saturating_sub(1),
                (TokenKind::Punct, "?") => pending_colons += 1,
                (TokenKind::Punct, ":") if depth == 0 && pending_colons == 0 => break self.bump(),
                (TokenKind::Punct, ":") => pending_colons = pending_colons.saturating_sub(1),
                _ => {}
            }
            self.bump();
        };
        let text = self.slice(keyword.end, colon.start);
        let label = text.trim();
        if label.is_empty() {
            return Err(self.unexpected("case label"));
        }
        debug!("case label `{label}`");
        self.emit(SyntaxChunkType::CaseLabel, colon.end, label)
    }

    fn parse_return(&mut self) -> Result<()> {
        self.bump();
        if !self.at_punct(";") {
            self.parse_expression(BindingPower::MIN)?;
        }
        let semi = self.expect_punct(";")?;
        self.emit(SyntaxChunkType::Return, semi.end, "")
    }

    /// `defer <expression>;` or `defer { ... }`
    fn parse_defer(&mut self) -> Result<()> {
        let keyword = self.bump();
        self.emit(SyntaxChunkType::DeferHeader, keyword.end, "")?;
        if self.at_punct("{") {
            self.parse_compound_statement()?;
            let end = self.last_end();
            return self.emit(SyntaxChunkType::Defer, end, "");
        }

        // the deferred text is re-emitted from the operand's own span, which
        // cannot cover parentheses at either edge
        let first = self.peek();
        if self.is_punct(first, "(") && !self.is_type_start(self.peek_at(1)) {
            return Err(self.unsupported("parenthesized deferred expression", first.start));
        }
        self.group_close = None;
        self.parse_expression(BindingPower::MIN)?;
        if self.group_close.is_some_and(|close| close + 1 == self.pos) {
            return Err(self.unsupported("parenthesized deferred expression", keyword.start));
        }
        let semi = self.expect_punct(";")?;
        self.emit(SyntaxChunkType::Defer, semi.end, "")
    }
}
