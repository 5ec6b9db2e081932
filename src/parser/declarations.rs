//! Declaration specifiers, declarators and initializers.

use log::trace;

use super::lexer::TokenKind;
use super::{BindingPower, Parser, Result, SPECIFIER_WORDS, TAG_WORDS};
use crate::semantic::{ReductionSink, SyntaxChunkType};

const QUALIFIER_WORDS: &[&str] = &["const", "volatile", "restrict", "_Atomic"];

impl<'a, S: ReductionSink> Parser<'a, S> {
    /// Report each specifier word as a `Type` fragment. `struct X` becomes a
    /// `StructKeyword` followed by the tag name.
    pub(crate) fn parse_decl_specifiers(&mut self) -> Result<()> {
        let mut seen_type = false;
        let mut any = false;
        loop {
            let token = self.peek();
            if token.kind != TokenKind::Word {
                break;
            }
            let word = self.text(token);
            if TAG_WORDS.contains(&word) {
                self.bump();
                self.emit(SyntaxChunkType::StructKeyword, token.end, word)?;
                let tag = self.peek();
                if !self.is_identifier(tag) {
                    return Err(self.unexpected("tag name"));
                }
                self.bump();
                if self.at_punct("{") {
                    return Err(self.unsupported("tag definition inside a function", token.start));
                }
                self.emit_leaf(SyntaxChunkType::Type, tag.start, tag.end, &self.literal(tag))?;
                seen_type = true;
            } else if SPECIFIER_WORDS.contains(&word) {
                self.bump();
                self.emit(SyntaxChunkType::Type, token.end, word)?;
                seen_type |= !QUALIFIER_WORDS.contains(&word);
            } else if !seen_type && self.types.is_type_name(word) {
                self.bump();
                self.emit(SyntaxChunkType::Type, token.end, word)?;
                seen_type = true;
            } else {
                break;
            }
            any = true;
        }
        if any { Ok(()) } else { Err(self.unexpected("type specifier")) }
    }

    /// Pointer and reference markers, the declared name and any array suffixes.
    ///
    /// With `abstract_ok` a missing name is reported as an empty declarator.
    pub(crate) fn parse_declarator(&mut self, abstract_ok: bool) -> Result<()> {
        loop {
            let token = self.peek();
            if self.is_punct(token, "*") {
                self.bump();
                self.emit(SyntaxChunkType::Pointer, token.end, "*")?;
                while QUALIFIER_WORDS.iter().any(|q| self.at_word(q)) {
                    self.bump();
                }
            } else if self.is_punct(token, "&") {
                self.bump();
                self.emit(SyntaxChunkType::Reference, token.end, "&")?;
            } else {
                break;
            }
        }

        let name = self.peek();
        if self.is_punct(name, "(") {
            return Err(self.unsupported("function pointer declarator", name.start));
        }
        if self.is_identifier(name) {
            self.bump();
            self.emit_leaf(SyntaxChunkType::DirectDeclarator, name.start, name.end, &self.literal(name))?;
        } else if abstract_ok {
            let end = self.last_end();
            self.emit(SyntaxChunkType::DirectDeclarator, end, "")?;
        } else {
            return Err(self.unexpected("declarator name"));
        }

        while self.at_punct("[") {
            let open = self.peek();
            let close = self.matching_close(self.pos).ok_or_else(|| self.unexpected("`]`"))?;
            let end = self.tokens[close].end;
            self.pos = close + 1;
            let suffix = self.slice(open.start, end);
            self.emit_leaf(SyntaxChunkType::ArrayDeclarator, open.start, end, &suffix)?;
        }
        Ok(())
    }

    /// Parameters of a function definition, up to but excluding the `)`.
    pub(crate) fn parse_parameter_list(&mut self) -> Result<()> {
        if self.at_punct(")") {
            return Ok(());
        }
        if self.at_word("void") && self.is_punct(self.peek_at(1), ")") {
            self.bump();
            return Ok(());
        }
        loop {
            if self.eat_punct("...") {
                trace!("variadic parameter list");
                break;
            }
            self.parse_decl_specifiers()?;
            self.parse_declarator(true)?;
            if self.at_punct("(") {
                return Err(self.unsupported("function parameter declarator", self.peek().start));
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(())
    }

    /// `specifiers declarator [= initializer], ...` without the terminator.
    pub(crate) fn parse_declaration(&mut self) -> Result<()> {
        if self.at_word("typedef") {
            return Err(self.unsupported("block-scope typedef", self.peek().start));
        }
        self.parse_decl_specifiers()?;
        loop {
            self.parse_declarator(false)?;
            if self.at_punct("(") {
                return Err(self.unsupported("block-scope function declaration", self.peek().start));
            }
            if self.eat_punct("=") {
                self.parse_initializer()?;
                let end = self.last_end();
                self.emit(SyntaxChunkType::Assignment, end, "=")?;
            }
            if !self.eat_punct(",") {
                return Ok(());
            }
        }
    }

    fn parse_initializer(&mut self) -> Result<()> {
        if !self.at_punct("{") {
            return self.parse_expression(BindingPower::ASSIGNMENT);
        }
        self.bump();
        let mut count = 0usize;
        while !self.at_punct("}") {
            let token = self.peek();
            if self.is_punct(token, ".") || self.is_punct(token, "[") {
                return Err(self.unsupported("designated initializer", token.start));
            }
            self.parse_initializer()?;
            count += 1;
            if !self.eat_punct(",") {
                break;
            }
        }
        let close = self.expect_punct("}")?;
        self.emit(SyntaxChunkType::InitializerList, close.end, &count.to_string())
    }

    /// Whether the statement at the cursor starts with a declaration.
    pub(crate) fn at_declaration(&self) -> bool {
        let token = self.peek();
        if self.is_word(token, "typedef") {
            return true;
        }
        if !self.is_type_start(token) {
            return false;
        }
        // `T (x)` and `T = ...` with a typedef name `T` are still expressions
        let next = self.peek_at(1);
        !(self.types.is_type_name(self.text(token)) && (self.is_punct(next, "=") || self.is_punct(next, "(")))
    }
}
