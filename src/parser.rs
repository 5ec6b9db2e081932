//! Reference event producer.
//!
//! A recursive-descent parser for the supported dialect subset. It builds no
//! tree of its own: every recognised production is reported to a
//! [`ReductionSink`] as one reduction event, in bottom-up order.
//!
//! Only function definitions produce events. Every other top-level construct
//! is skipped, which leaves its text to be regenerated verbatim.

use std::borrow::Cow;

use hashbrown::HashSet;
use log::debug;

use crate::ast::NameId;
use crate::diagnostic::ParseError;
use crate::semantic::{ReductionSink, SyntaxChunkType};

pub mod declarations;
pub mod expressions;
pub mod lexer;
pub mod statements;

pub(crate) use expressions::BindingPower;
use lexer::{Lexer, Token, TokenKind};

type Result<T> = std::result::Result<T, ParseError>;

/// Typedef names seen so far, used to tell declarations from expressions.
#[derive(Debug)]
pub(crate) struct TypeDefContext {
    typedef_names: HashSet<NameId>,
}

impl Default for TypeDefContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeDefContext {
    /// Create a new type context with common library typedefs
    pub(crate) fn new() -> Self {
        let builtins = [
            "va_list", "size_t", "ssize_t", "ptrdiff_t", "off_t", "FILE", "bool", "wchar_t", "int8_t", "int16_t",
            "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t", "intptr_t", "uintptr_t",
        ];
        TypeDefContext {
            typedef_names: builtins.into_iter().map(NameId::new).collect(),
        }
    }

    pub(crate) fn is_type_name(&self, name: &str) -> bool {
        self.typedef_names.contains(&NameId::new(name))
    }

    pub(crate) fn add_typedef(&mut self, name: &str) {
        debug!("typedef name `{name}`");
        self.typedef_names.insert(NameId::new(name));
    }
}

/// Words that start or continue declaration specifiers.
const SPECIFIER_WORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "_Bool", "_Complex", "const",
    "volatile", "restrict", "static", "extern", "register", "auto", "inline", "_Atomic", "_Thread_local",
    "_Noreturn",
];

const TAG_WORDS: &[&str] = &["struct", "union", "enum"];

const RESERVED_WORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "case", "default", "return", "break", "continue", "goto", "sizeof",
    "typedef", "defer",
];

/// Parser state over one source buffer.
pub struct Parser<'a, S: ReductionSink> {
    src: &'a [u8],
    tokens: Vec<Token>,
    pos: usize,
    sink: &'a mut S,
    types: TypeDefContext,
    /// Index of the `)` closing the most recent parenthesized expression.
    group_close: Option<usize>,
}

/// Tokenize `source` and report its reduction events to `sink`.
pub fn produce_events<S: ReductionSink>(source: &[u8], sink: &mut S) -> Result<()> {
    let tokens = Lexer::new(source).tokenize_all()?;
    let mut parser = Parser {
        src: source,
        tokens,
        pos: 0,
        sink,
        types: TypeDefContext::new(),
        group_close: None,
    };
    parser.parse_translation_unit()
}

impl<'a, S: ReductionSink> Parser<'a, S> {
    // --- token helpers ---

    fn peek(&self) -> Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> Token {
        let index = (self.pos + ahead).min(self.tokens.len().saturating_sub(1));
        self.tokens[index]
    }

    fn text(&self, token: Token) -> &'a str {
        let bytes = &self.src[token.start as usize..token.end as usize];
        std::str::from_utf8(bytes).unwrap_or("")
    }

    /// Source text of `start..end`. Bytes that are not UTF-8 (Latin-1
    /// literals, say) decode lossily; spans always come from the tokens.
    fn slice(&self, start: u32, end: u32) -> Cow<'a, str> {
        String::from_utf8_lossy(&self.src[start as usize..end as usize])
    }

    fn literal(&self, token: Token) -> Cow<'a, str> {
        self.slice(token.start, token.end)
    }

    fn bump(&mut self) -> Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    /// End of the last consumed token.
    fn last_end(&self) -> u32 {
        match self.pos {
            0 => 0,
            p => self.tokens[p - 1].end,
        }
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn is_punct(&self, token: Token, punct: &str) -> bool {
        token.kind == TokenKind::Punct && self.text(token) == punct
    }

    fn is_word(&self, token: Token, word: &str) -> bool {
        token.kind == TokenKind::Word && self.text(token) == word
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.is_punct(self.peek(), punct)
    }

    fn at_word(&self, word: &str) -> bool {
        self.is_word(self.peek(), word)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        if token.kind == TokenKind::Eof {
            ParseError::UnexpectedEof {
                expected: expected.to_string(),
                offset: token.start,
            }
        } else {
            ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: self.literal(token).into_owned(),
                offset: token.start,
            }
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<Token> {
        if self.at_punct(punct) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(&format!("`{punct}`")))
        }
    }

    fn unsupported(&self, construct: &str, offset: u32) -> ParseError {
        ParseError::Unsupported {
            construct: construct.to_string(),
            offset,
        }
    }

    /// Index of the token closing the bracket at `open`.
    fn matching_close(&self, open: usize) -> Option<usize> {
        let (left, right) = match self.text(self.tokens[open]) {
            "(" => ("(", ")"),
            "[" => ("[", "]"),
            "{" => ("{", "}"),
            _ => return None,
        };
        let mut depth = 0usize;
        for (i, &token) in self.tokens.iter().enumerate().skip(open) {
            if token.kind != TokenKind::Punct {
                continue;
            }
            let text = self.text(token);
            if text == left {
                depth += 1;
            } else if text == right {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
        }
        None
    }

    fn emit(&mut self, kind: SyntaxChunkType, offset: u32, literal: &str) -> Result<()> {
        self.sink.handle(kind, offset, literal)?;
        Ok(())
    }

    /// Emit a leaf reduction whose source text is `start..end`.
    fn emit_leaf(&mut self, kind: SyntaxChunkType, start: u32, end: u32, literal: &str) -> Result<()> {
        self.sink.handle_leaf(kind, start, end, literal)?;
        Ok(())
    }

    // --- classification ---

    fn is_type_start(&self, token: Token) -> bool {
        if token.kind != TokenKind::Word {
            return false;
        }
        let text = self.text(token);
        SPECIFIER_WORDS.contains(&text) || TAG_WORDS.contains(&text) || self.types.is_type_name(text)
    }

    fn is_identifier(&self, token: Token) -> bool {
        if token.kind != TokenKind::Word {
            return false;
        }
        let text = self.text(token);
        !SPECIFIER_WORDS.contains(&text) && !TAG_WORDS.contains(&text) && !RESERVED_WORDS.contains(&text)
    }

    // --- top level ---

    fn parse_translation_unit(&mut self) -> Result<()> {
        while !self.at_eof() {
            if self.at_function_definition() {
                self.parse_function_definition()?;
            } else {
                self.skip_external_declaration();
            }
        }
        let end = self.src.len() as u32;
        self.emit(SyntaxChunkType::TranslationUnitEnd, end, "")
    }

    /// `specifiers declarator ( params ) {` ahead?
    fn at_function_definition(&self) -> bool {
        if !self.is_type_start(self.peek()) {
            return false;
        }
        let mut i = self.pos;
        while i < self.tokens.len() {
            let token = self.tokens[i];
            match token.kind {
                TokenKind::Eof => return false,
                TokenKind::Punct => match self.text(token) {
                    "(" => break,
                    "*" | "&" => {}
                    _ => return false,
                },
                TokenKind::Word if self.is_word(token, "typedef") => return false,
                TokenKind::Word => {}
                _ => return false,
            }
            i += 1;
        }
        if i == self.pos || !self.is_identifier(self.tokens[i - 1]) {
            return false;
        }
        self.matching_close(i)
            .is_some_and(|close| self.is_punct(self.peek_at(close + 1 - self.pos), "{"))
    }

    /// Skip one top-level construct up to its terminating `;`, or past a
    /// brace block that is not followed by a declarator.
    fn skip_external_declaration(&mut self) {
        let is_typedef = self.at_word("typedef");
        let mut last_name: Option<Token> = None;
        while !self.at_eof() {
            let token = self.peek();
            if self.is_punct(token, ";") {
                self.bump();
                break;
            }
            if self.is_punct(token, "{") || self.is_punct(token, "(") || self.is_punct(token, "[") {
                let close = self.matching_close(self.pos).unwrap_or(self.tokens.len() - 1);
                self.pos = close;
                self.bump();
                if self.is_punct(token, "{") && !self.at_punct(";") && !self.is_identifier(self.peek()) && !self.at_punct("*")
                {
                    break;
                }
                continue;
            }
            if self.is_identifier(token) {
                last_name = Some(token);
            }
            self.bump();
        }
        if is_typedef && let Some(name) = last_name {
            let name = self.text(name);
            self.types.add_typedef(name);
        }
        debug!("skipped top-level text up to @{}", self.last_end());
    }

    fn parse_function_definition(&mut self) -> Result<()> {
        self.parse_decl_specifiers()?;
        self.parse_declarator(false)?;
        self.expect_punct("(")?;
        self.parse_parameter_list()?;
        let close = self.expect_punct(")")?;
        self.emit(SyntaxChunkType::FunctionHeader, close.end, "")?;
        self.parse_compound_statement()?;
        let end = self.last_end();
        self.emit(SyntaxChunkType::FunctionEnd, end, "")
    }
}
