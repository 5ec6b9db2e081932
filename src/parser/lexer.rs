//! Byte-level lexer for the reference producer.
//!
//! Tokens keep only their kind and byte range; text is sliced from the source
//! on demand. Whitespace, comments and preprocessor lines are skipped.

use crate::diagnostic::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifiers and keywords.
    Word,
    Number,
    StringLiteral,
    CharLiteral,
    Punct,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: u32,
    pub end: u32,
}

const PUNCTUATORS: &[&str] = &[
    "...", "<<=", ">>=", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "##",
];

const SINGLE_PUNCTUATORS: &[u8] = b"{}()[];,.:?~!+-*/%<>=&|^#";

pub struct Lexer<'src> {
    src: &'src [u8],
    pos: usize,
    /// True while only whitespace has been seen on the current line.
    line_start: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src [u8]) -> Self {
        Lexer {
            src,
            pos: 0,
            line_start: true,
        }
    }

    /// Tokenize the whole input. The last token is always `Eof`.
    pub fn tokenize_all(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            tokens.push(token);
            if token.kind == TokenKind::Eof {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self, ahead: usize) -> u8 {
        self.src.get(self.pos + ahead).copied().unwrap_or(0)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn error(&self, message: &str, offset: usize) -> ParseError {
        ParseError::Lexical {
            message: message.to_string(),
            offset: offset as u32,
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        while !self.at_end() {
            let c = self.peek(0);
            match c {
                b'\n' => {
                    self.pos += 1;
                    self.line_start = true;
                }
                b' ' | b'\t' | b'\r' | 0x0b | 0x0c => self.pos += 1,
                b'\\' if self.peek(1) == b'\n' => self.pos += 2,
                b'/' if self.peek(1) == b'/' => {
                    while !self.at_end() && self.peek(0) != b'\n' {
                        self.pos += 1;
                    }
                }
                b'/' if self.peek(1) == b'*' => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        if self.at_end() {
                            return Err(self.error("unterminated comment", start));
                        }
                        if self.peek(0) == b'*' && self.peek(1) == b'/' {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                b'#' if self.line_start => self.skip_directive(),
                _ => return Ok(()),
            }
        }
        Ok(())
    }

    /// Skip a preprocessor line, following backslash continuations.
    fn skip_directive(&mut self) {
        while !self.at_end() {
            match self.peek(0) {
                b'\\' if self.peek(1) == b'\n' => self.pos += 2,
                b'\\' if self.peek(1) == b'\r' && self.peek(2) == b'\n' => self.pos += 3,
                b'\n' => return,
                _ => self.pos += 1,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia()?;
        let start = self.pos;
        if self.at_end() {
            return Ok(self.token(TokenKind::Eof, start));
        }
        self.line_start = false;

        let c = self.peek(0);
        let kind = match c {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | 0x80..=0xff => {
                // encoding prefixes: L"..", u8"..", U'..'
                if let Some(quote) = self.prefixed_quote() {
                    self.lex_quoted(quote)?;
                    if quote == b'"' {
                        TokenKind::StringLiteral
                    } else {
                        TokenKind::CharLiteral
                    }
                } else {
                    while matches!(self.peek(0), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | 0x80..=0xff) {
                        self.pos += 1;
                    }
                    TokenKind::Word
                }
            }
            b'0'..=b'9' => {
                self.lex_number();
                TokenKind::Number
            }
            b'.' if self.peek(1).is_ascii_digit() => {
                self.lex_number();
                TokenKind::Number
            }
            b'"' => {
                self.lex_quoted(b'"')?;
                TokenKind::StringLiteral
            }
            b'\'' => {
                self.lex_quoted(b'\'')?;
                TokenKind::CharLiteral
            }
            _ => {
                let rest = &self.src[self.pos..];
                if let Some(p) = PUNCTUATORS.iter().find(|p| rest.starts_with(p.as_bytes())) {
                    self.pos += p.len();
                } else if SINGLE_PUNCTUATORS.contains(&c) {
                    self.pos += 1;
                } else {
                    return Err(self.error(&format!("stray byte 0x{c:02x}"), start));
                }
                TokenKind::Punct
            }
        };
        Ok(self.token(kind, start))
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            start: start as u32,
            end: self.pos as u32,
        }
    }

    /// Consume an encoding prefix if a quote follows it.
    fn prefixed_quote(&mut self) -> Option<u8> {
        let prefix_len = match (self.peek(0), self.peek(1), self.peek(2)) {
            (b'u', b'8', b'"' | b'\'') => 2,
            (b'L' | b'u' | b'U', b'"' | b'\'', _) => 1,
            _ => return None,
        };
        self.pos += prefix_len;
        Some(self.peek(0))
    }

    fn lex_quoted(&mut self, quote: u8) -> Result<(), ParseError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek(0) {
                _ if self.at_end() => return Err(self.error("unterminated literal", start)),
                b'\\' => self.pos += 2,
                b'\n' => return Err(self.error("newline in literal", start)),
                c if c == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => self.pos += 1,
            }
        }
    }

    /// pp-number: digits, letters, dots and signed exponents.
    fn lex_number(&mut self) {
        loop {
            let c = self.peek(0);
            if matches!(c, b'e' | b'E' | b'p' | b'P') && matches!(self.peek(1), b'+' | b'-') {
                self.pos += 2;
            } else if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || c == b'\'' && self.peek(1).is_ascii_digit() {
                self.pos += 1;
            } else {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenKind, String)> {
        Lexer::new(src.as_bytes())
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, src[t.start as usize..t.end as usize].to_string()))
            .collect()
    }

    #[test]
    fn skips_comments_and_directives() {
        let toks = kinds("#include <stdio.h>\n/* c */ int x; // tail\n  #define A \\\n 1\ny");
        let texts: Vec<&str> = toks.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(texts, vec!["int", "x", ";", "y", ""]);
    }

    #[test]
    fn longest_punctuator_wins() {
        let toks = kinds("a->b <<= c...");
        let texts: Vec<&str> = toks.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(texts, vec!["a", "->", "b", "<<=", "c", "...", ""]);
    }

    #[test]
    fn literals() {
        let toks = kinds(r#"L"w" 'a' "s\"q" 1.5e+3f 0x1F"#);
        assert_eq!(toks[0].0, TokenKind::StringLiteral);
        assert_eq!(toks[1].0, TokenKind::CharLiteral);
        assert_eq!(toks[2], (TokenKind::StringLiteral, r#""s\"q""#.to_string()));
        assert_eq!(toks[3], (TokenKind::Number, "1.5e+3f".to_string()));
        assert_eq!(toks[4], (TokenKind::Number, "0x1F".to_string()));
    }

    #[test]
    fn unterminated_comment_is_an_error() {
        assert!(Lexer::new(b"int /* x").tokenize_all().is_err());
    }
}
