//! Error taxonomy and one-line construct reports.

use std::fmt;
use std::io;
use std::path::PathBuf;

use log::info;

use crate::semantic::{BuilderMode, SyntaxChunkType};

/// Log target used for construct reports.
pub const REPORT_TARGET: &str = "cdefer::report";

/// A violation of the reduction-event contract. Always fatal for the
/// translation unit being built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("@{offset}: {event} expects an operand but none is staged")]
    MissingOperand { event: SyntaxChunkType, offset: u32 },

    #[error("@{offset}: {event} arrived with an empty scope stack")]
    EmptyScopeStack { event: SyntaxChunkType, offset: u32 },

    #[error("@{offset}: {event} does not close the innermost open scope ({open})")]
    UnbalancedScope {
        event: SyntaxChunkType,
        open: &'static str,
        offset: u32,
    },

    #[error("@{offset}: unexpected {event} while {mode:?}")]
    UnexpectedEvent {
        event: SyntaxChunkType,
        mode: BuilderMode,
        offset: u32,
    },

    #[error("@{offset}: {event} without a preceding declarator")]
    MissingDeclarator { event: SyntaxChunkType, offset: u32 },

    #[error("@{offset}: declarator `{name}` has no type")]
    MissingType { name: String, offset: u32 },

    #[error("@{offset}: invalid literal {literal:?} for {event}")]
    InvalidLiteral {
        event: SyntaxChunkType,
        literal: String,
        offset: u32,
    },

    #[error("@{offset}: prefix operator `{op}` has no operand")]
    DanglingUnaryOperator { op: String, offset: u32 },
}

impl ProtocolError {
    pub fn offset(&self) -> u32 {
        match self {
            ProtocolError::MissingOperand { offset, .. }
            | ProtocolError::EmptyScopeStack { offset, .. }
            | ProtocolError::UnbalancedScope { offset, .. }
            | ProtocolError::UnexpectedEvent { offset, .. }
            | ProtocolError::MissingDeclarator { offset, .. }
            | ProtocolError::MissingType { offset, .. }
            | ProtocolError::InvalidLiteral { offset, .. }
            | ProtocolError::DanglingUnaryOperator { offset, .. } => *offset,
        }
    }
}

/// Errors raised by the reference event producer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("@{offset}: unexpected token `{found}`, expected {expected}")]
    UnexpectedToken {
        expected: String,
        found: String,
        offset: u32,
    },

    #[error("@{offset}: unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String, offset: u32 },

    #[error("@{offset}: unsupported construct: {construct}")]
    Unsupported { construct: String, offset: u32 },

    #[error("@{offset}: {message}")]
    Lexical { message: String, offset: u32 },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ParseError {
    pub fn offset(&self) -> u32 {
        match self {
            ParseError::UnexpectedToken { offset, .. }
            | ParseError::UnexpectedEof { offset, .. }
            | ParseError::Unsupported { offset, .. }
            | ParseError::Lexical { offset, .. } => *offset,
            ParseError::Protocol(e) => e.offset(),
        }
    }
}

/// Failures that make regeneration impossible as a whole.
#[derive(Debug, thiserror::Error)]
pub enum RegenError {
    #[error("cannot create output file {}: {source}", path.display())]
    CreateOutput { path: PathBuf, source: io::Error },
}

/// Errors surfaced by the driver for one input file.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("cannot read {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("{}: parse error {source}", path.display())]
    Parse { path: PathBuf, source: ParseError },

    #[error("{}: malformed event stream {source}", path.display())]
    Protocol { path: PathBuf, source: ProtocolError },

    #[error(transparent)]
    Regen(#[from] RegenError),

    #[error("{failed} of {total} input files failed")]
    Failed { failed: usize, total: usize },
}

/// A structured one-line report about a construct of interest.
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    pub kind: &'a str,
    pub offset: u32,
    pub note: &'a str,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] @{}: {}", self.kind, self.offset, self.note)
    }
}

/// Emit a report under [`REPORT_TARGET`].
pub fn report(kind: &str, offset: u32, note: &str) {
    info!(target: REPORT_TARGET, "{}", Report { kind, offset, note });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_line_format() {
        let line = Report {
            kind: "Defer",
            offset: 42,
            note: "armed",
        }
        .to_string();
        assert_eq!(line, "[Defer] @42: armed");
    }

    #[test]
    fn parse_error_exposes_protocol_offset() {
        let err = ParseError::from(ProtocolError::MissingOperand {
            event: SyntaxChunkType::Assignment,
            offset: 7,
        });
        assert_eq!(err.offset(), 7);
    }
}
