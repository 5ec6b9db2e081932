//! Reduction events and declarator fragments.

use std::fmt;

use crate::diagnostic::ProtocolError;

/// One grammar reduction reported by the scanner/parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxChunkType {
    // declarators
    Type,
    StructKeyword,
    Pointer,
    Reference,
    DirectDeclarator,
    ArrayDeclarator,
    // functions and blocks
    FunctionHeader,
    FunctionEnd,
    ScopeStart,
    ScopeEnd,
    ImplicitScopeStart,
    ImplicitScopeEnd,
    // selection and iteration
    IfHeader,
    IfCondition,
    Else,
    IfEnd,
    ForHeader,
    ForInit,
    ForCondition,
    ForChange,
    WhileHeader,
    WhileCondition,
    DoHeader,
    DoWhileCondition,
    LoopEnd,
    SwitchHeader,
    SwitchCondition,
    CaseLabel,
    DefaultLabel,
    SwitchEnd,
    // statements
    StatementEnd,
    EmptyStatement,
    Return,
    Jump,
    DeferHeader,
    Defer,
    // expressions
    Identifier,
    Constant,
    Assignment,
    Relational,
    BinaryOperator,
    UnaryOperator,
    PostfixCall,
    PostfixIndex,
    PostfixMember,
    PostfixIncrement,
    InitializerList,
    TranslationUnitEnd,
}

impl SyntaxChunkType {
    pub fn label(self) -> &'static str {
        match self {
            SyntaxChunkType::Type => "Type",
            SyntaxChunkType::StructKeyword => "StructKeyword",
            SyntaxChunkType::Pointer => "Pointer",
            SyntaxChunkType::Reference => "Reference",
            SyntaxChunkType::DirectDeclarator => "DirectDeclarator",
            SyntaxChunkType::ArrayDeclarator => "ArrayDeclarator",
            SyntaxChunkType::FunctionHeader => "FunctionHeader",
            SyntaxChunkType::FunctionEnd => "FunctionEnd",
            SyntaxChunkType::ScopeStart => "ScopeStart",
            SyntaxChunkType::ScopeEnd => "ScopeEnd",
            SyntaxChunkType::ImplicitScopeStart => "ImplicitScopeStart",
            SyntaxChunkType::ImplicitScopeEnd => "ImplicitScopeEnd",
            SyntaxChunkType::IfHeader => "IfHeader",
            SyntaxChunkType::IfCondition => "IfCondition",
            SyntaxChunkType::Else => "Else",
            SyntaxChunkType::IfEnd => "IfEnd",
            SyntaxChunkType::ForHeader => "ForHeader",
            SyntaxChunkType::ForInit => "ForInit",
            SyntaxChunkType::ForCondition => "ForCondition",
            SyntaxChunkType::ForChange => "ForChange",
            SyntaxChunkType::WhileHeader => "WhileHeader",
            SyntaxChunkType::WhileCondition => "WhileCondition",
            SyntaxChunkType::DoHeader => "DoHeader",
            SyntaxChunkType::DoWhileCondition => "DoWhileCondition",
            SyntaxChunkType::LoopEnd => "LoopEnd",
            SyntaxChunkType::SwitchHeader => "SwitchHeader",
            SyntaxChunkType::SwitchCondition => "SwitchCondition",
            SyntaxChunkType::CaseLabel => "CaseLabel",
            SyntaxChunkType::DefaultLabel => "DefaultLabel",
            SyntaxChunkType::SwitchEnd => "SwitchEnd",
            SyntaxChunkType::StatementEnd => "StatementEnd",
            SyntaxChunkType::EmptyStatement => "EmptyStatement",
            SyntaxChunkType::Return => "Return",
            SyntaxChunkType::Jump => "Jump",
            SyntaxChunkType::DeferHeader => "DeferHeader",
            SyntaxChunkType::Defer => "Defer",
            SyntaxChunkType::Identifier => "Identifier",
            SyntaxChunkType::Constant => "Constant",
            SyntaxChunkType::Assignment => "Assignment",
            SyntaxChunkType::Relational => "Relational",
            SyntaxChunkType::BinaryOperator => "BinaryOperator",
            SyntaxChunkType::UnaryOperator => "UnaryOperator",
            SyntaxChunkType::PostfixCall => "PostfixCall",
            SyntaxChunkType::PostfixIndex => "PostfixIndex",
            SyntaxChunkType::PostfixMember => "PostfixMember",
            SyntaxChunkType::PostfixIncrement => "PostfixIncrement",
            SyntaxChunkType::InitializerList => "InitializerList",
            SyntaxChunkType::TranslationUnitEnd => "TranslationUnitEnd",
        }
    }
}

impl fmt::Display for SyntaxChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Type,
    Pointer,
    Reference,
}

/// A declarator fragment waiting for its direct declarator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxChunk {
    pub kind: ChunkKind,
    /// Start of the fragment's text.
    pub start: u32,
    pub text: String,
}

/// Consumer of reduction events.
///
/// `offset` is the exclusive end offset of the reduced production. `literal`
/// is the exact source text for leaf reductions, an operand count for
/// `PostfixCall`/`InitializerList`, and empty otherwise.
pub trait ReductionSink {
    fn handle(&mut self, kind: SyntaxChunkType, offset: u32, literal: &str) -> Result<(), ProtocolError>;

    /// A leaf reduction covering `start..end`, for when `literal` is not the
    /// exact source text (bytes that are not UTF-8 decode lossily).
    fn handle_leaf(&mut self, kind: SyntaxChunkType, start: u32, end: u32, literal: &str) -> Result<(), ProtocolError> {
        let _ = start;
        self.handle(kind, end, literal)
    }
}
