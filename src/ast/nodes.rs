//! AST node definitions.
//!
//! This module contains the [`NodeKind`] enum with its payload structs, the
//! fieldless [`NodeTag`] used for dispatch and labels, source spans, dirty
//! tracking, and the regeneration requests a node can carry.

use std::fmt;
use std::path::PathBuf;

use thin_vec::ThinVec;

use crate::ast::{NameId, NodeRef};

/// Half-open byte range `[start, end)` into the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SemSpan {
    pub start: u32,
    pub end: u32,
}

impl SemSpan {
    /// Sentinel for nodes with no source text of their own.
    pub const NONE: SemSpan = SemSpan { start: 0, end: 0 };

    pub fn new(start: u32, end: u32) -> Self {
        SemSpan { start, end }
    }

    pub fn is_none(self) -> bool {
        self == SemSpan::NONE
    }

    pub fn is_empty(self) -> bool {
        self.start >= self.end
    }

    pub fn len(self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Smallest span covering both. `NONE` is the identity.
    pub fn merge(self, other: SemSpan) -> SemSpan {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        SemSpan::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn contains(self, other: SemSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for SemSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{})", self.start, self.end)
    }
}

/// Edit status of a node relative to the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dirty {
    #[default]
    Clean,
    /// Synthesized; its text is spliced in from its span.
    Added,
    /// Kept in place, but carries extra regeneration requests.
    Modified,
    /// Omitted from the output together with its whole subtree.
    Removed,
}

bitflags::bitflags! {
    /// Requests a node makes of the source regenerator.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct SpecialActions: u8 {
        const PREPEND_NEWLINE = 1 << 0;
        const APPEND_SEMICOLON = 1 << 1;
        const OMIT = 1 << 2;
        const OPEN_BRACE = 1 << 3;
        const CLOSE_BRACE = 1 << 4;
    }
}

impl SpecialActions {
    /// Requests emitted before a range's bytes.
    pub const LEADING: SpecialActions = SpecialActions::OPEN_BRACE.union(SpecialActions::PREPEND_NEWLINE);
    /// Requests emitted after a range's bytes.
    pub const TRAILING: SpecialActions = SpecialActions::APPEND_SEMICOLON.union(SpecialActions::CLOSE_BRACE);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    For,
    While,
    DoWhile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpKind {
    Break,
    Continue,
}

impl JumpKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "break" => Some(JumpKind::Break),
            "continue" => Some(JumpKind::Continue),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            JumpKind::Break => "break",
            JumpKind::Continue => "continue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostfixOp {
    Call,
    Index,
    Member { field: NameId, arrow: bool },
    Increment { decrement: bool },
}

#[derive(Debug, Clone)]
pub struct TranslationUnitData {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScopeData {
    pub braced: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionData {
    pub name: NameId,
    pub return_type: String,
    /// Parameter declarations. Owned here, not listed among the children.
    pub params: ThinVec<NodeRef>,
    pub braced: bool,
}

#[derive(Debug, Clone)]
pub struct LoopData {
    pub kind: LoopKind,
    pub iterator_init: Option<NodeRef>,
    pub iterator_cond: Option<NodeRef>,
    pub iterator_change: Option<NodeRef>,
    pub group: Option<NodeRef>,
    pub braced: bool,
}

#[derive(Debug, Clone)]
pub struct IfData {
    pub group: Option<NodeRef>,
    pub braced: bool,
}

#[derive(Debug, Clone)]
pub struct SwitchData {
    pub group: Option<NodeRef>,
    pub braced: bool,
}

#[derive(Debug, Clone)]
pub struct CaseLabelData {
    pub case_label: String,
    pub is_fallthrough: bool,
}

#[derive(Debug, Clone)]
pub struct DeclarationData {
    pub lhs_type: String,
    pub lhs_identifier: NameId,
    pub is_reference: bool,
}

#[derive(Debug, Clone)]
pub struct PostfixData {
    pub op: PostfixOp,
    pub base: NodeRef,
}

#[derive(Debug, Clone)]
pub struct BinaryOpData {
    pub op: String,
    pub lhs: NodeRef,
    pub rhs: NodeRef,
}

#[derive(Debug, Clone)]
pub struct UnaryOpData {
    pub op: String,
    /// `None` while the operator still waits for its operand.
    pub operand: Option<NodeRef>,
}

/// The closed set of node kinds.
#[derive(Debug, Clone)]
pub enum NodeKind {
    TranslationUnit(TranslationUnitData),
    Scope(ScopeData),
    Function(FunctionData),
    Loop(LoopData),
    If(IfData),
    SwitchCase(SwitchData),
    SwitchCaseLabel(CaseLabelData),
    Return(Option<NodeRef>),
    JumpStatement(JumpKind),
    Declaration(DeclarationData),
    PostfixExpression(PostfixData),
    EmptyStatement,
    BinaryOp(BinaryOpData),
    Identifier(NameId),
    Constant(String),
    UnaryOp(UnaryOpData),
    InitializerList,
    Group,
    Defer,
}

/// Fieldless mirror of [`NodeKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    TranslationUnit,
    Scope,
    Function,
    Loop,
    If,
    SwitchCase,
    SwitchCaseLabel,
    Return,
    JumpStatement,
    Declaration,
    PostfixExpression,
    EmptyStatement,
    BinaryOp,
    Identifier,
    Constant,
    UnaryOp,
    InitializerList,
    Group,
    Defer,
}

impl NodeTag {
    pub fn label(self) -> &'static str {
        match self {
            NodeTag::TranslationUnit => "TranslationUnit",
            NodeTag::Scope => "Scope",
            NodeTag::Function => "Function",
            NodeTag::Loop => "Loop",
            NodeTag::If => "If",
            NodeTag::SwitchCase => "SwitchCase",
            NodeTag::SwitchCaseLabel => "SwitchCaseLabel",
            NodeTag::Return => "Return",
            NodeTag::JumpStatement => "JumpStatement",
            NodeTag::Declaration => "Declaration",
            NodeTag::PostfixExpression => "PostfixExpression",
            NodeTag::EmptyStatement => "EmptyStatement",
            NodeTag::BinaryOp => "BinaryOp",
            NodeTag::Identifier => "Identifier",
            NodeTag::Constant => "Constant",
            NodeTag::UnaryOp => "UnaryOp",
            NodeTag::InitializerList => "InitializerList",
            NodeTag::Group => "Group",
            NodeTag::Defer => "Defer",
        }
    }

    /// Kinds that own a statement list.
    pub fn is_scope_kind(self) -> bool {
        matches!(
            self,
            NodeTag::Scope
                | NodeTag::Function
                | NodeTag::Loop
                | NodeTag::If
                | NodeTag::SwitchCase
                | NodeTag::SwitchCaseLabel
        )
    }
}

impl fmt::Display for NodeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl NodeKind {
    pub fn tag(&self) -> NodeTag {
        match self {
            NodeKind::TranslationUnit(_) => NodeTag::TranslationUnit,
            NodeKind::Scope(_) => NodeTag::Scope,
            NodeKind::Function(_) => NodeTag::Function,
            NodeKind::Loop(_) => NodeTag::Loop,
            NodeKind::If(_) => NodeTag::If,
            NodeKind::SwitchCase(_) => NodeTag::SwitchCase,
            NodeKind::SwitchCaseLabel(_) => NodeTag::SwitchCaseLabel,
            NodeKind::Return(_) => NodeTag::Return,
            NodeKind::JumpStatement(_) => NodeTag::JumpStatement,
            NodeKind::Declaration(_) => NodeTag::Declaration,
            NodeKind::PostfixExpression(_) => NodeTag::PostfixExpression,
            NodeKind::EmptyStatement => NodeTag::EmptyStatement,
            NodeKind::BinaryOp(_) => NodeTag::BinaryOp,
            NodeKind::Identifier(_) => NodeTag::Identifier,
            NodeKind::Constant(_) => NodeTag::Constant,
            NodeKind::UnaryOp(_) => NodeTag::UnaryOp,
            NodeKind::InitializerList => NodeTag::InitializerList,
            NodeKind::Group => NodeTag::Group,
            NodeKind::Defer => NodeTag::Defer,
        }
    }

    /// Whether the statement list is delimited by braces in the source.
    /// Kinds without a statement list report `true`.
    pub fn braced(&self) -> bool {
        match self {
            NodeKind::Scope(data) => data.braced,
            NodeKind::Function(data) => data.braced,
            NodeKind::Loop(data) => data.braced,
            NodeKind::If(data) => data.braced,
            NodeKind::SwitchCase(data) => data.braced,
            _ => true,
        }
    }

    pub fn set_braced(&mut self, braced: bool) {
        match self {
            NodeKind::Scope(data) => data.braced = braced,
            NodeKind::Function(data) => data.braced = braced,
            NodeKind::Loop(data) => data.braced = braced,
            NodeKind::If(data) => data.braced = braced,
            NodeKind::SwitchCase(data) => data.braced = braced,
            _ => {}
        }
    }

    pub fn is_jump(&self, kind: JumpKind) -> bool {
        matches!(self, NodeKind::JumpStatement(k) if *k == kind)
    }

    /// Rewrite every alias handle held in the payload.
    pub(crate) fn remap_refs(&mut self, mut f: impl FnMut(NodeRef) -> NodeRef) {
        fn remap_opt(slot: &mut Option<NodeRef>, f: &mut impl FnMut(NodeRef) -> NodeRef) {
            if let Some(r) = slot {
                *r = f(*r);
            }
        }
        match self {
            NodeKind::Loop(data) => {
                remap_opt(&mut data.iterator_init, &mut f);
                remap_opt(&mut data.iterator_cond, &mut f);
                remap_opt(&mut data.iterator_change, &mut f);
                remap_opt(&mut data.group, &mut f);
            }
            NodeKind::If(data) => remap_opt(&mut data.group, &mut f),
            NodeKind::SwitchCase(data) => remap_opt(&mut data.group, &mut f),
            NodeKind::Return(value) => remap_opt(value, &mut f),
            NodeKind::PostfixExpression(data) => data.base = f(data.base),
            NodeKind::BinaryOp(data) => {
                data.lhs = f(data.lhs);
                data.rhs = f(data.rhs);
            }
            NodeKind::UnaryOp(data) => remap_opt(&mut data.operand, &mut f),
            NodeKind::TranslationUnit(_)
            | NodeKind::Scope(_)
            | NodeKind::Function(_)
            | NodeKind::SwitchCaseLabel(_)
            | NodeKind::JumpStatement(_)
            | NodeKind::Declaration(_)
            | NodeKind::EmptyStatement
            | NodeKind::Identifier(_)
            | NodeKind::Constant(_)
            | NodeKind::InitializerList
            | NodeKind::Group
            | NodeKind::Defer => {}
        }
    }
}
