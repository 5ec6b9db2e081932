//! Event-driven AST builder.
//!
//! Reduction events arrive bottom-up and flat. Operands are built first and
//! parked on the staged list; the event that completes a construct pops them
//! back off and attaches them. Scope-like constructs sit on a scope stack and
//! receive every statement staged while they are innermost.
//!
//! Spans of statements and scopes tile the source: each starts where the
//! previous construct ended (`prev_reduce_pos`). Expression spans are tight.

use std::mem;
use std::path::PathBuf;

use log::{debug, trace, warn};

use crate::ast::{
    Ast, BinaryOpData, CaseLabelData, DeclarationData, FunctionData, IfData, JumpKind, LoopData, LoopKind, NameId,
    NodeKind, NodeRef, NodeTag, PostfixData, PostfixOp, ScopeData, SemSpan, SwitchData, UnaryOpData,
};
use crate::diagnostic::{ProtocolError, report};
use crate::semantic::chunks::{ChunkKind, ReductionSink, SyntaxChunk, SyntaxChunkType};
use crate::semantic::folding::{ends_in_break, fold_redundant_scopes};

type Result<T> = std::result::Result<T, ProtocolError>;

/// How the next few events should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuilderMode {
    Idle,
    WaitingForStructType,
    InForLoopContext,
    WaitingForDeferredOp,
}

#[derive(Debug, Clone, Copy)]
struct ScopeFrame {
    node: NodeRef,
    /// Staged-list length when the scope opened; everything above it is ours.
    staged_base: usize,
}

#[derive(Debug, Clone, Copy)]
struct PendingDefer {
    node: NodeRef,
    staged_base: usize,
}

#[derive(Debug)]
struct BuilderState {
    modes: Vec<BuilderMode>,
    chunks: Vec<SyntaxChunk>,
    staged: Vec<NodeRef>,
    scope_stack: Vec<ScopeFrame>,
    prev_reduce_pos: u32,
    /// Staged nodes below this index belong to finished statements.
    statement_base: usize,
    pending_defers: Vec<PendingDefer>,
    pending_struct: Option<SyntaxChunk>,
    /// Base type shared by every declarator of the current declaration.
    shared_base: Option<String>,
}

impl BuilderState {
    fn new(root: NodeRef) -> Self {
        BuilderState {
            modes: Vec::new(),
            chunks: Vec::new(),
            staged: Vec::new(),
            scope_stack: vec![ScopeFrame {
                node: root,
                staged_base: 0,
            }],
            prev_reduce_pos: 0,
            statement_base: 0,
            pending_defers: Vec::new(),
            pending_struct: None,
            shared_base: None,
        }
    }

    fn mode(&self) -> BuilderMode {
        self.modes.last().copied().unwrap_or(BuilderMode::Idle)
    }

    fn has_pending_operands(&self) -> bool {
        self.staged.len() > self.statement_base
    }
}

/// Builds one [`Ast`] per translation unit from reduction events.
#[derive(Debug)]
pub struct SemanticBuilder {
    ast: Ast,
    state: BuilderState,
    failure: Option<ProtocolError>,
    /// Start of the leaf being reduced, when the producer reported it.
    leaf_start: Option<u32>,
}

impl Default for SemanticBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticBuilder {
    pub fn new() -> Self {
        let ast = Ast::default();
        let state = BuilderState::new(ast.root());
        SemanticBuilder {
            ast,
            state,
            failure: None,
            leaf_start: None,
        }
    }

    /// Discard any tree in progress and start a new one bound to `path`.
    pub fn new_translation_unit(&mut self, path: impl Into<PathBuf>) {
        self.ast = Ast::new(path);
        self.state = BuilderState::new(self.ast.root());
        self.failure = None;
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    /// Hand the finished tree over, leaving an empty one behind.
    pub fn take_ast(&mut self) -> Ast {
        let path = self.ast.source_path().to_path_buf();
        let ast = mem::replace(&mut self.ast, Ast::new(path));
        self.state = BuilderState::new(self.ast.root());
        ast
    }

    pub fn mode(&self) -> BuilderMode {
        self.state.mode()
    }

    /// Number of open scopes, the translation unit included.
    pub fn scope_depth(&self) -> usize {
        self.state.scope_stack.len()
    }

    pub fn staged_len(&self) -> usize {
        self.state.staged.len()
    }

    pub fn pending_chunks(&self) -> &[SyntaxChunk] {
        &self.state.chunks
    }

    fn dispatch(&mut self, event: SyntaxChunkType, offset: u32, literal: &str) -> Result<()> {
        use SyntaxChunkType as E;
        match event {
            E::Type => self.on_type(event, offset, literal),
            E::StructKeyword => self.on_struct_keyword(event, offset, literal),
            E::Pointer => self.push_chunk(event, ChunkKind::Pointer, offset, literal),
            E::Reference => self.push_chunk(event, ChunkKind::Reference, offset, literal),
            E::DirectDeclarator => self.on_direct_declarator(event, offset, literal),
            E::ArrayDeclarator => self.on_array_declarator(event, offset, literal),
            E::FunctionHeader => self.on_function_header(event, offset),
            E::FunctionEnd => self.close_construct(event, offset, NodeTag::Function).map(drop),
            E::ScopeStart => self.on_scope_start(offset),
            E::ScopeEnd => self.on_scope_end(event, offset),
            E::ImplicitScopeStart => {
                self.open_scope(NodeKind::Scope(ScopeData { braced: false }));
                Ok(())
            }
            E::ImplicitScopeEnd => self.on_implicit_scope_end(event, offset),
            E::IfHeader => self.on_if_header(offset),
            E::IfCondition => self.on_if_condition(event, offset),
            E::Else => {
                self.expect_top(event, offset, NodeTag::If)?;
                self.state.prev_reduce_pos = offset;
                Ok(())
            }
            E::IfEnd => self.close_construct(event, offset, NodeTag::If).map(drop),
            E::ForHeader => {
                self.open_loop(LoopKind::For, offset);
                self.state.modes.push(BuilderMode::InForLoopContext);
                Ok(())
            }
            E::ForInit | E::ForCondition | E::ForChange => self.on_for_slot(event, offset),
            E::WhileHeader => {
                self.open_loop(LoopKind::While, offset);
                Ok(())
            }
            E::WhileCondition => self.on_while_condition(event, offset),
            E::DoHeader => {
                self.open_loop(LoopKind::DoWhile, offset);
                self.state.prev_reduce_pos = offset;
                Ok(())
            }
            E::DoWhileCondition => self.on_do_while_condition(event, offset),
            E::LoopEnd => self.close_construct(event, offset, NodeTag::Loop).map(drop),
            E::SwitchHeader => self.on_switch_header(offset),
            E::SwitchCondition => self.on_switch_condition(event, offset),
            E::CaseLabel => {
                if literal.is_empty() {
                    return Err(invalid_literal(event, offset, literal));
                }
                self.open_case_label(event, offset, literal.to_string())
            }
            E::DefaultLabel => self.open_case_label(event, offset, String::from("default")),
            E::SwitchEnd => self.on_switch_end(event, offset),
            E::StatementEnd => self.on_statement_end(event, offset),
            E::EmptyStatement => self.on_empty_statement(event, offset),
            E::Return => self.on_return(event, offset),
            E::Jump => self.on_jump(event, offset, literal),
            E::DeferHeader => self.on_defer_header(event, offset),
            E::Defer => self.on_defer(event, offset),
            E::Identifier => {
                let span = self.leaf_span(event, offset, literal)?;
                let node = self.ast.push_node(NodeKind::Identifier(NameId::new(literal)), span);
                self.state.staged.push(node);
                Ok(())
            }
            E::Constant => {
                let span = self.leaf_span(event, offset, literal)?;
                let node = self.ast.push_node(NodeKind::Constant(literal.to_string()), span);
                self.state.staged.push(node);
                Ok(())
            }
            E::Assignment | E::Relational | E::BinaryOperator => self.on_binary(event, offset, literal),
            E::UnaryOperator => {
                let span = self.leaf_span(event, offset, literal)?;
                let data = UnaryOpData {
                    op: literal.to_string(),
                    operand: None,
                };
                let node = self.ast.push_node(NodeKind::UnaryOp(data), span);
                self.state.staged.push(node);
                Ok(())
            }
            E::PostfixCall => self.on_postfix_call(event, offset, literal),
            E::PostfixIndex => self.on_postfix_index(event, offset),
            E::PostfixMember => self.on_postfix_member(event, offset, literal),
            E::PostfixIncrement => self.on_postfix_increment(event, offset, literal),
            E::InitializerList => self.on_initializer_list(event, offset, literal),
            E::TranslationUnitEnd => self.on_translation_unit_end(event, offset),
        }
    }

    fn leaf_span(&mut self, event: SyntaxChunkType, offset: u32, literal: &str) -> Result<SemSpan> {
        leaf_span(self.leaf_start.take(), event, offset, literal)
    }

    // --- declarators ---

    fn on_type(&mut self, event: SyntaxChunkType, offset: u32, literal: &str) -> Result<()> {
        let span = self.leaf_span(event, offset, literal)?;
        if self.state.mode() == BuilderMode::WaitingForStructType {
            self.state.modes.pop();
            let keyword = self.state.pending_struct.take().ok_or(ProtocolError::UnexpectedEvent {
                event,
                mode: BuilderMode::WaitingForStructType,
                offset,
            })?;
            trace!("struct type `{} {}` completed", keyword.text, literal);
            self.state.chunks.push(SyntaxChunk {
                kind: ChunkKind::Type,
                start: keyword.start,
                text: format!("{} {}", keyword.text, literal),
            });
            return Ok(());
        }
        self.state.chunks.push(SyntaxChunk {
            kind: ChunkKind::Type,
            start: span.start,
            text: literal.to_string(),
        });
        Ok(())
    }

    fn on_struct_keyword(&mut self, event: SyntaxChunkType, offset: u32, literal: &str) -> Result<()> {
        let span = self.leaf_span(event, offset, literal)?;
        self.state.pending_struct = Some(SyntaxChunk {
            kind: ChunkKind::Type,
            start: span.start,
            text: literal.to_string(),
        });
        self.state.modes.push(BuilderMode::WaitingForStructType);
        Ok(())
    }

    fn push_chunk(&mut self, event: SyntaxChunkType, kind: ChunkKind, offset: u32, literal: &str) -> Result<()> {
        let span = self.leaf_span(event, offset, literal)?;
        self.state.chunks.push(SyntaxChunk {
            kind,
            start: span.start,
            text: literal.to_string(),
        });
        Ok(())
    }

    fn on_direct_declarator(&mut self, event: SyntaxChunkType, offset: u32, literal: &str) -> Result<()> {
        let name_start = self.leaf_span(event, offset, literal)?.start;
        let chunks = mem::take(&mut self.state.chunks);

        let mut start = name_start;
        let mut base = Vec::new();
        let mut pointers = 0usize;
        let mut is_reference = false;
        for chunk in &chunks {
            start = start.min(chunk.start);
            match chunk.kind {
                ChunkKind::Type => base.push(chunk.text.as_str()),
                ChunkKind::Pointer => pointers += 1,
                ChunkKind::Reference => is_reference = true,
            }
        }

        let base_type = if base.is_empty() {
            self.state.shared_base.clone().ok_or_else(|| ProtocolError::MissingType {
                name: literal.to_string(),
                offset,
            })?
        } else {
            let joined = base.join(" ");
            self.state.shared_base = Some(joined.clone());
            joined
        };

        let lhs_type = format!("{base_type}{}", "*".repeat(pointers));
        if is_reference {
            warn!("reference declarator `{literal}` @{offset} is recorded but not lowered");
        }
        debug!("declaration `{lhs_type} {literal}` @{start}");

        let data = DeclarationData {
            lhs_type,
            lhs_identifier: NameId::new(literal),
            is_reference,
        };
        let node = self.ast.push_node(NodeKind::Declaration(data), SemSpan::new(start, offset));
        self.state.staged.push(node);
        Ok(())
    }

    fn on_array_declarator(&mut self, event: SyntaxChunkType, offset: u32, literal: &str) -> Result<()> {
        let top = self.staged_top().ok_or(ProtocolError::MissingDeclarator { event, offset })?;
        let slot = self.ast.get_mut(top);
        let NodeKind::Declaration(decl) = &mut slot.kind else {
            return Err(ProtocolError::MissingDeclarator { event, offset });
        };
        decl.lhs_type.push_str(literal);
        slot.span.end = offset;
        Ok(())
    }

    fn on_function_header(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        let base = self.state.statement_base;
        if self.state.staged.len() <= base {
            return Err(ProtocolError::MissingDeclarator { event, offset });
        }
        let declarators: Vec<NodeRef> = self.state.staged.drain(base..).collect();
        if declarators.iter().any(|&d| self.ast.tag(d) != NodeTag::Declaration) {
            return Err(ProtocolError::MissingDeclarator { event, offset });
        }
        let (&head, params) = declarators
            .split_first()
            .ok_or(ProtocolError::MissingDeclarator { event, offset })?;
        let NodeKind::Declaration(decl) = self.ast.kind(head) else {
            return Err(ProtocolError::MissingDeclarator { event, offset });
        };
        let name = decl.lhs_identifier;
        let return_type = decl.lhs_type.clone();

        self.state.chunks.clear();
        self.state.shared_base = None;

        let data = FunctionData {
            name,
            return_type,
            params: params.iter().copied().collect(),
            braced: true,
        };
        let function = self.open_scope(NodeKind::Function(data));
        for &param in params {
            self.ast.get_mut(param).parent = Some(function);
        }
        self.state.prev_reduce_pos = offset;
        report("Function", offset, &format!("open `{name}` with {} parameter(s)", params.len()));
        Ok(())
    }

    // --- scopes ---

    fn open_scope(&mut self, kind: NodeKind) -> NodeRef {
        let start = self.state.prev_reduce_pos;
        let node = self.ast.push_node(kind, SemSpan::new(start, start));
        let staged_base = self.state.staged.len();
        self.state.scope_stack.push(ScopeFrame { node, staged_base });
        self.state.statement_base = staged_base;
        trace!("open {} @{start}", self.ast.tag(node));
        node
    }

    fn top_tag(&self) -> Option<NodeTag> {
        self.state.scope_stack.last().map(|frame| self.ast.tag(frame.node))
    }

    fn expect_top(&self, event: SyntaxChunkType, offset: u32, tag: NodeTag) -> Result<NodeRef> {
        let frame = self
            .state
            .scope_stack
            .last()
            .ok_or(ProtocolError::EmptyScopeStack { event, offset })?;
        let open = self.ast.tag(frame.node);
        if open != tag {
            return Err(ProtocolError::UnbalancedScope {
                event,
                open: open.label(),
                offset,
            });
        }
        Ok(frame.node)
    }

    /// Close the innermost scope at `end`, flushing its staged statements into it.
    fn remove_scope(&mut self, event: SyntaxChunkType, end: u32) -> Result<NodeRef> {
        if self.state.has_pending_operands() {
            return Err(ProtocolError::UnexpectedEvent {
                event,
                mode: self.state.mode(),
                offset: end,
            });
        }
        if self.state.scope_stack.len() <= 1 {
            return Err(ProtocolError::EmptyScopeStack { event, offset: end });
        }
        let frame = self
            .state
            .scope_stack
            .pop()
            .ok_or(ProtocolError::EmptyScopeStack { event, offset: end })?;

        let statements: Vec<NodeRef> = self.state.staged.drain(frame.staged_base..).collect();
        for statement in statements {
            self.ast.attach(frame.node, statement);
        }
        let start = self.ast.span(frame.node).start;
        self.ast.set_span(frame.node, SemSpan::new(start, end));
        self.state.prev_reduce_pos = end;
        self.state.statement_base = self.state.staged.len();
        trace!("close {} [{start}..{end})", self.ast.tag(frame.node));
        Ok(frame.node)
    }

    fn stage_statement(&mut self, node: NodeRef) {
        self.state.staged.push(node);
        self.state.statement_base = self.state.staged.len();
    }

    /// Close an `If`/`Loop`/`SwitchCase`/`Function`, fold its redundant body
    /// and stage it as a statement of the enclosing scope.
    fn close_construct(&mut self, event: SyntaxChunkType, offset: u32, tag: NodeTag) -> Result<NodeRef> {
        self.expect_top(event, offset, tag)?;
        if tag == NodeTag::Loop && self.state.mode() == BuilderMode::InForLoopContext {
            return Err(ProtocolError::UnexpectedEvent {
                event,
                mode: BuilderMode::InForLoopContext,
                offset,
            });
        }
        let node = self.remove_scope(event, offset)?;
        let folded = fold_redundant_scopes(&mut self.ast, node);
        if folded > 0 {
            debug!("folded {folded} redundant scope(s) into {tag} @{offset}");
        }
        self.stage_statement(node);
        report(tag.label(), offset, "close");
        Ok(node)
    }

    fn on_scope_start(&mut self, offset: u32) -> Result<()> {
        self.open_scope(NodeKind::Scope(ScopeData { braced: true }));
        self.state.prev_reduce_pos = offset;
        report("Scope", offset, "open");
        Ok(())
    }

    fn on_scope_end(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        if self.top_tag() == Some(NodeTag::SwitchCaseLabel) {
            self.close_case_label(event)?;
        }
        let node = self.expect_top(event, offset, NodeTag::Scope)?;
        if !self.ast.kind(node).braced() {
            return Err(ProtocolError::UnbalancedScope {
                event,
                open: "implicit Scope",
                offset,
            });
        }
        let node = self.remove_scope(event, offset)?;
        self.stage_statement(node);
        report("Scope", offset, "close");
        Ok(())
    }

    fn on_implicit_scope_end(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        let node = self.expect_top(event, offset, NodeTag::Scope)?;
        if self.ast.kind(node).braced() {
            return Err(ProtocolError::UnbalancedScope {
                event,
                open: "braced Scope",
                offset,
            });
        }
        let node = self.remove_scope(event, offset)?;
        self.stage_statement(node);
        Ok(())
    }

    // --- selection and iteration ---

    fn attach_group(&mut self, owner: NodeRef) -> NodeRef {
        let group = self.ast.push_node(NodeKind::Group, SemSpan::NONE);
        self.ast.attach(owner, group);
        group
    }

    fn group_of(&self, node: NodeRef) -> Option<NodeRef> {
        match self.ast.kind(node) {
            NodeKind::If(data) => data.group,
            NodeKind::Loop(data) => data.group,
            NodeKind::SwitchCase(data) => data.group,
            _ => None,
        }
    }

    /// Move a header expression into `group` and widen the group's span.
    fn attach_to_group(&mut self, group: NodeRef, expr: NodeRef) {
        self.ast.attach(group, expr);
        let span = self.ast.span(group).merge(self.ast.span(expr));
        self.ast.set_span(group, span);
    }

    fn on_if_header(&mut self, offset: u32) -> Result<()> {
        let node = self.open_scope(NodeKind::If(IfData {
            group: None,
            braced: true,
        }));
        let group = self.attach_group(node);
        if let NodeKind::If(data) = &mut self.ast.get_mut(node).kind {
            data.group = Some(group);
        }
        report("If", offset, "open");
        Ok(())
    }

    fn on_if_condition(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        let node = self.expect_top(event, offset, NodeTag::If)?;
        let cond = self.pop_single(event, offset)?;
        let group = self
            .group_of(node)
            .ok_or(ProtocolError::UnexpectedEvent {
                event,
                mode: self.state.mode(),
                offset,
            })?;
        self.attach_to_group(group, cond);
        self.state.prev_reduce_pos = offset;
        Ok(())
    }

    fn open_loop(&mut self, kind: LoopKind, offset: u32) -> NodeRef {
        let node = self.open_scope(NodeKind::Loop(LoopData {
            kind,
            iterator_init: None,
            iterator_cond: None,
            iterator_change: None,
            group: None,
            braced: true,
        }));
        // do-while gets its group once the trailing condition arrives
        if kind != LoopKind::DoWhile {
            let group = self.attach_group(node);
            if let NodeKind::Loop(data) = &mut self.ast.get_mut(node).kind {
                data.group = Some(group);
            }
        }
        report("Loop", offset, "open");
        node
    }

    fn on_for_slot(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        if self.state.mode() != BuilderMode::InForLoopContext {
            return Err(ProtocolError::UnexpectedEvent {
                event,
                mode: self.state.mode(),
                offset,
            });
        }
        let node = self.expect_top(event, offset, NodeTag::Loop)?;
        let group = self.group_of(node).ok_or(ProtocolError::UnexpectedEvent {
            event,
            mode: self.state.mode(),
            offset,
        })?;

        let nodes = self.fold_statement_nodes(event, offset)?;
        for &expr in &nodes {
            self.attach_to_group(group, expr);
        }
        let slot = nodes.first().copied();
        if let NodeKind::Loop(data) = &mut self.ast.get_mut(node).kind {
            match event {
                SyntaxChunkType::ForInit => data.iterator_init = slot,
                SyntaxChunkType::ForCondition => data.iterator_cond = slot,
                _ => data.iterator_change = slot,
            }
        }
        self.state.chunks.clear();
        self.state.shared_base = None;
        self.state.statement_base = self.state.staged.len();

        if event == SyntaxChunkType::ForChange {
            self.state.modes.pop();
            self.state.prev_reduce_pos = offset;
        }
        Ok(())
    }

    fn on_while_condition(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        let node = self.expect_top(event, offset, NodeTag::Loop)?;
        let cond = self.pop_single(event, offset)?;
        let group = self.group_of(node).ok_or(ProtocolError::UnexpectedEvent {
            event,
            mode: self.state.mode(),
            offset,
        })?;
        self.attach_to_group(group, cond);
        if let NodeKind::Loop(data) = &mut self.ast.get_mut(node).kind {
            data.iterator_cond = Some(cond);
        }
        self.state.prev_reduce_pos = offset;
        Ok(())
    }

    fn on_do_while_condition(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        let node = self.expect_top(event, offset, NodeTag::Loop)?;
        let cond = self.pop_single(event, offset)?;
        let group = self.ast.push_node(NodeKind::Group, SemSpan::NONE);
        self.attach_to_group(group, cond);
        if let NodeKind::Loop(data) = &mut self.ast.get_mut(node).kind {
            data.iterator_cond = Some(cond);
            data.group = Some(group);
        }
        // staged after the body, so the group lands behind it on close
        self.stage_statement(group);
        self.state.prev_reduce_pos = offset;
        Ok(())
    }

    fn on_switch_header(&mut self, offset: u32) -> Result<()> {
        let node = self.open_scope(NodeKind::SwitchCase(SwitchData {
            group: None,
            braced: true,
        }));
        let group = self.attach_group(node);
        if let NodeKind::SwitchCase(data) = &mut self.ast.get_mut(node).kind {
            data.group = Some(group);
        }
        report("SwitchCase", offset, "open");
        Ok(())
    }

    fn on_switch_condition(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        let node = self.expect_top(event, offset, NodeTag::SwitchCase)?;
        let cond = self.pop_single(event, offset)?;
        let group = self.group_of(node).ok_or(ProtocolError::UnexpectedEvent {
            event,
            mode: self.state.mode(),
            offset,
        })?;
        self.attach_to_group(group, cond);
        self.state.prev_reduce_pos = offset;
        Ok(())
    }

    fn open_case_label(&mut self, event: SyntaxChunkType, offset: u32, case_label: String) -> Result<()> {
        if self.top_tag() == Some(NodeTag::SwitchCaseLabel) {
            let previous = self.close_case_label(event)?;
            let fallthrough = !ends_in_break(&self.ast, previous);
            if let NodeKind::SwitchCaseLabel(data) = &mut self.ast.get_mut(previous).kind {
                data.is_fallthrough = fallthrough;
                if fallthrough {
                    debug!("case `{}` falls through", data.case_label);
                }
            }
        }
        let note = format!("label `{case_label}`");
        self.open_scope(NodeKind::SwitchCaseLabel(CaseLabelData {
            case_label,
            is_fallthrough: false,
        }));
        self.state.prev_reduce_pos = offset;
        report("SwitchCaseLabel", offset, &note);
        Ok(())
    }

    /// A label's statement list ends with its last statement.
    fn close_case_label(&mut self, event: SyntaxChunkType) -> Result<NodeRef> {
        let end = self.state.prev_reduce_pos;
        let node = self.remove_scope(event, end)?;
        self.stage_statement(node);
        Ok(node)
    }

    fn on_switch_end(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        if self.top_tag() == Some(NodeTag::SwitchCaseLabel) {
            self.close_case_label(event)?;
        }
        self.close_construct(event, offset, NodeTag::SwitchCase)?;
        Ok(())
    }

    // --- statements ---

    fn on_statement_end(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        let nodes = self.fold_statement_nodes(event, offset)?;
        if nodes.is_empty() {
            return Err(ProtocolError::MissingOperand { event, offset });
        }

        let mut cursor = self.state.prev_reduce_pos;
        let last = nodes.len() - 1;
        for (i, &node) in nodes.iter().enumerate() {
            let span = self.ast.span(node);
            let end = if i == last { offset } else { span.end.max(cursor) };
            self.ast.set_span(node, SemSpan::new(cursor, end));
            cursor = end;
            self.state.staged.push(node);
        }

        self.state.prev_reduce_pos = offset;
        self.state.statement_base = self.state.staged.len();
        self.state.shared_base = None;
        self.state.chunks.clear();
        Ok(())
    }

    fn on_empty_statement(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        if self.state.has_pending_operands() {
            return Err(ProtocolError::UnexpectedEvent {
                event,
                mode: self.state.mode(),
                offset,
            });
        }
        let span = SemSpan::new(self.state.prev_reduce_pos, offset);
        let node = self.ast.push_node(NodeKind::EmptyStatement, span);
        self.stage_statement(node);
        self.state.prev_reduce_pos = offset;
        Ok(())
    }

    fn on_return(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        let value = if self.state.has_pending_operands() {
            Some(self.pop_single(event, offset)?)
        } else {
            None
        };
        let span = SemSpan::new(self.state.prev_reduce_pos, offset);
        let node = self.ast.push_node(NodeKind::Return(value), span);
        if let Some(value) = value {
            self.ast.attach(node, value);
        }
        self.stage_statement(node);
        self.state.prev_reduce_pos = offset;
        report("Return", offset, if value.is_some() { "with value" } else { "bare" });
        Ok(())
    }

    fn on_jump(&mut self, event: SyntaxChunkType, offset: u32, literal: &str) -> Result<()> {
        let kind = JumpKind::from_keyword(literal).ok_or_else(|| invalid_literal(event, offset, literal))?;
        if self.state.has_pending_operands() {
            return Err(ProtocolError::UnexpectedEvent {
                event,
                mode: self.state.mode(),
                offset,
            });
        }
        let span = SemSpan::new(self.state.prev_reduce_pos, offset);
        let node = self.ast.push_node(NodeKind::JumpStatement(kind), span);
        self.stage_statement(node);
        self.state.prev_reduce_pos = offset;
        report("JumpStatement", offset, kind.keyword());
        Ok(())
    }

    fn on_defer_header(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        if self.state.has_pending_operands() {
            return Err(ProtocolError::UnexpectedEvent {
                event,
                mode: self.state.mode(),
                offset,
            });
        }
        let start = self.state.prev_reduce_pos;
        let node = self.ast.push_node(NodeKind::Defer, SemSpan::new(start, start));
        self.state.pending_defers.push(PendingDefer {
            node,
            staged_base: self.state.staged.len(),
        });
        self.state.modes.push(BuilderMode::WaitingForDeferredOp);
        // a block operand must not swallow the keyword
        self.state.prev_reduce_pos = offset;
        Ok(())
    }

    fn on_defer(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        if self.state.mode() != BuilderMode::WaitingForDeferredOp {
            return Err(ProtocolError::UnexpectedEvent {
                event,
                mode: self.state.mode(),
                offset,
            });
        }
        let pending = self.state.pending_defers.pop().ok_or(ProtocolError::UnexpectedEvent {
            event,
            mode: BuilderMode::WaitingForDeferredOp,
            offset,
        })?;
        self.state.modes.pop();

        // a block operand was staged as a statement; reopen it as an operand
        self.state.statement_base = pending.staged_base;
        let op = self.pop_single(event, offset)?;

        self.ast.attach(pending.node, op);
        let start = self.ast.span(pending.node).start;
        self.ast.set_span(pending.node, SemSpan::new(start, offset));
        self.stage_statement(pending.node);
        self.state.prev_reduce_pos = offset;
        report("Defer", offset, "deferred operation recorded");
        Ok(())
    }

    // --- expressions ---

    fn staged_top(&self) -> Option<NodeRef> {
        if self.state.has_pending_operands() {
            self.state.staged.last().copied()
        } else {
            None
        }
    }

    fn is_pending_unary(&self, node: NodeRef) -> bool {
        matches!(self.ast.kind(node), NodeKind::UnaryOp(UnaryOpData { operand: None, .. }))
    }

    /// Pop the top operand as is. Postfix bases go through here.
    fn pop_raw(&mut self, event: SyntaxChunkType, offset: u32) -> Result<NodeRef> {
        if !self.state.has_pending_operands() {
            return Err(ProtocolError::MissingOperand { event, offset });
        }
        let node = self
            .state
            .staged
            .pop()
            .ok_or(ProtocolError::MissingOperand { event, offset })?;
        if let NodeKind::UnaryOp(UnaryOpData { op, operand: None }) = self.ast.kind(node) {
            return Err(ProtocolError::DanglingUnaryOperator { op: op.clone(), offset });
        }
        Ok(node)
    }

    /// Pop the top operand and fold any prefix operators waiting below it.
    fn pop_operand(&mut self, event: SyntaxChunkType, offset: u32) -> Result<NodeRef> {
        let mut operand = self.pop_raw(event, offset)?;
        while let Some(top) = self.staged_top() {
            if !self.is_pending_unary(top) {
                break;
            }
            self.state.staged.pop();
            self.ast.attach(top, operand);
            if let NodeKind::UnaryOp(data) = &mut self.ast.get_mut(top).kind {
                data.operand = Some(operand);
            }
            let span = self.ast.span(top).merge(self.ast.span(operand));
            self.ast.set_span(top, span);
            operand = top;
        }
        Ok(operand)
    }

    /// Pop exactly one operand; anything left over is a protocol violation.
    fn pop_single(&mut self, event: SyntaxChunkType, offset: u32) -> Result<NodeRef> {
        let node = self.pop_operand(event, offset)?;
        if self.state.has_pending_operands() {
            return Err(ProtocolError::UnexpectedEvent {
                event,
                mode: self.state.mode(),
                offset,
            });
        }
        Ok(node)
    }

    /// Pop every operand of the current statement, in source order.
    fn fold_statement_nodes(&mut self, event: SyntaxChunkType, offset: u32) -> Result<Vec<NodeRef>> {
        let mut nodes = Vec::new();
        while self.state.has_pending_operands() {
            nodes.push(self.pop_operand(event, offset)?);
        }
        nodes.reverse();
        Ok(nodes)
    }

    fn pop_operands(&mut self, event: SyntaxChunkType, offset: u32, count: usize) -> Result<Vec<NodeRef>> {
        let mut operands = Vec::with_capacity(count);
        for _ in 0..count {
            operands.push(self.pop_operand(event, offset)?);
        }
        operands.reverse();
        Ok(operands)
    }

    fn on_binary(&mut self, event: SyntaxChunkType, offset: u32, op: &str) -> Result<()> {
        if op.is_empty() {
            return Err(invalid_literal(event, offset, op));
        }
        let rhs = self.pop_operand(event, offset)?;
        let lhs = self.pop_operand(event, offset)?;
        let span = self.ast.span(lhs).merge(self.ast.span(rhs));
        let data = BinaryOpData {
            op: op.to_string(),
            lhs,
            rhs,
        };
        let node = self.ast.push_node(NodeKind::BinaryOp(data), span);
        self.ast.attach(node, lhs);
        self.ast.attach(node, rhs);
        self.state.staged.push(node);
        Ok(())
    }

    fn push_postfix(&mut self, op: PostfixOp, base: NodeRef, operands: &[NodeRef], offset: u32) {
        let start = self.ast.span(base).start;
        let node = self.ast.push_node(
            NodeKind::PostfixExpression(PostfixData { op, base }),
            SemSpan::new(start, offset),
        );
        self.ast.attach(node, base);
        for &operand in operands {
            self.ast.attach(node, operand);
        }
        self.state.staged.push(node);
    }

    fn on_postfix_call(&mut self, event: SyntaxChunkType, offset: u32, literal: &str) -> Result<()> {
        let count = parse_count(event, offset, literal)?;
        let args = self.pop_operands(event, offset, count)?;
        let base = self.pop_raw(event, offset)?;
        self.push_postfix(PostfixOp::Call, base, &args, offset);
        Ok(())
    }

    fn on_postfix_index(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        let index = self.pop_operand(event, offset)?;
        let base = self.pop_raw(event, offset)?;
        self.push_postfix(PostfixOp::Index, base, &[index], offset);
        Ok(())
    }

    fn on_postfix_member(&mut self, event: SyntaxChunkType, offset: u32, literal: &str) -> Result<()> {
        let (arrow, field) = if let Some(field) = literal.strip_prefix("->") {
            (true, field)
        } else if let Some(field) = literal.strip_prefix('.') {
            (false, field)
        } else {
            return Err(invalid_literal(event, offset, literal));
        };
        if field.is_empty() {
            return Err(invalid_literal(event, offset, literal));
        }
        let base = self.pop_raw(event, offset)?;
        let op = PostfixOp::Member {
            field: NameId::new(field),
            arrow,
        };
        self.push_postfix(op, base, &[], offset);
        Ok(())
    }

    fn on_postfix_increment(&mut self, event: SyntaxChunkType, offset: u32, literal: &str) -> Result<()> {
        let decrement = match literal {
            "++" => false,
            "--" => true,
            _ => return Err(invalid_literal(event, offset, literal)),
        };
        let base = self.pop_raw(event, offset)?;
        self.push_postfix(PostfixOp::Increment { decrement }, base, &[], offset);
        Ok(())
    }

    fn on_initializer_list(&mut self, event: SyntaxChunkType, offset: u32, literal: &str) -> Result<()> {
        let count = parse_count(event, offset, literal)?;
        let elements = self.pop_operands(event, offset, count)?;
        let start = elements.first().map_or(offset, |&first| self.ast.span(first).start);
        let node = self.ast.push_node(NodeKind::InitializerList, SemSpan::new(start, offset));
        for element in elements {
            self.ast.attach(node, element);
        }
        self.state.staged.push(node);
        Ok(())
    }

    fn on_translation_unit_end(&mut self, event: SyntaxChunkType, offset: u32) -> Result<()> {
        if self.state.scope_stack.len() != 1 {
            let open = self.top_tag().map_or("TranslationUnit", NodeTag::label);
            return Err(ProtocolError::UnbalancedScope { event, open, offset });
        }
        if self.state.has_pending_operands() || !self.state.modes.is_empty() {
            return Err(ProtocolError::UnexpectedEvent {
                event,
                mode: self.state.mode(),
                offset,
            });
        }
        let root = self.ast.root();
        let items: Vec<NodeRef> = self.state.staged.drain(..).collect();
        for item in items {
            self.ast.attach(root, item);
        }
        self.ast.set_span(root, SemSpan::new(0, offset));
        self.state.prev_reduce_pos = offset;
        self.state.statement_base = 0;
        report("TranslationUnit", offset, "complete");
        Ok(())
    }
}

impl ReductionSink for SemanticBuilder {
    fn handle(&mut self, kind: SyntaxChunkType, offset: u32, literal: &str) -> Result<()> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        trace!(
            "{kind} @{offset} {literal:?} [{:?}, {} staged, {} open]",
            self.state.mode(),
            self.state.staged.len(),
            self.state.scope_stack.len()
        );
        let result = self.dispatch(kind, offset, literal);
        if let Err(err) = &result {
            debug!("event stream rejected: {err}");
            self.failure = Some(err.clone());
        }
        result
    }

    fn handle_leaf(&mut self, kind: SyntaxChunkType, start: u32, end: u32, literal: &str) -> Result<()> {
        self.leaf_start = Some(start);
        let result = self.handle(kind, end, literal);
        self.leaf_start = None;
        result
    }
}

fn invalid_literal(event: SyntaxChunkType, offset: u32, literal: &str) -> ProtocolError {
    ProtocolError::InvalidLiteral {
        event,
        literal: literal.to_string(),
        offset,
    }
}

/// Span of a leaf ending at `offset`. Without a reported start, the literal
/// is its exact source text.
fn leaf_span(start: Option<u32>, event: SyntaxChunkType, offset: u32, literal: &str) -> Result<SemSpan> {
    if literal.is_empty() {
        return Err(invalid_literal(event, offset, literal));
    }
    let start = match start {
        Some(start) if start < offset => start,
        Some(_) => return Err(invalid_literal(event, offset, literal)),
        None => offset
            .checked_sub(literal.len() as u32)
            .ok_or_else(|| invalid_literal(event, offset, literal))?,
    };
    Ok(SemSpan::new(start, offset))
}

fn parse_count(event: SyntaxChunkType, offset: u32, literal: &str) -> Result<usize> {
    literal.parse().map_err(|_| invalid_literal(event, offset, literal))
}
