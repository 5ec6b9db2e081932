//! Defer resolution.
//!
//! A pre-order walk tracks the open scopes and the armed `defer` statements.
//! Every exit from a scope fires the defers armed in it, most recent first:
//!
//! - falling off the end of a scope appends the deferred operations as the
//!   scope's last statements;
//! - `return`, `break` and `continue` insert them right before the jump,
//!   collecting from every scope the jump leaves.
//!
//! A `return` whose value is not a constant first stores the value in
//! [`RETURN_TEMP`], so the deferred operations run after it is computed:
//! `return read(fp);` becomes `{ T RETURN_TEMP = read(fp); ...; return
//! RETURN_TEMP; }`.
//!
//! A fired operation is a fresh copy of the deferred expression or block,
//! marked `Added`; the `defer` statement itself is marked `Removed`. The walk
//! only records edits, which are applied once it has finished.

use log::{debug, warn};

use crate::ast::visitor::{Strategy, Visit, walk};
use crate::ast::{Ast, Dirty, JumpKind, NameId, NodeKind, NodeRef, NodeTag, SpecialActions};
use crate::diagnostic::report;

/// Name of the temporary holding a return value while defers run.
pub const RETURN_TEMP: &str = "__defer_ret";

/// Storage-class and function specifiers that do not belong to a value type.
const NON_TYPE_WORDS: &[&str] = &["static", "extern", "inline", "register", "auto", "_Noreturn", "_Thread_local"];

/// Why a scope was left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Control reached the end of the scope.
    ScopeEnd,
    Return,
    Break,
    Continue,
}

impl ExitKind {
    /// Whether leaving through this exit stops at a scope of kind `tag`.
    fn stops_at(self, tag: NodeTag) -> bool {
        match self {
            ExitKind::ScopeEnd => true,
            ExitKind::Return => tag == NodeTag::Function,
            ExitKind::Break => matches!(tag, NodeTag::Loop | NodeTag::SwitchCaseLabel),
            ExitKind::Continue => tag == NodeTag::Loop,
        }
    }
}

/// One firing of one deferred operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireRecord {
    /// The `defer` statement that fired.
    pub defer: NodeRef,
    /// The scope that armed it.
    pub scope: NodeRef,
    pub exit: ExitKind,
}

#[derive(Debug, Clone, Copy)]
struct OpenScope {
    node: NodeRef,
    depth: u32,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    /// Depth of the `defer` statement itself, one below its scope.
    depth: u32,
    defer: NodeRef,
}

#[derive(Debug, Clone, Copy)]
enum Edit {
    Remove { defer: NodeRef },
    Append { scope: NodeRef, op: NodeRef },
    InsertBefore { anchor: NodeRef, op: NodeRef, open_brace: bool },
    BindReturn { ret: NodeRef, value: NodeRef, ty: NameId },
    CloseBrace { anchor: NodeRef },
}

/// Totals of one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeferSummary {
    pub armed: usize,
    pub fired: usize,
}

/// The defer resolution strategy.
#[derive(Debug, Default)]
pub struct DeferResolver {
    open_scopes: Vec<OpenScope>,
    armed: Vec<Armed>,
    edits: Vec<Edit>,
    fired: Vec<FireRecord>,
    armed_total: usize,
}

impl DeferResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every firing recorded so far, in firing order.
    pub fn fired(&self) -> &[FireRecord] {
        &self.fired
    }

    fn open(&mut self, node: NodeRef, depth: u32) {
        self.open_scopes.push(OpenScope { node, depth });
    }

    /// Leave every open scope at `depth` or deeper.
    fn close_scopes_from(&mut self, ast: &Ast, depth: u32) {
        while let Some(&top) = self.open_scopes.last() {
            if top.depth < depth {
                break;
            }
            self.open_scopes.pop();
            self.exit_naturally(ast, top);
        }
    }

    /// Armed entries owned by `scope`, most recent first.
    fn owned_by(&self, scope: OpenScope) -> impl Iterator<Item = Armed> + '_ {
        self.armed.iter().rev().filter(move |a| a.depth == scope.depth + 1).copied()
    }

    fn exit_naturally(&mut self, ast: &Ast, scope: OpenScope) {
        let owned: Vec<Armed> = self.owned_by(scope).collect();
        self.armed.retain(|a| a.depth != scope.depth + 1);
        if owned.is_empty() {
            return;
        }

        if !falls_off_end(ast, scope.node) {
            debug!(
                "{} @{} ends in a jump; {} defer(s) already fired there",
                ast.tag(scope.node),
                ast.span(scope.node).end,
                owned.len()
            );
            return;
        }

        for armed in owned {
            let op = deferred_op(ast, armed.defer);
            self.edits.push(Edit::Append { scope: scope.node, op });
            self.record(ast, armed.defer, scope.node, ExitKind::ScopeEnd);
        }
    }

    fn exit_early(&mut self, ast: &Ast, jump: NodeRef, exit: ExitKind) {
        let mut owed = Vec::new();
        let mut target = None;
        for &scope in self.open_scopes.iter().rev() {
            owed.extend(self.owned_by(scope).map(|armed| (armed, scope.node)));
            if exit.stops_at(ast.tag(scope.node)) {
                target = Some(scope.node);
                break;
            }
        }
        if owed.is_empty() {
            return;
        }

        let binding = match (ast.kind(jump), target.map(|t| ast.kind(t))) {
            (NodeKind::Return(Some(value)), Some(NodeKind::Function(function))) if !is_constant(ast, *value) => {
                value_type(&function.return_type).map(|ty| (*value, ty))
            }
            _ => None,
        };
        let needs_braces = binding.is_some() || ast.parent(jump).is_some_and(|parent| !ast.kind(parent).braced());
        if let Some((value, ty)) = &binding {
            debug!("return value @{} is bound to `{ty} {RETURN_TEMP}`", ast.span(*value).start);
            self.edits.push(Edit::BindReturn {
                ret: jump,
                value: *value,
                ty: NameId::new(ty),
            });
        }
        for (i, &(armed, scope)) in owed.iter().enumerate() {
            let op = deferred_op(ast, armed.defer);
            self.edits.push(Edit::InsertBefore {
                anchor: jump,
                op,
                open_brace: needs_braces && binding.is_none() && i == 0,
            });
            self.record(ast, armed.defer, scope, exit);
        }
        if needs_braces {
            self.edits.push(Edit::CloseBrace { anchor: jump });
        }
    }

    fn record(&mut self, ast: &Ast, defer: NodeRef, scope: NodeRef, exit: ExitKind) {
        let note = format!("fired on {exit:?} of {}", ast.tag(scope));
        report("Defer", ast.span(defer).start, &note);
        self.fired.push(FireRecord { defer, scope, exit });
    }

    /// Apply the recorded edits to the tree.
    pub fn apply(&mut self, ast: &mut Ast) -> DeferSummary {
        for edit in self.edits.drain(..) {
            match edit {
                Edit::Remove { defer } => ast.set_dirty(defer, Dirty::Removed),
                Edit::Append { scope, op } => {
                    let copy = materialize(ast, op);
                    ast.attach(scope, copy);
                }
                Edit::InsertBefore { anchor, op, open_brace } => {
                    let copy = materialize(ast, op);
                    if open_brace {
                        ast.add_actions(copy, SpecialActions::OPEN_BRACE);
                    }
                    match ast.parent(anchor) {
                        Some(parent) => ast.insert_before(parent, anchor, copy),
                        None => warn!("jump statement @{} has no parent", ast.span(anchor).start),
                    }
                }
                Edit::BindReturn { ret, value, ty } => {
                    let copy = materialize(ast, value);
                    ast.add_actions(copy, SpecialActions::OPEN_BRACE);
                    ast.set_prefix(copy, &format!("{ty} {RETURN_TEMP} = "));
                    match ast.parent(ret) {
                        Some(parent) => ast.insert_before(parent, ret, copy),
                        None => warn!("return statement @{} has no parent", ast.span(ret).start),
                    }
                    ast.replace_text(value, RETURN_TEMP);
                }
                Edit::CloseBrace { anchor } => {
                    ast.set_dirty(anchor, Dirty::Modified);
                    ast.add_actions(anchor, SpecialActions::CLOSE_BRACE);
                }
            }
        }
        DeferSummary {
            armed: self.armed_total,
            fired: self.fired.len(),
        }
    }
}

/// The operation a `defer` statement carries.
fn deferred_op(ast: &Ast, defer: NodeRef) -> NodeRef {
    ast.children(defer).first().copied().unwrap_or(defer)
}

fn materialize(ast: &mut Ast, op: NodeRef) -> NodeRef {
    let copy = ast.clone_subtree(op);
    ast.set_dirty(copy, Dirty::Added);
    copy
}

/// Whether `node` is a literal, possibly under sign or bit operators. Such a
/// value cannot observe the deferred operations.
fn is_constant(ast: &Ast, node: NodeRef) -> bool {
    match ast.kind(node) {
        NodeKind::Constant(_) => true,
        NodeKind::UnaryOp(data) if matches!(data.op.as_str(), "-" | "+" | "~" | "!") => {
            ast.children(node).iter().all(|&c| is_constant(ast, c))
        }
        _ => false,
    }
}

/// The type a temporary holding a function's return value is declared with.
/// `None` for `void`.
fn value_type(return_type: &str) -> Option<String> {
    let ty = return_type
        .split(' ')
        .filter(|word| !NON_TYPE_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ");
    (!ty.is_empty() && ty != "void").then_some(ty)
}

/// Whether control can reach the end of `scope` by falling through.
fn falls_off_end(ast: &Ast, scope: NodeRef) -> bool {
    let live_last = ast
        .children(scope)
        .iter()
        .rev()
        .find(|&&c| ast.tag(c) != NodeTag::Defer && ast.tag(c) != NodeTag::Group);
    !live_last.is_some_and(|&last| matches!(ast.kind(last), NodeKind::Return(_) | NodeKind::JumpStatement(_)))
}

impl Strategy for DeferResolver {
    fn enter(&mut self, ast: &Ast, node: NodeRef, depth: u32) -> Visit {
        self.close_scopes_from(ast, depth);
        if ast.tag(node) == NodeTag::Defer {
            Visit::Prune
        } else {
            Visit::Descend
        }
    }

    fn peek_scope(&mut self, _ast: &Ast, node: NodeRef, depth: u32) {
        self.open(node, depth);
    }

    fn peek_function(&mut self, _ast: &Ast, node: NodeRef, depth: u32) {
        self.open(node, depth);
    }

    fn peek_loop(&mut self, _ast: &Ast, node: NodeRef, depth: u32) {
        self.open(node, depth);
    }

    fn peek_if(&mut self, _ast: &Ast, node: NodeRef, depth: u32) {
        self.open(node, depth);
    }

    fn peek_switch_case_label(&mut self, _ast: &Ast, node: NodeRef, depth: u32) {
        self.open(node, depth);
    }

    fn peek_defer(&mut self, ast: &Ast, node: NodeRef, depth: u32) {
        self.armed.push(Armed { depth, defer: node });
        self.armed_total += 1;
        self.edits.push(Edit::Remove { defer: node });
        report("Defer", ast.span(node).start, "armed");
    }

    fn peek_return(&mut self, ast: &Ast, node: NodeRef, _depth: u32) {
        self.exit_early(ast, node, ExitKind::Return);
    }

    fn peek_jump_statement(&mut self, ast: &Ast, node: NodeRef, _depth: u32) {
        let exit = match ast.kind(node) {
            NodeKind::JumpStatement(JumpKind::Break) => ExitKind::Break,
            _ => ExitKind::Continue,
        };
        self.exit_early(ast, node, exit);
    }

    fn finish(&mut self, ast: &Ast) {
        self.close_scopes_from(ast, 0);
        if !self.armed.is_empty() {
            warn!("{} defer(s) outside any scope were dropped", self.armed.len());
            self.armed.clear();
        }
    }
}

/// Resolve every `defer` in `ast`.
pub fn resolve_defers(ast: &mut Ast) -> DeferSummary {
    let mut resolver = DeferResolver::new();
    walk(ast, ast.root(), &mut resolver);
    let summary = resolver.apply(ast);
    debug!("defer resolution: {} armed, {} fired", summary.armed, summary.fired);
    summary
}
