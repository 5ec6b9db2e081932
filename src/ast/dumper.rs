//! AST Dumper module
//!
//! Renders a tree as an indented outline, one node per line. Used by
//! `--dump-ast` and by snapshot tests.

use itertools::Itertools;

use crate::ast::visitor::{Strategy, Visit, walk};
use crate::ast::{Ast, Dirty, LoopKind, NodeKind, NodeRef, PostfixOp};

/// Dumper for AST
#[derive(Debug, Default)]
pub struct AstDumper {
    show_spans: bool,
    show_removed: bool,
    lines: Vec<String>,
}

impl AstDumper {
    pub fn new() -> Self {
        AstDumper {
            show_spans: false,
            show_removed: true,
            lines: Vec::new(),
        }
    }

    /// Append each node's span to its line.
    pub fn with_spans(mut self) -> Self {
        self.show_spans = true;
        self
    }

    /// Leave `Removed` subtrees out of the dump.
    pub fn hide_removed(mut self) -> Self {
        self.show_removed = false;
        self
    }

    /// Dump the whole tree.
    pub fn dump(self, ast: &Ast) -> String {
        self.dump_from(ast, ast.root())
    }

    /// Dump the subtree rooted at `root`.
    pub fn dump_from(mut self, ast: &Ast, root: NodeRef) -> String {
        walk(ast, root, &mut self);
        self.lines.join("\n")
    }

    fn describe(ast: &Ast, node: NodeRef) -> String {
        let label = ast.tag(node).label();
        match ast.kind(node) {
            NodeKind::Scope(data) if data.braced => format!("{label} {{}}"),
            NodeKind::Function(data) => {
                let params = data
                    .params
                    .iter()
                    .map(|&p| match ast.kind(p) {
                        NodeKind::Declaration(decl) => format_declaration(&decl.lhs_type, decl.lhs_identifier.as_str(), decl.is_reference),
                        _ => String::from("?"),
                    })
                    .join(", ");
                format!("{label} {} -> {} ({params})", data.name, data.return_type)
            }
            NodeKind::Loop(data) => {
                let kind = match data.kind {
                    LoopKind::For => "for",
                    LoopKind::While => "while",
                    LoopKind::DoWhile => "do",
                };
                format!("{label} {kind}")
            }
            NodeKind::SwitchCaseLabel(data) if data.is_fallthrough => {
                format!("{label} {} fallthrough", data.case_label)
            }
            NodeKind::SwitchCaseLabel(data) => format!("{label} {}", data.case_label),
            NodeKind::JumpStatement(kind) => format!("{label} {}", kind.keyword()),
            NodeKind::Declaration(decl) => format!(
                "{label} {}",
                format_declaration(&decl.lhs_type, decl.lhs_identifier.as_str(), decl.is_reference)
            ),
            NodeKind::PostfixExpression(data) => match &data.op {
                PostfixOp::Call => format!("{label} call"),
                PostfixOp::Index => format!("{label} index"),
                PostfixOp::Member { field, arrow: true } => format!("{label} ->{field}"),
                PostfixOp::Member { field, arrow: false } => format!("{label} .{field}"),
                PostfixOp::Increment { decrement: true } => format!("{label} --"),
                PostfixOp::Increment { decrement: false } => format!("{label} ++"),
            },
            NodeKind::BinaryOp(data) => format!("{label} {}", data.op),
            NodeKind::Identifier(name) => format!("{label} {name}"),
            NodeKind::Constant(text) => format!("{label} {text}"),
            NodeKind::UnaryOp(data) => format!("{label} {}", data.op),
            _ => label.to_string(),
        }
    }
}

fn format_declaration(ty: &str, name: &str, is_reference: bool) -> String {
    let amp = if is_reference { "&" } else { "" };
    match (ty.is_empty(), name.is_empty()) {
        (_, true) => format!("{ty}{amp}"),
        (true, false) => format!("{amp}{name}"),
        (false, false) => format!("{ty} {amp}{name}"),
    }
}

impl Strategy for AstDumper {
    fn enter(&mut self, ast: &Ast, node: NodeRef, depth: u32) -> Visit {
        let slot = ast.get(node);
        if slot.dirty == Dirty::Removed && !self.show_removed {
            return Visit::Prune;
        }

        let mut line = "  ".repeat(depth as usize);
        line.push_str(&Self::describe(ast, node));
        if self.show_spans {
            line.push(' ');
            line.push_str(&slot.span.to_string());
        }
        match slot.dirty {
            Dirty::Clean => {}
            Dirty::Added => line.push_str(" [added]"),
            Dirty::Modified => line.push_str(" [modified]"),
            Dirty::Removed => line.push_str(" [removed]"),
        }
        if !slot.actions.is_empty() {
            let names = slot.actions.iter_names().map(|(name, _)| name).join("|");
            line.push_str(&format!(" <{names}>"));
        }
        if let Some(prefix) = slot.prefix {
            line.push_str(&format!(" prefix {:?}", prefix.as_str()));
        }
        if let Some(text) = slot.replacement {
            line.push_str(&format!(" as {:?}", text.as_str()));
        }
        self.lines.push(line);
        Visit::Descend
    }
}
