//! Structural policies applied while the tree is built.
//!
//! Both are best-effort rules over the tree shape, not control-flow analysis.

use crate::ast::{Ast, JumpKind, LoopKind, NodeKind, NodeRef, NodeTag};

fn is_plain_scope(ast: &Ast, node: NodeRef) -> bool {
    ast.tag(node) == NodeTag::Scope
}

/// The body scope that `node` may absorb, if any.
///
/// A `Function` absorbs its body when the body is its only child. `If`,
/// `Loop` and `SwitchCase` keep a `Group` for their header, so they absorb a
/// body when they have at most two children and the only non-group child is
/// a plain scope. A `do`-`while` loop never absorbs its body: the condition
/// group follows the body and must stay behind everything the body holds.
pub fn redundant_body(ast: &Ast, node: NodeRef) -> Option<NodeRef> {
    let children = ast.children(node);
    match ast.kind(node) {
        NodeKind::Function(_) => match children {
            [only] if is_plain_scope(ast, *only) => Some(*only),
            _ => None,
        },
        NodeKind::Loop(data) if data.kind == LoopKind::DoWhile => None,
        NodeKind::If(_) | NodeKind::Loop(_) | NodeKind::SwitchCase(_) => {
            if children.len() > 2 {
                return None;
            }
            let mut bodies = children.iter().filter(|&&c| ast.tag(c) != NodeTag::Group);
            match (bodies.next(), bodies.next()) {
                (Some(&body), None) if is_plain_scope(ast, body) => Some(body),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Splice redundant body scopes of `node` into it until none is left.
/// Returns how many scopes were absorbed; a second call always returns 0.
pub fn fold_redundant_scopes(ast: &mut Ast, node: NodeRef) -> usize {
    let mut folded = 0;
    while let Some(body) = redundant_body(ast, node) {
        let braced = ast.kind(body).braced();
        ast.splice_children(node, body);
        ast.get_mut(node).kind.set_braced(braced);
        folded += 1;
    }
    folded
}

fn is_break(ast: &Ast, node: NodeRef) -> bool {
    ast.kind(node).is_jump(JumpKind::Break)
}

/// Whether a case label's statements end in an explicit `break`, directly or
/// as the last statement of a braced block that ends the label.
pub fn ends_in_break(ast: &Ast, label: NodeRef) -> bool {
    let Some(&last) = ast.children(label).last() else {
        return false;
    };
    if is_break(ast, last) {
        return true;
    }
    is_plain_scope(ast, last) && ast.children(last).last().is_some_and(|&inner| is_break(ast, inner))
}
