//! Depth-tracking pre-order walker.
//!
//! [`walk`] visits a node, dispatches on its exact kind to the matching
//! [`Strategy`] hook, then descends into its children in order. Every hook
//! has an empty default, so a strategy only implements what it cares about.

use crate::ast::{Ast, NodeKind, NodeRef};

/// Whether the walker should descend into the current node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Descend,
    Prune,
}

/// Per-kind hooks invoked by [`walk`]. `depth` is 0 for the walk root.
#[allow(unused_variables)]
pub trait Strategy {
    /// Called for every node before its kind-specific hook.
    fn enter(&mut self, ast: &Ast, node: NodeRef, depth: u32) -> Visit {
        Visit::Descend
    }

    fn peek_translation_unit(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_scope(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_function(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_loop(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_if(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_switch_case(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_switch_case_label(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_return(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_jump_statement(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_declaration(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_postfix_expression(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_empty_statement(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_binary_op(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_identifier(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_constant(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_unary_op(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_initializer_list(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_group(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}
    fn peek_defer(&mut self, ast: &Ast, node: NodeRef, depth: u32) {}

    /// Called once after the last node has been visited.
    fn finish(&mut self, ast: &Ast) {}
}

fn dispatch<S: Strategy + ?Sized>(strategy: &mut S, ast: &Ast, node: NodeRef, depth: u32) {
    match ast.kind(node) {
        NodeKind::TranslationUnit(_) => strategy.peek_translation_unit(ast, node, depth),
        NodeKind::Scope(_) => strategy.peek_scope(ast, node, depth),
        NodeKind::Function(_) => strategy.peek_function(ast, node, depth),
        NodeKind::Loop(_) => strategy.peek_loop(ast, node, depth),
        NodeKind::If(_) => strategy.peek_if(ast, node, depth),
        NodeKind::SwitchCase(_) => strategy.peek_switch_case(ast, node, depth),
        NodeKind::SwitchCaseLabel(_) => strategy.peek_switch_case_label(ast, node, depth),
        NodeKind::Return(_) => strategy.peek_return(ast, node, depth),
        NodeKind::JumpStatement(_) => strategy.peek_jump_statement(ast, node, depth),
        NodeKind::Declaration(_) => strategy.peek_declaration(ast, node, depth),
        NodeKind::PostfixExpression(_) => strategy.peek_postfix_expression(ast, node, depth),
        NodeKind::EmptyStatement => strategy.peek_empty_statement(ast, node, depth),
        NodeKind::BinaryOp(_) => strategy.peek_binary_op(ast, node, depth),
        NodeKind::Identifier(_) => strategy.peek_identifier(ast, node, depth),
        NodeKind::Constant(_) => strategy.peek_constant(ast, node, depth),
        NodeKind::UnaryOp(_) => strategy.peek_unary_op(ast, node, depth),
        NodeKind::InitializerList => strategy.peek_initializer_list(ast, node, depth),
        NodeKind::Group => strategy.peek_group(ast, node, depth),
        NodeKind::Defer => strategy.peek_defer(ast, node, depth),
    }
}

/// Walk the subtree rooted at `root` pre-order, then call [`Strategy::finish`].
///
/// The walk keeps an explicit stack, so arbitrarily deep expression chains do
/// not grow the call stack.
pub fn walk<S: Strategy + ?Sized>(ast: &Ast, root: NodeRef, strategy: &mut S) {
    let mut stack = vec![(root, 0u32)];
    while let Some((node, depth)) = stack.pop() {
        let visit = strategy.enter(ast, node, depth);
        dispatch(strategy, ast, node, depth);
        if visit == Visit::Descend {
            stack.extend(ast.children(node).iter().rev().map(|&child| (child, depth + 1)));
        }
    }
    strategy.finish(ast);
}
