//! Abstract Syntax Tree (AST) for the deferred C dialect.
//!
//! The tree is stored in a single arena owned by [`Ast`]. Nodes refer to each
//! other through [`NodeRef`] handles, which stay valid for the life of the arena.
//!
//! ## Ownership
//!
//! A node owns exactly the nodes listed in its `children`. Typed payload fields
//! such as the operands of a binary operation or the iterator slots of a loop
//! are *aliases* of handles that also appear among the children (or, for
//! function parameters, of nodes owned by the payload itself). Nothing is ever
//! owned twice.
//!
//! ## Submodules
//!
//! - [`nodes`]: node kinds, payloads, spans and regeneration requests
//! - [`visitor`]: the depth-tracking pre-order tree walker
//! - [`dumper`]: human-readable tree dumps used by `--dump-ast` and the tests

use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use hashbrown::HashMap;
use thin_vec::ThinVec;

/// Represents an interned string using symbol_table crate.
/// Alias for GlobalSymbol from symbol_table crate with global feature.
pub type NameId = symbol_table::GlobalSymbol;

pub mod dumper;
pub mod nodes;
pub mod visitor;

pub use nodes::*;

/// Process-wide id source. Ids are never reused, including by cloned subtrees.
static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

/// Unique identity of a node, stable across arena mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node reference type for referencing nodes inside one [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(NonZeroU32);

impl NodeRef {
    pub const ROOT: NodeRef = NodeRef(NonZeroU32::MIN);

    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    pub fn index(self) -> usize {
        (self.get() - 1) as usize
    }
}

/// One arena slot.
#[derive(Debug, Clone)]
pub struct SemNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub span: SemSpan,
    pub dirty: Dirty,
    pub children: ThinVec<NodeRef>,
    pub parent: Option<NodeRef>,
    pub actions: SpecialActions,
    /// Text written right before the node's source text.
    pub prefix: Option<NameId>,
    /// Text written in place of the node's source text.
    pub replacement: Option<NameId>,
}

/// The arena. Slot 1 is always the translation unit.
#[derive(Debug, Clone)]
pub struct Ast {
    nodes: Vec<SemNode>,
    index: HashMap<NodeId, NodeRef>,
}

impl Default for Ast {
    fn default() -> Self {
        Ast::new(PathBuf::new())
    }
}

impl Ast {
    /// Create an arena holding only the translation unit for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let mut ast = Ast {
            nodes: Vec::new(),
            index: HashMap::new(),
        };
        let root = ast.push_node(
            NodeKind::TranslationUnit(TranslationUnitData { path: path.into() }),
            SemSpan::NONE,
        );
        debug_assert_eq!(root, NodeRef::ROOT);
        ast
    }

    /// Add a detached node to the arena and return its reference
    pub(crate) fn push_node(&mut self, kind: NodeKind, span: SemSpan) -> NodeRef {
        let id = NodeId::fresh();
        self.nodes.push(SemNode {
            id,
            kind,
            span,
            dirty: Dirty::Clean,
            children: ThinVec::new(),
            parent: None,
            actions: SpecialActions::empty(),
            prefix: None,
            replacement: None,
        });
        let node = NodeRef::new(self.nodes.len() as u32).expect("arena slot index overflowed u32");
        self.index.insert(id, node);
        node
    }

    pub fn root(&self) -> NodeRef {
        NodeRef::ROOT
    }

    /// Number of arena slots, including discarded ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, node: NodeRef) -> &SemNode {
        &self.nodes[node.index()]
    }

    pub(crate) fn get_mut(&mut self, node: NodeRef) -> &mut SemNode {
        &mut self.nodes[node.index()]
    }

    pub fn kind(&self, node: NodeRef) -> &NodeKind {
        &self.get(node).kind
    }

    pub fn tag(&self, node: NodeRef) -> NodeTag {
        self.get(node).kind.tag()
    }

    pub fn span(&self, node: NodeRef) -> SemSpan {
        self.get(node).span
    }

    pub fn children(&self, node: NodeRef) -> &[NodeRef] {
        &self.get(node).children
    }

    pub fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.get(node).parent
    }

    pub fn id(&self, node: NodeRef) -> NodeId {
        self.get(node).id
    }

    /// Path of the source file this tree was built from.
    pub fn source_path(&self) -> &Path {
        match &self.get(NodeRef::ROOT).kind {
            NodeKind::TranslationUnit(data) => &data.path,
            _ => Path::new(""),
        }
    }

    /// Look a node up by identity. Discarded nodes are not found.
    pub fn find(&self, id: NodeId) -> Option<NodeRef> {
        self.index.get(&id).copied()
    }

    /// Append `child` to `parent`'s children and set its back-link.
    pub(crate) fn attach(&mut self, parent: NodeRef, child: NodeRef) {
        self.get_mut(child).parent = Some(parent);
        self.get_mut(parent).children.push(child);
    }

    /// Insert `child` into `parent`'s children immediately before `anchor`.
    /// Appends when `anchor` is not a child of `parent`.
    pub(crate) fn insert_before(&mut self, parent: NodeRef, anchor: NodeRef, child: NodeRef) {
        self.get_mut(child).parent = Some(parent);
        let children = &mut self.get_mut(parent).children;
        match children.iter().position(|&c| c == anchor) {
            Some(pos) => children.insert(pos, child),
            None => children.push(child),
        }
    }

    /// Unlink `child` from its parent. The slot stays in the arena.
    pub(crate) fn detach(&mut self, child: NodeRef) {
        if let Some(parent) = self.get_mut(child).parent.take() {
            self.get_mut(parent).children.retain(|c| *c != child);
        }
    }

    pub(crate) fn set_span(&mut self, node: NodeRef, span: SemSpan) {
        self.get_mut(node).span = span;
    }

    /// Mark a node. `Removed` propagates to every descendant.
    pub fn set_dirty(&mut self, node: NodeRef, dirty: Dirty) {
        if dirty != Dirty::Removed {
            self.get_mut(node).dirty = dirty;
            return;
        }
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let slot = self.get_mut(current);
            slot.dirty = Dirty::Removed;
            stack.extend(slot.children.iter().copied());
        }
    }

    pub fn add_actions(&mut self, node: NodeRef, actions: SpecialActions) {
        self.get_mut(node).actions |= actions;
    }

    pub fn set_prefix(&mut self, node: NodeRef, text: &str) {
        self.get_mut(node).prefix = Some(NameId::new(text));
    }

    /// Emit `text` instead of the node's source text. Marks it `Modified`.
    pub fn replace_text(&mut self, node: NodeRef, text: &str) {
        let slot = self.get_mut(node);
        slot.replacement = Some(NameId::new(text));
        slot.dirty = Dirty::Modified;
    }

    /// Replace `inner` in `outer`'s children with `inner`'s own children, in
    /// order. `inner` is left childless, orphaned, marked `Removed` and is no
    /// longer reachable through [`Ast::find`].
    pub(crate) fn splice_children(&mut self, outer: NodeRef, inner: NodeRef) {
        let moved = std::mem::take(&mut self.get_mut(inner).children);
        for &child in &moved {
            self.get_mut(child).parent = Some(outer);
        }
        let children = &mut self.get_mut(outer).children;
        if let Some(pos) = children.iter().position(|&c| c == inner) {
            children.splice(pos..=pos, moved);
        } else {
            children.extend(moved);
        }

        let slot = self.get_mut(inner);
        slot.parent = None;
        slot.dirty = Dirty::Removed;
        let id = slot.id;
        self.index.remove(&id);
    }

    /// Deep-copy the subtree rooted at `node`. The copy has fresh ids, clean
    /// dirty flags, no actions and no parent. Alias fields are remapped to the
    /// copied nodes.
    pub fn clone_subtree(&mut self, node: NodeRef) -> NodeRef {
        let mut remap: HashMap<NodeRef, NodeRef> = HashMap::new();
        let copy = self.copy_node(node, &mut remap);
        self.relink_aliases(copy, &remap);
        copy
    }

    fn copy_node(&mut self, node: NodeRef, remap: &mut HashMap<NodeRef, NodeRef>) -> NodeRef {
        let source = self.get(node);
        let kind = source.kind.clone();
        let span = source.span;
        let children: Vec<NodeRef> = source.children.to_vec();

        let copy = self.push_node(kind, span);
        remap.insert(node, copy);
        for child in children {
            let child_copy = self.copy_node(child, remap);
            self.attach(copy, child_copy);
        }
        copy
    }

    fn relink_aliases(&mut self, copy: NodeRef, remap: &HashMap<NodeRef, NodeRef>) {
        let mut stack = vec![copy];
        while let Some(current) = stack.pop() {
            let slot = self.get_mut(current);
            slot.kind.remap_refs(|r| remap.get(&r).copied().unwrap_or(r));
            stack.extend(slot.children.iter().copied());
        }
    }

    /// Iterate over every node reachable from the root, pre-order.
    pub fn reachable(&self) -> impl Iterator<Item = NodeRef> + '_ {
        let mut stack = vec![NodeRef::ROOT];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(self.children(node).iter().rev().copied());
            Some(node)
        })
    }
}
