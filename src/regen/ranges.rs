//! Range collection and squashing.
//!
//! Collection records one [`SourceRange`] per node that owns source text,
//! tagged with the number of collected ancestors above it. Squashing then
//! splits every range that has collected descendants into the text around
//! its children, until the list is flat.

use log::warn;

use crate::ast::visitor::{Strategy, Visit};
use crate::ast::{Ast, Dirty, NameId, NodeRef, NodeTag, SpecialActions};

/// A byte range of the original source plus emission requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRange {
    pub start: u32,
    pub end: u32,
    pub tag: NodeTag,
    pub depth: u32,
    pub actions: SpecialActions,
    /// Text copied in from elsewhere, not at its own position.
    pub synthesized: bool,
    /// Written after the leading actions, before the bytes.
    pub prefix: Option<NameId>,
    /// Written instead of the bytes.
    pub replacement: Option<NameId>,
}

impl SourceRange {
    pub fn new(start: u32, end: u32, tag: NodeTag, depth: u32) -> Self {
        SourceRange {
            start,
            end,
            tag,
            depth,
            actions: SpecialActions::empty(),
            synthesized: false,
            prefix: None,
            replacement: None,
        }
    }

    pub fn with_actions(mut self, actions: SpecialActions) -> Self {
        self.actions |= actions;
        self
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Walker strategy that collects ranges, pre-order.
#[derive(Debug, Default)]
pub struct RangeCollector {
    ranges: Vec<SourceRange>,
    /// Walker depths of the collected ancestors of the current node.
    path: Vec<u32>,
}

impl RangeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_ranges(self) -> Vec<SourceRange> {
        self.ranges
    }
}

impl Strategy for RangeCollector {
    fn enter(&mut self, ast: &Ast, node: NodeRef, depth: u32) -> Visit {
        while self.path.last().is_some_and(|&d| d >= depth) {
            self.path.pop();
        }
        let slot = ast.get(node);
        let span = slot.span;
        let range_depth = self.path.len() as u32;
        let mut range = SourceRange::new(span.start, span.end, slot.kind.tag(), range_depth);
        range.prefix = slot.prefix;
        range.replacement = slot.replacement;

        match slot.dirty {
            Dirty::Removed => {
                if !span.is_empty() {
                    self.ranges.push(range.with_actions(SpecialActions::OMIT));
                }
                Visit::Prune
            }
            Dirty::Added => {
                range.synthesized = true;
                let actions = SpecialActions::PREPEND_NEWLINE | SpecialActions::APPEND_SEMICOLON | slot.actions;
                self.ranges.push(range.with_actions(actions));
                Visit::Prune
            }
            Dirty::Modified if slot.replacement.is_some() => {
                self.ranges.push(range.with_actions(slot.actions));
                Visit::Prune
            }
            Dirty::Clean | Dirty::Modified => {
                if !span.is_empty() {
                    self.ranges.push(range.with_actions(slot.actions));
                    self.path.push(depth);
                }
                Visit::Descend
            }
        }
    }
}

/// Flatten nested ranges into an ordered cut list. Runs to a fixed point;
/// every cut of the result is a leaf at depth 0.
pub fn squash(mut ranges: Vec<SourceRange>) -> Vec<SourceRange> {
    loop {
        let mut next = Vec::with_capacity(ranges.len() * 2);
        let changed = flatten(&ranges, &mut next);
        ranges = next;
        if !changed {
            return ranges;
        }
    }
}

/// Index one past the last descendant of `ranges[i]`.
fn subtree_end(ranges: &[SourceRange], i: usize) -> usize {
    let depth = ranges[i].depth;
    ranges[i + 1..]
        .iter()
        .position(|r| r.depth <= depth)
        .map_or(ranges.len(), |p| i + 1 + p)
}

/// Flatten a sequence of sibling subtrees. Returns whether anything was split.
fn flatten(ranges: &[SourceRange], out: &mut Vec<SourceRange>) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i < ranges.len() {
        let range = ranges[i];
        let end = subtree_end(ranges, i);
        if end == i + 1 {
            out.push(SourceRange { depth: 0, ..range });
        } else {
            split(range, &ranges[i + 1..end], out);
            changed = true;
        }
        i = end;
    }
    changed
}

fn push_cut(out: &mut Vec<SourceRange>, container: &SourceRange, start: u32, end: u32, actions: SpecialActions) {
    if start < end || !actions.is_empty() {
        let mut cut = SourceRange::new(start, end.max(start), container.tag, 0);
        cut.actions = actions;
        out.push(cut);
    }
}

/// Replace `container` by its own text around its direct children, flattening
/// each child subtree in place.
fn split(container: SourceRange, run: &[SourceRange], out: &mut Vec<SourceRange>) {
    let child_depth = container.depth + 1;
    let is_positional = |r: &SourceRange| r.depth == child_depth && !r.synthesized;

    let mut cursor = container.start;
    let mut head = container.actions & SpecialActions::LEADING;
    let tail = container.actions & SpecialActions::TRAILING;

    let mut k = 0;
    while k < run.len() {
        let child = run[k];
        let end = subtree_end(run, k);
        // text up to the next positional child precedes an inserted one
        let upto = if child.synthesized {
            run[end..].iter().find(|r| is_positional(r)).map(|r| r.start)
        } else {
            Some(child.start)
        };
        if let Some(upto) = upto {
            if upto < cursor && !child.synthesized {
                warn!(
                    "{} range [{}..{}) overlaps its predecessor ending at {cursor}",
                    child.tag, child.start, child.end
                );
            }
            push_cut(out, &container, cursor, upto.max(cursor), head);
            head = SpecialActions::empty();
            cursor = cursor.max(upto);
        }
        if !child.synthesized {
            cursor = cursor.max(child.end);
        }
        flatten(&run[k..end], out);
        k = end;
    }

    let end = container.end.max(cursor);
    push_cut(out, &container, cursor, end, head | tail);
}
