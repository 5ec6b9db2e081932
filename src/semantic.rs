//! Semantic construction of the tree.
//!
//! This module turns the flat stream of grammar reduction events into an
//! [`Ast`](crate::ast::Ast) and resolves `defer` statements on it:
//! - [`chunks`]: the event vocabulary and the [`ReductionSink`] seam
//! - [`builder`]: the staging state machine behind [`SemanticBuilder`]
//! - [`folding`]: redundant-scope folding and the fallthrough policy
//! - [`defer`]: the defer resolution strategy

pub mod builder;
pub mod chunks;
pub mod defer;
pub mod folding;

pub use builder::{BuilderMode, SemanticBuilder};
pub use chunks::{ChunkKind, ReductionSink, SyntaxChunk, SyntaxChunkType};
pub use defer::{DeferResolver, DeferSummary, ExitKind, FireRecord, RETURN_TEMP, resolve_defers};
pub use folding::{ends_in_break, fold_redundant_scopes};
