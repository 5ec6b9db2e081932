//! Lowers the `defer` statement of a C dialect to plain C.
//!
//! A scanner/parser reports grammar reductions as events; the semantic
//! builder turns them into an arena AST, the defer pass rewrites that tree,
//! and regeneration writes the source back out, copying every untouched byte
//! from the original file.

/// Contains the arena AST, its walker and dumper.
pub mod ast;
/// Contains the error types and construct reports.
pub mod diagnostic;
/// Contains the command line driver.
pub mod driver;
/// Contains the logger.
pub mod logger;
/// Contains the reference event producer.
pub mod parser;
/// Contains source regeneration.
pub mod regen;
/// Contains the AST builder and the defer pass.
pub mod semantic;
