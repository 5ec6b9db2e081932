//! Source regeneration.
//!
//! Untouched text is copied verbatim from the original file; only nodes the
//! defer pass edited change the output. Three steps:
//!
//! 1. collect one range per node that owns text ([`ranges::RangeCollector`])
//! 2. squash the nested ranges into a flat cut list ([`ranges::squash`])
//! 3. copy or synthesize each cut in order ([`emitter::emit_cuts`])

pub mod emitter;
pub mod ranges;

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use log::{debug, error};

pub use emitter::{RegenReport, emit_cuts};
pub use ranges::{RangeCollector, SourceRange, squash};

use crate::ast::Ast;
use crate::ast::visitor::walk;
use crate::diagnostic::RegenError;

/// Collect and squash the cut list for `ast`.
pub fn cut_list(ast: &Ast) -> Vec<SourceRange> {
    let mut collector = RangeCollector::new();
    walk(ast, ast.root(), &mut collector);
    let ranges = collector.into_ranges();
    let collected = ranges.len();
    let cuts = squash(ranges);
    debug!("{collected} range(s) squashed into {} cut(s)", cuts.len());
    cuts
}

/// Regenerate into any writer from any seekable source.
pub fn regenerate_into<R, W>(ast: &Ast, source: Option<&mut R>, out: &mut W) -> RegenReport
where
    R: Read + Seek,
    W: Write,
{
    emit_cuts(&cut_list(ast), source, out)
}

/// Regenerate from in-memory source text.
pub fn regenerate_to_vec(ast: &Ast, source: &[u8]) -> (Vec<u8>, RegenReport) {
    let mut out = Vec::with_capacity(source.len());
    let mut cursor = Cursor::new(source);
    let report = regenerate_into(ast, Some(&mut cursor), &mut out);
    (out, report)
}

/// Regenerate the file the tree was built from into `output`.
///
/// Only failing to create `output` is an error. An unreadable source or a
/// failed read or write is logged and counted in the report.
pub fn regenerate(ast: &Ast, output: &Path) -> Result<RegenReport, RegenError> {
    let file = File::create(output).map_err(|source| RegenError::CreateOutput {
        path: output.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    let source_path = ast.source_path();
    let mut source = match File::open(source_path) {
        Ok(file) => Some(file),
        Err(e) => {
            error!("cannot open source {}: {e}", source_path.display());
            None
        }
    };

    let mut report = regenerate_into(ast, source.as_mut(), &mut writer);
    if let Err(e) = writer.flush() {
        error!("failed to flush {}: {e}", output.display());
        report.failed_chunks += 1;
    }
    debug!(
        "wrote {} byte(s) in {} chunk(s) to {} ({} failed)",
        report.bytes_written,
        report.chunks,
        output.display(),
        report.failed_chunks
    );
    Ok(report)
}
