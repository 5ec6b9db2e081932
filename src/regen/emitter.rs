//! Writes a squashed cut list.

use std::io::{self, Read, Seek, SeekFrom, Write};

use log::{error, trace};

use crate::ast::SpecialActions;
use crate::regen::ranges::SourceRange;

/// Outcome of one regeneration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegenReport {
    /// Cuts that produced output.
    pub chunks: usize,
    pub bytes_written: u64,
    /// Cuts skipped because of an I/O failure.
    pub failed_chunks: usize,
}

/// Emit `cuts` in order, copying their bytes from `source` into `out`.
///
/// `source` may be absent when the original file could not be opened; every
/// cut that needs its bytes is then counted as failed. Failures never stop
/// the emission.
pub fn emit_cuts<R, W>(cuts: &[SourceRange], mut source: Option<&mut R>, out: &mut W) -> RegenReport
where
    R: Read + Seek,
    W: Write,
{
    let mut report = RegenReport::default();
    let mut previous_end: Option<u32> = None;
    let mut buffer = Vec::new();

    for cut in cuts {
        if cut.actions.contains(SpecialActions::OMIT) {
            previous_end = Some(previous_end.map_or(cut.end, |end| end.max(cut.end)));
            continue;
        }

        let mut start = cut.start;
        if !cut.synthesized
            && let Some(end) = previous_end
            && start < end
        {
            trace!("clamping cut [{}..{}) to {end}", cut.start, cut.end);
            start = end.min(cut.end);
        }

        buffer.clear();
        if cut.actions.contains(SpecialActions::OPEN_BRACE) {
            buffer.push(b'{');
        }
        if cut.actions.contains(SpecialActions::PREPEND_NEWLINE) {
            buffer.push(b'\n');
        }
        if let Some(prefix) = cut.prefix {
            buffer.extend_from_slice(prefix.as_str().as_bytes());
        }
        if let Some(text) = cut.replacement {
            buffer.extend_from_slice(text.as_str().as_bytes());
        } else if start < cut.end {
            let Some(file) = source.as_deref_mut() else {
                error!("no source to copy [{start}..{}) from", cut.end);
                report.failed_chunks += 1;
                continue;
            };
            if let Err(e) = read_span(file, start, cut.end, &mut buffer) {
                error!("failed to read source bytes [{start}..{}): {e}", cut.end);
                report.failed_chunks += 1;
                continue;
            }
        }
        if cut.actions.contains(SpecialActions::APPEND_SEMICOLON) {
            buffer.push(b';');
        }
        if cut.actions.contains(SpecialActions::CLOSE_BRACE) {
            buffer.extend_from_slice(b"\n}");
        }

        if !cut.synthesized {
            previous_end = Some(previous_end.map_or(cut.end, |end| end.max(cut.end)));
        }
        if buffer.is_empty() {
            continue;
        }
        match out.write_all(&buffer) {
            Ok(()) => {
                report.chunks += 1;
                report.bytes_written += buffer.len() as u64;
            }
            Err(e) => {
                error!("failed to write {} byte(s) of output: {e}", buffer.len());
                report.failed_chunks += 1;
            }
        }
    }
    report
}

fn read_span<R: Read + Seek>(source: &mut R, start: u32, end: u32, buffer: &mut Vec<u8>) -> io::Result<()> {
    source.seek(SeekFrom::Start(u64::from(start)))?;
    let offset = buffer.len();
    buffer.resize(offset + (end - start) as usize, 0);
    source.read_exact(&mut buffer[offset..])
}
