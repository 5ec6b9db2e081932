//! Transpiler driver: command line, configuration and the per-file pipeline.

pub mod cli;
pub mod compiler;

pub use cli::{Cli, TranspileConfig};
pub use compiler::{PipelineOutputs, TranspileArtifact, TranspilePhase, TranspilerDriver};

use crate::diagnostic::DriverError;

/// Run the binary's pipeline for parsed arguments.
pub fn run(cli: Cli) -> Result<(), DriverError> {
    TranspilerDriver::new(cli).run()
}
