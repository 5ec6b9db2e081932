//! Transpilation pipeline orchestration
//!
//! Every input goes through the same phases: read, build the tree from the
//! reference producer's events, resolve defers, regenerate. A failing input
//! is reported and skipped; the remaining inputs still run.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, error, info};

use crate::ast::Ast;
use crate::ast::dumper::AstDumper;
use crate::diagnostic::{DriverError, ParseError};
use crate::parser::produce_events;
use crate::regen::{RegenReport, regenerate};
use crate::semantic::{DeferSummary, SemanticBuilder, resolve_defers};

use super::cli::{Cli, TranspileConfig};

/// Last phase to run for each input.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TranspilePhase {
    /// Build the tree only.
    Build,
    /// Build and resolve defers, without writing output.
    Resolve,
    #[default]
    Regenerate,
}

/// What the pipeline produced for one input.
#[derive(Debug, Default)]
pub struct TranspileArtifact {
    pub ast: Option<Ast>,
    pub defers: Option<DeferSummary>,
    pub output: Option<PathBuf>,
    pub regen: Option<RegenReport>,
}

/// Outputs for every input, in command-line order.
#[derive(Debug, Default)]
pub struct PipelineOutputs {
    pub units: IndexMap<PathBuf, Result<TranspileArtifact, DriverError>>,
}

impl PipelineOutputs {
    pub fn failed(&self) -> usize {
        self.units.values().filter(|unit| unit.is_err()).count()
    }
}

/// Main transpiler driver
#[derive(Debug)]
pub struct TranspilerDriver {
    config: TranspileConfig,
    builder: SemanticBuilder,
}

impl TranspilerDriver {
    /// Create a new driver from CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self::from_config(cli.into_config())
    }

    pub fn from_config(config: TranspileConfig) -> Self {
        TranspilerDriver {
            config,
            builder: SemanticBuilder::new(),
        }
    }

    pub fn config(&self) -> &TranspileConfig {
        &self.config
    }

    /// Run every input through the full pipeline.
    pub fn run(&mut self) -> Result<(), DriverError> {
        let outputs = self.run_pipeline(TranspilePhase::Regenerate);
        let total = outputs.units.len();
        let failed = outputs.failed();
        for (path, unit) in &outputs.units {
            match unit {
                Ok(artifact) => {
                    if let Some(output) = &artifact.output {
                        info!("{} -> {}", path.display(), output.display());
                    }
                }
                Err(e) => error!("{e}"),
            }
        }
        if failed > 0 {
            return Err(DriverError::Failed { failed, total });
        }
        Ok(())
    }

    pub fn run_pipeline(&mut self, stop_after: TranspilePhase) -> PipelineOutputs {
        let mut outputs = PipelineOutputs::default();
        let input_files = self.config.input_files.clone();
        for input in input_files {
            let unit = self.run_translation_unit(&input, stop_after);
            outputs.units.insert(input, unit);
        }
        outputs
    }

    fn run_translation_unit(&mut self, input: &Path, stop_after: TranspilePhase) -> Result<TranspileArtifact, DriverError> {
        debug!("transpiling {}", input.display());
        let mut out = TranspileArtifact::default();

        let source = fs::read(input).map_err(|source| DriverError::Io {
            path: input.to_path_buf(),
            source,
        })?;

        let mut ast = self.run_builder(input, &source)?;
        if stop_after == TranspilePhase::Build {
            out.ast = Some(ast);
            return Ok(out);
        }

        if self.config.resolve_defers {
            out.defers = Some(resolve_defers(&mut ast));
        }
        if self.config.dump_ast {
            println!("{}", AstDumper::new().dump(&ast));
        }
        if stop_after == TranspilePhase::Resolve {
            out.ast = Some(ast);
            return Ok(out);
        }

        let output = self.config.output_path(input);
        let report = regenerate(&ast, &output)?;
        if report.failed_chunks > 0 {
            error!("{}: {} chunk(s) could not be regenerated", output.display(), report.failed_chunks);
        }
        out.ast = Some(ast);
        out.output = Some(output);
        out.regen = Some(report);
        Ok(out)
    }

    fn run_builder(&mut self, input: &Path, source: &[u8]) -> Result<Ast, DriverError> {
        self.builder.new_translation_unit(input);
        match produce_events(source, &mut self.builder) {
            Ok(()) => Ok(self.builder.take_ast()),
            Err(ParseError::Protocol(source)) => Err(DriverError::Protocol {
                path: input.to_path_buf(),
                source,
            }),
            Err(source) => Err(DriverError::Parse {
                path: input.to_path_buf(),
                source,
            }),
        }
    }
}
