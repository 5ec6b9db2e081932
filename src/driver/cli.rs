//! CLI parsing and configuration module
//!
//! This module handles command-line argument parsing using clap and
//! provides configuration structures for the transpiler driver.

use std::io;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser as CliParser};

/// Default file name suffix of regenerated sources.
pub const DEFAULT_SUFFIX: &str = ".out.c";

/// CLI interface using clap
#[derive(CliParser, Debug)]
#[clap(name = "cdefer", about = "Lowers `defer` statements in C sources to plain C")]
pub struct Cli {
    /// Input C source files
    #[clap(value_parser, required = true)]
    pub input_files: Vec<PathBuf>,

    /// Write outputs into DIR instead of next to each input
    #[clap(short = 'o', long = "out-dir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Output file name suffix
    #[clap(long, value_name = "SUFFIX", default_value = DEFAULT_SUFFIX)]
    pub suffix: String,

    /// Print the resolved AST of every input to stdout
    #[clap(long)]
    pub dump_ast: bool,

    /// Skip defer resolution and regenerate inputs verbatim
    #[clap(long)]
    pub no_defer: bool,

    /// Raise log verbosity (repeatable)
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Configuration for one transpiler run
#[derive(Debug)]
pub struct TranspileConfig {
    pub input_files: Vec<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub suffix: String,
    pub dump_ast: bool,
    pub resolve_defers: bool,
    pub verbose: u8,
    _temp_file: Option<tempfile::TempPath>,
}

impl Default for TranspileConfig {
    fn default() -> Self {
        TranspileConfig {
            input_files: Vec::new(),
            out_dir: None,
            suffix: DEFAULT_SUFFIX.to_string(),
            dump_ast: false,
            resolve_defers: true,
            verbose: 0,
            _temp_file: None,
        }
    }
}

impl TranspileConfig {
    pub fn new(input_files: Vec<PathBuf>) -> Self {
        TranspileConfig {
            input_files,
            ..Self::default()
        }
    }

    /// Create a config whose single input is `source`, written to a temporary
    /// `.c` file that lives as long as the config.
    pub fn from_source_code(source: &str) -> io::Result<Self> {
        use std::io::Write;
        let mut tmpfile = tempfile::Builder::new().suffix(".c").tempfile()?;
        tmpfile.write_all(source.as_bytes())?;
        let temp_path = tmpfile.into_temp_path();

        Ok(TranspileConfig {
            input_files: vec![temp_path.to_path_buf()],
            _temp_file: Some(temp_path),
            ..Self::default()
        })
    }

    /// Where the regenerated form of `input` is written.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let stem = input.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        let file_name = format!("{stem}{}", self.suffix);
        match &self.out_dir {
            Some(dir) => dir.join(file_name),
            None => input.with_file_name(file_name),
        }
    }
}

impl Cli {
    /// Convert CLI arguments into a transpiler configuration
    pub fn into_config(self) -> TranspileConfig {
        TranspileConfig {
            input_files: self.input_files,
            out_dir: self.out_dir,
            suffix: self.suffix,
            dump_ast: self.dump_ast,
            resolve_defers: !self.no_defer,
            verbose: self.verbose,
            _temp_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from(["cdefer", "-vv", "--no-defer", "-o", "build", "a.c", "b.c"]).unwrap();
        let config = cli.into_config();
        assert_eq!(config.input_files, vec![PathBuf::from("a.c"), PathBuf::from("b.c")]);
        assert_eq!(config.out_dir, Some(PathBuf::from("build")));
        assert_eq!(config.suffix, DEFAULT_SUFFIX);
        assert!(!config.resolve_defers);
        assert_eq!(config.verbose, 2);
    }

    #[test]
    fn requires_an_input() {
        assert!(Cli::try_parse_from(["cdefer"]).is_err());
    }

    #[test]
    fn output_path_uses_suffix_and_out_dir() {
        let mut config = TranspileConfig::new(vec![]);
        assert_eq!(config.output_path(Path::new("src/main.c")), PathBuf::from("src/main.out.c"));
        config.out_dir = Some(PathBuf::from("gen"));
        config.suffix = String::from(".c2");
        assert_eq!(config.output_path(Path::new("src/main.c")), PathBuf::from("gen/main.c2"));
    }

    #[test]
    fn source_code_config_writes_a_c_file() {
        let config = TranspileConfig::from_source_code("int x;").unwrap();
        let path = &config.input_files[0];
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("c"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "int x;");
    }
}
