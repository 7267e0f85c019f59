// config.rs — run configuration and the interactive bin prompt.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::histeq::BinCount;

/// Input file used when none is given.
pub const DEFAULT_INPUT: &str = "test_large.pgm";

/// Where the four stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    #[default]
    Gpu,
    /// The CPU reference implementation.
    Cpu,
}

/// Everything one run needs, resolved from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualizerConfig {
    pub input: PathBuf,
    pub platform: usize,
    pub device: usize,
    /// `None` means ask on stdin.
    pub bins: Option<BinCount>,
    pub output: Option<PathBuf>,
    pub display: bool,
    pub engine: Engine,
    pub histogram_csv: Option<PathBuf>,
}

impl Default for EqualizerConfig {
    fn default() -> Self {
        EqualizerConfig {
            input: PathBuf::from(DEFAULT_INPUT),
            platform: 0,
            device: 0,
            bins: None,
            output: None,
            display: true,
            engine: Engine::Gpu,
            histogram_csv: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no bin count given before end of input")]
    PromptClosed,
    #[error("cannot read bin count: {0}")]
    Io(#[from] std::io::Error),
}

/// Ask for a bin count until a valid one is entered.
///
/// Each attempt prints `Enter number of bins:` to `output` and reads one
/// line from `input`. Anything that is not an integer in 1..=256 prints
/// `Must have between 1 and 256 bins` and asks again.
pub fn prompt_bins<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<BinCount, ConfigError> {
    let mut line = String::new();
    loop {
        writeln!(output, "Enter number of bins: ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(ConfigError::PromptClosed);
        }
        match line.parse::<BinCount>() {
            Ok(bins) => return Ok(bins),
            Err(_) => writeln!(output, "Must have between 1 and 256 bins")?,
        }
    }
}
