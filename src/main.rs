// main.rs — histeq-gpu command line.
//
// Flags follow the classic layout: -p/-d pick platform and device, -l
// lists them, -f names the input, -h prints usage. Unknown flags and
// stray words are dropped before clap sees the line, and malformed
// values fall back to their defaults, so one bad flag never costs the
// others.

use std::convert::Infallible;
use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, Parser};
use tracing::warn;

use histeq_gpu::config::{Engine, EqualizerConfig, DEFAULT_INPUT};
use histeq_gpu::gpu::list_platforms_devices;
use histeq_gpu::histeq::BinCount;
use histeq_gpu::{logging, pipeline};

#[derive(Parser, Debug)]
#[command(name = "histeq-gpu")]
#[command(about = "Histogram equalization on a GPU compute device", long_about = None)]
#[command(disable_help_flag = true, args_override_self = true)]
struct Cli {
    /// Select platform
    #[arg(short = 'p', long, value_name = "INDEX", value_parser = lenient_index, default_value_t = 0)]
    platform: usize,

    /// Select device
    #[arg(short = 'd', long, value_name = "INDEX", value_parser = lenient_index, default_value_t = 0)]
    device: usize,

    /// List all platforms and devices
    #[arg(short = 'l', long, action = ArgAction::SetTrue)]
    list: bool,

    /// Input image file
    #[arg(short = 'f', long, value_name = "FILE", default_value = DEFAULT_INPUT)]
    file: PathBuf,

    /// Number of histogram bins (1-256); asked for on stdin if omitted or invalid
    #[arg(short = 'b', long, value_name = "N")]
    bins: Option<String>,

    /// Write the equalized image to this file
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Do not open the input/output viewers
    #[arg(long)]
    no_display: bool,

    /// Run the CPU reference instead of the GPU kernels
    #[arg(long)]
    cpu: bool,

    /// Write bin,count,cumulative,lut rows to this file
    #[arg(long, value_name = "FILE")]
    histogram_csv: Option<PathBuf>,

    /// Log filter (RUST_LOG takes precedence)
    #[arg(long, value_name = "FILTER", default_value = "info")]
    log_level: String,

    /// Print this message
    #[arg(short = 'h', long, action = ArgAction::SetTrue)]
    help: bool,
}

impl Cli {
    fn bin_count(&self) -> Option<BinCount> {
        let raw = self.bins.as_deref()?;
        match raw.parse() {
            Ok(bins) => Some(bins),
            Err(err) => {
                warn!(value = raw, %err, "ignoring -b");
                None
            }
        }
    }

    fn into_config(self) -> EqualizerConfig {
        EqualizerConfig {
            bins: self.bin_count(),
            input: self.file,
            platform: self.platform,
            device: self.device,
            output: self.output,
            display: !self.no_display,
            engine: if self.cpu { Engine::Cpu } else { Engine::Gpu },
            histogram_csv: self.histogram_csv,
        }
    }
}

/// Read an index the way `atoi` does: leading digits, anything else is 0.
fn lenient_index(value: &str) -> Result<usize, Infallible> {
    let digits: String = value.trim_start().chars().take_while(char::is_ascii_digit).collect();
    Ok(digits.parse().unwrap_or(0))
}

/// Keep the arguments `Cli` knows, rewritten as `--long` or `--long=value`.
///
/// A value flag takes the next token whatever it looks like; one at the
/// end of the line is dropped, as is anything unrecognized.
fn known_args<I, T>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let command = Cli::command();
    let mut args = args.into_iter().map(Into::into);
    let program = args
        .next()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "histeq-gpu".to_string());
    let mut kept = vec![program];

    while let Some(raw) = args.next() {
        let Some(token) = raw.to_str() else { continue };
        let (arg, inline_value) = if let Some(long) = token.strip_prefix("--") {
            let (name, value) = match long.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (long, None),
            };
            (command.get_arguments().find(|a| a.get_long() == Some(name)), value)
        } else if let Some(short) = token.strip_prefix('-') {
            let mut chars = short.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => (command.get_arguments().find(|a| a.get_short() == Some(c)), None),
                _ => (None, None),
            }
        } else {
            (None, None)
        };

        let Some(matched) = arg.and_then(|a| a.get_long().map(|l| (l, a.get_action().takes_values()))) else {
            continue;
        };
        match matched {
            (name, true) => {
                let value = inline_value.or_else(|| args.next().and_then(|v| v.into_string().ok()));
                if let Some(value) = value {
                    kept.push(format!("--{name}={value}"));
                }
            }
            (name, false) if inline_value.is_none() => kept.push(format!("--{name}")),
            _ => {}
        }
    }
    kept
}

fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    Cli::try_parse_from(known_args(args))
}

fn main() {
    let cli = parse_args(std::env::args_os()).unwrap_or_else(|err| err.exit());

    if cli.help {
        eprintln!("{}", Cli::command().render_help());
        return;
    }

    logging::setup_logging(&cli.log_level);

    if cli.list {
        println!("{}", list_platforms_devices());
        return;
    }

    let config = cli.into_config();
    if let Err(err) = pipeline::run(&config) {
        eprintln!("ERROR: {err}");
    }
}
