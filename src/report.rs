// report.rs — the stdout report and the optional per-bin CSV.
//
// For each stage the report prints the stage's array (the reprojected
// image is not printed), the kernel time in nanoseconds and the
// upload/execute/readback breakdown in microseconds:
//
//   Histogram = [2, 0, ..., 2]
//   Histogram kernel execution time [ns]: 5120
//   Upload 31, Executed 92, Readback 40, Total 163 [us]

use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::histeq::Equalization;
use crate::profile::{Stage, StageProfile};

/// `[a, b, c]`.
pub fn format_array<T: Display>(values: &[T]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}

fn stage_array(eq: &Equalization, stage: Stage) -> Option<String> {
    match stage {
        Stage::Histogram => Some(format_array(eq.histogram.counts())),
        Stage::Cumulative => Some(format_array(eq.cumulative.counts())),
        Stage::LookupTable => Some(format_array(eq.lut.values())),
        Stage::Reproject => None,
    }
}

/// Write the stage arrays and timings.
pub fn write_report<W: Write>(mut out: W, eq: &Equalization, profiles: &[StageProfile]) -> io::Result<()> {
    for stage in Stage::ALL {
        writeln!(out)?;
        if let Some(array) = stage_array(eq, stage) {
            writeln!(out, "{} = {}", stage.label(), array)?;
        }
        if let Some(profile) = profiles.iter().find(|p| p.stage == stage) {
            writeln!(
                out,
                "{} kernel execution time [ns]: {}",
                stage.label(),
                profile.kernel_ns()
            )?;
            writeln!(out, "{}", profile.full_info())?;
        }
    }
    out.flush()
}

/// One `bin,count,cumulative,lut` row per bin, with a header.
pub fn write_csv<W: Write>(mut out: W, eq: &Equalization) -> io::Result<()> {
    writeln!(out, "bin,count,cumulative,lut")?;
    let rows = eq
        .histogram
        .counts()
        .iter()
        .zip(eq.cumulative.counts())
        .zip(eq.lut.values());
    for (bin, ((count, cumulative), lut)) in rows.enumerate() {
        writeln!(out, "{bin},{count},{cumulative},{lut}")?;
    }
    out.flush()
}

pub fn write_csv_file(path: &Path, eq: &Equalization) -> io::Result<()> {
    write_csv(BufWriter::new(File::create(path)?), eq)
}
