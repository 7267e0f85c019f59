// profile.rs — per-stage timing.
//
// Each stage records the device kernel time (from timestamp queries when
// the adapter has them) and the host-side wall time of its three phases:
// upload, execution (submit until the device is idle) and readback.

use std::fmt;
use std::time::Duration;

/// The four equalization stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Histogram,
    Cumulative,
    LookupTable,
    Reproject,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Histogram,
        Stage::Cumulative,
        Stage::LookupTable,
        Stage::Reproject,
    ];

    /// Name used in the report lines.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Histogram => "Histogram",
            Stage::Cumulative => "Cumulative Histogram",
            Stage::LookupTable => "LUT",
            Stage::Reproject => "Reproject",
        }
    }

    /// Position in [`Stage::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Timing of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageProfile {
    pub stage: Stage,
    /// Device-measured kernel time, if timestamp queries were available.
    pub device_ns: Option<u64>,
    pub upload: Duration,
    pub execute: Duration,
    pub readback: Duration,
}

impl StageProfile {
    pub fn new(stage: Stage) -> Self {
        StageProfile {
            stage,
            device_ns: None,
            upload: Duration::ZERO,
            execute: Duration::ZERO,
            readback: Duration::ZERO,
        }
    }

    /// Kernel execution time in nanoseconds. Falls back to the host-side
    /// execution time when the device did not report one.
    pub fn kernel_ns(&self) -> u64 {
        self.device_ns
            .unwrap_or_else(|| self.execute.as_nanos().min(u64::MAX as u128) as u64)
    }

    pub fn total(&self) -> Duration {
        self.upload + self.execute + self.readback
    }

    /// One-line breakdown in microseconds.
    pub fn full_info(&self) -> String {
        format!(
            "Upload {}, Executed {}, Readback {}, Total {} [us]",
            self.upload.as_micros(),
            self.execute.as_micros(),
            self.readback.as_micros(),
            self.total().as_micros()
        )
    }
}

/// Convert a pair of raw timestamps to nanoseconds.
///
/// `period` is nanoseconds per tick. A reversed pair (possible when the
/// counter wraps or the driver reorders) yields zero.
pub fn ticks_to_ns(begin: u64, end: u64, period: f32) -> u64 {
    (end.saturating_sub(begin) as f64 * period as f64).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_ns_prefers_device_time() {
        let mut p = StageProfile::new(Stage::Histogram);
        p.execute = Duration::from_micros(40);
        assert_eq!(p.kernel_ns(), 40_000);
        p.device_ns = Some(1234);
        assert_eq!(p.kernel_ns(), 1234);
    }

    #[test]
    fn test_full_info_in_microseconds() {
        let p = StageProfile {
            stage: Stage::Reproject,
            device_ns: None,
            upload: Duration::from_micros(10),
            execute: Duration::from_micros(25),
            readback: Duration::from_micros(5),
        };
        assert_eq!(p.full_info(), "Upload 10, Executed 25, Readback 5, Total 40 [us]");
    }

    #[test]
    fn test_ticks_to_ns() {
        assert_eq!(ticks_to_ns(100, 300, 1.0), 200);
        assert_eq!(ticks_to_ns(100, 300, 2.5), 500);
        assert_eq!(ticks_to_ns(300, 100, 1.0), 0);
    }

    #[test]
    fn test_stage_order() {
        let labels: Vec<_> = Stage::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(labels, ["Histogram", "Cumulative Histogram", "LUT", "Reproject"]);
        assert_eq!(Stage::Reproject.index(), 3);
    }
}
