// histeq.rs — Histogram equalization, CPU reference.
//
// Equalization spreads the intensity distribution of a plane so it is
// approximately uniform, stretching contrast in low-contrast images.
// It runs as four stages, each a classic parallel pattern:
//
//   1. histogram   (scatter)   count samples per bin
//   2. cumulative  (scan)      inclusive prefix sum of the histogram
//   3. lookup_table (map)      rescale the CDF into [0, 255]
//   4. reproject   (map)       output[i] = LUT[bin(input[i])]
//
// The functions in this module are the authoritative reference. The
// compute kernels in `gpu::histeq` mirror them stage for stage and are
// validated against them.
//
// BINS:
// The bin count N is chosen per run (1..=256). A sample v falls into bin
// v·N/256, so N = 256 is one bin per intensity and smaller N quantizes.

use std::fmt;
use std::str::FromStr;

use crate::image::Image;

/// Largest supported bin count: one bin per 8-bit intensity.
pub const MAX_BINS: usize = 256;

// ============================================================
// BinCount
// ============================================================

/// A validated bin count in `1..=256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BinCount(u16);

/// Rejected bin count.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BinCountError {
    #[error("Must have between 1 and 256 bins (got {0})")]
    OutOfRange(i64),
    #[error("Must have between 1 and 256 bins (not an integer: {0:?})")]
    NotAnInteger(String),
}

impl BinCount {
    /// One bin per intensity level.
    pub const FULL: BinCount = BinCount(MAX_BINS as u16);

    pub fn new(bins: i64) -> Result<Self, BinCountError> {
        if (1..=MAX_BINS as i64).contains(&bins) {
            Ok(BinCount(bins as u16))
        } else {
            Err(BinCountError::OutOfRange(bins))
        }
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// Bin index of an 8-bit sample.
    #[inline]
    pub fn bin_of(self, value: u8) -> usize {
        value as usize * self.get() / MAX_BINS
    }

    /// Lowest intensity that falls into `bin`.
    #[inline]
    pub fn lower_edge(self, bin: usize) -> u8 {
        let edge = (bin * MAX_BINS).div_ceil(self.get());
        edge.min(255) as u8
    }
}

impl Default for BinCount {
    fn default() -> Self {
        BinCount::FULL
    }
}

impl fmt::Display for BinCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BinCount {
    type Err = BinCountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value: i64 = trimmed
            .parse()
            .map_err(|_| BinCountError::NotAnInteger(trimmed.to_string()))?;
        BinCount::new(value)
    }
}

// ============================================================
// Stage outputs
// ============================================================

/// Per-bin sample counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram(Vec<u32>);

/// Inclusive prefix sum of a [`Histogram`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CumulativeHistogram(Vec<u32>);

/// Per-bin output intensity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable(Vec<u8>);

impl Histogram {
    /// Wrap counts read back from the device.
    pub fn from_counts(counts: Vec<u32>) -> Self {
        Histogram(counts)
    }

    pub fn counts(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all bins (the pixel count of the source plane).
    pub fn total(&self) -> u64 {
        self.0.iter().map(|&c| c as u64).sum()
    }
}

impl CumulativeHistogram {
    pub fn from_counts(counts: Vec<u32>) -> Self {
        CumulativeHistogram(counts)
    }

    pub fn counts(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last element, which equals the pixel count.
    pub fn total(&self) -> u32 {
        self.0.last().copied().unwrap_or(0)
    }

    /// First non-zero cumulative value (0 if every bin is empty).
    pub fn cdf_min(&self) -> u32 {
        self.0.iter().copied().find(|&c| c > 0).unwrap_or(0)
    }
}

impl LookupTable {
    /// Wrap table entries read back from the device. Entries are clamped
    /// to 8 bits.
    pub fn from_entries(entries: Vec<u32>) -> Self {
        LookupTable(entries.into_iter().map(|v| v.min(255) as u8).collect())
    }

    pub fn values(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything the four stages produce for one plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equalization {
    pub histogram: Histogram,
    pub cumulative: CumulativeHistogram,
    pub lut: LookupTable,
    pub output: Image<u8>,
}

// ============================================================
// Stages
// ============================================================

/// Stage 1: count samples per bin.
pub fn histogram(image: &Image<u8>, bins: BinCount) -> Histogram {
    let mut counts = vec![0u32; bins.get()];
    for &v in image.as_slice() {
        counts[bins.bin_of(v)] += 1;
    }
    Histogram(counts)
}

/// Stage 2: inclusive prefix sum, `out[i] = Σ hist[0..=i]`.
pub fn cumulative(hist: &Histogram) -> CumulativeHistogram {
    let mut running = 0u32;
    let counts = hist
        .counts()
        .iter()
        .map(|&c| {
            running += c;
            running
        })
        .collect();
    CumulativeHistogram(counts)
}

/// Stage 3: rescale the cumulative histogram into a [0, 255] table.
///
/// `LUT[i] = round((cdf[i] - cdf_min) / (total - cdf_min) * 255)` where
/// `cdf_min` is the first non-zero cumulative value, so the darkest
/// occupied bin maps to 0 and the brightest to 255.
///
/// When only one bin is occupied the ratio is undefined; every bin then
/// maps to its own lower edge so a uniform plane passes through.
pub fn lookup_table(cdf: &CumulativeHistogram, bins: BinCount) -> LookupTable {
    let total = cdf.total();
    let cdf_min = cdf.cdf_min();

    if total <= cdf_min {
        return LookupTable((0..cdf.len()).map(|i| bins.lower_edge(i)).collect());
    }

    let denom = (total - cdf_min) as f32;
    let values = cdf
        .counts()
        .iter()
        .map(|&c| {
            let scaled = c.saturating_sub(cdf_min) as f32 / denom * 255.0;
            (scaled + 0.5).floor().clamp(0.0, 255.0) as u8
        })
        .collect();
    LookupTable(values)
}

/// Stage 4: map every sample through the table.
pub fn reproject(image: &Image<u8>, lut: &LookupTable, bins: BinCount) -> Image<u8> {
    image.map(|v| lut.values()[bins.bin_of(v)])
}

/// Run all four stages on one plane.
pub fn equalize(image: &Image<u8>, bins: BinCount) -> Equalization {
    let histogram = histogram(image, bins);
    let cumulative = cumulative(&histogram);
    let lut = lookup_table(&cumulative, bins);
    let output = reproject(image, &lut, bins);
    Equalization {
        histogram,
        cumulative,
        lut,
        output,
    }
}
