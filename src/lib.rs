// histeq-gpu: four-stage histogram equalization on a compute accelerator
//
// histogram (atomic scatter) → cumulative histogram (Hillis–Steele scan)
// → normalized lookup table → per-pixel reprojection. Colour images are
// equalized on the luma plane of a BT.601 YCbCr decomposition.
//
// The CPU stages in `histeq` are the reference the wgpu kernels in `gpu`
// are checked against.

pub mod color;
pub mod config;
pub mod display;
pub mod error;
pub mod gpu;
pub mod histeq;
pub mod image;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod profile;
pub mod report;

pub use config::{EqualizerConfig, Engine};
pub use error::EqualizeError;
pub use histeq::{equalize, BinCount, Equalization};
