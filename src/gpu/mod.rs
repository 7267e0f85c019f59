// gpu/mod.rs — wgpu compute backend.
//
// The four equalization stages run here as WGSL kernels that mirror the
// CPU functions in `crate::histeq` stage for stage. The CPU functions stay
// the authoritative reference; the kernels are checked against them.
//
//   device    platform/device selection, the session, `GpuError`
//   program   kernel source expansion and compilation with build logs
//   buffer    packing, upload and blocking readback
//   histeq    stage dispatch and buffer choreography

pub mod buffer;
pub mod device;
pub mod histeq;
pub mod program;

pub use device::{list_platforms_devices, GpuDevice, GpuError};
pub use histeq::{GpuEqualization, GpuHistEq};
