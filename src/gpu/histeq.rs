// gpu/histeq.rs — the four equalization stages as compute kernels.
//
// BUFFER CHOREOGRAPHY
// ───────────────────
//   pixels      (packed u32, read)    ← uploaded from the host plane
//   hist        (N × u32)             ← cleared, hist_simple scatters into it
//   cumulative  (N × u32)             ← cleared, scan_hs reads hist
//   lut         (N × u32)             ← cleared, build_lut reads cumulative
//   output      (packed u32)          ← reproject reads pixels + lut
//
// Every stage is submitted on its own and the host waits for the device
// to go idle before reading the stage's result back. The host copies are
// authoritative; device buffers are dropped when `run` returns.
//
// Each submission runs inside a validation error scope, so a rejected
// dispatch comes back as `GpuError::Validation` naming the stage.
//
// With timestamp queries enabled, every compute pass writes a begin/end
// pair into one query set which is resolved after the last stage.

use std::time::{Duration, Instant};

use bytemuck::{Pod, Zeroable};
use tracing::{debug, info};

use crate::gpu::buffer::{self, pack_bytes, unpack_bytes};
use crate::gpu::device::{GpuDevice, GpuError};
use crate::gpu::program::{build_kernel, Binding, Kernel, KernelSource};
use crate::histeq::{BinCount, CumulativeHistogram, Equalization, Histogram, LookupTable};
use crate::image::Image;
use crate::profile::{ticks_to_ns, Stage, StageProfile};

/// Uniform block shared by all four kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct HistEqParams {
    pub pixel_count: u32,
    pub bins: u32,
    /// Number of packed u32 words holding the pixels.
    pub word_count: u32,
    pub _pad: u32,
}

const HISTOGRAM: KernelSource = KernelSource {
    name: "hist_simple",
    file: "histogram.wgsl",
    template: include_str!("../shaders/histogram.wgsl"),
    bindings: &[Binding::Uniform, Binding::StorageRead, Binding::StorageReadWrite],
};

const SCAN: KernelSource = KernelSource {
    name: "scan_hs",
    file: "scan.wgsl",
    template: include_str!("../shaders/scan.wgsl"),
    bindings: &[Binding::Uniform, Binding::StorageRead, Binding::StorageReadWrite],
};

const LUT: KernelSource = KernelSource {
    name: "build_lut",
    file: "lut.wgsl",
    template: include_str!("../shaders/lut.wgsl"),
    bindings: &[Binding::Uniform, Binding::StorageRead, Binding::StorageReadWrite],
};

const REPROJECT: KernelSource = KernelSource {
    name: "reproject",
    file: "reproject.wgsl",
    template: include_str!("../shaders/reproject.wgsl"),
    bindings: &[
        Binding::Uniform,
        Binding::StorageRead,
        Binding::StorageRead,
        Binding::StorageReadWrite,
    ],
};

/// Every kernel this module builds, in stage order.
pub const KERNELS: [KernelSource; 4] = [HISTOGRAM, SCAN, LUT, REPROJECT];

/// Result of one accelerated run: the stage outputs plus their timings.
#[derive(Debug, Clone)]
pub struct GpuEqualization {
    pub equalization: Equalization,
    pub profiles: Vec<StageProfile>,
}

/// The compiled equalization pipeline.
///
/// Build once per device; [`run`](GpuHistEq::run) may be called any
/// number of times.
pub struct GpuHistEq {
    histogram: Kernel,
    scan: Kernel,
    lut: Kernel,
    reproject: Kernel,
}

impl GpuHistEq {
    /// Compile all four kernels. The first build failure is returned.
    pub fn new(gpu: &GpuDevice) -> Result<Self, GpuError> {
        let histeq = GpuHistEq {
            histogram: build_kernel(gpu, &HISTOGRAM)?,
            scan: build_kernel(gpu, &SCAN)?,
            lut: build_kernel(gpu, &LUT)?,
            reproject: build_kernel(gpu, &REPROJECT)?,
        };
        info!(kernels = KERNELS.len(), "kernels built");
        Ok(histeq)
    }

    /// Equalize one 8-bit plane on the device.
    pub fn run(
        &self,
        gpu: &GpuDevice,
        image: &Image<u8>,
        bins: BinCount,
    ) -> Result<GpuEqualization, GpuError> {
        let pixel_count = image.len();
        let word_len = pixel_count.div_ceil(4);
        if u32::try_from(pixel_count).is_err()
            || (word_len.max(1) * std::mem::size_of::<u32>()) as u64 > gpu.max_storage_binding
        {
            return Err(GpuError::ImageTooLarge { pixels: pixel_count });
        }

        let n = bins.get();
        let params = HistEqParams {
            pixel_count: pixel_count as u32,
            bins: n as u32,
            word_count: word_len as u32,
            _pad: 0,
        };
        debug!(?params, "equalizing on device");

        let mut profiles: Vec<StageProfile> = Stage::ALL.iter().map(|&s| StageProfile::new(s)).collect();
        let timestamps = Timestamps::new(gpu);

        // Upload.
        let t = Instant::now();
        let mut words = pack_bytes(image.as_slice());
        if words.is_empty() {
            words.push(0);
        }
        let params_buf = buffer::uniform(gpu, "histeq params", &params);
        let pixels_buf = buffer::storage_from(gpu, "pixels", &words);
        let hist_buf = buffer::storage_u32(gpu, "histogram", n);
        let cumulative_buf = buffer::storage_u32(gpu, "cumulative", n);
        let lut_buf = buffer::storage_u32(gpu, "lut", n);
        let output_buf = buffer::storage_u32(gpu, "output", words.len());
        profiles[Stage::Histogram.index()].upload = t.elapsed();

        let pixel_grid = gpu.dispatch_size(params.pixel_count);
        let word_grid = gpu.dispatch_size(params.word_count);

        // Stage 1: histogram.
        let bind = bind_group(gpu, &self.histogram, &[&params_buf, &pixels_buf, &hist_buf]);
        profiles[0].execute = submit_stage(
            gpu,
            Stage::Histogram,
            &self.histogram,
            &bind,
            pixel_grid,
            &hist_buf,
            timestamps.as_ref(),
        )?;
        let (counts, elapsed) = timed(|| buffer::read_buffer::<u32>(gpu, &hist_buf, n));
        profiles[0].readback = elapsed;
        let histogram = Histogram::from_counts(counts?);

        // Stage 2: cumulative histogram.
        let bind = bind_group(gpu, &self.scan, &[&params_buf, &hist_buf, &cumulative_buf]);
        profiles[1].execute = submit_stage(
            gpu,
            Stage::Cumulative,
            &self.scan,
            &bind,
            (1, 1),
            &cumulative_buf,
            timestamps.as_ref(),
        )?;
        let (counts, elapsed) = timed(|| buffer::read_buffer::<u32>(gpu, &cumulative_buf, n));
        profiles[1].readback = elapsed;
        let cumulative = CumulativeHistogram::from_counts(counts?);

        // Stage 3: lookup table.
        let bind = bind_group(gpu, &self.lut, &[&params_buf, &cumulative_buf, &lut_buf]);
        profiles[2].execute = submit_stage(
            gpu,
            Stage::LookupTable,
            &self.lut,
            &bind,
            (1, 1),
            &lut_buf,
            timestamps.as_ref(),
        )?;
        let (entries, elapsed) = timed(|| buffer::read_buffer::<u32>(gpu, &lut_buf, n));
        profiles[2].readback = elapsed;
        let lut = LookupTable::from_entries(entries?);

        // Stage 4: reprojection.
        let bind = bind_group(
            gpu,
            &self.reproject,
            &[&params_buf, &pixels_buf, &lut_buf, &output_buf],
        );
        profiles[3].execute = submit_stage(
            gpu,
            Stage::Reproject,
            &self.reproject,
            &bind,
            word_grid,
            &output_buf,
            timestamps.as_ref(),
        )?;
        let (packed, elapsed) = timed(|| buffer::read_buffer::<u32>(gpu, &output_buf, word_len));
        profiles[3].readback = elapsed;
        let output = Image::from_vec(image.width(), image.height(), unpack_bytes(&packed?, pixel_count));

        if let Some(ts) = &timestamps {
            for (profile, ns) in profiles.iter_mut().zip(ts.read(gpu)?) {
                profile.device_ns = Some(ns);
            }
        }

        Ok(GpuEqualization {
            equalization: Equalization {
                histogram,
                cumulative,
                lut,
                output,
            },
            profiles,
        })
    }
}

fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let t = Instant::now();
    let value = f();
    (value, t.elapsed())
}

fn bind_group(gpu: &GpuDevice, kernel: &Kernel, buffers: &[&wgpu::Buffer]) -> wgpu::BindGroup {
    let entries: Vec<wgpu::BindGroupEntry> = buffers
        .iter()
        .enumerate()
        .map(|(i, buf)| wgpu::BindGroupEntry {
            binding: i as u32,
            resource: buf.as_entire_binding(),
        })
        .collect();
    gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(kernel.name),
        layout: &kernel.layout,
        entries: &entries,
    })
}

/// Clear `target`, dispatch `kernel` over `grid` workgroups and wait for
/// the device to go idle. Returns the host-side execution time.
fn submit_stage(
    gpu: &GpuDevice,
    stage: Stage,
    kernel: &Kernel,
    bind: &wgpu::BindGroup,
    grid: (u32, u32),
    target: &wgpu::Buffer,
    timestamps: Option<&Timestamps>,
) -> Result<Duration, GpuError> {
    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(stage.label()),
        });
    encoder.clear_buffer(target, 0, None);
    {
        let timestamp_writes = timestamps.map(|ts| ts.writes_for(stage));
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(kernel.name),
            timestamp_writes,
        });
        pass.set_pipeline(&kernel.pipeline);
        pass.set_bind_group(0, bind, &[]);
        pass.dispatch_workgroups(grid.0, grid.1, 1);
    }

    let t = Instant::now();
    gpu.queue.submit(std::iter::once(encoder.finish()));
    gpu.device.poll(wgpu::Maintain::Wait);
    let elapsed = t.elapsed();

    if let Some(err) = pollster::block_on(gpu.device.pop_error_scope()) {
        return Err(GpuError::Validation {
            stage: stage.label(),
            message: err.to_string(),
        });
    }
    debug!(stage = stage.label(), ?grid, ?elapsed, "stage complete");
    Ok(elapsed)
}

/// Begin/end timestamp pairs for the four stages.
struct Timestamps {
    query_set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    period: f32,
}

impl Timestamps {
    const COUNT: u32 = 2 * Stage::ALL.len() as u32;

    fn new(gpu: &GpuDevice) -> Option<Self> {
        let period = gpu.timestamp_period?;
        let query_set = gpu.device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("stage timestamps"),
            ty: wgpu::QueryType::Timestamp,
            count: Self::COUNT,
        });
        let resolve = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("timestamp resolve"),
            size: Self::COUNT as u64 * std::mem::size_of::<u64>() as u64,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        Some(Timestamps {
            query_set,
            resolve,
            period,
        })
    }

    fn writes_for(&self, stage: Stage) -> wgpu::ComputePassTimestampWrites<'_> {
        let base = 2 * stage.index() as u32;
        wgpu::ComputePassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: Some(base),
            end_of_pass_write_index: Some(base + 1),
        }
    }

    /// Kernel time of each stage in nanoseconds, in stage order.
    fn read(&self, gpu: &GpuDevice) -> Result<Vec<u64>, GpuError> {
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("timestamp resolve"),
            });
        encoder.resolve_query_set(&self.query_set, 0..Self::COUNT, &self.resolve, 0);
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let ticks = buffer::read_buffer::<u64>(gpu, &self.resolve, Self::COUNT as usize)?;
        Ok(ticks
            .chunks_exact(2)
            .map(|pair| ticks_to_ns(pair[0], pair[1], self.period))
            .collect())
    }
}
