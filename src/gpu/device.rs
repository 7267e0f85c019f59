// gpu/device.rs — platform/device selection and the wgpu session.
//
// Responsibilities:
//   - Enumerate adapters across every wgpu backend and group them into
//     "platforms" (one per backend that has at least one adapter).
//   - Resolve a (platform index, device index) pair to one adapter, the
//     same way the command line addresses it.
//   - Open the device and its single in-order queue, enabling timestamp
//     queries when the adapter supports them.
//   - Produce the `-l` listing.
//
// PLATFORM ORDER:
// Platforms are listed in a fixed backend order (Vulkan, Metal, DX12, GL)
// so `-p 0` names the same backend on every run of the same machine.
// Adapters keep the order wgpu enumerates them in within a backend.
//
// WORKGROUP SIZE:
// Every histogram-equalization kernel runs 1D workgroups of 256
// invocations. The scan kernel needs exactly one workgroup covering all
// 256 bins, so an adapter that cannot run 256 invocations per workgroup
// is rejected here rather than failing at dispatch time.

use std::fmt;

use tracing::{debug, info};

/// Invocations per workgroup for every equalization kernel.
pub const WORKGROUP_SIZE: u32 = 256;

/// Backends in platform-index order.
const PLATFORM_ORDER: [wgpu::Backend; 4] = [
    wgpu::Backend::Vulkan,
    wgpu::Backend::Metal,
    wgpu::Backend::Dx12,
    wgpu::Backend::Gl,
];

// ============================================================
// Adapter info
// ============================================================

/// Cached adapter information for logging and listing.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
    pub driver: String,
    pub driver_info: String,
}

impl From<wgpu::AdapterInfo> for AdapterInfo {
    fn from(raw: wgpu::AdapterInfo) -> Self {
        AdapterInfo {
            name: raw.name,
            vendor: raw.vendor,
            device: raw.device,
            device_type: raw.device_type,
            backend: raw.backend,
            driver: raw.driver,
            driver_info: raw.driver_info,
        }
    }
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// Display name of a backend, used as the platform name.
pub fn platform_name(backend: wgpu::Backend) -> &'static str {
    match backend {
        wgpu::Backend::Vulkan => "Vulkan",
        wgpu::Backend::Metal => "Metal",
        wgpu::Backend::Dx12 => "DirectX 12",
        wgpu::Backend::Gl => "OpenGL",
        wgpu::Backend::BrowserWebGpu => "WebGPU",
        _ => "Unknown",
    }
}

/// Group items by backend in platform order, dropping backends with no
/// items. Order within a backend is preserved.
pub fn group_by_platform<T>(items: Vec<(wgpu::Backend, T)>) -> Vec<(wgpu::Backend, Vec<T>)> {
    let mut groups: Vec<(wgpu::Backend, Vec<T>)> =
        PLATFORM_ORDER.iter().map(|&b| (b, Vec::new())).collect();
    for (backend, item) in items {
        if let Some((_, group)) = groups.iter_mut().find(|(b, _)| *b == backend) {
            group.push(item);
        }
    }
    groups.retain(|(_, group)| !group.is_empty());
    groups
}

// ============================================================
// Instance / enumeration
// ============================================================

fn create_instance() -> wgpu::Instance {
    let flags = if cfg!(debug_assertions) {
        wgpu::InstanceFlags::VALIDATION
            | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
    } else {
        wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
    };
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags,
        ..Default::default()
    })
}

fn enumerate_platforms(instance: &wgpu::Instance) -> Vec<(wgpu::Backend, Vec<wgpu::Adapter>)> {
    let adapters = instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .map(|a| (a.get_info().backend, a))
        .collect();
    group_by_platform(adapters)
}

/// Describe every platform and device, one line each.
pub fn list_platforms_devices() -> String {
    let instance = create_instance();
    let platforms = enumerate_platforms(&instance);
    if platforms.is_empty() {
        return "No compute platforms found.".to_string();
    }

    let mut out = String::new();
    for (p, (backend, adapters)) in platforms.iter().enumerate() {
        out.push_str(&format!("Platform {p}, {}\n", platform_name(*backend)));
        for (d, adapter) in adapters.iter().enumerate() {
            let info = AdapterInfo::from(adapter.get_info());
            out.push_str(&format!(
                "  Device {d}, {}, {:?}, driver: {} {}\n",
                info.name, info.device_type, info.driver, info.driver_info
            ));
        }
    }
    out
}

// ============================================================
// GpuDevice
// ============================================================

/// The accelerator session: device, queue and what was selected.
///
/// # Field drop order
/// `_instance` is declared last so the `wgpu::Instance` outlives `device`
/// and `queue`.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    pub platform_index: usize,
    pub device_index: usize,
    /// Nanoseconds per timestamp tick, when timestamp queries are enabled.
    pub timestamp_period: Option<f32>,
    pub max_workgroups_per_dim: u32,
    /// Largest storage buffer a single binding may cover, in bytes.
    pub max_storage_binding: u64,
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Open the adapter at `device_index` on platform `platform_index`.
    pub fn new(platform_index: usize, device_index: usize) -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async(platform_index, device_index))
    }

    async fn init_async(platform_index: usize, device_index: usize) -> Result<Self, GpuError> {
        let instance = create_instance();
        let mut platforms = enumerate_platforms(&instance);

        if platforms.is_empty() {
            return Err(GpuError::NoSuitableAdapter);
        }
        let platform_count = platforms.len();
        if platform_index >= platform_count {
            return Err(GpuError::PlatformOutOfRange {
                index: platform_index,
                count: platform_count,
            });
        }

        let (backend, mut adapters) = platforms.swap_remove(platform_index);
        let device_count = adapters.len();
        if device_index >= device_count {
            return Err(GpuError::DeviceOutOfRange {
                platform: platform_name(backend),
                index: device_index,
                count: device_count,
            });
        }
        let adapter = adapters.swap_remove(device_index);
        let adapter_info = AdapterInfo::from(adapter.get_info());
        debug!(adapter = %adapter_info, "selected adapter");

        let limits = adapter.limits();
        if limits.max_compute_invocations_per_workgroup < WORKGROUP_SIZE
            || limits.max_compute_workgroup_size_x < WORKGROUP_SIZE
        {
            return Err(GpuError::WorkgroupTooLarge {
                total: WORKGROUP_SIZE,
                max: limits
                    .max_compute_invocations_per_workgroup
                    .min(limits.max_compute_workgroup_size_x),
            });
        }

        let supports_timestamps = adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY);
        let required_features = if supports_timestamps {
            wgpu::Features::TIMESTAMP_QUERY
        } else {
            info!("adapter has no timestamp queries; kernel times fall back to host clocks");
            wgpu::Features::empty()
        };

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("histeq-gpu"),
                    required_features,
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceRequest)?;

        let timestamp_period = supports_timestamps.then(|| queue.get_timestamp_period());

        Ok(GpuDevice {
            device,
            queue,
            adapter_info,
            platform_index,
            device_index,
            timestamp_period,
            max_workgroups_per_dim: limits.max_compute_workgroups_per_dimension,
            max_storage_binding: limits.max_storage_buffer_binding_size as u64,
            _instance: instance,
        })
    }

    pub fn platform_name(&self) -> &'static str {
        platform_name(self.adapter_info.backend)
    }

    pub fn device_name(&self) -> &str {
        &self.adapter_info.name
    }

    /// Workgroup grid covering `invocations` 1D work-items.
    ///
    /// Grids wider than the per-dimension limit wrap into a second
    /// dimension; kernels linearize with `gid.x + gid.y * nwg.x * 256` and
    /// guard against the overshoot.
    pub fn dispatch_size(&self, invocations: u32) -> (u32, u32) {
        dispatch_grid(invocations, self.max_workgroups_per_dim)
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ platform {}: {}, device {}: {} }}",
            self.platform_index,
            self.platform_name(),
            self.device_index,
            self.adapter_info
        )
    }
}

/// Workgroup grid for `invocations` work-items of `WORKGROUP_SIZE`, with
/// at most `max_per_dim` workgroups along x.
pub fn dispatch_grid(invocations: u32, max_per_dim: u32) -> (u32, u32) {
    let groups = invocations.div_ceil(WORKGROUP_SIZE).max(1);
    if groups <= max_per_dim {
        (groups, 1)
    } else {
        (max_per_dim, groups.div_ceil(max_per_dim))
    }
}

// ============================================================
// Error type
// ============================================================

/// Errors from the accelerator session and the kernels it runs.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no compute adapter found on any backend")]
    NoSuitableAdapter,
    #[error("platform index {index} out of range ({count} platform(s) available)")]
    PlatformOutOfRange { index: usize, count: usize },
    #[error("device index {index} out of range ({count} device(s) on platform {platform})")]
    DeviceOutOfRange {
        platform: &'static str,
        index: usize,
        count: usize,
    },
    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
    #[error("workgroup size {total} exceeds adapter limit of {max} invocations")]
    WorkgroupTooLarge { total: u32, max: u32 },
    #[error("kernel {kernel} failed to build")]
    Build {
        kernel: &'static str,
        log: crate::gpu::program::BuildLog,
    },
    #[error("{stage} stage rejected by the device: {message}")]
    Validation { stage: &'static str, message: String },
    #[error("image too large for one dispatch: {pixels} pixels")]
    ImageTooLarge { pixels: usize },
    #[error("buffer readback failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),
    #[error("buffer readback callback never fired")]
    MapCallbackLost,
}
