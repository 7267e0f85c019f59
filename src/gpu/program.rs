// gpu/program.rs — kernel source assembly and compilation.
//
// Each equalization stage is one WGSL file under src/shaders/, embedded
// with `include_str!`. Before compilation the `{{WG_SIZE}}` placeholder is
// replaced with the workgroup size; the substitutions applied are the
// kernel's "build options".
//
// Compilation happens inside a validation error scope. wgpu's default
// behaviour on a bad shader is to panic from the uncaptured-error
// handler; inside the scope the error is returned instead, and together
// with the shader compiler's messages becomes the build log. A failed
// build prints status, options and log to stdout and is fatal.

use std::fmt;

use tracing::{debug, warn};

use crate::gpu::device::{GpuDevice, GpuError, WORKGROUP_SIZE};

/// Which buffer a kernel binding expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Uniform,
    StorageRead,
    StorageReadWrite,
}

/// Source and interface of one compute kernel.
#[derive(Debug, Clone, Copy)]
pub struct KernelSource {
    /// Entry point name, also used as the label.
    pub name: &'static str,
    pub file: &'static str,
    pub template: &'static str,
    /// Binding types for @group(0), indexed by binding number.
    pub bindings: &'static [Binding],
}

impl KernelSource {
    /// Placeholder substitutions applied before compilation.
    pub fn build_options(&self) -> Vec<(&'static str, String)> {
        vec![("{{WG_SIZE}}", WORKGROUP_SIZE.to_string())]
    }

    /// Source text with every placeholder substituted.
    pub fn expand(&self) -> String {
        self.build_options()
            .iter()
            .fold(self.template.to_string(), |src, (key, value)| src.replace(key, value))
    }
}

/// Outcome of a kernel build, printed verbatim when it fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLog {
    pub status: BuildStatus,
    pub options: String,
    pub log: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Success,
    Error,
}

impl fmt::Display for BuildLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Build Status: {:?}", self.status)?;
        writeln!(f, "Build Options:\t{}", self.options)?;
        write!(f, "Build Log:\t {}", self.log)
    }
}

/// A compiled kernel ready for dispatch.
pub struct Kernel {
    pub name: &'static str,
    pub pipeline: wgpu::ComputePipeline,
    pub layout: wgpu::BindGroupLayout,
}

fn layout_entry(binding: u32, kind: Binding) -> wgpu::BindGroupLayoutEntry {
    let ty = match kind {
        Binding::Uniform => wgpu::BufferBindingType::Uniform,
        Binding::StorageRead => wgpu::BufferBindingType::Storage { read_only: true },
        Binding::StorageReadWrite => wgpu::BufferBindingType::Storage { read_only: false },
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn format_options(options: &[(&'static str, String)]) -> String {
    options
        .iter()
        .map(|(key, value)| {
            let name = key.trim_start_matches("{{").trim_end_matches("}}");
            format!("{name}={value}")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compile one kernel and create its pipeline.
///
/// On failure the build status, options and log are printed before the
/// error is returned.
pub fn build_kernel(gpu: &GpuDevice, source: &KernelSource) -> Result<Kernel, GpuError> {
    let options = format_options(&source.build_options());
    debug!(kernel = source.name, file = source.file, %options, "building kernel");

    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(source.file),
        source: wgpu::ShaderSource::Wgsl(source.expand().into()),
    });

    let entries: Vec<wgpu::BindGroupLayoutEntry> = source
        .bindings
        .iter()
        .enumerate()
        .map(|(i, &kind)| layout_entry(i as u32, kind))
        .collect();
    let layout = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(source.name),
        entries: &entries,
    });
    let pipeline_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(source.name),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });
    let pipeline = gpu.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(source.name),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: source.name,
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });

    let info = pollster::block_on(module.get_compilation_info());
    let scope_error = pollster::block_on(gpu.device.pop_error_scope());

    let mut messages: Vec<String> = info
        .messages
        .iter()
        .map(|m| {
            let at = m
                .location
                .map(|loc| format!("{}:{}:{}: ", source.file, loc.line_number, loc.line_position))
                .unwrap_or_default();
            format!("{at}{:?}: {}", m.message_type, m.message)
        })
        .collect();

    match scope_error {
        None => {
            for message in &messages {
                warn!(kernel = source.name, "{message}");
            }
            Ok(Kernel {
                name: source.name,
                pipeline,
                layout,
            })
        }
        Some(err) => {
            messages.push(err.to_string());
            let log = BuildLog {
                status: BuildStatus::Error,
                options,
                log: messages.join("\n"),
            };
            println!("{log}");
            Err(GpuError::Build {
                kernel: source.name,
                log,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: KernelSource = KernelSource {
        name: "demo",
        file: "demo.wgsl",
        template: "@compute @workgroup_size({{WG_SIZE}}) fn demo() {}",
        bindings: &[Binding::Uniform, Binding::StorageRead],
    };

    #[test]
    fn test_expand_substitutes_workgroup_size() {
        assert_eq!(DEMO.expand(), "@compute @workgroup_size(256) fn demo() {}");
    }

    #[test]
    fn test_format_options() {
        assert_eq!(format_options(&DEMO.build_options()), "WG_SIZE=256");
    }

    #[test]
    fn test_layout_entry_kinds() {
        let e = layout_entry(2, Binding::StorageReadWrite);
        assert_eq!(e.binding, 2);
        assert!(matches!(
            e.ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                ..
            }
        ));
    }

    #[test]
    fn test_build_log_display() {
        let log = BuildLog {
            status: BuildStatus::Error,
            options: "WG_SIZE=256".into(),
            log: "unknown identifier".into(),
        };
        let text = log.to_string();
        assert!(text.contains("Build Status: Error"));
        assert!(text.contains("Build Options:\tWG_SIZE=256"));
        assert!(text.contains("unknown identifier"));
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_broken_kernel_reports_log() {
        let gpu = GpuDevice::new(0, 0).expect("need a GPU adapter");
        let broken = KernelSource {
            name: "broken",
            file: "broken.wgsl",
            template: "@compute @workgroup_size({{WG_SIZE}}) fn broken() { let x = missing; }",
            bindings: &[],
        };
        let err = build_kernel(&gpu, &broken).err().expect("build should fail");
        match err {
            GpuError::Build { kernel, log } => {
                assert_eq!(kernel, "broken");
                assert_eq!(log.status, BuildStatus::Error);
                assert!(!log.log.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
