// gpu/buffer.rs — host ⇄ device buffer transfers.
//
// WGSL has no 8-bit storage type, so an 8-bit plane is uploaded as packed
// u32 words, four samples per word, little-endian within the word
// (sample i lives in bits 8·(i % 4) .. 8·(i % 4) + 8 of word i / 4). The
// tail word is zero-padded; kernels guard on the real pixel count.
//
// Readback goes through a MAP_READ | COPY_DST staging buffer: copy,
// submit, request the map, poll the device until the callback fires.
// Every transfer blocks until the device is idle.

use std::sync::mpsc;

use bytemuck::Pod;
use wgpu::util::DeviceExt;

use crate::gpu::device::{GpuDevice, GpuError};

/// wgpu copy sizes and offsets must be multiples of this.
const COPY_ALIGNMENT: u64 = wgpu::COPY_BUFFER_ALIGNMENT;

/// Round `value` up to the next multiple of `alignment`.
///
///   align_to(1, 4)   = 4
///   align_to(8, 4)   = 8
///   align_to(0, 4)   = 0
#[inline]
pub(crate) fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Pack bytes four to a word, zero-padding the last word.
pub fn pack_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks(4)
        .map(|chunk| {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            u32::from_le_bytes(word)
        })
        .collect()
}

/// Inverse of [`pack_bytes`], keeping the first `len` bytes.
pub fn unpack_bytes(words: &[u32], len: usize) -> Vec<u8> {
    let mut out: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    out.truncate(len);
    out
}

/// Storage buffer initialised from `data`.
pub fn storage_from<T: Pod>(gpu: &GpuDevice, label: &str, data: &[T]) -> wgpu::Buffer {
    gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(data),
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST,
    })
}

/// Uninitialised storage buffer of `len` u32 elements.
pub fn storage_u32(gpu: &GpuDevice, label: &str, len: usize) -> wgpu::Buffer {
    gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: align_to((len.max(1) * std::mem::size_of::<u32>()) as u64, COPY_ALIGNMENT),
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Uniform buffer holding one `#[repr(C)]` value.
pub fn uniform<T: Pod>(gpu: &GpuDevice, label: &str, value: &T) -> wgpu::Buffer {
    gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(value),
        usage: wgpu::BufferUsages::UNIFORM,
    })
}

/// Copy the first `len` elements of `src` back to the host.
///
/// Blocks until the copy has completed and the staging buffer is mapped.
pub fn read_buffer<T: Pod>(gpu: &GpuDevice, src: &wgpu::Buffer, len: usize) -> Result<Vec<T>, GpuError> {
    let byte_len = (len * std::mem::size_of::<T>()) as u64;
    let staging_size = align_to(byte_len.max(COPY_ALIGNMENT), COPY_ALIGNMENT);

    let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback"),
        size: staging_size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback"),
        });
    encoder.copy_buffer_to_buffer(src, 0, &staging, 0, staging_size.min(src.size()));
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    gpu.device.poll(wgpu::Maintain::Wait);
    receiver.recv().map_err(|_| GpuError::MapCallbackLost)??;

    let mapped = slice.get_mapped_range();
    let out = bytemuck::cast_slice::<u8, T>(&mapped[..byte_len as usize]).to_vec();
    drop(mapped);
    staging.unmap();
    Ok(out)
}
