// tests/test_gpu_histeq.rs — GPU kernels against the CPU reference.
//
// These need a real adapter and are ignored by default:
//   cargo test --test test_gpu_histeq -- --ignored
//
// Histogram and cumulative histogram must match exactly. The LUT divides
// in f32 on both sides, so LUT and output may differ by one level.

use histeq_gpu::gpu::{GpuDevice, GpuError, GpuHistEq};
use histeq_gpu::histeq::{equalize, BinCount};
use histeq_gpu::image::Image;

fn scene(w: usize, h: usize) -> Image<u8> {
    let mut img = Image::new(w, h);
    for y in 0..h {
        for x in 0..w {
            img.set(x, y, ((x * 3 + y * 5) % 120 + 70) as u8);
        }
    }
    img
}

fn open() -> (GpuDevice, GpuHistEq) {
    let gpu = GpuDevice::new(0, 0).expect("need a GPU adapter");
    let kernels = GpuHistEq::new(&gpu).expect("kernels should build");
    (gpu, kernels)
}

fn assert_within_one(a: &[u8], b: &[u8], what: &str) {
    assert_eq!(a.len(), b.len(), "{what} length");
    for (i, (&p, &q)) in a.iter().zip(b).enumerate() {
        assert!((p as i32 - q as i32).abs() <= 1, "{what}[{i}]: gpu {p} vs cpu {q}");
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn gpu_matches_cpu_across_bin_counts() {
    let (gpu, kernels) = open();
    // Odd size so the last packed word is partial.
    let img = scene(333, 211);
    for n in [1i64, 7, 64, 255, 256] {
        let bins = BinCount::new(n).unwrap();
        let cpu = equalize(&img, bins);
        let got = kernels.run(&gpu, &img, bins).unwrap().equalization;

        assert_eq!(got.histogram, cpu.histogram, "histogram, bins = {n}");
        assert_eq!(got.cumulative, cpu.cumulative, "cumulative, bins = {n}");
        assert_within_one(got.lut.values(), cpu.lut.values(), "lut");
        assert_within_one(got.output.as_slice(), cpu.output.as_slice(), "output");
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn gpu_uniform_image_passes_through() {
    let (gpu, kernels) = open();
    let img = Image::filled(17, 9, 140u8);
    let got = kernels.run(&gpu, &img, BinCount::FULL).unwrap();
    assert!(got.equalization.output.as_slice().iter().all(|&v| v == 140));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn gpu_large_image_wraps_dispatch() {
    let (gpu, kernels) = open();
    let img = scene(4096, 4200);
    let got = kernels.run(&gpu, &img, BinCount::FULL).unwrap();
    assert_eq!(got.equalization.histogram.total(), 4096 * 4200);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn gpu_reports_four_stage_profiles() {
    let (gpu, kernels) = open();
    let got = kernels.run(&gpu, &scene(64, 64), BinCount::FULL).unwrap();
    assert_eq!(got.profiles.len(), 4);
    if gpu.timestamp_period.is_some() {
        assert!(got.profiles.iter().all(|p| p.device_ns.is_some()));
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn out_of_range_platform_is_reported() {
    match GpuDevice::new(usize::MAX, 0) {
        Err(GpuError::PlatformOutOfRange { index, .. }) => assert_eq!(index, usize::MAX),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("platform index should be rejected"),
    }
}
