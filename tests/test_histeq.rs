// tests/test_histeq.rs — Integration tests for the four CPU stages.

use histeq_gpu::histeq::{self, equalize, BinCount, LookupTable};
use histeq_gpu::image::Image;

fn textured(w: usize, h: usize) -> Image<u8> {
    let mut img = Image::new(w, h);
    for y in 0..h {
        for x in 0..w {
            img.set(x, y, ((x * 7 + y * 13) % 97 + 60) as u8);
        }
    }
    img
}

// ===== Stage invariants =====

#[test]
fn histogram_sums_to_pixel_count_for_every_bin_count() {
    let img = textured(37, 23);
    for n in [1i64, 2, 5, 17, 100, 255, 256] {
        let hist = histeq::histogram(&img, BinCount::new(n).unwrap());
        assert_eq!(hist.len(), n as usize);
        assert_eq!(hist.total(), (37 * 23) as u64, "bins = {n}");
    }
}

#[test]
fn cumulative_is_non_decreasing_and_ends_at_total() {
    let img = textured(64, 48);
    let eq = equalize(&img, BinCount::new(40).unwrap());
    let c = eq.cumulative.counts();
    assert!(c.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(eq.cumulative.total(), 64 * 48);
}

#[test]
fn cumulative_is_inclusive_prefix_sum() {
    let img = textured(20, 20);
    let eq = equalize(&img, BinCount::FULL);
    let mut running = 0u32;
    for (h, c) in eq.histogram.counts().iter().zip(eq.cumulative.counts()) {
        running += h;
        assert_eq!(*c, running);
    }
}

#[test]
fn lut_is_non_decreasing_and_spans_range() {
    let img = textured(64, 48);
    let eq = equalize(&img, BinCount::FULL);
    let lut = eq.lut.values();
    assert!(lut.windows(2).all(|w| w[0] <= w[1]));
    // The darkest occupied bin maps to 0, the last bin to 255.
    let first = eq.histogram.counts().iter().position(|&c| c > 0).unwrap();
    assert_eq!(lut[first], 0);
    assert_eq!(lut[255], 255);
}

#[test]
fn output_is_lut_of_bin() {
    let img = textured(31, 17);
    let bins = BinCount::new(12).unwrap();
    let eq = equalize(&img, bins);
    for (&v, &out) in img.as_slice().iter().zip(eq.output.as_slice()) {
        assert_eq!(out, eq.lut.values()[bins.bin_of(v)]);
    }
}

// ===== Worked examples =====

#[test]
fn two_by_two_saturated_example() {
    let img = Image::from_vec(2, 2, vec![0u8, 0, 255, 255]);
    let eq = equalize(&img, BinCount::FULL);

    let hist = eq.histogram.counts();
    assert_eq!(hist[0], 2);
    assert_eq!(hist[255], 2);
    assert_eq!(hist.iter().filter(|&&c| c > 0).count(), 2);

    let cum = eq.cumulative.counts();
    assert!(cum[..255].iter().all(|&c| c == 2));
    assert_eq!(cum[255], 4);

    let lut = eq.lut.values();
    assert_eq!((lut[0], lut[255]), (0, 255));
    assert!(lut.iter().all(|&v| v == 0 || v == 255));

    assert_eq!(eq.output.as_slice(), &[0, 0, 255, 255]);
}

#[test]
fn uniform_image_is_unchanged() {
    for v in [0u8, 17, 200, 255] {
        let img = Image::filled(8, 8, v);
        let eq = equalize(&img, BinCount::FULL);
        let occupied: Vec<usize> = (0..256).filter(|&i| eq.histogram.counts()[i] > 0).collect();
        assert_eq!(occupied, vec![v as usize]);
        assert!(eq.output.as_slice().iter().all(|&o| o == v), "value {v}");
    }
}

#[test]
fn single_bin_maps_everything_to_zero_edge() {
    let img = textured(10, 10);
    let eq = equalize(&img, BinCount::new(1).unwrap());
    assert_eq!(eq.histogram.counts(), &[100]);
    assert_eq!(eq.lut.values(), &[0]);
    assert!(eq.output.as_slice().iter().all(|&o| o == 0));
}

#[test]
fn dark_image_is_brightened() {
    let img = Image::from_vec(16, 1, (0..16).map(|x| (x * 2) as u8).collect());
    let eq = equalize(&img, BinCount::FULL);
    assert_eq!(eq.output.get(0, 0), 0);
    assert_eq!(eq.output.get(15, 0), 255);
    assert!(eq.output.get(8, 0) > 100);
}

#[test]
fn reproject_uses_supplied_table() {
    let img = Image::from_vec(4, 1, vec![0u8, 100, 200, 255]);
    let bins = BinCount::new(2).unwrap();
    let lut = LookupTable::from_entries(vec![7, 9]);
    let out = histeq::reproject(&img, &lut, bins);
    assert_eq!(out.as_slice(), &[7, 7, 9, 9]);
}
