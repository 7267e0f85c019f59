// color.rs — RGB ⇄ YCbCr plane conversions.
//
// Colour input is equalized on luma only. The loader splits RGB into
// Y, Cb and Cr planes, the pipeline equalizes Y, and the recombiner puts
// the untouched chroma planes back before converting to RGB for display.
//
// Coefficients are ITU-R BT.601 studio swing (Y in [16, 235], chroma in
// [16, 240]), the same family as the BT.601 luma weights used for plain
// greyscale conversion. Quantization rounds half up.

use crate::image::Image;

/// Three same-sized RGB planes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbPlanes {
    pub r: Image<u8>,
    pub g: Image<u8>,
    pub b: Image<u8>,
}

/// Luma plus two chroma planes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YCbCrPlanes {
    pub y: Image<u8>,
    pub cb: Image<u8>,
    pub cr: Image<u8>,
}

/// The chroma half of a decomposed colour image, kept aside while the
/// luma plane goes through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromaPlanes {
    pub cb: Image<u8>,
    pub cr: Image<u8>,
}

impl YCbCrPlanes {
    /// Separate the luma plane from the chroma planes.
    pub fn split(self) -> (Image<u8>, ChromaPlanes) {
        (self.y, ChromaPlanes { cb: self.cb, cr: self.cr })
    }
}

#[inline]
fn quantize(v: f32) -> u8 {
    (v + 0.5).floor().clamp(0.0, 255.0) as u8
}

/// Convert one RGB sample to (Y, Cb, Cr).
#[inline]
pub fn rgb_to_ycbcr_pixel(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 16.0 + (65.481 * r + 128.553 * g + 24.966 * b) / 255.0;
    let cb = 128.0 + (-37.797 * r - 74.203 * g + 112.0 * b) / 255.0;
    let cr = 128.0 + (112.0 * r - 93.786 * g - 18.214 * b) / 255.0;
    (quantize(y), quantize(cb), quantize(cr))
}

/// Convert one (Y, Cb, Cr) sample back to RGB.
#[inline]
pub fn ycbcr_to_rgb_pixel(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = 1.164_383 * (y as f32 - 16.0);
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    let r = y + 1.596_027 * cr;
    let g = y - 0.391_762 * cb - 0.812_968 * cr;
    let b = y + 2.017_232 * cb;
    (quantize(r), quantize(g), quantize(b))
}

/// Convert RGB planes to YCbCr planes.
///
/// # Panics
/// Panics if the planes differ in size.
pub fn rgb_to_ycbcr(rgb: &RgbPlanes) -> YCbCrPlanes {
    assert_same_shape(&rgb.r, &rgb.g);
    assert_same_shape(&rgb.r, &rgb.b);

    let (w, h) = (rgb.r.width(), rgb.r.height());
    let n = w * h;
    let mut y = Vec::with_capacity(n);
    let mut cb = Vec::with_capacity(n);
    let mut cr = Vec::with_capacity(n);
    for ((&r, &g), &b) in rgb.r.as_slice().iter().zip(rgb.g.as_slice()).zip(rgb.b.as_slice()) {
        let (py, pcb, pcr) = rgb_to_ycbcr_pixel(r, g, b);
        y.push(py);
        cb.push(pcb);
        cr.push(pcr);
    }
    YCbCrPlanes {
        y: Image::from_vec(w, h, y),
        cb: Image::from_vec(w, h, cb),
        cr: Image::from_vec(w, h, cr),
    }
}

/// Convert YCbCr planes to RGB planes.
///
/// # Panics
/// Panics if the planes differ in size.
pub fn ycbcr_to_rgb(ycc: &YCbCrPlanes) -> RgbPlanes {
    assert_same_shape(&ycc.y, &ycc.cb);
    assert_same_shape(&ycc.y, &ycc.cr);

    let (w, h) = (ycc.y.width(), ycc.y.height());
    let n = w * h;
    let mut r = Vec::with_capacity(n);
    let mut g = Vec::with_capacity(n);
    let mut b = Vec::with_capacity(n);
    for ((&py, &pcb), &pcr) in ycc.y.as_slice().iter().zip(ycc.cb.as_slice()).zip(ycc.cr.as_slice()) {
        let (pr, pg, pb) = ycbcr_to_rgb_pixel(py, pcb, pcr);
        r.push(pr);
        g.push(pg);
        b.push(pb);
    }
    RgbPlanes {
        r: Image::from_vec(w, h, r),
        g: Image::from_vec(w, h, g),
        b: Image::from_vec(w, h, b),
    }
}

/// Reassemble an equalized luma plane with the source chroma planes and
/// convert the result back to RGB.
///
/// # Panics
/// Panics if `luma` and the chroma planes differ in size.
pub fn recombine(luma: Image<u8>, chroma: &ChromaPlanes) -> RgbPlanes {
    ycbcr_to_rgb(&YCbCrPlanes {
        y: luma,
        cb: chroma.cb.clone(),
        cr: chroma.cr.clone(),
    })
}

fn assert_same_shape(a: &Image<u8>, b: &Image<u8>) {
    assert_eq!(
        (a.width(), a.height()),
        (b.width(), b.height()),
        "plane size mismatch"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_and_white_hit_studio_range() {
        assert_eq!(rgb_to_ycbcr_pixel(0, 0, 0), (16, 128, 128));
        assert_eq!(rgb_to_ycbcr_pixel(255, 255, 255), (235, 128, 128));
    }

    #[test]
    fn test_grey_has_neutral_chroma() {
        for v in [1u8, 64, 128, 200] {
            let (_, cb, cr) = rgb_to_ycbcr_pixel(v, v, v);
            assert_eq!((cb, cr), (128, 128), "grey {v} produced chroma");
        }
    }

    #[test]
    fn test_primaries_round_trip_within_rounding() {
        let samples = [
            (255u8, 0u8, 0u8),
            (0, 255, 0),
            (0, 0, 255),
            (12, 200, 99),
            (250, 128, 3),
        ];
        for (r, g, b) in samples {
            let (y, cb, cr) = rgb_to_ycbcr_pixel(r, g, b);
            let (r2, g2, b2) = ycbcr_to_rgb_pixel(y, cb, cr);
            for (a, b) in [(r, r2), (g, g2), (b, b2)] {
                assert!((a as i32 - b as i32).abs() <= 3, "({r},{g},{b}) -> ({r2},{g2},{b2})");
            }
        }
    }

    #[test]
    fn test_split_keeps_chroma() {
        let rgb = RgbPlanes {
            r: Image::filled(2, 2, 200),
            g: Image::filled(2, 2, 30),
            b: Image::filled(2, 2, 90),
        };
        let ycc = rgb_to_ycbcr(&rgb);
        let expected_cb = ycc.cb.clone();
        let (luma, chroma) = ycc.split();
        assert_eq!(luma.width(), 2);
        assert_eq!(chroma.cb, expected_cb);
    }

    #[test]
    #[should_panic(expected = "plane size mismatch")]
    fn test_recombine_rejects_mismatched_planes() {
        let chroma = ChromaPlanes {
            cb: Image::filled(2, 2, 128),
            cr: Image::filled(2, 2, 128),
        };
        let _ = recombine(Image::filled(3, 2, 100), &chroma);
    }
}
