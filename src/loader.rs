// loader.rs — raster file input and output.
//
// Decoding is delegated to the `image` crate (PGM/PPM, PNG, TIFF, ...).
// What comes back is reduced to what the pipeline works on:
//
//   - greyscale (with or without alpha) → one 8-bit luma plane
//   - colour (with or without alpha)   → RGB planes, split into a luma
//                                         plane and kept-aside chroma
//
// 16-BIT SOURCES:
// Samples are read at full depth first. If the largest exceeds 256 the
// whole image (all channels together) is rescaled linearly from
// [min, max] onto [0, 255]; otherwise the raw values are used, clamped
// to 255.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::debug;

use crate::color::{rgb_to_ycbcr, ChromaPlanes, RgbPlanes};
use crate::image::{Image, Pixel, Raster};

/// A decoded input ready for equalization.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// The 8-bit image as loaded, for display next to the result.
    pub raster: Raster,
    /// The plane that gets equalized.
    pub luma: Image<u8>,
    /// Chroma of a colour source, `None` for greyscale.
    pub chroma: Option<ChromaPlanes>,
}

impl LoadedImage {
    pub fn is_colour(&self) -> bool {
        self.chroma.is_some()
    }

    pub fn width(&self) -> usize {
        self.luma.width()
    }

    pub fn height(&self) -> usize {
        self.luma.height()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image {path} has no pixels")]
    Empty { path: PathBuf },
}

/// Read and decode an image file.
pub fn load(path: impl AsRef<Path>) -> Result<LoadedImage, LoadError> {
    let path = path.as_ref();
    let dynamic = image::open(path).map_err(|source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        width = dynamic.width(),
        height = dynamic.height(),
        color = ?dynamic.color(),
        "decoded"
    );
    if dynamic.width() == 0 || dynamic.height() == 0 {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(from_dynamic(&dynamic))
}

/// Reduce a decoded image to 8-bit planes.
pub fn from_dynamic(dynamic: &DynamicImage) -> LoadedImage {
    let (w, h) = (dynamic.width() as usize, dynamic.height() as usize);
    let colour = dynamic.color().has_color();

    let raster = match (colour, is_sixteen_bit(dynamic)) {
        (false, false) => Raster::Gray(Image::from_vec(w, h, dynamic.to_luma8().into_raw())),
        (false, true) => {
            let gray = Image::from_vec(w, h, dynamic.to_luma16().into_raw());
            let [gray] = normalize_to_u8([gray]);
            Raster::Gray(gray)
        }
        (true, false) => {
            let [r, g, b] = deinterleave(w, h, &dynamic.to_rgb8().into_raw());
            Raster::Rgb(RgbPlanes { r, g, b })
        }
        (true, true) => {
            let [r, g, b] = normalize_to_u8(deinterleave(w, h, &dynamic.to_rgb16().into_raw()));
            Raster::Rgb(RgbPlanes { r, g, b })
        }
    };
    from_raster(raster)
}

/// Split a raster into the plane to equalize and its chroma.
pub fn from_raster(raster: Raster) -> LoadedImage {
    match &raster {
        Raster::Gray(img) => LoadedImage {
            luma: img.clone(),
            chroma: None,
            raster,
        },
        Raster::Rgb(planes) => {
            let (luma, chroma) = rgb_to_ycbcr(planes).split();
            LoadedImage {
                luma,
                chroma: Some(chroma),
                raster,
            }
        }
    }
}

fn is_sixteen_bit(dynamic: &DynamicImage) -> bool {
    matches!(
        dynamic,
        DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
            | DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgba16(_)
    )
}

fn deinterleave<T: Pixel>(width: usize, height: usize, rgb: &[T]) -> [Image<T>; 3] {
    let n = width * height;
    let (mut r, mut g, mut b) = (Vec::with_capacity(n), Vec::with_capacity(n), Vec::with_capacity(n));
    for px in rgb.chunks_exact(3) {
        r.push(px[0]);
        g.push(px[1]);
        b.push(px[2]);
    }
    [
        Image::from_vec(width, height, r),
        Image::from_vec(width, height, g),
        Image::from_vec(width, height, b),
    ]
}

/// Bring 16-bit planes into 8-bit range.
///
/// The planes are treated as one image: if the largest sample across all
/// of them is at most 256 the values are taken as they are (clamped to
/// 255). Wider ranges are stretched linearly so `min → 0` and `max → 255`,
/// rounding to nearest.
pub fn normalize_to_u8<const N: usize>(planes: [Image<u16>; N]) -> [Image<u8>; N] {
    let max = planes.iter().filter_map(Image::max_value).max().unwrap_or(0);
    if max <= 256 {
        return planes.map(|p| p.map(|v| v.min(255) as u8));
    }

    let min = planes.iter().filter_map(Image::min_value).min().unwrap_or(0) as u64;
    let range = max as u64 - min;
    planes.map(|p| {
        p.map(|v| ((v as u64 - min) * 255 + range / 2).checked_div(range).unwrap_or(0) as u8)
    })
}

/// Encode a raster to `path`; the format follows the file extension.
pub fn save(raster: &Raster, path: impl AsRef<Path>) -> image::ImageResult<()> {
    raster.to_dynamic_image().save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row16(samples: &[u16]) -> Image<u16> {
        Image::from_vec(samples.len(), 1, samples.to_vec())
    }

    fn normalize_row(samples: &[u16]) -> Vec<u8> {
        let [out] = normalize_to_u8([row16(samples)]);
        out.as_slice().to_vec()
    }

    #[test]
    fn test_normalize_keeps_small_ranges() {
        assert_eq!(normalize_row(&[0, 17, 255, 256]), vec![0, 17, 255, 255]);
    }

    #[test]
    fn test_normalize_stretches_wide_ranges() {
        assert_eq!(normalize_row(&[1000, 2000, 3000]), vec![0, 128, 255]);
    }

    #[test]
    fn test_normalize_full_sixteen_bit() {
        assert_eq!(normalize_row(&[0, 65535]), vec![0, 255]);
    }

    #[test]
    fn test_normalize_constant_wide_value() {
        assert_eq!(normalize_row(&[4000, 4000]), vec![0, 0]);
        assert!(normalize_row(&[]).is_empty());
    }

    #[test]
    fn test_normalize_shares_range_across_planes() {
        // Only the red plane exceeds 256; green and blue still get stretched
        // by the common [min, max].
        let [r, g, b] = normalize_to_u8([row16(&[0, 1000]), row16(&[0, 100]), row16(&[0, 500])]);
        assert_eq!(r.as_slice(), &[0, 255]);
        assert_eq!(g.as_slice(), &[0, 26]);
        assert_eq!(b.as_slice(), &[0, 128]);
    }

    #[test]
    fn test_gray_source_has_no_chroma() {
        let dynamic = DynamicImage::ImageLuma8(image::GrayImage::from_raw(2, 1, vec![5, 9]).unwrap());
        let loaded = from_dynamic(&dynamic);
        assert!(!loaded.is_colour());
        assert_eq!(loaded.luma.as_slice(), &[5, 9]);
        assert_eq!(loaded.raster, Raster::Gray(loaded.luma.clone()));
    }

    #[test]
    fn test_gray_alpha_is_greyscale() {
        let dynamic = DynamicImage::ImageLumaA8(image::GrayAlphaImage::from_raw(1, 1, vec![77, 0]).unwrap());
        let loaded = from_dynamic(&dynamic);
        assert!(!loaded.is_colour());
        assert_eq!(loaded.luma.as_slice(), &[77]);
    }

    #[test]
    fn test_colour_source_splits_planes() {
        let rgb = image::RgbImage::from_raw(2, 1, vec![255, 0, 0, 0, 0, 255]).unwrap();
        let loaded = from_dynamic(&DynamicImage::ImageRgb8(rgb));
        assert!(loaded.is_colour());
        assert_eq!(loaded.raster.channels(), 3);
        let chroma = loaded.chroma.unwrap();
        assert_eq!(chroma.cb.width(), 2);
        // Pure blue carries far more Cb than pure red.
        assert!(chroma.cb.get(1, 0) > chroma.cb.get(0, 0));
    }

    #[test]
    fn test_sixteen_bit_gray_is_normalized() {
        let buf = image::ImageBuffer::<image::Luma<u16>, _>::from_raw(3, 1, vec![1000u16, 2000, 3000]).unwrap();
        let loaded = from_dynamic(&DynamicImage::ImageLuma16(buf));
        assert_eq!(loaded.luma.as_slice(), &[0, 128, 255]);
    }
}
