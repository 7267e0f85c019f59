// image.rs — Runtime-sized planes and the rasters built from them.
//
// Every stage of the equalizer works on a single 8-bit plane: the luma of
// a colour image, or the whole of a greyscale one. `Image<T>` is that
// plane. `Raster` is what the loader hands back and what the presenter
// shows: either one grey plane or three RGB planes of the same size.
//
// Planes are row-major and contiguous (no stride padding). The device
// stages pack four samples per u32 word anyway, so padding would only
// have to be stripped again before upload.

use std::fmt;

use crate::color::RgbPlanes;

// ---------------------------------------------------------------------------
// Pixel Trait
// ---------------------------------------------------------------------------

/// Sample types a plane can hold.
///
/// `u8` is the working type of every stage. 16-bit sources are decoded
/// into `Image<u16>` planes and brought down to 8 bits by the loader.
pub trait Pixel: Copy + Default + Send + Sync + Ord + 'static {}

impl Pixel for u8 {}

impl Pixel for u16 {}

// ---------------------------------------------------------------------------
// Image<T>
// ---------------------------------------------------------------------------

/// A 2D plane with runtime dimensions, generic over sample type `T`.
#[derive(Clone, PartialEq, Eq)]
pub struct Image<T: Pixel> {
    /// Samples in row-major order. Length = width * height.
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Pixel> Image<T> {
    /// Create a zero-initialized plane.
    pub fn new(width: usize, height: usize) -> Self {
        Image {
            data: vec![T::default(); width * height],
            width,
            height,
        }
    }

    /// Create a plane filled with one value.
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Image {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    /// Wrap an existing sample vector.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length ({}) must equal width * height ({})",
            data.len(),
            width * height,
        );
        Image { data, width, height }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of samples in the plane.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample at (x, y). x is column, y is row.
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.bounds_check(x, y);
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        self.bounds_check(x, y);
        self.data[y * self.width + x] = value;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Largest sample, or `None` for an empty plane.
    pub fn max_value(&self) -> Option<T> {
        self.data.iter().copied().max()
    }

    pub fn min_value(&self) -> Option<T> {
        self.data.iter().copied().min()
    }

    /// Apply `f` to every sample, producing a new plane of the same shape.
    pub fn map<U: Pixel>(&self, f: impl Fn(T) -> U) -> Image<U> {
        Image {
            data: self.data.iter().map(|&v| f(v)).collect(),
            width: self.width,
            height: self.height,
        }
    }

    #[inline]
    fn bounds_check(&self, x: usize, y: usize) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x},{y}) out of bounds for image {}×{}",
            self.width,
            self.height,
        );
    }
}

impl<T: Pixel + fmt::Debug> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Image<{}> {{ {}×{} }}",
            std::any::type_name::<T>(),
            self.width,
            self.height,
        )?;
        for y in 0..self.height.min(8) {
            write!(f, "  row {y}: [")?;
            for x in 0..self.width.min(16) {
                if x > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}", self.get(x, y))?;
            }
            if self.width > 16 {
                write!(f, ", ...")?;
            }
            writeln!(f, "]")?;
        }
        if self.height > 8 {
            writeln!(f, "  ...")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Raster
// ---------------------------------------------------------------------------

/// An 8-bit image as loaded from disk or shown on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raster {
    Gray(Image<u8>),
    Rgb(RgbPlanes),
}

impl Raster {
    pub fn width(&self) -> usize {
        match self {
            Raster::Gray(img) => img.width(),
            Raster::Rgb(planes) => planes.r.width(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            Raster::Gray(img) => img.height(),
            Raster::Rgb(planes) => planes.r.height(),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Raster::Gray(_) => 1,
            Raster::Rgb(_) => 3,
        }
    }

    pub fn is_colour(&self) -> bool {
        matches!(self, Raster::Rgb(_))
    }

    /// Pack into a `0x00RRGGBB` framebuffer, one u32 per pixel.
    pub fn to_framebuffer(&self) -> Vec<u32> {
        match self {
            Raster::Gray(img) => img
                .as_slice()
                .iter()
                .map(|&v| {
                    let v = v as u32;
                    (v << 16) | (v << 8) | v
                })
                .collect(),
            Raster::Rgb(planes) => planes
                .r
                .as_slice()
                .iter()
                .zip(planes.g.as_slice())
                .zip(planes.b.as_slice())
                .map(|((&r, &g), &b)| ((r as u32) << 16) | ((g as u32) << 8) | b as u32)
                .collect(),
        }
    }

    /// Convert to an `image::DynamicImage` for encoding.
    pub fn to_dynamic_image(&self) -> image::DynamicImage {
        let (w, h) = (self.width() as u32, self.height() as u32);
        match self {
            Raster::Gray(img) => {
                let buf = image::GrayImage::from_fn(w, h, |x, y| {
                    image::Luma([img.get(x as usize, y as usize)])
                });
                image::DynamicImage::ImageLuma8(buf)
            }
            Raster::Rgb(planes) => {
                let buf = image::RgbImage::from_fn(w, h, |x, y| {
                    let (x, y) = (x as usize, y as usize);
                    image::Rgb([planes.r.get(x, y), planes.g.get(x, y), planes.b.get(x, y)])
                });
                image::DynamicImage::ImageRgb8(buf)
            }
        }
    }
}
