//! Host-side bitmap storage and scalar sampling.
//!
//! A [`BitmapSampler`] owns a tightly packed pixel buffer and maps points in
//! an arbitrary output rectangle onto it, returning one byte channel of the
//! nearest pixel as a density in `[0, 1]`. Collision-shape extraction walks
//! the sampler with these densities.
//!
//! Storage row 0 is the bottom row, matching GL window space and a y-up
//! physics world. Set `flip_y` when the buffer was filled top row first.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::desc::SamplerDesc;
use crate::error::BitmapError;
use crate::format::{PixelFormat, PixelSink};

/// Axis-aligned rectangle in sample space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Rectangle whose corners land on the centers of the corner pixels,
    /// so that sample space equals pixel space.
    pub fn pixel_space(width: u32, height: u32) -> Self {
        Self {
            min: Vec2::ZERO,
            max: Vec2::new(width.saturating_sub(1) as f32, height.saturating_sub(1) as f32),
        }
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Whether `point` lies inside the rectangle, edges included.
    pub fn contains(&self, point: Vec2) -> bool {
        let lo = self.min.min(self.max);
        let hi = self.min.max(self.max);
        point.cmpge(lo).all() && point.cmple(hi).all()
    }
}

/// What a sample outside the output rectangle returns.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Border {
    /// Repeat the nearest edge pixel.
    #[default]
    Clamp,
    /// Return a fixed density.
    Value(f32),
}

/// Pixel storage plus the parameters needed to sample it.
#[derive(Debug, Clone)]
pub struct BitmapSampler {
    width: u32,
    height: u32,
    format: PixelFormat,
    component: usize,
    flip_y: bool,
    border: Border,
    output_rect: Rect,
    pixels: Vec<u8>,
}

impl BitmapSampler {
    /// Zero-filled bitmap sampling the alpha channel in pixel space.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self, BitmapError> {
        if width == 0 || height == 0 {
            return Err(BitmapError::ZeroSize { width, height });
        }
        Ok(Self {
            width,
            height,
            format,
            component: format.alpha_component(),
            flip_y: false,
            border: Border::Clamp,
            output_rect: Rect::pixel_space(width, height),
            pixels: vec![0; format.byte_len(width, height)],
        })
    }

    /// Wrap an existing buffer. The buffer length must match the dimensions.
    pub fn from_pixels(
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> Result<Self, BitmapError> {
        let mut sampler = Self::new(width, height, format)?;
        let expected = format.byte_len(width, height);
        if pixels.len() != expected {
            return Err(BitmapError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        sampler.pixels = pixels;
        Ok(sampler)
    }

    pub fn from_desc(desc: &SamplerDesc) -> Result<Self, BitmapError> {
        let mut sampler = Self::new(desc.width, desc.height, desc.format)?;
        sampler.set_component(desc.component)?;
        sampler.flip_y = desc.flip_y;
        sampler.border = desc.border;
        if let Some(rect) = desc.output_rect {
            sampler.output_rect = rect;
        }
        Ok(sampler)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn component(&self) -> usize {
        self.component
    }

    pub fn flip_y(&self) -> bool {
        self.flip_y
    }

    pub fn border(&self) -> Border {
        self.border
    }

    pub fn output_rect(&self) -> Rect {
        self.output_rect
    }

    /// Raw storage, row 0 first.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Storage viewed as RGBA texels.
    pub fn pixels_rgba(&self) -> &[[u8; 4]] {
        match self.format {
            PixelFormat::Rgba8 => bytemuck::cast_slice(&self.pixels),
        }
    }

    /// Texel at storage coordinates, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels_rgba()
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Select which byte of each pixel is sampled.
    pub fn set_component(&mut self, component: usize) -> Result<(), BitmapError> {
        let bytes_per_pixel = self.format.bytes_per_pixel();
        if component >= bytes_per_pixel {
            return Err(BitmapError::BadComponent {
                component,
                bytes_per_pixel,
            });
        }
        self.component = component;
        Ok(())
    }

    pub fn set_flip_y(&mut self, flip_y: bool) {
        self.flip_y = flip_y;
    }

    pub fn set_border(&mut self, border: Border) {
        self.border = border;
    }

    /// Map the sampled image onto `rect` in sample space.
    pub fn set_output_rect(&mut self, rect: Rect) {
        self.output_rect = rect;
    }

    /// Density at `point`, in `[0, 1]`.
    pub fn sample(&self, point: Vec2) -> f32 {
        if let Border::Value(value) = self.border {
            if !self.output_rect.contains(point) {
                return value;
            }
        }

        let rect = self.output_rect;
        let x = clamp_index(axis_to_pixel(point.x, rect.min.x, rect.max.x, self.width), self.width);
        let y = clamp_index(axis_to_pixel(point.y, rect.min.y, rect.max.y, self.height), self.height);

        let row = if self.flip_y { self.height as usize - 1 - y } else { y };
        let stride = self.width as usize * self.format.bytes_per_pixel();
        let offset = row * stride + x * self.format.bytes_per_pixel() + self.component;
        self.pixels[offset] as f32 / 255.0
    }

    /// Copy into an [`image::RgbaImage`] with the top row first.
    pub fn to_rgba_image(&self) -> Result<image::RgbaImage, BitmapError> {
        let stride = self.width as usize * self.format.bytes_per_pixel();
        let data = if self.flip_y {
            self.pixels.clone()
        } else {
            self.pixels
                .chunks_exact(stride)
                .rev()
                .flatten()
                .copied()
                .collect()
        };
        let actual = data.len();
        image::RgbaImage::from_raw(self.width, self.height, data).ok_or(BitmapError::BufferSize {
            expected: self.format.byte_len(self.width, self.height),
            actual,
        })
    }

    /// Write the current contents to a PNG file for inspection.
    pub fn save_png(&self, path: &Path) -> Result<(), BitmapError> {
        self.to_rgba_image()?
            .save_with_format(path, image::ImageFormat::Png)?;
        tracing::debug!(
            "saved {}x{} bitmap to {}",
            self.width,
            self.height,
            path.display()
        );
        Ok(())
    }
}

impl PixelSink for BitmapSampler {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

/// Nearest pixel index along one axis; may fall outside `0..len`.
fn axis_to_pixel(value: f32, min: f32, max: f32, len: u32) -> i64 {
    let extent = max - min;
    if extent == 0.0 || len <= 1 {
        return if value < min { -1 } else if value > max { len as i64 } else { 0 };
    }
    let t = (value - min) / extent;
    (t * (len - 1) as f32).round() as i64
}

fn clamp_index(index: i64, len: u32) -> usize {
    index.clamp(0, len as i64 - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    /// 2x2 bitmap whose alpha bytes are 0, 64, 128, 255 in storage order.
    fn quad() -> BitmapSampler {
        let pixels = vec![
            10, 0, 0, 0, //
            20, 0, 0, 64, //
            30, 0, 0, 128, //
            40, 0, 0, 255,
        ];
        BitmapSampler::from_pixels(2, 2, PixelFormat::Rgba8, pixels).expect("valid bitmap")
    }

    #[test]
    fn test_new_allocates_exact_buffer() {
        let bitmap = BitmapSampler::new(7, 3, PixelFormat::Rgba8).expect("valid size");
        assert_eq!(bitmap.pixels().len(), 7 * 3 * 4);
        assert!(bitmap.pixels().iter().all(|&b| b == 0));
        assert_eq!(bitmap.component(), 3);
    }

    #[test]
    fn test_new_rejects_zero_size() {
        let err = BitmapSampler::new(0, 4, PixelFormat::Rgba8).expect_err("zero width");
        assert!(matches!(err, BitmapError::ZeroSize { width: 0, height: 4 }));
    }

    #[test]
    fn test_from_pixels_rejects_wrong_length() {
        let err = BitmapSampler::from_pixels(2, 2, PixelFormat::Rgba8, vec![0; 15])
            .expect_err("short buffer");
        assert!(matches!(
            err,
            BitmapError::BufferSize {
                expected: 16,
                actual: 15
            }
        ));
    }

    #[test]
    fn test_sample_reads_alpha_in_pixel_space() {
        let bitmap = quad();
        assert!((bitmap.sample(Vec2::new(0.0, 0.0)) - 0.0).abs() < EPSILON);
        assert!((bitmap.sample(Vec2::new(1.0, 0.0)) - 64.0 / 255.0).abs() < EPSILON);
        assert!((bitmap.sample(Vec2::new(0.0, 1.0)) - 128.0 / 255.0).abs() < EPSILON);
        assert!((bitmap.sample(Vec2::new(1.0, 1.0)) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_sample_other_component() {
        let mut bitmap = quad();
        bitmap.set_component(0).expect("red is valid");
        assert!((bitmap.sample(Vec2::new(1.0, 1.0)) - 40.0 / 255.0).abs() < EPSILON);
        assert!(bitmap.set_component(4).is_err());
    }

    #[test]
    fn test_sample_flip_y_mirrors_rows() {
        let mut bitmap = quad();
        bitmap.set_flip_y(true);
        assert!((bitmap.sample(Vec2::new(0.0, 0.0)) - 128.0 / 255.0).abs() < EPSILON);
        assert!((bitmap.sample(Vec2::new(1.0, 1.0)) - 64.0 / 255.0).abs() < EPSILON);
    }

    #[test]
    fn test_sample_border_clamp_and_value() {
        let mut bitmap = quad();
        assert!((bitmap.sample(Vec2::new(5.0, 5.0)) - 1.0).abs() < EPSILON);
        assert!((bitmap.sample(Vec2::new(-3.0, -3.0)) - 0.0).abs() < EPSILON);

        bitmap.set_border(Border::Value(0.5));
        assert!((bitmap.sample(Vec2::new(5.0, 5.0)) - 0.5).abs() < EPSILON);
        assert!((bitmap.sample(Vec2::new(-1.0, 0.0)) - 0.5).abs() < EPSILON);
        assert!((bitmap.sample(Vec2::new(1.0, 1.0)) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_border_value_applies_just_outside_output_rect() {
        let opaque = vec![255; 16];
        let mut bitmap =
            BitmapSampler::from_pixels(2, 2, PixelFormat::Rgba8, opaque).expect("valid bitmap");
        bitmap.set_output_rect(Rect::new(Vec2::ZERO, Vec2::new(100.0, 100.0)));
        bitmap.set_border(Border::Value(0.0));

        assert!(bitmap.sample(Vec2::new(-10.0, 50.0)).abs() < EPSILON);
        assert!(bitmap.sample(Vec2::new(110.0, 50.0)).abs() < EPSILON);
        assert!(bitmap.sample(Vec2::new(-0.5, 50.0)).abs() < EPSILON);
        assert!(bitmap.sample(Vec2::new(50.0, 100.25)).abs() < EPSILON);
        assert!((bitmap.sample(Vec2::new(0.0, 50.0)) - 1.0).abs() < EPSILON);
        assert!((bitmap.sample(Vec2::new(100.0, 100.0)) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_rect_contains_handles_inverted_corners() {
        let rect = Rect::new(Vec2::new(4.0, 4.0), Vec2::new(-4.0, -4.0));
        assert!(rect.contains(Vec2::ZERO));
        assert!(rect.contains(Vec2::new(-4.0, 4.0)));
        assert!(!rect.contains(Vec2::new(4.5, 0.0)));
    }

    #[test]
    fn test_sample_output_rect_scales_points() {
        let mut bitmap = quad();
        bitmap.set_output_rect(Rect::new(Vec2::new(-10.0, -10.0), Vec2::new(10.0, 10.0)));
        assert!((bitmap.sample(Vec2::new(-10.0, -10.0)) - 0.0).abs() < EPSILON);
        assert!((bitmap.sample(Vec2::new(8.0, 9.0)) - 1.0).abs() < EPSILON);
        assert!((bitmap.sample(Vec2::new(6.0, -7.0)) - 64.0 / 255.0).abs() < EPSILON);
    }

    #[test]
    fn test_single_pixel_bitmap_samples_everywhere() {
        let bitmap =
            BitmapSampler::from_pixels(1, 1, PixelFormat::Rgba8, vec![0, 0, 0, 255]).expect("1x1");
        assert!((bitmap.sample(Vec2::ZERO) - 1.0).abs() < EPSILON);
        assert!((bitmap.sample(Vec2::new(3.0, -2.0)) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_to_rgba_image_puts_top_row_first() {
        let bitmap = quad();
        let image = bitmap.to_rgba_image().expect("export");
        assert_eq!(image.get_pixel(0, 0).0, [30, 0, 0, 128]);
        assert_eq!(image.get_pixel(1, 1).0, [20, 0, 0, 64]);
    }

    #[test]
    fn test_pixel_lookup() {
        let bitmap = quad();
        assert_eq!(bitmap.pixel(1, 0), Some([20, 0, 0, 64]));
        assert_eq!(bitmap.pixel(2, 0), None);
        assert_eq!(bitmap.pixels_rgba().len(), 4);
    }
}
