use crate::{Pixel, pixel_to_vec4, vec4_to_pixel};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vek::{Vec2, Vec4};

/// Sample mode for texture sampling.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum SampleMode {
    /// Nearest-neighbor sampling
    #[default]
    Nearest,
    /// Linear interpolation sampling
    Linear,
}

/// The repeat mode for texture sampling.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum RepeatMode {
    /// Clamps UVs to [0, 1] (the default)
    #[default]
    ClampXY,
    /// Repeats texture in both X and Y
    RepeatXY,
    /// Repeats texture only in X
    RepeatX,
    /// Repeats texture only in Y
    RepeatY,
}

/// How textures are filtered when the baker looks them up at a ray hit.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct TextureFilter {
    pub sample_mode: SampleMode,
    pub repeat_mode: RepeatMode,
}

impl TextureFilter {
    pub fn new(sample_mode: SampleMode, repeat_mode: RepeatMode) -> Self {
        Self {
            sample_mode,
            repeat_mode,
        }
    }
}

/// A writable 2D RGBA buffer whose writes only become visible after a commit.
pub trait PixelBuffer {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Read a committed texel, `None` if the coordinate is outside of the buffer.
    fn get(&self, x: i32, y: i32) -> Option<Vec4<f32>>;

    /// Stage a texel write, returns false if the coordinate is outside of the buffer.
    fn set(&mut self, x: i32, y: i32, color: Vec4<f32>) -> bool;

    /// Make all staged writes visible.
    fn commit(&mut self);
}

/// A double buffered RGBA texture with float channels in [0, 1].
///
/// `data` is the committed state every read sees, `staging` receives writes
/// until [`PixelBuffer::commit`] copies it over.
#[derive(PartialEq, Clone, Debug)]
pub struct Texture {
    data: Vec<Vec4<f32>>,
    staging: Vec<Vec4<f32>>,
    pub width: usize,
    pub height: usize,
}

impl Default for Texture {
    fn default() -> Self {
        Self::white(1, 1)
    }
}

impl Texture {
    /// Creates a new texture of the given size filled with `color`.
    pub fn filled(width: usize, height: usize, color: Vec4<f32>) -> Self {
        let data = vec![color; width * height];
        Texture {
            staging: data.clone(),
            data,
            width,
            height,
        }
    }

    /// Creates a transparent black texture, every texel is marked as not covered.
    pub fn alloc(width: usize, height: usize) -> Self {
        Self::filled(width, height, Vec4::zero())
    }

    /// Creates an opaque white texture.
    pub fn white(width: usize, height: usize) -> Self {
        Self::filled(width, height, Vec4::one())
    }

    /// Creates a texture from tightly packed RGBA8 data.
    pub fn from_rgba8(data: &[u8], width: usize, height: usize) -> Self {
        assert_eq!(data.len(), width * height * 4, "Invalid texture data size.");
        let data: Vec<Vec4<f32>> = data
            .chunks_exact(4)
            .map(|c| pixel_to_vec4(&[c[0], c[1], c[2], c[3]]))
            .collect();
        Texture {
            staging: data.clone(),
            data,
            width,
            height,
        }
    }

    /// Loads a texture from an image file at the given path.
    pub fn from_image(path: impl AsRef<Path>) -> Result<Self> {
        let img = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?;

        let rgba_img = img.to_rgba8();
        let (width, height) = rgba_img.dimensions();

        Ok(Self::from_rgba8(
            rgba_img.as_raw(),
            width as usize,
            height as usize,
        ))
    }

    /// Exports the committed texels as RGBA8.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() * 4);
        for texel in &self.data {
            let pixel: Pixel = vec4_to_pixel(&texel.map(|c| c.clamp(0.0, 1.0)));
            out.extend_from_slice(&pixel);
        }
        out
    }

    /// Saves the committed texels as a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        image::save_buffer(
            path,
            &self.to_rgba8(),
            self.width as u32,
            self.height as u32,
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(())
    }

    /// Overwrites both the committed and the staged state with `color`.
    pub fn clear(&mut self, color: Vec4<f32>) {
        self.data.fill(color);
        self.staging.fill(color);
    }

    /// The committed texels in row-major order.
    pub fn texels(&self) -> &[Vec4<f32>] {
        &self.data
    }

    #[inline(always)]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    /// The UV coordinate of the center of the texel at (x, y).
    #[inline(always)]
    pub fn to_uv_coords(&self, x: i32, y: i32) -> Vec2<f32> {
        Vec2::new(
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        )
    }

    /// The texel containing the given UV coordinate. May lie outside of the texture.
    #[inline(always)]
    pub fn to_pixel_coords(&self, uv: Vec2<f32>) -> Vec2<i32> {
        Vec2::new(
            (uv.x * self.width as f32).floor() as i32,
            (uv.y * self.height as f32).floor() as i32,
        )
    }

    /// Samples the committed texels using the given filter.
    #[inline(always)]
    pub fn sample(&self, uv: Vec2<f32>, filter: TextureFilter) -> Vec4<f32> {
        if self.data.is_empty() {
            return Vec4::zero();
        }

        let mut u = uv.x;
        let mut v = uv.y;
        match filter.repeat_mode {
            RepeatMode::ClampXY => {
                u = u.clamp(0.0, 1.0);
                v = v.clamp(0.0, 1.0);
            }
            RepeatMode::RepeatXY => {
                u -= u.floor();
                v -= v.floor();
            }
            RepeatMode::RepeatX => {
                u -= u.floor();
                v = v.clamp(0.0, 1.0);
            }
            RepeatMode::RepeatY => {
                u = u.clamp(0.0, 1.0);
                v -= v.floor();
            }
        }
        match filter.sample_mode {
            SampleMode::Nearest => self.sample_nearest(u, v),
            SampleMode::Linear => self.sample_linear(u, v),
        }
    }

    #[inline(always)]
    fn sample_nearest(&self, u: f32, v: f32) -> Vec4<f32> {
        let tx = ((u * self.width as f32).floor() as usize).min(self.width - 1);
        let ty = ((v * self.height as f32).floor() as usize).min(self.height - 1);
        self.data[ty * self.width + tx]
    }

    /// Bilinear interpolation between texel centers.
    fn sample_linear(&self, u: f32, v: f32) -> Vec4<f32> {
        let x = (u * self.width as f32 - 0.5).clamp(0.0, (self.width - 1) as f32);
        let y = (v * self.height as f32 - 0.5).clamp(0.0, (self.height - 1) as f32);

        let x0 = x.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y0 = y.floor() as usize;
        let y1 = (y0 + 1).min(self.height - 1);

        let dx = x - x.floor();
        let dy = y - y.floor();

        let c00 = self.data[y0 * self.width + x0];
        let c10 = self.data[y0 * self.width + x1];
        let c01 = self.data[y1 * self.width + x0];
        let c11 = self.data[y1 * self.width + x1];

        let c0 = c00 + (c10 - c00) * dx;
        let c1 = c01 + (c11 - c01) * dx;
        c0 + (c1 - c0) * dy
    }
}

impl PixelBuffer for Texture {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    #[inline(always)]
    fn get(&self, x: i32, y: i32) -> Option<Vec4<f32>> {
        self.index(x, y).map(|i| self.data[i])
    }

    #[inline(always)]
    fn set(&mut self, x: i32, y: i32, color: Vec4<f32>) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.staging[i] = color;
                true
            }
            None => false,
        }
    }

    fn commit(&mut self) {
        self.data.copy_from_slice(&self.staging);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_invisible_until_commit() {
        let mut tex = Texture::alloc(2, 2);
        assert!(tex.set(1, 0, Vec4::one()));
        assert_eq!(tex.get(1, 0), Some(Vec4::zero()));

        tex.commit();
        assert_eq!(tex.get(1, 0), Some(Vec4::one()));
    }

    #[test]
    fn out_of_range_access_fails() {
        let mut tex = Texture::alloc(4, 4);
        assert_eq!(tex.get(-1, 0), None);
        assert_eq!(tex.get(0, 4), None);
        assert!(!tex.set(4, 0, Vec4::one()));
        assert!(!tex.set(0, -1, Vec4::one()));
    }

    #[test]
    fn pixel_and_uv_coords() {
        let tex = Texture::alloc(4, 4);
        assert_eq!(tex.to_uv_coords(0, 0), Vec2::new(0.125, 0.125));
        assert_eq!(tex.to_pixel_coords(Vec2::new(0.125, 0.9)), Vec2::new(0, 3));
        assert_eq!(tex.to_pixel_coords(tex.to_uv_coords(2, 1)), Vec2::new(2, 1));
    }

    #[test]
    fn sampling_respects_filter() {
        let mut tex = Texture::alloc(2, 1);
        tex.set(1, 0, Vec4::one());
        tex.commit();

        let nearest = TextureFilter::default();
        assert_eq!(tex.sample(Vec2::new(0.2, 0.5), nearest), Vec4::zero());
        assert_eq!(tex.sample(Vec2::new(1.5, 0.5), nearest), Vec4::one());

        let wrap = TextureFilter::new(SampleMode::Nearest, RepeatMode::RepeatXY);
        assert_eq!(tex.sample(Vec2::new(1.2, 0.5), wrap), Vec4::zero());

        let linear = TextureFilter::new(SampleMode::Linear, RepeatMode::ClampXY);
        let mid = tex.sample(Vec2::new(0.5, 0.5), linear);
        assert!((mid.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn rgba8_conversion() {
        let tex = Texture::from_rgba8(&[255, 0, 255, 255, 0, 0, 0, 0], 2, 1);
        assert_eq!(tex.get(0, 0), Some(Vec4::new(1.0, 0.0, 1.0, 1.0)));
        assert_eq!(tex.to_rgba8(), vec![255, 0, 255, 255, 0, 0, 0, 0]);
    }
}
