//! Lightbaker bakes static global illumination and ambient occlusion of a triangle mesh into a lightmap.
//! Baking is progressive: every call to [`Scene::step`] returns quickly and leaves a usable partial lightmap behind.

pub mod denoise;
pub mod error;
pub mod integrator;
pub mod mesh;
pub mod patch;
pub mod scene;
pub mod scheduler;
pub mod settings;
pub mod texture;
pub mod tracer;
pub mod triangle;
pub mod wavefront;

pub type Pixel = [u8; 4];

/// Convert from Pixel to Vec4<f32>
#[inline(always)]
pub fn pixel_to_vec4(pixel: &Pixel) -> vek::Vec4<f32> {
    vek::Vec4::new(
        pixel[0] as f32 / 255.0,
        pixel[1] as f32 / 255.0,
        pixel[2] as f32 / 255.0,
        pixel[3] as f32 / 255.0,
    )
}

/// Convert from Vec4<f32> to Pixel
#[inline(always)]
pub fn vec4_to_pixel(vec: &vek::Vec4<f32>) -> Pixel {
    [
        (vec.x * 255.0) as u8,
        (vec.y * 255.0) as u8,
        (vec.z * 255.0) as u8,
        (vec.w * 255.0) as u8,
    ]
}

// Re-exports
pub use crate::{
    error::{BakeError, Result},
    mesh::Mesh,
    patch::Patch,
    scene::{Scene, StepOutcome},
    settings::{Accumulation, BakeMode, BakeSettings},
    texture::{PixelBuffer, RepeatMode, SampleMode, Texture, TextureFilter},
    tracer::{Hit, Intersector, IntersectorKind, Ray},
    triangle::{Triangle, Vertex},
};

// Prelude
pub mod prelude {
    pub use crate::scene::{Scene, StepOutcome};
    pub use crate::{Accumulation, BakeMode, BakeSettings};
    pub use crate::{BakeError, Mesh, Patch};
    pub use crate::{Hit, Intersector, IntersectorKind, Ray};
    pub use crate::{PixelBuffer, RepeatMode, SampleMode, Texture, TextureFilter};
    pub use crate::{Triangle, Vertex};
    pub use crate::{pixel_to_vec4, vec4_to_pixel};
}
