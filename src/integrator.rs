//! Monte-Carlo estimation of the light arriving at a patch.
//!
//! A [`StepContext`] borrows everything a bake step reads. Patches only read the
//! committed lightmap and only return their new texel value, so the patches of a
//! step can be shaded in any order and in parallel.

use crate::denoise::denoise_texel;
use crate::settings::{Accumulation, BakeMode, BakeSettings};
use crate::tracer::{Intersector, Ray};
use crate::{Patch, PixelBuffer, Texture, Triangle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(not(feature = "single_thread"))]
use rayon::prelude::*;
use std::f32::consts::TAU;
use vek::{Vec3, Vec4};

/// Everything a bake step reads.
pub struct StepContext<'a> {
    pub triangles: &'a [Triangle],
    pub intersector: &'a dyn Intersector,
    pub lightmap: &'a Texture,
    pub albedo: &'a Texture,
    /// Direct light written by [`crate::Scene::prime_direct_light`], if any.
    pub direct: Option<&'a Texture>,
    pub settings: &'a BakeSettings,
    /// Number of completed iterations, the weight of the old value when averaging.
    pub iteration: u32,
}

impl StepContext<'_> {
    /// Shades a run of patches. `first_index` is the index of `patches[0]` in the
    /// scene, it selects the random stream of each patch.
    pub fn bake_patches(
        &self,
        patches: &[Patch],
        first_index: usize,
        step_seed: u64,
    ) -> Vec<Vec4<f32>> {
        #[cfg(not(feature = "single_thread"))]
        {
            patches
                .par_iter()
                .enumerate()
                .map(|(i, patch)| {
                    let mut rng = patch_rng(step_seed, first_index + i);
                    self.shade(patch, &mut rng)
                })
                .collect()
        }

        #[cfg(feature = "single_thread")]
        {
            patches
                .iter()
                .enumerate()
                .map(|(i, patch)| {
                    let mut rng = patch_rng(step_seed, first_index + i);
                    self.shade(patch, &mut rng)
                })
                .collect()
        }
    }

    /// The new texel value of the patch: the estimate merged into the committed
    /// value, optionally smoothed with its valid neighbors.
    ///
    /// Primed direct light is part of every running average estimate. Additive
    /// accumulation already starts from the primed texel and adds nothing extra.
    pub fn shade<R: Rng>(&self, patch: &Patch, rng: &mut R) -> Vec4<f32> {
        let (x, y) = (patch.pixel.x, patch.pixel.y);

        let mut estimate = self.estimate(patch, rng);
        if self.settings.accumulation == Accumulation::RunningAverage {
            if let Some(direct) = self.direct.and_then(|d| d.get(x, y)) {
                estimate += direct.xyz();
            }
        }

        let old = self.lightmap.get(x, y).unwrap_or(Vec4::zero());
        let value = accumulate(self.settings.accumulation, self.iteration, old, estimate);

        if self.settings.inline_denoise {
            denoise_texel(self.lightmap, x, y, value, 1, self.settings.denoise_threshold)
                .unwrap_or(value)
        } else {
            value
        }
    }

    /// The mean incoming light over `rays_per_texel` samples.
    pub fn estimate<R: Rng>(&self, patch: &Patch, rng: &mut R) -> Vec3<f32> {
        let samples = self.settings.rays_per_texel.max(1);
        let sum = match self.settings.mode {
            BakeMode::Indirect => (0..samples).fold(Vec3::zero(), |acc, _| {
                acc + self.sample_indirect(patch, rng)
            }),
            BakeMode::AmbientOcclusion => {
                let occluded = (0..samples)
                    .filter(|_| self.sample_occlusion(patch, rng))
                    .count() as f32;
                Vec3::broadcast(samples as f32 - occluded)
            }
            BakeMode::Directional => (0..samples).fold(Vec3::zero(), |acc, _| {
                acc + self.sample_directional(patch, rng)
            }),
        };
        sum / samples as f32
    }

    /// One uniform hemisphere sample: sky on a miss, the bounced lightmap value on a hit.
    fn sample_indirect<R: Rng>(&self, patch: &Patch, rng: &mut R) -> Vec3<f32> {
        let dir = uniform_hemisphere(patch.normal, rng);
        let form_factor = 0.5 + 0.5 * patch.normal.dot(dir);
        let ray = Ray::new(patch.origin, dir);

        let Some(hit) = self
            .intersector
            .intersect(&ray, 0.0, f32::MAX, Some(patch.triangle))
        else {
            return self.settings.sky() * form_factor;
        };

        let Some(uv) = self
            .triangles
            .get(hit.triangle_index)
            .and_then(|tri| tri.world_to_uv(ray.at(hit.t)))
        else {
            return Vec3::zero();
        };

        let filter = self.settings.texture_filter();
        let light = self.lightmap.sample(uv, filter);
        let albedo = self.albedo.sample(uv, filter);
        let tint = Vec3::one() + (albedo.xyz() - Vec3::one()) * self.settings.reflectivity;

        light.xyz() * tint * form_factor
    }

    /// True if a cosine weighted ray is blocked within `ao_radius`.
    fn sample_occlusion<R: Rng>(&self, patch: &Patch, rng: &mut R) -> bool {
        let dir = cosine_hemisphere(patch.normal, rng);
        self.intersector.occluded(
            &Ray::new(patch.origin, dir),
            0.0,
            self.settings.ao_radius,
            Some(patch.triangle),
        )
    }

    /// One jittered shadow ray towards the light plus one ambient occlusion ray.
    fn sample_directional<R: Rng>(&self, patch: &Patch, rng: &mut R) -> Vec3<f32> {
        let settings = self.settings;
        let mut color = Vec3::zero();

        let to_light = jitter_cone(settings.to_light(), settings.light_cone.to_radians(), rng);
        let n_dot_l = patch.normal.dot(to_light);
        if n_dot_l > 0.0
            && !self.intersector.occluded(
                &Ray::new(patch.origin, to_light),
                settings.bias,
                f32::MAX,
                Some(patch.triangle),
            )
        {
            color += settings.light() * n_dot_l;
        }

        if !self.sample_occlusion(patch, rng) {
            color += settings.sky() * settings.ambient_strength;
        }
        color
    }
}

/// Merges an estimate into the committed texel value. Baked texels are marked valid.
pub fn accumulate(
    accumulation: Accumulation,
    iteration: u32,
    old: Vec4<f32>,
    estimate: Vec3<f32>,
) -> Vec4<f32> {
    let rgb = match accumulation {
        Accumulation::RunningAverage => {
            let i = iteration as f32;
            (old.xyz() * i + estimate) / (i + 1.0)
        }
        Accumulation::Additive => (old.xyz() + estimate).map(|c| c.clamp(0.0, 1.0)),
    };
    Vec4::new(rgb.x, rgb.y, rgb.z, 1.0)
}

/// An independent, reproducible random stream for one patch of one step.
pub fn patch_rng(step_seed: u64, patch_index: usize) -> StdRng {
    StdRng::seed_from_u64(splitmix64(
        step_seed ^ (patch_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
    ))
}

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// A uniformly distributed direction in the hemisphere around `normal`.
///
/// Points are drawn in the [-1, 1]³ cube, rejected outside of the unit ball and
/// flipped if they point into the surface.
pub fn uniform_hemisphere<R: Rng>(normal: Vec3<f32>, rng: &mut R) -> Vec3<f32> {
    loop {
        let p = Vec3::new(
            rng.random::<f32>() * 2.0 - 1.0,
            rng.random::<f32>() * 2.0 - 1.0,
            rng.random::<f32>() * 2.0 - 1.0,
        );
        let len_sq = p.magnitude_squared();
        if len_sq > 1e-6 && len_sq <= 1.0 {
            let dir = p / len_sq.sqrt();
            return if normal.dot(dir) < 0.0 { -dir } else { dir };
        }
    }
}

/// A cosine weighted direction in the hemisphere around `normal`.
pub fn cosine_hemisphere<R: Rng>(normal: Vec3<f32>, rng: &mut R) -> Vec3<f32> {
    let u1 = rng.random::<f32>();
    let u2 = rng.random::<f32>();

    let r = u1.sqrt();
    let phi = TAU * u2;
    let local = Vec3::new(r * phi.cos(), r * phi.sin(), (1.0 - u1).max(0.0).sqrt());

    from_local(normal, local)
}

/// A uniformly distributed direction in the cone of half angle `half_angle` around `axis`.
pub fn jitter_cone<R: Rng>(axis: Vec3<f32>, half_angle: f32, rng: &mut R) -> Vec3<f32> {
    if half_angle <= 0.0 {
        return axis;
    }
    let cos_max = half_angle.cos();
    let cos_theta = 1.0 - rng.random::<f32>() * (1.0 - cos_max);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = TAU * rng.random::<f32>();

    from_local(
        axis,
        Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta),
    )
}

/// Two unit vectors which form an orthonormal basis with `normal`.
pub fn tangent_frame(normal: Vec3<f32>) -> (Vec3<f32>, Vec3<f32>) {
    let helper = if normal.x.abs() > 0.9 {
        Vec3::unit_y()
    } else {
        Vec3::unit_x()
    };
    let tangent = helper.cross(normal).normalized();
    let bitangent = normal.cross(tangent);
    (tangent, bitangent)
}

/// Maps a direction given in the (tangent, bitangent, normal) frame to world space.
fn from_local(normal: Vec3<f32>, local: Vec3<f32>) -> Vec3<f32> {
    let (tangent, bitangent) = tangent_frame(normal);
    (tangent * local.x + bitangent * local.y + normal * local.z).normalized()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hemisphere_samples_face_the_normal() {
        let mut rng = StdRng::seed_from_u64(1);
        let normal = Vec3::new(0.3, -0.8, 0.2).normalized();
        for _ in 0..500 {
            let u = uniform_hemisphere(normal, &mut rng);
            assert!((u.magnitude() - 1.0).abs() < 1e-4);
            assert!(u.dot(normal) >= 0.0);

            let c = cosine_hemisphere(normal, &mut rng);
            assert!((c.magnitude() - 1.0).abs() < 1e-4);
            assert!(c.dot(normal) >= -1e-5);
        }
    }

    #[test]
    fn uniform_form_factor_averages_three_quarters() {
        let mut rng = StdRng::seed_from_u64(2);
        let n = 20_000;
        let mean = (0..n)
            .map(|_| {
                let dir = uniform_hemisphere(Vec3::unit_y(), &mut rng);
                0.5 + 0.5 * Vec3::unit_y().dot(dir)
            })
            .sum::<f32>()
            / n as f32;
        assert!((mean - 0.75).abs() < 0.01, "{mean}");
    }

    #[test]
    fn cone_jitter_stays_inside_the_cone() {
        let mut rng = StdRng::seed_from_u64(3);
        let axis = Vec3::new(0.0, 1.0, 1.0).normalized();
        let half = 10.0_f32.to_radians();
        for _ in 0..500 {
            let d = jitter_cone(axis, half, &mut rng);
            assert!(d.dot(axis) >= half.cos() - 1e-4);
        }
        assert_eq!(jitter_cone(axis, 0.0, &mut rng), axis);
    }

    #[test]
    fn running_average_and_additive() {
        let old = Vec4::new(0.5, 0.5, 0.5, 1.0);
        let avg = accumulate(Accumulation::RunningAverage, 1, old, Vec3::broadcast(1.0));
        assert!((avg.x - 0.75).abs() < 1e-6);
        assert_eq!(avg.w, 1.0);

        // First iteration ignores whatever was there before
        let first = accumulate(Accumulation::RunningAverage, 0, old, Vec3::broadcast(0.2));
        assert!((first.x - 0.2).abs() < 1e-6);

        let add = accumulate(Accumulation::Additive, 3, old, Vec3::broadcast(0.8));
        assert_eq!(add, Vec4::one());
    }

    #[test]
    fn patch_streams_are_independent_and_reproducible() {
        let a: u64 = patch_rng(42, 0).random();
        let b: u64 = patch_rng(42, 1).random();
        let c: u64 = patch_rng(42, 0).random();
        assert_ne!(a, b);
        assert_eq!(a, c);
    }
}
