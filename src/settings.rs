use crate::error::{BakeError, Result};
use crate::{IntersectorKind, RepeatMode, SampleMode, TextureFilter};
use serde::{Deserialize, Serialize};
use vek::Vec3;

pub const DEFAULT_LIGHTMAP_SIZE: usize = 255;
pub const DEFAULT_RAYS_PER_TEXEL: u32 = 128;
pub const DEFAULT_ITERATIONS: u32 = 8;
pub const DEFAULT_DENOISE_PASSES: u32 = 4;

/// What the integrator estimates per texel.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BakeMode {
    /// Sky light plus one bounce off the lightmap baked so far.
    #[default]
    Indirect,
    /// Pure ambient occlusion, 1 is fully open and 0 fully occluded.
    AmbientOcclusion,
    /// A directional light with soft shadows plus occlusion scaled ambient light.
    Directional,
}

/// How a step's estimate is merged into the texel.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accumulation {
    /// `(iteration * old + estimate) / (iteration + 1)`
    #[default]
    RunningAverage,
    /// `clamp(old + estimate, 0, 1)`
    Additive,
}

/// All tunables of a bake.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BakeSettings {
    /// Lightmap width in texels.
    pub width: usize,
    /// Lightmap height in texels.
    pub height: usize,

    pub rays_per_texel: u32,

    /// Number of full passes over all patches.
    pub iterations: u32,

    pub mode: BakeMode,
    pub accumulation: Accumulation,
    pub intersector: IntersectorKind,

    /// RNG seed, a random seed is drawn when not set.
    pub seed: Option<u64>,

    /// Offset of ray origins along the surface normal.
    pub bias: f32,

    /// Texels added around each triangle's UV box when building patches.
    pub padding: u32,

    /// Process only this many triangles per step. All patches per step when not set.
    pub triangles_per_step: Option<usize>,

    /// Sky color (RGB)
    pub sky_color: [f32; 3],
    pub sky_intensity: f32,

    /// How strongly the albedo tints bounced light, 0 ignores the albedo.
    pub reflectivity: f32,

    /// Direction the light travels in.
    pub light_direction: [f32; 3],
    pub light_color: [f32; 3],
    pub light_intensity: f32,

    /// Half angle in degrees of the cone light rays are jittered in.
    pub light_cone: f32,

    /// Ambient strength (0.0 to 1.0)
    pub ambient_strength: f32,

    /// Occlusion rays only count hits closer than this.
    pub ao_radius: f32,

    pub denoise_passes: u32,

    /// Texels with an alpha above this are considered valid.
    pub denoise_threshold: f32,

    /// Average each freshly baked texel with its valid neighbors.
    pub inline_denoise: bool,

    pub sample_mode: SampleMode,
    pub repeat_mode: RepeatMode,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_LIGHTMAP_SIZE,
            height: DEFAULT_LIGHTMAP_SIZE,
            rays_per_texel: DEFAULT_RAYS_PER_TEXEL,
            iterations: DEFAULT_ITERATIONS,
            mode: BakeMode::default(),
            accumulation: Accumulation::default(),
            intersector: IntersectorKind::default(),
            seed: None,
            bias: 0.001,
            padding: 1,
            triangles_per_step: None,
            sky_color: [1.0, 1.0, 1.0],
            sky_intensity: 1.0,
            reflectivity: 1.0,
            light_direction: [0.0, -2.0, -1.0],
            light_color: [1.0, 1.0, 1.0],
            light_intensity: 1.0,
            light_cone: 2.0,
            ambient_strength: 0.3,
            ao_radius: 1.0,
            denoise_passes: DEFAULT_DENOISE_PASSES,
            denoise_threshold: 0.5,
            inline_denoise: true,
            sample_mode: SampleMode::Nearest,
            repeat_mode: RepeatMode::ClampXY,
        }
    }
}

impl BakeSettings {
    pub fn new(rays_per_texel: u32, width: usize, height: usize) -> Self {
        Self {
            rays_per_texel,
            width,
            height,
            ..Default::default()
        }
    }

    /// Sets the bake mode using the builder pattern.
    pub fn mode(mut self, mode: BakeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the accumulation policy using the builder pattern.
    pub fn accumulation(mut self, accumulation: Accumulation) -> Self {
        self.accumulation = accumulation;
        self
    }

    /// Sets the intersection strategy using the builder pattern.
    pub fn intersector(mut self, intersector: IntersectorKind) -> Self {
        self.intersector = intersector;
        self
    }

    /// Sets the number of iterations using the builder pattern.
    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets the RNG seed using the builder pattern.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the texture filter using the builder pattern.
    pub fn filter(mut self, filter: TextureFilter) -> Self {
        self.sample_mode = filter.sample_mode;
        self.repeat_mode = filter.repeat_mode;
        self
    }

    /// Limits the triangles processed per step using the builder pattern.
    pub fn triangles_per_step(mut self, count: usize) -> Self {
        self.triangles_per_step = Some(count);
        self
    }

    /// Enables or disables the per texel denoise during baking.
    pub fn inline_denoise(mut self, enabled: bool) -> Self {
        self.inline_denoise = enabled;
        self
    }

    pub fn texture_filter(&self) -> TextureFilter {
        TextureFilter::new(self.sample_mode, self.repeat_mode)
    }

    pub fn sky(&self) -> Vec3<f32> {
        Vec3::<f32>::from(self.sky_color) * self.sky_intensity
    }

    pub fn light(&self) -> Vec3<f32> {
        Vec3::<f32>::from(self.light_color) * self.light_intensity
    }

    /// Normalized direction towards the light.
    pub fn to_light(&self) -> Vec3<f32> {
        -Vec3::<f32>::from(self.light_direction).normalized()
    }

    /// Checks that the settings describe a bake which can run.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(BakeError::Settings(format!(
                "lightmap size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.rays_per_texel == 0 {
            return Err(BakeError::Settings("rays_per_texel must be at least 1".into()));
        }
        if self.iterations == 0 {
            return Err(BakeError::Settings("iterations must be at least 1".into()));
        }
        if self.triangles_per_step == Some(0) {
            return Err(BakeError::Settings("triangles_per_step must be at least 1".into()));
        }
        if self.ao_radius <= 0.0 {
            return Err(BakeError::Settings("ao_radius must be positive".into()));
        }
        if self.bias < 0.0 {
            return Err(BakeError::Settings("bias must not be negative".into()));
        }
        if Vec3::<f32>::from(self.light_direction).magnitude_squared() == 0.0 {
            return Err(BakeError::Settings("light_direction must not be zero".into()));
        }
        Ok(())
    }

    /// Parse bake settings from a TOML string's [bake] section
    pub fn read(&mut self, toml_content: &str) -> Result<()> {
        let parsed: toml::Value = toml::from_str(toml_content)?;

        let section = parsed
            .get("bake")
            .ok_or_else(|| settings_error("Missing [bake] section in TOML"))?;

        if let Some(v) = section.get("width") {
            self.width = read_usize(v, "width")?;
        }
        if let Some(v) = section.get("height") {
            self.height = read_usize(v, "height")?;
        }
        if let Some(v) = section.get("rays_per_texel") {
            self.rays_per_texel = read_u32(v, "rays_per_texel")?;
        }
        if let Some(v) = section.get("iterations") {
            self.iterations = read_u32(v, "iterations")?;
        }

        if let Some(v) = section.get("mode") {
            self.mode = match read_str(v, "mode")? {
                "indirect" => BakeMode::Indirect,
                "ao" | "ambient_occlusion" => BakeMode::AmbientOcclusion,
                "directional" => BakeMode::Directional,
                other => return Err(settings_error(&format!("Unknown mode '{other}'"))),
            };
        }
        if let Some(v) = section.get("accumulation") {
            self.accumulation = match read_str(v, "accumulation")? {
                "average" | "running_average" => Accumulation::RunningAverage,
                "additive" => Accumulation::Additive,
                other => return Err(settings_error(&format!("Unknown accumulation '{other}'"))),
            };
        }
        if let Some(v) = section.get("intersector") {
            self.intersector = match read_str(v, "intersector")? {
                "brute_force" => IntersectorKind::BruteForce,
                "bvh" | "accelerated" => IntersectorKind::Accelerated,
                other => return Err(settings_error(&format!("Unknown intersector '{other}'"))),
            };
        }

        if let Some(v) = section.get("seed") {
            self.seed = Some(read_uint(v, "seed")?);
        }
        if let Some(v) = section.get("bias") {
            self.bias = read_float(v, "bias")?;
        }
        if let Some(v) = section.get("padding") {
            self.padding = read_u32(v, "padding")?;
        }
        if let Some(v) = section.get("triangles_per_step") {
            self.triangles_per_step = Some(read_usize(v, "triangles_per_step")?);
        }

        if let Some(v) = section.get("sky_color") {
            self.sky_color = parse_hex_color(read_str(v, "sky_color")?)?;
        }
        if let Some(v) = section.get("sky_intensity") {
            self.sky_intensity = read_float(v, "sky_intensity")?;
        }
        if let Some(v) = section.get("reflectivity") {
            self.reflectivity = read_float(v, "reflectivity")?;
        }

        if let Some(v) = section.get("light_direction") {
            let arr = v
                .as_array()
                .ok_or_else(|| settings_error("light_direction must be an array"))?;
            if arr.len() != 3 {
                return Err(settings_error("light_direction must have 3 elements"));
            }
            self.light_direction = [
                read_float(&arr[0], "light_direction[0]")?,
                read_float(&arr[1], "light_direction[1]")?,
                read_float(&arr[2], "light_direction[2]")?,
            ];
        }
        if let Some(v) = section.get("light_color") {
            self.light_color = parse_hex_color(read_str(v, "light_color")?)?;
        }
        if let Some(v) = section.get("light_intensity") {
            self.light_intensity = read_float(v, "light_intensity")?;
        }
        if let Some(v) = section.get("light_cone") {
            self.light_cone = read_float(v, "light_cone")?;
        }
        if let Some(v) = section.get("ambient_strength") {
            self.ambient_strength = read_float(v, "ambient_strength")?;
        }
        if let Some(v) = section.get("ao_radius") {
            self.ao_radius = read_float(v, "ao_radius")?;
        }

        if let Some(v) = section.get("denoise_passes") {
            self.denoise_passes = read_u32(v, "denoise_passes")?;
        }
        if let Some(v) = section.get("denoise_threshold") {
            self.denoise_threshold = read_float(v, "denoise_threshold")?;
        }
        if let Some(v) = section.get("inline_denoise") {
            self.inline_denoise = v
                .as_bool()
                .ok_or_else(|| settings_error("inline_denoise must be a boolean"))?;
        }

        if let Some(v) = section.get("sample_mode") {
            self.sample_mode = match read_str(v, "sample_mode")? {
                "nearest" => SampleMode::Nearest,
                "linear" => SampleMode::Linear,
                other => return Err(settings_error(&format!("Unknown sample_mode '{other}'"))),
            };
        }
        if let Some(v) = section.get("repeat_mode") {
            self.repeat_mode = match read_str(v, "repeat_mode")? {
                "clamp" => RepeatMode::ClampXY,
                "repeat" => RepeatMode::RepeatXY,
                "repeat_x" => RepeatMode::RepeatX,
                "repeat_y" => RepeatMode::RepeatY,
                other => return Err(settings_error(&format!("Unknown repeat_mode '{other}'"))),
            };
        }

        Ok(())
    }

    /// Loads defaults overlaid with the [bake] section of a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut settings = Self::default();
        settings.read(&content)?;
        Ok(settings)
    }

    /// Serializes the complete settings as a TOML document with a [bake] table.
    pub fn to_toml(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Document<'a> {
            bake: &'a BakeSettings,
        }
        Ok(toml::to_string(&Document { bake: self })?)
    }
}

fn settings_error(msg: &str) -> BakeError {
    BakeError::Settings(msg.to_string())
}

fn read_float(v: &toml::Value, name: &str) -> Result<f32> {
    v.as_float()
        .or_else(|| v.as_integer().map(|i| i as f64))
        .map(|f| f as f32)
        .ok_or_else(|| settings_error(&format!("{name} must be a number")))
}

fn read_uint(v: &toml::Value, name: &str) -> Result<u64> {
    v.as_integer()
        .filter(|i| *i >= 0)
        .map(|i| i as u64)
        .ok_or_else(|| settings_error(&format!("{name} must be a non-negative integer")))
}

fn read_u32(v: &toml::Value, name: &str) -> Result<u32> {
    u32::try_from(read_uint(v, name)?)
        .map_err(|_| settings_error(&format!("{name} is out of range")))
}

fn read_usize(v: &toml::Value, name: &str) -> Result<usize> {
    usize::try_from(read_uint(v, name)?)
        .map_err(|_| settings_error(&format!("{name} is out of range")))
}

fn read_str<'a>(v: &'a toml::Value, name: &str) -> Result<&'a str> {
    v.as_str()
        .ok_or_else(|| settings_error(&format!("{name} must be a string")))
}

/// Parse a hex color string like "#RRGGBB" or "RRGGBB" into RGB floats (0.0-1.0)
fn parse_hex_color(hex: &str) -> Result<[f32; 3]> {
    let hex = hex.trim_start_matches('#');

    if hex.len() != 6 || !hex.is_ascii() {
        return Err(settings_error(&format!(
            "Invalid hex color: expected 6 characters, got {}",
            hex.len()
        )));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .map_err(|err| settings_error(&format!("Invalid hex color '{hex}': {err}")))
    };

    let r = channel(0..2)?;
    let g = channel(2..4)?;
    let b = channel(4..6)?;

    Ok([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(BakeSettings::default().validate().is_ok());
        assert!(BakeSettings::new(0, 4, 4).validate().is_err());
        assert!(BakeSettings::new(1, 0, 4).validate().is_err());
        assert!(BakeSettings::new(1, 4, 4).iterations(0).validate().is_err());
    }

    #[test]
    fn read_overlays_bake_section() {
        let mut settings = BakeSettings::default();
        settings
            .read(
                r##"
                [bake]
                width = 64
                height = 32
                rays_per_texel = 16
                mode = "ao"
                intersector = "brute_force"
                seed = 7
                sky_color = "#FF8000"
                light_direction = [0, -1, 0.5]
                inline_denoise = false
                repeat_mode = "repeat"
                "##,
            )
            .unwrap();

        assert_eq!(settings.width, 64);
        assert_eq!(settings.height, 32);
        assert_eq!(settings.rays_per_texel, 16);
        assert_eq!(settings.mode, BakeMode::AmbientOcclusion);
        assert_eq!(settings.intersector, IntersectorKind::BruteForce);
        assert_eq!(settings.seed, Some(7));
        assert_eq!(settings.sky_color, [1.0, 128.0 / 255.0, 0.0]);
        assert_eq!(settings.light_direction, [0.0, -1.0, 0.5]);
        assert!(!settings.inline_denoise);
        assert_eq!(settings.repeat_mode, RepeatMode::RepeatXY);
        // Untouched
        assert_eq!(settings.iterations, DEFAULT_ITERATIONS);
    }

    #[test]
    fn read_rejects_bad_values() {
        let mut settings = BakeSettings::default();
        assert!(settings.read("[render]\nwidth = 3").is_err());
        assert!(settings.read("[bake]\nwidth = \"big\"").is_err());
        assert!(settings.read("[bake]\nmode = \"photon\"").is_err());
        assert!(settings.read("[bake]\nsky_color = \"#12\"").is_err());
        assert!(settings.read("[bake]\nlight_direction = [1, 2]").is_err());
    }

    #[test]
    fn read_rejects_out_of_range_counts() {
        let mut settings = BakeSettings::default();
        assert!(settings.read("[bake]\nrays_per_texel = 4294967297").is_err());
        assert!(settings.read("[bake]\niterations = 4294967296").is_err());
        assert!(settings.read("[bake]\ndenoise_passes = -1").is_err());
        assert_eq!(settings.rays_per_texel, DEFAULT_RAYS_PER_TEXEL);
        assert_eq!(settings.iterations, DEFAULT_ITERATIONS);

        settings.read("[bake]\nrays_per_texel = 4294967295").unwrap();
        assert_eq!(settings.rays_per_texel, u32::MAX);
    }

    #[test]
    fn light_helpers_normalize() {
        let settings = BakeSettings::default();
        let to_light = settings.to_light();
        assert!((to_light.magnitude() - 1.0).abs() < 1e-6);
        assert!(to_light.y > 0.0);
        assert_eq!(settings.sky(), Vec3::one());
    }

    #[test]
    fn toml_round_trip() {
        let settings = BakeSettings::new(32, 16, 16)
            .mode(BakeMode::Directional)
            .seed(99)
            .triangles_per_step(4);
        let text = settings.to_toml().unwrap();
        assert!(text.contains("[bake]"));

        #[derive(Deserialize)]
        struct Document {
            bake: BakeSettings,
        }
        let back: Document = toml::from_str(&text).unwrap();
        assert_eq!(back.bake, settings);
    }
}
