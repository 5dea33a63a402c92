use crate::denoise::denoise;
use crate::error::Result;
use crate::integrator::StepContext;
use crate::patch::PatchGrid;
use crate::scheduler::{Advance, Scheduler};
use crate::tracer::{Intersector, Ray, build_intersector};
use crate::triangle::build_triangles;
use crate::{BakeSettings, Mesh, Patch, PixelBuffer, Texture, Triangle};
use instant::Instant;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use vek::{Vec3, Vec4};

/// The result of one [`Scene::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Patches were baked and committed.
    Baked {
        /// Iteration the step belonged to.
        iteration: u32,
        /// Total number of iterations.
        budget: u32,
        /// First triangle of the next step.
        cursor: usize,
    },
    /// The last iteration and the final denoise ran in this call.
    Finished,
    /// The bake was already complete, nothing changed.
    Idle,
}

/// A mesh prepared for progressive lightmap baking.
///
/// The scene owns the triangles, patches, lightmap, albedo, the random stream and
/// the bake progress. Call [`Scene::step`] once per frame until it reports
/// [`StepOutcome::Finished`].
pub struct Scene {
    settings: BakeSettings,

    triangles: Vec<Triangle>,
    grid: PatchGrid,
    intersector: Box<dyn Intersector>,

    lightmap: Texture,
    albedo: Texture,
    /// Primed direct light, kept so it survives averaging and resets.
    direct: Option<Texture>,

    rng: StdRng,
    scheduler: Scheduler,
}

impl Scene {
    /// Prepares a bake of `mesh` with the intersection strategy named in the settings.
    pub fn new(mesh: &Mesh, settings: BakeSettings) -> Result<Self> {
        mesh.validate()?;
        settings.validate()?;
        let triangles = build_triangles(mesh);
        let intersector = build_intersector(settings.intersector, mesh, &triangles)?;
        Self::build(triangles, settings, intersector)
    }

    /// Prepares a bake of `mesh` which queries the given intersector. The intersector
    /// has to index triangles in the order of the mesh index stream.
    pub fn with_intersector(
        mesh: &Mesh,
        settings: BakeSettings,
        intersector: Box<dyn Intersector>,
    ) -> Result<Self> {
        mesh.validate()?;
        settings.validate()?;
        Self::build(build_triangles(mesh), settings, intersector)
    }

    fn build(
        triangles: Vec<Triangle>,
        settings: BakeSettings,
        intersector: Box<dyn Intersector>,
    ) -> Result<Self> {
        let lightmap = Texture::alloc(settings.width, settings.height);
        let albedo = Texture::white(settings.width, settings.height);

        let grid = PatchGrid::build(&triangles, &lightmap, settings.padding as i32, settings.bias);
        if grid.degenerate > 0 {
            warn!(
                "{} of {} triangles have no UV area and will not be baked",
                grid.degenerate,
                triangles.len()
            );
        }

        let seed = settings.seed.unwrap_or_else(|| rand::rng().random());
        let scheduler = Scheduler::new(
            settings.iterations,
            triangles.len(),
            settings.triangles_per_step,
        );

        info!(
            "Scene: {} triangles, {} patches, {}x{} lightmap, {:?} mode, {} intersector",
            triangles.len(),
            grid.len(),
            settings.width,
            settings.height,
            settings.mode,
            intersector.name()
        );

        Ok(Self {
            triangles,
            grid,
            intersector,
            lightmap,
            albedo,
            direct: None,
            rng: StdRng::seed_from_u64(seed),
            scheduler,
            settings,
        })
    }

    /// Replaces the albedo with an image file. On error the scene is left unchanged.
    pub fn load_albedo(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let texture = Texture::from_image(path.as_ref())?;
        self.set_albedo(texture);
        Ok(())
    }

    pub fn set_albedo(&mut self, albedo: Texture) {
        if albedo.width != self.lightmap.width || albedo.height != self.lightmap.height {
            warn!(
                "Albedo is {}x{}, lightmap is {}x{}",
                albedo.width, albedo.height, self.lightmap.width, self.lightmap.height
            );
        }
        self.albedo = albedo;
    }

    /// Writes `max(0, n·l)` into the texel of every patch which sees a light traveling
    /// along `direction`. The texels stay marked as unconverged.
    ///
    /// The primed light is kept as an emitted term: running average steps add it to
    /// every estimate, additive steps build on top of it.
    pub fn prime_direct_light(&mut self, direction: Vec3<f32>) {
        let to_light = -direction.normalized();
        let mut direct = Texture::alloc(self.lightmap.width, self.lightmap.height);
        for patch in &self.grid.patches {
            let diffuse = patch.normal.dot(to_light);
            if diffuse <= 0.0 {
                continue;
            }
            let ray = Ray::new(patch.origin, to_light);
            if !self
                .intersector
                .occluded(&ray, 0.0, f32::MAX, Some(patch.triangle))
            {
                direct.set(
                    patch.pixel.x,
                    patch.pixel.y,
                    Vec4::new(diffuse, diffuse, diffuse, 0.0),
                );
            }
        }
        direct.commit();

        for patch in &self.grid.patches {
            if let Some(value) = direct.get(patch.pixel.x, patch.pixel.y) {
                if value.x > 0.0 {
                    self.lightmap.set(patch.pixel.x, patch.pixel.y, value);
                }
            }
        }
        self.lightmap.commit();
        self.direct = Some(direct);
    }

    /// Runs the next slice of the bake. Returns immediately once the bake is complete.
    pub fn step(&mut self) -> StepOutcome {
        let Some((iteration, triangles)) = self.scheduler.next_slice() else {
            return StepOutcome::Idle;
        };

        let start = Instant::now();
        let step_seed: u64 = self.rng.random();
        let range = self.grid.of_triangles(triangles.clone());

        let values = {
            let ctx = StepContext {
                triangles: &self.triangles,
                intersector: self.intersector.as_ref(),
                lightmap: &self.lightmap,
                albedo: &self.albedo,
                direct: self.direct.as_ref(),
                settings: &self.settings,
                iteration,
            };
            ctx.bake_patches(&self.grid.patches[range.clone()], range.start, step_seed)
        };

        for (patch, value) in self.grid.patches[range.clone()].iter().zip(values) {
            self.lightmap.set(patch.pixel.x, patch.pixel.y, value);
        }
        self.lightmap.commit();

        let advance = self.scheduler.advance();
        debug!(
            "Iteration {}/{}: baked {} patches of triangles {:?} in {} ms",
            iteration + 1,
            self.scheduler.budget(),
            range.len(),
            triangles,
            start.elapsed().as_millis()
        );

        if advance == Advance::Finished {
            let filled = denoise(
                &mut self.lightmap,
                self.settings.denoise_passes as usize,
                self.settings.denoise_threshold,
            );
            info!(
                "Bake finished after {} iterations, denoise filled {} texels",
                self.scheduler.iteration(),
                filled
            );
            return StepOutcome::Finished;
        }

        StepOutcome::Baked {
            iteration,
            budget: self.scheduler.budget(),
            cursor: self.scheduler.cursor(),
        }
    }

    /// Steps until the bake is complete, returns the number of steps taken.
    pub fn bake_to_completion(&mut self) -> usize {
        let mut steps = 0;
        while self.step() != StepOutcome::Idle {
            steps += 1;
        }
        steps
    }

    /// Clears the lightmap back to the primed direct light, or to black, and restarts
    /// the bake. The random stream continues.
    pub fn reset(&mut self) {
        match &self.direct {
            Some(direct) => self.lightmap = direct.clone(),
            None => self.lightmap.clear(Vec4::zero()),
        }
        self.scheduler.reset();
    }

    /// The committed lightmap.
    pub fn lightmap(&self) -> &Texture {
        &self.lightmap
    }

    pub fn albedo(&self) -> &Texture {
        &self.albedo
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn patches(&self) -> &[Patch] {
        &self.grid.patches
    }

    pub fn intersector(&self) -> &dyn Intersector {
        self.intersector.as_ref()
    }

    pub fn settings(&self) -> &BakeSettings {
        &self.settings
    }

    /// Completed iterations.
    pub fn iteration(&self) -> u32 {
        self.scheduler.iteration()
    }

    pub fn progress(&self) -> f32 {
        self.scheduler.progress()
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }
}
