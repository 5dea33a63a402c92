pub mod accel;
pub mod brute;

pub use accel::BvhIntersector;
pub use brute::BruteForce;

use crate::error::Result;
use crate::{Mesh, Triangle};
use serde::{Deserialize, Serialize};
use vek::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3<f32>,
    pub dir: Vec3<f32>,
}

impl Default for Ray {
    fn default() -> Self {
        Ray::empty()
    }
}

impl Ray {
    pub fn new(o: Vec3<f32>, d: Vec3<f32>) -> Self {
        Self { origin: o, dir: d }
    }
    pub fn empty() -> Self {
        Self {
            origin: Vec3::zero(),
            dir: Vec3::zero(),
        }
    }
    pub fn at(&self, t: f32) -> Vec3<f32> {
        self.origin + self.dir * t
    }
}

/// The closest hit of a ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: f32,
    pub triangle_index: usize,
}

/// Selects the ray intersection strategy when a scene is constructed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntersectorKind {
    /// Linear scan over every triangle.
    BruteForce,
    /// Bounding volume hierarchy built once over the mesh.
    #[default]
    Accelerated,
}

/// Closest-hit queries over the triangles of a scene.
///
/// Implementations are built once and only queried afterwards, so they have to be
/// shareable across the worker threads of a bake step. Triangle indices follow the
/// order of the mesh index stream.
pub trait Intersector: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the closest hit with `t` in `t_min..=t_max`, never reporting `exclude`.
    fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32, exclude: Option<usize>) -> Option<Hit>;

    /// True if anything blocks the ray inside `t_min..=t_max`.
    fn occluded(&self, ray: &Ray, t_min: f32, t_max: f32, exclude: Option<usize>) -> bool {
        self.intersect(ray, t_min, t_max, exclude).is_some()
    }
}

/// Builds the requested intersection strategy.
pub fn build_intersector(
    kind: IntersectorKind,
    mesh: &Mesh,
    triangles: &[Triangle],
) -> Result<Box<dyn Intersector>> {
    Ok(match kind {
        IntersectorKind::BruteForce => Box::new(BruteForce::new(triangles.to_vec())),
        IntersectorKind::Accelerated => {
            Box::new(BvhIntersector::build(&mesh.positions, &mesh.indices)?)
        }
    })
}
