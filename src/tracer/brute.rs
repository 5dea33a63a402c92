use super::{Hit, Intersector, Ray};
use crate::Triangle;

/// Tests every ray against every triangle.
pub struct BruteForce {
    triangles: Vec<Triangle>,
}

impl BruteForce {
    pub fn new(triangles: Vec<Triangle>) -> Self {
        Self { triangles }
    }
}

impl Intersector for BruteForce {
    fn name(&self) -> &str {
        "brute force"
    }

    fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32, exclude: Option<usize>) -> Option<Hit> {
        let mut closest: Option<Hit> = None;
        for (index, tri) in self.triangles.iter().enumerate() {
            if exclude == Some(index) {
                continue;
            }
            let limit = closest.map_or(t_max, |hit| hit.t);
            if let Some(t) = tri.intersect(ray, t_min, limit) {
                closest = Some(Hit {
                    t,
                    triangle_index: index,
                });
            }
        }
        closest
    }

    fn occluded(&self, ray: &Ray, t_min: f32, t_max: f32, exclude: Option<usize>) -> bool {
        self.triangles
            .iter()
            .enumerate()
            .any(|(index, tri)| exclude != Some(index) && tri.intersect(ray, t_min, t_max).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mesh, triangle::build_triangles};
    use vek::Vec3;

    /// Two stacked floors, y = 0 and y = 1.
    fn stack() -> BruteForce {
        let mut mesh = Mesh::quad(Vec3::zero(), Vec3::unit_x(), -Vec3::unit_z());
        mesh.append(&Mesh::quad(Vec3::unit_y(), Vec3::unit_x(), -Vec3::unit_z()));
        BruteForce::new(build_triangles(&mesh))
    }

    #[test]
    fn closest_hit_wins() {
        let bf = stack();
        let ray = Ray::new(Vec3::new(0.3, 2.0, -0.6), -Vec3::unit_y());
        let hit = bf.intersect(&ray, 0.0, f32::MAX, None).unwrap();
        assert!(hit.triangle_index >= 2);
        assert!((hit.t - 1.0).abs() < 1e-6);

        assert!(bf.occluded(&ray, 0.0, 1.5, None));
        assert!(!bf.occluded(&ray, 0.0, 0.5, None));
    }

    #[test]
    fn excluded_triangle_never_reports() {
        let bf = stack();
        // Straight up from just above the lower floor, the upper floor is hit
        let ray = Ray::new(Vec3::new(0.7, 0.001, -0.2), Vec3::unit_y());
        let hit = bf.intersect(&ray, 0.0, f32::MAX, None).unwrap();
        assert!((hit.t - 0.999).abs() < 1e-5);

        let skipped = bf.intersect(&ray, 0.0, f32::MAX, Some(hit.triangle_index));
        assert!(skipped.is_none());
    }
}
