use super::{Hit, Intersector, Ray};
use crate::error::{BakeError, Result};
use crate::triangle::PARALLEL_EPSILON;
use bvh::aabb::{Aabb, Bounded};
use bvh::bounding_hierarchy::BHShape;
use bvh::bvh::Bvh;
use bvh::ray::Ray as BvhRay;
use nalgebra::{Point3, Vector3};
use vek::Vec3;

/// Boxes of axis aligned triangles are flat, grow them so slab tests stay robust.
const AABB_PADDING: f32 = 1e-4;

/// One triangle of the triangle soup the hierarchy is built over.
struct SoupTriangle {
    index: usize,
    a: Vec3<f32>,
    b: Vec3<f32>,
    c: Vec3<f32>,
    node_index: usize,
}

impl Bounded<f32, 3> for SoupTriangle {
    fn aabb(&self) -> Aabb<f32, 3> {
        let min = Point3::new(
            self.a.x.min(self.b.x).min(self.c.x) - AABB_PADDING,
            self.a.y.min(self.b.y).min(self.c.y) - AABB_PADDING,
            self.a.z.min(self.b.z).min(self.c.z) - AABB_PADDING,
        );
        let max = Point3::new(
            self.a.x.max(self.b.x).max(self.c.x) + AABB_PADDING,
            self.a.y.max(self.b.y).max(self.c.y) + AABB_PADDING,
            self.a.z.max(self.b.z).max(self.c.z) + AABB_PADDING,
        );
        Aabb::with_bounds(min, max)
    }
}

impl BHShape<f32, 3> for SoupTriangle {
    fn set_bh_node_index(&mut self, index: usize) {
        self.node_index = index;
    }

    fn bh_node_index(&self) -> usize {
        self.node_index
    }
}

impl SoupTriangle {
    /// Two-sided Möller–Trumbore, returns the hit distance.
    ///
    /// Parallel rays are rejected on the unit face normal, the same test the brute
    /// force strategy uses, so the result does not depend on the triangle's size.
    fn intersect(&self, ray: &Ray) -> Option<f32> {
        let edge1 = self.b - self.a;
        let edge2 = self.c - self.a;

        let normal = edge1.cross(edge2);
        let area = normal.magnitude();
        if area == 0.0 || (normal / area).dot(ray.dir).abs() < PARALLEL_EPSILON {
            return None;
        }

        let h = ray.dir.cross(edge2);
        let det = edge1.dot(h);
        if det == 0.0 {
            return None;
        }

        let f = 1.0 / det;
        let s = ray.origin - self.a;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.dir.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        Some(f * edge2.dot(q))
    }
}

/// Delegates ray queries to a bounding volume hierarchy built from the raw
/// vertex and index buffers of the mesh.
pub struct BvhIntersector {
    shapes: Vec<SoupTriangle>,
    bvh: Bvh<f32, 3>,
}

impl BvhIntersector {
    /// Builds the hierarchy from 3 floats per vertex and 3 indices per triangle.
    pub fn build(vertices: &[f32], indices: &[u32]) -> Result<Self> {
        if indices.is_empty() {
            return Err(BakeError::Backend(
                "cannot build a hierarchy over an empty triangle soup".into(),
            ));
        }

        let vertex = |i: u32| -> Result<Vec3<f32>> {
            let o = i as usize * 3;
            vertices
                .get(o..o + 3)
                .map(|p| Vec3::new(p[0], p[1], p[2]))
                .ok_or_else(|| BakeError::Backend(format!("vertex index {i} out of range")))
        };

        let mut shapes = Vec::with_capacity(indices.len() / 3);
        for (index, tri) in indices.chunks_exact(3).enumerate() {
            shapes.push(SoupTriangle {
                index,
                a: vertex(tri[0])?,
                b: vertex(tri[1])?,
                c: vertex(tri[2])?,
                node_index: 0,
            });
        }

        let bvh = Bvh::build(&mut shapes);
        Ok(Self { shapes, bvh })
    }
}

impl Intersector for BvhIntersector {
    fn name(&self) -> &str {
        "bvh"
    }

    fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32, exclude: Option<usize>) -> Option<Hit> {
        let bvh_ray = BvhRay::new(
            Point3::new(ray.origin.x, ray.origin.y, ray.origin.z),
            Vector3::new(ray.dir.x, ray.dir.y, ray.dir.z),
        );

        let mut closest: Option<Hit> = None;
        for shape in self.bvh.traverse(&bvh_ray, &self.shapes) {
            if exclude == Some(shape.index) {
                continue;
            }
            if let Some(t) = shape.intersect(ray) {
                let limit = closest.map_or(t_max, |hit| hit.t);
                if t >= 0.0 && t >= t_min && t <= limit {
                    closest = Some(Hit {
                        t,
                        triangle_index: shape.index,
                    });
                }
            }
        }
        closest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mesh;
    use crate::tracer::BruteForce;
    use crate::triangle::build_triangles;

    #[test]
    fn empty_soup_fails_to_build() {
        assert!(BvhIntersector::build(&[], &[]).is_err());
        assert!(BvhIntersector::build(&[0.0; 6], &[0, 1, 2]).is_err());
    }

    #[test]
    fn agrees_with_brute_force() {
        let mesh = Mesh::from_box(-1.0, -1.0, -1.0, 2.0, 2.0, 2.0);
        let bvh = BvhIntersector::build(&mesh.positions, &mesh.indices).unwrap();
        let brute = BruteForce::new(build_triangles(&mesh));

        let dirs = [
            Vec3::new(1.0, 0.2, 0.1),
            Vec3::new(-0.3, 1.0, 0.4),
            Vec3::new(0.1, -0.2, -1.0),
            Vec3::new(-1.0, -1.0, 0.5),
        ];
        for dir in dirs {
            let ray = Ray::new(Vec3::new(0.1, 0.2, -0.3), dir.normalized());
            let a = bvh.intersect(&ray, 0.0, f32::MAX, None).unwrap();
            let b = brute.intersect(&ray, 0.0, f32::MAX, None).unwrap();
            assert_eq!(a.triangle_index, b.triangle_index);
            assert!((a.t - b.t).abs() < 1e-4);

            assert!(bvh.intersect(&ray, 0.0, a.t * 0.5, None).is_none());
            let other = bvh.intersect(&ray, 0.0, f32::MAX, Some(a.triangle_index));
            assert!(other.is_none_or(|h| h.triangle_index != a.triangle_index));
        }
    }

    #[test]
    fn tiny_triangles_hit_like_brute_force() {
        let mesh = Mesh::quad(Vec3::zero(), Vec3::new(2e-4, 0.0, 0.0), Vec3::new(0.0, 0.0, -2e-4));
        let bvh = BvhIntersector::build(&mesh.positions, &mesh.indices).unwrap();
        let brute = BruteForce::new(build_triangles(&mesh));

        let down = Ray::new(Vec3::new(1.5e-4, 1.0, -0.5e-4), -Vec3::unit_y());
        let a = bvh.intersect(&down, 0.0, f32::MAX, None).unwrap();
        let b = brute.intersect(&down, 0.0, f32::MAX, None).unwrap();
        assert_eq!(a.triangle_index, 0);
        assert_eq!(a.triangle_index, b.triangle_index);
        assert!((a.t - 1.0).abs() < 1e-4 && (b.t - 1.0).abs() < 1e-4);

        let beside = Ray::new(Vec3::new(3e-4, 1.0, -0.5e-4), -Vec3::unit_y());
        assert!(bvh.intersect(&beside, 0.0, f32::MAX, None).is_none());
        assert!(brute.intersect(&beside, 0.0, f32::MAX, None).is_none());
    }
}
