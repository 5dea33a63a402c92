use crate::Mesh;
use crate::tracer::Ray;
use vek::{Vec2, Vec3};

/// Rays closer to parallel with a triangle plane than this are treated as misses.
pub const PARALLEL_EPSILON: f32 = f32::EPSILON;

/// Tolerance for hit points which land a rounding error outside of a triangle.
const WORLD_BARYCENTRIC_EPSILON: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub origin: Vec3<f32>,
    pub normal: Vec3<f32>,
    pub uv: Vec2<f32>,
}

impl Vertex {
    pub fn new(origin: Vec3<f32>, normal: Vec3<f32>, uv: Vec2<f32>) -> Self {
        Self { origin, normal, uv }
    }
}

/// A flat shaded triangle. All three vertices carry the face normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vertex,
    pub b: Vertex,
    pub c: Vertex,

    /// Component-wise min / max of the three UVs.
    pub tex_min: Vec2<f32>,
    pub tex_max: Vec2<f32>,
}

impl Triangle {
    pub fn new(a: Vertex, b: Vertex, c: Vertex) -> Self {
        let tex_min = Vec2::new(a.uv.x.min(b.uv.x).min(c.uv.x), a.uv.y.min(b.uv.y).min(c.uv.y));
        let tex_max = Vec2::new(a.uv.x.max(b.uv.x).max(c.uv.x), a.uv.y.max(b.uv.y).max(c.uv.y));
        Self {
            a,
            b,
            c,
            tex_min,
            tex_max,
        }
    }

    /// Builds a triangle from positions and UVs, computing the face normal.
    pub fn from_corners(p: [Vec3<f32>; 3], uv: [Vec2<f32>; 3]) -> Self {
        let normal = face_normal(p[0], p[1], p[2]);
        Self::new(
            Vertex::new(p[0], normal, uv[0]),
            Vertex::new(p[1], normal, uv[1]),
            Vertex::new(p[2], normal, uv[2]),
        )
    }

    #[inline(always)]
    pub fn normal(&self) -> Vec3<f32> {
        self.a.normal
    }

    /// Signed area of the triangle in UV space.
    pub fn uv_area(&self) -> f32 {
        signed_area(self.a.uv, self.b.uv, self.c.uv)
    }

    /// Maps a UV coordinate onto the triangle surface.
    ///
    /// Returns `None` if the triangle has no UV area or the coordinate lies outside of it.
    pub fn uv_to_world(&self, uv: Vec2<f32>) -> Option<Vec3<f32>> {
        let denom = self.uv_area();
        if denom == 0.0 {
            return None;
        }

        let u = signed_area(self.b.uv, self.c.uv, uv) / denom;
        if u < 0.0 {
            return None;
        }
        let v = signed_area(self.c.uv, self.a.uv, uv) / denom;
        if v < 0.0 {
            return None;
        }
        let w = signed_area(self.a.uv, self.b.uv, uv) / denom;
        if w < 0.0 {
            return None;
        }

        Some(self.a.origin * u + self.b.origin * v + self.c.origin * w)
    }

    /// Maps a point on the triangle plane back into UV space.
    pub fn world_to_uv(&self, point: Vec3<f32>) -> Option<Vec2<f32>> {
        let v0 = self.b.origin - self.a.origin;
        let v1 = self.c.origin - self.a.origin;
        let v2 = point - self.a.origin;

        let d00 = v0.dot(v0);
        let d01 = v0.dot(v1);
        let d11 = v1.dot(v1);
        let d20 = v2.dot(v0);
        let d21 = v2.dot(v1);

        let denom = d00 * d11 - d01 * d01;
        if denom == 0.0 {
            return None;
        }

        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        let u = 1.0 - v - w;
        if u < -WORLD_BARYCENTRIC_EPSILON
            || v < -WORLD_BARYCENTRIC_EPSILON
            || w < -WORLD_BARYCENTRIC_EPSILON
        {
            return None;
        }

        Some(self.a.uv * u + self.b.uv * v + self.c.uv * w)
    }

    /// Intersects the ray with the triangle plane and tests the hit point against the
    /// three edges. Returns the hit distance if it lies in `t_min..=t_max`.
    pub fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<f32> {
        let n = self.a.normal;

        let normal_dot_ray = n.dot(ray.dir);
        if normal_dot_ray.abs() < PARALLEL_EPSILON {
            return None;
        }

        let t = -(n.dot(ray.origin) - n.dot(self.a.origin)) / normal_dot_ray;
        if t < 0.0 || t < t_min || t > t_max {
            return None;
        }

        let hit = ray.at(t);
        let edges = [
            (self.a.origin, self.b.origin),
            (self.b.origin, self.c.origin),
            (self.c.origin, self.a.origin),
        ];
        for (from, to) in edges {
            if n.dot((to - from).cross(hit - from)) < 0.0 {
                return None;
            }
        }

        Some(t)
    }
}

/// Normalized `(b - a) × (c - a)`, zero for degenerate triangles.
pub fn face_normal(a: Vec3<f32>, b: Vec3<f32>, c: Vec3<f32>) -> Vec3<f32> {
    let n = (b - a).cross(c - a);
    let len = n.magnitude();
    if len > 0.0 { n / len } else { Vec3::zero() }
}

#[inline(always)]
fn signed_area(a: Vec2<f32>, b: Vec2<f32>, c: Vec2<f32>) -> f32 {
    let v1 = a - c;
    let v2 = b - c;
    (v1.x * v2.y - v1.y * v2.x) * 0.5
}

/// Builds one triangle per index triple of the mesh.
pub fn build_triangles(mesh: &Mesh) -> Vec<Triangle> {
    mesh.indices
        .chunks_exact(3)
        .map(|tri| {
            Triangle::from_corners(
                [mesh.position(tri[0]), mesh.position(tri[1]), mesh.position(tri[2])],
                [mesh.uv(tri[0]), mesh.uv(tri[1]), mesh.uv(tri[2])],
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> Triangle {
        Triangle::from_corners(
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, -2.0),
            ],
            [Vec2::new(0.1, 0.1), Vec2::new(0.9, 0.1), Vec2::new(0.1, 0.9)],
        )
    }

    #[test]
    fn face_normal_and_uv_bounds() {
        let t = tri();
        assert_eq!(t.normal(), Vec3::unit_y());
        assert_eq!(t.b.normal, t.a.normal);
        assert_eq!(t.tex_min, Vec2::new(0.1, 0.1));
        assert_eq!(t.tex_max, Vec2::new(0.9, 0.9));
    }

    #[test]
    fn uv_world_uv_round_trip() {
        let t = tri();
        for uv in [
            Vec2::new(0.2, 0.2),
            Vec2::new(0.5, 0.3),
            Vec2::new(0.15, 0.8),
            Vec2::new(0.3, 0.3),
        ] {
            let p = t.uv_to_world(uv).unwrap();
            let back = t.world_to_uv(p).unwrap();
            assert!((back - uv).magnitude() < 1e-5, "{uv:?} -> {back:?}");
        }
    }

    #[test]
    fn points_outside_are_rejected() {
        let t = tri();
        assert!(t.uv_to_world(Vec2::new(0.8, 0.8)).is_none());
        assert!(t.uv_to_world(Vec2::new(0.05, 0.5)).is_none());
        assert!(t.world_to_uv(Vec3::new(3.0, 0.0, -3.0)).is_none());
    }

    #[test]
    fn degenerate_uv_area_maps_nothing() {
        let mut t = tri();
        t.b.uv = t.a.uv;
        t.c.uv = t.a.uv;
        assert_eq!(t.uv_area(), 0.0);
        assert!(t.uv_to_world(t.a.uv).is_none());
    }

    #[test]
    fn ray_plane_intersection() {
        let t = tri();
        let down = Ray::new(Vec3::new(0.5, 1.0, -0.5), -Vec3::unit_y());
        assert_eq!(t.intersect(&down, 0.0, f32::MAX), Some(1.0));

        // Limited interval
        assert_eq!(t.intersect(&down, 0.0, 0.5), None);

        // Behind the origin
        let up = Ray::new(Vec3::new(0.5, 1.0, -0.5), Vec3::unit_y());
        assert_eq!(t.intersect(&up, 0.0, f32::MAX), None);

        // Parallel to the plane
        let flat = Ray::new(Vec3::new(0.5, 1.0, -0.5), Vec3::unit_x());
        assert_eq!(t.intersect(&flat, 0.0, f32::MAX), None);

        // Outside of the edges
        let miss = Ray::new(Vec3::new(1.8, 1.0, -1.8), -Vec3::unit_y());
        assert_eq!(t.intersect(&miss, 0.0, f32::MAX), None);
    }
}
