use crate::{Texture, Triangle};
use std::ops::Range;
use vek::{Vec2, Vec3};

/// The surface behind one covered lightmap texel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Patch {
    /// Index of the owning triangle.
    pub triangle: usize,
    /// Lightmap texel coordinates.
    pub pixel: Vec2<i32>,
    /// Face normal of the owning triangle.
    pub normal: Vec3<f32>,
    /// World position of the texel center, already offset along the normal.
    pub origin: Vec3<f32>,
}

/// The patches of a mesh, grouped by owning triangle.
#[derive(Debug, Clone, Default)]
pub struct PatchGrid {
    pub patches: Vec<Patch>,
    /// For each triangle the range of its patches in `patches`.
    pub ranges: Vec<Range<usize>>,
    /// Triangles which produced no patch because their UV area is zero.
    pub degenerate: usize,
}

impl PatchGrid {
    /// Rasterizes the UV bounding box of every triangle at texel granularity and
    /// emits a patch for each texel center covered by the triangle.
    ///
    /// `padding` widens each box by that many texels, `bias` is the offset of the
    /// patch origin along the normal.
    pub fn build(triangles: &[Triangle], lightmap: &Texture, padding: i32, bias: f32) -> Self {
        let mut grid = PatchGrid {
            patches: vec![],
            ranges: Vec::with_capacity(triangles.len()),
            degenerate: 0,
        };

        let max_x = lightmap.width as i32 - 1;
        let max_y = lightmap.height as i32 - 1;

        for (tri_index, tri) in triangles.iter().enumerate() {
            let start = grid.patches.len();

            if tri.uv_area() == 0.0 {
                grid.degenerate += 1;
                grid.ranges.push(start..start);
                continue;
            }

            let tex_min = lightmap.to_pixel_coords(tri.tex_min) - padding;
            let tex_max = lightmap.to_pixel_coords(tri.tex_max) + padding;

            for y in tex_min.y.max(0)..=tex_max.y.min(max_y) {
                for x in tex_min.x.max(0)..=tex_max.x.min(max_x) {
                    if let Some(point) = tri.uv_to_world(lightmap.to_uv_coords(x, y)) {
                        let normal = tri.normal();
                        grid.patches.push(Patch {
                            triangle: tri_index,
                            pixel: Vec2::new(x, y),
                            normal,
                            origin: point + normal * bias,
                        });
                    }
                }
            }

            grid.ranges.push(start..grid.patches.len());
        }

        grid
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// The patches of the triangles in `triangles`.
    pub fn of_triangles(&self, triangles: Range<usize>) -> Range<usize> {
        let start = self.ranges.get(triangles.start).map_or(self.patches.len(), |r| r.start);
        let end = triangles
            .end
            .checked_sub(1)
            .and_then(|last| self.ranges.get(last))
            .map_or(start, |r| r.end);
        start..end.max(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mesh, triangle::build_triangles};
    use std::collections::HashSet;

    #[test]
    fn unit_quad_covers_every_texel() {
        let mesh = Mesh::quad(Vec3::zero(), Vec3::unit_x(), -Vec3::unit_z());
        let triangles = build_triangles(&mesh);
        let lightmap = Texture::alloc(4, 4);
        let grid = PatchGrid::build(&triangles, &lightmap, 1, 0.001);

        let texels: HashSet<(i32, i32)> = grid.patches.iter().map(|p| (p.pixel.x, p.pixel.y)).collect();
        assert_eq!(texels.len(), 16);

        // Texel centers on the shared diagonal are claimed by both triangles
        assert_eq!(grid.len(), 20);
        assert_eq!(grid.ranges.len(), 2);
        assert_eq!(grid.of_triangles(0..2), 0..20);
    }

    #[test]
    fn uv_degenerate_triangle_emits_nothing() {
        let mut mesh = Mesh::quad(Vec3::zero(), Vec3::unit_x(), -Vec3::unit_z());
        // Same positions, all UVs collapsed to one point
        let collapsed = Mesh::new(
            mesh.positions[..9].to_vec(),
            vec![0.5, 0.5, 0.5, 0.5, 0.5, 0.5],
            vec![0, 1, 2],
        )
        .unwrap();
        mesh.append(&collapsed);

        let triangles = build_triangles(&mesh);
        let lightmap = Texture::alloc(4, 4);
        let grid = PatchGrid::build(&triangles, &lightmap, 1, 0.001);

        assert_eq!(grid.degenerate, 1);
        assert!(grid.patches.iter().all(|p| p.triangle != 2));
        assert!(grid.ranges[2].is_empty());
    }

    #[test]
    fn patch_origins_are_biased_along_the_normal() {
        let mesh = Mesh::quad(Vec3::zero(), Vec3::unit_x(), -Vec3::unit_z());
        let triangles = build_triangles(&mesh);
        let lightmap = Texture::alloc(8, 8);
        let grid = PatchGrid::build(&triangles, &lightmap, 0, 0.01);

        for patch in &grid.patches {
            assert_eq!(patch.normal, Vec3::unit_y());
            assert!((patch.origin.y - 0.01).abs() < 1e-6);
            let uv = lightmap.to_uv_coords(patch.pixel.x, patch.pixel.y);
            let back = triangles[patch.triangle]
                .world_to_uv(patch.origin - patch.normal * 0.01)
                .unwrap();
            assert!((back - uv).magnitude() < 1e-5);
        }
    }
}
