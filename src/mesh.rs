use crate::error::{BakeError, Result};
use vek::{Vec2, Vec3};

/// A triangle mesh as flat arrays: 3 floats per position, 2 floats per UV and
/// one index stream shared by positions and UVs.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Mesh {
    pub positions: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Creates a mesh, validating the arity of the arrays and the index range.
    pub fn new(positions: Vec<f32>, uvs: Vec<f32>, indices: Vec<u32>) -> Result<Self> {
        let mesh = Self {
            positions,
            uvs,
            indices,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Checks the arity of the arrays and that every index names a vertex.
    ///
    /// The fields are public, so a mesh assembled by hand or grown with
    /// [`Mesh::append`] is only known to be consistent after this passes.
    pub fn validate(&self) -> Result<()> {
        if self.positions.len() % 3 != 0 {
            return Err(BakeError::InvalidMesh(format!(
                "position array length {} is not a multiple of 3",
                self.positions.len()
            )));
        }
        if self.uvs.len() % 2 != 0 {
            return Err(BakeError::InvalidMesh(format!(
                "uv array length {} is not a multiple of 2",
                self.uvs.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(BakeError::InvalidMesh(format!(
                "index array length {} is not a multiple of 3",
                self.indices.len()
            )));
        }

        let vertex_count = self.vertex_count();
        if self.uvs.len() / 2 != vertex_count {
            return Err(BakeError::InvalidMesh(format!(
                "{} uvs for {} positions",
                self.uvs.len() / 2,
                vertex_count
            )));
        }
        if let Some(index) = self.indices.iter().find(|i| **i as usize >= vertex_count) {
            return Err(BakeError::InvalidMesh(format!(
                "index {index} out of range for {vertex_count} vertices"
            )));
        }
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn position(&self, index: u32) -> Vec3<f32> {
        let i = index as usize * 3;
        Vec3::new(self.positions[i], self.positions[i + 1], self.positions[i + 2])
    }

    pub fn uv(&self, index: u32) -> Vec2<f32> {
        let i = index as usize * 2;
        Vec2::new(self.uvs[i], self.uvs[i + 1])
    }

    /// The axis aligned bounds of all positions, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3<f32>, Vec3<f32>)> {
        if self.positions.is_empty() {
            return None;
        }
        let mut min = Vec3::broadcast(f32::MAX);
        let mut max = Vec3::broadcast(f32::MIN);
        for p in self.positions.chunks_exact(3) {
            min.x = min.x.min(p[0]);
            min.y = min.y.min(p[1]);
            min.z = min.z.min(p[2]);
            max.x = max.x.max(p[0]);
            max.y = max.y.max(p[1]);
            max.z = max.z.max(p[2]);
        }
        Some((min, max))
    }

    /// A two triangle quad spanning `origin + s * edge_u + t * edge_v`, UVs cover [0, 1]².
    /// The face normal points along `edge_u × edge_v`.
    pub fn quad(origin: Vec3<f32>, edge_u: Vec3<f32>, edge_v: Vec3<f32>) -> Self {
        let corners = [origin, origin + edge_u, origin + edge_u + edge_v, origin + edge_v];
        let mut positions = Vec::with_capacity(12);
        for c in corners {
            positions.extend_from_slice(&[c.x, c.y, c.z]);
        }

        Self {
            positions,
            uvs: vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// An axis aligned box with outward facing triangles. The six faces are laid out
    /// in a 3x2 UV atlas so no two faces share lightmap texels.
    pub fn from_box(x: f32, y: f32, z: f32, width: f32, height: f32, depth: f32) -> Self {
        let (x0, y0, z0) = (x, y, z);
        let (x1, y1, z1) = (x + width, y + height, z + depth);

        let faces = [
            // Front (-Z)
            [[x0, y0, z0], [x0, y1, z0], [x1, y1, z0], [x1, y0, z0]],
            // Back (+Z)
            [[x0, y0, z1], [x1, y0, z1], [x1, y1, z1], [x0, y1, z1]],
            // Left (-X)
            [[x0, y0, z0], [x0, y0, z1], [x0, y1, z1], [x0, y1, z0]],
            // Right (+X)
            [[x1, y0, z0], [x1, y1, z0], [x1, y1, z1], [x1, y0, z1]],
            // Bottom (-Y)
            [[x0, y0, z0], [x1, y0, z0], [x1, y0, z1], [x0, y0, z1]],
            // Top (+Y)
            [[x0, y1, z0], [x0, y1, z1], [x1, y1, z1], [x1, y1, z0]],
        ];
        let corner_uvs = [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]];

        // Keep a small gutter between atlas cells
        let margin = 0.02;
        let cell = Vec2::new(1.0 / 3.0, 0.5);

        let mut mesh = Mesh::default();
        for (face_index, face) in faces.iter().enumerate() {
            let base = mesh.vertex_count() as u32;
            let cell_min = Vec2::new((face_index % 3) as f32, (face_index / 3) as f32) * cell;

            for (corner, uv) in face.iter().zip(corner_uvs.iter()) {
                mesh.positions.extend_from_slice(corner);
                mesh.uvs.push(cell_min.x + margin + uv[0] * (cell.x - 2.0 * margin));
                mesh.uvs.push(cell_min.y + margin + uv[1] * (cell.y - 2.0 * margin));
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// Remaps all UVs from [0, 1]² into the rectangle `min..max`.
    pub fn with_uv_rect(mut self, min: Vec2<f32>, max: Vec2<f32>) -> Self {
        for uv in self.uvs.chunks_exact_mut(2) {
            uv[0] = min.x + uv[0] * (max.x - min.x);
            uv[1] = min.y + uv[1] * (max.y - min.y);
        }
        self
    }

    /// Reverses the winding of every triangle, turning face normals around.
    pub fn flipped(mut self) -> Self {
        for tri in self.indices.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
        self
    }

    /// Appends the triangles of `other`, UVs are copied unchanged.
    pub fn append(&mut self, other: &Mesh) {
        let base = self.vertex_count() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.uvs.extend_from_slice(&other.uvs);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }
}
