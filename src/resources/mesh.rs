//! Mesh data

use crate::backend::types::Vertex;

/// A mesh with vertex and index data
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
    pub name: String,
}

/// Outward normal of each face, in vertex order
const FACE_NORMALS: [[f32; 3]; 6] = [
    [-1.0, 0.0, 0.0],
    [0.0, -1.0, 0.0],
    [0.0, 0.0, -1.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];

/// Corner positions of each face, clockwise seen from outside
const FACE_CORNERS: [[[f32; 3]; 4]; 6] = [
    [[-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0], [-1.0, -1.0, 1.0]],
    [[-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, -1.0, -1.0]],
    [[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0]],
    [[1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0]],
    [[-1.0, 1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]],
    [[-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, -1.0, 1.0]],
];

const FACE_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]];

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            name: name.to_string(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Get vertex data as bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Get index data as bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// The 2x2x2 cube centered at the origin, four vertices per face.
    ///
    /// Shared by the skybox and the object: the skybox draws it with front
    /// faces culled so only the inside is visible.
    pub fn cube() -> Self {
        let mut mesh = Mesh::new("cube");

        for (face, corners) in FACE_CORNERS.iter().enumerate() {
            let base = mesh.vertices.len() as u16;
            for (corner, uv) in corners.iter().zip(FACE_UVS.iter()) {
                mesh.vertices
                    .push(Vertex::new(*corner, FACE_NORMALS[face], *uv));
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        log::debug!(
            "Built mesh {}: {} vertices, {} indices",
            mesh.name,
            mesh.vertex_count(),
            mesh.index_count()
        );
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_cube_counts() {
        let cube = Mesh::cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.index_count(), 36);
        assert_eq!(cube.vertex_bytes().len(), 24 * 32);
        assert_eq!(cube.index_bytes().len(), 36 * 2);
    }

    #[test]
    fn test_cube_first_face_data() {
        let cube = Mesh::cube();
        assert_eq!(
            cube.vertices[1],
            Vertex::new([-1.0, 1.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0])
        );
        assert_eq!(&cube.indices[..6], &[0, 1, 2, 2, 3, 0]);
        assert_eq!(&cube.indices[30..], &[20, 21, 22, 22, 23, 20]);
    }

    #[test]
    fn test_cube_faces_wind_clockwise_from_outside() {
        let cube = Mesh::cube();
        for tri in cube.indices.chunks(3) {
            let a = cube.vertices[tri[0] as usize];
            let b = cube.vertices[tri[1] as usize];
            let c = cube.vertices[tri[2] as usize];
            let n: Vec3 = (b.position - a.position).cross(c.position - a.position);
            assert!(n.dot(a.normal) < 0.0, "triangle {tri:?} winds outward");
        }
    }

    #[test]
    fn test_vertex_bytes_layout() {
        let cube = Mesh::cube();
        let floats: &[f32] = bytemuck::cast_slice(cube.vertex_bytes());
        assert_eq!(&floats[..8], &[-1.0, -1.0, -1.0, -1.0, 0.0, 0.0, 0.0, 0.0]);
    }
}
