// mesh.rs - inverted sphere the panorama is painted on
//
// Positions are mirrored on X compared to an outward-facing UV sphere, so triangles wind
// counter-clockwise and normals point at the centre when seen from inside.

use std::f32::consts::PI;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SphereVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl SphereVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SphereVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SphereMesh {
    pub vertices: Vec<SphereVertex>,
    /// Inward unit normals, one per vertex.
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

/// `lon` segments around the vertical axis, `lat` from pole to pole.
pub fn build_inverted_sphere(radius: f32, lon: usize, lat: usize) -> SphereMesh {
    let mut vertices = Vec::with_capacity((lat + 1) * (lon + 1));
    let mut normals = Vec::with_capacity((lat + 1) * (lon + 1));
    let mut indices = Vec::with_capacity(lat * lon * 6);

    for i in 0..=lat {
        let v = i as f32 / lat as f32;
        let theta = PI * v;
        let (sin_t, cos_t) = theta.sin_cos();

        for j in 0..=lon {
            let u = j as f32 / lon as f32;
            let phi = 2.0 * PI * u;
            let (sin_p, cos_p) = phi.sin_cos();

            let dir = [cos_p * sin_t, cos_t, sin_p * sin_t];
            vertices.push(SphereVertex {
                position: [radius * dir[0], radius * dir[1], radius * dir[2]],
                // v = 0 is the top row of the image
                uv: [u, v],
            });
            normals.push([-dir[0], -dir[1], -dir[2]]);
        }
    }

    for i in 0..lat {
        for j in 0..lon {
            let a = (i * (lon + 1) + j) as u32;
            let b = a + (lon + 1) as u32;

            indices.extend_from_slice(&[a, b, a + 1, b, b + 1, a + 1]);
        }
    }

    SphereMesh {
        vertices,
        normals,
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn vertex_and_index_counts() {
        let m = build_inverted_sphere(500.0, 64, 48);
        assert_eq!(m.vertices.len(), 65 * 49);
        assert_eq!(m.normals.len(), m.vertices.len());
        assert_eq!(m.indices.len(), 64 * 48 * 6);
        assert!(m.indices.iter().all(|&i| (i as usize) < m.vertices.len()));
    }

    #[test]
    fn all_vertices_lie_on_the_radius() {
        let m = build_inverted_sphere(500.0, 16, 8);
        for v in &m.vertices {
            let len = Vec3::from(v.position).length();
            assert!((len - 500.0).abs() < 1e-2, "vertex at distance {len}");
        }
    }

    #[test]
    fn normals_face_the_centre() {
        let m = build_inverted_sphere(500.0, 16, 8);
        for (v, n) in m.vertices.iter().zip(&m.normals) {
            assert!(Vec3::from(v.position).dot(Vec3::from(*n)) < 0.0);
        }
    }

    #[test]
    fn triangles_wind_counter_clockwise_from_inside() {
        let m = build_inverted_sphere(500.0, 16, 8);
        for tri in m.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(m.vertices[i as usize].position));
            let face = (b - a).cross(c - a);
            // pole rows produce degenerate triangles
            if face.length() < 1.0 {
                continue;
            }
            let centroid = (a + b + c) / 3.0;
            assert!(face.dot(centroid) < 0.0, "triangle {tri:?} faces outward");
        }
    }

    #[test]
    fn uv_covers_the_whole_image() {
        let m = build_inverted_sphere(1.0, 8, 4);
        assert_eq!(m.vertices.first().map(|v| v.uv), Some([0.0, 0.0]));
        assert_eq!(m.vertices.last().map(|v| v.uv), Some([1.0, 1.0]));
    }
}
