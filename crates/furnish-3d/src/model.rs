use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::f32::consts::TAU;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub base_color: [f32; 4],
}

pub static DEFAULT_MATERIAL: Material = Material {
    name: None,
    base_color: [0.8, 0.8, 0.8, 1.0],
};

impl Material {
    pub fn colored(base_color: [f32; 4]) -> Self {
        Self {
            name: None,
            base_color,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material_id: usize,
}

impl Mesh {
    /// Builds a mesh from raw positions, generating smooth normals from the
    /// triangle list.
    pub fn from_positions(positions: &[Vec3], indices: Vec<u32>, material_id: usize) -> Self {
        let normals = smooth_normals(positions, &indices);
        let vertices = positions
            .iter()
            .zip(normals)
            .map(|(p, n)| Vertex::new(*p, n))
            .collect();
        Self {
            vertices,
            indices,
            material_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }
}

/// Area-weighted vertex normals. Vertices not referenced by any triangle get +Y.
pub fn smooth_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut acc = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        acc[a] += face;
        acc[b] += face;
        acc[c] += face;
    }
    acc.into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub const EMPTY: Bounds = Bounds {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn largest_extent(&self) -> f32 {
        self.size().max_element()
    }
}

/// CPU-side renderable asset. GPU buffers are created lazily by the renderer.
#[derive(Clone, Debug)]
pub struct Model {
    pub label: String,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub bounds: Bounds,
}

impl Model {
    pub fn new(label: impl Into<String>, meshes: Vec<Mesh>, materials: Vec<Material>) -> Self {
        let bounds = Bounds::from_points(
            meshes
                .iter()
                .flat_map(|m| m.vertices.iter().map(|v| Vec3::from_array(v.position))),
        )
        .unwrap_or(Bounds::EMPTY);

        Self {
            label: label.into(),
            meshes,
            materials,
            bounds,
        }
    }

    pub fn material_for(&self, mesh: &Mesh) -> &Material {
        self.materials
            .get(mesh.material_id)
            .or_else(|| self.materials.last())
            .unwrap_or(&DEFAULT_MATERIAL)
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    /// Flat annulus in the XZ plane facing +Y.
    pub fn ring(label: &str, inner: f32, outer: f32, segments: u32, color: [f32; 4]) -> Self {
        let segments = segments.max(3);
        let mut vertices = Vec::with_capacity(2 * (segments as usize + 1));
        for i in 0..=segments {
            let theta = i as f32 / segments as f32 * TAU;
            let (s, c) = theta.sin_cos();
            vertices.push(Vertex::new(Vec3::new(inner * c, 0.0, -inner * s), Vec3::Y));
            vertices.push(Vertex::new(Vec3::new(outer * c, 0.0, -outer * s), Vec3::Y));
        }

        let mut indices = Vec::with_capacity(6 * segments as usize);
        for i in 0..segments {
            let base = 2 * i;
            indices.extend_from_slice(&[base, base + 1, base + 3, base, base + 3, base + 2]);
        }

        Self::new(
            label,
            vec![Mesh {
                vertices,
                indices,
                material_id: 0,
            }],
            vec![Material::colored(color)],
        )
    }

    /// Axis-aligned box spanning `min..max` with per-face normals.
    pub fn cuboid(label: &str, min: Vec3, max: Vec3, color: [f32; 4]) -> Self {
        let faces: [(Vec3, [Vec3; 4]); 6] = [
            (
                Vec3::X,
                [
                    Vec3::new(max.x, min.y, max.z),
                    Vec3::new(max.x, min.y, min.z),
                    Vec3::new(max.x, max.y, min.z),
                    Vec3::new(max.x, max.y, max.z),
                ],
            ),
            (
                Vec3::NEG_X,
                [
                    Vec3::new(min.x, min.y, min.z),
                    Vec3::new(min.x, min.y, max.z),
                    Vec3::new(min.x, max.y, max.z),
                    Vec3::new(min.x, max.y, min.z),
                ],
            ),
            (
                Vec3::Y,
                [
                    Vec3::new(min.x, max.y, max.z),
                    Vec3::new(max.x, max.y, max.z),
                    Vec3::new(max.x, max.y, min.z),
                    Vec3::new(min.x, max.y, min.z),
                ],
            ),
            (
                Vec3::NEG_Y,
                [
                    Vec3::new(min.x, min.y, min.z),
                    Vec3::new(max.x, min.y, min.z),
                    Vec3::new(max.x, min.y, max.z),
                    Vec3::new(min.x, min.y, max.z),
                ],
            ),
            (
                Vec3::Z,
                [
                    Vec3::new(min.x, min.y, max.z),
                    Vec3::new(max.x, min.y, max.z),
                    Vec3::new(max.x, max.y, max.z),
                    Vec3::new(min.x, max.y, max.z),
                ],
            ),
            (
                Vec3::NEG_Z,
                [
                    Vec3::new(max.x, min.y, min.z),
                    Vec3::new(min.x, min.y, min.z),
                    Vec3::new(min.x, max.y, min.z),
                    Vec3::new(max.x, max.y, min.z),
                ],
            ),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, corners) in faces {
            let base = vertices.len() as u32;
            vertices.extend(corners.iter().map(|c| Vertex::new(*c, normal)));
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(
            label,
            vec![Mesh {
                vertices,
                indices,
                material_id: 0,
            }],
            vec![Material::colored(color)],
        )
    }

    /// Square in the XZ plane centred on the origin, facing +Y.
    pub fn quad(label: &str, half_extent: f32, color: [f32; 4]) -> Self {
        let h = half_extent;
        let vertices = vec![
            Vertex::new(Vec3::new(-h, 0.0, h), Vec3::Y),
            Vertex::new(Vec3::new(h, 0.0, h), Vec3::Y),
            Vertex::new(Vec3::new(h, 0.0, -h), Vec3::Y),
            Vertex::new(Vec3::new(-h, 0.0, -h), Vec3::Y),
        ];
        Self::new(
            label,
            vec![Mesh {
                vertices,
                indices: vec![0, 1, 2, 0, 2, 3],
                material_id: 0,
            }],
            vec![Material::colored(color)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_lies_flat_between_radii() {
        let ring = Model::ring("reticle", 0.15, 0.2, 32, [1.0; 4]);
        assert_eq!(ring.vertex_count(), 66);
        assert_eq!(ring.meshes[0].indices.len(), 32 * 6);
        for v in &ring.meshes[0].vertices {
            let p = Vec3::from_array(v.position);
            assert_eq!(p.y, 0.0);
            let r = p.length();
            assert!(r > 0.149 && r < 0.201, "radius {r}");
        }
        assert!((ring.bounds.largest_extent() - 0.4).abs() < 1e-4);
    }

    #[test]
    fn cuboid_bounds_match_corners() {
        let b = Model::cuboid("table", Vec3::new(-1.0, 0.0, -2.0), Vec3::new(1.0, 0.75, -1.0), [1.0; 4]);
        assert_eq!(b.bounds.min, Vec3::new(-1.0, 0.0, -2.0));
        assert_eq!(b.bounds.max, Vec3::new(1.0, 0.75, -1.0));
        assert_eq!(b.bounds.largest_extent(), 2.0);
        assert_eq!(b.meshes[0].indices.len(), 36);
    }

    #[test]
    fn smooth_normals_of_flat_triangle_point_up() {
        let positions = [
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
        ];
        let normals = smooth_normals(&positions, &[0, 1, 2]);
        for n in normals {
            assert!((n - Vec3::Y).length() < 1e-6);
        }
    }

    #[test]
    fn unreferenced_vertices_and_bad_indices_are_tolerated() {
        let positions = [Vec3::ZERO, Vec3::X];
        let normals = smooth_normals(&positions, &[0, 1, 7]);
        assert_eq!(normals, vec![Vec3::Y, Vec3::Y]);
    }

    #[test]
    fn material_lookup_falls_back() {
        let mut model = Model::quad("floor", 1.0, [0.1, 0.2, 0.3, 1.0]);
        model.meshes[0].material_id = 9;
        assert_eq!(model.material_for(&model.meshes[0]).base_color, [0.1, 0.2, 0.3, 1.0]);

        model.materials.clear();
        assert_eq!(model.material_for(&model.meshes[0]), &DEFAULT_MATERIAL);
    }

    #[test]
    fn empty_model_has_empty_bounds() {
        let model = Model::new("nothing", Vec::new(), Vec::new());
        assert_eq!(model.bounds, Bounds::EMPTY);
    }
}
