//! glTF / GLB import into CPU-side [`Model`]s.
//!
//! Node transforms of the default scene are baked into the vertices, so the
//! resulting model sits in the asset's own coordinate frame with identity
//! transform. Only triangle-list primitives are imported; textures are ignored
//! and each primitive keeps its material's base colour factor.

use anyhow::{Context, bail};
use furnish_3d::{Material, Mesh, Model, Vertex};
use glam::{Mat3, Mat4, Vec3};
use std::path::Path;

/// Loads both `.gltf` (with external or embedded buffers) and `.glb`.
pub async fn load_gltf_model(path: &Path) -> anyhow::Result<Model> {
    let (doc, buffers, _images) =
        gltf::import(path).with_context(|| format!("importing {}", path.display()))?;

    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_owned());

    let model = model_from_document(&doc, &buffers, &label)
        .with_context(|| format!("building model from {}", path.display()))?;

    log::info!(
        "loaded '{}' from {} ({} meshes, {} vertices)",
        model.label,
        path.display(),
        model.meshes.len(),
        model.vertex_count()
    );
    Ok(model)
}

/// Same as [`load_gltf_model`] for an in-memory document.
pub fn load_gltf_from_slice(bytes: &[u8], label: &str) -> anyhow::Result<Model> {
    let (doc, buffers, _images) = gltf::import_slice(bytes).context("importing glTF buffer")?;
    model_from_document(&doc, &buffers, label)
}

fn model_from_document(
    doc: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    label: &str,
) -> anyhow::Result<Model> {
    let mut materials: Vec<Material> = doc
        .materials()
        .map(|m| Material {
            name: m.name().map(str::to_owned),
            base_color: m.pbr_metallic_roughness().base_color_factor(),
        })
        .collect();
    let fallback_material = materials.len();
    materials.push(Material {
        name: Some("default".to_owned()),
        base_color: [1.0, 1.0, 1.0, 1.0],
    });

    let Some(scene) = doc.default_scene().or_else(|| doc.scenes().next()) else {
        bail!("glTF document has no scenes");
    };

    let mut meshes = Vec::new();
    for node in scene.nodes() {
        gather_meshes_recursive(&mut meshes, &node, Mat4::IDENTITY, buffers, fallback_material)?;
    }

    if meshes.is_empty() {
        bail!("glTF scene contains no triangle meshes");
    }

    Ok(Model::new(label, meshes, materials))
}

fn gather_meshes_recursive(
    meshes: &mut Vec<Mesh>,
    node: &gltf::Node<'_>,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    fallback_material: usize,
) -> anyhow::Result<()> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::debug!(
                    "skipping {:?} primitive in mesh {:?}",
                    primitive.mode(),
                    mesh.name()
                );
                continue;
            }
            let material_id = primitive.material().index().unwrap_or(fallback_material);
            let imported = import_primitive(&primitive, buffers, world, material_id)
                .with_context(|| format!("mesh {} (name {:?})", mesh.index(), mesh.name()))?;
            meshes.push(imported);
        }
    }

    for child in node.children() {
        gather_meshes_recursive(meshes, &child, world, buffers, fallback_material)?;
    }
    Ok(())
}

fn import_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
    world: Mat4,
    material_id: usize,
) -> anyhow::Result<Mesh> {
    let reader = primitive.reader(|buffer| Some(&*buffers[buffer.index()]));

    let Some(positions) = reader.read_positions() else {
        bail!("glTF primitives must have positions");
    };
    let positions: Vec<Vec3> = positions
        .map(|p| world.transform_point3(Vec3::from(p)))
        .collect();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    let normals: Option<Vec<Vec3>> = reader.read_normals().map(|normals| {
        let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
        normals
            .map(|n| {
                (normal_matrix * Vec3::from(n))
                    .try_normalize()
                    .unwrap_or(Vec3::Y)
            })
            .collect()
    });

    let mesh = match normals {
        Some(normals) if normals.len() == positions.len() => Mesh {
            vertices: positions
                .iter()
                .zip(normals)
                .map(|(p, n)| Vertex::new(*p, n))
                .collect(),
            indices,
            material_id,
        },
        _ => Mesh::from_positions(&positions, indices, material_id),
    };

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    // One red triangle, translated up by 0.5 through its node.
    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "translation": [0.0, 0.5, 0.0] }],
        "meshes": [{
            "name": "seat",
            "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }]
        }],
        "materials": [{
            "name": "red",
            "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.0, 0.0, 1.0] }
        }],
        "buffers": [{
            "byteLength": 44,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAAAAAIC/AAABAAIAAAA="
        }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, -1.0], "max": [1.0, 0.0, 0.0]
            },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    }"#;

    #[test]
    fn imports_triangle_with_node_transform_and_material() {
        let model = load_gltf_from_slice(TRIANGLE_GLTF.as_bytes(), "chair").unwrap();

        assert_eq!(model.label, "chair");
        assert_eq!(model.meshes.len(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(model.material_for(mesh).base_color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(model.material_for(mesh).name.as_deref(), Some("red"));

        assert_eq!(model.bounds.min, Vec3::new(0.0, 0.5, -1.0));
        assert_eq!(model.bounds.max, Vec3::new(1.0, 0.5, 0.0));

        // no NORMAL attribute: generated from the winding, facing up
        for v in &mesh.vertices {
            assert!((Vec3::from_array(v.normal) - Vec3::Y).length() < 1e-5);
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = pollster::block_on(load_gltf_model(Path::new("does/not/exist.glb")))
            .unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.glb"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(load_gltf_from_slice(b"not a gltf", "junk").is_err());
    }
}
