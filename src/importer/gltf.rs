//! glTF Import Backend
//!
//! Implements [`MeshImporter`] with the `gltf` crate. Handles `.gltf` and
//! `.glb`, with buffers sourced from the GLB blob, `data:` URIs, or external
//! files fetched through the [`ResourceRetriever`] — so the shape layer never
//! touches the filesystem directly.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use glam::{Affine3A, Mat4, Vec3, Vec4};

use crate::errors::{Result, ShapeError};
use crate::importer::{ImportConfig, MeshImporter, PostProcessSteps, postprocess};
use crate::retriever::ResourceRetriever;
use crate::scene::{MaterialDesc, MeshScene, PrimitiveKind, SceneNode, SubMesh};

/// glTF-backed mesh importer.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfImporter;

impl GltfImporter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MeshImporter for GltfImporter {
    fn import(
        &self,
        uri: &str,
        retriever: &dyn ResourceRetriever,
        config: &ImportConfig,
        steps: PostProcessSteps,
    ) -> Result<MeshScene> {
        let bytes = retriever.resolve(uri)?;
        let gltf = gltf::Gltf::from_slice(&bytes).map_err(|err| ShapeError::ImportFailed {
            uri: uri.to_string(),
            reason: err.to_string(),
        })?;

        let buffers = load_buffers(&gltf, uri, retriever)?;
        let scene = build_scene(&gltf, &buffers)?;
        postprocess::run(scene, steps, config.strip_primitives)
    }
}

// ============================================================================
// Buffer resolution
// ============================================================================

/// Loads every buffer of the document: GLB blob, embedded `data:` URI, or an
/// external resource fetched through the retriever relative to the asset URI.
fn load_buffers(
    gltf: &gltf::Gltf,
    asset_uri: &str,
    retriever: &dyn ResourceRetriever,
) -> Result<Vec<Vec<u8>>> {
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .as_deref()
                .map(<[u8]>::to_vec)
                .ok_or_else(|| ShapeError::GltfParse("GLB binary chunk missing".to_string()))?,
            gltf::buffer::Source::Uri(uri) => {
                if let Some(encoded) = uri.strip_prefix("data:") {
                    decode_data_uri(encoded)?
                } else {
                    retriever.resolve(&resolve_relative(asset_uri, uri))?
                }
            }
        };
        if data.len() < buffer.length() {
            return Err(ShapeError::GltfParse(format!(
                "buffer {} is {} bytes, expected at least {}",
                buffer.index(),
                data.len(),
                buffer.length()
            )));
        }
        buffer_data.push(data);
    }
    Ok(buffer_data)
}

fn decode_data_uri(encoded: &str) -> Result<Vec<u8>> {
    let (header, payload) = encoded
        .split_once(',')
        .ok_or_else(|| ShapeError::DataUri("missing ',' separator".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(ShapeError::DataUri(format!(
            "unsupported data URI encoding '{header}'"
        )));
    }
    Ok(BASE64_STANDARD.decode(payload)?)
}

/// Resolves `relative` against the directory part of `asset_uri`, keeping
/// retrieval uniform for sub-resources of local and remote assets.
fn resolve_relative(asset_uri: &str, relative: &str) -> String {
    match asset_uri.rsplit_once('/') {
        Some((base, _)) => format!("{base}/{relative}"),
        None => relative.to_string(),
    }
}

// ============================================================================
// Scene construction
// ============================================================================

fn build_scene(gltf: &gltf::Gltf, buffers: &[Vec<u8>]) -> Result<MeshScene> {
    let mut scene = MeshScene::new();

    for material in gltf.materials() {
        scene.materials.push(MaterialDesc {
            name: material.name().map(str::to_string),
            base_color: Vec4::from_array(material.pbr_metallic_roughness().base_color_factor()),
        });
    }

    // glTF mesh index -> range of SubMesh indices (one per primitive).
    let mut primitive_ranges = Vec::new();
    for mesh in gltf.meshes() {
        let start = scene.meshes.len();
        for primitive in mesh.primitives() {
            if let Some(sub_mesh) = read_primitive(mesh.name(), &primitive, buffers)? {
                scene.meshes.push(sub_mesh);
            }
        }
        primitive_ranges.push(start..scene.meshes.len());
    }

    let root_scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or_else(|| ShapeError::GltfParse("document contains no scene".to_string()))?;
    for node in root_scene.nodes() {
        let built = build_node(&node, &primitive_ranges);
        scene.root.children.push(built);
    }

    Ok(scene)
}

fn build_node(node: &gltf::Node, primitive_ranges: &[std::ops::Range<usize>]) -> SceneNode {
    let mut built = SceneNode {
        name: node.name().map(str::to_string),
        transform: Affine3A::from_mat4(Mat4::from_cols_array_2d(&node.transform().matrix())),
        meshes: Vec::new(),
        children: Vec::new(),
    };
    if let Some(mesh) = node.mesh() {
        built.meshes.extend(primitive_ranges[mesh.index()].clone());
    }
    for child in node.children() {
        built.children.push(build_node(&child, primitive_ranges));
    }
    built
}

// ============================================================================
// Primitive reading
// ============================================================================

fn read_primitive(
    mesh_name: Option<&str>,
    primitive: &gltf::Primitive,
    buffers: &[Vec<u8>],
) -> Result<Option<SubMesh>> {
    use gltf::mesh::Mode;

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let positions: Vec<Vec3> = reader
        .read_positions()
        .map(|iter| iter.map(Vec3::from_array).collect())
        .unwrap_or_default();
    if positions.is_empty() {
        return Ok(None);
    }

    let normals: Option<Vec<Vec3>> = reader
        .read_normals()
        .map(|iter| iter.map(Vec3::from_array).collect());
    if let Some(normals) = &normals {
        if normals.len() != positions.len() {
            return Err(ShapeError::GltfParse(format!(
                "primitive has {} normals for {} positions",
                normals.len(),
                positions.len()
            )));
        }
    }

    let raw_indices: Vec<u32> = reader
        .read_indices()
        .map_or_else(|| (0..positions.len() as u32).collect(), |iter| {
            iter.into_u32().collect()
        });

    // Strips, fans and loops are expanded to plain lists at read time; the
    // post-process passes only ever see list topology.
    let (kind, indices) = match primitive.mode() {
        Mode::Points => (PrimitiveKind::Points, raw_indices),
        Mode::Lines => (PrimitiveKind::Lines, raw_indices),
        Mode::LineStrip => (PrimitiveKind::Lines, expand_line_strip(&raw_indices, false)),
        Mode::LineLoop => (PrimitiveKind::Lines, expand_line_strip(&raw_indices, true)),
        Mode::Triangles => (PrimitiveKind::Triangles, raw_indices),
        Mode::TriangleStrip => (PrimitiveKind::Triangles, expand_triangle_strip(&raw_indices)),
        Mode::TriangleFan => (PrimitiveKind::Triangles, expand_triangle_fan(&raw_indices)),
    };

    Ok(Some(SubMesh {
        name: mesh_name.map(str::to_string),
        kind,
        positions,
        normals,
        indices,
        material: primitive.material().index(),
    }))
}

fn expand_line_strip(indices: &[u32], close: bool) -> Vec<u32> {
    let mut expanded = Vec::with_capacity(indices.len().saturating_sub(1) * 2);
    for pair in indices.windows(2) {
        expanded.extend_from_slice(pair);
    }
    if close && indices.len() > 2 {
        expanded.push(indices[indices.len() - 1]);
        expanded.push(indices[0]);
    }
    expanded
}

fn expand_triangle_strip(indices: &[u32]) -> Vec<u32> {
    let mut expanded = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
    for (i, window) in indices.windows(3).enumerate() {
        // Every other triangle flips winding to keep a consistent facing.
        if i % 2 == 0 {
            expanded.extend_from_slice(&[window[0], window[1], window[2]]);
        } else {
            expanded.extend_from_slice(&[window[1], window[0], window[2]]);
        }
    }
    expanded
}

fn expand_triangle_fan(indices: &[u32]) -> Vec<u32> {
    let mut expanded = Vec::with_capacity(indices.len().saturating_sub(2) * 3);
    if let Some((&hub, rest)) = indices.split_first() {
        for pair in rest.windows(2) {
            expanded.extend_from_slice(&[hub, pair[0], pair[1]]);
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_strip_expansion_alternates_winding() {
        let expanded = expand_triangle_strip(&[0, 1, 2, 3]);
        assert_eq!(expanded, vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn triangle_fan_expansion_shares_hub() {
        let expanded = expand_triangle_fan(&[0, 1, 2, 3]);
        assert_eq!(expanded, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn line_loop_closes_back_to_start() {
        let expanded = expand_line_strip(&[0, 1, 2], true);
        assert_eq!(expanded, vec![0, 1, 1, 2, 2, 0]);
    }

    #[test]
    fn data_uri_roundtrip() {
        let payload = BASE64_STANDARD.encode(b"mesh-bytes");
        let uri = format!("application/octet-stream;base64,{payload}");
        assert_eq!(decode_data_uri(&uri).unwrap(), b"mesh-bytes");
    }

    #[test]
    fn relative_resolution_keeps_asset_directory() {
        assert_eq!(
            resolve_relative("models/scene.gltf", "scene.bin"),
            "models/scene.bin"
        );
        assert_eq!(resolve_relative("scene.gltf", "scene.bin"), "scene.bin");
    }
}
