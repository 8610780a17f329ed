//! Post-Process Passes
//!
//! Engine-independent cleanup passes over a [`MeshScene`]. Pass order is
//! fixed: topology normalization first, then vertex-level rewrites, then
//! validation, with vertex pre-transformation always last (the loader resets
//! the root transform between the import pass and the bake pass).

use glam::{Affine3A, Mat3, Vec3};
use rustc_hash::FxHashMap;

use crate::errors::{Result, ShapeError};
use crate::importer::{PostProcessSteps, PrimitiveTypes};
use crate::scene::{MeshScene, PrimitiveKind, SceneNode, SubMesh};

/// Runs the requested passes over `scene` in canonical order.
pub fn run(
    mut scene: MeshScene,
    steps: PostProcessSteps,
    strip: PrimitiveTypes,
) -> Result<MeshScene> {
    if steps.contains(PostProcessSteps::TRIANGULATE) {
        triangulate(&mut scene);
    }
    if steps.contains(PostProcessSteps::SORT_BY_PRIMITIVE_TYPE) {
        sort_by_primitive_type(&mut scene, strip);
    }
    if steps.contains(PostProcessSteps::JOIN_IDENTICAL_VERTICES) {
        join_identical_vertices(&mut scene);
    }
    if steps.contains(PostProcessSteps::GEN_NORMALS) {
        generate_normals(&mut scene);
    }
    if steps.contains(PostProcessSteps::OPTIMIZE_MESHES) {
        optimize_meshes(&mut scene);
    }
    if steps.contains(PostProcessSteps::VALIDATE_DATA_STRUCTURE) {
        validate(&scene)?;
    }
    if steps.contains(PostProcessSteps::PRE_TRANSFORM_VERTICES) {
        scene = pre_transform_vertices(&scene)?;
    }
    Ok(scene)
}

// ============================================================================
// Topology normalization
// ============================================================================

/// Ensures every sub-mesh carries an explicit index list.
///
/// Strip/fan expansion happens at read time in the importer backends; here a
/// triangle sub-mesh without indices gets the identity index list so every
/// later pass can assume indexed data.
pub fn triangulate(scene: &mut MeshScene) {
    for mesh in &mut scene.meshes {
        if mesh.indices.is_empty() && !mesh.positions.is_empty() {
            mesh.indices = (0..mesh.positions.len() as u32).collect();
        }
    }
}

/// Drops sub-meshes whose primitive type is configured out and remaps node
/// mesh references.
pub fn sort_by_primitive_type(scene: &mut MeshScene, strip: PrimitiveTypes) {
    if strip.is_empty() {
        return;
    }
    let stripped = |kind: PrimitiveKind| match kind {
        PrimitiveKind::Points => strip.contains(PrimitiveTypes::POINT),
        PrimitiveKind::Lines => strip.contains(PrimitiveTypes::LINE),
        PrimitiveKind::Triangles => strip.contains(PrimitiveTypes::TRIANGLE),
    };

    let mut remap = vec![None; scene.meshes.len()];
    let mut kept = Vec::with_capacity(scene.meshes.len());
    for (i, mesh) in scene.meshes.drain(..).enumerate() {
        if !stripped(mesh.kind) {
            remap[i] = Some(kept.len());
            kept.push(mesh);
        }
    }
    scene.meshes = kept;
    remap_node_meshes(&mut scene.root, &remap);
}

fn remap_node_meshes(node: &mut SceneNode, remap: &[Option<usize>]) {
    node.meshes = node
        .meshes
        .iter()
        .filter_map(|&i| remap.get(i).copied().flatten())
        .collect();
    for child in &mut node.children {
        remap_node_meshes(child, remap);
    }
}

// ============================================================================
// Vertex-level rewrites
// ============================================================================

/// Merges bit-identical vertices within each sub-mesh and rewrites indices.
///
/// Comparison is on the exact float bit patterns of position and normal, so
/// the pass never perturbs geometry.
pub fn join_identical_vertices(scene: &mut MeshScene) {
    for mesh in &mut scene.meshes {
        if mesh.indices.is_empty() {
            continue;
        }

        let mut lookup: FxHashMap<[u8; 24], u32> = FxHashMap::default();
        let mut positions = Vec::new();
        let mut normals = mesh.normals.as_ref().map(|_| Vec::new());
        let mut remap = Vec::with_capacity(mesh.positions.len());

        for (i, pos) in mesh.positions.iter().enumerate() {
            let normal = mesh
                .normals
                .as_ref()
                .map_or(Vec3::ZERO, |normals| normals[i]);

            let mut key = [0u8; 24];
            key[..12].copy_from_slice(bytemuck::bytes_of(&pos.to_array()));
            key[12..].copy_from_slice(bytemuck::bytes_of(&normal.to_array()));

            let next = positions.len() as u32;
            let index = *lookup.entry(key).or_insert_with(|| {
                positions.push(*pos);
                if let Some(normals) = &mut normals {
                    normals.push(normal);
                }
                next
            });
            remap.push(index);
        }

        for index in &mut mesh.indices {
            *index = remap[*index as usize];
        }
        mesh.positions = positions;
        mesh.normals = normals;
    }
}

/// Generates area-weighted vertex normals for triangle sub-meshes that carry
/// none. Sub-meshes with imported normals are left untouched.
pub fn generate_normals(scene: &mut MeshScene) {
    for mesh in &mut scene.meshes {
        if mesh.kind != PrimitiveKind::Triangles || mesh.has_normals() {
            continue;
        }

        let count = mesh.positions.len();
        let mut normals = vec![Vec3::ZERO; count];

        for triangle in mesh.indices.chunks_exact(3) {
            let [i0, i1, i2] = [
                triangle[0] as usize,
                triangle[1] as usize,
                triangle[2] as usize,
            ];
            if i0 >= count || i1 >= count || i2 >= count {
                continue;
            }
            let v0 = mesh.positions[i0];
            let v1 = mesh.positions[i1];
            let v2 = mesh.positions[i2];

            // Cross product length is twice the triangle area, so summing
            // the raw cross products gives area weighting for free.
            let face_normal = (v1 - v0).cross(v2 - v0);
            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for n in &mut normals {
            *n = n.normalize_or_zero();
        }
        mesh.normals = Some(normals);
    }
}

// ============================================================================
// Mesh count optimization
// ============================================================================

/// Merges sub-meshes referenced by the same node that share a material and
/// primitive type.
///
/// Merging is node-local so sub-meshes under different transforms are never
/// combined.
pub fn optimize_meshes(scene: &mut MeshScene) {
    let mut meshes = std::mem::take(&mut scene.meshes);
    merge_node_meshes(&mut scene.root, &mut meshes);
    scene.meshes = meshes;
    prune_unreferenced_meshes(scene);
}

fn merge_node_meshes(node: &mut SceneNode, meshes: &mut Vec<SubMesh>) {
    let mut groups: FxHashMap<(Option<usize>, PrimitiveKind), Vec<usize>> = FxHashMap::default();
    for &mesh_index in &node.meshes {
        let mesh = &meshes[mesh_index];
        groups
            .entry((mesh.material, mesh.kind))
            .or_default()
            .push(mesh_index);
    }

    if groups.values().any(|members| members.len() > 1) {
        let mut merged_refs = Vec::new();
        // Deterministic order: groups keyed by first member appearance.
        let mut ordered: Vec<_> = groups.into_iter().collect();
        ordered.sort_by_key(|(_, members)| members[0]);

        for (_, members) in ordered {
            if members.len() == 1 {
                merged_refs.push(members[0]);
                continue;
            }
            let mut combined = SubMesh {
                name: meshes[members[0]].name.clone(),
                kind: meshes[members[0]].kind,
                material: meshes[members[0]].material,
                ..SubMesh::default()
            };
            let merge_normals = members.iter().all(|&i| meshes[i].has_normals());
            if merge_normals {
                combined.normals = Some(Vec::new());
            }
            for &member in &members {
                let mesh = &meshes[member];
                let base = combined.positions.len() as u32;
                combined.positions.extend_from_slice(&mesh.positions);
                if let (Some(dst), Some(src)) = (&mut combined.normals, &mesh.normals) {
                    dst.extend_from_slice(src);
                }
                combined
                    .indices
                    .extend(mesh.indices.iter().map(|&i| i + base));
            }
            merged_refs.push(meshes.len());
            meshes.push(combined);
        }
        node.meshes = merged_refs;
    }

    for child in &mut node.children {
        merge_node_meshes(child, meshes);
    }
}

fn prune_unreferenced_meshes(scene: &mut MeshScene) {
    let mut referenced = vec![false; scene.meshes.len()];
    mark_referenced(&scene.root, &mut referenced);

    let mut remap = vec![None; scene.meshes.len()];
    let mut kept = Vec::with_capacity(scene.meshes.len());
    for (i, mesh) in scene.meshes.drain(..).enumerate() {
        if referenced[i] {
            remap[i] = Some(kept.len());
            kept.push(mesh);
        }
    }
    scene.meshes = kept;
    remap_node_meshes(&mut scene.root, &remap);
}

fn mark_referenced(node: &SceneNode, referenced: &mut [bool]) {
    for &i in &node.meshes {
        if let Some(flag) = referenced.get_mut(i) {
            *flag = true;
        }
    }
    for child in &node.children {
        mark_referenced(child, referenced);
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Checks index bounds, attribute lengths and reference validity.
pub fn validate(scene: &MeshScene) -> Result<()> {
    for (i, mesh) in scene.meshes.iter().enumerate() {
        let count = mesh.positions.len() as u32;
        if let Some(&bad) = mesh.indices.iter().find(|&&index| index >= count) {
            return Err(ShapeError::InvalidScene(format!(
                "sub-mesh {i}: index {bad} out of bounds for {count} vertices"
            )));
        }
        if let Some(normals) = &mesh.normals {
            if normals.len() != mesh.positions.len() {
                return Err(ShapeError::InvalidScene(format!(
                    "sub-mesh {i}: {} normals for {} positions",
                    normals.len(),
                    mesh.positions.len()
                )));
            }
        }
        if mesh.kind == PrimitiveKind::Triangles && mesh.indices.len() % 3 != 0 {
            return Err(ShapeError::InvalidScene(format!(
                "sub-mesh {i}: triangle index count {} is not a multiple of 3",
                mesh.indices.len()
            )));
        }
        if let Some(material) = mesh.material {
            if material >= scene.materials.len() {
                return Err(ShapeError::InvalidScene(format!(
                    "sub-mesh {i}: material index {material} out of bounds"
                )));
            }
        }
    }

    let mut result = Ok(());
    scene.visit_nodes(|node, _| {
        if result.is_ok() {
            if let Some(&bad) = node.meshes.iter().find(|&&i| i >= scene.meshes.len()) {
                result = Err(ShapeError::InvalidScene(format!(
                    "node references mesh {bad} out of bounds"
                )));
            }
        }
    });
    result
}

// ============================================================================
// Vertex pre-transformation
// ============================================================================

/// Bakes the node hierarchy's transforms into vertex data.
///
/// Produces a new scene whose root is a single identity node referencing one
/// baked copy of each (node, mesh) pair; a mesh instanced under two nodes is
/// duplicated. Runs after the loader's root-transform correction so the
/// corrected transform is what gets baked.
pub fn pre_transform_vertices(scene: &MeshScene) -> Result<MeshScene> {
    let mut baked = MeshScene {
        uuid: scene.uuid,
        root: SceneNode::new(),
        meshes: Vec::new(),
        materials: scene.materials.clone(),
    };

    let mut out_of_bounds = None;
    scene.visit_nodes(|node, world| {
        for &mesh_index in &node.meshes {
            let Some(mesh) = scene.meshes.get(mesh_index) else {
                out_of_bounds = Some(mesh_index);
                continue;
            };
            let mut copy = mesh.clone();
            for pos in &mut copy.positions {
                *pos = world.transform_point3(*pos);
            }
            if let Some(normals) = &mut copy.normals {
                let normal_matrix = normal_matrix(&world);
                for normal in normals {
                    *normal = (normal_matrix * *normal).normalize_or_zero();
                }
            }
            baked.root.meshes.push(baked.meshes.len());
            baked.meshes.push(copy);
        }
    });

    if let Some(index) = out_of_bounds {
        return Err(ShapeError::PostProcessFailed(format!(
            "node references mesh {index} out of bounds"
        )));
    }
    Ok(baked)
}

/// Inverse-transpose of the linear part, for correct normals under
/// non-uniform scale. Falls back to the linear part when singular.
fn normal_matrix(world: &Affine3A) -> Mat3 {
    let linear = Mat3::from_cols(
        world.matrix3.x_axis.into(),
        world.matrix3.y_axis.into(),
        world.matrix3.z_axis.into(),
    );
    if linear.determinant().abs() > f32::EPSILON {
        linear.inverse().transpose()
    } else {
        linear
    }
}
