//! Import Protocol Tests
//!
//! Tests for:
//! - Loading a real embedded-buffer glTF asset end to end
//! - Recoverable import failure (nonexistent URI)
//! - Independent handles for repeated loads of one URI
//! - Collada root-transform correction in the load protocol
//! - Degraded success when the pre-transform pass fails

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use glam::{Affine3A, Vec3};

use kinema::{
    GltfImporter, ImportConfig, LocalFileRetriever, MeshImporter, MeshScene, MeshShape,
    PostProcessSteps, PrimitiveKind, ResourceRetriever, Result, SceneNode, ShapeError, SharedMesh,
    SubMesh, load_mesh, load_mesh_from_path,
};

const EPSILON: f32 = 1e-5;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Fixture: embedded-buffer glTF cube
// ============================================================================

/// Unit cube centered at the origin, positions + u16 indices in a single
/// base64 data-URI buffer.
fn cube_gltf_json() -> String {
    let positions: [[f32; 3]; 8] = [
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, 0.5, -0.5],
        [-0.5, 0.5, -0.5],
        [-0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, 0.5],
    ];
    let indices: [u16; 36] = [
        0, 1, 2, 0, 2, 3, 4, 6, 5, 4, 7, 6, 0, 4, 5, 0, 5, 1, 1, 5, 6, 1, 6, 2, 2, 6, 7, 2, 7, 3,
        3, 7, 4, 3, 4, 0,
    ];

    let mut buffer = Vec::new();
    for position in &positions {
        for component in position {
            buffer.extend_from_slice(&component.to_le_bytes());
        }
    }
    let index_offset = buffer.len();
    for index in &indices {
        buffer.extend_from_slice(&index.to_le_bytes());
    }

    let document = serde_json::json!({
        "asset": { "version": "2.0" },
        "buffers": [{
            "byteLength": buffer.len(),
            "uri": format!(
                "data:application/octet-stream;base64,{}",
                BASE64_STANDARD.encode(&buffer)
            ),
        }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": index_offset },
            { "buffer": 0, "byteOffset": index_offset, "byteLength": buffer.len() - index_offset },
        ],
        "accessors": [
            {
                "bufferView": 0,
                "componentType": 5126,
                "count": 8,
                "type": "VEC3",
                "min": [-0.5, -0.5, -0.5],
                "max": [0.5, 0.5, 0.5],
            },
            {
                "bufferView": 1,
                "componentType": 5123,
                "count": 36,
                "type": "SCALAR",
            },
        ],
        "meshes": [{
            "name": "cube",
            "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }],
        }],
        "nodes": [{ "mesh": 0 }],
        "scenes": [{ "nodes": [0] }],
        "scene": 0,
    });
    document.to_string()
}

/// Writes the cube fixture into a fresh temp directory and returns its path.
fn write_cube_fixture(file_name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("kinema-import-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(file_name);
    fs::write(&path, cube_gltf_json()).unwrap();
    path
}

// ============================================================================
// End-to-end glTF loading
// ============================================================================

#[test]
fn loads_cube_from_gltf_file() {
    let path = write_cube_fixture("cube.gltf");
    let importer = GltfImporter::new();

    let shape = MeshShape::from_uri(
        Vec3::new(2.0, 1.0, 1.0),
        path.to_string_lossy(),
        None,
        &importer,
    )
    .unwrap();

    let mesh = shape.mesh().expect("cube should import");
    assert_eq!(mesh.scene().meshes.len(), 1);
    let sub_mesh = &mesh.scene().meshes[0];
    assert_eq!(sub_mesh.kind, PrimitiveKind::Triangles);
    assert_eq!(sub_mesh.positions.len(), 8);
    assert_eq!(sub_mesh.indices.len(), 36);
    // GEN_NORMALS ran: the cube had none in the file.
    assert!(sub_mesh.has_normals());

    let bb = shape.bounding_box();
    assert!((bb.extents() - Vec3::new(2.0, 1.0, 1.0)).length() < EPSILON);
    assert!((shape.volume() - 2.0).abs() < EPSILON);
}

#[test]
fn loads_through_explicit_retriever_and_resolves_path() -> anyhow::Result<()> {
    let path = write_cube_fixture("cube.gltf");
    let retriever: Arc<dyn ResourceRetriever> =
        Arc::new(LocalFileRetriever::new(path.parent().unwrap()));
    let importer = GltfImporter::new();

    let shape = MeshShape::from_uri(Vec3::ONE, "cube.gltf", Some(retriever), &importer)?;

    assert!(shape.mesh().is_some());
    assert_eq!(shape.uri(), "cube.gltf");
    assert_eq!(shape.resolved_path(), Some(path.as_path()));
    Ok(())
}

#[test]
fn nonexistent_uri_yields_empty_shape_not_a_fault() {
    init_logging();
    let importer = GltfImporter::new();
    let shape = MeshShape::from_uri(
        Vec3::ONE,
        "/nonexistent/dir/missing.gltf",
        None,
        &importer,
    )
    .unwrap();

    assert!(shape.mesh().is_none());
    assert_eq!(shape.bounding_box().extents(), Vec3::ZERO);
    assert_eq!(shape.volume(), 0.0);
}

#[test]
fn repeated_loads_produce_independent_handles() {
    let path = write_cube_fixture("cube.gltf");
    let importer = GltfImporter::new();

    let first = load_mesh_from_path(&path, &importer).unwrap();
    let second = load_mesh_from_path(&path, &importer).unwrap();

    assert!(!SharedMesh::ptr_eq(&first, &second));
    assert_eq!(first.scene().meshes.len(), second.scene().meshes.len());
    assert_eq!(
        first.scene().meshes[0].positions,
        second.scene().meshes[0].positions
    );
}

#[test]
fn corrupt_document_is_recoverable() {
    init_logging();
    let dir = std::env::temp_dir().join(format!("kinema-import-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("broken.gltf");
    fs::write(&path, b"{ not valid gltf").unwrap();

    let importer = GltfImporter::new();
    let mesh = load_mesh_from_path(&path, &importer);
    assert!(mesh.is_none());
}

// ============================================================================
// Load protocol behavior (stub importers)
// ============================================================================

/// Importer that returns a fixed scene regardless of URI, for exercising the
/// protocol around the import call.
struct FixtureImporter {
    scene: MeshScene,
}

impl FixtureImporter {
    /// One triangle under a root transform that shifts it along +X.
    fn with_root_offset() -> Self {
        let mut scene = MeshScene::new();
        scene.meshes.push(SubMesh {
            name: None,
            kind: PrimitiveKind::Triangles,
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: None,
            indices: vec![0, 1, 2],
            material: None,
        });
        let mut node = SceneNode::new();
        node.meshes.push(0);
        scene.root.children.push(node);
        scene.root.transform = Affine3A::from_translation(Vec3::new(100.0, 0.0, 0.0));
        Self { scene }
    }
}

impl MeshImporter for FixtureImporter {
    fn import(
        &self,
        _uri: &str,
        _retriever: &dyn ResourceRetriever,
        _config: &ImportConfig,
        _steps: PostProcessSteps,
    ) -> Result<MeshScene> {
        Ok(self.scene.clone())
    }
}

/// Importer whose pre-transform pass always fails.
struct BrokenPostProcess(FixtureImporter);

impl MeshImporter for BrokenPostProcess {
    fn import(
        &self,
        uri: &str,
        retriever: &dyn ResourceRetriever,
        config: &ImportConfig,
        steps: PostProcessSteps,
    ) -> Result<MeshScene> {
        self.0.import(uri, retriever, config, steps)
    }

    fn apply_post_process(
        &self,
        _scene: &MeshScene,
        _steps: PostProcessSteps,
    ) -> Result<MeshScene> {
        Err(ShapeError::PostProcessFailed("simulated".to_string()))
    }
}

fn null_retriever() -> Arc<dyn ResourceRetriever> {
    Arc::new(LocalFileRetriever::new("/"))
}

#[test]
fn collada_uri_resets_root_transform_before_baking() {
    let importer = FixtureImporter::with_root_offset();
    let retriever = null_retriever();

    let mesh = load_mesh("model.dae", &retriever, &importer).unwrap();
    // Root offset was discarded, so the baked triangle stays at the origin.
    assert!((mesh.scene().meshes[0].positions[0] - Vec3::ZERO).length() < EPSILON);
}

#[test]
fn non_collada_uri_keeps_root_transform() {
    let importer = FixtureImporter::with_root_offset();
    let retriever = null_retriever();

    let mesh = load_mesh("model.gltf", &retriever, &importer).unwrap();
    let baked = mesh.scene().meshes[0].positions[0];
    assert!((baked - Vec3::new(100.0, 0.0, 0.0)).length() < EPSILON);
}

#[test]
fn failed_pre_transform_degrades_to_unbaked_scene() {
    init_logging();
    let importer = BrokenPostProcess(FixtureImporter::with_root_offset());
    let retriever = null_retriever();

    let mesh = load_mesh("model.gltf", &retriever, &importer)
        .expect("degraded success still returns a handle");
    // Transforms were never baked: vertices remain in node-local space and
    // the hierarchy is intact.
    assert_eq!(mesh.scene().meshes[0].positions[0], Vec3::ZERO);
    assert!(!mesh.scene().root.children.is_empty());
}
