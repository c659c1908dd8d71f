//! Scene initialization strategies and content installation.
//!
//! The controller's lifecycle is identical whatever content it shows; only
//! the initial scene differs. [`SceneKind`] is the pluggable strategy:
//! a rotating demo triangle, a static mesh from the bundled assets, or an
//! initially empty model viewer fed by remote payloads. All three share one
//! installation path, [`install_bundle`], which turns a decoded
//! [`MeshBundle`] into engine resources in a single uninterrupted step.

use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use cgmath::{Deg, Matrix4};
use instant::{Duration, Instant};

use crate::{
    assets::{
        AssetSource,
        archive::resolve_relative,
        environment::EnvironmentSource,
        model::{MeshBundle, decode_scene},
    },
    engine::RenderEngine,
    resources::{Asset, AssetId, EngineResources},
};

/// Default background color behind the scene.
pub const SKYBOX_COLOR: [f32; 4] = [0.035, 0.035, 0.035, 1.0];

/// Material package for vertex-colored content.
pub const BAKED_COLOR_MATERIAL: &str = "baked_color.filamat";

/// Material package for textured content.
pub const TEXTURED_MATERIAL: &str = "textured.filamat";

/// One full rotation of animated content.
pub const SPIN_PERIOD: Duration = Duration::from_millis(4000);

/// What the view shows when it comes up.
#[derive(Clone, Debug)]
pub enum SceneKind {
    /// A rotating vertex-colored triangle.
    Triangle,
    /// One mesh loaded from the bundled assets, by scene-file path.
    StaticMesh { path: String },
    /// Starts empty (or with a named default model) and replaces its content
    /// from remotely delivered payloads.
    ModelViewer {
        default_model: Option<String>,
        environment: Option<String>,
    },
}

/// Content state produced by initial scene setup.
pub(crate) struct SceneSetup {
    pub current: Option<AssetId>,
    pub animated: bool,
}

/// Wall-clock driven rotation about +Z, one negative full turn per period.
pub struct Animator {
    started: Instant,
    period: Duration,
}

impl Animator {
    pub fn new(period: Duration) -> Self {
        Self {
            started: Instant::now(),
            period,
        }
    }

    /// Transform for the current wall-clock instant.
    pub fn transform(&self, now: Instant) -> [[f32; 4]; 4] {
        self.transform_at(now.duration_since(self.started))
    }

    pub(crate) fn transform_at(&self, elapsed: Duration) -> [[f32; 4]; 4] {
        let turns = elapsed.as_secs_f32() / self.period.as_secs_f32();
        let angle = Deg(-(turns.fract() * 360.0));
        Matrix4::from_angle_z(angle).into()
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct TriangleVertex {
    position: [f32; 3],
    color: [u8; 4],
}

fn triangle_vertices() -> [TriangleVertex; 3] {
    // Three vertices on the unit circle, 120 degrees apart.
    let a1 = 2.0 * PI / 3.0;
    let a2 = 4.0 * PI / 3.0;
    [
        TriangleVertex {
            position: [1.0, 0.0, 0.0],
            color: [0xff, 0x00, 0x00, 0xff],
        },
        TriangleVertex {
            position: [a1.cos(), a1.sin(), 0.0],
            color: [0x00, 0xff, 0x00, 0xff],
        },
        TriangleVertex {
            position: [a2.cos(), a2.sin(), 0.0],
            color: [0x00, 0x00, 0xff, 0xff],
        },
    ]
}

/// Builds the configured initial content into `resources`.
pub(crate) fn build_initial_scene(
    kind: &SceneKind,
    engine: &mut dyn RenderEngine,
    resources: &mut EngineResources,
    assets: &dyn AssetSource,
    environments: Option<&dyn EnvironmentSource>,
) -> anyhow::Result<SceneSetup> {
    match kind {
        SceneKind::Triangle => {
            let material_payload = assets.load(BAKED_COLOR_MATERIAL)?;
            let material = engine.create_material(&material_payload);
            let vertices = triangle_vertices();
            let vertex_buffer = engine.create_vertex_buffer(bytemuck::cast_slice(&vertices), 3);
            let index_data: [u16; 3] = [0, 1, 2];
            let index_buffer = engine.create_index_buffer(bytemuck::cast_slice(&index_data), 3);
            let entity = engine.create_renderable(vertex_buffer, index_buffer, material, 3);
            let id = resources.install_asset(
                engine,
                Asset {
                    entity,
                    vertices: vertex_buffer,
                    indices: index_buffer,
                    material,
                    textures: Vec::new(),
                },
            );
            Ok(SceneSetup {
                current: Some(id),
                animated: true,
            })
        }
        SceneKind::StaticMesh { path } => {
            let id = load_bundled_model(path, engine, resources, assets)?;
            Ok(SceneSetup {
                current: Some(id),
                animated: false,
            })
        }
        SceneKind::ModelViewer {
            default_model,
            environment,
        } => {
            if let (Some(name), Some(source)) = (environment, environments) {
                let data = source.load(name)?;
                engine.set_environment(resources.scene, &data);
            }
            let current = match default_model {
                Some(path) => Some(load_bundled_model(path, engine, resources, assets)?),
                None => None,
            };
            Ok(SceneSetup {
                current,
                animated: false,
            })
        }
    }
}

fn load_bundled_model(
    path: &str,
    engine: &mut dyn RenderEngine,
    resources: &mut EngineResources,
    assets: &dyn AssetSource,
) -> anyhow::Result<AssetId> {
    let scene_bytes = assets.load(path)?;
    let bundle = decode_scene(path, &scene_bytes, |uri| {
        let resolved = resolve_relative(path, uri);
        assets
            .load(&resolved)
            .map_err(|err| crate::assets::LoadError::decode(&resolved, err))
    })?;
    let material_name = if bundle.base_color.is_some() {
        TEXTURED_MATERIAL
    } else {
        BAKED_COLOR_MATERIAL
    };
    let material_payload = assets.load(material_name)?;
    Ok(install_bundle(engine, resources, &material_payload, &bundle))
}

/// Creates engine resources for a decoded bundle and makes it visible. One
/// uninterrupted mutation on the rendering context: no tick can observe a
/// partially built asset.
pub(crate) fn install_bundle(
    engine: &mut dyn RenderEngine,
    resources: &mut EngineResources,
    material_payload: &[u8],
    bundle: &MeshBundle,
) -> AssetId {
    let material = engine.create_material(material_payload);
    let vertex_buffer = engine.create_vertex_buffer(&bundle.vertex_data, bundle.vertex_count);
    let index_buffer = engine.create_index_buffer(&bundle.index_data, bundle.index_count);
    let mut textures = Vec::new();
    if let Some(texture) = &bundle.base_color {
        textures.push(engine.create_texture(&texture.pixels, texture.width, texture.height));
    }
    let entity = engine.create_renderable(vertex_buffer, index_buffer, material, bundle.index_count);
    resources.install_asset(
        engine,
        Asset {
            entity,
            vertices: vertex_buffer,
            indices: index_buffer,
            material,
            textures,
        },
    )
}
