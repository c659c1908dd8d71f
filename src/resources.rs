//! Ownership of engine-side resources.
//!
//! [`EngineResources`] is the set of native handles owned by one controller
//! instance: renderer, scene, view, camera, and per-asset handle tuples. Its
//! job is bracketing: every handle is created once before first render and
//! destroyed exactly once, in reverse dependency order (consumers before
//! producers). The engine handle itself is owned by the controller and
//! destroyed after everything here, since destroying it invalidates every
//! derived handle.

use std::collections::HashMap;

use crate::engine::{
    CameraHandle, EntityHandle, IndexBufferHandle, MaterialHandle, RenderEngine, RendererHandle,
    SceneHandle, TextureHandle, VertexBufferHandle, ViewHandle,
};

/// Logical identifier of one displayed asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub u64);

/// One renderable asset: an entity plus the buffers, material and textures it
/// consumes. Exclusively owned by one [`EngineResources`]; the engine forbids
/// sharing resources across engine instances.
#[derive(Clone, Debug)]
pub struct Asset {
    pub entity: EntityHandle,
    pub vertices: VertexBufferHandle,
    pub indices: IndexBufferHandle,
    pub material: MaterialHandle,
    pub textures: Vec<TextureHandle>,
}

/// Lifecycle tag for the resource set.
///
/// An explicit three-state tag rather than an `Option`: "never created" and
/// "already torn down" must not be conflated, because operations arriving in
/// the latter state indicate a lifecycle bug and are dropped loudly.
pub enum ResourcePhase {
    Uninitialized,
    Active(EngineResources),
    Destroyed,
}

impl ResourcePhase {
    pub fn active(&self) -> Option<&EngineResources> {
        match self {
            Self::Active(resources) => Some(resources),
            _ => None,
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut EngineResources> {
        match self {
            Self::Active(resources) => Some(resources),
            _ => None,
        }
    }
}

/// The collection of engine handles owned by one controller instance.
pub struct EngineResources {
    pub renderer: RendererHandle,
    pub scene: SceneHandle,
    pub view: ViewHandle,
    pub camera: CameraHandle,
    assets: HashMap<AssetId, Asset>,
    next_asset: u64,
}

impl EngineResources {
    /// Creates the base resource set and wires the view to its camera and
    /// scene. Valid once per controller instance, before the first render.
    pub fn create(engine: &mut dyn RenderEngine) -> Self {
        let renderer = engine.create_renderer();
        let scene = engine.create_scene();
        let view = engine.create_view();
        let camera = engine.create_camera();
        engine.set_view_camera(view, camera);
        engine.set_view_scene(view, scene);
        Self {
            renderer,
            scene,
            view,
            camera,
            assets: HashMap::new(),
            next_asset: 0,
        }
    }

    /// Registers an already-built asset and adds its entity to the scene.
    /// This is the single mutation that makes a new asset visible, so a
    /// render tick observes either the previous scene or the complete new
    /// one, never a torn state.
    pub fn install_asset(&mut self, engine: &mut dyn RenderEngine, asset: Asset) -> AssetId {
        let id = AssetId(self.next_asset);
        self.next_asset += 1;
        engine.add_entity(self.scene, asset.entity);
        self.assets.insert(id, asset);
        id
    }

    /// Removes the asset from the scene and destroys its handles, consumers
    /// first. Returns `false` when `id` is not present.
    pub fn destroy_asset(&mut self, engine: &mut dyn RenderEngine, id: AssetId) -> bool {
        let Some(asset) = self.assets.remove(&id) else {
            return false;
        };
        engine.remove_entity(self.scene, asset.entity);
        engine.destroy_entity(asset.entity);
        engine.destroy_vertex_buffer(asset.vertices);
        engine.destroy_index_buffer(asset.indices);
        engine.destroy_material(asset.material);
        for texture in asset.textures {
            engine.destroy_texture(texture);
        }
        true
    }

    /// Destroys every remaining handle in dependency order: per-asset
    /// resources, then view, scene, camera and renderer. The caller destroys
    /// the engine afterwards; destroying each handle here first is deliberate
    /// even though the engine teardown would reclaim them.
    pub fn destroy_all(mut self, engine: &mut dyn RenderEngine) {
        let mut ids: Vec<AssetId> = self.assets.keys().copied().collect();
        ids.sort();
        for id in ids {
            self.destroy_asset(engine, id);
        }
        engine.destroy_view(self.view);
        engine.destroy_scene(self.scene);
        engine.destroy_camera(self.camera);
        engine.destroy_renderer(self.renderer);
    }

    pub fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.assets.get(&id)
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }
}
