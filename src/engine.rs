//! The rendering engine seam.
//!
//! The engine itself is an external collaborator: this crate never creates GPU
//! objects directly. Everything it needs from the engine is expressed through
//! the [`RenderEngine`] trait, and every engine-side object is referred to by
//! an opaque handle newtype. Handles carry no lifetime information on their
//! own; correct create/destroy bracketing is the job of
//! [`crate::controller::ViewController`] and [`crate::resources::EngineResources`].
//!
//! # Key types
//!
//! - [`RenderEngine`] is the opaque engine capability (resource creation and
//!   destruction, frame submission, fences)
//! - [`NativeSurface`] is the platform drawing surface token a swap chain binds to
//! - [`EnvironmentData`] is a decoded radiance dataset for indirect lighting

use crate::camera::OrthoBounds;

macro_rules! engine_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub u64);
    };
}

engine_handle!(
    /// A swap chain: the engine's representation of a drawable surface.
    SwapChainHandle
);
engine_handle!(
    /// A renderer, tied to a single surface.
    RendererHandle
);
engine_handle!(
    /// A scene holding all renderables and lights to be drawn.
    SceneHandle
);
engine_handle!(
    /// A view: viewport + scene + camera.
    ViewHandle
);
engine_handle!(CameraHandle);
engine_handle!(
    /// An entity with a renderable component attached.
    EntityHandle
);
engine_handle!(VertexBufferHandle);
engine_handle!(IndexBufferHandle);
engine_handle!(MaterialHandle);
engine_handle!(TextureHandle);
engine_handle!(
    /// A fence for polling completion of previously submitted engine commands.
    FenceHandle
);

/// Opaque token for the platform drawing surface produced by the host view
/// system. The crate never inspects it; it is only forwarded to
/// [`RenderEngine::create_swap_chain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NativeSurface(pub u64);

/// Decoded environment radiance data used to initialize indirect lighting and
/// the skybox.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentData {
    pub width: u32,
    pub height: u32,
    /// RGB radiance, row-major, three floats per texel.
    pub radiance: Vec<f32>,
    pub intensity: f32,
}

/// Capability interface of the native rendering engine.
///
/// One engine instance is exclusively owned by one controller and must only be
/// touched from the single rendering context. Resources cannot be shared
/// across engine instances. Every handle obtained from a `create_*` call must
/// be passed to the matching `destroy_*` call exactly once, and
/// [`RenderEngine::destroy`] must be the very last call: it invalidates every
/// handle derived from the engine.
pub trait RenderEngine {
    fn create_renderer(&mut self) -> RendererHandle;
    fn create_scene(&mut self) -> SceneHandle;
    fn create_view(&mut self) -> ViewHandle;
    fn create_camera(&mut self) -> CameraHandle;

    fn set_view_camera(&mut self, view: ViewHandle, camera: CameraHandle);
    fn set_view_scene(&mut self, view: ViewHandle, scene: SceneHandle);
    fn set_skybox_color(&mut self, scene: SceneHandle, color: [f32; 4]);
    fn set_camera_projection(&mut self, camera: CameraHandle, bounds: OrthoBounds);
    fn set_viewport(&mut self, view: ViewHandle, width: u32, height: u32);
    fn set_environment(&mut self, scene: SceneHandle, environment: &EnvironmentData);

    fn create_vertex_buffer(&mut self, data: &[u8], vertex_count: u32) -> VertexBufferHandle;
    fn create_index_buffer(&mut self, data: &[u8], index_count: u32) -> IndexBufferHandle;
    fn create_material(&mut self, payload: &[u8]) -> MaterialHandle;
    /// Uploads RGBA8 pixel data.
    fn create_texture(&mut self, pixels: &[u8], width: u32, height: u32) -> TextureHandle;
    fn create_renderable(
        &mut self,
        vertices: VertexBufferHandle,
        indices: IndexBufferHandle,
        material: MaterialHandle,
        index_count: u32,
    ) -> EntityHandle;

    fn add_entity(&mut self, scene: SceneHandle, entity: EntityHandle);
    fn remove_entity(&mut self, scene: SceneHandle, entity: EntityHandle);
    fn set_transform(&mut self, entity: EntityHandle, transform: [[f32; 4]; 4]);

    fn create_swap_chain(&mut self, surface: &NativeSurface) -> SwapChainHandle;
    fn destroy_swap_chain(&mut self, swap_chain: SwapChainHandle);

    /// Blocks until every previously submitted engine command has finished
    /// executing. Required after destroying a swap chain whose underlying
    /// surface memory the OS may reclaim as soon as the caller returns.
    fn flush_and_wait(&mut self);

    /// Starts a frame against `swap_chain`. Returns `false` when the engine
    /// cannot accept a new frame because prior work has not drained from the
    /// GPU queue; the caller must skip rendering this tick.
    fn begin_frame(&mut self, swap_chain: SwapChainHandle, frame_time_nanos: u64) -> bool;
    fn render(&mut self, view: ViewHandle);
    fn end_frame(&mut self);

    fn create_fence(&mut self) -> FenceHandle;
    fn fence_signaled(&mut self, fence: FenceHandle) -> bool;
    fn destroy_fence(&mut self, fence: FenceHandle);

    fn destroy_entity(&mut self, entity: EntityHandle);
    fn destroy_vertex_buffer(&mut self, buffer: VertexBufferHandle);
    fn destroy_index_buffer(&mut self, buffer: IndexBufferHandle);
    fn destroy_material(&mut self, material: MaterialHandle);
    fn destroy_texture(&mut self, texture: TextureHandle);
    fn destroy_view(&mut self, view: ViewHandle);
    fn destroy_scene(&mut self, scene: SceneHandle);
    fn destroy_camera(&mut self, camera: CameraHandle);
    fn destroy_renderer(&mut self, renderer: RendererHandle);

    /// Tears down the engine itself. Must be the last destruction; all other
    /// handles are invalid afterwards.
    fn destroy(&mut self);
}
