//! Shared fakes for the integration tests: a recording engine, a manually
//! stepped frame clock, an in-memory transport and content sources, and a
//! harness that wires a [`ViewController`] to all of them.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    io::{Cursor, Write as _},
    rc::Rc,
    sync::Arc,
};

use serde_json::Value;

use glowplug::{
    ControllerDeps, DisplayContext, NativeSurface, RenderEngine, SceneKind, ViewController,
    assets::{AssetSource, environment::EnvironmentSource},
    camera::OrthoBounds,
    channel::{MessageTransport, MethodHandler},
    context::TaskDispatcher,
    engine::{
        CameraHandle, EntityHandle, EnvironmentData, FenceHandle, IndexBufferHandle,
        MaterialHandle, RendererHandle, SceneHandle, SwapChainHandle, TextureHandle,
        VertexBufferHandle, ViewHandle,
    },
    remote::{RemotePayload, RemoteSource},
    scheduler::{FrameCallback, FrameClock},
    surface::DisplayLink,
};

/// One recorded engine call. Handle-carrying variants keep the raw id so
/// tests can assert create/destroy pairing and ordering.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineOp {
    Create(&'static str, u64),
    Destroy(&'static str, u64),
    AddEntity(u64),
    RemoveEntity(u64),
    SetTransform(u64),
    SetSkybox([f32; 4]),
    SetProjection(OrthoBounds),
    SetViewport(u32, u32),
    SetEnvironment(u32, u32),
    BeginFrame(u64),
    Render,
    EndFrame,
    FlushAndWait,
    EngineDestroyed,
    /// Any call arriving after `destroy()`. Must never appear.
    UseAfterDestroy,
}

/// Shared, inspectable state behind a [`FakeEngine`].
#[derive(Default)]
pub struct EngineState {
    next_handle: u64,
    pub ops: Vec<EngineOp>,
    /// Created-but-not-destroyed handles, by kind.
    pub live: HashMap<u64, &'static str>,
    pub live_entities: usize,
    pub max_live_entities: usize,
    /// What `begin_frame` answers; `false` simulates GPU backpressure.
    pub accept_frames: bool,
    /// What `fence_signaled` answers.
    pub fences_signal: bool,
    pub destroyed: bool,
    pub begin_frame_calls: u32,
    pub render_calls: u32,
    /// Pixel uploads, for comparing decoded texture content across runs.
    pub textures_uploaded: Vec<(u32, u32, Vec<u8>)>,
}

impl EngineState {
    fn alloc(&mut self, kind: &'static str) -> u64 {
        self.guard();
        self.next_handle += 1;
        let id = self.next_handle;
        self.live.insert(id, kind);
        self.ops.push(EngineOp::Create(kind, id));
        id
    }

    fn release(&mut self, kind: &'static str, id: u64) {
        self.guard();
        assert_eq!(
            self.live.remove(&id),
            Some(kind),
            "destroy of a dead or mistyped handle: {kind} {id}"
        );
        self.ops.push(EngineOp::Destroy(kind, id));
    }

    fn guard(&mut self) {
        if self.destroyed {
            self.ops.push(EngineOp::UseAfterDestroy);
        }
    }

    pub fn live_count(&self, kind: &str) -> usize {
        self.live.values().filter(|k| **k == kind).count()
    }

    pub fn created_count(&self, kind: &str) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, EngineOp::Create(k, _) if *k == kind))
            .count()
    }

    pub fn destroyed_count(&self, kind: &str) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, EngineOp::Destroy(k, _) if *k == kind))
            .count()
    }

    /// Index of the first op matching `pred`, for ordering assertions.
    pub fn position(&self, pred: impl Fn(&EngineOp) -> bool) -> Option<usize> {
        self.ops.iter().position(pred)
    }
}

/// Handle to inspect and steer a [`FakeEngine`] from the test body.
pub type EngineProbe = Rc<RefCell<EngineState>>;

/// [`RenderEngine`] stand-in that records every call into an op log.
pub struct FakeEngine {
    state: EngineProbe,
}

/// Creates a fake engine plus the probe observing it.
pub fn fake_engine() -> (Box<dyn RenderEngine>, EngineProbe) {
    let state = Rc::new(RefCell::new(EngineState {
        accept_frames: true,
        fences_signal: true,
        ..EngineState::default()
    }));
    let engine = FakeEngine {
        state: Rc::clone(&state),
    };
    (Box::new(engine), state)
}

impl RenderEngine for FakeEngine {
    fn create_renderer(&mut self) -> RendererHandle {
        RendererHandle(self.state.borrow_mut().alloc("renderer"))
    }
    fn create_scene(&mut self) -> SceneHandle {
        SceneHandle(self.state.borrow_mut().alloc("scene"))
    }
    fn create_view(&mut self) -> ViewHandle {
        ViewHandle(self.state.borrow_mut().alloc("view"))
    }
    fn create_camera(&mut self) -> CameraHandle {
        CameraHandle(self.state.borrow_mut().alloc("camera"))
    }

    fn set_view_camera(&mut self, _view: ViewHandle, _camera: CameraHandle) {
        self.state.borrow_mut().guard();
    }
    fn set_view_scene(&mut self, _view: ViewHandle, _scene: SceneHandle) {
        self.state.borrow_mut().guard();
    }
    fn set_skybox_color(&mut self, _scene: SceneHandle, color: [f32; 4]) {
        let mut state = self.state.borrow_mut();
        state.guard();
        state.ops.push(EngineOp::SetSkybox(color));
    }
    fn set_camera_projection(&mut self, _camera: CameraHandle, bounds: OrthoBounds) {
        let mut state = self.state.borrow_mut();
        state.guard();
        state.ops.push(EngineOp::SetProjection(bounds));
    }
    fn set_viewport(&mut self, _view: ViewHandle, width: u32, height: u32) {
        let mut state = self.state.borrow_mut();
        state.guard();
        state.ops.push(EngineOp::SetViewport(width, height));
    }
    fn set_environment(&mut self, _scene: SceneHandle, environment: &EnvironmentData) {
        let mut state = self.state.borrow_mut();
        state.guard();
        state
            .ops
            .push(EngineOp::SetEnvironment(environment.width, environment.height));
    }

    fn create_vertex_buffer(&mut self, _data: &[u8], _vertex_count: u32) -> VertexBufferHandle {
        VertexBufferHandle(self.state.borrow_mut().alloc("vertex_buffer"))
    }
    fn create_index_buffer(&mut self, _data: &[u8], _index_count: u32) -> IndexBufferHandle {
        IndexBufferHandle(self.state.borrow_mut().alloc("index_buffer"))
    }
    fn create_material(&mut self, _payload: &[u8]) -> MaterialHandle {
        MaterialHandle(self.state.borrow_mut().alloc("material"))
    }
    fn create_texture(&mut self, pixels: &[u8], width: u32, height: u32) -> TextureHandle {
        let mut state = self.state.borrow_mut();
        state
            .textures_uploaded
            .push((width, height, pixels.to_vec()));
        TextureHandle(state.alloc("texture"))
    }
    fn create_renderable(
        &mut self,
        _vertices: VertexBufferHandle,
        _indices: IndexBufferHandle,
        _material: MaterialHandle,
        _index_count: u32,
    ) -> EntityHandle {
        EntityHandle(self.state.borrow_mut().alloc("entity"))
    }

    fn add_entity(&mut self, _scene: SceneHandle, entity: EntityHandle) {
        let mut state = self.state.borrow_mut();
        state.guard();
        state.live_entities += 1;
        state.max_live_entities = state.max_live_entities.max(state.live_entities);
        state.ops.push(EngineOp::AddEntity(entity.0));
    }
    fn remove_entity(&mut self, _scene: SceneHandle, entity: EntityHandle) {
        let mut state = self.state.borrow_mut();
        state.guard();
        state.live_entities -= 1;
        state.ops.push(EngineOp::RemoveEntity(entity.0));
    }
    fn set_transform(&mut self, entity: EntityHandle, _transform: [[f32; 4]; 4]) {
        let mut state = self.state.borrow_mut();
        state.guard();
        state.ops.push(EngineOp::SetTransform(entity.0));
    }

    fn create_swap_chain(&mut self, _surface: &NativeSurface) -> SwapChainHandle {
        SwapChainHandle(self.state.borrow_mut().alloc("swap_chain"))
    }
    fn destroy_swap_chain(&mut self, swap_chain: SwapChainHandle) {
        self.state.borrow_mut().release("swap_chain", swap_chain.0);
    }

    fn flush_and_wait(&mut self) {
        let mut state = self.state.borrow_mut();
        state.guard();
        state.ops.push(EngineOp::FlushAndWait);
    }

    fn begin_frame(&mut self, swap_chain: SwapChainHandle, _frame_time_nanos: u64) -> bool {
        let mut state = self.state.borrow_mut();
        state.guard();
        state.begin_frame_calls += 1;
        state.ops.push(EngineOp::BeginFrame(swap_chain.0));
        state.accept_frames
    }
    fn render(&mut self, _view: ViewHandle) {
        let mut state = self.state.borrow_mut();
        state.guard();
        state.render_calls += 1;
        state.ops.push(EngineOp::Render);
    }
    fn end_frame(&mut self) {
        let mut state = self.state.borrow_mut();
        state.guard();
        state.ops.push(EngineOp::EndFrame);
    }

    fn create_fence(&mut self) -> FenceHandle {
        FenceHandle(self.state.borrow_mut().alloc("fence"))
    }
    fn fence_signaled(&mut self, _fence: FenceHandle) -> bool {
        let mut state = self.state.borrow_mut();
        state.guard();
        state.fences_signal
    }
    fn destroy_fence(&mut self, fence: FenceHandle) {
        self.state.borrow_mut().release("fence", fence.0);
    }

    fn destroy_entity(&mut self, entity: EntityHandle) {
        self.state.borrow_mut().release("entity", entity.0);
    }
    fn destroy_vertex_buffer(&mut self, buffer: VertexBufferHandle) {
        self.state.borrow_mut().release("vertex_buffer", buffer.0);
    }
    fn destroy_index_buffer(&mut self, buffer: IndexBufferHandle) {
        self.state.borrow_mut().release("index_buffer", buffer.0);
    }
    fn destroy_material(&mut self, material: MaterialHandle) {
        self.state.borrow_mut().release("material", material.0);
    }
    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.state.borrow_mut().release("texture", texture.0);
    }
    fn destroy_view(&mut self, view: ViewHandle) {
        self.state.borrow_mut().release("view", view.0);
    }
    fn destroy_scene(&mut self, scene: SceneHandle) {
        self.state.borrow_mut().release("scene", scene.0);
    }
    fn destroy_camera(&mut self, camera: CameraHandle) {
        self.state.borrow_mut().release("camera", camera.0);
    }
    fn destroy_renderer(&mut self, renderer: RendererHandle) {
        self.state.borrow_mut().release("renderer", renderer.0);
    }

    fn destroy(&mut self) {
        let mut state = self.state.borrow_mut();
        state.guard();
        state.destroyed = true;
        state.ops.push(EngineOp::EngineDestroyed);
    }
}

/// [`FrameClock`] stepped explicitly by the test. Posted callbacks run only
/// when [`ManualFrameClock::step`] is called, matching the contract that a
/// post never fires synchronously.
#[derive(Default)]
pub struct ManualFrameClock {
    pending: RefCell<Vec<Rc<dyn FrameCallback>>>,
    posts: Cell<u32>,
}

impl ManualFrameClock {
    /// Delivers one vsync: drains the pending callbacks and invokes each.
    /// Returns how many ran.
    pub fn step(&self, frame_time_nanos: u64) -> usize {
        let callbacks: Vec<_> = self.pending.borrow_mut().drain(..).collect();
        for callback in &callbacks {
            callback.do_frame(frame_time_nanos);
        }
        callbacks.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Total `post_frame_callback` calls observed.
    pub fn post_count(&self) -> u32 {
        self.posts.get()
    }
}

impl FrameClock for ManualFrameClock {
    fn post_frame_callback(&self, callback: Rc<dyn FrameCallback>) {
        self.posts.set(self.posts.get() + 1);
        self.pending.borrow_mut().push(callback);
    }

    fn remove_frame_callback(&self, callback: &Rc<dyn FrameCallback>) {
        let target = Rc::as_ptr(callback) as *const ();
        self.pending
            .borrow_mut()
            .retain(|pending| Rc::as_ptr(pending) as *const () != target);
    }
}

/// [`DisplayLink`] that only counts attach/detach calls.
#[derive(Default)]
pub struct RecordingDisplayLink {
    pub attaches: Cell<u32>,
    pub detaches: Cell<u32>,
}

impl DisplayLink for RecordingDisplayLink {
    fn attach(&self, _renderer: RendererHandle) {
        self.attaches.set(self.attaches.get() + 1);
    }
    fn detach(&self) {
        self.detaches.set(self.detaches.get() + 1);
    }
}

/// [`MessageTransport`] recording handler registrations and outbound invokes.
#[derive(Default)]
pub struct RecordingTransport {
    handlers: RefCell<HashMap<String, Rc<dyn MethodHandler>>>,
    pub invocations: RefCell<Vec<(String, String, Value)>>,
}

impl RecordingTransport {
    pub fn has_handler(&self, channel: &str) -> bool {
        self.handlers.borrow().contains_key(channel)
    }

    /// Messages of every `status` invocation, in order.
    pub fn statuses(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .filter(|(_, method, _)| method == "status")
            .filter_map(|(_, _, args)| Some(args.get("message")?.as_str()?.to_owned()))
            .collect()
    }
}

impl MessageTransport for RecordingTransport {
    fn set_handler(&self, channel: &str, handler: Option<Rc<dyn MethodHandler>>) {
        match handler {
            Some(handler) => {
                self.handlers.borrow_mut().insert(channel.to_owned(), handler);
            }
            None => {
                self.handlers.borrow_mut().remove(channel);
            }
        }
    }

    fn invoke(&self, channel: &str, method: &str, arguments: Value) {
        self.invocations
            .borrow_mut()
            .push((channel.to_owned(), method.to_owned(), arguments));
    }
}

/// In-memory [`AssetSource`].
#[derive(Default)]
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    /// Starts with the two material packages every scene kind may request.
    pub fn with_materials() -> Self {
        let mut assets = Self::default();
        assets.insert("baked_color.filamat", b"fake baked material".to_vec());
        assets.insert("textured.filamat", b"fake textured material".to_vec());
        assets
    }

    pub fn insert(&mut self, path: &str, bytes: Vec<u8>) {
        self.files.insert(path.to_owned(), bytes);
    }
}

impl AssetSource for MemoryAssets {
    fn load(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no bundled asset `{path}`"))
    }
}

/// [`EnvironmentSource`] with fixed named entries.
#[derive(Default)]
pub struct MemoryEnvironments {
    entries: HashMap<String, EnvironmentData>,
}

impl MemoryEnvironments {
    pub fn insert(&mut self, name: &str, data: EnvironmentData) {
        self.entries.insert(name.to_owned(), data);
    }
}

impl EnvironmentSource for MemoryEnvironments {
    fn load(&self, name: &str) -> anyhow::Result<EnvironmentData> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no environment `{name}`"))
    }
}

/// [`RemoteSource`] draining a queue the test fills.
pub struct QueueRemote {
    queue: Rc<RefCell<VecDeque<RemotePayload>>>,
}

impl RemoteSource for QueueRemote {
    fn poll(&mut self) -> Option<RemotePayload> {
        self.queue.borrow_mut().pop_front()
    }
}

/// [`TaskDispatcher`] that runs every job on the calling thread, making
/// background decodes deterministic in tests.
pub struct InlineDispatcher;

impl TaskDispatcher for InlineDispatcher {
    fn dispatch(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

/// A fully wired controller plus probes into every collaborator.
pub struct Harness {
    pub controller: ViewController,
    pub clock: Rc<ManualFrameClock>,
    pub link: Rc<RecordingDisplayLink>,
    pub transport: Rc<RecordingTransport>,
    pub probe: EngineProbe,
    pub remote: Rc<RefCell<VecDeque<RemotePayload>>>,
}

impl Harness {
    pub fn new(scene: SceneKind) -> Self {
        Self::with_assets(scene, MemoryAssets::with_materials())
    }

    pub fn with_assets(scene: SceneKind, assets: MemoryAssets) -> Self {
        let clock = Rc::new(ManualFrameClock::default());
        let link = Rc::new(RecordingDisplayLink::default());
        let transport = Rc::new(RecordingTransport::default());
        let (engine, probe) = fake_engine();
        let remote = Rc::new(RefCell::new(VecDeque::new()));
        let controller = ViewController::new(
            1,
            DisplayContext {
                clock: Rc::clone(&clock) as Rc<dyn FrameClock>,
                link: Rc::clone(&link) as Rc<dyn DisplayLink>,
            },
            Rc::clone(&transport) as Rc<dyn MessageTransport>,
            ControllerDeps {
                engine_factory: Box::new(move || engine),
                assets: Rc::new(assets),
                environments: None,
                remote: Some(Box::new(QueueRemote {
                    queue: Rc::clone(&remote),
                })),
                dispatcher: Arc::new(InlineDispatcher),
                scene,
            },
        );
        Self {
            controller,
            clock,
            link,
            transport,
            probe,
            remote,
        }
    }

    pub fn push_payload(&self, label: &str, bytes: Vec<u8>) {
        self.remote.borrow_mut().push_back(RemotePayload {
            label: label.to_owned(),
            bytes,
        });
    }
}

/// Interleaved position-only glTF triangle buffer (three `[f32; 3]`).
pub fn triangle_positions_bin() -> Vec<u8> {
    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    bytemuck::cast_slice(&positions).to_vec()
}

/// Minimal glTF scene description: one mesh, one primitive, positions from
/// the external buffer `bin_uri`, base color from the external image
/// `image_uri` when given.
pub fn minimal_gltf(bin_uri: &str, image_uri: Option<&str>) -> Vec<u8> {
    let mut doc = serde_json::json!({
        "asset": { "version": "2.0" },
        "buffers": [{ "uri": bin_uri, "byteLength": 36 }],
        "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }],
        "accessors": [{
            "bufferView": 0,
            "byteOffset": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0]
        }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }]
    });
    if let Some(uri) = image_uri {
        doc["meshes"][0]["primitives"][0]["material"] = serde_json::json!(0);
        doc["materials"] = serde_json::json!([{
            "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } }
        }]);
        doc["textures"] = serde_json::json!([{ "source": 0 }]);
        doc["images"] = serde_json::json!([{ "uri": uri }]);
    }
    serde_json::to_vec(&doc).unwrap()
}

/// A tiny valid PNG (2x2, opaque orange).
pub fn tiny_png() -> Vec<u8> {
    let pixels = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 128, 0, 255]));
    let mut bytes = Cursor::new(Vec::new());
    pixels
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

/// Builds an uncompressed zip archive from `(path, bytes)` entries.
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (path, bytes) in entries {
        writer.start_file(*path, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
