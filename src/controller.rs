//! The per-view lifecycle controller.
//!
//! [`ViewController`] is the state machine the host view system drives:
//! construct, provide the view, resize, deliver surface events, dispose.
//! Its whole purpose is to bracket the engine's resource lifetime correctly:
//! nothing engine-side exists before [`ViewController::provide_view`], and
//! after [`ViewController::dispose`] every handle has been destroyed exactly
//! once, in dependency order, with the engine itself last. `dispose` is
//! terminal: every later operation is a no-op, never a call into a destroyed
//! engine.
//!
//! All controller state lives behind a single `Rc<RefCell<_>>` on the one
//! rendering-capable context. The frame ticker and the method-call handler
//! hold it weakly; neither can outlive-and-touch a torn-down controller.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use anyhow::{Context as _, bail};
use instant::Instant;
use tokio::sync::mpsc;

use crate::{
    assets::{
        AssetSource, LoadError, archive::scan_for_scene_description,
        environment::EnvironmentSource,
    },
    camera::{DEFAULT_ZOOM, OrthoBounds},
    channel::{CommandChannel, MessageTransport, MethodCall, MethodHandler, MethodResult},
    context::SharedDispatcher,
    engine::{RenderEngine, SwapChainHandle},
    remote::{
        LoadedContent, PayloadKind, RemotePayload, RemoteSource, ViewerSettings, classify,
        decode_payload,
    },
    resources::{AssetId, EngineResources, ResourcePhase},
    scene::{
        Animator, BAKED_COLOR_MATERIAL, SKYBOX_COLOR, SPIN_PERIOD, SceneKind, TEXTURED_MATERIAL,
        build_initial_scene, install_bundle,
    },
    scheduler::{FrameCallback, FrameClock, FrameSchedulerState, FrameTicker},
    surface::{self, DisplayLink, SurfaceEvent},
};

/// Token for the native view handed back to the host on provide-view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlatformViewHandle(pub i32);

/// Display-side collaborators for one view.
#[derive(Clone)]
pub struct DisplayContext {
    pub clock: Rc<dyn FrameClock>,
    pub link: Rc<dyn DisplayLink>,
}

/// Content and execution collaborators for one view.
pub struct ControllerDeps {
    /// Creates the engine instance on provide-view. Consumed once.
    pub engine_factory: Box<dyn FnOnce() -> Box<dyn RenderEngine>>,
    pub assets: Rc<dyn AssetSource>,
    pub environments: Option<Rc<dyn EnvironmentSource>>,
    pub remote: Option<Box<dyn RemoteSource>>,
    pub dispatcher: SharedDispatcher,
    pub scene: SceneKind,
}

pub(crate) struct ControllerInner {
    pub(crate) view_id: i32,
    /// Terminal. Set exactly once, at the end of the first dispose.
    pub(crate) disposed: bool,
    provided: bool,
    engine_factory: Option<Box<dyn FnOnce() -> Box<dyn RenderEngine>>>,
    pub(crate) engine: Option<Box<dyn RenderEngine>>,
    pub(crate) phase: ResourcePhase,
    /// Non-`None` iff a surface is currently bound.
    pub(crate) swap_chain: Option<SwapChainHandle>,
    pub(crate) pending_resize: Option<(u32, u32)>,
    pub(crate) last_size: Option<(u32, u32)>,
    pub(crate) zoom: f64,
    pub(crate) scheduler: FrameSchedulerState,
    pub(crate) ticker: Option<Rc<dyn FrameCallback>>,
    pub(crate) clock: Rc<dyn FrameClock>,
    pub(crate) link: Rc<dyn DisplayLink>,
    pub(crate) channel: Option<CommandChannel>,
    scene_kind: SceneKind,
    pub(crate) current_asset: Option<AssetId>,
    pub(crate) animator: Option<Animator>,
    pub(crate) assets: Rc<dyn AssetSource>,
    environments: Option<Rc<dyn EnvironmentSource>>,
    pub(crate) remote: Option<Box<dyn RemoteSource>>,
    dispatcher: SharedDispatcher,
    loaded_tx: mpsc::UnboundedSender<LoadedContent>,
    pub(crate) loaded_rx: mpsc::UnboundedReceiver<LoadedContent>,
    pub(crate) load_started: Option<Instant>,
}

/// The lifecycle controller for one embedded view.
pub struct ViewController {
    inner: Rc<RefCell<ControllerInner>>,
}

impl ViewController {
    /// Allocates controller state and registers the command channel handler.
    /// No engine resources are created yet.
    pub fn new(
        view_id: i32,
        display: DisplayContext,
        transport: Rc<dyn MessageTransport>,
        deps: ControllerDeps,
    ) -> Self {
        let (loaded_tx, loaded_rx) = mpsc::unbounded_channel();
        let inner = Rc::new(RefCell::new(ControllerInner {
            view_id,
            disposed: false,
            provided: false,
            engine_factory: Some(deps.engine_factory),
            engine: None,
            phase: ResourcePhase::Uninitialized,
            swap_chain: None,
            pending_resize: None,
            last_size: None,
            zoom: DEFAULT_ZOOM,
            scheduler: FrameSchedulerState::new(),
            ticker: None,
            clock: display.clock,
            link: display.link,
            channel: None,
            scene_kind: deps.scene,
            current_asset: None,
            animator: None,
            assets: deps.assets,
            environments: deps.environments,
            remote: deps.remote,
            dispatcher: deps.dispatcher,
            loaded_tx,
            loaded_rx,
            load_started: None,
        }));

        let handler = Rc::new(ControllerMethodHandler {
            inner: Rc::downgrade(&inner),
        });
        let channel = CommandChannel::register(transport, view_id, handler);
        {
            let mut state = inner.borrow_mut();
            state.channel = Some(channel);
            state.ticker = Some(Rc::new(FrameTicker::new(Rc::downgrade(&inner))));
        }

        Self { inner }
    }

    pub fn view_id(&self) -> i32 {
        self.inner.borrow().view_id
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Creates the engine and its resource set, builds the configured scene,
    /// arms the frame scheduler and returns the native view handle.
    ///
    /// Valid exactly once per controller. A second call (and any call after
    /// dispose) fails loudly; the first call's resources are untouched.
    /// Failure to load the initial content is recoverable: the view comes up
    /// with an empty scene and a status notification instead of an error.
    pub fn provide_view(&self) -> anyhow::Result<PlatformViewHandle> {
        let state = &mut *self.inner.borrow_mut();
        if state.disposed {
            bail!("view {} is disposed", state.view_id);
        }
        if state.provided {
            bail!("provide_view called twice for view {}", state.view_id);
        }
        state.provided = true;

        let factory = state
            .engine_factory
            .take()
            .context("engine factory missing")?;
        let mut engine = factory();
        let mut resources = EngineResources::create(engine.as_mut());
        engine.set_skybox_color(resources.scene, SKYBOX_COLOR);

        match build_initial_scene(
            &state.scene_kind,
            engine.as_mut(),
            &mut resources,
            state.assets.as_ref(),
            state.environments.as_deref(),
        ) {
            Ok(setup) => {
                state.current_asset = setup.current;
                if setup.animated {
                    state.animator = Some(Animator::new(SPIN_PERIOD));
                }
            }
            Err(err) => {
                // The scene stays empty; all base resources are intact.
                notify_status(state, &format!("could not load initial content: {err}"));
            }
        }

        state.engine = Some(engine);
        state.phase = ResourcePhase::Active(resources);
        if let Some((width, height)) = state.pending_resize.take() {
            surface::on_resized(state, width, height);
        }

        state.scheduler.armed = true;
        let ticker = state.ticker.clone().context("frame ticker missing")?;
        state.clock.post_frame_callback(ticker);

        log::debug!("view {} provided", state.view_id);
        Ok(PlatformViewHandle(state.view_id))
    }

    /// Forwards new dimensions to the surface binding. Zero dimensions are
    /// ignored; calls after dispose are no-ops.
    pub fn resize(&self, width: u32, height: u32) {
        let state = &mut *self.inner.borrow_mut();
        if state.disposed {
            return;
        }
        surface::on_resized(state, width, height);
    }

    /// Delivers a platform surface event. No-op after dispose.
    pub fn handle_surface_event(&self, event: SurfaceEvent) {
        let state = &mut *self.inner.borrow_mut();
        if state.disposed {
            log::warn!("view {}: surface event after dispose ignored", state.view_id);
            return;
        }
        match event {
            SurfaceEvent::Created(surface) => surface::on_created(state, surface),
            SurfaceEvent::Resized { width, height } => surface::on_resized(state, width, height),
            SurfaceEvent::Destroyed => surface::on_destroyed(state),
        }
    }

    /// Tears the view down. At most once: a second call is a no-op.
    ///
    /// Order is strict: channel handler unregistered, scheduler disarmed and
    /// its pending callback removed, surface binding detached (flushing the
    /// engine's outstanding commands), per-asset resources destroyed, then
    /// view/scene/camera/renderer, then the engine itself.
    pub fn dispose(&self) {
        let state = &mut *self.inner.borrow_mut();
        if state.disposed {
            return;
        }

        if let Some(channel) = state.channel.take() {
            channel.unregister();
        }

        state.scheduler.armed = false;
        if let Some(ticker) = state.ticker.take() {
            state.clock.remove_frame_callback(&ticker);
        }

        surface::on_destroyed(state);

        if let Some(mut engine) = state.engine.take() {
            if let Some(fence) = state.scheduler.pending_load_fence.take() {
                // Abandoned, never awaited.
                engine.destroy_fence(fence);
            }
            if let ResourcePhase::Active(resources) =
                std::mem::replace(&mut state.phase, ResourcePhase::Destroyed)
            {
                resources.destroy_all(engine.as_mut());
            }
            engine.destroy();
        } else {
            state.phase = ResourcePhase::Destroyed;
        }

        state.current_asset = None;
        state.animator = None;
        state.disposed = true;
        log::debug!("view {} disposed", state.view_id);
    }
}

impl Drop for ViewController {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct ControllerMethodHandler {
    inner: Weak<RefCell<ControllerInner>>,
}

impl MethodHandler for ControllerMethodHandler {
    fn on_method_call(&self, call: MethodCall) -> MethodResult {
        // No application-specific commands yet; every call is answered.
        if self.inner.upgrade().is_none() {
            log::warn!("method call `{}` for a dropped view", call.method);
        } else {
            log::debug!("unhandled method call `{}`", call.method);
        }
        MethodResult::NotImplemented
    }
}

/// Surfaces a transient, user-visible status message.
pub(crate) fn notify_status(state: &ControllerInner, message: &str) {
    log::warn!("view {}: {message}", state.view_id);
    if let Some(channel) = &state.channel {
        channel.notify_status(message);
    }
}

/// Destroys the currently displayed asset, leaving an empty (not torn) scene.
pub(crate) fn destroy_current_asset(state: &mut ControllerInner) {
    let Some(id) = state.current_asset.take() else {
        return;
    };
    let ControllerInner { engine, phase, .. } = state;
    if let (Some(engine), Some(resources)) = (engine.as_deref_mut(), phase.active_mut()) {
        resources.destroy_asset(engine, id);
    }
}

/// Routes one remote payload. Settings apply inline; binary payloads go to
/// the background executor. For model payloads the previous asset is
/// destroyed *before* decoding begins so large content is never held twice.
pub(crate) fn handle_payload(state: &mut ControllerInner, payload: RemotePayload) {
    let Some(kind) = classify(&payload.label) else {
        notify_status(
            state,
            &LoadError::UnrecognizedPayload(payload.label).to_string(),
        );
        return;
    };

    if kind == PayloadKind::Settings {
        match ViewerSettings::parse(&payload.label, &payload.bytes) {
            Ok(settings) => apply_settings(state, &settings),
            Err(err) => notify_status(state, &err.to_string()),
        }
        return;
    }

    // The previous asset is destroyed before decoding starts, to bound peak
    // memory. An archive that demonstrably holds no scene description is
    // rejected up front so the current scene survives it.
    if kind == PayloadKind::Archive {
        if let Err(err) = scan_for_scene_description(&payload.bytes) {
            notify_status(state, &err.to_string());
            return;
        }
    }
    if matches!(kind, PayloadKind::Model | PayloadKind::Archive) {
        destroy_current_asset(state);
        state.load_started = Some(Instant::now());
    }

    let tx = state.loaded_tx.clone();
    let RemotePayload { label, bytes } = payload;
    state.dispatcher.dispatch(Box::new(move || {
        let content = decode_payload(kind, &label, &bytes);
        let _ = tx.send(content);
    }));
}

/// Installs a finished background decode on the rendering context.
pub(crate) fn install_loaded(state: &mut ControllerInner, content: LoadedContent) {
    match content {
        LoadedContent::Model(bundle) => {
            let material_name = if bundle.base_color.is_some() {
                TEXTURED_MATERIAL
            } else {
                BAKED_COLOR_MATERIAL
            };
            let material_payload = match state.assets.load(material_name) {
                Ok(payload) => payload,
                Err(err) => {
                    state.load_started = None;
                    notify_status(state, &format!("could not load `{material_name}`: {err}"));
                    return;
                }
            };
            let ControllerInner {
                engine,
                phase,
                scheduler,
                current_asset,
                ..
            } = state;
            let (Some(engine), Some(resources)) = (engine.as_deref_mut(), phase.active_mut())
            else {
                return;
            };
            let id = install_bundle(engine, resources, &material_payload, &bundle);
            *current_asset = Some(id);
            if let Some(stale) = scheduler.pending_load_fence.take() {
                engine.destroy_fence(stale);
            }
            scheduler.pending_load_fence = Some(engine.create_fence());
            log::debug!("installed model `{}`", bundle.label);
        }
        LoadedContent::Environment(environment) => {
            let ControllerInner { engine, phase, .. } = state;
            if let (Some(engine), Some(resources)) = (engine.as_deref_mut(), phase.active()) {
                engine.set_environment(resources.scene, &environment);
            }
        }
        LoadedContent::Status(message) => {
            state.load_started = None;
            notify_status(state, &message);
        }
    }
}

/// Applies a parsed settings payload to the live scene.
pub(crate) fn apply_settings(state: &mut ControllerInner, settings: &ViewerSettings) {
    {
        let ControllerInner {
            engine,
            phase,
            zoom,
            last_size,
            ..
        } = state;
        if let (Some(engine), Some(resources)) = (engine.as_deref_mut(), phase.active()) {
            if let Some(color) = settings.skybox_color {
                engine.set_skybox_color(resources.scene, color);
            }
            if let Some(new_zoom) = settings.camera_zoom {
                *zoom = new_zoom;
                if let Some((width, height)) = *last_size {
                    if let Some(bounds) = OrthoBounds::for_surface(width, height, new_zoom) {
                        engine.set_camera_projection(resources.camera, bounds);
                    }
                }
            }
        }
    }
    if let Some(auto_rotate) = settings.auto_rotate {
        state.animator = if auto_rotate {
            Some(Animator::new(SPIN_PERIOD))
        } else {
            None
        };
    }
}
