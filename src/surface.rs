//! The surface binding: reacting to platform surface events.
//!
//! The host view system delivers three events for the drawing surface
//! backing a view: created, resized and destroyed. This module keeps the
//! engine's swap chain in lockstep with them. The one hard ordering rule
//! lives in [`on_destroyed`]: after destroying the swap chain, the engine
//! must confirm the destroy command has executed before control returns,
//! because the OS may reclaim the underlying surface memory immediately
//! afterwards.

use crate::{
    camera::OrthoBounds,
    controller::ControllerInner,
    engine::{NativeSurface, RendererHandle},
};

/// Display attachment helper. Binds the engine's renderer to the display the
/// surface lives on; detached before the surface goes away.
pub trait DisplayLink {
    fn attach(&self, renderer: RendererHandle);
    fn detach(&self);
}

/// A platform surface lifecycle event, delivered by the host view system on
/// the rendering context.
#[derive(Clone, Copy, Debug)]
pub enum SurfaceEvent {
    Created(NativeSurface),
    Resized { width: u32, height: u32 },
    Destroyed,
}

/// A surface is available (first time, or replacing a previous one). Any
/// existing swap chain is destroyed first so surface replacement never leaks.
pub(crate) fn on_created(state: &mut ControllerInner, surface: NativeSurface) {
    let Some(engine) = state.engine.as_deref_mut() else {
        log::warn!(
            "view {}: surface created before the view was provided",
            state.view_id
        );
        return;
    };
    if let Some(old) = state.swap_chain.take() {
        engine.destroy_swap_chain(old);
    }
    state.swap_chain = Some(engine.create_swap_chain(&surface));
    if let Some(resources) = state.phase.active() {
        state.link.attach(resources.renderer);
    }
    if let Some((width, height)) = state.pending_resize.take() {
        on_resized(state, width, height);
    }
}

/// Recomputes the camera projection and viewport. Does not recreate the swap
/// chain. Zero dimensions are a transient layout state and are ignored;
/// dimensions arriving before engine resources exist are recorded and applied
/// once they do.
pub(crate) fn on_resized(state: &mut ControllerInner, width: u32, height: u32) {
    let Some(bounds) = OrthoBounds::for_surface(width, height, state.zoom) else {
        log::trace!(
            "view {}: ignoring resize to {width}x{height}",
            state.view_id
        );
        return;
    };
    let ControllerInner {
        engine,
        phase,
        last_size,
        pending_resize,
        ..
    } = state;
    match (engine.as_deref_mut(), phase.active()) {
        (Some(engine), Some(resources)) => {
            engine.set_camera_projection(resources.camera, bounds);
            engine.set_viewport(resources.view, width, height);
            *last_size = Some((width, height));
        }
        _ => *pending_resize = Some((width, height)),
    }
}

/// The surface is going away. Detaches the display link, destroys the swap
/// chain and blocks until the engine acknowledges the destruction. Only after
/// that may the caller let the OS reclaim the surface.
pub(crate) fn on_destroyed(state: &mut ControllerInner) {
    state.link.detach();
    if let Some(swap_chain) = state.swap_chain.take() {
        if let Some(engine) = state.engine.as_deref_mut() {
            engine.destroy_swap_chain(swap_chain);
            engine.flush_and_wait();
        }
    }
}
