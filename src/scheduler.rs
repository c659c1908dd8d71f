//! The frame scheduler: a self-sustaining vsync callback loop.
//!
//! Once armed, the scheduler re-posts itself to the display's frame clock on
//! every tick *before* doing any work, so a slow or failing step can never
//! break the loop. It is disarmed exactly once, on dispose. Per tick it
//! polls the pending load fence, advances the animation, attempts one render
//! pass (skipping without error when the engine reports backpressure) and
//! polls the remote content source.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use instant::Instant;

use crate::{
    controller::{self, ControllerInner},
    engine::FenceHandle,
};

/// A repeating per-vsync callback.
pub trait FrameCallback {
    fn do_frame(&self, frame_time_nanos: u64);
}

/// The display's vsync notifier.
///
/// Implementations must invoke posted callbacks on a later vsync on the
/// rendering context, never synchronously from `post_frame_callback`.
pub trait FrameClock {
    fn post_frame_callback(&self, callback: Rc<dyn FrameCallback>);
    /// Drops a pending callback so no further tick is delivered. Identity is
    /// by allocation (pointer equality).
    fn remove_frame_callback(&self, callback: &Rc<dyn FrameCallback>);
}

/// Scheduler bookkeeping inside the controller state.
pub struct FrameSchedulerState {
    /// Whether the loop re-posts itself. `true` from provide-view until
    /// dispose; armed is the steady state.
    pub armed: bool,
    pub last_frame_time_nanos: u64,
    /// Fence created when remotely loaded content was installed; polled each
    /// tick to record load-completion timing.
    pub pending_load_fence: Option<FenceHandle>,
}

impl FrameSchedulerState {
    pub(crate) fn new() -> Self {
        Self {
            armed: false,
            last_frame_time_nanos: 0,
            pending_load_fence: None,
        }
    }
}

/// The frame callback registered with the clock. Holds the controller state
/// weakly: a tick arriving after the controller is gone is a no-op.
pub(crate) struct FrameTicker {
    inner: Weak<RefCell<ControllerInner>>,
}

impl FrameTicker {
    pub(crate) fn new(inner: Weak<RefCell<ControllerInner>>) -> Self {
        Self { inner }
    }
}

impl FrameCallback for FrameTicker {
    fn do_frame(&self, frame_time_nanos: u64) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        tick(&mut inner.borrow_mut(), frame_time_nanos);
    }
}

/// One frame tick. Step order is load-bearing: re-arming comes first so the
/// loop self-sustains regardless of what later steps do.
pub(crate) fn tick(state: &mut ControllerInner, frame_time_nanos: u64) {
    if state.disposed || !state.scheduler.armed {
        return;
    }

    // 1. Schedule the next frame before anything else.
    if let Some(ticker) = state.ticker.clone() {
        state.clock.post_frame_callback(ticker);
    }
    state.scheduler.last_frame_time_nanos = frame_time_nanos;

    // 2. Poll the load-completion fence.
    if let Some(fence) = state.scheduler.pending_load_fence {
        if let Some(engine) = state.engine.as_deref_mut() {
            if engine.fence_signaled(fence) {
                engine.destroy_fence(fence);
                state.scheduler.pending_load_fence = None;
                if let Some(started) = state.load_started.take() {
                    log::debug!(
                        "view {}: content visible {} ms after load began",
                        state.view_id,
                        started.elapsed().as_millis()
                    );
                }
            }
        }
    }

    // 3. Advance the animation by wall-clock time.
    if let (Some(animator), Some(id)) = (&state.animator, state.current_asset) {
        let ControllerInner { engine, phase, .. } = state;
        if let (Some(engine), Some(resources)) = (engine.as_deref_mut(), phase.active()) {
            if let Some(asset) = resources.asset(id) {
                engine.set_transform(asset.entity, animator.transform(Instant::now()));
            }
        }
    }

    // 4. Render, if a surface is bound. A refused frame means the GPU queue
    //    has not drained; skip this tick.
    if let Some(swap_chain) = state.swap_chain {
        let ControllerInner { engine, phase, .. } = state;
        if let (Some(engine), Some(resources)) = (engine.as_deref_mut(), phase.active()) {
            if engine.begin_frame(swap_chain, frame_time_nanos) {
                engine.render(resources.view);
                engine.end_frame();
            } else {
                log::trace!("view {}: frame skipped, engine busy", state.view_id);
            }
        }
    }

    // 5. Rejoin finished background decodes, then poll the remote source.
    while let Ok(content) = state.loaded_rx.try_recv() {
        controller::install_loaded(state, content);
    }
    let payload = match state.remote.as_mut() {
        Some(remote) => remote.poll(),
        None => None,
    };
    if let Some(payload) = payload {
        controller::handle_payload(state, payload);
    }
}
