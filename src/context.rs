//! Background execution for the single rendering context.
//!
//! All engine-handle mutation happens on exactly one rendering-capable
//! context; heavy work (archive extraction, mesh and image decode) must not
//! run there. [`TaskDispatcher`] is the seam for shipping such work to a
//! background executor. Results rejoin the rendering context through a
//! channel drained by the frame scheduler, never through an implicit
//! continuation.

use std::sync::Arc;

/// Executor for CPU-heavy jobs that must stay off the rendering context.
///
/// Implementations may run jobs on a thread pool or, in tests, inline on the
/// calling thread. Jobs communicate results back exclusively through the
/// channel they capture; they never touch engine state.
pub trait TaskDispatcher {
    fn dispatch(&self, job: Box<dyn FnOnce() + Send>);
}

/// [`TaskDispatcher`] backed by a tokio runtime's blocking pool.
#[derive(Clone, Debug)]
pub struct TokioDispatcher {
    handle: tokio::runtime::Handle,
}

impl TokioDispatcher {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl TaskDispatcher for TokioDispatcher {
    fn dispatch(&self, job: Box<dyn FnOnce() + Send>) {
        self.handle.spawn_blocking(job);
    }
}

/// Shared dispatcher handle as stored by controllers and factories.
pub type SharedDispatcher = Arc<dyn TaskDispatcher>;
