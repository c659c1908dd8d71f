//! glowplug
//!
//! Embeds a native 3D rendering engine's drawing surface into a host
//! platform-view hierarchy. The crate bridges the host view lifecycle
//! (attach, provide view, resize, detach, dispose) to the engine's resource
//! and frame lifecycle: it creates the engine objects a view needs (scene,
//! camera, view, renderer, swap chain), drives a per-frame render loop
//! synchronized to the display's vsync signal, and tears everything down
//! deterministically when the view goes away. The engine itself, the host's
//! messaging transport and all content producers are opaque collaborators
//! reached through traits.
//!
//! High-level modules
//! - `engine`: the opaque engine capability trait and handle types
//! - `controller`: the per-view lifecycle state machine
//! - `surface`: surface created/resized/destroyed handling and swap-chain binding
//! - `scheduler`: the self-re-arming vsync frame loop
//! - `camera`: aspect-corrected orthographic projection math
//! - `resources`: ownership and ordered teardown of engine handles
//! - `scene`: pluggable initial-content strategies and the rotation animator
//! - `channel`: the per-view command channel on the host transport
//! - `factory`: view factory, registry and activity-lifecycle shim
//! - `remote`: remote payload classification, decode and viewer settings
//! - `assets`: archives, glTF meshes, HDR environments, load errors
//! - `context`: background execution off the single rendering context
//!

pub mod assets;
pub mod camera;
pub mod channel;
pub mod context;
pub mod controller;
pub mod engine;
pub mod factory;
pub mod remote;
pub mod resources;
pub mod scene;
pub mod scheduler;
pub mod surface;

// Re-exports commonly used types for convenience in downstream code.
pub use channel::VIEW_TYPE;
pub use controller::{ControllerDeps, DisplayContext, PlatformViewHandle, ViewController};
pub use engine::{NativeSurface, RenderEngine};
pub use scene::SceneKind;
pub use surface::SurfaceEvent;

/// Initializes logging for host applications that have no logger of their
/// own. Safe to call when one is already installed.
pub fn init_logging() {
    if let Err(err) = env_logger::try_init() {
        log::debug!("logger already initialized: {err}");
    }
}
