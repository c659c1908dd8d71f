//! Orthographic projection math for the embedded view's camera.
//!
//! The camera uses an aspect-corrected orthographic projection: a fixed
//! vertical half-extent (`zoom`) with the horizontal half-extent scaled by the
//! surface aspect ratio. Recomputed on every surface resize.

/// Orthographic projection bounds handed to the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrthoBounds {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
    pub near: f64,
    pub far: f64,
}

/// Default vertical half-extent of the projection volume.
pub const DEFAULT_ZOOM: f64 = 1.5;

const NEAR_PLANE: f64 = 0.0;
const FAR_PLANE: f64 = 10.0;

impl OrthoBounds {
    /// Computes aspect-corrected bounds for a surface of `width` x `height`
    /// pixels. Returns `None` when either dimension is zero: a zero height
    /// leaves the aspect ratio undefined, and both cases are transient layout
    /// states that must be ignored rather than forwarded to the engine.
    pub fn for_surface(width: u32, height: u32, zoom: f64) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let aspect = f64::from(width) / f64::from(height);
        Some(Self {
            left: -aspect * zoom,
            right: aspect * zoom,
            bottom: -zoom,
            top: zoom,
            near: NEAR_PLANE,
            far: FAR_PLANE,
        })
    }
}
