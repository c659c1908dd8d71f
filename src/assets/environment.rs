//! Environment lighting data.

use crate::{assets::LoadError, engine::EnvironmentData};

/// Default intensity applied to decoded environments, in lux.
pub const DEFAULT_INTENSITY: f32 = 30_000.0;

/// Produces cubemap/irradiance datasets keyed by environment name, used to
/// initialize indirect lighting and the skybox.
pub trait EnvironmentSource {
    fn load(&self, name: &str) -> anyhow::Result<EnvironmentData>;
}

/// Decodes an HDR radiance payload into [`EnvironmentData`].
pub fn decode_hdr(label: &str, bytes: &[u8]) -> Result<EnvironmentData, LoadError> {
    let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Hdr)
        .map_err(|err| LoadError::decode(label, err))?
        .to_rgb32f();
    let (width, height) = image.dimensions();
    Ok(EnvironmentData {
        width,
        height,
        radiance: image.into_raw(),
        intensity: DEFAULT_INTENSITY,
    })
}
