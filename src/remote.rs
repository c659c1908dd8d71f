//! Remote debug/control payload dispatch.
//!
//! An external debug server (opaque to this crate) pushes tagged byte
//! buffers: a model file, an archive, an HDR environment, or JSON viewer
//! settings. The tag's file-extension suffix selects the handling. Binary
//! payloads are decoded off the rendering context and rejoin as
//! [`LoadedContent`]; settings are small and applied inline.

use serde::Deserialize;

use crate::{
    assets::{
        LoadError,
        archive::{StagedArchive, resolve_relative},
        environment::decode_hdr,
        model::{MeshBundle, decode_scene},
    },
    engine::EnvironmentData,
};

/// A buffer delivered by the remote source, tagged with a label whose
/// extension determines dispatch.
#[derive(Clone, Debug)]
pub struct RemotePayload {
    pub label: String,
    pub bytes: Vec<u8>,
}

/// Asynchronous producer of remote payloads, polled once per frame tick.
pub trait RemoteSource {
    fn poll(&mut self) -> Option<RemotePayload>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    Model,
    Archive,
    Environment,
    Settings,
}

/// Classifies a payload by its label suffix. `None` means the payload is
/// unrecognized and only worth a status message.
pub fn classify(label: &str) -> Option<PayloadKind> {
    let lower = label.to_ascii_lowercase();
    if lower.ends_with(".glb") || lower.ends_with(".gltf") {
        Some(PayloadKind::Model)
    } else if lower.ends_with(".zip") {
        Some(PayloadKind::Archive)
    } else if lower.ends_with(".hdr") {
        Some(PayloadKind::Environment)
    } else if lower.ends_with(".json") {
        Some(PayloadKind::Settings)
    } else {
        None
    }
}

/// Viewer settings payload. Every field is optional; absent fields leave the
/// current value untouched.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerSettings {
    pub skybox_color: Option<[f32; 4]>,
    pub camera_zoom: Option<f64>,
    pub auto_rotate: Option<bool>,
}

impl ViewerSettings {
    pub fn parse(label: &str, bytes: &[u8]) -> Result<Self, LoadError> {
        serde_json::from_slice(bytes).map_err(|err| LoadError::decode(label, err))
    }
}

/// Result of a background decode, shipped back to the rendering context.
#[derive(Debug)]
pub enum LoadedContent {
    Model(MeshBundle),
    Environment(EnvironmentData),
    /// The decode failed; the message is surfaced to the user and the
    /// previously displayed scene stays intact.
    Status(String),
}

/// Decodes a binary payload. Runs on the background executor; must not touch
/// engine state.
pub fn decode_payload(kind: PayloadKind, label: &str, bytes: &[u8]) -> LoadedContent {
    let result = match kind {
        PayloadKind::Model => {
            // A standalone scene file cannot reference external resources.
            decode_scene(label, bytes, |uri| {
                Err(LoadError::MissingResource(uri.to_owned()))
            })
            .map(LoadedContent::Model)
        }
        PayloadKind::Archive => decode_archive(bytes).map(LoadedContent::Model),
        PayloadKind::Environment => decode_hdr(label, bytes).map(LoadedContent::Environment),
        PayloadKind::Settings => {
            // Settings are parsed inline on the rendering context.
            return LoadedContent::Status(format!("unexpected settings payload `{label}`"));
        }
    };
    match result {
        Ok(content) => content,
        Err(err) => LoadedContent::Status(err.to_string()),
    }
}

fn decode_archive(bytes: &[u8]) -> Result<MeshBundle, LoadError> {
    let mut archive = StagedArchive::stage(bytes)?;
    let scene_path = archive.scene_description()?;
    let scene_bytes = archive.read_entry(&scene_path)?;
    decode_scene(&scene_path, &scene_bytes, |uri| {
        let resolved = resolve_relative(&scene_path, uri);
        archive.read_entry(&resolved)
    })
}
