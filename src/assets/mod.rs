//! Loading of external content: bundled assets, archives, glTF meshes and
//! HDR environments.
//!
//! Actual I/O and decoding are the only fallible, potentially slow parts of
//! the crate. Every failure here is recoverable: the caller reports a status
//! message and keeps the previously displayed scene. Nothing in this module
//! touches engine handles.

pub mod archive;
pub mod environment;
pub mod model;

use thiserror::Error;

/// Produces raw byte buffers for bundled content, keyed by relative path
/// (material packages, default model scene files and their referenced
/// resources).
pub trait AssetSource {
    fn load(&self, path: &str) -> anyhow::Result<Vec<u8>>;
}

/// Why a content load was aborted. Always recovered locally and surfaced as a
/// user-visible status message; never terminates the view.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The archive holds no scene-description file at all.
    #[error("Could not find .gltf or .glb in the zip")]
    MissingSceneDescription,

    /// A resource referenced by the scene description is absent.
    #[error("`{0}` is missing from the archive")]
    MissingResource(String),

    #[error("could not decode `{label}`: {reason}")]
    Decode { label: String, reason: String },

    /// The payload label carries no recognized file-extension suffix.
    #[error("unrecognized payload `{0}`")]
    UnrecognizedPayload(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub(crate) fn decode(label: &str, reason: impl ToString) -> Self {
        Self::Decode {
            label: label.to_owned(),
            reason: reason.to_string(),
        }
    }
}
