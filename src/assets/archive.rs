//! Archive payload handling.
//!
//! Remote archive payloads are unbounded in size, so their bytes are staged
//! to an ephemeral file before extraction instead of being held in memory
//! next to their decompressed contents. Entries are then read on demand.

use std::{
    fs,
    io::{Read, Seek, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use zip::ZipArchive;

use crate::assets::LoadError;

/// An archive staged to ephemeral storage. The staging file is removed when
/// the archive is dropped.
pub struct StagedArchive {
    path: PathBuf,
    archive: ZipArchive<fs::File>,
}

impl StagedArchive {
    /// Writes `bytes` to a fresh temp file and opens it as an archive. The
    /// staging file is removed on any failure.
    pub fn stage(bytes: &[u8]) -> Result<Self, LoadError> {
        let path = ephemeral_path();
        match open_staged(&path, bytes) {
            Ok(archive) => Ok(Self { path, archive }),
            Err(err) => {
                let _ = fs::remove_file(&path);
                Err(err)
            }
        }
    }

    /// Finds the scene-description entry: the first entry ending in `.gltf`
    /// or `.glb` (either case), wherever it sits in the archive's directory
    /// tree.
    pub fn scene_description(&self) -> Result<String, LoadError> {
        self.archive
            .file_names()
            .find(|name| is_scene_description(name))
            .map(str::to_owned)
            .ok_or(LoadError::MissingSceneDescription)
    }

    /// Reads one entry fully. Missing entries are a recoverable
    /// [`LoadError::MissingResource`].
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, LoadError> {
        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|_| LoadError::MissingResource(name.to_owned()))?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Cheap central-directory scan of an in-memory archive payload, used to
/// reject archives with nothing to show before the current scene is torn
/// down. Reads no entry contents.
pub fn scan_for_scene_description(bytes: &[u8]) -> Result<(), LoadError> {
    let archive = ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|err| LoadError::decode("archive", err))?;
    if archive.file_names().any(is_scene_description) {
        Ok(())
    } else {
        Err(LoadError::MissingSceneDescription)
    }
}

/// Extension match for scene-description entries, case-insensitive like the
/// payload classification in [`crate::remote::classify`].
fn is_scene_description(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".gltf") || lower.ends_with(".glb")
}

fn open_staged(path: &Path, bytes: &[u8]) -> Result<ZipArchive<fs::File>, LoadError> {
    let mut staging = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    staging.write_all(bytes)?;
    staging.rewind()?;
    ZipArchive::new(staging).map_err(|err| LoadError::decode("archive", err))
}

impl Drop for StagedArchive {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn ephemeral_path() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("glowplug-{}-{}.zip", std::process::id(), unique))
}

/// Resolves `uri` relative to the directory of `scene_path` inside an
/// archive. The scene description may sit at the archive root or in a
/// subdirectory; references to sibling resources must resolve the same way
/// in both cases.
pub fn resolve_relative(scene_path: &str, uri: &str) -> String {
    let base = match scene_path.rfind('/') {
        Some(idx) => &scene_path[..idx],
        None => "",
    };
    let mut segments: Vec<&str> = if base.is_empty() {
        Vec::new()
    } else {
        base.split('/').collect()
    };
    for segment in uri.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
