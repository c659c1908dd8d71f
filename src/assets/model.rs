//! glTF scene-description decoding.
//!
//! Produces an engine-agnostic [`MeshBundle`]: interleaved vertex bytes,
//! index bytes and an optional decoded base-color texture. Decoding always
//! runs off the rendering context; only the finished bundle crosses back to
//! be installed into engine buffers.

use bytemuck::{Pod, Zeroable};

use crate::assets::LoadError;

/// Interleaved vertex layout for decoded model meshes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// Decoded RGBA8 texture data.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// A fully decoded model, ready to be turned into engine resources in one
/// uninterrupted step on the rendering context.
#[derive(Clone, Debug)]
pub struct MeshBundle {
    pub label: String,
    pub vertex_data: Vec<u8>,
    pub vertex_count: u32,
    pub index_data: Vec<u8>,
    pub index_count: u32,
    pub base_color: Option<TextureImage>,
}

/// Decodes a glTF or GLB scene description.
///
/// `read_resource` supplies the bytes of any externally referenced buffer or
/// image, keyed by the URI exactly as it appears in the file; the caller is
/// responsible for resolving those URIs against the scene description's own
/// location (see [`crate::assets::archive::resolve_relative`]).
pub fn decode_scene(
    label: &str,
    bytes: &[u8],
    mut read_resource: impl FnMut(&str) -> Result<Vec<u8>, LoadError>,
) -> Result<MeshBundle, LoadError> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|err| LoadError::decode(label, err))?;

    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .ok_or_else(|| LoadError::decode(label, "GLB is missing its binary chunk"))?;
                buffer_data.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => buffer_data.push(read_resource(uri)?),
        }
    }

    let mesh = gltf
        .meshes()
        .next()
        .ok_or_else(|| LoadError::decode(label, "scene description contains no meshes"))?;
    let primitive = mesh
        .primitives()
        .next()
        .ok_or_else(|| LoadError::decode(label, "mesh contains no primitives"))?;

    let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or_else(|| LoadError::decode(label, "primitive has no positions"))?
        .collect();
    let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
        Some(coords) => coords.into_f32().collect(),
        None => vec![[0.0, 0.0]; positions.len()],
    };
    let vertices: Vec<ModelVertex> = positions
        .iter()
        .zip(uvs.iter())
        .map(|(&position, &uv)| ModelVertex { position, uv })
        .collect();
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    let base_color = decode_base_color(label, &primitive, &buffer_data, &mut read_resource)?;

    Ok(MeshBundle {
        label: label.to_owned(),
        vertex_data: bytemuck::cast_slice(&vertices).to_vec(),
        vertex_count: vertices.len() as u32,
        index_data: bytemuck::cast_slice(&indices).to_vec(),
        index_count: indices.len() as u32,
        base_color,
    })
}

fn decode_base_color(
    label: &str,
    primitive: &gltf::Primitive<'_>,
    buffer_data: &[Vec<u8>],
    read_resource: &mut impl FnMut(&str) -> Result<Vec<u8>, LoadError>,
) -> Result<Option<TextureImage>, LoadError> {
    let Some(info) = primitive
        .material()
        .pbr_metallic_roughness()
        .base_color_texture()
    else {
        return Ok(None);
    };

    let encoded = match info.texture().source().source() {
        gltf::image::Source::View { view, .. } => {
            let buffer = buffer_data
                .get(view.buffer().index())
                .ok_or_else(|| LoadError::decode(label, "texture view references a missing buffer"))?;
            // The declared view bounds may exceed the bytes actually supplied
            // for the buffer (truncated archive entry or payload).
            buffer
                .get(view.offset()..view.offset().saturating_add(view.length()))
                .ok_or_else(|| LoadError::decode(label, "texture view is out of bounds"))?
                .to_vec()
        }
        gltf::image::Source::Uri { uri, .. } => read_resource(uri)?,
    };

    let image = image::load_from_memory(&encoded)
        .map_err(|err| LoadError::decode(label, err))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(Some(TextureImage {
        width,
        height,
        pixels: image.into_raw(),
    }))
}
