//! Voxel document: a shared palette and a list of chunks, each chunk
//! becoming one selectable part. Read from MagicaVoxel `.vox` files or from
//! the equivalent JSON.

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::vox;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} is not a voxel document: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{name} is not a MagicaVoxel file: {message}")]
    Vox { name: String, message: &'static str },
    #[error("chunk {chunk} has a zero-sized dimension")]
    EmptyChunk { chunk: usize },
    #[error("chunk {chunk}: size {size:?} exceeds {MAX_CHUNK_SIZE} voxels per axis")]
    TooLarge { chunk: usize, size: [u32; 3] },
    #[error("chunk {chunk}: voxel {voxel:?} lies outside its size {size:?}")]
    OutOfBounds {
        chunk: usize,
        voxel: [u32; 3],
        size: [u32; 3],
    },
    #[error("chunk {chunk}: color index {index} but the palette has {len} entries")]
    BadColor { chunk: usize, index: u32, len: usize },
    #[error("file dialog closed without a choice")]
    Cancelled,
}

/// Every `.vox` file starts with this.
const VOX_MAGIC: &[u8] = b"VOX ";

/// Largest chunk extent per axis; voxel coordinates and their neighbours
/// must fit in an `i32`.
pub const MAX_CHUNK_SIZE: u32 = i32::MAX as u32;

#[derive(Clone, Debug, Deserialize)]
pub struct VoxelModel {
    /// sRGBA, one entry per color index.
    pub palette: Vec<[u8; 4]>,
    pub chunks: Vec<VoxelChunk>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VoxelChunk {
    #[serde(default)]
    pub name: Option<String>,
    /// Minimum corner of the chunk in model space.
    #[serde(default)]
    pub origin: [f32; 3],
    pub size: [u32; 3],
    /// `[x, y, z, color_index]`, relative to `origin`.
    pub voxels: Vec<[u32; 4]>,
    /// Render without lighting (no emissive channel).
    #[serde(default)]
    pub unlit: bool,
}

impl VoxelModel {
    /// Pick the decoder from the leading bytes: `.vox` or JSON.
    pub fn decode(bytes: &[u8], name: &str) -> Result<Self, LoadError> {
        if bytes.starts_with(VOX_MAGIC) {
            Self::from_vox(bytes, name)
        } else {
            Self::from_json(bytes, name)
        }
    }

    pub fn from_vox(bytes: &[u8], name: &str) -> Result<Self, LoadError> {
        let data = dot_vox::load_bytes(bytes).map_err(|message| LoadError::Vox {
            name: name.to_string(),
            message,
        })?;
        let model = vox::to_model(&data);
        model.validate()?;
        Ok(model)
    }

    /// Parse and validate a document; `name` is only used in error messages.
    pub fn from_json(bytes: &[u8], name: &str) -> Result<Self, LoadError> {
        let model: VoxelModel =
            serde_json::from_slice(bytes).map_err(|source| LoadError::Parse {
                name: name.to_string(),
                source,
            })?;
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        for (i, chunk) in self.chunks.iter().enumerate() {
            let size = chunk.size;
            if size.contains(&0) {
                return Err(LoadError::EmptyChunk { chunk: i });
            }
            if size.iter().any(|&s| s > MAX_CHUNK_SIZE) {
                return Err(LoadError::TooLarge { chunk: i, size });
            }
            for &[x, y, z, c] in &chunk.voxels {
                if x >= size[0] || y >= size[1] || z >= size[2] {
                    return Err(LoadError::OutOfBounds {
                        chunk: i,
                        voxel: [x, y, z],
                        size,
                    });
                }
                if c as usize >= self.palette.len() {
                    return Err(LoadError::BadColor {
                        chunk: i,
                        index: c,
                        len: self.palette.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl VoxelChunk {
    pub fn part_name(&self, index: usize) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("part_{index}"),
        }
    }
}
