//! Voxel model documents (MagicaVoxel `.vox` or JSON), their meshes, and the
//! asynchronous loader that swaps them into the asset root.

pub mod document;
pub mod loader;
pub mod mesh;
pub mod vox;

pub use loader::{LoadRequest, LoadStatus, LoadedModel, ModelLoaderPlugin};
