//! Demo data structures: meshes, textures, transforms and entities.
//!
//! - `handle` holds typed indices into the resource arena
//! - `mesh` contains the vertex layout, validated mesh data and its GPU buffers
//! - `texture` contains the GPU texture wrapper and creation utilities
//! - `transform` holds position/rotation/scale and the derived world matrix
//! - `entity` pairs a shared mesh with its own transform

pub mod entity;
pub mod handle;
pub mod mesh;
pub mod texture;
pub mod transform;
