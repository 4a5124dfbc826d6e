//! tess-demo
//!
//! A small real-time demo rendering a height-displaced, tessellated sphere
//! inside a skybox on wgpu. Each frame is recorded as an explicit
//! [`render::FramePlan`], validated and then executed as one render pass.
//!
//! High-level modules
//! - `camera`: left-handed camera and its keyboard/mouse controller
//! - `config`: demo configuration, asset paths and logger setup
//! - `context`: window surface, device and queue
//! - `controls`: runtime keys for fill mode, tessellation and displacement
//! - `data_structures`: meshes, textures, transforms and entities
//! - `flow`: scene loading, the update/draw loop and the winit application
//! - `frame`: records the per-frame draw sequence
//! - `input`: keyboard and mouse state
//! - `pipelines`: fixed-function state and the GPU executor
//! - `render`: frame plans, draw snapshots and their validation
//! - `resources`: resource arena and file loaders
//! - `shader`: per-stage shader programs with reflected parameters
//! - `time`: frame statistics

pub mod camera;
pub mod config;
pub mod context;
pub mod controls;
pub mod data_structures;
pub mod flow;
pub mod frame;
pub mod input;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod shader;
pub mod time;

pub use config::DemoConfig;
pub use flow::run;
