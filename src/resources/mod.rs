use std::path::Path;

use anyhow::Context;

use crate::{
    config::AssetPaths,
    data_structures::{
        handle::Handle,
        mesh::{Mesh, MeshRef},
        texture::Texture,
    },
};

/**
 * This module contains all logic for loading meshes, textures and shader sources
 * from external files, plus the arena that owns the resulting GPU objects.
 */
pub mod mesh;
pub mod texture;

/// Owns every GPU resource created at start-up.
///
/// Entities, shader bindings and frame plans refer to resources through
/// [`Handle`]s. Dropping the arena releases each object exactly once.
#[derive(Debug, Default)]
pub struct Assets {
    meshes: Vec<Mesh>,
    textures: Vec<Texture>,
    samplers: Vec<wgpu::Sampler>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshRef {
        let index_count = mesh.index_count;
        self.meshes.push(mesh);
        MeshRef {
            handle: Handle::new(self.meshes.len() - 1),
            index_count,
        }
    }

    pub fn add_texture(&mut self, texture: Texture) -> Handle<Texture> {
        self.textures.push(texture);
        Handle::new(self.textures.len() - 1)
    }

    pub fn add_sampler(&mut self, sampler: wgpu::Sampler) -> Handle<wgpu::Sampler> {
        self.samplers.push(sampler);
        Handle::new(self.samplers.len() - 1)
    }

    pub fn mesh(&self, handle: Handle<Mesh>) -> Option<&Mesh> {
        self.meshes.get(handle.index())
    }

    pub fn texture(&self, handle: Handle<Texture>) -> Option<&Texture> {
        self.textures.get(handle.index())
    }

    pub fn sampler(&self, handle: Handle<wgpu::Sampler>) -> Option<&wgpu::Sampler> {
        self.samplers.get(handle.index())
    }
}

/// Reads `primary`, or `fallback` when the primary path cannot be read.
///
/// The error names both paths so a missing asset is easy to track down.
pub fn read_with_fallback(primary: &Path, fallback: &Path) -> anyhow::Result<Vec<u8>> {
    match std::fs::read(primary) {
        Ok(data) => Ok(data),
        Err(first) => {
            log::debug!(
                "{} unavailable ({}), trying {}",
                primary.display(),
                first,
                fallback.display()
            );
            std::fs::read(fallback).with_context(|| {
                format!(
                    "could not read {} ({}) nor its fallback {}",
                    primary.display(),
                    first,
                    fallback.display()
                )
            })
        }
    }
}

pub async fn load_binary(paths: &AssetPaths, file_name: &str) -> anyhow::Result<Vec<u8>> {
    read_with_fallback(&paths.primary(file_name), &paths.secondary(file_name))
}

pub async fn load_string(paths: &AssetPaths, file_name: &str) -> anyhow::Result<String> {
    let data = load_binary(paths, file_name).await?;
    String::from_utf8(data).with_context(|| format!("{file_name} is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use futures::executor::block_on;

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tess-demo-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn prefers_the_primary_path() {
        let dir = scratch_dir("primary");
        fs::write(dir.join("a.txt"), "primary").unwrap();
        fs::write(dir.join("b.txt"), "fallback").unwrap();

        let data = read_with_fallback(&dir.join("a.txt"), &dir.join("b.txt")).unwrap();
        assert_eq!(data, b"primary");
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn falls_back_when_the_primary_path_is_missing() {
        let root = scratch_dir("root");
        let fallback = scratch_dir("fallback");
        fs::write(fallback.join("shader.wgsl"), "fn f() {}").unwrap();

        let paths = AssetPaths::new(&root, &fallback);
        let text = block_on(load_string(&paths, "shader.wgsl")).unwrap();
        assert_eq!(text, "fn f() {}");
        fs::remove_dir_all(root).unwrap();
        fs::remove_dir_all(fallback).unwrap();
    }

    #[test]
    fn reports_both_paths_when_nothing_loads() {
        let dir = scratch_dir("missing");
        let err = read_with_fallback(&dir.join("nope.wgsl"), &dir.join("still-nope.wgsl"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("nope.wgsl"));
        assert!(err.contains("still-nope.wgsl"));
        fs::remove_dir_all(dir).unwrap();
    }
}
