// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local-filesystem [`Repository`] driver.
//!
//! Image files are opaque to the hub; this driver's internal
//! representation is a sparse data file at `path` plus a JSON sidecar at
//! `path.meta.json` recording the backing pointer. Both sides of a create
//! are written under a temp name and renamed into place last, so a reader
//! never observes a data file without its sidecar or vice versa.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::{ImageStat, Repository};
use crate::error::DriverError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ImageMeta {
    backing_path: Option<String>,
    size_bytes: u64,
}

fn meta_path(path: &str) -> PathBuf {
    let mut p = PathBuf::from(path);
    let file_name = p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    p.set_file_name(format!("{file_name}.meta.json"));
    p
}

/// Local disk-backed repository, rooted at `root`.
pub struct LocalFsRepository {
    root: PathBuf,
}

impl LocalFsRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn create_image_blocking(path: &str, backing_path: Option<&str>, size_bytes: u64) -> Result<(), DriverError> {
    let path = Path::new(path);
    if !path.is_absolute() {
        return Err(DriverError::PathNotAbsolute(path.display().to_string()));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if let Some(backing) = backing_path {
        if !Path::new(backing).exists() {
            return Err(DriverError::BackingNotFound(backing.to_string()));
        }
    }

    let tmp_data = path.with_extension("img.tmp");
    {
        let file = std::fs::File::create(&tmp_data)?;
        file.set_len(size_bytes)?;
    }

    let meta = ImageMeta {
        backing_path: backing_path.map(str::to_string),
        size_bytes,
    };
    let tmp_meta = path.with_extension("meta.json.tmp");
    std::fs::write(&tmp_meta, serde_json::to_vec(&meta).map_err(io::Error::other)?)?;

    std::fs::rename(&tmp_meta, meta_path(path.to_str().unwrap_or_default()))?;
    std::fs::rename(&tmp_data, path)?;
    Ok(())
}

fn delete_image_blocking(path: &str) -> Result<(), DriverError> {
    let meta = meta_path(path);
    if meta.exists() {
        std::fs::remove_file(&meta)?;
    }
    if Path::new(path).exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

fn stat_image_blocking(path: &str) -> Result<ImageStat, DriverError> {
    let meta_raw = std::fs::read(meta_path(path))?;
    let meta: ImageMeta = serde_json::from_slice(&meta_raw).map_err(io::Error::other)?;
    Ok(ImageStat {
        size_bytes: meta.size_bytes,
        backing_path: meta.backing_path,
    })
}

fn list_blocking(root: &Path, prefix: &str) -> Result<Vec<String>, DriverError> {
    let mut out = Vec::new();
    if !root.exists() {
        return Ok(out);
    }
    for entry in walk(root)? {
        let path_str = entry.display().to_string();
        if path_str.starts_with(prefix) && path_str.ends_with(".img") {
            out.push(path_str);
        }
    }
    Ok(out)
}

fn walk(dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            out.extend(walk(&path)?);
        } else {
            out.push(path);
        }
    }
    Ok(out)
}

#[async_trait]
impl Repository for LocalFsRepository {
    async fn create_image(&self, path: &str, backing_path: Option<&str>, size_bytes: u64) -> Result<(), DriverError> {
        let path = path.to_string();
        let backing_path = backing_path.map(str::to_string);
        tokio::task::spawn_blocking(move || create_image_blocking(&path, backing_path.as_deref(), size_bytes))
            .await
            .map_err(|e| DriverError::Io(io::Error::other(e)))?
    }

    async fn delete_image(&self, path: &str) -> Result<(), DriverError> {
        let path = path.to_string();
        tokio::task::spawn_blocking(move || delete_image_blocking(&path))
            .await
            .map_err(|e| DriverError::Io(io::Error::other(e)))?
    }

    async fn stat_image(&self, path: &str) -> Result<ImageStat, DriverError> {
        let path = path.to_string();
        tokio::task::spawn_blocking(move || stat_image_blocking(&path))
            .await
            .map_err(|e| DriverError::Io(io::Error::other(e)))?
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, DriverError> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || list_blocking(&root, &prefix))
            .await
            .map_err(|e| DriverError::Io(io::Error::other(e)))?
    }

    async fn test_writable(&self) -> Result<(), DriverError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&root)?;
            let probe = root.join(".write-probe");
            std::fs::write(&probe, b"ok")?;
            std::fs::remove_file(&probe)?;
            Ok::<(), io::Error>(())
        })
        .await
        .map_err(|e| DriverError::Io(io::Error::other(e)))??;
        Ok(())
    }

    async fn free_bytes(&self) -> Result<u64, DriverError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&root)?;
            fs2::available_space(&root)
        })
        .await
        .map_err(|e| DriverError::Io(io::Error::other(e)))?
        .map_err(DriverError::Io)
    }
}

#[cfg(test)]
#[path = "local_fs_tests.rs"]
mod tests;
