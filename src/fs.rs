//! File system collaborator.
//!
//! Servers read live documents and static assets through [`FileSystem`].
//! Paths are project paths: `/`-separated and rooted at the project
//! directory (`/index.html`, `/css/main.css`).

// ============================================================================
// Imports
// ============================================================================

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// FileSystem
// ============================================================================

/// Async read/write access to project files.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Reads a file as UTF-8 text.
    async fn read_file(&self, path: &str) -> Result<String>;

    /// Writes a file, replacing its contents.
    async fn write_file(&self, path: &str, contents: &str) -> Result<()>;

    /// Returns `true` if the file exists.
    async fn exists(&self, path: &str) -> bool;
}

// ============================================================================
// LocalFileSystem
// ============================================================================

/// [`FileSystem`] over a directory on disk.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    /// Serves project paths from `root`.
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a project path onto disk, refusing paths that climb out of the
    /// root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let normalized = normalize_path(path);
        let relative = normalized.trim_start_matches('/');

        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                _ => return Err(Error::path_not_served(path)),
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read_file(&self, path: &str) -> Result<String> {
        let disk_path = self.resolve(path)?;
        trace!(path, disk_path = %disk_path.display(), "Reading file");
        Ok(tokio::fs::read_to_string(disk_path).await?)
    }

    async fn write_file(&self, path: &str, contents: &str) -> Result<()> {
        let disk_path = self.resolve(path)?;
        if let Some(parent) = disk_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        trace!(path, len = contents.len(), "Writing file");
        Ok(tokio::fs::write(disk_path, contents).await?)
    }

    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(disk_path) => tokio::fs::try_exists(disk_path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

// ============================================================================
// MemoryFileSystem
// ============================================================================

/// [`FileSystem`] held in memory, for embedders without a disk.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<FxHashMap<String, String>>,
}

impl MemoryFileSystem {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, builder style.
    #[must_use]
    pub fn with_file(self, path: &str, contents: &str) -> Self {
        self.files
            .lock()
            .insert(normalize_path(path), contents.to_string());
        self
    }

    /// Removes a file. Returns `true` if it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.files.lock().remove(&normalize_path(path)).is_some()
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn read_file(&self, path: &str) -> Result<String> {
        self.files
            .lock()
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{path}: no such file"),
                ))
            })
    }

    async fn write_file(&self, path: &str, contents: &str) -> Result<()> {
        self.files
            .lock()
            .insert(normalize_path(path), contents.to_string());
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        self.files.lock().contains_key(&normalize_path(path))
    }
}

// ============================================================================
// Path Helpers
// ============================================================================

/// Normalizes a project path: leading `/`, no `.` or empty segments, `..`
/// resolved (never above the root).
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Returns the directory part of a project path.
#[must_use]
pub fn dirname(path: &str) -> String {
    let normalized = normalize_path(path);
    match normalized.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => normalized[..index].to_string(),
    }
}

/// Resolves `relative` against directory `dir`. Absolute paths win.
#[must_use]
pub fn join_path(dir: &str, relative: &str) -> String {
    if relative.starts_with('/') {
        normalize_path(relative)
    } else {
        normalize_path(&format!("{dir}/{relative}"))
    }
}

// ============================================================================
// Tests
// ============================================================================
