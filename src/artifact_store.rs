//! Artifact storage layout
//!
//! All artifact paths in the database are relative to a single configured
//! media root:
//!
//! ```text
//! {camera_id}/pictures/{event_id}_{YYYYMMDD_HHMMSS}_a.jpg
//! {camera_id}/pictures/{event_id}_{YYYYMMDD_HHMMSS}_b.jpg
//! {camera_id}/thumbs/{event_id}_{YYYYMMDD_HHMMSS}_thumb.jpg
//! {camera_id}/videos/{event_id}_{YYYYMMDD_HHMMSS}_video.h264
//! {camera_id}/videos/{event_id}_{YYYYMMDD_HHMMSS}_video.mp4
//! ```
//!
//! Cameras write the files and then report the relative path over the API;
//! this module owns path validation, resolution against the root, and the
//! existence/quiescence checks the workers rely on.

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{Error, Result};

/// Validate a camera-supplied relative path.
///
/// Absolute paths and any `..` component are rejected outright rather than
/// sanitized; a camera that sends one is misbehaving.
pub fn validate_relative_path(path: &str) -> std::result::Result<(), &'static str> {
    if path.is_empty() {
        return Err("path must not be empty");
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err("path must be relative to the media root");
    }
    let p = Path::new(path);
    if p.is_absolute() {
        return Err("path must be relative to the media root");
    }
    for component in p.components() {
        match component {
            Component::ParentDir => return Err("path must not contain '..'"),
            Component::Prefix(_) | Component::RootDir => {
                return Err("path must be relative to the media root")
            }
            _ => {}
        }
    }
    Ok(())
}

/// Derive the MP4 output path from an H.264 source path (extension swap).
pub fn mp4_path_for(h264_path: &str) -> String {
    match h264_path.strip_suffix(".h264") {
        Some(stem) => format!("{}.mp4", stem),
        None => format!("{}.mp4", h264_path),
    }
}

/// Handle on the shared footage filesystem
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    media_root: PathBuf,
}

impl ArtifactStore {
    pub fn new(media_root: PathBuf) -> Self {
        Self { media_root }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Resolve a stored relative path against the media root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        validate_relative_path(relative)
            .map_err(|reason| Error::validation("file_path", reason))?;
        Ok(self.media_root.join(relative))
    }

    /// Whether the artifact exists as a regular file.
    pub async fn exists(&self, relative: &str) -> Result<bool> {
        let full = self.resolve(relative)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// File size in bytes, or None when the artifact is missing.
    pub async fn file_size(&self, relative: &str) -> Result<Option<u64>> {
        let full = self.resolve(relative)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the artifact exists and its last modification is at least
    /// `min_age` in the past. A file younger than the quiescence window may
    /// still be mid-upload and must not be trusted.
    pub async fn is_quiescent(&self, relative: &str, min_age: Duration) -> Result<bool> {
        let full = self.resolve(relative)?;
        let meta = match tokio::fs::metadata(&full).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if !meta.is_file() {
            return Ok(false);
        }
        let modified = meta.modified()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        Ok(age >= min_age)
    }

    /// Whether the artifact can be deleted (exists and is not read-only).
    pub async fn is_writable(&self, relative: &str) -> Result<bool> {
        let full = self.resolve(relative)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(!meta.permissions().readonly()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an artifact file. Missing files are a no-op.
    pub async fn delete(&self, relative: &str) -> Result<()> {
        let full = self.resolve(relative)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_accepts_layout_paths() {
        for p in [
            "camera_1/pictures/1_20251126_143022_a.jpg",
            "camera_1/thumbs/1_20251126_143022_thumb.jpg",
            "camera_1/videos/1_20251126_143022_video.h264",
        ] {
            assert!(validate_relative_path(p).is_ok(), "{}", p);
        }
    }

    #[test]
    fn test_rejects_absolute_and_traversal() {
        assert!(validate_relative_path("/etc/passwd").is_err());
        assert!(validate_relative_path("camera_1/../../etc/passwd").is_err());
        assert!(validate_relative_path("..").is_err());
        assert!(validate_relative_path("").is_err());
    }

    #[test]
    fn test_mp4_path_extension_swap() {
        assert_eq!(
            mp4_path_for("camera_1/videos/1_20251126_143022_video.h264"),
            "camera_1/videos/1_20251126_143022_video.mp4"
        );
        assert_eq!(mp4_path_for("camera_1/videos/raw"), "camera_1/videos/raw.mp4");
    }

    #[tokio::test]
    async fn test_exists_and_quiescence() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());

        assert!(!store.exists("camera_1/videos/v.h264").await.unwrap());

        std::fs::create_dir_all(dir.path().join("camera_1/videos")).unwrap();
        let mut f = std::fs::File::create(dir.path().join("camera_1/videos/v.h264")).unwrap();
        f.write_all(b"frames").unwrap();
        drop(f);

        assert!(store.exists("camera_1/videos/v.h264").await.unwrap());
        // A file written just now is not quiescent for a long window...
        assert!(!store
            .is_quiescent("camera_1/videos/v.h264", Duration::from_secs(3600))
            .await
            .unwrap());
        // ...but passes a zero window.
        assert!(store
            .is_quiescent("camera_1/videos/v.h264", Duration::ZERO)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());
        std::fs::create_dir_all(dir.path().join("camera_1/videos")).unwrap();
        std::fs::write(dir.path().join("camera_1/videos/v.h264"), b"x").unwrap();

        store.delete("camera_1/videos/v.h264").await.unwrap();
        assert!(!store.exists("camera_1/videos/v.h264").await.unwrap());
        // Second delete is a no-op.
        store.delete("camera_1/videos/v.h264").await.unwrap();
    }

    #[tokio::test]
    async fn test_resolve_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf());
        assert!(store.resolve("../outside.jpg").is_err());
    }
}
