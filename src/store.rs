//! Local JSON artifact store
//!
//! One file per video per stage, named after the video's base name. Writes go
//! through a temporary file and a rename so a crashed run never leaves a
//! half-written record behind for the skip-if-exists check to trust.

use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const RECORD_EXTENSION: &str = "json";
pub const KEYFRAME_EXTENSION: &str = "jpg";

/// `ad1.mp4` -> `ad1.json`
pub fn record_file_name(video_name: &str) -> String {
    with_extension(video_name, RECORD_EXTENSION)
}

/// `ad1.mp4` -> `ad1.jpg`
pub fn keyframe_file_name(video_name: &str) -> String {
    with_extension(video_name, KEYFRAME_EXTENSION)
}

fn with_extension(name: &str, extension: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    format!("{}.{}", stem, extension)
}

pub fn has_extension(path: impl AsRef<Path>, extension: &str) -> bool {
    path.as_ref()
        .extension()
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Serialize with 2-space indentation and write atomically.
pub async fn write_record<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut body = serde_json::to_string_pretty(record)?;
    body.push('\n');

    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;

    debug!("Wrote {}", path.display());
    Ok(())
}

pub async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

pub async fn exists(path: &Path) -> Result<bool> {
    Ok(tokio::fs::try_exists(path).await?)
}

/// File names in `dir`, sorted. A missing directory lists as empty.
pub async fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[test]
    fn test_derived_file_names() {
        assert_eq!(record_file_name("ad1.mp4"), "ad1.json");
        assert_eq!(keyframe_file_name("ad1.mp4"), "ad1.jpg");
        assert_eq!(record_file_name("spring.sale.mp4"), "spring.sale.json");
        assert!(has_extension("videos/ad1.MP4", "mp4"));
        assert!(!has_extension("videos/ad1.mov", "mp4"));
    }

    #[tokio::test]
    async fn test_write_uses_two_space_indent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ad1.json");

        write_record(&path, &json!({"videoName": "ad1.mp4"})).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"videoName\": \"ad1.mp4\""));
        assert!(!tmp_path(&path).exists());

        let back: Value = read_record(&path).await.unwrap();
        assert_eq!(back["videoName"], "ad1.mp4");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = read_record::<Value>(&dir.path().join("x.json")).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_sorted_and_missing_dir_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        assert_eq!(list_file_names(dir.path()).await.unwrap(), vec!["a.json", "b.json"]);
        assert!(list_file_names(&dir.path().join("nope")).await.unwrap().is_empty());
    }
}
