//! Source file handles.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

use crate::catalog::extension_of;

/// A file selected for conversion.
///
/// Name and size are known up front; the content is only read when a
/// conversion starts.
#[async_trait]
pub trait SourceFile: Send + Sync {
    /// File name, including extension.
    fn name(&self) -> &str;

    /// Size in bytes.
    fn size(&self) -> u64;

    /// Reads the full content.
    async fn read_bytes(&self) -> io::Result<Vec<u8>>;

    /// Lower-cased extension derived from the name.
    fn extension(&self) -> String {
        extension_of(self.name())
    }
}

/// A file whose content is already in memory.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    data: Vec<u8>,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl SourceFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        Ok(self.data.clone())
    }
}

/// A file on disk, read lazily.
#[derive(Debug, Clone)]
pub struct DiskFile {
    path: PathBuf,
    name: String,
    size: u64,
}

impl DiskFile {
    /// Opens `path`, recording its name and size.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            path,
            name,
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SourceFile for DiskFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_memory_file() {
        let file = MemoryFile::new("Episode.SRT", "1\n");
        assert_eq!(file.name(), "Episode.SRT");
        assert_eq!(file.size(), 2);
        assert_eq!(file.extension(), "srt");
        assert_eq!(file.read_bytes().await.unwrap(), b"1\n");
    }

    #[tokio::test]
    async fn test_disk_file() {
        let mut temp = tempfile::Builder::new().suffix(".vtt").tempfile().unwrap();
        write!(temp, "WEBVTT\n\n").unwrap();

        let file = DiskFile::open(temp.path()).await.unwrap();
        assert_eq!(file.size(), 8);
        assert_eq!(file.extension(), "vtt");
        assert_eq!(file.read_bytes().await.unwrap(), b"WEBVTT\n\n");
    }

    #[tokio::test]
    async fn test_disk_file_missing() {
        let err = DiskFile::open("/nonexistent/file.srt").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_disk_file_read_after_removal() {
        let temp = NamedTempFile::new().unwrap();
        let file = DiskFile::open(temp.path()).await.unwrap();
        drop(temp);
        assert!(file.read_bytes().await.is_err());
    }
}
