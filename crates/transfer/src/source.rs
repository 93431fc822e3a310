use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::TransferError;

/// A text file ready to be transferred.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    content: Arc<str>,
    size: u64,
}

impl SourceFile {
    /// Builds a source from in-memory text. The size is its UTF-8 length.
    pub fn from_text(name: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size: content.len() as u64,
            content,
        }
    }

    /// Reads a text file from disk.
    ///
    /// Invalid UTF-8 sequences are replaced; the size stays the raw size on
    /// disk so chunk planning matches what the receiver expects.
    pub async fn load(path: &Path) -> Result<Self, TransferError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| TransferError::EmptyName(path.display().to_string()))?;

        let bytes = tokio::fs::read(path).await?;
        let size = bytes.len() as u64;
        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), "file is not valid UTF-8, replacing invalid sequences");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        debug!(path = %path.display(), size, "source file loaded");
        Ok(Self {
            name,
            content: content.into(),
            size,
        })
    }

    /// File name announced to the receiver.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoded text content.
    pub fn content(&self) -> Arc<str> {
        Arc::clone(&self.content)
    }

    /// Raw size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns `true` if the file has no content.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn from_text_uses_utf8_length() {
        let src = SourceFile::from_text("a.txt", "书");
        assert_eq!(src.size(), 3);
        assert_eq!(src.name(), "a.txt");
        assert!(!src.is_empty());
    }

    #[tokio::test]
    async fn load_reads_name_and_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("novel.txt");
        std::fs::write(&path, "第一章\nhello").unwrap();

        let src = SourceFile::load(&path).await.unwrap();
        assert_eq!(src.name(), "novel.txt");
        assert_eq!(&*src.content(), "第一章\nhello");
        assert_eq!(src.size(), "第一章\nhello".len() as u64);
    }

    #[tokio::test]
    async fn load_replaces_invalid_utf8_but_keeps_raw_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.txt");
        std::fs::write(&path, [b'a', 0xff, 0xfe, b'b']).unwrap();

        let src = SourceFile::load(&path).await.unwrap();
        assert_eq!(src.size(), 4);
        assert!(src.content().starts_with('a'));
        assert!(src.content().ends_with('b'));
        assert!(src.content().contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = SourceFile::load(&dir.path().join("nope.txt")).await.unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
    }

    #[tokio::test]
    async fn load_rejects_path_without_name() {
        let err = SourceFile::load(Path::new("/")).await.unwrap_err();
        assert!(matches!(err, TransferError::EmptyName(_)));
    }
}
