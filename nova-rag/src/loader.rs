//! Loading documents from the filesystem.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{RagError, Result};

/// Extensions accepted by [`TextFileLoader::new`].
pub const DEFAULT_EXTENSIONS: &[&str] = &[".txt", ".md", ".csv", ".json", ".html", ".xml"];

/// Turns a path into documents ready for ingestion.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load the file or directory at `path`.
    async fn load(&self, path: &Path) -> Result<Vec<Document>>;
}

/// Loads UTF-8 text files, one document per file.
///
/// Each document gets a generated id, the file name as title, and the
/// metadata keys `source`, `filename`, `file_extension`, `file_size` and
/// `modified_time` (milliseconds since the Unix epoch).
///
/// Directories are walked recursively in name order. Files with other
/// extensions are ignored and unreadable files are skipped with a warning.
#[derive(Debug, Clone)]
pub struct TextFileLoader {
    extensions: Vec<String>,
}

impl Default for TextFileLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TextFileLoader {
    pub fn new() -> Self {
        Self::with_extensions(DEFAULT_EXTENSIONS.iter().copied())
    }

    /// Accept only the given extensions, written with or without the dot.
    /// Matching is case-insensitive.
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| {
                let ext = ext.as_ref().trim_start_matches('.').to_lowercase();
                format!(".{ext}")
            })
            .collect();
        Self { extensions }
    }

    /// Whether `path` has an accepted extension.
    pub fn supports(&self, path: &Path) -> bool {
        let ext = file_extension(path).to_lowercase();
        !ext.is_empty() && self.extensions.contains(&ext)
    }

    async fn load_file(&self, path: &Path) -> Result<Document> {
        if !self.supports(path) {
            return Err(load_error(path, "unsupported file type"));
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| load_error(path, e))?;
        let metadata = tokio::fs::metadata(path).await.map_err(|e| load_error(path, e))?;
        let modified_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_millis() as i64);
        let filename =
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

        Ok(Document::with_generated_id(content)
            .with_title(filename.clone())
            .with_metadata("source", path.display().to_string())
            .with_metadata("filename", filename)
            .with_metadata("file_extension", file_extension(path))
            .with_metadata("file_size", metadata.len() as i64)
            .with_metadata("modified_time", modified_ms))
    }

    /// Supported files under `root`, depth first in file-name order.
    fn discover_files(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(path = %root.display(), error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| self.supports(path))
            .collect()
    }

    async fn load_directory(&self, root: &Path) -> Result<Vec<Document>> {
        let walker = self.clone();
        let walk_root = root.to_path_buf();
        let files = tokio::task::spawn_blocking(move || walker.discover_files(&walk_root))
            .await
            .map_err(|e| load_error(root, e))?;

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            match self.load_file(&path).await {
                Ok(document) => documents.push(document),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping file"),
            }
        }

        debug!(path = %root.display(), count = documents.len(), "loaded directory");
        Ok(documents)
    }
}

fn load_error(path: &Path, message: impl std::fmt::Display) -> RagError {
    RagError::DocumentLoadError { path: path.display().to_string(), message: message.to_string() }
}

/// The extension of `path` including its leading dot, or `""`.
fn file_extension(path: &Path) -> String {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    match name.rfind('.') {
        Some(dot) if dot > 0 => name[dot..].to_string(),
        _ => String::new(),
    }
}

#[async_trait]
impl DocumentLoader for TextFileLoader {
    async fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| load_error(path, e))?;

        if metadata.is_dir() {
            self.load_directory(path).await
        } else {
            Ok(vec![self.load_file(path).await?])
        }
    }
}
