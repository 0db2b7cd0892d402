use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use uuid::Uuid;

use crate::entities::image::EntityType;
use crate::utils::image_processor::ProcessedImage;
use crate::utils::ImageError;

pub const THUMBNAIL_PREFIX: &str = "thumb_";
const TEMP_DIR: &str = "temp";

/// Paths and final sizes of the two files written for one upload.
#[derive(Debug, Clone)]
pub struct StoredFiles {
    pub main_path: PathBuf,
    pub thumbnail_path: PathBuf,
    pub main_size: u64,
    pub thumbnail_size: u64,
}

/// A stored file resolved for serving.
#[derive(Debug)]
pub struct ServedFile {
    pub path: PathBuf,
    pub etag: String,
}

/// Local filesystem storage laid out as `{root}/{entity_type}/{filename}`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entity_dir(&self, entity_type: EntityType) -> PathBuf {
        self.root.join(entity_type.as_str())
    }

    /// Creates one directory per entity type plus the temp directory.
    pub async fn ensure_directories(&self) -> std::io::Result<()> {
        for entity_type in EntityType::ALL {
            tokio::fs::create_dir_all(self.entity_dir(entity_type)).await?;
        }
        tokio::fs::create_dir_all(self.root.join(TEMP_DIR)).await
    }

    /// `{random token}_{first 16 hex chars of sha256(content)}{.ext}`, extension lowercased.
    pub fn generate_filename(data: &[u8], original_filename: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let digest = format!("{:x}", hasher.finalize());

        let extension = Path::new(original_filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext.to_lowercase()))
            .unwrap_or_default();

        format!("{}_{}{}", Uuid::new_v4().simple(), &digest[..16], extension)
    }

    /// Writes the main image and its thumbnail. Nothing is left behind on failure.
    pub async fn save(
        &self,
        entity_type: EntityType,
        filename: &str,
        processed: &ProcessedImage,
    ) -> Result<StoredFiles, ImageError> {
        let dir = self.entity_dir(entity_type);
        let main_path = dir.join(filename);
        let thumbnail_path = dir.join(format!("{}{}", THUMBNAIL_PREFIX, filename));

        let mut written = Vec::with_capacity(2);
        let result = async {
            tokio::fs::write(&main_path, &processed.main).await?;
            written.push(main_path.clone());
            tokio::fs::write(&thumbnail_path, &processed.thumbnail).await?;
            written.push(thumbnail_path.clone());

            let main_size = tokio::fs::metadata(&main_path).await?.len();
            let thumbnail_size = tokio::fs::metadata(&thumbnail_path).await?.len();
            Ok::<_, std::io::Error>((main_size, thumbnail_size))
        }
        .await;

        match result {
            Ok((main_size, thumbnail_size)) => Ok(StoredFiles {
                main_path,
                thumbnail_path,
                main_size,
                thumbnail_size,
            }),
            Err(e) => {
                remove_all(&written).await;
                Err(ImageError::Io(e))
            }
        }
    }

    /// Rolls back a successful [`save`](Self::save) whose metadata could not be recorded.
    pub async fn discard(&self, files: &StoredFiles) {
        remove_all(&[files.main_path.clone(), files.thumbnail_path.clone()]).await;
    }

    /// Best-effort background removal; failures are logged and never retried.
    pub fn schedule_removal(&self, paths: Vec<PathBuf>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            for path in paths {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => tracing::info!(path = %path.display(), "Removed image file"),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to remove image file")
                    }
                }
            }
        })
    }

    /// Locates a stored file for serving. Unknown entity types, unsafe names and missing
    /// files all resolve to `None`.
    pub async fn resolve(&self, entity_type: &str, filename: &str) -> Option<ServedFile> {
        let entity_type = EntityType::parse(entity_type)?;
        if !is_safe_filename(filename) {
            return None;
        }

        let path = self.entity_dir(entity_type).join(filename);
        let metadata = tokio::fs::metadata(&path).await.ok()?;
        if !metadata.is_file() {
            return None;
        }

        let etag = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map(|since| format!("\"{}.{:09}\"", since.as_secs(), since.subsec_nanos()))
            .unwrap_or_else(|| format!("\"{}\"", metadata.len()));

        Some(ServedFile { path, etag })
    }
}

fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.starts_with('.')
        && !filename.contains(['/', '\\'])
        && !filename.contains("..")
}

async fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "Rollback could not remove file");
        }
    }
}
