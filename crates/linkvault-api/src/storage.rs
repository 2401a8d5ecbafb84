use anyhow::{Result, bail};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// On-disk storage for uploaded file payloads.
///
/// Each payload lives in a single flat file at `{dir}/{content_id}`.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Path of the payload for a given content id.
    ///
    /// Ids are always UUIDs; anything else is rejected so a crafted id can
    /// never escape the upload directory.
    pub fn file_path(&self, content_id: &str) -> Result<PathBuf> {
        if content_id.parse::<Uuid>().is_err() {
            bail!("Refusing non-UUID content id {:?}", content_id);
        }
        Ok(self.dir.join(content_id))
    }

    pub async fn write_file(&self, content_id: &str, data: &[u8]) -> Result<()> {
        let path = self.file_path(content_id)?;
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn open(&self, content_id: &str) -> Result<fs::File> {
        let path = self.file_path(content_id)?;
        Ok(fs::File::open(&path).await?)
    }

    /// Delete a payload from disk. A file that is already gone is not an error.
    pub async fn delete_file(&self, content_id: &str) -> Result<()> {
        let path = self.file_path(content_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted payload for content {}", content_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Payload for content {} already gone", content_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, content_id: &str) -> Result<bool> {
        let path = self.file_path(content_id)?;
        Ok(fs::try_exists(&path).await?)
    }
}
