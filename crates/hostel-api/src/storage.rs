use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// URL prefix under which stored images are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// On-disk storage for complaint photos.
///
/// Each image is a flat file at `{dir}/{uuid}.{ext}`; the name is generated
/// here, never taken from the client.
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Image storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes and syncs one image. Returns its public path.
    pub async fn save(&self, original_name: Option<&str>, data: &[u8]) -> Result<String> {
        let file_name = match original_name.and_then(extension) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        let path = self.dir.join(&file_name);
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;

        Ok(format!("{PUBLIC_PREFIX}/{file_name}"))
    }

    /// Best-effort removal of images written for a complaint that was never
    /// committed.
    pub async fn discard(&self, public_paths: &[String]) {
        for public in public_paths {
            let Some(name) = public
                .strip_prefix(PUBLIC_PREFIX)
                .and_then(|rest| rest.strip_prefix('/'))
            else {
                continue;
            };
            match fs::remove_file(self.dir.join(name)).await {
                Ok(()) => info!("Discarded orphaned image {}", name),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to discard image {}: {}", name, e),
            }
        }
    }
}

/// Lower-cased alphanumeric extension of an uploaded file name, at most 8
/// characters. Anything else is dropped.
fn extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
