use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::warn;

use super::{SnapshotStore, StoreError};
use crate::models::energy::EnergySnapshot;

/// One JSON document per line, appended in tick order.
#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    path: PathBuf,
}

impl JsonLinesStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<EnergySnapshot>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut snapshots = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EnergySnapshot>(line) {
                Ok(s) => snapshots.push(s),
                // A torn write leaves a partial line behind; the rest of the history is intact.
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = idx + 1,
                    error = %e,
                    "skipping undecodable snapshot line"
                ),
            }
        }
        Ok(snapshots)
    }
}

#[async_trait]
impl SnapshotStore for JsonLinesStore {
    async fn latest(&self) -> Result<Option<EnergySnapshot>, StoreError> {
        let snapshots = self.read_all().await?;
        // max_by keeps the last of equal elements, i.e. the latest append.
        Ok(snapshots.into_iter().max_by(|a, b| a.timestamp.cmp(&b.timestamp)))
    }

    async fn since(&self, from: DateTime<Utc>) -> Result<Vec<EnergySnapshot>, StoreError> {
        let mut snapshots: Vec<_> = self
            .read_all()
            .await?
            .into_iter()
            .filter(|s| s.timestamp >= from)
            .collect();
        snapshots.sort_by_key(|s| s.timestamp);
        Ok(snapshots)
    }

    async fn append(&self, snapshot: &EnergySnapshot) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(snapshot)?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await?;
        if !ends_with_newline(&mut file).await? {
            line.insert(0, '\n');
        }
        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;
        Ok(())
    }
}

/// True for an empty file or one whose last byte is a newline.
async fn ends_with_newline(file: &mut tokio::fs::File) -> std::io::Result<bool> {
    let len = file.metadata().await?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(std::io::SeekFrom::Start(len - 1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}
