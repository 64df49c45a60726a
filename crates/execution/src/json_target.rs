//! Directory-backed target: one JSON document per area.
//!
//! Layout under the root directory:
//! - `<area>.json`: the area's current configuration
//! - `<area>.health.json`: health figures written by the platform
//! - `.backups/<backup_ref>.json`: pre-deploy snapshots

use crate::adapter::{apply_change, AdapterError, HealthMetrics, TargetAdapter};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use venturi_core::BackupRef;
use venturi_storage::sanitize_key;

#[derive(Debug, Serialize, Deserialize)]
struct BackupFile {
    area: String,
    /// Original file contents; None if the area did not exist
    content: Option<String>,
    taken_at: venturi_core::Time,
}

/// Target system stored as JSON files in a directory.
pub struct JsonFileTarget {
    root: PathBuf,
}

impl JsonFileTarget {
    /// Open a target directory. It must already exist.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, AdapterError> {
        let root = root.as_ref().to_path_buf();
        if !fs::metadata(&root).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(AdapterError::Unavailable(format!(
                "target directory {} does not exist",
                root.display()
            )));
        }
        fs::create_dir_all(root.join(".backups")).await?;
        Ok(Self { root })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn area_path(&self, area: &str) -> Result<PathBuf, AdapterError> {
        check_area(area)?;
        Ok(self.root.join(format!("{}.json", area)))
    }

    fn health_path(&self, area: &str) -> Result<PathBuf, AdapterError> {
        check_area(area)?;
        Ok(self.root.join(format!("{}.health.json", area)))
    }

    fn backup_path(&self, backup: &BackupRef) -> Result<PathBuf, AdapterError> {
        if backup.as_str() != sanitize_key(backup.as_str()) || backup.as_str().starts_with('.') {
            return Err(AdapterError::UnknownBackup(backup.to_string()));
        }
        Ok(self.root.join(".backups").join(format!("{}.json", backup)))
    }

    async fn ensure_root(&self) -> Result<(), AdapterError> {
        match fs::metadata(&self.root).await {
            Ok(m) if m.is_dir() => Ok(()),
            _ => Err(AdapterError::Unavailable(format!(
                "target directory {} is gone",
                self.root.display()
            ))),
        }
    }

    async fn read_optional(path: &Path) -> Result<Option<String>, AdapterError> {
        match fs::read_to_string(path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                Err(AdapterError::Malformed(format!("{} is not UTF-8", path.display())))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AdapterError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

fn check_area(area: &str) -> Result<(), AdapterError> {
    if area.is_empty() || area.starts_with('.') || area != sanitize_key(area) {
        return Err(AdapterError::Rejected(format!("invalid area name '{}'", area)));
    }
    Ok(())
}

#[async_trait]
impl TargetAdapter for JsonFileTarget {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn backup(&self, area: &str) -> Result<BackupRef, AdapterError> {
        self.ensure_root().await?;
        let content = Self::read_optional(&self.area_path(area)?).await?;
        let backup = BackupRef::generate();
        let file = BackupFile {
            area: area.to_string(),
            content,
            taken_at: chrono::Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|e| AdapterError::Malformed(e.to_string()))?;
        Self::write_atomic(&self.backup_path(&backup)?, &bytes).await?;
        debug!("Backed up area {} as {}", area, backup);
        Ok(backup)
    }

    async fn apply(&self, area: &str, change: &Value) -> Result<(), AdapterError> {
        self.ensure_root().await?;
        let path = self.area_path(area)?;
        let mut document = match Self::read_optional(&path).await? {
            Some(s) => serde_json::from_str(&s).map_err(|e| AdapterError::Malformed(e.to_string()))?,
            None => Value::Object(Default::default()),
        };
        apply_change(&mut document, change)?;
        let bytes = serde_json::to_vec_pretty(&document).map_err(|e| AdapterError::Malformed(e.to_string()))?;
        Self::write_atomic(&path, &bytes).await
    }

    async fn verify(&self, area: &str) -> Result<(), AdapterError> {
        self.ensure_root().await?;
        let content = Self::read_optional(&self.area_path(area)?)
            .await?
            .ok_or_else(|| AdapterError::VerifyFailed(format!("area '{}' is missing", area)))?;
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(_)) => Ok(()),
            Ok(_) => Err(AdapterError::VerifyFailed(format!("area '{}' is not an object", area))),
            Err(e) => Err(AdapterError::VerifyFailed(e.to_string())),
        }
    }

    async fn restore(&self, backup: &BackupRef) -> Result<(), AdapterError> {
        self.ensure_root().await?;
        let raw = Self::read_optional(&self.backup_path(backup)?)
            .await?
            .ok_or_else(|| AdapterError::UnknownBackup(backup.to_string()))?;
        let file: BackupFile = serde_json::from_str(&raw).map_err(|e| AdapterError::Malformed(e.to_string()))?;
        let path = self.area_path(&file.area)?;
        match file.content {
            Some(content) => Self::write_atomic(&path, content.as_bytes()).await?,
            None => match fs::remove_file(&path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            },
        }
        debug!("Restored area {} from {}", file.area, backup);
        Ok(())
    }

    async fn health_check(&self, area: &str) -> Result<HealthMetrics, AdapterError> {
        self.ensure_root().await?;
        match Self::read_optional(&self.health_path(area)?).await? {
            Some(s) => serde_json::from_str(&s).map_err(|e| AdapterError::Malformed(e.to_string())),
            None => Ok(HealthMetrics::default()),
        }
    }
}
