//! JSON file storage implementation.
//!
//! Stores each value as a file under `<root>/<bucket>/<key>.json` and keeps
//! small per-object meta markers (version + updated_at) under
//! `<root>/meta/<bucket>/`.

use std::path::{Path, PathBuf};
use super::trait_::check_key;
use super::{Bucket, Result, Storage};
use tokio::fs;
use tracing::debug;

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    /// Create storage, creating the bucket and meta directories as needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        for bucket in Bucket::ALL {
            fs::create_dir_all(root.join(bucket.as_str())).await?;
            fs::create_dir_all(root.join("meta").join(bucket.as_str())).await?;
        }

        Ok(Self { root })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn value_path(&self, bucket: Bucket, key: &str) -> PathBuf {
        self.root.join(bucket.as_str()).join(format!("{}.json", key))
    }

    fn meta_path(&self, bucket: Bucket, key: &str) -> PathBuf {
        self.root.join("meta").join(bucket.as_str()).join(format!("{}.meta.json", key))
    }

    /// Read and increment per-object version, return new version.
    async fn bump_version(&self, bucket: Bucket, key: &str) -> Result<u64> {
        let path = self.meta_path(bucket, key);
        let mut version = 0u64;
        if let Ok(s) = fs::read_to_string(&path).await {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&s) {
                if let Some(v) = json.get("version").and_then(|v| v.as_u64()) {
                    version = v;
                }
            }
        }
        version += 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    /// Current version marker of an object (0 if never written).
    pub async fn version(&self, bucket: Bucket, key: &str) -> Result<u64> {
        match fs::read_to_string(self.meta_path(bucket, key)).await {
            Ok(s) => {
                let json: serde_json::Value = serde_json::from_str(&s)?;
                Ok(json.get("version").and_then(|v| v.as_u64()).unwrap_or(0))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save(&self, bucket: Bucket, key: &str, value: &[u8]) -> Result<()> {
        check_key(key)?;
        let path = self.value_path(bucket, key);

        // Write to a sibling temp file first so readers never see a torn value
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;

        let version = self.bump_version(bucket, key).await?;
        debug!("Saved {}/{} (v{})", bucket.as_str(), key, version);
        Ok(())
    }

    async fn load(&self, bucket: Bucket, key: &str) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        match fs::read(self.value_path(bucket, key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, bucket: Bucket) -> Result<Vec<(String, Vec<u8>)>> {
        let mut items = Vec::new();
        let mut rd = fs::read_dir(self.root.join(bucket.as_str())).await?;
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            match fs::read(&path).await {
                Ok(bytes) => items.push((key, bytes)),
                // Deleted between read_dir and read
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(items)
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<()> {
        check_key(key)?;
        for path in [self.value_path(bucket, key), self.meta_path(bucket, key)] {
            fs::remove_file(path).await.or_else(|e| {
                if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
            })?;
        }
        Ok(())
    }
}
