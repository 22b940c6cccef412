use std::path::PathBuf;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::spider::SpiderKind;

/// Optional on-disk mirror of cache entries, for operators who want page
/// bodies to survive a process restart without a cold-cache stampede.
/// Writes are best-effort: a failure here never fails the request that
/// triggered it.
pub struct DiskPersistence {
    root: PathBuf,
}

impl DiskPersistence {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, spider_kind: SpiderKind, domain: &str, path: &str) -> PathBuf {
        let hash = blake3::hash(path.as_bytes()).to_hex();
        self.root
            .join(spider_kind.as_str())
            .join(domain)
            .join(&hash[..16])
    }

    pub async fn write(&self, spider_kind: SpiderKind, domain: &str, path: &str, body: &[u8]) {
        let target = self.path_for(spider_kind, domain, path);
        if let Some(parent) = target.parent() {
            if let Err(err) = fs::create_dir_all(parent).await {
                warn!(error = %err, "failed to create cache persistence directory");
                return;
            }
        }
        match fs::File::create(&target).await {
            Ok(mut file) => {
                if let Err(err) = file.write_all(body).await {
                    warn!(error = %err, "failed to persist cache entry to disk");
                }
            }
            Err(err) => warn!(error = %err, "failed to open cache persistence file"),
        }
    }

    pub async fn read(&self, spider_kind: SpiderKind, domain: &str, path: &str) -> Option<Vec<u8>> {
        let target = self.path_for(spider_kind, domain, path);
        fs::read(&target).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("pagefabric-test-{}", blake3::hash(b"seed").to_hex()));
        let persistence = DiskPersistence::new(dir.clone());
        persistence
            .write(SpiderKind::Google, "example.com", "/a", b"hello")
            .await;
        let read = persistence
            .read(SpiderKind::Google, "example.com", "/a")
            .await;
        assert_eq!(read.as_deref(), Some(&b"hello"[..]));
        let _ = fs::remove_dir_all(dir).await;
    }
}
