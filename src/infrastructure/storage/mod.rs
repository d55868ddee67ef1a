//! Storage quota enforcement over persisted conversion artifacts.
//!
//! Usage is recomputed from the filesystem on every call rather than cached,
//! so external tampering with the data directories self-heals on the next
//! submission.

use crate::domain::conversion::Conversion;
use crate::error::AppResult;
use crate::infrastructure::repositories::ConversionRepository;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct StorageQuota {
    audio_dir: PathBuf,
    sources_dir: PathBuf,
    max_bytes: u64,
    conversion_repo: Arc<ConversionRepository>,
}

impl StorageQuota {
    pub fn new(
        data_dir: &Path,
        max_bytes: u64,
        conversion_repo: Arc<ConversionRepository>,
    ) -> Self {
        Self {
            audio_dir: data_dir.join("audio"),
            sources_dir: data_dir.join("sources"),
            max_bytes,
            conversion_repo,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Total bytes across both managed directories, computed at call time
    pub fn usage_bytes(&self) -> u64 {
        let mut total = 0;
        for dir in [&self.audio_dir, &self.sources_dir] {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    if metadata.is_file() {
                        total += metadata.len();
                    }
                }
            }
        }
        total
    }

    pub fn usage_gb(&self) -> f64 {
        self.usage_bytes() as f64 / (1u64 << 30) as f64
    }

    pub fn max_gb(&self) -> f64 {
        self.max_bytes as f64 / (1u64 << 30) as f64
    }

    /// Evict oldest conversions until `usage + incoming_bytes` fits the
    /// budget or nothing evictable remains. Returns the number of evicted
    /// entries.
    pub async fn ensure_capacity(&self, incoming_bytes: u64) -> AppResult<usize> {
        let mut evicted = 0;

        while self.usage_bytes() + incoming_bytes > self.max_bytes {
            let Some(oldest) = self.conversion_repo.find_oldest().await? else {
                break;
            };

            tracing::info!(
                conversion_id = %oldest.id,
                created_at = %oldest.created_at,
                "Evicting oldest conversion to reclaim storage"
            );

            self.delete_artifacts(&oldest);
            self.conversion_repo.delete(&oldest.id).await?;
            evicted += 1;
        }

        if evicted > 0 {
            tracing::info!(
                evicted,
                usage_bytes = self.usage_bytes(),
                max_bytes = self.max_bytes,
                "Storage eviction pass finished"
            );
        }

        Ok(evicted)
    }

    /// Remove the audio and source files of one conversion. Missing files are
    /// fine; the record itself is the caller's to delete.
    pub fn delete_artifacts(&self, conversion: &Conversion) {
        for path in [&conversion.audio_path, &conversion.source_path] {
            let path = Path::new(path);
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove artifact");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::{create_pool, init_schema};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        data_dir: PathBuf,
        repo: Arc<ConversionRepository>,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().to_path_buf();
        std::fs::create_dir_all(data_dir.join("audio")).unwrap();
        std::fs::create_dir_all(data_dir.join("sources")).unwrap();
        let pool = create_pool(&data_dir.join("test.db")).await.unwrap();
        init_schema(&pool).await.unwrap();
        Fixture {
            _dir: dir,
            data_dir,
            repo: Arc::new(ConversionRepository::new(Arc::new(pool))),
        }
    }

    /// Persist a conversion whose audio file is `size` bytes of filler
    async fn seed(fixture: &Fixture, name: &str, size: usize, age_minutes: i64) -> Conversion {
        let audio_path = fixture.data_dir.join("audio").join(format!("{name}.mp3"));
        let source_path = fixture.data_dir.join("sources").join(format!("{name}.txt"));
        std::fs::write(&audio_path, vec![0u8; size]).unwrap();
        std::fs::write(&source_path, b"src").unwrap();

        let mut conversion = Conversion::new(
            "paste",
            None,
            source_path.to_string_lossy().into_owned(),
            format!("text for {name}"),
            "af_alloy".to_string(),
            1.0,
            audio_path.to_string_lossy().into_owned(),
            Some(1.0),
            size as i64,
        );
        conversion.created_at = Utc::now() - Duration::minutes(age_minutes);
        fixture.repo.insert(&conversion).await.unwrap();
        conversion
    }

    #[tokio::test]
    async fn test_usage_sums_both_directories() {
        let fixture = fixture().await;
        seed(&fixture, "a", 100, 0).await;
        let quota = StorageQuota::new(&fixture.data_dir, 10_000, fixture.repo.clone());
        // 100 bytes of audio + 3 bytes of source
        assert_eq!(quota.usage_bytes(), 103);
    }

    #[tokio::test]
    async fn test_no_eviction_when_within_budget() {
        let fixture = fixture().await;
        seed(&fixture, "a", 100, 0).await;
        let quota = StorageQuota::new(&fixture.data_dir, 10_000, fixture.repo.clone());
        assert_eq!(quota.ensure_capacity(50).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_evicts_oldest_first_until_budget_fits() {
        let fixture = fixture().await;
        let oldest = seed(&fixture, "oldest", 400, 30).await;
        let middle = seed(&fixture, "middle", 400, 20).await;
        let newest = seed(&fixture, "newest", 400, 10).await;

        // usage = 3 * 403 = 1209; budget 1000; incoming 10 -> must drop one
        let quota = StorageQuota::new(&fixture.data_dir, 1000, fixture.repo.clone());
        let evicted = quota.ensure_capacity(10).await.unwrap();

        assert_eq!(evicted, 1);
        assert!(fixture.repo.find_by_id(&oldest.id).await.unwrap().is_none());
        assert!(fixture.repo.find_by_id(&middle.id).await.unwrap().is_some());
        assert!(fixture.repo.find_by_id(&newest.id).await.unwrap().is_some());
        assert!(!Path::new(&oldest.audio_path).exists());
        assert!(!Path::new(&oldest.source_path).exists());
        assert!(quota.usage_bytes() + 10 <= 1000);
    }

    #[tokio::test]
    async fn test_evicts_repeatedly_when_one_pass_is_not_enough() {
        let fixture = fixture().await;
        seed(&fixture, "a", 400, 40).await;
        seed(&fixture, "b", 400, 30).await;
        let survivor = seed(&fixture, "c", 400, 20).await;

        let quota = StorageQuota::new(&fixture.data_dir, 500, fixture.repo.clone());
        let evicted = quota.ensure_capacity(0).await.unwrap();

        assert_eq!(evicted, 2);
        assert!(fixture
            .repo
            .find_by_id(&survivor.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_stops_when_store_is_empty_even_if_over_budget() {
        let fixture = fixture().await;
        // An orphan file with no database record cannot be evicted
        std::fs::write(fixture.data_dir.join("audio").join("orphan.mp3"), vec![0u8; 900]).unwrap();

        let quota = StorageQuota::new(&fixture.data_dir, 100, fixture.repo.clone());
        assert_eq!(quota.ensure_capacity(50).await.unwrap(), 0);
        assert!(quota.usage_bytes() > 100);
    }

    #[tokio::test]
    async fn test_delete_artifacts_tolerates_missing_files() {
        let fixture = fixture().await;
        let conversion = seed(&fixture, "a", 10, 0).await;
        let quota = StorageQuota::new(&fixture.data_dir, 10_000, fixture.repo.clone());

        quota.delete_artifacts(&conversion);
        assert!(!Path::new(&conversion.audio_path).exists());
        // Second call is a no-op
        quota.delete_artifacts(&conversion);
    }
}
