use crate::domain::conversion::Conversion;
use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use std::sync::Arc;

pub struct ConversionRepository {
    pool: Arc<DbPool>,
}

impl ConversionRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Persist a finished conversion
    pub async fn insert(&self, conversion: &Conversion) -> AppResult<()> {
        let pool = self.pool.as_ref();
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO conversions
            (id, created_at, input_type, original_filename, source_path, content_preview,
             content_length, voice, speed, audio_path, audio_duration, audio_size, full_text)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&conversion.id)
        .bind(conversion.created_at)
        .bind(&conversion.input_type)
        .bind(&conversion.original_filename)
        .bind(&conversion.source_path)
        .bind(&conversion.content_preview)
        .bind(conversion.content_length)
        .bind(&conversion.voice)
        .bind(conversion.speed)
        .bind(&conversion.audio_path)
        .bind(conversion.audio_duration)
        .bind(conversion.audio_size)
        .bind(&conversion.full_text)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Conversion>> {
        let pool = self.pool.as_ref();
        let conversion = sqlx::query_as::<_, Conversion>(
            r#"
            SELECT * FROM conversions WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(conversion)
    }

    /// Newest-first page of the history
    pub async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Conversion>> {
        let pool = self.pool.as_ref();
        let conversions = sqlx::query_as::<_, Conversion>(
            r#"
            SELECT * FROM conversions
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(conversions)
    }

    /// Full-text search over stored text, preview, and filename, optionally
    /// bounded by creation date
    pub async fn search(
        &self,
        query: &str,
        from_date: Option<&str>,
        to_date: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Conversion>> {
        let pool = self.pool.as_ref();

        let mut sql = String::from(
            "SELECT c.* FROM conversions c \
             JOIN conversions_fts fts ON c.rowid = fts.rowid \
             WHERE conversions_fts MATCH ?",
        );
        if from_date.is_some() {
            sql.push_str(" AND c.created_at >= ?");
        }
        if to_date.is_some() {
            sql.push_str(" AND c.created_at <= ?");
        }
        sql.push_str(" ORDER BY c.created_at DESC LIMIT ? OFFSET ?");

        let mut stmt = sqlx::query_as::<_, Conversion>(&sql).bind(query);
        if let Some(from_date) = from_date {
            stmt = stmt.bind(from_date);
        }
        if let Some(to_date) = to_date {
            stmt = stmt.bind(to_date);
        }
        let conversions = stmt.bind(limit).bind(offset).fetch_all(pool).await?;

        Ok(conversions)
    }

    /// Oldest entry by creation time; the eviction candidate
    pub async fn find_oldest(&self) -> AppResult<Option<Conversion>> {
        let pool = self.pool.as_ref();
        let conversion = sqlx::query_as::<_, Conversion>(
            r#"
            SELECT * FROM conversions
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(pool)
        .await?;

        Ok(conversion)
    }

    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let result = sqlx::query(
            r#"
            DELETE FROM conversions WHERE id = ?
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::{create_pool, init_schema};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    async fn test_repo() -> (TempDir, ConversionRepository) {
        let dir = TempDir::new().unwrap();
        let pool = create_pool(&dir.path().join("test.db")).await.unwrap();
        init_schema(&pool).await.unwrap();
        (dir, ConversionRepository::new(Arc::new(pool)))
    }

    fn sample_conversion(text: &str) -> Conversion {
        Conversion::new(
            "paste",
            None,
            "/data/sources/test.txt".to_string(),
            text.to_string(),
            "af_alloy".to_string(),
            1.0,
            "/data/audio/test.mp3".to_string(),
            Some(12.5),
            4096,
        )
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (_dir, repo) = test_repo().await;
        let conversion = sample_conversion("The quick brown fox jumps over the lazy dog.");
        repo.insert(&conversion).await.unwrap();

        let found = repo.find_by_id(&conversion.id).await.unwrap().unwrap();
        assert_eq!(found.full_text, conversion.full_text);
        assert_eq!(found.voice, "af_alloy");
        assert_eq!(found.audio_duration, Some(12.5));

        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_dir, repo) = test_repo().await;
        let mut older = sample_conversion("older entry text");
        older.created_at = Utc::now() - Duration::minutes(5);
        let newer = sample_conversion("newer entry text");
        repo.insert(&older).await.unwrap();
        repo.insert(&newer).await.unwrap();

        let listed = repo.list(10, 0).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
    }

    #[tokio::test]
    async fn test_full_text_search() {
        let (_dir, repo) = test_repo().await;
        repo.insert(&sample_conversion("a story about a zeppelin voyage"))
            .await
            .unwrap();
        repo.insert(&sample_conversion("notes on sourdough baking"))
            .await
            .unwrap();

        let hits = repo.search("zeppelin", None, None, 10, 0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].full_text.contains("zeppelin"));

        let misses = repo.search("submarine", None, None, 10, 0).await.unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn test_search_deleted_rows_disappear() {
        let (_dir, repo) = test_repo().await;
        let conversion = sample_conversion("a story about a zeppelin voyage");
        repo.insert(&conversion).await.unwrap();
        assert!(repo.delete(&conversion.id).await.unwrap());

        let hits = repo.search("zeppelin", None, None, 10, 0).await.unwrap();
        assert!(hits.is_empty());
        assert!(!repo.delete(&conversion.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_oldest() {
        let (_dir, repo) = test_repo().await;
        assert!(repo.find_oldest().await.unwrap().is_none());

        let mut oldest = sample_conversion("the oldest entry");
        oldest.created_at = Utc::now() - Duration::hours(2);
        let mut middle = sample_conversion("the middle entry");
        middle.created_at = Utc::now() - Duration::hours(1);
        let newest = sample_conversion("the newest entry");

        repo.insert(&newest).await.unwrap();
        repo.insert(&oldest).await.unwrap();
        repo.insert(&middle).await.unwrap();

        let found = repo.find_oldest().await.unwrap().unwrap();
        assert_eq!(found.id, oldest.id);
    }
}
