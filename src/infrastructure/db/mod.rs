use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

pub type DbPool = Pool<Sqlite>;

pub async fn create_pool(database_path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await
}

pub async fn check_connection(pool: &DbPool) -> Result<bool, sqlx::Error> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map(|_| true)
}

/// Create the conversions table plus its full-text index. Idempotent; runs at
/// every startup.
pub async fn init_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS conversions (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            input_type TEXT NOT NULL,
            original_filename TEXT,
            source_path TEXT NOT NULL,
            content_preview TEXT NOT NULL,
            content_length INTEGER NOT NULL,
            voice TEXT NOT NULL,
            speed REAL NOT NULL,
            audio_path TEXT NOT NULL,
            audio_duration REAL,
            audio_size INTEGER NOT NULL,
            full_text TEXT NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_conversions_created_at ON conversions(created_at)",
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS conversions_fts USING fts5(
            full_text, content_preview, original_filename,
            content='conversions', content_rowid='rowid'
        )
        "#,
        r#"
        CREATE TRIGGER IF NOT EXISTS conversions_ai AFTER INSERT ON conversions BEGIN
            INSERT INTO conversions_fts(rowid, full_text, content_preview, original_filename)
            VALUES (NEW.rowid, NEW.full_text, NEW.content_preview, NEW.original_filename);
        END
        "#,
        r#"
        CREATE TRIGGER IF NOT EXISTS conversions_ad AFTER DELETE ON conversions BEGIN
            INSERT INTO conversions_fts(conversions_fts, rowid, full_text, content_preview, original_filename)
            VALUES('delete', OLD.rowid, OLD.full_text, OLD.content_preview, OLD.original_filename);
        END
        "#,
        r#"
        CREATE TRIGGER IF NOT EXISTS conversions_au AFTER UPDATE ON conversions BEGIN
            INSERT INTO conversions_fts(conversions_fts, rowid, full_text, content_preview, original_filename)
            VALUES('delete', OLD.rowid, OLD.full_text, OLD.content_preview, OLD.original_filename);
            INSERT INTO conversions_fts(rowid, full_text, content_preview, original_filename)
            VALUES (NEW.rowid, NEW.full_text, NEW.content_preview, NEW.original_filename);
        END
        "#,
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
