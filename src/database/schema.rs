use anyhow::Result;
use sqlx::{Pool, Sqlite};

/// 验证数据库schema完整性
pub async fn verify_schema(pool: &Pool<Sqlite>) -> Result<()> {
    let exists = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
        .bind("link_cache")
        .fetch_optional(pool)
        .await?;

    if exists.is_none() {
        return Err(anyhow::anyhow!("Required table 'link_cache' does not exist"));
    }

    // 检查过期清扫用的索引是否存在
    let exists = sqlx::query("SELECT name FROM sqlite_master WHERE type='index' AND name=?")
        .bind("idx_link_cache_cached_until")
        .fetch_optional(pool)
        .await?;

    if exists.is_none() {
        return Err(anyhow::anyhow!(
            "Required index 'idx_link_cache_cached_until' does not exist"
        ));
    }

    tracing::info!("Database schema verification completed successfully");
    Ok(())
}

/// 获取数据库统计信息
pub async fn get_database_stats(pool: &Pool<Sqlite>) -> Result<DatabaseStats> {
    let cache_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM link_cache")
        .fetch_one(pool)
        .await?;

    // 获取数据库文件大小
    let db_size: i64 = sqlx::query_scalar(
        "SELECT page_count * page_size as size FROM pragma_page_count(), pragma_page_size()",
    )
    .fetch_one(pool)
    .await?;

    Ok(DatabaseStats {
        cache_count,
        database_size_bytes: db_size,
    })
}

/// 数据库统计信息
#[derive(Debug, serde::Serialize)]
pub struct DatabaseStats {
    pub cache_count: i64,
    pub database_size_bytes: i64,
}

impl DatabaseStats {
    pub fn database_size_mb(&self) -> f64 {
        self.database_size_bytes as f64 / (1024.0 * 1024.0)
    }
}
