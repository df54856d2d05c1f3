use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::str::FromStr;

pub mod schema;

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        tracing::info!("Connecting to database: {}", database_url);

        // 配置 SQLite 连接选项
        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .busy_timeout(std::time::Duration::from_secs(30)); // 设置忙等待超时

        // SQLite 单写入者，限制为1个连接以避免锁定问题
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await?;

        // 连接健康检查
        sqlx::query("SELECT 1").execute(&pool).await?;

        // Run migrations
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;

        // Verify schema integrity
        schema::verify_schema(&pool).await?;

        // Clean up expired cache entries left over from previous runs
        let removed = crate::services::cache::evict_expired(&pool).await?;
        if removed > 0 {
            tracing::info!("启动时清理了 {} 条过期缓存", removed);
        }

        // Log database statistics
        let stats = schema::get_database_stats(&pool).await?;
        tracing::info!(
            "Database initialized - Cached links: {}, Size: {:.2} MB",
            stats.cache_count,
            stats.database_size_mb()
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// 获取数据库统计信息
    pub async fn get_stats(&self) -> Result<schema::DatabaseStats> {
        schema::get_database_stats(&self.pool).await
    }
}
