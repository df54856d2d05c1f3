// 持久缓存层
//
// 与内存层共享同一套合并加载语义，但条目落到 SQLite 的 link_cache 表，
// 带过期时间戳。读取是按主键的点查（过滤掉已过期行），写入是单行 upsert
// （同键并发写入为 last-write-wins，跨进程的重复写入可以容忍）。
// 过期行由后台 EvictionTask 周期性删除，存储增长与读流量解耦。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use std::time::Duration;

use crate::services::cache::counters::CacheCounters;
use crate::services::cache::error::CacheError;
use crate::services::cache::key::KeyProvider;
use crate::services::cache::loader::{validate_output, Cache, CachedValue, Loader};
use crate::services::cache::memory::effective_ttl;
use crate::services::cache::single_flight::{FlightTicket, SingleFlight};
use crate::services::resolver::ResolveRequest;

#[derive(sqlx::FromRow)]
struct CacheRow {
    payload: Vec<u8>,
    http_status_code: Option<i64>,
    http_content_type: Option<String>,
    cached_until: DateTime<Utc>,
}

impl CacheRow {
    fn into_value(self) -> (CachedValue, DateTime<Utc>) {
        (
            CachedValue {
                payload: self.payload,
                status_code: self.http_status_code.map(|s| s as u16),
                content_type: self.http_content_type,
            },
            self.cached_until,
        )
    }
}

pub struct DurableCache {
    pool: Pool<Sqlite>,
    keys: KeyProvider,
    loader: Arc<dyn Loader>,
    flights: Arc<SingleFlight>,
    default_ttl: Duration,
    counters: Arc<CacheCounters>,
}

impl DurableCache {
    pub fn new(
        pool: Pool<Sqlite>,
        keys: KeyProvider,
        loader: Arc<dyn Loader>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            pool,
            keys,
            loader,
            flights: Arc::new(SingleFlight::new()),
            default_ttl,
            counters: Arc::new(CacheCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<CacheCounters> {
        Arc::clone(&self.counters)
    }

    async fn lookup(
        &self,
        cache_key: &str,
    ) -> Result<Option<(CachedValue, DateTime<Utc>)>, sqlx::Error> {
        let row = sqlx::query_as::<_, CacheRow>(
            "SELECT payload, http_status_code, http_content_type, cached_until \
             FROM link_cache WHERE cache_key = ? AND cached_until > ?",
        )
        .bind(cache_key)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CacheRow::into_value))
    }

    /// 读取刚落库（或已存在）行的剩余存活时长
    async fn remaining_ttl(&self, cache_key: &str) -> Result<Option<Duration>, sqlx::Error> {
        let cached_until: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT cached_until FROM link_cache WHERE cache_key = ?")
                .bind(cache_key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(cached_until.and_then(|until| (until - Utc::now()).to_std().ok()))
    }

    /// 同 get()，额外返回条目在持久层的剩余存活时长。
    /// 上层（内存层）据此对齐自己的驻留时间，不会比权威过期时间活得更久。
    pub async fn get_with_ttl(
        &self,
        key: &str,
        request: &ResolveRequest,
    ) -> Result<(CachedValue, Option<Duration>), CacheError> {
        let cache_key = self.keys.namespaced(key);

        if let Some((value, cached_until)) = self.lookup(&cache_key).await? {
            self.counters.record_hit();
            let remaining = (cached_until - Utc::now()).to_std().ok();
            return Ok((value, remaining));
        }
        self.counters.record_miss();

        let rx = match self.flights.join(&cache_key) {
            FlightTicket::Leader(rx) => {
                self.spawn_load(cache_key.clone(), key.to_string(), request.clone());
                rx
            }
            FlightTicket::Follower(rx) => rx,
        };

        let value = match rx.await {
            Ok(Ok(value)) => value,
            Ok(Err(shared)) => return Err(CacheError::Shared(shared)),
            Err(_) => return Err(CacheError::FlightAborted),
        };

        let remaining = self.remaining_ttl(&cache_key).await?;
        Ok((value, remaining))
    }

    fn spawn_load(&self, cache_key: String, logical_key: String, request: ResolveRequest) {
        let loader = Arc::clone(&self.loader);
        let pool = self.pool.clone();
        let flights = Arc::clone(&self.flights);
        let default_ttl = self.default_ttl;

        tokio::spawn(async move {
            let loaded = loader
                .load(&logical_key, &request)
                .await
                .and_then(validate_output);

            let result = match loaded {
                Ok(output) => {
                    let ttl = effective_ttl(output.ttl, default_ttl);
                    let value = CachedValue::from_output(&output);
                    match persist(&pool, &cache_key, &value, ttl).await {
                        Ok(()) => Ok(value),
                        Err(e) => {
                            tracing::error!("持久缓存写入失败 (key={}): {}", cache_key, e);
                            Err(Arc::new(CacheError::Database(e)))
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("持久缓存加载失败 (key={}): {}", cache_key, e);
                    Err(Arc::new(CacheError::Load(e)))
                }
            };

            flights.complete(&cache_key, result);
        });
    }
}

#[async_trait]
impl Cache for DurableCache {
    async fn get(
        &self,
        key: &str,
        request: &ResolveRequest,
    ) -> Result<CachedValue, CacheError> {
        let (value, _) = self.get_with_ttl(key, request).await?;
        Ok(value)
    }
}

/// 写入一条缓存记录，过期时间 = now + ttl。
/// upsert 语义：同键重复写入覆盖旧值（last-write-wins）。
async fn persist(
    pool: &Pool<Sqlite>,
    cache_key: &str,
    value: &CachedValue,
    ttl: Duration,
) -> Result<(), sqlx::Error> {
    let cached_until = expiry_timestamp(ttl);

    sqlx::query(
        "INSERT INTO link_cache (cache_key, payload, http_status_code, http_content_type, cached_until) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(cache_key) DO UPDATE SET \
             payload = excluded.payload, \
             http_status_code = excluded.http_status_code, \
             http_content_type = excluded.http_content_type, \
             cached_until = excluded.cached_until",
    )
    .bind(cache_key)
    .bind(&value.payload)
    .bind(value.status_code.map(|s| s as i64))
    .bind(&value.content_type)
    .bind(cached_until)
    .execute(pool)
    .await?;

    Ok(())
}

fn expiry_timestamp(ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(3650));
    Utc::now() + ttl
}

/// 删除所有过期条目，返回删除行数
pub async fn evict_expired(pool: &Pool<Sqlite>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM link_cache WHERE cached_until < ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// 过期条目清理任务
pub struct EvictionTask {
    pool: Pool<Sqlite>,
    interval: Duration,
    counters: Arc<CacheCounters>,
}

impl EvictionTask {
    pub fn new(pool: Pool<Sqlite>, interval: Duration, counters: Arc<CacheCounters>) -> Self {
        Self {
            pool,
            interval,
            counters,
        }
    }

    /// 周期性清理，随进程存活
    pub async fn start(self) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;
            match evict_expired(&self.pool).await {
                Ok(evicted) => {
                    if evicted > 0 {
                        self.counters.record_evicted(evicted);
                        tracing::debug!("清理过期缓存条目: {} 条", evicted);
                    }
                }
                Err(e) => tracing::error!("过期缓存清理失败: {}", e),
            }
        }
    }
}
