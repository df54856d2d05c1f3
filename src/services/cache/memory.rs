// 内存缓存层
//
// 进程内的带 TTL 缓存，底层用 moka 的异步缓存存储，
// 每个条目可携带独立 TTL（加载器覆盖值优先于默认值）。
// 未命中时通过 SingleFlight 合并并发加载：同一键只会触发一次加载，
// 加载在独立任务上执行，所有调用方等待同一个结果。

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::services::cache::counters::CacheCounters;
use crate::services::cache::error::CacheError;
use crate::services::cache::key::KeyProvider;
use crate::services::cache::loader::{validate_output, Cache, CachedValue, Loader};
use crate::services::cache::single_flight::{FlightTicket, SingleFlight};
use crate::services::resolver::ResolveRequest;

/// 存入 moka 的条目，携带自身 TTL
#[derive(Clone)]
struct StoredEntry {
    value: CachedValue,
    ttl: Duration,
}

/// 按条目 TTL 过期
struct PerEntryExpiry;

impl Expiry<String, StoredEntry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &StoredEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

pub struct MemoryCache {
    keys: KeyProvider,
    loader: Arc<dyn Loader>,
    store: MokaCache<String, StoredEntry>,
    flights: Arc<SingleFlight>,
    default_ttl: Duration,
    counters: Arc<CacheCounters>,
}

impl MemoryCache {
    pub fn new(keys: KeyProvider, loader: Arc<dyn Loader>, default_ttl: Duration) -> Self {
        let store = MokaCache::builder()
            .max_capacity(10_000)
            .expire_after(PerEntryExpiry)
            .build();

        Self {
            keys,
            loader,
            store,
            flights: Arc::new(SingleFlight::new()),
            default_ttl,
            counters: Arc::new(CacheCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<CacheCounters> {
        Arc::clone(&self.counters)
    }

    /// 在独立任务上执行加载并分发结果。只有 leader 会走到这里。
    fn spawn_load(&self, cache_key: String, logical_key: String, request: ResolveRequest) {
        let loader = Arc::clone(&self.loader);
        let store = self.store.clone();
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
                    store
                        .insert(cache_key.clone(), StoredEntry { value: value.clone(), ttl })
                        .await;
                    Ok(value)
                }
                Err(e) => {
                    tracing::warn!("内存缓存加载失败 (key={}): {}", cache_key, e);
                    Err(Arc::new(CacheError::Load(e)))
                }
            };

            flights.complete(&cache_key, result);
        });
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(
        &self,
        key: &str,
        request: &ResolveRequest,
    ) -> Result<CachedValue, CacheError> {
        let cache_key = self.keys.namespaced(key);

        if let Some(entry) = self.store.get(&cache_key).await {
            self.counters.record_hit();
            return Ok(entry.value);
        }
        self.counters.record_miss();

        let rx = match self.flights.join(&cache_key) {
            FlightTicket::Leader(rx) => {
                self.spawn_load(cache_key.clone(), key.to_string(), request.clone());
                rx
            }
            FlightTicket::Follower(rx) => rx,
        };

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(shared)) => Err(CacheError::Shared(shared)),
            // leader 任务 panic 或被取消
            Err(_) => Err(CacheError::FlightAborted),
        }
    }
}

/// 加载器提供的非零 TTL 优先于缓存默认值
pub(crate) fn effective_ttl(ttl_override: Option<Duration>, default: Duration) -> Duration {
    ttl_override.filter(|t| !t.is_zero()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::error::LoadError;
    use crate::services::cache::loader::LoadOutput;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    fn request() -> ResolveRequest {
        ResolveRequest::new(Url::parse("https://example.com/").unwrap())
    }

    /// 计数加载器：记录调用次数，可配置延迟、TTL 覆盖和失败
    struct CountingLoader {
        calls: AtomicUsize,
        delay: Duration,
        ttl: Option<Duration>,
        fail: bool,
    }

    impl CountingLoader {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::from_millis(50),
                ttl: None,
                fail: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Loader for CountingLoader {
        async fn load(
            &self,
            _key: &str,
            _request: &ResolveRequest,
        ) -> Result<LoadOutput, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(LoadError::Network("simulated".to_string()));
            }
            let mut output = LoadOutput::new(b"{\"status\":200}".to_vec()).with_status(200);
            if let Some(ttl) = self.ttl {
                output = output.with_ttl(ttl);
            }
            Ok(output)
        }
    }

    fn cache_with(loader: Arc<CountingLoader>, default_ttl: Duration) -> Arc<MemoryCache> {
        Arc::new(MemoryCache::new(
            KeyProvider::new("test"),
            loader,
            default_ttl,
        ))
    }

    #[tokio::test]
    async fn test_concurrent_gets_coalesce_to_one_load() {
        let loader = Arc::new(CountingLoader::new());
        let cache = cache_with(Arc::clone(&loader), Duration::from_secs(60));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.get("emote:abc", &request()).await.unwrap()
            }));
        }

        let mut payloads = Vec::new();
        for handle in handles {
            payloads.push(handle.await.unwrap().payload);
        }

        assert_eq!(loader.calls(), 1);
        for payload in &payloads {
            assert_eq!(payload, b"{\"status\":200}");
        }
    }

    #[tokio::test]
    async fn test_hit_does_not_reinvoke_loader() {
        let loader = Arc::new(CountingLoader::new());
        let cache = cache_with(Arc::clone(&loader), Duration::from_secs(60));

        let first = cache.get("k", &request()).await.unwrap();
        let second = cache.get("k", &request()).await.unwrap();

        assert_eq!(loader.calls(), 1);
        assert_eq!(first.payload, second.payload);

        let counters = cache.counters().snapshot();
        assert_eq!(counters.hits, 1);
        assert_eq!(counters.misses, 1);
    }

    #[tokio::test]
    async fn test_ttl_override_takes_precedence() {
        let mut loader = CountingLoader::new();
        loader.ttl = Some(Duration::from_secs(60));
        loader.delay = Duration::from_millis(1);
        let loader = Arc::new(loader);
        // 默认 TTL 极短；覆盖值生效时条目应当仍然存活
        let cache = cache_with(Arc::clone(&loader), Duration::from_millis(20));

        cache.get("k", &request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.get("k", &request()).await.unwrap();

        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test]
    async fn test_default_ttl_expires_entry() {
        let mut loader = CountingLoader::new();
        loader.delay = Duration::from_millis(1);
        let loader = Arc::new(loader);
        let cache = cache_with(Arc::clone(&loader), Duration::from_millis(20));

        cache.get("k", &request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.get("k", &request()).await.unwrap();

        assert_eq!(loader.calls(), 2);
    }

    #[tokio::test]
    async fn test_transient_error_not_cached() {
        let mut loader = CountingLoader::new();
        loader.fail = true;
        loader.delay = Duration::from_millis(1);
        let loader = Arc::new(loader);
        let cache = cache_with(Arc::clone(&loader), Duration::from_secs(60));

        assert!(cache.get("k", &request()).await.is_err());
        assert!(cache.get("k", &request()).await.is_err());

        // 失败不落缓存，每次 get 都重新触发加载
        assert_eq!(loader.calls(), 2);
    }

    #[test]
    fn test_effective_ttl_precedence() {
        let default = Duration::from_secs(600);
        assert_eq!(effective_ttl(None, default), default);
        assert_eq!(effective_ttl(Some(Duration::ZERO), default), default);
        assert_eq!(
            effective_ttl(Some(Duration::from_secs(3600)), default),
            Duration::from_secs(3600)
        );
    }
}
