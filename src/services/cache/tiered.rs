// 两级缓存组合
//
// 内存层挡在持久层前面：内存命中直接返回；内存未命中时持久层作为
// 内存层的加载器被调用，持久层再未命中才会触发真正的加载器。
// 两层各自维护合并加载，真正的加载在持久层发生，至多一次在途。

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::services::cache::durable::DurableCache;
use crate::services::cache::error::{CacheError, LoadError};
use crate::services::cache::key::KeyProvider;
use crate::services::cache::loader::{Cache, CachedValue, LoadOutput, Loader};
use crate::services::cache::memory::MemoryCache;
use crate::services::resolver::ResolveRequest;

pub struct TieredCache {
    memory: MemoryCache,
}

impl TieredCache {
    /// memory_ttl 是内存层驻留时长的上限；权威的过期时间在持久层，
    /// 条目在内存中的存活不会超过持久层行的剩余寿命。
    pub fn new(keys: KeyProvider, durable: Arc<DurableCache>, memory_ttl: Duration) -> Self {
        let tier = Arc::new(DurableTier {
            inner: durable,
            memory_ttl,
        });
        Self {
            memory: MemoryCache::new(keys, tier, memory_ttl),
        }
    }
}

#[async_trait]
impl Cache for TieredCache {
    async fn get(
        &self,
        key: &str,
        request: &ResolveRequest,
    ) -> Result<CachedValue, CacheError> {
        self.memory.get(key, request).await
    }
}

/// 持久层适配成内存层的加载器
struct DurableTier {
    inner: Arc<DurableCache>,
    memory_ttl: Duration,
}

#[async_trait]
impl Loader for DurableTier {
    async fn load(&self, key: &str, request: &ResolveRequest) -> Result<LoadOutput, LoadError> {
        let (value, remaining) = self
            .inner
            .get_with_ttl(key, request)
            .await
            .map_err(to_load_error)?;

        let mut output = LoadOutput::new(value.payload);
        output.status_code = value.status_code;
        output.content_type = value.content_type;
        // 内存驻留取 持久层剩余寿命 与 memory_ttl 的较小者，
        // 加载器给的短 TTL 覆盖因此同样约束内存层
        output.ttl = remaining
            .map(|r| r.min(self.memory_ttl).max(Duration::from_millis(1)));
        Ok(output)
    }
}

/// 持久层的失败对内存层来说就是一次加载失败：不落内存缓存，原样向上抛
fn to_load_error(e: CacheError) -> LoadError {
    match e {
        CacheError::Load(e) => e,
        CacheError::Database(e) => LoadError::Database(e.to_string()),
        other => LoadError::Internal(other.to_string()),
    }
}
