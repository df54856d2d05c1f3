// 链接分发器
//
// 持有有序的 resolver 列表、通用链接缓存和缩略图缓存。
// 对每个入站 URL：按注册顺序逐个 check()，首个匹配的 run()；
// run 返回 Declined 时视同从未匹配继续往下试；其余错误记日志后
// 直接走通用回退——单个集成的故障永远不会拖垮普通链接预览。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::services::cache::{Cache, CachedValue};
use crate::services::resolver::response::LinkResponse;
use crate::services::resolver::{ResolveError, ResolveRequest, Resolver};

pub struct LinkResolver {
    resolvers: Arc<Vec<Arc<dyn Resolver>>>,
    link_cache: Arc<dyn Cache>,
    thumbnail_cache: Arc<dyn Cache>,
    /// 每个 resolver 名字的命中次数
    resolver_hits: Mutex<HashMap<&'static str, u64>>,
}

impl LinkResolver {
    pub fn new(
        resolvers: Arc<Vec<Arc<dyn Resolver>>>,
        link_cache: Arc<dyn Cache>,
        thumbnail_cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            resolvers,
            link_cache,
            thumbnail_cache,
            resolver_hits: Mutex::new(HashMap::new()),
        }
    }

    /// 解析链接预览。总是产出一个可写回客户端的值：
    /// 缓存层的瞬态失败在这里兜底成 500 形状的封套（不缓存）。
    pub async fn resolve(&self, request: &mut ResolveRequest) -> CachedValue {
        let url = request.url().clone();

        for resolver in self.resolvers.iter() {
            if !resolver.check(&url, request).await {
                continue;
            }
            match resolver.run(&url, request).await {
                Ok(payload) => {
                    self.record_hit(resolver.name());
                    return CachedValue {
                        payload,
                        status_code: Some(200),
                        content_type: Some("application/json".to_string()),
                    };
                }
                // 控制流信号：视同从未匹配
                Err(ResolveError::Declined) => continue,
                Err(e) => {
                    // 单个集成故障不中断整个请求，降级到通用回退
                    tracing::warn!("resolver {} 处理失败，回退通用路径: {}", resolver.name(), e);
                    break;
                }
            }
        }

        match self.link_cache.get(url.as_str(), request).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("链接缓存读取失败 (url={}): {}", url, e);
                error_value(&e.to_string())
            }
        }
    }

    /// 解析缩略图。成功时 payload 是转码后的图片字节，
    /// 失败时与 resolve 相同的 JSON 封套。
    pub async fn thumbnail(&self, request: &mut ResolveRequest) -> CachedValue {
        let url = request.url().clone();

        match self.thumbnail_cache.get(url.as_str(), request).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("缩略图缓存读取失败 (url={}): {}", url, e);
                error_value(&e.to_string())
            }
        }
    }

    fn record_hit(&self, name: &'static str) {
        let mut hits = self.resolver_hits.lock().expect("resolver hits poisoned");
        *hits.entry(name).or_insert(0) += 1;
    }

    /// 各 resolver 的命中计数快照
    pub fn resolver_hit_counts(&self) -> HashMap<String, u64> {
        self.resolver_hits
            .lock()
            .expect("resolver hits poisoned")
            .iter()
            .map(|(name, count)| (name.to_string(), *count))
            .collect()
    }
}

/// 瞬态失败兜底的 500 形状封套（不经过缓存）
fn error_value(message: &str) -> CachedValue {
    CachedValue {
        payload: LinkResponse::error(message).to_bytes(),
        status_code: Some(200),
        content_type: Some("application/json".to_string()),
    }
}
