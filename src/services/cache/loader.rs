// 加载器契约
//
// Loader 是一种能力而非组件：给定逻辑键和原始请求，产出
// (payload 字节, 可选状态码, 可选 Content-Type, 可选 TTL 覆盖)。
// 每个 resolver 以及通用链接/缩略图加载器都实现它。
//
// 约定：面向用户的错误（上游 404、响应过大、格式不支持）编码进 payload
// 作为 Ok 返回，会被正常缓存；Err 专门保留给"不要缓存这次结果"的瞬态失败。

use async_trait::async_trait;
use std::time::Duration;

use crate::services::cache::error::{CacheError, LoadError};
use crate::services::resolver::ResolveRequest;

/// 加载器的产出
#[derive(Debug, Clone)]
pub struct LoadOutput {
    pub payload: Vec<u8>,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    /// TTL 覆盖；None 或零时长表示使用缓存层的默认 TTL
    pub ttl: Option<Duration>,
}

impl LoadOutput {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            status_code: None,
            content_type: None,
            ttl: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// 缓存中存储、并原样返回给所有调用方的值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    pub payload: Vec<u8>,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
}

impl CachedValue {
    pub fn from_output(output: &LoadOutput) -> Self {
        Self {
            payload: output.payload.clone(),
            status_code: output.status_code,
            content_type: output.content_type.clone(),
        }
    }
}

#[async_trait]
pub trait Loader: Send + Sync {
    /// 加载逻辑键对应的数据。key 为未加命名空间的逻辑键，
    /// 命名空间由缓存层内部处理。
    async fn load(&self, key: &str, request: &ResolveRequest) -> Result<LoadOutput, LoadError>;
}

/// 两级缓存共用的对外契约
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str, request: &ResolveRequest)
        -> Result<CachedValue, CacheError>;
}

/// 校验加载产出满足"成功必须有非空 payload"的不变式。
/// 违反时降级为内部加载错误，确保空 payload 永远不会进入缓存。
pub(crate) fn validate_output(output: LoadOutput) -> Result<LoadOutput, LoadError> {
    if output.payload.is_empty() {
        return Err(LoadError::Internal(
            "loader returned success with empty payload".to_string(),
        ));
    }
    Ok(output)
}
