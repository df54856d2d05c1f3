// 解析器模块 - URL 分发与通用回退
//
// 本模块提供链接解析的分发基础设施，包括：
// - Resolver 契约（check / run / name）
// - 请求级上下文（check 阶段暂存解析结果，run 阶段取用，缺失即失败）
// - "放弃处理" 哨兵（控制流信号，不是故障）
// - 分发器（按注册顺序尝试，首个匹配生效，失败优雅降级）
// - 通用回退加载器（HTML 抓取 + og/twitter 元信息 + tooltip 模板）

pub mod dispatcher;
pub mod link_loader;
pub mod meta;
pub mod response;
pub mod tooltip;

pub use dispatcher::LinkResolver;
pub use link_loader::LinkLoader;
pub use response::LinkResponse;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

use crate::services::cache::CacheError;

/// 解析请求：原始 URL 加一个请求级键值包。
///
/// check() 阶段解析出的数据（如语言代码、文章 id）写入键值包，
/// run() 阶段通过 value() 读取。约定每个 resolver 在文档中声明
/// 自己依赖的键；run() 读取缺失的键会得到 MissingContextValue，
/// 而不是静默地重新解析。
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    url: Url,
    values: HashMap<&'static str, String>,
}

impl ResolveRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            values: HashMap::new(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// check() 阶段写入解析结果
    pub fn insert_value(&mut self, key: &'static str, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    /// run() 阶段读取 check() 留下的数据；缺失即失败（fail closed）
    pub fn value(&self, key: &'static str) -> Result<&str, ResolveError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or(ResolveError::MissingContextValue(key))
    }
}

/// 解析失败类型
#[derive(Debug, Error)]
pub enum ResolveError {
    /// 处理中途放弃：分发器视同该 resolver 从未匹配，继续走后续链路。
    /// 纯控制流信号，不记录为故障。
    #[error("resolver declined to handle the request")]
    Declined,

    /// run() 之前没有执行对应的 check()，上下文数据缺失
    #[error("缺少上下文数据 '{0}'")]
    MissingContextValue(&'static str),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("{0}")]
    Other(String),
}

impl ResolveError {
    pub fn is_decline(&self) -> bool {
        matches!(self, ResolveError::Declined)
    }
}

/// 站点解析器契约。实现方通常内部持有自己的 Cache + Loader。
#[async_trait]
pub trait Resolver: Send + Sync {
    /// 指标标签用的名字
    fn name(&self) -> &'static str;

    /// 该 resolver 是否处理这个 URL。可以把解析出的数据写入 request，
    /// 供 run() 取用（避免重复解析，也让 check 能单独当谓词测试）。
    async fn check(&self, url: &Url, request: &mut ResolveRequest) -> bool;

    /// 处理 URL，返回响应 payload 字节。
    /// 返回 Declined 表示把控制权交还给后续链路。
    async fn run(&self, url: &Url, request: &ResolveRequest) -> Result<Vec<u8>, ResolveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_value_roundtrip() {
        let mut request = ResolveRequest::new(Url::parse("https://example.com/a/1").unwrap());
        request.insert_value("article_id", "1");
        assert_eq!(request.value("article_id").unwrap(), "1");
    }

    #[test]
    fn test_missing_context_value_fails_closed() {
        let request = ResolveRequest::new(Url::parse("https://example.com/").unwrap());
        let err = request.value("locale").unwrap_err();
        assert!(matches!(err, ResolveError::MissingContextValue("locale")));
    }

    #[test]
    fn test_decline_is_distinguishable() {
        assert!(ResolveError::Declined.is_decline());
        assert!(!ResolveError::Other("x".to_string()).is_decline());
    }
}
