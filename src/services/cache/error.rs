// 缓存模块错误类型定义
//
// 区分两类失败：
// - LoadError: 加载器的瞬态失败（网络、上游不可达等），绝不写入缓存，
//   下一次请求会重新触发加载。可缓存的"负面结果"（上游 404、响应过大等）
//   不走这里，而是由加载器编码成正常的 payload 返回。
// - CacheError: 缓存层自身的失败（数据库、任务调度）。

use thiserror::Error;

/// 加载器的瞬态失败，永远不会被缓存
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("网络错误: {0}")]
    Network(String),

    #[error("下载超时")]
    Timeout,

    #[error("无效的 URL: {0}")]
    InvalidUrl(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 缓存操作的统一错误类型
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("加载失败: {0}")]
    Load(#[from] LoadError),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("加载任务中断")]
    FlightAborted,

    /// 同一键的并发调用方共享 leader 的失败结果
    #[error("{0}")]
    Shared(#[from] std::sync::Arc<CacheError>),
}

// reqwest 错误统一归类为瞬态失败
impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LoadError::Timeout
        } else {
            LoadError::Network(err.to_string())
        }
    }
}
