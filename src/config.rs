// 运行配置
//
// 全部来自环境变量（配合 dotenv），每项都有可直接跑起来的默认值。
// 解析失败回退默认值并打一条 warn，启动不因配置错误中断。

use std::str::FromStr;
use std::time::Duration;

/// 默认的响应体大小上限（5 MB）
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 5 * 1024 * 1024;

/// 默认的缩略图最长边（像素）
pub const DEFAULT_MAX_THUMBNAIL_SIZE: u32 = 300;

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// 出站请求的 User-Agent
    pub user_agent: String,
    /// 出站请求的 Accept-Language
    pub accept_language: String,
    /// 响应体的字节上限，超过即拒绝
    pub max_content_length: usize,
    /// 出站请求超时
    pub request_timeout: Duration,
    /// 链接预览的默认缓存时长
    pub link_cache_ttl: Duration,
    /// 缩略图的默认缓存时长
    pub thumbnail_cache_ttl: Duration,
    /// 缩略图最长边（像素）
    pub max_thumbnail_size: u32,
    /// 过期缓存清理间隔
    pub eviction_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: "sqlite:./link_resolver.db?mode=rwc".to_string(),
            user_agent: concat!(
                "link-resolver-backend/",
                env!("CARGO_PKG_VERSION"),
                " (preview fetcher)"
            )
            .to_string(),
            accept_language: "en-US, en;q=0.9".to_string(),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            request_timeout: Duration::from_secs(15),
            link_cache_ttl: Duration::from_secs(600),
            thumbnail_cache_ttl: Duration::from_secs(600),
            max_thumbnail_size: DEFAULT_MAX_THUMBNAIL_SIZE,
            eviction_interval: Duration::from_secs(60),
        }
    }
}

impl Settings {
    /// 从环境变量读取配置，缺省项取默认值
    pub fn from_env() -> Self {
        let defaults = Settings::default();

        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT", defaults.port),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            user_agent: std::env::var("USER_AGENT").unwrap_or(defaults.user_agent),
            accept_language: std::env::var("ACCEPT_LANGUAGE").unwrap_or(defaults.accept_language),
            max_content_length: env_parse("MAX_CONTENT_LENGTH", defaults.max_content_length),
            request_timeout: Duration::from_secs(env_parse(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            link_cache_ttl: Duration::from_secs(env_parse(
                "LINK_CACHE_TTL_SECS",
                defaults.link_cache_ttl.as_secs(),
            )),
            thumbnail_cache_ttl: Duration::from_secs(env_parse(
                "THUMBNAIL_CACHE_TTL_SECS",
                defaults.thumbnail_cache_ttl.as_secs(),
            )),
            max_thumbnail_size: env_parse("MAX_THUMBNAIL_SIZE", defaults.max_thumbnail_size),
            eviction_interval: Duration::from_secs(env_parse(
                "EVICTION_INTERVAL_SECS",
                defaults.eviction_interval.as_secs(),
            )),
        }
    }
}

/// 读取并解析一个环境变量，缺省或解析失败时返回默认值
fn env_parse<T: FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("环境变量 {} 的值无法解析: {:?}，使用默认值 {}", name, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}
