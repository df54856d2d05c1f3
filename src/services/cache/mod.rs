// 缓存模块 - 两级合并加载缓存
//
// 本模块提供链接解析服务的缓存基础设施，包括：
// - 带命名空间的缓存键生成
// - Loader 契约（payload / 状态码 / Content-Type / TTL 覆盖）
// - 按键合并并发加载（同一键至多一次在途加载）
// - 内存层（moka，按条目 TTL）
// - 持久层（SQLite，后台过期清理）
// - 命中/未命中/清理计数

pub mod counters;
pub mod durable;
pub mod error;
pub mod key;
pub mod loader;
pub mod memory;
pub mod single_flight;
pub mod tiered;

pub use counters::{CacheCounters, CounterSnapshot};
pub use durable::{evict_expired, DurableCache, EvictionTask};
pub use error::{CacheError, LoadError};
pub use key::KeyProvider;
pub use loader::{Cache, CachedValue, LoadOutput, Loader};
pub use memory::MemoryCache;
pub use single_flight::{FlightTicket, SingleFlight};
pub use tiered::TieredCache;
