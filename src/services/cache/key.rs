// 缓存键生成
//
// 把逻辑键（URL、emote id 等）映射为带命名空间前缀的存储键，
// 不同缓存层级共用一张表时靠前缀隔离。

/// 缓存键前缀提供者，无状态
#[derive(Debug, Clone)]
pub struct KeyProvider {
    prefix: &'static str,
}

impl KeyProvider {
    pub fn new(prefix: &'static str) -> Self {
        Self { prefix }
    }

    /// 逻辑键 -> "prefix:key"
    pub fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}
