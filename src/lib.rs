// 链接预览后端库
//
// 本库提供聊天客户端链接预览的核心功能，包括：
// - API 路由
// - 请求合并的两级 TTL 缓存（内存 + SQLite）
// - 链接解析分发链
// - 缩略图下载与转码

pub mod api;
pub mod config;
pub mod database;
pub mod services;
