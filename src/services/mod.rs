// 业务服务模块

pub mod cache;
pub mod fetch;
pub mod resolver;
pub mod thumbnail;
