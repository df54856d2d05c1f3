pub mod error;
pub mod health;
pub mod link_resolver;
pub mod thumbnail;

use std::sync::Arc;

use crate::database::Database;
use crate::services::cache::CacheCounters;
use crate::services::resolver::LinkResolver;

#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub resolver: Arc<LinkResolver>,
    pub link_counters: Arc<CacheCounters>,
    pub thumbnail_counters: Arc<CacheCounters>,
}
