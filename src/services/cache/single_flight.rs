// 按键合并并发加载
//
// 同一个键在任意时刻至多存在一次加载：第一个未命中的调用方成为 leader，
// 负责启动加载任务；其余调用方只登记为 waiter 等待通知。
// 加载结束后（无论成败）所有 waiter 恰好收到一次结果。
//
// 锁只在登记/分发瞬间持有，绝不跨越网络 IO。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::services::cache::error::CacheError;
use crate::services::cache::loader::CachedValue;

/// 分发给 waiter 的结果。错误以 Arc 共享，所有 waiter 收到同一个实例。
pub type FlightResult = Result<CachedValue, Arc<CacheError>>;

/// 加入航班后的身份
pub enum FlightTicket {
    /// 第一个调用方：需要启动加载，再等待自己的接收端
    Leader(oneshot::Receiver<FlightResult>),
    /// 后续调用方：只等待
    Follower(oneshot::Receiver<FlightResult>),
}

#[derive(Default)]
pub struct SingleFlight {
    in_flight: Mutex<HashMap<String, Vec<oneshot::Sender<FlightResult>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记为某个键的 waiter。返回 Leader 的调用方必须随后调用
    /// complete()，否则所有 waiter 将一直阻塞。
    pub fn join(&self, key: &str) -> FlightTicket {
        let (tx, rx) = oneshot::channel();
        let mut in_flight = self.in_flight.lock().expect("in-flight map poisoned");

        match in_flight.get_mut(key) {
            Some(waiters) => {
                waiters.push(tx);
                FlightTicket::Follower(rx)
            }
            None => {
                in_flight.insert(key.to_string(), vec![tx]);
                FlightTicket::Leader(rx)
            }
        }
    }

    /// 结束一个键的航班：移除 waiter 列表并向每个 waiter 分发结果。
    /// 接收端已被丢弃（调用方断开）的发送会静默失败，不影响其余 waiter。
    pub fn complete(&self, key: &str, result: FlightResult) {
        let waiters = {
            let mut in_flight = self.in_flight.lock().expect("in-flight map poisoned");
            in_flight.remove(key).unwrap_or_default()
        };

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }

    /// 当前仍在加载中的键数量（仅用于统计与测试）
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().expect("in-flight map poisoned").len()
    }
}
