//! 连通性哨兵
//!
//! 判定目标离线之前，先确认本机自身的出站网络是否可用

use crate::config::SentinelConfig;
use crate::health::Prober;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 对一个已知可达的地址做单次探测
pub struct Sentinel {
    prober: Arc<dyn Prober>,
    address: String,
    port: u16,
    timeout: Duration,
}

impl Sentinel {
    pub fn new(
        prober: Arc<dyn Prober>,
        address: impl Into<String>,
        port: u16,
        timeout: Duration,
    ) -> Self {
        Self {
            prober,
            address: address.into(),
            port,
            timeout,
        }
    }

    pub fn from_config(prober: Arc<dyn Prober>, config: &SentinelConfig) -> Self {
        Self::new(prober, config.address.clone(), config.port, config.timeout())
    }

    /// 本机是否能连通外网
    pub async fn internet_reachable(&self) -> bool {
        let reachable = self
            .prober
            .probe(&self.address, self.port, self.timeout, 1)
            .await;
        debug!(
            "哨兵 {}:{} {}",
            self.address,
            self.port,
            if reachable { "可达" } else { "不可达" }
        );
        reachable
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
