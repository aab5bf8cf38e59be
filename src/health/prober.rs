//! TCP探测器实现
//!
//! 通过TCP连接判断目标是否可达，支持有限次数的顺序重试

use crate::error::ProbeError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// 探测器trait，定义探测接口
#[async_trait]
pub trait Prober: Send + Sync {
    /// 执行一次连接尝试
    ///
    /// # 参数
    /// * `address` - 主机名或IP
    /// * `port` - 端口
    /// * `timeout_duration` - 超时时间
    async fn attempt(
        &self,
        address: &str,
        port: u16,
        timeout_duration: Duration,
    ) -> Result<(), ProbeError>;

    /// 带重试的可达性探测
    ///
    /// 最多尝试 `retries` 次（至少一次），首次成功立即返回 `true`，
    /// 全部失败才返回 `false`。重试之间没有等待。
    async fn probe(&self, address: &str, port: u16, timeout_duration: Duration, retries: u32) -> bool {
        let attempts = retries.max(1);

        for attempt in 1..=attempts {
            match self.attempt(address, port, timeout_duration).await {
                Ok(()) => {
                    debug!("{}:{} 连接成功 (第{}次)", address, port, attempt);
                    return true;
                }
                Err(e) => {
                    debug!("{}:{} 离线 {}/{}: {}", address, port, attempt, attempts, e);
                }
            }
        }

        false
    }
}

/// 基于 tokio `TcpStream` 的探测器
#[derive(Debug, Clone, Default)]
pub struct TcpProber;

impl TcpProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn attempt(
        &self,
        address: &str,
        port: u16,
        timeout_duration: Duration,
    ) -> Result<(), ProbeError> {
        let addr = format!("{}:{}", address, port);

        match timeout(timeout_duration, TcpStream::connect((address, port))).await {
            // 连接建立后立即丢弃，只关心握手是否成功
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(source)) => Err(ProbeError::Connect { addr, source }),
            Err(_) => Err(ProbeError::Timeout { addr }),
        }
    }
}
