//! 探测数据结构
//!
//! 定义监控目标、探测任务、探测结果和在线状态枚举

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 在线状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// 可达
    Up,
    /// 不可达
    Down,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Up => write!(f, "在线"),
            HealthStatus::Down => write!(f, "离线"),
        }
    }
}

impl HealthStatus {
    /// 判断状态是否为健康
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Up)
    }
}

/// 监控目标，进程生命周期内不可变
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// 目标名称（同时作为标识）
    pub id: String,
    /// 主机名或IP
    pub address: String,
    /// TCP端口
    pub port: u16,
}

impl Target {
    pub fn new(id: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            port,
        }
    }

    /// 告警中展示的名称，首字母大写
    pub fn display_name(&self) -> String {
        let mut chars = self.id.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// `address:port` 形式的地址
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// 每轮探测共用的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    /// 单次连接超时
    pub timeout: Duration,
    /// 连接尝试次数
    pub retries: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 5,
        }
    }
}

/// 探测任务，每轮每个目标一个
#[derive(Debug, Clone)]
pub struct ProbeJob {
    pub target: Target,
    pub retry_budget: u32,
}

/// 探测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// 被探测的目标
    pub target: Target,
    /// 是否可达
    pub reachable: bool,
    /// 观测时间
    pub observed_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn new(target: Target, reachable: bool, observed_at: DateTime<Utc>) -> Self {
        Self {
            target,
            reachable,
            observed_at,
        }
    }

    pub fn status(&self) -> HealthStatus {
        if self.reachable {
            HealthStatus::Up
        } else {
            HealthStatus::Down
        }
    }
}
