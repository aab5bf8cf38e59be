//! Port Vitals - TCP端口可达性监控与告警工具
//!
//! 定期对一组主机的固定端口发起TCP连接，跟踪每个目标的在线状态，
//! 在目标离线时发送去重后的告警邮件：
//! - 哨兵检查，本机断网时跳过整轮，避免误报
//! - 固定并发度的探测工作池
//! - 免打扰时段与告警冷却
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod notification;
pub mod status;

// 重新导出主要类型
pub use config::{Config, MonitorConfig};
pub use error::PortVitalsError;
pub use health::{Engine, HealthStatus, ProbeResult, Prober, Target};
pub use notification::Notifier;

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
