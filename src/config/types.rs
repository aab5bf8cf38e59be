//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use crate::health::Target;
use crate::notification::QuietHours;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 监控参数
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 连通性哨兵
    #[serde(default)]
    pub sentinel: SentinelConfig,
    /// 告警邮件字段
    pub email: EmailConfig,
    /// 邮件中继配置，缺省时只记录日志不真正发送
    pub notifier: Option<NotifierConfig>,
    /// 监控目标：名称 -> 地址
    pub targets: BTreeMap<String, String>,
}

/// 监控参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    /// 所有目标共用的端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 轮询间隔（秒）
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// 单次连接超时（秒）
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
    /// 判定离线前的连接尝试次数
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// 最大并发探测数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_probes: usize,
    /// 同一目标两次告警之间的冷却时间（秒）
    #[serde(default = "default_alert_cooldown")]
    pub alert_cooldown_seconds: u64,
    /// 哨兵不可达时的退避时间（秒）
    #[serde(default = "default_sentinel_backoff")]
    pub sentinel_backoff_seconds: u64,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 免打扰时段
    pub quiet_hours: Option<QuietHours>,
    /// 日志文件路径，配置后日志写入文件而不是控制台
    pub log_file: Option<PathBuf>,
}

/// 哨兵配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentinelConfig {
    /// 哨兵地址
    #[serde(default = "default_sentinel_address")]
    pub address: String,
    /// 哨兵端口
    #[serde(default = "default_sentinel_port")]
    pub port: u16,
    /// 连接超时（秒）
    #[serde(default = "default_probe_timeout")]
    pub timeout_seconds: u64,
}

/// 告警邮件字段
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailConfig {
    /// 发件人
    #[serde(default)]
    pub from: String,
    /// 收件人
    pub to: String,
    /// 邮件主题
    #[serde(default = "default_subject")]
    pub subject: String,
    /// 插入到告警正文中的处理建议
    #[serde(default)]
    pub advice: String,
    /// 自定义正文模板（handlebars）
    pub body_template: Option<String>,
}

/// 邮件中继配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifierConfig {
    /// 中继接口地址
    pub webhook_url: String,
    /// 请求超时（秒）
    #[serde(default = "default_notifier_timeout")]
    pub timeout_seconds: u64,
    /// Bearer token
    pub auth_token: Option<String>,
}

/// 命令行覆盖项
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub processes: Option<usize>,
    pub quiet_hours: Option<QuietHours>,
    pub retry: Option<u32>,
    pub sleep: Option<u64>,
}

impl ConfigOverrides {
    /// 把命令行参数写入配置
    pub fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.monitor.port = port;
        }
        if let Some(processes) = self.processes {
            config.monitor.max_concurrent_probes = processes;
        }
        if let Some(quiet) = self.quiet_hours {
            config.monitor.quiet_hours = Some(quiet);
        }
        if let Some(retry) = self.retry {
            config.monitor.retry_attempts = retry;
        }
        if let Some(sleep) = self.sleep {
            config.monitor.poll_interval_seconds = sleep;
        }
    }

    /// 是否没有任何覆盖
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Config {
    /// 按名称顺序生成目标列表
    pub fn targets(&self) -> Vec<Target> {
        self.targets
            .iter()
            .map(|(name, address)| Target::new(name.clone(), address.clone(), self.monitor.port))
            .collect()
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_seconds)
    }

    pub fn sentinel_backoff(&self) -> Duration {
        Duration::from_secs(self.sentinel_backoff_seconds)
    }
}

impl SentinelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            poll_interval_seconds: default_poll_interval(),
            probe_timeout_seconds: default_probe_timeout(),
            retry_attempts: default_retry_attempts(),
            max_concurrent_probes: default_max_concurrent(),
            alert_cooldown_seconds: default_alert_cooldown(),
            sentinel_backoff_seconds: default_sentinel_backoff(),
            log_level: default_log_level(),
            quiet_hours: None,
            log_file: None,
        }
    }
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            address: default_sentinel_address(),
            port: default_sentinel_port(),
            timeout_seconds: default_probe_timeout(),
        }
    }
}

// 默认值函数
fn default_port() -> u16 {
    9111
}
fn default_poll_interval() -> u64 {
    900
}
fn default_probe_timeout() -> u64 {
    10
}
fn default_retry_attempts() -> u32 {
    5
}
fn default_max_concurrent() -> usize {
    3
}
fn default_alert_cooldown() -> u64 {
    14400 // 4小时
}
fn default_sentinel_backoff() -> u64 {
    3600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_sentinel_address() -> String {
    "8.8.8.8".to_string()
}
fn default_sentinel_port() -> u16 {
    53
}
fn default_subject() -> String {
    "站点离线告警".to_string()
}
fn default_notifier_timeout() -> u64 {
    30
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    let monitor = &config.monitor;

    if monitor.port == 0 {
        return Err("目标端口不能为0".to_string());
    }

    if monitor.poll_interval_seconds == 0 {
        return Err("轮询间隔不能为0".to_string());
    }

    if monitor.probe_timeout_seconds == 0 {
        return Err("连接超时时间不能为0".to_string());
    }

    if monitor.retry_attempts == 0 {
        return Err("重试次数不能为0".to_string());
    }

    if monitor.max_concurrent_probes == 0 {
        return Err("最大并发探测数不能为0".to_string());
    }

    // 冷却时间需要能参与时间戳运算
    let cooldown_fits = i64::try_from(monitor.alert_cooldown_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .is_some();
    if !cooldown_fits {
        return Err(format!(
            "告警冷却时间过大: {}秒",
            monitor.alert_cooldown_seconds
        ));
    }

    if monitor.sentinel_backoff_seconds == 0 {
        return Err("哨兵退避时间不能为0".to_string());
    }

    let valid_log_levels = ["debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&monitor.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            monitor.log_level, valid_log_levels
        ));
    }

    if let Some(quiet) = monitor.quiet_hours {
        if quiet.start > 23 || quiet.stop > 23 {
            return Err(format!(
                "免打扰时段必须在0-23之间: {}-{}",
                quiet.start, quiet.stop
            ));
        }
    }

    if config.sentinel.address.trim().is_empty() || config.sentinel.port == 0 {
        return Err("哨兵地址或端口无效".to_string());
    }

    if config.email.to.trim().is_empty() {
        return Err("必须配置告警收件人".to_string());
    }

    if let Some(ref notifier) = config.notifier {
        if !notifier.webhook_url.starts_with("http://")
            && !notifier.webhook_url.starts_with("https://")
        {
            return Err(format!("邮件中继地址格式无效: {}", notifier.webhook_url));
        }
        if notifier.timeout_seconds == 0 {
            return Err("邮件中继超时时间不能为0".to_string());
        }
    }

    if config.targets.is_empty() {
        return Err("至少需要配置一个监控目标".to_string());
    }

    for (name, address) in &config.targets {
        if name.trim().is_empty() {
            return Err("目标名称不能为空".to_string());
        }
        if address.trim().is_empty() {
            return Err(format!("目标 {} 的地址不能为空", name));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        let mut targets = BTreeMap::new();
        targets.insert("branch".to_string(), "10.0.0.5".to_string());
        Config {
            monitor: MonitorConfig::default(),
            sentinel: SentinelConfig::default(),
            email: EmailConfig {
                from: "monitor@example.com".to_string(),
                to: "ops@example.com".to_string(),
                subject: "offline".to_string(),
                advice: "reboot the router".to_string(),
                body_template: None,
            },
            notifier: None,
            targets,
        }
    }

    #[test]
    fn test_default_values() {
        let monitor = MonitorConfig::default();

        assert_eq!(monitor.port, 9111);
        assert_eq!(monitor.poll_interval_seconds, 900);
        assert_eq!(monitor.probe_timeout_seconds, 10);
        assert_eq!(monitor.retry_attempts, 5);
        assert_eq!(monitor.max_concurrent_probes, 3);
        assert_eq!(monitor.alert_cooldown(), Duration::from_secs(4 * 3600));
        assert_eq!(monitor.sentinel_backoff(), Duration::from_secs(3600));
        assert!(monitor.quiet_hours.is_none());

        let sentinel = SentinelConfig::default();
        assert_eq!(sentinel.address, "8.8.8.8");
        assert_eq!(sentinel.port, 53);
    }

    #[test]
    fn test_config_validation() {
        assert!(validate_config(&create_test_config()).is_ok());
    }

    #[test]
    fn test_config_validation_empty_targets() {
        let mut config = create_test_config();
        config.targets.clear();

        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("至少需要配置一个监控目标"));
    }

    #[test]
    fn test_config_validation_zero_retry() {
        let mut config = create_test_config();
        config.monitor.retry_attempts = 0;

        assert!(validate_config(&config).unwrap_err().contains("重试次数"));
    }

    #[test]
    fn test_config_validation_cooldown_too_large() {
        let mut config = create_test_config();
        config.monitor.alert_cooldown_seconds = u64::MAX;
        assert!(validate_config(&config).unwrap_err().contains("告警冷却时间过大"));

        config.monitor.alert_cooldown_seconds = 10_000_000_000_000_000;
        assert!(validate_config(&config).is_err());

        config.monitor.alert_cooldown_seconds = 365 * 24 * 3600;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_config_validation_quiet_hours_out_of_range() {
        let mut config = create_test_config();
        config.monitor.quiet_hours = Some(QuietHours::new(22, 24));

        assert!(validate_config(&config).unwrap_err().contains("免打扰"));
    }

    #[test]
    fn test_config_validation_invalid_webhook() {
        let mut config = create_test_config();
        config.notifier = Some(NotifierConfig {
            webhook_url: "relay.local/send".to_string(),
            timeout_seconds: 30,
            auth_token: None,
        });

        assert!(validate_config(&config).unwrap_err().contains("邮件中继地址"));
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = create_test_config();
        let overrides = ConfigOverrides {
            port: Some(8080),
            processes: Some(8),
            quiet_hours: Some(QuietHours::new(1, 5)),
            retry: Some(2),
            sleep: Some(60),
        };
        assert!(!overrides.is_empty());

        overrides.apply(&mut config);

        assert_eq!(config.monitor.port, 8080);
        assert_eq!(config.monitor.max_concurrent_probes, 8);
        assert_eq!(config.monitor.quiet_hours, Some(QuietHours::new(1, 5)));
        assert_eq!(config.monitor.retry_attempts, 2);
        assert_eq!(config.monitor.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.targets()[0].port, 8080);
    }

    #[test]
    fn test_targets_share_port() {
        let mut config = create_test_config();
        config
            .targets
            .insert("airport".to_string(), "10.0.0.9".to_string());

        let targets = config.targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id, "airport");
        assert_eq!(targets[1].address, "10.0.0.5");
        assert!(targets.iter().all(|t| t.port == 9111));
    }
}
