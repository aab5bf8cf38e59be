//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use crate::config::{ConfigOverrides, MonitorConfig};
use crate::logging::{parse_level, LogConfig};
use crate::notification::QuietHours;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Port Vitals - TCP端口可达性监控与告警工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "port-vitals",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "PORT_VITALS_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，未指定时使用配置文件中的 log_level
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "PORT_VITALS_LOG_LEVEL"
    )]
    pub log_level: Option<LogLevel>,

    /// 输出JSON格式日志
    #[arg(long, help = "输出JSON格式日志")]
    pub json_logs: bool,

    /// 日志文件路径，指定后不再输出到控制台
    #[arg(
        long,
        value_name = "FILE",
        help = "日志文件路径",
        env = "PORT_VITALS_LOG_FILE"
    )]
    pub log_file: Option<PathBuf>,

    /// 目标端口
    #[arg(short, long, value_name = "PORT", help = "目标端口")]
    pub port: Option<u16>,

    /// 并发探测数
    #[arg(long, value_name = "COUNT", help = "并发探测数")]
    pub processes: Option<usize>,

    /// 免打扰时段（小时，0-23）
    #[arg(
        long,
        num_args = 2,
        value_names = ["START", "END"],
        help = "免打扰时段，例如 --quiet 22 5"
    )]
    pub quiet: Option<Vec<u8>>,

    /// 每个目标的连接尝试次数
    #[arg(short, long, value_name = "COUNT", help = "连接尝试次数")]
    pub retry: Option<u32>,

    /// 轮询间隔（秒）
    #[arg(
        short,
        long,
        value_name = "SECONDS",
        help = "轮询间隔（秒）",
        env = "PORT_VITALS_INTERVAL"
    )]
    pub sleep: Option<u64>,

    /// 子命令，默认为 run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum LogLevel {
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// 启动监控，直到收到 Ctrl+C 或 SIGTERM
    Run,

    /// 执行一次性检测，不发送告警
    Check {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 验证配置文件
    Validate,

    /// 通过已配置的发送器发送一条测试消息
    TestNotification {
        /// 测试消息内容
        #[arg(
            short,
            long,
            value_name = "MESSAGE",
            default_value = "这是一条测试消息",
            help = "测试消息内容"
        )]
        message: String,
    },

    /// 生成示例配置文件
    Init {
        /// 配置文件路径
        #[arg(
            value_name = "FILE",
            help = "配置文件路径",
            default_value = "config.toml"
        )]
        config_path: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

impl Args {
    /// 解析命令行参数
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// 实际要执行的子命令
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }

    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::get_default_config_path)
    }

    /// 生成日志配置，命令行参数优先于配置文件中的 `monitor` 设置
    pub fn log_config(&self, monitor: Option<&MonitorConfig>) -> LogConfig {
        let level = match (self.log_level, monitor) {
            (Some(level), _) => level.into(),
            (None, Some(monitor)) => parse_level(&monitor.log_level),
            (None, None) => log::LevelFilter::Info,
        };
        let file_path = self
            .log_file
            .clone()
            .or_else(|| monitor.and_then(|m| m.log_file.clone()));

        LogConfig {
            level,
            console: file_path.is_none(),
            file_path,
            json_format: self.json_logs,
            ..Default::default()
        }
    }

    /// 收集命令行中的配置覆盖项
    pub fn overrides(&self) -> ConfigOverrides {
        let quiet_hours = self.quiet.as_deref().and_then(|hours| match hours {
            [start, stop] => Some(QuietHours::new(*start, *stop)),
            _ => None,
        });

        ConfigOverrides {
            port: self.port,
            processes: self.processes,
            quiet_hours,
            retry: self.retry,
            sleep: self.sleep,
        }
    }
}
