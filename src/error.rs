//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Port Vitals 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum PortVitalsError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 探测相关错误
    #[error("探测错误: {0}")]
    Probe(#[from] ProbeError),

    /// 通知相关错误
    #[error("通知错误: {0}")]
    Notification(#[from] NotificationError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },

    /// 告警模板无法编译
    #[error("告警模板无效: {0}")]
    TemplateError(String),
}

/// 单次TCP连接尝试的失败原因
///
/// 只在探测器内部和调试日志中使用，对调用方统一表现为"不可达"。
#[derive(Error, Debug)]
pub enum ProbeError {
    /// 连接超时
    #[error("连接超时: {addr}")]
    Timeout { addr: String },

    /// 连接被拒绝、网络不可达或地址解析失败
    #[error("连接失败: {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// 通知错误类型
#[derive(Error, Debug)]
pub enum NotificationError {
    /// 发送失败
    #[error("通知发送失败: {0}")]
    SendError(String),

    /// 模板渲染错误
    #[error("模板渲染失败: {0}")]
    TemplateError(String),

    /// 配置错误
    #[error("通知配置错误: {0}")]
    ConfigError(String),

    /// 邮件中继拒绝了请求
    #[error("邮件中继拒绝请求: HTTP {status} {body}")]
    Rejected { status: u16, body: String },
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, PortVitalsError>;
