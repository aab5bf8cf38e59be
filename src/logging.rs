//! 日志系统模块
//!
//! 提供结构化日志配置和管理功能

use crate::health::RoundSummary;
use log::LevelFilter;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer};

/// 全局日志初始化状态
#[derive(Debug, Default)]
struct GlobalLoggingState {
    /// 是否已初始化
    initialized: bool,
    /// 当前配置
    current_config: Option<LogConfig>,
}

/// 全局日志状态管理器
static GLOBAL_LOGGING_STATE: OnceLock<Mutex<GlobalLoggingState>> = OnceLock::new();

fn state() -> MutexGuard<'static, GlobalLoggingState> {
    GLOBAL_LOGGING_STATE
        .get_or_init(|| Mutex::new(GlobalLoggingState::default()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 日志配置结构
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 日志文件路径（可选）
    pub file_path: Option<PathBuf>,
    /// 是否输出到控制台
    pub console: bool,
    /// 是否使用JSON格式
    pub json_format: bool,
    /// 模块级别日志控制
    pub module_levels: HashMap<String, LevelFilter>,
}

impl Default for LogConfig {
    fn default() -> Self {
        let mut module_levels = HashMap::new();
        // 依赖库的连接日志过于频繁
        module_levels.insert("hyper_util".to_string(), LevelFilter::Warn);
        module_levels.insert("reqwest".to_string(), LevelFilter::Warn);

        Self {
            level: LevelFilter::Info,
            file_path: None,
            console: true,
            json_format: false,
            module_levels,
        }
    }
}

/// 日志系统管理器
#[derive(Debug)]
pub struct LoggingSystem {
    /// 配置
    config: LogConfig,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// 进程内只会真正初始化一次，重复调用直接返回新的句柄。
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        Self::setup_logging_with_options(config, false)
    }

    /// 初始化日志系统（带选项）
    ///
    /// # 参数
    /// * `config` - 日志配置
    /// * `force_reinit` - 是否强制重新初始化（主要用于测试）
    pub fn setup_logging_with_options(
        config: LogConfig,
        force_reinit: bool,
    ) -> anyhow::Result<Self> {
        {
            let state = state();
            if state.initialized && !force_reinit {
                return Ok(Self { config });
            }
        }

        Self::perform_initialization(&config)?;

        {
            let mut state = state();
            state.initialized = true;
            state.current_config = Some(config.clone());
        }

        Ok(Self { config })
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// 执行实际的日志系统初始化
    fn perform_initialization(config: &LogConfig) -> anyhow::Result<()> {
        // log crate 到 tracing 的桥接
        Self::init_log_tracer()?;
        Self::init_tracing_subscriber(config)
    }

    /// 初始化 LogTracer
    fn init_log_tracer() -> anyhow::Result<()> {
        use tracing_log::LogTracer;

        static LOG_TRACER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

        LOG_TRACER_INIT
            .get_or_init(|| LogTracer::init().map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| anyhow::anyhow!("LogTracer初始化失败: {}", e))?;
        Ok(())
    }

    /// 构建过滤器，`RUST_LOG` 优先生效
    fn build_filter(config: &LogConfig) -> EnvFilter {
        let mut env_filter =
            EnvFilter::from_default_env().add_directive(Self::convert_level_to_directive(config.level));

        for (module, level) in &config.module_levels {
            match format!("{}={}", module, Self::level_to_string(*level)).parse::<Directive>() {
                Ok(directive) => env_filter = env_filter.add_directive(directive),
                Err(e) => eprintln!("忽略无效的日志过滤规则 {}: {}", module, e),
            }
        }

        env_filter
    }

    /// 初始化 tracing subscriber
    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<()> {
        let env_filter = Self::build_filter(config);

        let result = match (&config.file_path, config.console) {
            (Some(file_path), false) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(file_path)
                    .map_err(|e| anyhow::anyhow!("创建日志文件失败: {}", e))?;
                let file_layer = if config.json_format {
                    fmt::layer()
                        .json()
                        .with_writer(file)
                        .with_timer(fmt::time::ChronoLocal::rfc_3339())
                        .boxed()
                } else {
                    fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_timer(fmt::time::ChronoLocal::rfc_3339())
                        .boxed()
                };
                registry().with(env_filter).with(file_layer).try_init()
            }
            _ => {
                let fmt_layer = if config.json_format {
                    fmt::layer()
                        .json()
                        .with_timer(fmt::time::ChronoLocal::rfc_3339())
                        .boxed()
                } else {
                    fmt::layer()
                        .with_timer(fmt::time::ChronoLocal::rfc_3339())
                        .with_target(false)
                        .boxed()
                };
                registry().with(env_filter).with(fmt_layer).try_init()
            }
        };

        match result {
            Ok(()) => {
                tracing::debug!("日志配置: {:?}", config);
                Ok(())
            }
            Err(e) => {
                let error_msg = e.to_string();
                if error_msg.contains(
                    "attempted to set a logger after the logging system was already initialized",
                ) || error_msg.contains("a global default trace dispatcher has already been set")
                {
                    // LogTracer 已由上面单独初始化，或测试中多次初始化
                    tracing::debug!("日志系统已经初始化过了");
                    Ok(())
                } else {
                    Err(anyhow::anyhow!("tracing subscriber初始化失败: {}", error_msg))
                }
            }
        }
    }

    /// 将 log::LevelFilter 转换为 tracing 的指令
    fn convert_level_to_directive(level: LevelFilter) -> Directive {
        use tracing_subscriber::filter::LevelFilter as TracingLevel;
        match level {
            LevelFilter::Off => TracingLevel::OFF.into(),
            LevelFilter::Error => TracingLevel::ERROR.into(),
            LevelFilter::Warn => TracingLevel::WARN.into(),
            LevelFilter::Info => TracingLevel::INFO.into(),
            LevelFilter::Debug => TracingLevel::DEBUG.into(),
            LevelFilter::Trace => TracingLevel::TRACE.into(),
        }
    }

    /// 将 log::LevelFilter 转换为字符串
    fn level_to_string(level: LevelFilter) -> &'static str {
        match level {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        }
    }

    /// 检查日志系统是否已初始化
    pub fn is_initialized() -> bool {
        state().initialized
    }

    /// 获取当前日志配置（如果已初始化）
    pub fn current_config() -> Option<LogConfig> {
        state().current_config.clone()
    }

    /// 重置日志系统状态（主要用于测试）
    #[cfg(test)]
    pub fn reset_for_testing() {
        let mut state = state();
        state.initialized = false;
        state.current_config = None;
    }
}

/// 解析配置文件中的日志级别
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// 记录一轮检测的汇总
pub fn log_round_summary(summary: &RoundSummary) {
    tracing::info!(
        round_id = %summary.round_id,
        probed = summary.probed,
        up = summary.up,
        down = summary.down,
        recovered = summary.recovered,
        alerted = summary.alerted,
        quiet_suppressed = summary.quiet_suppressed,
        cooldown_suppressed = summary.cooldown_suppressed,
        notify_failures = summary.notify_failures,
        "扫描完成: {}/{} 在线，{} 离线，发出告警 {}",
        summary.up,
        summary.probed,
        summary.down,
        summary.alerted
    );
}

/// 记录告警发送结果，失败时使用 error 级别
pub fn log_notification(
    notifier: &str,
    target: &str,
    recipient: &str,
    message_id: Option<&str>,
    error: Option<&str>,
) {
    match error {
        None => tracing::info!(
            notifier,
            target_id = target,
            recipient,
            message_id = message_id.unwrap_or(""),
            "NOTIFICATION: {} -> {} SUCCESS",
            target,
            recipient
        ),
        Some(error) => tracing::error!(
            notifier,
            target_id = target,
            recipient,
            "NOTIFICATION: {} -> {} FAILED {}",
            target,
            recipient,
            error
        ),
    }
}
