//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{Config, ConfigLoader, TomlConfigLoader};
use crate::error::Result;
use crate::health::{Engine, ProbeConfig, ProbeResult, Prober, Sentinel, TcpProber, WorkerPool};
use crate::notification::{LogNotifier, Notifier, WebhookNotifier};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// 示例配置文件内容
const SAMPLE_CONFIG: &str = include_str!("../../config.example.toml");

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 按命令行参数加载配置（包含覆盖项）
pub async fn load_config(args: &Args) -> Result<Config> {
    let loader = TomlConfigLoader::new(true);
    loader
        .load_from_file(args.get_config_path(), &args.overrides())
        .await
}

/// 根据配置选择告警发送器，未配置中继时只写日志
pub fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    match config.notifier {
        Some(ref notifier) => {
            info!("使用邮件中继发送告警: {}", notifier.webhook_url);
            Ok(Arc::new(WebhookNotifier::from_config(notifier, &config.email)?))
        }
        None => {
            info!("未配置邮件中继，告警只写入日志");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// 启动命令
pub struct RunCommand;

#[async_trait]
impl Command for RunCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let config = load_config(args).await?;
        let notifier = build_notifier(&config)?;
        let prober: Arc<dyn Prober> = Arc::new(TcpProber::new());
        let mut engine = Engine::new(&config, prober, notifier)?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            let _ = shutdown_tx.send(());
        });

        engine.run(shutdown_rx).await;
        info!("服务已停止");
        Ok(())
    }
}

/// 等待 Ctrl+C，Unix 下同时监听 SIGTERM
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            error!("监听中断信号失败: {}", e);
                        }
                    }
                    _ = sigterm.recv() => {}
                }
                info!("收到停止信号，当前一轮完成后退出...");
                return;
            }
            Err(e) => error!("注册 SIGTERM 处理失败: {}", e),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("收到中断信号，当前一轮完成后退出..."),
        Err(e) => error!("监听中断信号失败: {}", e),
    }
}

/// 一次性检测的输出
#[derive(Debug, Serialize)]
struct CheckReport {
    sentinel: String,
    internet_reachable: bool,
    results: Vec<ProbeResult>,
}

/// 检测命令
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Some(Commands::Check { format }) = &args.command {
            let config = load_config(args).await?;
            let report = self.perform_check(&config).await;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => self.print_text_report(&report),
            }
        }
        Ok(())
    }
}

impl CheckCommand {
    /// 执行一轮探测，不修改状态也不发送告警
    async fn perform_check(&self, config: &Config) -> CheckReport {
        let prober: Arc<dyn Prober> = Arc::new(TcpProber::new());
        let sentinel = Sentinel::from_config(Arc::clone(&prober), &config.sentinel);
        let internet_reachable = sentinel.internet_reachable().await;

        let results = if internet_reachable {
            let pool = WorkerPool::new(prober, config.monitor.max_concurrent_probes);
            let probe = ProbeConfig {
                timeout: config.monitor.probe_timeout(),
                retries: config.monitor.retry_attempts,
            };
            pool.run_round(&config.targets(), probe, Utc::now()).await
        } else {
            Vec::new()
        };

        CheckReport {
            sentinel: sentinel.endpoint(),
            internet_reachable,
            results,
        }
    }

    /// 打印文本格式结果
    fn print_text_report(&self, report: &CheckReport) {
        if !report.internet_reachable {
            println!("✗ 哨兵 {} 不可达，本机网络异常，未检测目标", report.sentinel);
            return;
        }

        println!("✓ 哨兵 {} 可达", report.sentinel);
        for result in &report.results {
            let status_icon = if result.reachable { "✓" } else { "✗" };
            println!(
                "{} {} ({}) - {}",
                status_icon,
                result.target.id,
                result.target.socket_addr(),
                result.status()
            );
        }
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let config_path = args.get_config_path();
        println!("验证配置文件: {}", config_path.display());

        let config = load_config(args).await?;

        println!("✓ 配置文件验证通过");
        println!("  端口: {}", config.monitor.port);
        println!("  轮询间隔: {}秒", config.monitor.poll_interval_seconds);
        println!("  连接尝试次数: {}", config.monitor.retry_attempts);
        println!("  并发数: {}", config.monitor.max_concurrent_probes);
        println!("  告警冷却: {}秒", config.monitor.alert_cooldown_seconds);
        match config.monitor.quiet_hours {
            Some(quiet) => println!("  免打扰时段: {quiet}"),
            None => println!("  免打扰时段: 未配置"),
        }
        println!("  收件人: {}", config.email.to);
        println!(
            "  发送方式: {}",
            if config.notifier.is_some() { "邮件中继" } else { "仅日志" }
        );
        println!("✓ 找到 {} 个目标", config.targets.len());
        for target in config.targets() {
            println!("    {} ({})", target.id, target.socket_addr());
        }

        Ok(())
    }
}

/// 测试通知命令
pub struct TestNotificationCommand;

#[async_trait]
impl Command for TestNotificationCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Some(Commands::TestNotification { message }) = &args.command {
            let config = load_config(args).await?;
            self.send_test_message(&config, message).await?;
        }
        Ok(())
    }
}

impl TestNotificationCommand {
    async fn send_test_message(&self, config: &Config, message: &str) -> Result<()> {
        let notifier = build_notifier(config)?;
        let subject = format!("{} 通知测试", crate::APP_NAME);
        let body = format!(
            "测试时间: {}\n测试消息: {}\n\n这是一条来自 {} 的测试通知，用于验证告警发送是否正常。",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            message,
            crate::APP_NAME
        );

        println!("📤 通过 {} 发送测试消息...", notifier.name());
        match notifier.send(&config.email.to, &subject, &body).await {
            Ok(id) => {
                println!("✅ 测试消息发送成功，消息ID: {id}");
                Ok(())
            }
            Err(e) => {
                println!("❌ 测试消息发送失败: {e}");
                println!("请检查：");
                println!("  1. 中继地址是否正确");
                println!("  2. 网络连接是否正常");
                println!("  3. auth_token 是否有效");
                Err(e.into())
            }
        }
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Some(Commands::Init { config_path, force }) = &args.command {
            self.create_config_file(config_path, *force).await?;
        }
        Ok(())
    }
}

impl InitCommand {
    /// 创建配置文件，文件已存在且未指定 `force` 时不做修改
    async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<bool> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(false);
        }

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(config_path, SAMPLE_CONFIG).await?;

        println!("配置文件已创建: {}", config_path.display());
        println!("请编辑配置文件以添加您的监控目标");

        Ok(true)
    }
}
