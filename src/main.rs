//! Port Vitals 主程序入口
//!
//! TCP端口可达性监控与告警工具

use anyhow::{Context, Result};
use clap::Parser;
use port_vitals::cli::args::{Args, Commands};
use port_vitals::cli::commands::{
    CheckCommand, Command, InitCommand, RunCommand, TestNotificationCommand, ValidateCommand,
};
use port_vitals::config::{ConfigLoader, MonitorConfig, TomlConfigLoader};
use port_vitals::logging::LoggingSystem;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统
    let log_config = args.log_config(configured_monitor(&args).await.as_ref());

    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("Port Vitals v{} 启动", port_vitals::VERSION);

    // 执行命令
    if let Err(e) = execute_command(&args).await {
        error!("命令执行失败: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 读取配置文件中的监控参数，用于日志设置；读取失败时交给具体命令报告
async fn configured_monitor(args: &Args) -> Option<MonitorConfig> {
    if matches!(args.command(), Commands::Init { .. }) {
        return None;
    }

    TomlConfigLoader::new(true)
        .load_from_file(args.get_config_path(), &args.overrides())
        .await
        .map(|config| config.monitor)
        .ok()
}

/// 执行CLI命令
async fn execute_command(args: &Args) -> Result<()> {
    let command: Box<dyn Command> = match args.command() {
        Commands::Run => Box::new(RunCommand),
        Commands::Check { .. } => Box::new(CheckCommand),
        Commands::Validate => Box::new(ValidateCommand),
        Commands::TestNotification { .. } => Box::new(TestNotificationCommand),
        Commands::Init { .. } => Box::new(InitCommand),
    };

    command.execute(args).await.with_context(|| {
        format!(
            "配置文件: {}\n提示：可运行 'port-vitals init' 生成示例配置",
            args.get_config_path().display()
        )
    })
}
