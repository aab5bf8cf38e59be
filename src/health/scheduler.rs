//! 监控引擎与调度循环
//!
//! 每轮依次执行：哨兵检查 -> 并发探测 -> 汇总状态 -> 告警判定与发送 -> 休眠。
//! 只有探测阶段是并发的，状态修改和告警发送都在引擎自身中串行完成。

use crate::config::Config;
use crate::error::Result;
use crate::health::{ProbeConfig, Prober, Sentinel, Target, WorkerPool};
use crate::logging::{log_notification, log_round_summary};
use crate::notification::{AlertContext, AlertDebouncer, AlertTemplate, DecisionReason, Notifier};
use crate::status::{StateStore, TargetState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 引擎所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    SentinelCheck,
    SkipRound,
    Scanning,
    Aggregating,
    Alerting,
    Sleeping,
}

/// 一轮检测的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoundSummary {
    /// 轮次ID
    pub round_id: Uuid,
    /// 探测目标数
    pub probed: usize,
    /// 在线数
    pub up: usize,
    /// 离线数
    pub down: usize,
    /// 本轮恢复的目标数
    pub recovered: usize,
    /// 成功发出的告警数
    pub alerted: usize,
    /// 因免打扰时段未发送的告警数
    pub quiet_suppressed: usize,
    /// 因冷却时间未发送的告警数
    pub cooldown_suppressed: usize,
    /// 发送失败数
    pub notify_failures: usize,
}

/// 一轮检测的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// 哨兵不可达，本轮跳过
    Skipped,
    /// 本轮已完成
    Completed(RoundSummary),
}

/// 引擎运行参数
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// 正常轮询间隔
    pub poll_interval: Duration,
    /// 哨兵不可达时的退避间隔
    pub sentinel_backoff: Duration,
    /// 探测参数
    pub probe: ProbeConfig,
    /// 收件人
    pub recipient: String,
    /// 邮件主题
    pub subject: String,
    /// 处理建议
    pub advice: String,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.monitor.poll_interval(),
            sentinel_backoff: config.monitor.sentinel_backoff(),
            probe: ProbeConfig {
                timeout: config.monitor.probe_timeout(),
                retries: config.monitor.retry_attempts,
            },
            recipient: config.email.to.clone(),
            subject: config.email.subject.clone(),
            advice: config.email.advice.clone(),
        }
    }

    /// 根据本轮结果决定下次休眠时长
    pub fn delay_after(&self, outcome: &RoundOutcome) -> Duration {
        match outcome {
            RoundOutcome::Skipped => self.sentinel_backoff,
            RoundOutcome::Completed(_) => self.poll_interval,
        }
    }
}

/// 监控引擎
pub struct Engine {
    settings: EngineSettings,
    targets: Vec<Target>,
    pool: WorkerPool,
    sentinel: Sentinel,
    store: StateStore,
    debouncer: AlertDebouncer,
    template: AlertTemplate,
    notifier: Arc<dyn Notifier>,
    phase: EnginePhase,
}

impl Engine {
    /// 创建监控引擎
    ///
    /// # 参数
    /// * `config` - 已验证的配置
    /// * `prober` - 目标和哨兵共用的探测器
    /// * `notifier` - 告警发送器
    pub fn new(config: &Config, prober: Arc<dyn Prober>, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let template = match config.email.body_template {
            Some(ref template) => AlertTemplate::new(template)?,
            None => AlertTemplate::with_default()?,
        };

        let targets = config.targets();
        let store = StateStore::new(&targets);

        Ok(Self {
            settings: EngineSettings::from_config(config),
            pool: WorkerPool::new(Arc::clone(&prober), config.monitor.max_concurrent_probes),
            sentinel: Sentinel::from_config(prober, &config.sentinel),
            debouncer: AlertDebouncer::new(
                config.monitor.quiet_hours,
                config.monitor.alert_cooldown(),
            ),
            targets,
            store,
            template,
            notifier,
            phase: EnginePhase::Idle,
        })
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn enter(&mut self, phase: EnginePhase) {
        debug!("引擎阶段: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// 执行一轮完整检测
    ///
    /// `now` 同时作为本轮探测结果的观测时间和告警判定时间。
    pub async fn run_round(&mut self, now: DateTime<Utc>) -> RoundOutcome {
        self.enter(EnginePhase::SentinelCheck);
        if !self.sentinel.internet_reachable().await {
            self.enter(EnginePhase::SkipRound);
            error!(
                "哨兵 {} 不可达，请检查本机网络。跳过本轮，{}秒后重试",
                self.sentinel.endpoint(),
                self.settings.sentinel_backoff.as_secs()
            );
            return RoundOutcome::Skipped;
        }

        let mut summary = RoundSummary {
            round_id: Uuid::new_v4(),
            probed: self.targets.len(),
            ..Default::default()
        };

        self.enter(EnginePhase::Scanning);
        info!("开始扫描，目标数量: {}", self.targets.len());
        let results = self
            .pool
            .run_round(&self.targets, self.settings.probe, now)
            .await;

        self.enter(EnginePhase::Aggregating);
        let previously_down: HashSet<String> = self
            .store
            .states()
            .iter()
            .filter(|s| s.is_down())
            .map(|s| s.target.id.clone())
            .collect();
        let updated = self.store.apply(&results);

        self.enter(EnginePhase::Alerting);
        for state in &updated {
            if !state.is_down() {
                summary.up += 1;
                if previously_down.contains(&state.target.id) {
                    summary.recovered += 1;
                }
                continue;
            }

            summary.down += 1;
            let decision = self.debouncer.decide(state, now);
            match decision.reason {
                DecisionReason::Eligible => {
                    if self.dispatch(state, now).await {
                        summary.alerted += 1;
                    } else {
                        summary.notify_failures += 1;
                    }
                }
                DecisionReason::QuietHours => {
                    summary.quiet_suppressed += 1;
                    warn!("{} 离线，但处于免打扰时段", state.target.display_name());
                }
                DecisionReason::Cooldown { .. } => {
                    summary.cooldown_suppressed += 1;
                    debug!("{} 离线，{}", state.target.display_name(), decision.reason);
                }
                DecisionReason::TargetUp => {}
            }
        }

        log_round_summary(&summary);
        RoundOutcome::Completed(summary)
    }

    /// 发送单个目标的告警，成功后记录告警时间
    async fn dispatch(&mut self, state: &TargetState, now: DateTime<Utc>) -> bool {
        let context = AlertContext::from_state(state, &self.settings.advice);
        let body = match self.template.render(&context) {
            Ok(body) => body,
            Err(e) => {
                error!("渲染告警正文失败 {}: {}", state.target.id, e);
                return false;
            }
        };

        match self
            .notifier
            .send(&self.settings.recipient, &self.settings.subject, &body)
            .await
        {
            Ok(message_id) => {
                self.store.mark_alerted(&state.target.id, now);
                log_notification(
                    self.notifier.name(),
                    &state.target.id,
                    &self.settings.recipient,
                    Some(&message_id),
                    None,
                );
                warn!("{} 离线，告警已发送", state.target.display_name());
                true
            }
            Err(e) => {
                // 不记录告警时间，下一轮满足条件时重试
                log_notification(
                    self.notifier.name(),
                    &state.target.id,
                    &self.settings.recipient,
                    None,
                    Some(&e.to_string()),
                );
                false
            }
        }
    }

    /// 持续运行直到收到关闭信号
    ///
    /// 关闭信号只在两轮之间生效：已开始的一轮会完整执行，之后不再发起新的一轮。
    /// 发送端被丢弃同样视为关闭。
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "监控引擎启动，目标数量: {}，轮询间隔: {}秒",
            self.targets.len(),
            self.settings.poll_interval.as_secs()
        );

        loop {
            if shutdown_requested(&mut shutdown) {
                info!("收到关闭信号，停止发起新一轮检测");
                break;
            }

            let outcome = self.run_round(Utc::now()).await;
            let delay = self.settings.delay_after(&outcome);

            self.enter(EnginePhase::Sleeping);
            debug!("休眠 {} 秒", delay.as_secs());
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("收到关闭信号，停止发起新一轮检测");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    self.enter(EnginePhase::Idle);
                }
            }
        }

        self.enter(EnginePhase::Idle);
        info!("监控引擎已停止");
    }
}

fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    !matches!(shutdown.try_recv(), Err(TryRecvError::Empty))
}
