//! 监控引擎端到端场景测试
//!
//! 使用脚本化的探测器和记录型发送器驱动完整的检测轮次

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone, Utc};
use port_vitals::config::{Config, ConfigLoader, ConfigOverrides, TomlConfigLoader};
use port_vitals::error::{NotificationError, ProbeError};
use port_vitals::health::{Engine, HealthStatus, Prober, RoundOutcome, RoundSummary};
use port_vitals::notification::Notifier;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SENTINEL: &str = "sentinel.test";

/// 按地址返回预设结果的探测器，同时统计每个地址的连接尝试次数
#[derive(Default)]
struct ScriptedProber {
    sentinel_down: AtomicBool,
    reachable: Mutex<HashMap<String, bool>>,
    attempts: Mutex<HashMap<String, usize>>,
}

impl ScriptedProber {
    fn set(&self, address: &str, up: bool) {
        self.reachable.lock().unwrap().insert(address.to_string(), up);
    }

    fn set_sentinel(&self, up: bool) {
        self.sentinel_down.store(!up, Ordering::SeqCst);
    }

    fn attempts(&self, address: &str) -> usize {
        self.attempts.lock().unwrap().get(address).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn attempt(&self, address: &str, port: u16, _: Duration) -> Result<(), ProbeError> {
        let up = if address == SENTINEL {
            !self.sentinel_down.load(Ordering::SeqCst)
        } else {
            *self.attempts.lock().unwrap().entry(address.to_string()).or_insert(0) += 1;
            self.reachable.lock().unwrap().get(address).copied().unwrap_or(true)
        };

        if up {
            Ok(())
        } else {
            Err(ProbeError::Timeout {
                addr: format!("{address}:{port}"),
            })
        }
    }
}

#[derive(Debug, Clone)]
struct SentMessage {
    recipient: String,
    subject: String,
    body: String,
}

/// 记录所有发送请求；正文包含 `fail_on` 时返回错误
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    fail_on: Mutex<Option<String>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    fn fail_on(&self, needle: Option<&str>) {
        *self.fail_on.lock().unwrap() = needle.map(str::to_string);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, NotificationError> {
        if let Some(ref needle) = *self.fail_on.lock().unwrap() {
            if body.contains(needle.as_str()) {
                return Err(NotificationError::SendError("relay unavailable".to_string()));
            }
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(SentMessage {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(format!("msg-{}", sent.len()))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

async fn load_config(quiet_hours: Option<&str>, targets: &[(&str, &str)]) -> Config {
    let mut content = format!(
        r#"
[monitor]
port = 9111
retry_attempts = 5
{}

[sentinel]
address = "{SENTINEL}"

[email]
from = "monitor@example.com"
to = "ops@example.com"
subject = "Site offline"
advice = "Check the site router first."

[targets]
"#,
        quiet_hours.unwrap_or("")
    );
    for (name, address) in targets {
        content.push_str(&format!("{name} = \"{address}\"\n"));
    }

    TomlConfigLoader::new(false)
        .load_from_string(&content, &ConfigOverrides::default())
        .await
        .unwrap()
}

struct Harness {
    engine: Engine,
    prober: Arc<ScriptedProber>,
    notifier: Arc<RecordingNotifier>,
}

async fn harness(quiet_hours: Option<&str>, targets: &[(&str, &str)]) -> Harness {
    let config = load_config(quiet_hours, targets).await;
    let prober = Arc::new(ScriptedProber::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = Engine::new(&config, prober.clone(), notifier.clone()).unwrap();
    Harness {
        engine,
        prober,
        notifier,
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap()
}

fn completed(outcome: RoundOutcome) -> RoundSummary {
    match outcome {
        RoundOutcome::Completed(summary) => summary,
        RoundOutcome::Skipped => panic!("round was skipped"),
    }
}

#[tokio::test]
async fn scenario_a_first_failure_alerts_once() {
    let mut h = harness(None, &[("branch", "10.0.0.5")]).await;
    h.prober.set("10.0.0.5", false);

    let summary = completed(h.engine.run_round(t0()).await);

    assert_eq!(h.prober.attempts("10.0.0.5"), 5);
    assert_eq!(summary.down, 1);
    assert_eq!(summary.alerted, 1);

    let state = h.engine.store().get("branch").unwrap();
    assert_eq!(state.status, HealthStatus::Down);
    assert_eq!(state.down_since, Some(t0()));
    assert_eq!(state.last_alerted_at, Some(t0()));

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "ops@example.com");
    assert_eq!(sent[0].subject, "Site offline");
    assert!(sent[0].body.contains("Branch"));
    assert!(sent[0].body.contains("10.0.0.5:9111"));
    assert!(sent[0].body.contains("Check the site router first."));
}

#[tokio::test]
async fn scenario_b_repeat_failure_within_cooldown_is_silent() {
    let mut h = harness(None, &[("branch", "10.0.0.5")]).await;
    h.prober.set("10.0.0.5", false);

    h.engine.run_round(t0()).await;
    let summary = completed(h.engine.run_round(t0() + ChronoDuration::seconds(600)).await);

    assert_eq!(summary.cooldown_suppressed, 1);
    assert_eq!(summary.alerted, 0);
    assert_eq!(h.notifier.sent().len(), 1);

    let state = h.engine.store().get("branch").unwrap();
    assert_eq!(state.status, HealthStatus::Down);
    assert_eq!(state.down_since, Some(t0()));
    assert_eq!(state.last_alerted_at, Some(t0()));
}

#[tokio::test]
async fn cooldown_expiry_re_alerts_with_latched_down_since() {
    let mut h = harness(None, &[("branch", "10.0.0.5")]).await;
    h.prober.set("10.0.0.5", false);

    h.engine.run_round(t0()).await;
    let later = t0() + ChronoDuration::hours(4);
    let summary = completed(h.engine.run_round(later).await);

    assert_eq!(summary.alerted, 1);
    assert_eq!(h.notifier.sent().len(), 2);

    let state = h.engine.store().get("branch").unwrap();
    assert_eq!(state.down_since, Some(t0()));
    assert_eq!(state.last_alerted_at, Some(later));
}

#[tokio::test]
async fn scenario_c_quiet_hours_suppress_notification() {
    let mut h = harness(
        Some("quiet_hours = { start = 22, stop = 5 }"),
        &[("branch", "10.0.0.5")],
    )
    .await;
    h.prober.set("10.0.0.5", false);

    let now = Local
        .with_ymd_and_hms(2024, 3, 4, 23, 0, 0)
        .earliest()
        .unwrap()
        .with_timezone(&Utc);
    let summary = completed(h.engine.run_round(now).await);

    assert_eq!(summary.quiet_suppressed, 1);
    assert!(h.notifier.sent().is_empty());

    let state = h.engine.store().get("branch").unwrap();
    assert_eq!(state.status, HealthStatus::Down);
    assert_eq!(state.down_since, Some(now));
    assert_eq!(state.last_alerted_at, None);
}

#[tokio::test]
async fn scenario_d_recovery_clears_state_and_next_failure_alerts_immediately() {
    let mut h = harness(None, &[("branch", "10.0.0.5")]).await;
    h.prober.set("10.0.0.5", false);
    h.engine.run_round(t0()).await;

    h.prober.set("10.0.0.5", true);
    let t1 = t0() + ChronoDuration::seconds(900);
    let summary = completed(h.engine.run_round(t1).await);
    assert_eq!(summary.recovered, 1);

    let state = h.engine.store().get("branch").unwrap();
    assert_eq!(state.status, HealthStatus::Up);
    assert_eq!(state.down_since, None);
    assert_eq!(state.last_alerted_at, None);

    h.prober.set("10.0.0.5", false);
    let t2 = t1 + ChronoDuration::seconds(900);
    let summary = completed(h.engine.run_round(t2).await);

    assert_eq!(summary.alerted, 1);
    assert_eq!(h.notifier.sent().len(), 2);
    let state = h.engine.store().get("branch").unwrap();
    assert_eq!(state.down_since, Some(t2));
    assert_eq!(state.last_alerted_at, Some(t2));
}

#[tokio::test]
async fn sentinel_loss_skips_round_without_side_effects() {
    let mut h = harness(None, &[("branch", "10.0.0.5"), ("depot", "10.0.0.6")]).await;
    h.prober.set("10.0.0.5", false);
    h.engine.run_round(t0()).await;
    let before: Vec<_> = h.engine.store().states().to_vec();

    h.prober.set_sentinel(false);
    h.prober.set("10.0.0.5", true);
    h.prober.set("10.0.0.6", false);
    let outcome = h.engine.run_round(t0() + ChronoDuration::hours(5)).await;

    assert_eq!(outcome, RoundOutcome::Skipped);
    assert_eq!(h.engine.store().states(), before.as_slice());
    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.prober.attempts("10.0.0.6"), 1);
    assert_eq!(
        h.engine.settings().delay_after(&outcome),
        Duration::from_secs(3600)
    );
}

#[tokio::test]
async fn notify_failure_leaves_target_eligible_and_does_not_block_others() {
    let mut h = harness(None, &[("branch", "10.0.0.5"), ("depot", "10.0.0.6")]).await;
    h.prober.set("10.0.0.5", false);
    h.prober.set("10.0.0.6", false);
    h.notifier.fail_on(Some("Branch"));

    let summary = completed(h.engine.run_round(t0()).await);

    assert_eq!(summary.down, 2);
    assert_eq!(summary.alerted, 1);
    assert_eq!(summary.notify_failures, 1);
    assert_eq!(h.engine.store().get("branch").unwrap().last_alerted_at, None);
    assert_eq!(
        h.engine.store().get("depot").unwrap().last_alerted_at,
        Some(t0())
    );

    // 下一轮发送恢复后立即重试
    h.notifier.fail_on(None);
    let retry_at = t0() + ChronoDuration::seconds(900);
    let summary = completed(h.engine.run_round(retry_at).await);

    assert_eq!(summary.alerted, 1);
    assert_eq!(summary.cooldown_suppressed, 1);
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].body.contains("Branch"));
    assert_eq!(
        h.engine.store().get("branch").unwrap().last_alerted_at,
        Some(retry_at)
    );
}
