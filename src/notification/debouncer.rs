//! 告警去抖
//!
//! 根据目标状态、免打扰时段和冷却时间决定是否发送告警

use crate::status::TargetState;
use chrono::{DateTime, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 免打扰时段，起止均为0-23的整点，两端包含
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: u8,
    pub stop: u8,
}

impl QuietHours {
    pub fn new(start: u8, stop: u8) -> Self {
        Self { start, stop }
    }

    /// 给定小时是否处于时段内，`start > stop` 表示跨越午夜
    pub fn contains(&self, hour: u32) -> bool {
        let (start, stop) = (u32::from(self.start), u32::from(self.stop));
        if start > stop {
            hour >= start || hour <= stop
        } else {
            hour >= start && hour <= stop
        }
    }
}

impl std::fmt::Display for QuietHours {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:00-{:02}:59", self.start, self.stop)
    }
}

/// 未配置免打扰时段时永远返回 `false`
pub fn in_quiet_hours(quiet: Option<QuietHours>, hour: u32) -> bool {
    quiet.is_some_and(|q| q.contains(hour))
}

/// 告警判定的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// 目标在线
    TargetUp,
    /// 处于免打扰时段
    QuietHours,
    /// 距上次告警未满冷却时间
    Cooldown { remaining: Duration },
    /// 可以发送
    Eligible,
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionReason::TargetUp => write!(f, "目标在线"),
            DecisionReason::QuietHours => write!(f, "免打扰时段"),
            DecisionReason::Cooldown { remaining } => {
                write!(f, "冷却中，剩余{}秒", remaining.as_secs())
            }
            DecisionReason::Eligible => write!(f, "满足告警条件"),
        }
    }
}

/// 单个目标的告警判定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDecision {
    pub target_id: String,
    pub should_notify: bool,
    pub reason: DecisionReason,
}

/// 告警去抖器
#[derive(Debug, Clone)]
pub struct AlertDebouncer {
    quiet_hours: Option<QuietHours>,
    cooldown: Duration,
}

impl AlertDebouncer {
    pub fn new(quiet_hours: Option<QuietHours>, cooldown: Duration) -> Self {
        Self {
            quiet_hours,
            cooldown,
        }
    }

    pub fn quiet_hours(&self) -> Option<QuietHours> {
        self.quiet_hours
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// 判定是否发送告警，免打扰时段按 `now` 的本地时间计算
    pub fn decide(&self, state: &TargetState, now: DateTime<Utc>) -> AlertDecision {
        let hour = now.with_timezone(&Local).hour();
        self.decide_at_hour(state, now, hour)
    }

    /// 与 [`decide`](Self::decide) 相同，但由调用方给出本地小时
    pub fn decide_at_hour(&self, state: &TargetState, now: DateTime<Utc>, hour: u32) -> AlertDecision {
        let reason = self.reason(state, now, hour);
        AlertDecision {
            target_id: state.target.id.clone(),
            should_notify: reason == DecisionReason::Eligible,
            reason,
        }
    }

    fn reason(&self, state: &TargetState, now: DateTime<Utc>, hour: u32) -> DecisionReason {
        if !state.is_down() {
            return DecisionReason::TargetUp;
        }

        if in_quiet_hours(self.quiet_hours, hour) {
            return DecisionReason::QuietHours;
        }

        if let Some(last) = state.last_alerted_at {
            // 时钟回拨时 elapsed 为负，同样视为冷却中
            let elapsed = now.signed_duration_since(last);
            let cooldown = chrono::Duration::from_std(self.cooldown)
                .unwrap_or(chrono::Duration::MAX);
            if elapsed < cooldown {
                let remaining = cooldown
                    .checked_sub(&elapsed)
                    .and_then(|remaining| remaining.to_std().ok())
                    .unwrap_or(self.cooldown);
                return DecisionReason::Cooldown { remaining };
            }
        }

        DecisionReason::Eligible
    }
}
