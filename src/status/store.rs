//! 目标状态存储
//!
//! 保存每个目标的在线状态与告警记录，只由引擎在汇总阶段修改

use crate::health::{HealthStatus, ProbeResult, Target};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

/// 单个目标的状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetState {
    /// 对应的目标
    pub target: Target,
    /// 当前状态
    pub status: HealthStatus,
    /// 首次观测到离线的时间，离线期间保持不变
    pub down_since: Option<DateTime<Utc>>,
    /// 最近一次成功发出告警的时间
    pub last_alerted_at: Option<DateTime<Utc>>,
}

/// 一次结果应用引起的状态迁移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// 保持在线
    StillUp,
    /// 在线 -> 离线
    WentDown,
    /// 持续离线
    StillDown,
    /// 离线 -> 在线
    Recovered,
}

impl TargetState {
    /// 新目标默认视为在线
    pub fn new(target: Target) -> Self {
        Self {
            target,
            status: HealthStatus::Up,
            down_since: None,
            last_alerted_at: None,
        }
    }

    /// 记录一次成功探测
    pub fn record_success(&mut self) -> Transition {
        let transition = match self.status {
            HealthStatus::Up => Transition::StillUp,
            HealthStatus::Down => Transition::Recovered,
        };
        self.status = HealthStatus::Up;
        self.down_since = None;
        self.last_alerted_at = None;
        transition
    }

    /// 记录一次失败探测，`down_since` 只在首次离线时写入
    pub fn record_failure(&mut self, observed_at: DateTime<Utc>) -> Transition {
        match self.status {
            HealthStatus::Up => {
                self.status = HealthStatus::Down;
                self.down_since = Some(observed_at);
                Transition::WentDown
            }
            HealthStatus::Down => Transition::StillDown,
        }
    }

    /// 告警发出后记录时间
    pub fn mark_alerted(&mut self, at: DateTime<Utc>) {
        self.last_alerted_at = Some(at);
    }

    pub fn is_down(&self) -> bool {
        self.status == HealthStatus::Down
    }
}

/// 所有目标的状态集合
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    /// 按配置顺序保存的状态
    states: Vec<TargetState>,
    /// 目标ID -> 下标
    index: HashMap<String, usize>,
}

impl StateStore {
    /// 为每个目标创建初始状态
    pub fn new(targets: &[Target]) -> Self {
        let mut store = Self::default();
        for target in targets {
            if store.index.contains_key(&target.id) {
                warn!("重复的目标名称，已忽略: {}", target.id);
                continue;
            }
            store.index.insert(target.id.clone(), store.states.len());
            store.states.push(TargetState::new(target.clone()));
        }
        store
    }

    /// 应用一轮探测结果，返回被更新的状态
    pub fn apply(&mut self, results: &[ProbeResult]) -> Vec<TargetState> {
        let mut updated = Vec::with_capacity(results.len());

        for result in results {
            let Some(&idx) = self.index.get(&result.target.id) else {
                warn!("收到未知目标的探测结果: {}", result.target.id);
                continue;
            };
            let state = &mut self.states[idx];

            let transition = if result.reachable {
                state.record_success()
            } else {
                state.record_failure(result.observed_at)
            };

            match transition {
                Transition::WentDown => warn!(
                    "目标离线: {} ({})",
                    state.target.id,
                    state.target.socket_addr()
                ),
                Transition::StillDown => warn!(
                    "目标仍然离线: {} ({})",
                    state.target.id,
                    state.target.socket_addr()
                ),
                Transition::Recovered => info!("目标已恢复: {}", state.target.id),
                Transition::StillUp => {}
            }

            updated.push(state.clone());
        }

        updated
    }

    /// 记录目标已发出告警
    pub fn mark_alerted(&mut self, target_id: &str, at: DateTime<Utc>) -> bool {
        match self.index.get(target_id) {
            Some(&idx) => {
                self.states[idx].mark_alerted(at);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, target_id: &str) -> Option<&TargetState> {
        self.index.get(target_id).map(|&idx| &self.states[idx])
    }

    pub fn states(&self) -> &[TargetState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// 当前离线的目标数
    pub fn down_count(&self) -> usize {
        self.states.iter().filter(|s| s.is_down()).count()
    }
}
