//! 状态管理模块
//!
//! 保存目标在线状态和告警记录

pub mod store;

// 重新导出主要类型
pub use store::{StateStore, TargetState, Transition};
