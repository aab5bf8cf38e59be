//! 通知模块
//!
//! 提供告警去抖、正文模板和邮件发送功能

pub mod debouncer;
pub mod sender;
pub mod template;
pub mod webhook;

// 重新导出主要类型
pub use debouncer::{in_quiet_hours, AlertDebouncer, AlertDecision, DecisionReason, QuietHours};
pub use sender::{LogNotifier, Notifier};
pub use template::{AlertContext, AlertTemplate};
pub use webhook::WebhookNotifier;
