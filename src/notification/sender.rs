//! 通知发送器模块
//!
//! 定义通知发送的trait和基础实现

use crate::error::NotificationError;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

/// 通知发送器trait
///
/// 每次调用对应一封告警邮件，成功时返回消息ID。
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 发送消息
    ///
    /// # 参数
    /// * `recipient` - 收件人
    /// * `subject` - 主题
    /// * `body` - 正文
    ///
    /// # 返回
    /// * `Result<String, NotificationError>` - 消息ID
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, NotificationError>;

    /// 发送器名称，用于日志
    fn name(&self) -> &'static str;
}

/// 只写日志的发送器（未配置邮件中继时使用）
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, NotificationError> {
        let id = Uuid::new_v4().to_string();
        info!(
            message_id = %id,
            recipient,
            subject,
            "未配置邮件中继，告警仅记录日志:\n{}",
            body
        );
        Ok(id)
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_returns_unique_ids() {
        let notifier = LogNotifier;
        let first = notifier.send("ops@example.com", "s", "b").await.unwrap();
        let second = notifier.send("ops@example.com", "s", "b").await.unwrap();

        assert_ne!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
        assert_eq!(notifier.name(), "log");
    }
}
