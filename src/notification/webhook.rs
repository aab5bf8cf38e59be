//! 邮件中继发送器模块
//!
//! 通过HTTP接口把告警邮件交给外部邮件中继

use crate::config::{EmailConfig, NotifierConfig};
use crate::error::NotificationError;
use crate::notification::sender::Notifier;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

/// 发送给中继的请求体
#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// 中继的响应体，`id` 可选
#[derive(Debug, Default, Deserialize)]
struct RelayResponse {
    id: Option<String>,
}

/// 邮件中继发送器
pub struct WebhookNotifier {
    /// HTTP客户端
    client: Client,
    /// 中继接口地址
    webhook_url: String,
    /// 发件人
    from: String,
    /// Bearer token
    auth_token: Option<String>,
}

impl WebhookNotifier {
    /// 创建新的中继发送器
    ///
    /// # 参数
    /// * `webhook_url` - 中继接口地址
    /// * `from` - 发件人
    /// * `timeout` - 请求超时
    pub fn new(
        webhook_url: impl Into<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(timeout)
            // 每次发送单独建立连接，轮次之间不保留空闲连接
            .pool_max_idle_per_host(0)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .map_err(|e| NotificationError::ConfigError(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
            from: from.into(),
            auth_token: None,
        })
    }

    pub fn from_config(
        notifier: &NotifierConfig,
        email: &EmailConfig,
    ) -> Result<Self, NotificationError> {
        let mut sender = Self::new(
            notifier.webhook_url.clone(),
            email.from.clone(),
            Duration::from_secs(notifier.timeout_seconds),
        )?;
        sender.auth_token = notifier.auth_token.clone();
        Ok(sender)
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, NotificationError> {
        debug!("发送告警到邮件中继: {}", self.webhook_url);

        let payload = RelayRequest {
            from: &self.from,
            to: recipient,
            subject,
            body,
        };

        let mut request = self.client.post(&self.webhook_url).json(&payload);
        if let Some(ref token) = self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::SendError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("邮件中继返回错误: {} - {}", status, text);
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        // 中继不返回ID时使用本地生成的ID
        let text = response.text().await.unwrap_or_default();
        let id = serde_json::from_str::<RelayResponse>(&text)
            .ok()
            .and_then(|r| r.id)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        info!("邮件中继接收成功: {} -> {}", recipient, id);
        Ok(id)
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
