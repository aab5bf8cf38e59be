//! 告警正文模板
//!
//! 使用 handlebars 渲染告警邮件正文

use crate::error::NotificationError;
use crate::status::TargetState;
use chrono::{DateTime, Local, Utc};
use handlebars::Handlebars;
use serde::Serialize;

const TEMPLATE_NAME: &str = "alert";

/// 默认的告警正文模板
pub fn default_alert_template() -> &'static str {
    r#"警告！站点 {{name}} 已离线！

最后在线时间: {{down_since}}

详情: 无法连接到 {{address}}:{{port}}

请联系站点确认是否为已知问题。
{{#if advice}}

提示: {{advice}}
{{/if}}

此告警由系统自动生成，请勿回复。"#
}

/// 模板上下文数据
#[derive(Debug, Clone, Serialize)]
pub struct AlertContext {
    /// 展示名称
    pub name: String,
    /// 目标地址
    pub address: String,
    /// 目标端口
    pub port: u16,
    /// 本地时间格式的离线时间
    pub down_since: String,
    /// 处理建议
    pub advice: String,
}

impl AlertContext {
    pub fn from_state(state: &TargetState, advice: &str) -> Self {
        Self {
            name: state.target.display_name(),
            address: state.target.address.clone(),
            port: state.target.port,
            down_since: state
                .down_since
                .map(format_local_time)
                .unwrap_or_else(|| "未知".to_string()),
            advice: advice.to_string(),
        }
    }
}

/// 按本地时区格式化，例如 `Mon Mar  4 09:30:00 2024`
pub fn format_local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%a %b %e %H:%M:%S %Y")
        .to_string()
}

/// 编译后的告警模板
pub struct AlertTemplate {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for AlertTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertTemplate").finish_non_exhaustive()
    }
}

impl AlertTemplate {
    /// 编译模板，语法错误时返回 [`NotificationError::TemplateError`]
    pub fn new(template: &str) -> Result<Self, NotificationError> {
        let mut registry = Handlebars::new();
        // 纯文本邮件，不做HTML转义
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(false);
        registry
            .register_template_string(TEMPLATE_NAME, template)
            .map_err(|e| NotificationError::TemplateError(e.to_string()))?;
        Ok(Self { registry })
    }

    /// 使用默认模板
    pub fn with_default() -> Result<Self, NotificationError> {
        Self::new(default_alert_template())
    }

    pub fn render(&self, context: &AlertContext) -> Result<String, NotificationError> {
        self.registry
            .render(TEMPLATE_NAME, context)
            .map_err(|e| NotificationError::TemplateError(e.to_string()))
    }
}
