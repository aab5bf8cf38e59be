//! 配置加载器实现
//!
//! 提供TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::types::{validate_config, Config, ConfigOverrides};
use crate::error::{ConfigError, Result};
use crate::notification::AlertTemplate;
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    /// * `overrides` - 命令行覆盖项，在验证之前应用
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_file<P: AsRef<Path> + Send>(
        &self,
        path: P,
        overrides: &ConfigOverrides,
    ) -> Result<Config>;

    /// 从字符串加载配置
    async fn load_from_string(&self, content: &str, overrides: &ConfigOverrides)
        -> Result<Config>;

    /// 验证配置
    fn validate(&self, config: &Config) -> Result<()>;
}

/// TOML配置加载器实现
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    ///
    /// # 参数
    /// * `enable_env_substitution` - 是否启用 `${VAR}` 环境变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 替换字符串中的环境变量
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        // 匹配 ${VAR_NAME} 格式的环境变量
        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {}", e)))?;

        let mut result = content.to_string();

        for captures in env_var_regex.captures_iter(content) {
            let full_match = &captures[0];
            let var_name = &captures[1];

            match std::env::var(var_name) {
                Ok(value) => {
                    result = result.replace(full_match, &value);
                }
                Err(_) => {
                    return Err(ConfigError::EnvVarError {
                        var: var_name.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(result)
    }

    /// 解析TOML内容并应用覆盖项
    fn parse_toml(&self, content: &str, overrides: &ConfigOverrides) -> Result<Config> {
        let processed_content = self.substitute_env_vars(content)?;

        let mut config: Config = toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {}", e)))?;

        overrides.apply(&mut config);

        Ok(config)
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(
        &self,
        path: P,
        overrides: &ConfigOverrides,
    ) -> Result<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {}", e)))?;

        let config = self.parse_toml(&content, overrides)?;
        self.validate(&config)?;

        log::info!("成功加载配置文件: {}", path.display());
        log::debug!("配置内容: {:?}", config);

        Ok(config)
    }

    async fn load_from_string(
        &self,
        content: &str,
        overrides: &ConfigOverrides,
    ) -> Result<Config> {
        let config = self.parse_toml(content, overrides)?;
        self.validate(&config)?;

        log::debug!("成功解析配置字符串");

        Ok(config)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(ConfigError::ValidationError)?;

        // 模板在启动时编译一次，错误直接视为配置错误
        if let Some(ref template) = config.email.body_template {
            AlertTemplate::new(template)
                .map_err(|e| ConfigError::TemplateError(e.to_string()))?;
        }

        Ok(())
    }
}

/// 获取默认配置文件路径
///
/// 当前目录存在 `config.toml` 时优先使用，否则使用系统配置目录下的
/// `port-vitals/config.toml`。
pub fn get_default_config_path() -> std::path::PathBuf {
    if Path::new("config.toml").exists() {
        return std::path::PathBuf::from("config.toml");
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join("port-vitals").join("config.toml"))
        .unwrap_or_else(|| std::path::PathBuf::from("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::QuietHours;
    use serial_test::serial;
    use std::env;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TEST_CONFIG_TOML: &str = r#"
[monitor]
port = 9111
poll_interval_seconds = 600
quiet_hours = { start = 22, stop = 5 }

[email]
from = "monitor@example.com"
to = "ops@example.com"
subject = "Site offline"
advice = "Check the router first."

[targets]
branch = "10.0.0.5"
warehouse = "10.0.0.6"
"#;

    const TEST_CONFIG_WITH_ENV_VARS: &str = r#"
[email]
to = "${ALERT_RECIPIENT}"

[notifier]
webhook_url = "https://relay.example.com/send"
auth_token = "${RELAY_TOKEN}"

[targets]
branch = "10.0.0.5"
"#;

    #[tokio::test]
    async fn test_toml_parsing() {
        let loader = TomlConfigLoader::new(false);
        let config = loader
            .load_from_string(TEST_CONFIG_TOML, &ConfigOverrides::default())
            .await
            .unwrap();

        assert_eq!(config.monitor.poll_interval_seconds, 600);
        assert_eq!(config.monitor.retry_attempts, 5);
        assert_eq!(config.monitor.quiet_hours, Some(QuietHours::new(22, 5)));
        assert_eq!(config.sentinel.address, "8.8.8.8");
        assert_eq!(config.email.advice, "Check the router first.");
        assert!(config.notifier.is_none());
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets["warehouse"], "10.0.0.6");
    }

    #[tokio::test]
    async fn test_overrides_are_validated() {
        let loader = TomlConfigLoader::new(false);
        let overrides = ConfigOverrides {
            processes: Some(0),
            ..Default::default()
        };

        let result = loader.load_from_string(TEST_CONFIG_TOML, &overrides).await;
        assert!(result.unwrap_err().to_string().contains("并发"));
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution() {
        env::set_var("ALERT_RECIPIENT", "noc@example.com");
        env::set_var("RELAY_TOKEN", "secret-token");

        let loader = TomlConfigLoader::new(true);
        let config = loader
            .load_from_string(TEST_CONFIG_WITH_ENV_VARS, &ConfigOverrides::default())
            .await
            .unwrap();

        assert_eq!(config.email.to, "noc@example.com");
        assert_eq!(
            config.notifier.unwrap().auth_token,
            Some("secret-token".to_string())
        );

        env::remove_var("ALERT_RECIPIENT");
        env::remove_var("RELAY_TOKEN");
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution_missing_var() {
        env::remove_var("ALERT_RECIPIENT");

        let loader = TomlConfigLoader::new(true);
        let result = loader
            .load_from_string(TEST_CONFIG_WITH_ENV_VARS, &ConfigOverrides::default())
            .await;

        assert!(result.unwrap_err().to_string().contains("ALERT_RECIPIENT"));
    }

    #[tokio::test]
    async fn test_invalid_template_is_config_error() {
        let content = r#"
[email]
to = "ops@example.com"
body_template = "{{#if name}}unterminated"

[targets]
branch = "10.0.0.5"
"#;
        let loader = TomlConfigLoader::new(false);
        let result = loader
            .load_from_string(content, &ConfigOverrides::default())
            .await;

        assert!(matches!(
            result,
            Err(crate::error::PortVitalsError::Config(
                ConfigError::TemplateError(_)
            ))
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TEST_CONFIG_TOML.as_bytes()).unwrap();

        let loader = TomlConfigLoader::new(false);
        let overrides = ConfigOverrides {
            retry: Some(2),
            ..Default::default()
        };
        let config = loader.load_from_file(file.path(), &overrides).await.unwrap();

        assert_eq!(config.monitor.retry_attempts, 2);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let loader = TomlConfigLoader::new(false);
        let result = loader
            .load_from_file("/nonexistent/port-vitals.toml", &ConfigOverrides::default())
            .await;

        assert!(matches!(
            result,
            Err(crate::error::PortVitalsError::Config(
                ConfigError::FileNotFound { .. }
            ))
        ));
    }

    #[test]
    fn test_substitute_env_vars_disabled() {
        let loader = TomlConfigLoader::new(false);
        let content = "test ${VAR} content";
        let result = loader.substitute_env_vars(content).unwrap();
        assert_eq!(result, content);
    }

    #[test]
    fn test_get_default_config_path() {
        let path = get_default_config_path();
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }
}
