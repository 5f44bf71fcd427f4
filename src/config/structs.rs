use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{OutlinkerError, Result};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 环境变量前缀，例如 `OL__SERVER__PORT=9999`
pub const ENV_PREFIX: &str = "OL";

/// 运行环境
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SiteEnvironment {
    #[default]
    Development,
    Production,
}

/// 点击日志输出方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickSinkKind {
    /// 通过 tracing 输出到日志
    Stdout,
    /// 追加写入 JSON Lines 文件
    File,
    /// 丢弃
    #[serde(rename = "none")]
    Disabled,
}

/// 静态配置（启动时加载一次，之后以 `Arc` 注入各组件）
///
/// 包含：
/// - server: 监听地址、端口、worker 数量
/// - site: 站点根地址（兜底跳转目标）与运行环境
/// - affiliate: 各零售商联盟标识
/// - analytics: 点击日志输出
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub affiliate: AffiliateConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 `config.toml`（可选）和进程环境变量加载
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// 启动前检查：站点地址必须是绝对 http(s) URL
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.site.base_url).map_err(|e| {
            OutlinkerError::config(format!(
                "site.base_url '{}' is not an absolute URL: {}",
                self.site.base_url, e
            ))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(OutlinkerError::config(format!(
                "site.base_url must use http or https, got '{}'",
                base.scheme()
            )));
        }
        if self.analytics.geo_header.trim().is_empty() {
            return Err(OutlinkerError::config("analytics.geo_header cannot be empty"));
        }
        Ok(())
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 配置加载器
///
/// 优先级：默认值 < TOML 文件 < `OL__*` 环境变量 < `AMAZON_AFFILIATE_TAG` /
/// `CABELAS_AFFILIATE_TAG` / `SITE_URL`（兼容 `NEXT_PUBLIC_SITE_URL`）。
#[derive(Debug, Default)]
pub struct ConfigLoader {
    path: Option<String>,
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定配置文件；显式指定时文件必须存在
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// 用给定变量表代替进程环境变量
    pub fn with_env(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    fn var(&self, key: &str) -> Option<String> {
        match &self.env {
            Some(vars) => vars.get(key).cloned(),
            None => std::env::var(key).ok(),
        }
        .filter(|v| !v.is_empty())
    }

    pub fn load(self) -> Result<StaticConfig> {
        use ::config::{Config, Environment, File};

        let file_source = match &self.path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };

        let env_source = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(self.env.clone());

        let site_url = self
            .var("SITE_URL")
            .or_else(|| self.var("NEXT_PUBLIC_SITE_URL"));

        let settings = Config::builder()
            .add_source(file_source)
            .add_source(env_source)
            .set_override_option("affiliate.amazon_tag", self.var("AMAZON_AFFILIATE_TAG"))?
            .set_override_option("affiliate.cabelas_tag", self.var("CABELAS_AFFILIATE_TAG"))?
            .set_override_option("site.base_url", site_url)?
            .build()?;

        let config: StaticConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// 站点配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub environment: SiteEnvironment,
}

impl SiteConfig {
    /// 站点首页，最终兜底跳转目标
    pub fn home_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?.join("/")?)
    }

    pub fn is_production(&self) -> bool {
        self.environment == SiteEnvironment::Production
    }
}

/// 联盟标识配置，空字符串视为未配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AffiliateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amazon_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cabelas_tag: Option<String>,
}

impl AffiliateConfig {
    pub fn amazon_tag(&self) -> Option<&str> {
        self.amazon_tag.as_deref().filter(|t| !t.is_empty())
    }

    pub fn cabelas_tag(&self) -> Option<&str> {
        self.cabelas_tag.as_deref().filter(|t| !t.is_empty())
    }
}

/// 点击日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// 未设置时：development 输出到日志，production 丢弃
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<ClickSinkKind>,
    #[serde(default = "default_click_file")]
    pub file_path: String,
    /// 携带国家代码的请求头（由 CDN 注入）
    #[serde(default = "default_geo_header")]
    pub geo_header: String,
}

impl AnalyticsConfig {
    pub fn effective_sink(&self, environment: SiteEnvironment) -> ClickSinkKind {
        self.sink.unwrap_or(match environment {
            SiteEnvironment::Development => ClickSinkKind::Stdout,
            SiteEnvironment::Production => ClickSinkKind::Disabled,
        })
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_base_url() -> String {
    "https://tenttracks.com".to_string()
}

fn default_click_file() -> String {
    "clicks.jsonl".to_string()
}

fn default_geo_header() -> String {
    "cf-ipcountry".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            workers: default_workers(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            environment: SiteEnvironment::default(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            sink: None,
            file_path: default_click_file(),
            geo_header: default_geo_header(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}
