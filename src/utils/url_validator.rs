//! URL 验证模块
//!
//! 出站跳转前的安全检查：只允许 HTTPS，拒绝内网 / 本机地址，
//! 防止 `/out` 被当作开放重定向打进内网。

use url::Url;

use crate::errors::OutlinkerError;

/// URL 验证错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    InvalidFormat(String),
    MissingHost,
    InsecureScheme(String),
    InternalHost(String),
}

impl std::fmt::Display for UrlValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat(msg) => write!(f, "Invalid URL format: {}", msg),
            Self::MissingHost => write!(f, "URL has no host"),
            Self::InsecureScheme(scheme) => {
                write!(f, "Only HTTPS URLs are allowed, got: {}", scheme)
            }
            Self::InternalHost(host) => write!(f, "Internal URLs are not allowed: {}", host),
        }
    }
}

impl std::error::Error for UrlValidationError {}

impl From<UrlValidationError> for OutlinkerError {
    fn from(err: UrlValidationError) -> Self {
        OutlinkerError::InvalidUrl(err.to_string())
    }
}

/// 通过安全检查的目标 URL
///
/// `raw` 保留调用方传入的原始字符串，用于原样透传；`parsed` 供标签改写使用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    raw: String,
    parsed: Url,
}

impl ValidatedUrl {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.parsed
    }

    /// 小写主机名（验证阶段已保证存在）
    pub fn host(&self) -> &str {
        self.parsed.host_str().unwrap_or_default()
    }

    pub fn into_string(self) -> String {
        self.raw
    }
}

impl std::fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// 内网主机前缀
const INTERNAL_HOST_PREFIXES: &[&str] = &["127.", "192.168.", "10."];

/// 判断主机名是否指向本机或内网
///
/// 入参需已小写。
fn is_internal_host(host: &str) -> bool {
    host == "localhost"
        || host == "0.0.0.0"
        || host.contains("internal")
        || INTERNAL_HOST_PREFIXES
            .iter()
            .any(|prefix| host.starts_with(prefix))
}

/// 验证外部跳转 URL
///
/// 检查项目：
/// 1. 能解析为绝对 URL
/// 2. 协议必须是 https
/// 3. 主机名不是 localhost / 127.* / 192.168.* / 10.* / 0.0.0.0，且不含 `internal`
pub fn validate_external_url(raw: &str) -> Result<ValidatedUrl, UrlValidationError> {
    let parsed = Url::parse(raw).map_err(|e| UrlValidationError::InvalidFormat(e.to_string()))?;

    if parsed.scheme() != "https" {
        return Err(UrlValidationError::InsecureScheme(parsed.scheme().to_string()));
    }

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(UrlValidationError::MissingHost)?
        .to_lowercase();

    if is_internal_host(&host) {
        return Err(UrlValidationError::InternalHost(host));
    }

    Ok(ValidatedUrl {
        raw: raw.to_string(),
        parsed,
    })
}

/// 兜底跳转用的最小检查：能解析且以 `https://` 开头
///
/// 只在正常路径出错后使用，不做内网过滤。
pub fn is_minimally_safe(raw: &str) -> bool {
    Url::parse(raw).is_ok() && raw.starts_with("https://")
}

/// 获取 URL 验证错误的用户友好消息
///
/// 所有拒绝原因对外统一，不暴露具体哪条规则命中。
pub fn validation_error_message(_error: &UrlValidationError) -> &'static str {
    "Invalid URL provided"
}
