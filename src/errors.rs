use std::fmt;

#[derive(Debug, Clone)]
pub enum OutlinkerError {
    InvalidUrl(String),
    Config(String),
    FileOperation(String),
    Serialization(String),
    Redirect(String),
}

impl OutlinkerError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            OutlinkerError::InvalidUrl(_) => "E001",
            OutlinkerError::Config(_) => "E002",
            OutlinkerError::FileOperation(_) => "E003",
            OutlinkerError::Serialization(_) => "E004",
            OutlinkerError::Redirect(_) => "E005",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            OutlinkerError::InvalidUrl(_) => "Invalid URL",
            OutlinkerError::Config(_) => "Configuration Error",
            OutlinkerError::FileOperation(_) => "File Operation Error",
            OutlinkerError::Serialization(_) => "Serialization Error",
            OutlinkerError::Redirect(_) => "Redirect Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            OutlinkerError::InvalidUrl(msg) => msg,
            OutlinkerError::Config(msg) => msg,
            OutlinkerError::FileOperation(msg) => msg,
            OutlinkerError::Serialization(msg) => msg,
            OutlinkerError::Redirect(msg) => msg,
        }
    }

    /// 格式化为彩色输出（用于 Server 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for OutlinkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for OutlinkerError {}

// 便捷的构造函数
impl OutlinkerError {
    pub fn invalid_url<T: Into<String>>(msg: T) -> Self {
        OutlinkerError::InvalidUrl(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        OutlinkerError::Config(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        OutlinkerError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        OutlinkerError::Serialization(msg.into())
    }

    pub fn redirect<T: Into<String>>(msg: T) -> Self {
        OutlinkerError::Redirect(msg.into())
    }
}

impl From<std::io::Error> for OutlinkerError {
    fn from(err: std::io::Error) -> Self {
        OutlinkerError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for OutlinkerError {
    fn from(err: serde_json::Error) -> Self {
        OutlinkerError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for OutlinkerError {
    fn from(err: toml::ser::Error) -> Self {
        OutlinkerError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for OutlinkerError {
    fn from(err: url::ParseError) -> Self {
        OutlinkerError::InvalidUrl(err.to_string())
    }
}

impl From<::config::ConfigError> for OutlinkerError {
    fn from(err: ::config::ConfigError) -> Self {
        OutlinkerError::Config(err.to_string())
    }
}

impl From<actix_web::http::header::InvalidHeaderValue> for OutlinkerError {
    fn from(err: actix_web::http::header::InvalidHeaderValue) -> Self {
        OutlinkerError::Redirect(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OutlinkerError>;
