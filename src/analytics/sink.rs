use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use super::ClickRecord;
use crate::config::{ClickSinkKind, StaticConfig};

/// 点击日志 Sink
#[async_trait::async_trait]
pub trait ClickSink: Send + Sync {
    /// 记录单条点击
    async fn record(&self, record: ClickRecord) -> anyhow::Result<()>;

    fn name(&self) -> &'static str;
}

/// 输出到 tracing 日志（开发环境默认）
pub struct StdoutSink;

#[async_trait::async_trait]
impl ClickSink for StdoutSink {
    async fn record(&self, record: ClickRecord) -> anyhow::Result<()> {
        let json = serde_json::to_string(&record)?;
        info!(target: "outlinker::clicks", source = %record.source, click = %json, "Affiliate click");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

/// 追加写入 JSON Lines 文件，每行一条记录
pub struct JsonLinesSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl ClickSink for JsonLinesSink {
    async fn record(&self, record: ClickRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        // 串行写入，避免多条记录交错
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// 丢弃所有记录（生产环境默认）
pub struct NoopSink;

#[async_trait::async_trait]
impl ClickSink for NoopSink {
    async fn record(&self, _record: ClickRecord) -> anyhow::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// 按配置创建 sink
pub fn build_sink(config: &StaticConfig) -> Arc<dyn ClickSink> {
    match config.analytics.effective_sink(config.site.environment) {
        ClickSinkKind::Stdout => Arc::new(StdoutSink),
        ClickSinkKind::File => Arc::new(JsonLinesSink::new(&config.analytics.file_path)),
        ClickSinkKind::Disabled => Arc::new(NoopSink),
    }
}
