//! 点击日志记录器
//!
//! 跳转端点只调用 [`ClickLogger::dispatch`]：记录在独立任务中完成，
//! 任务内的错误和 panic 只写诊断日志，不会传回请求处理流程。

use std::sync::Arc;

use tracing::{error, trace, warn};

use super::{AffiliateClick, ClickRecord, ClickSink, build_sink};
use crate::config::StaticConfig;
use crate::system::panic_handler::{panic_message, recoverable};

pub struct ClickLogger {
    sink: Arc<dyn ClickSink>,
}

impl ClickLogger {
    pub fn new(sink: Arc<dyn ClickSink>) -> Self {
        Self { sink }
    }

    pub fn from_config(config: &StaticConfig) -> Self {
        Self::new(build_sink(config))
    }

    pub fn sink_name(&self) -> &'static str {
        self.sink.name()
    }

    /// 补全并写入一条点击记录，失败只记日志，不向调用方返回错误
    pub async fn log_click(&self, click: AffiliateClick) {
        let record = ClickRecord::enrich(click);
        let source = record.source;

        match self.sink.record(record).await {
            Ok(()) => {
                inc_counter!(
                    crate::metrics::METRICS.affiliate_clicks_total,
                    &[source.as_ref()]
                );
                trace!("Click logged to {} sink (source: {})", self.sink.name(), source);
            }
            Err(e) => {
                inc_plain_counter!(crate::metrics::METRICS.click_log_failures_total);
                error!("Failed to log affiliate click: {}", e);
            }
        }
    }

    /// 在后台任务中记录点击，立即返回
    ///
    /// 没有可用的 tokio runtime 时直接丢弃记录。
    pub fn dispatch(self: &Arc<Self>, click: AffiliateClick) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                "No async runtime available, dropping click for {}",
                click.final_url
            );
            return;
        };

        let logger = Arc::clone(self);
        handle.spawn(async move {
            if let Err(panic) = recoverable(logger.log_click(click)).await {
                inc_plain_counter!(crate::metrics::METRICS.click_log_failures_total);
                error!("Click logging task panicked: {}", panic_message(&*panic));
            }
        });
    }
}
