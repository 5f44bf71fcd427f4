//! Server mode
//!
//! 构建跳转端点依赖并启动 HTTP 服务。actix 自带 SIGINT / SIGTERM 处理，
//! 收到信号后等待进行中的请求完成再退出。

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use anyhow::Result;
use tracing::{info, warn};

use crate::analytics::ClickLogger;
use crate::api::middleware::RequestIdMiddleware;
use crate::api::services::{AppStartTime, OutContext, health_routes, out_routes};
use crate::config::StaticConfig;

/// worker 数量上限
const MAX_WORKERS: usize = 32;

/// Run the HTTP server
///
/// **Note**: 调用前需要先初始化日志系统
pub async fn run_server(config: Arc<StaticConfig>) -> Result<()> {
    let app_start_time = AppStartTime::now();

    let logger = Arc::new(ClickLogger::from_config(&config));
    let ctx = web::Data::new(OutContext::new(&config, logger)?);

    info!(
        "Click sink: {}, home: {}, environment: {:?}",
        ctx.logger.sink_name(),
        ctx.home_url,
        config.site.environment
    );
    if config.affiliate.amazon_tag().is_none() {
        warn!("AMAZON_AFFILIATE_TAG not configured, Amazon links will not be tagged");
    }
    if config.affiliate.cabelas_tag().is_none() {
        warn!("CABELAS_AFFILIATE_TAG not configured, Cabela's links will not be tagged");
    }

    let workers = config.server.workers.clamp(1, MAX_WORKERS);
    warn!("Using {} workers for the server", workers);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestIdMiddleware)
            .app_data(ctx.clone())
            .app_data(web::Data::new(app_start_time.clone()))
            .service(health_routes())
            .service(out_routes())
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .client_disconnect_timeout(std::time::Duration::from_millis(1000))
    .workers(workers)
    .bind(&bind_address)?;

    warn!("Starting server at http://{}", bind_address);
    server.run().await?;

    warn!("Server stopped");
    Ok(())
}
