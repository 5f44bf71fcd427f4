use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use tracing::trace;

// 应用启动时间结构体
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}

impl AppStartTime {
    pub fn now() -> Self {
        Self {
            start_datetime: chrono::Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        (chrono::Utc::now() - self.start_datetime)
            .num_seconds()
            .max(0) as u64
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: u64,
    pub click_sink: &'static str,
}

/// Health Service
///
/// 跳转端点无外部依赖，存活即健康；附带当前点击 sink 方便排查。
pub struct HealthService;

impl HealthService {
    pub async fn health_check(
        app_start_time: web::Data<AppStartTime>,
        ctx: web::Data<super::redirect::OutContext>,
    ) -> impl Responder {
        trace!("Received health check request");

        HttpResponse::Ok().json(HealthResponse {
            status: "healthy",
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime: app_start_time.uptime_seconds(),
            click_sink: ctx.logger.sink_name(),
        })
    }

    /// Prometheus 文本格式导出
    #[cfg(feature = "metrics")]
    pub async fn metrics(app_start_time: web::Data<AppStartTime>) -> impl Responder {
        use crate::metrics::METRICS;

        METRICS
            .uptime_seconds
            .set(app_start_time.uptime_seconds() as f64);

        HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4; charset=utf-8")
            .body(METRICS.export())
    }

    #[cfg(not(feature = "metrics"))]
    pub async fn metrics() -> impl Responder {
        HttpResponse::NotFound()
            .content_type("text/plain")
            .body("Metrics not enabled. Rebuild with --features metrics")
    }
}

/// Health 路由配置
pub fn health_routes() -> actix_web::Scope {
    web::scope("/health")
        .route("", web::get().to(HealthService::health_check))
        .route("", web::head().to(HealthService::health_check))
        .route("/metrics", web::get().to(HealthService::metrics))
}
