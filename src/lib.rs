//! Outlinker - affiliate outbound link redirector
//!
//! 站内商品链接统一经过 `GET /out?url=...`：校验目标地址，
//! 为 Amazon / Cabela's 追加联盟标识，后台记录点击，然后 302 跳转。
//! 标记失败时依次降级为原始地址、站点首页，不向用户返回 5xx。
//!
//! # Features
//! - **cli**: 命令行子命令（tag / link / inspect / config），默认开启
//! - **metrics**: Prometheus 指标导出（`/health/metrics`）
//!
//! # Architecture
//! - `utils`: 外部 URL 安全校验
//! - `affiliate`: 来源识别、联盟标签、商品信息提取、出站链接生成
//! - `analytics`: 点击记录与 sink
//! - `api`: HTTP 端点与中间件
//! - `config`: 静态配置加载
//! - `runtime`: 服务启动
//! - `system`: 日志与 panic 处理

#[macro_use]
mod metrics_macros;

pub mod affiliate;
pub mod analytics;
pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod errors;
pub mod interfaces;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod runtime;
pub mod system;
pub mod utils;
