//! `/out` 出站跳转
//!
//! 处理顺序：取 `url` 参数 → 安全校验 → 打联盟标签 → 后台记录点击 → 302。
//! 校验之后的任何失败都按 [`REDIRECT_TIERS`] 逐级降级，
//! 用户最终总能拿到一个跳转，而不是 5xx。

use std::sync::Arc;
use std::time::Instant;

use actix_web::http::header::{self, HeaderName, HeaderValue};
use actix_web::http::{Method, StatusCode};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use tracing::{debug, error, warn};
use url::Url;

use crate::affiliate::link::OUT_PATH;
use crate::affiliate::AffiliateTagger;
use crate::analytics::{AffiliateClick, ClickLogger};
use crate::config::StaticConfig;
use crate::errors::{OutlinkerError, Result};
use crate::system::panic_handler::recover;
use crate::utils::{ValidatedUrl, is_minimally_safe, validate_external_url, validation_error_message};

/// 跳转端点依赖，启动时构建一次
pub struct OutContext {
    pub tagger: AffiliateTagger,
    pub logger: Arc<ClickLogger>,
    pub home_url: String,
    pub geo_header: HeaderName,
}

impl OutContext {
    pub fn new(config: &StaticConfig, logger: Arc<ClickLogger>) -> Result<Self> {
        let geo_header = HeaderName::from_bytes(
            config.analytics.geo_header.trim().to_ascii_lowercase().as_bytes(),
        )
        .map_err(|e| {
            OutlinkerError::config(format!(
                "analytics.geo_header '{}' is not a valid header name: {}",
                config.analytics.geo_header, e
            ))
        })?;

        Ok(Self {
            tagger: AffiliateTagger::new(&config.affiliate),
            logger,
            home_url: config.site.home_url()?.into(),
            geo_header,
        })
    }

    pub fn from_config(config: &StaticConfig) -> Result<Self> {
        Self::new(config, Arc::new(ClickLogger::from_config(config)))
    }
}

/// 跳转尝试的层级，按顺序尝试，前一层失败才进入下一层
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTier {
    /// 打完标签的目标地址
    Tagged,
    /// 未打标签的原始地址（仅做最小校验）
    RawSafe,
    /// 站点首页
    Home,
}

impl RedirectTier {
    fn label(self) -> &'static str {
        match self {
            RedirectTier::Tagged => "tagged",
            RedirectTier::RawSafe => "raw",
            RedirectTier::Home => "home",
        }
    }
}

pub const REDIRECT_TIERS: [RedirectTier; 3] =
    [RedirectTier::Tagged, RedirectTier::RawSafe, RedirectTier::Home];

/// 单次请求中已通过校验的目标
struct OutTarget<'a> {
    raw: &'a str,
    validated: ValidatedUrl,
}

pub struct OutService;

impl OutService {
    pub async fn handle_out(req: HttpRequest, ctx: web::Data<OutContext>) -> HttpResponse {
        let start = Instant::now();

        let Some(raw) = Self::target_param(&req) else {
            return Self::bad_request("Missing URL parameter");
        };

        let validated = match validate_external_url(&raw) {
            Ok(validated) => validated,
            Err(e) => {
                warn!("URL validation failed for {}: {}", raw, e);
                return Self::bad_request(validation_error_message(&e));
            }
        };

        let target = OutTarget {
            raw: &raw,
            validated,
        };

        let (tier, response) =
            first_redirect(|tier| Self::attempt(tier, &req, &ctx, &target));

        if tier != RedirectTier::Tagged {
            inc_counter!(
                crate::metrics::METRICS.redirect_fallbacks_total,
                &[tier.label()]
            );
        }
        inc_counter!(crate::metrics::METRICS.redirects_total, &["302"]);
        debug!(
            "Affiliate redirect processed in {}ms ({} tier)",
            start.elapsed().as_millis(),
            tier.label()
        );
        response
    }

    /// CORS 预检
    pub async fn preflight() -> HttpResponse {
        HttpResponse::Ok()
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"))
            .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
            .finish()
    }

    pub async fn method_not_allowed() -> HttpResponse {
        inc_counter!(crate::metrics::METRICS.redirects_total, &["405"]);

        HttpResponse::build(StatusCode::METHOD_NOT_ALLOWED)
            .insert_header((header::CONTENT_TYPE, "text/plain"))
            .body("Method not allowed")
    }

    fn attempt(
        tier: RedirectTier,
        req: &HttpRequest,
        ctx: &OutContext,
        target: &OutTarget<'_>,
    ) -> Result<HttpResponse> {
        match tier {
            RedirectTier::Tagged => {
                let (source, tagged) = ctx.tagger.tag(&target.validated);
                // Location 只放序列化后的 URL（非 ASCII、空白均已转义）
                let final_url: String = Url::parse(&tagged)?.into();
                let location = HeaderValue::from_str(&final_url)?;

                ctx.logger.dispatch(Self::click(req, ctx, target.raw, &final_url));

                let mut response = Self::redirect_to(location);
                if source.is_affiliate() {
                    response.headers_mut().insert(
                        header::REFERRER_POLICY,
                        HeaderValue::from_static("origin"),
                    );
                }
                Ok(response)
            }
            RedirectTier::RawSafe => {
                if !is_minimally_safe(target.raw) {
                    return Err(OutlinkerError::redirect(
                        "fallback target is not an https:// URL",
                    ));
                }
                let url = Url::parse(target.raw)?;
                Ok(Self::redirect_to(HeaderValue::from_str(url.as_str())?))
            }
            RedirectTier::Home => Ok(Self::redirect_to(HeaderValue::from_str(&ctx.home_url)?)),
        }
    }

    /// 读取第一个非空的 `url` 查询参数
    fn target_param(req: &HttpRequest) -> Option<String> {
        url::form_urlencoded::parse(req.query_string().as_bytes())
            .find(|(key, _)| key == "url")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }

    fn header_str(req: &HttpRequest, name: &HeaderName) -> Option<String> {
        req.headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(String::from)
    }

    fn click(req: &HttpRequest, ctx: &OutContext, raw: &str, final_url: &str) -> AffiliateClick {
        AffiliateClick {
            timestamp: Utc::now(),
            original_url: raw.to_string(),
            final_url: final_url.to_string(),
            user_agent: Self::header_str(req, &header::USER_AGENT).unwrap_or_default(),
            referrer: Self::header_str(req, &header::REFERER).unwrap_or_default(),
            geo_location: Self::header_str(req, &ctx.geo_header).filter(|c| !c.is_empty()),
        }
    }

    /// 302 + 禁止缓存，保证每次点击都经过本端点
    fn redirect_to(location: HeaderValue) -> HttpResponse {
        HttpResponse::build(StatusCode::FOUND)
            .insert_header((header::LOCATION, location))
            .insert_header((header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"))
            .insert_header((header::PRAGMA, "no-cache"))
            .insert_header((header::EXPIRES, "0"))
            .finish()
    }

    #[inline]
    fn bad_request(message: &'static str) -> HttpResponse {
        inc_counter!(crate::metrics::METRICS.redirects_total, &["400"]);

        HttpResponse::build(StatusCode::BAD_REQUEST)
            .insert_header((header::CONTENT_TYPE, "text/plain"))
            .body(message)
    }
}

/// 按 [`REDIRECT_TIERS`] 顺序尝试，返回第一个成功的层级及其响应
///
/// 每次尝试都在可恢复边界内执行，panic 视同失败；
/// 全部失败时跳转到站点根路径。
fn first_redirect<F>(mut attempt: F) -> (RedirectTier, HttpResponse)
where
    F: FnMut(RedirectTier) -> Result<HttpResponse>,
{
    for tier in REDIRECT_TIERS {
        let outcome = recover(|| attempt(tier))
            .unwrap_or_else(|_| Err(OutlinkerError::redirect("redirect attempt panicked")));

        match outcome {
            Ok(response) => return (tier, response),
            Err(e) => error!("Affiliate redirect ({} tier) failed: {}", tier.label(), e),
        }
    }

    (RedirectTier::Home, OutService::redirect_to(HeaderValue::from_static("/")))
}

/// `/out` 路由配置
pub fn out_routes() -> actix_web::Resource {
    web::resource(OUT_PATH)
        .route(web::get().to(OutService::handle_out))
        .route(web::method(Method::OPTIONS).to(OutService::preflight))
        .default_service(web::route().to(OutService::method_not_allowed))
}
