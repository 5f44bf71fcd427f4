//! Amazon Associates 链接处理

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, warn};
use url::Url;

use super::{ProductInfo, rewrite_query};

/// 支持的 Amazon 站点（按国家域名）
static AMAZON_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z0-9-]+\.)*amazon\.(?:com|ca|co\.uk|de|fr|it|es|in|com\.au|co\.jp)$")
        .expect("Amazon host pattern must compile")
});

static ASIN_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(?:dp|gp/product|exec/obidos/ASIN)/([A-Z0-9]{10})")
        .expect("ASIN pattern must compile")
});

static TITLE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/([^/]+)/dp/").expect("title pattern must compile"));

/// 改写前需要清除的追踪参数
pub const TRACKING_PARAMS: [&str; 4] = ["tag", "linkCode", "camp", "creative"];

pub const LINK_CODE: &str = "as2";
pub const CAMP: &str = "1789";
pub const CREATIVE: &str = "9325";

pub const PRODUCT_CATEGORY: &str = "amazon-product";

/// `host` 须为小写；完整域名末尾的一个 `.` 会被忽略
pub fn is_amazon_host(host: &str) -> bool {
    AMAZON_HOST.is_match(host.strip_suffix('.').unwrap_or(host))
}

pub fn is_amazon_url(raw: &str) -> bool {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| is_amazon_host(&h.to_ascii_lowercase())))
        .unwrap_or(false)
}

/// 为 Amazon 链接追加联盟参数
///
/// 非 Amazon 链接、未配置 tag、解析失败时均原样返回。
pub fn append_amazon_affiliate_tag(raw: &str, tag: Option<&str>) -> String {
    if !is_amazon_url(raw) {
        return raw.to_string();
    }

    let Some(tag) = tag.filter(|t| !t.is_empty()) else {
        warn!("Amazon affiliate tag not configured");
        return raw.to_string();
    };

    match Url::parse(raw) {
        Ok(url) => rewrite_query(
            url,
            &TRACKING_PARAMS,
            &[
                ("tag", tag),
                ("linkCode", LINK_CODE),
                ("camp", CAMP),
                ("creative", CREATIVE),
            ],
        )
        .into(),
        Err(e) => {
            error!("Error processing Amazon URL {}: {}", raw, e);
            raw.to_string()
        }
    }
}

/// 从 Amazon 链接路径提取 ASIN 与标题
pub fn extract_amazon_product_info(raw: &str) -> ProductInfo {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => {
            error!("Error extracting Amazon product info: {}", e);
            return ProductInfo::default();
        }
    };
    let path = url.path();

    let asin = ASIN_PATH
        .captures(path)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let title = TITLE_PATH
        .captures(path)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace('-', " "));

    ProductInfo {
        asin,
        product_id: None,
        title,
        category: Some(PRODUCT_CATEGORY.to_string()),
    }
}
