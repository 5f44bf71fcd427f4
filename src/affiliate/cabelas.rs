//! Cabela's 联盟链接处理

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, warn};
use url::Url;

use super::{ProductInfo, rewrite_query};

static CABELAS_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z0-9-]+\.)*cabelas\.com$").expect("Cabela's host pattern must compile")
});

static PRODUCT_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/product/([^/]+)").expect("product pattern must compile"));

/// 改写前需要清除的联盟参数（不同联盟计划参数名不同）
pub const TRACKING_PARAMS: [&str; 3] = ["affiliate", "affcode", "sourceCode"];

pub const DEFAULT_CATEGORY: &str = "outdoor-gear";

/// 路径片段 → 分类，后出现的规则覆盖前面的
const CATEGORY_RULES: &[(&str, &str)] = &[
    ("/camping-", "camping"),
    ("/fishing-", "fishing"),
    ("/hunting-", "hunting"),
    ("/clothing-", "clothing"),
];

/// `host` 须为小写；完整域名末尾的一个 `.` 会被忽略
pub fn is_cabelas_host(host: &str) -> bool {
    CABELAS_HOST.is_match(host.strip_suffix('.').unwrap_or(host))
}

pub fn is_cabelas_url(raw: &str) -> bool {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| is_cabelas_host(&h.to_ascii_lowercase())))
        .unwrap_or(false)
}

/// 为 Cabela's 链接设置 `affiliate` 参数
///
/// 非 Cabela's 链接、未配置标识、解析失败时均原样返回。
pub fn append_cabelas_affiliate_tag(raw: &str, tag: Option<&str>) -> String {
    if !is_cabelas_url(raw) {
        return raw.to_string();
    }

    let Some(tag) = tag.filter(|t| !t.is_empty()) else {
        warn!("Cabela's affiliate tag not configured");
        return raw.to_string();
    };

    match Url::parse(raw) {
        Ok(url) => rewrite_query(url, &TRACKING_PARAMS, &[("affiliate", tag)]).into(),
        Err(e) => {
            error!("Error processing Cabela's URL {}: {}", raw, e);
            raw.to_string()
        }
    }
}

fn category_for(path: &str) -> &'static str {
    CATEGORY_RULES
        .iter()
        .filter(|(fragment, _)| path.contains(fragment))
        .last()
        .map(|(_, category)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}

/// 从 Cabela's 链接路径提取商品 ID、标题与分类
pub fn extract_cabelas_product_info(raw: &str) -> ProductInfo {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => {
            error!("Error extracting Cabela's product info: {}", e);
            return ProductInfo::default();
        }
    };
    let path = url.path();

    let product_id = PRODUCT_PATH
        .captures(path)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let title = path
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace('-', " "));

    ProductInfo {
        asin: None,
        product_id,
        title,
        category: Some(category_for(path).to_string()),
    }
}
