//! 联盟点击记录
//!
//! 每次跳转生成一条点击事件，经 [`ClickLogger`] 异步交给 [`ClickSink`]。
//! 投递语义为至多一次、尽力而为：丢失记录不会影响跳转本身。

pub mod logger;
pub mod sink;

pub use logger::ClickLogger;
pub use sink::{ClickSink, JsonLinesSink, NoopSink, StdoutSink, build_sink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::affiliate::{AffiliateSource, ProductInfo, extract_product_info, resolve_source_str};

/// 跳转端点采集到的原始点击
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateClick {
    pub timestamp: DateTime<Utc>,
    /// 调用方传入的目标 URL
    pub original_url: String,
    /// 打完标签后实际跳转的 URL
    pub final_url: String,
    pub user_agent: String,
    pub referrer: String,
    /// 国家代码（由 CDN 请求头提供）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_location: Option<String>,
}

/// 补全来源与商品信息后交给 sink 的记录，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRecord {
    pub timestamp: DateTime<Utc>,
    pub original_url: String,
    pub final_url: String,
    pub user_agent: String,
    pub referrer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_location: Option<String>,
    pub source: AffiliateSource,
    pub product_info: ProductInfo,
}

impl ClickRecord {
    /// 按原始 URL 解析来源与商品信息，时间戳改为服务端记录时间
    pub fn enrich(click: AffiliateClick) -> Self {
        let source = resolve_source_str(&click.original_url);
        let product_info = extract_product_info(source, &click.original_url);

        Self {
            timestamp: Utc::now(),
            original_url: click.original_url,
            final_url: click.final_url,
            user_agent: click.user_agent,
            referrer: click.referrer,
            geo_location: click.geo_location,
            source,
            product_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(url: &str) -> AffiliateClick {
        AffiliateClick {
            timestamp: Utc::now(),
            original_url: url.to_string(),
            final_url: url.to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            referrer: String::new(),
            geo_location: Some("US".to_string()),
        }
    }

    #[test]
    fn test_enrich_amazon() {
        let record = ClickRecord::enrich(click("https://www.amazon.com/dp/B000123456"));
        assert_eq!(record.source, AffiliateSource::Amazon);
        assert_eq!(record.product_info.asin.as_deref(), Some("B000123456"));
        assert_eq!(record.geo_location.as_deref(), Some("US"));
    }

    #[test]
    fn test_enrich_unknown_has_empty_product_info() {
        let record = ClickRecord::enrich(click("https://example.com/page"));
        assert_eq!(record.source, AffiliateSource::Unknown);
        assert!(record.product_info.is_empty());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = ClickRecord::enrich(click("https://www.cabelas.com/product/abc"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["source"], "cabelas");
        assert_eq!(json["originalUrl"], "https://www.cabelas.com/product/abc");
        assert_eq!(json["productInfo"]["productId"], "abc");
        assert_eq!(json["geoLocation"], "US");
    }
}
