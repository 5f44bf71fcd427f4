//! Affiliate tagging
//!
//! Classifies outbound URLs by retailer and rewrites their query strings so
//! that the site's own affiliate identifiers are the only ones present.
//!
//! # Components
//! - [`AffiliateSource`] / [`resolve_source`]: hostname → retailer
//! - [`amazon`], [`cabelas`]: per-retailer appenders and product extractors
//! - [`AffiliateTagger`]: configured dispatcher used by the `/out` endpoint
//! - [`link`]: outbound link builder and already-tagged detection

pub mod amazon;
pub mod cabelas;
pub mod link;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter};
use url::Url;

use crate::config::AffiliateConfig;
use crate::utils::{UrlValidationError, ValidatedUrl, validate_external_url};

pub use link::{build_out_link, is_affiliate_link};

/// 联盟来源
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AffiliateSource {
    Amazon,
    Cabelas,
    Unknown,
}

/// 按检查顺序排列的主机名匹配表，先命中者生效
const SOURCE_MATCHERS: &[(AffiliateSource, fn(&str) -> bool)] = &[
    (AffiliateSource::Amazon, amazon::is_amazon_host),
    (AffiliateSource::Cabelas, cabelas::is_cabelas_host),
];

impl AffiliateSource {
    /// 根据主机名判断来源（大小写不敏感）
    pub fn from_host(host: &str) -> Self {
        let host = host.to_ascii_lowercase();
        SOURCE_MATCHERS
            .iter()
            .find(|(_, matches)| matches(host.as_str()))
            .map(|(source, _)| *source)
            .unwrap_or(AffiliateSource::Unknown)
    }

    /// 是否为已接入的联盟零售商
    pub fn is_affiliate(self) -> bool {
        !matches!(self, AffiliateSource::Unknown)
    }
}

impl std::fmt::Display for AffiliateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Resolve the retailer of an already validated URL.
pub fn resolve_source(url: &ValidatedUrl) -> AffiliateSource {
    AffiliateSource::from_host(url.host())
}

/// Resolve the retailer of an arbitrary URL string; unparseable input is `Unknown`.
pub fn resolve_source_str(raw: &str) -> AffiliateSource {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(AffiliateSource::from_host))
        .unwrap_or(AffiliateSource::Unknown)
}

/// 从 URL 路径中提取的商品信息，仅用于丰富点击日志
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ProductInfo {
    pub fn is_empty(&self) -> bool {
        self.asin.is_none()
            && self.product_id.is_none()
            && self.title.is_none()
            && self.category.is_none()
    }
}

/// Extract product metadata with the extractor matching `source`.
///
/// Best effort: unknown sources and unparseable URLs yield an empty record.
pub fn extract_product_info(source: AffiliateSource, raw: &str) -> ProductInfo {
    match source {
        AffiliateSource::Amazon => amazon::extract_amazon_product_info(raw),
        AffiliateSource::Cabelas => cabelas::extract_cabelas_product_info(raw),
        AffiliateSource::Unknown => ProductInfo::default(),
    }
}

/// 重写查询串：先删除 `strip` 中的参数，再追加 `params`
///
/// 先删后加保证重复应用结果一致。
pub(crate) fn rewrite_query(mut url: Url, strip: &[&str], params: &[(&str, &str)]) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !strip.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .extend_pairs(params.iter());

    url
}

/// 联盟标签分发器
///
/// 持有启动时加载的各零售商标识，按来源选择对应的改写函数。
#[derive(Debug, Clone, Default)]
pub struct AffiliateTagger {
    amazon_tag: Option<String>,
    cabelas_tag: Option<String>,
}

impl AffiliateTagger {
    pub fn new(config: &AffiliateConfig) -> Self {
        Self {
            amazon_tag: config.amazon_tag().map(String::from),
            cabelas_tag: config.cabelas_tag().map(String::from),
        }
    }

    pub fn with_tags(amazon_tag: Option<&str>, cabelas_tag: Option<&str>) -> Self {
        Self {
            amazon_tag: amazon_tag.filter(|t| !t.is_empty()).map(String::from),
            cabelas_tag: cabelas_tag.filter(|t| !t.is_empty()).map(String::from),
        }
    }

    pub fn amazon_tag(&self) -> Option<&str> {
        self.amazon_tag.as_deref()
    }

    pub fn cabelas_tag(&self) -> Option<&str> {
        self.cabelas_tag.as_deref()
    }

    /// Tag a validated URL, returning the resolved source alongside the result.
    ///
    /// Unknown retailers pass through as the caller's original string.
    pub fn tag(&self, url: &ValidatedUrl) -> (AffiliateSource, String) {
        let source = resolve_source(url);
        let tagged = match source {
            AffiliateSource::Amazon => {
                amazon::append_amazon_affiliate_tag(url.as_str(), self.amazon_tag())
            }
            AffiliateSource::Cabelas => {
                cabelas::append_cabelas_affiliate_tag(url.as_str(), self.cabelas_tag())
            }
            AffiliateSource::Unknown => url.as_str().to_string(),
        };
        (source, tagged)
    }

    /// Validate `raw` and append the matching affiliate tag.
    pub fn append_affiliate_tag(&self, raw: &str) -> Result<String, UrlValidationError> {
        let validated = validate_external_url(raw)?;
        Ok(self.tag(&validated).1)
    }
}
