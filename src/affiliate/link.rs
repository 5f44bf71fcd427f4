//! 出站链接生成
//!
//! 站内页面渲染商品链接时使用：先打联盟标签，再包一层 `/out?url=...`，
//! 让点击经过跳转端点记录。

use tracing::error;
use url::Url;

use super::{AffiliateSource, AffiliateTagger, resolve_source_str, rewrite_query};
use crate::errors::Result;

/// 跳转端点路径
pub const OUT_PATH: &str = "/out";

/// 生成经由 `/out` 的出站链接
///
/// 任一步失败时返回原始 URL。
pub fn build_out_link(
    tagger: &AffiliateTagger,
    raw: &str,
    tracking_params: &[(String, String)],
    base_url: &str,
) -> String {
    match try_build_out_link(tagger, raw, tracking_params, base_url) {
        Ok(link) => link,
        Err(e) => {
            error!("Error generating affiliate link for {}: {}", raw, e);
            raw.to_string()
        }
    }
}

fn try_build_out_link(
    tagger: &AffiliateTagger,
    raw: &str,
    tracking_params: &[(String, String)],
    base_url: &str,
) -> Result<String> {
    let mut target = tagger.append_affiliate_tag(raw)?;

    if !tracking_params.is_empty() {
        let keys: Vec<&str> = tracking_params.iter().map(|(k, _)| k.as_str()).collect();
        let pairs: Vec<(&str, &str)> = tracking_params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        target = rewrite_query(Url::parse(&target)?, &keys, &pairs).into();
    }

    let mut out = Url::parse(base_url)?.join(OUT_PATH)?;
    out.query_pairs_mut().append_pair("url", &target);
    Ok(out.into())
}

/// 判断 URL 是否已带有联盟标识
pub fn is_affiliate_link(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    let param = match resolve_source_str(raw) {
        AffiliateSource::Amazon => "tag",
        AffiliateSource::Cabelas => "affiliate",
        AffiliateSource::Unknown => return false,
    };
    url.query_pairs().any(|(key, _)| key == param)
}
