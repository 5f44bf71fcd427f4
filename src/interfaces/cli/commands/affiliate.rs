//! Affiliate link commands: tag / link / inspect

use colored::Colorize;
use serde::Serialize;

use crate::affiliate::{
    AffiliateSource, AffiliateTagger, ProductInfo, build_out_link, extract_product_info,
    is_affiliate_link, resolve_source_str,
};
use crate::config::StaticConfig;
use crate::interfaces::cli::CliError;
use crate::utils::validate_external_url;

/// 打联盟标签并输出结果 URL
pub fn tag_url(config: &StaticConfig, url: &str) -> Result<(), CliError> {
    let validated =
        validate_external_url(url).map_err(|e| CliError::ParseError(e.to_string()))?;
    let tagger = AffiliateTagger::new(&config.affiliate);
    let (source, tagged) = tagger.tag(&validated);

    let tag_missing = match source {
        AffiliateSource::Amazon => tagger.amazon_tag().is_none(),
        AffiliateSource::Cabelas => tagger.cabelas_tag().is_none(),
        AffiliateSource::Unknown => false,
    };
    if tag_missing {
        eprintln!(
            "{} no {} affiliate tag configured, URL left unchanged",
            "Warning:".yellow().bold(),
            source
        );
    }

    println!("{}", tagged);
    Ok(())
}

/// 生成 `/out?url=...` 链接
pub fn link_url(
    config: &StaticConfig,
    url: &str,
    params: &[(String, String)],
    base_url: Option<&str>,
) -> Result<(), CliError> {
    validate_external_url(url).map_err(|e| CliError::ParseError(e.to_string()))?;

    let tagger = AffiliateTagger::new(&config.affiliate);
    let base_url = base_url.unwrap_or(&config.site.base_url);
    let link = build_out_link(&tagger, url, params, base_url);

    if link == url {
        return Err(CliError::CommandError(format!(
            "could not build an outbound link for {} with base URL {}",
            url, base_url
        )));
    }

    println!("{}", link);
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectReport {
    url: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_error: Option<String>,
    source: AffiliateSource,
    tagged: bool,
    product_info: ProductInfo,
}

/// 输出 URL 的来源、商品信息和校验结果
pub fn inspect_url(url: &str, json: bool) -> Result<(), CliError> {
    let validation_error = validate_external_url(url).err().map(|e| e.to_string());
    let source = resolve_source_str(url);

    let report = InspectReport {
        url: url.to_string(),
        valid: validation_error.is_none(),
        validation_error,
        source,
        tagged: is_affiliate_link(url),
        product_info: extract_product_info(source, url),
    };

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::CommandError(e.to_string()))?;
        println!("{}", out);
        return Ok(());
    }

    println!("{} {}", "URL:".bold(), report.url.blue());
    match &report.validation_error {
        None => println!("{} {}", "Valid:".bold(), "yes".green()),
        Some(e) => println!("{} {} ({})", "Valid:".bold(), "no".red(), e),
    }
    println!("{} {}", "Source:".bold(), report.source);
    println!("{} {}", "Has affiliate tag:".bold(), report.tagged);

    let info = &report.product_info;
    if info.is_empty() {
        println!("{} {}", "Product:".bold(), "-".dimmed());
    } else {
        for (label, value) in [
            ("ASIN", &info.asin),
            ("Product ID", &info.product_id),
            ("Title", &info.title),
            ("Category", &info.category),
        ] {
            if let Some(value) = value {
                println!("  {} {}", format!("{}:", label).cyan(), value);
            }
        }
    }

    Ok(())
}
