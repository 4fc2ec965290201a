//! 检测器核心：整合注册表、证据提取、置信度判定与页面拉取，输出检测结果
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use reqwest::header::HeaderMap;
use tracing::{debug, info, warn};

use super::registry::SignatureRegistry;
use super::report::ReportBuilder;
use crate::config::ScanConfig;
use crate::error::{TdResult, TechDetectiveError};
use crate::extractor::HtmlExtractor;
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::rule::{CategoryMap, ScanReport};
use crate::utils::HeaderConverter;

/// 技术检测器
#[derive(Clone)]
pub struct TechDetector {
    registry: Arc<SignatureRegistry>,
    fetcher: Arc<dyn PageFetcher>,
    config: ScanConfig,
}

impl TechDetector {
    /// 创建检测器（按配置加载签名库，默认使用 HTTP 拉取器）
    pub async fn new(config: ScanConfig) -> TdResult<Self> {
        let registry = SignatureRegistry::load(&config).await?;
        Self::with_registry(config, Arc::new(registry))
    }

    /// 使用外部注册表创建检测器（注册表可在多个检测器间共享）
    pub fn with_registry(config: ScanConfig, registry: Arc<SignatureRegistry>) -> TdResult<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        info!(
            "detector created: {} signatures, timeout {}s, max redirects {}",
            registry.signature_count(),
            config.http_timeout,
            config.max_redirects
        );
        Ok(Self {
            registry,
            fetcher: Arc::new(fetcher),
            config,
        })
    }

    /// 替换页面拉取器
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn registry(&self) -> &Arc<SignatureRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// 对已拉取的页面执行检测
    pub fn detect(&self, html: &str, headers: &HashMap<String, String>) -> CategoryMap {
        let start = Instant::now();
        let catalog = self.registry.snapshot();
        let evidence = HtmlExtractor::extract(html, headers);
        let report = ReportBuilder::build(&catalog, &evidence);
        debug!(
            "detection finished in {:?}: {} technologies in {} categories",
            start.elapsed(),
            report.detection_count(),
            report.len()
        );
        report
    }

    /// 检测接口（reqwest HeaderMap 头）
    pub fn detect_with_header_map(&self, html: &str, headers: &HeaderMap) -> CategoryMap {
        let headers = HeaderConverter::to_single_value(&HeaderConverter::to_hashmap(headers));
        self.detect(html, &headers)
    }

    /// 拉取并检测单个页面，拉取失败原样返回，不做任何提取
    pub async fn scan(&self, url: &str) -> TdResult<ScanReport> {
        let start = Instant::now();
        let page = match self.fetcher.fetch(url, self.config.max_redirects).await {
            Ok(page) => page,
            Err(e) => {
                warn!("scan of {} aborted: {}", url, e);
                return Err(TechDetectiveError::FetchFailure(e));
            }
        };
        if page.final_url != url {
            debug!("{} resolved to {}", url, page.final_url);
        }

        let technologies = self.detect(&page.body, &page.headers);
        info!(
            "scanned {} in {:?}: {} technologies detected",
            url,
            start.elapsed(),
            technologies.detection_count()
        );
        Ok(ScanReport::new(url, technologies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigManager;

    fn detector() -> TechDetector {
        let registry = Arc::new(SignatureRegistry::builtin().unwrap());
        TechDetector::with_registry(ConfigManager::get_default(), registry).unwrap()
    }

    #[test]
    fn test_detect_builtin_nginx() {
        let mut headers = HashMap::new();
        headers.insert("Server".to_string(), "nginx/1.18.0".to_string());
        let report = detector().detect("", &headers);

        let server = report.get("server").unwrap();
        assert_eq!(server.len(), 1);
        assert_eq!(server[0].name, "Nginx");
        assert_eq!(server[0].confidence, 90);
    }

    #[test]
    fn test_detect_with_header_map() {
        let mut headers = HeaderMap::new();
        headers.insert("x-powered-by", "Express".parse().unwrap());
        let report = detector().detect_with_header_map("<html></html>", &headers);
        let (category, outcome) = report.find("Express").unwrap();
        assert_eq!(category, "server");
        assert_eq!(outcome.confidence, 80);
    }

    #[test]
    fn test_registry_is_shared() {
        let detector = detector();
        let shared = Arc::clone(detector.registry());
        shared.delete_by_name("Nginx");

        let mut headers = HashMap::new();
        headers.insert("server".to_string(), "nginx".to_string());
        assert!(detector.detect("", &headers).find("Nginx").is_none());
    }
}
