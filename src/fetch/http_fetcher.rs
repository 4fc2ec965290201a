//! 基于 reqwest 的页面拉取器
//! 关闭自动重定向，手动跟随 3xx 并限制次数；整条重定向链共享一个超时

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use super::{FetchedPage, PageFetcher};
use crate::config::ScanConfig;
use crate::error::{FetchError, TdResult, TechDetectiveError};
use crate::utils::HeaderConverter;

/// HTTP 页面拉取器
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// 按配置构建拉取器
    pub fn new(config: &ScanConfig) -> TdResult<Self> {
        let timeout = Duration::from_secs(config.http_timeout);
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .redirect(Policy::none());
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| TechDetectiveError::config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// 解析输入地址，仅支持 http/https
    pub fn parse_url(url: &str) -> Result<Url, FetchError> {
        let parsed = Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(FetchError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme `{}`", other),
            }),
        }
    }

    async fn follow(&self, url: &str, max_redirects: usize) -> Result<FetchedPage, FetchError> {
        let mut current = Self::parse_url(url)?;
        let mut redirects = 0usize;

        loop {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| transport_error(e, &current))?;
            let status = response.status();

            if status.is_redirection() {
                if let Some(location) = response.headers().get(LOCATION) {
                    if redirects >= max_redirects {
                        return Err(FetchError::TooManyRedirects {
                            limit: max_redirects,
                        });
                    }
                    let location = location.to_str().map_err(|_| {
                        FetchError::Transport(format!("non-ASCII Location header from {}", current))
                    })?;
                    // 相对地址按当前地址解析
                    let next = current.join(location).map_err(|e| FetchError::InvalidUrl {
                        url: location.to_string(),
                        reason: e.to_string(),
                    })?;
                    debug!("redirect {} -> {} ({})", current, next, status.as_u16());
                    current = next;
                    redirects += 1;
                    continue;
                }
            }

            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    url: current.to_string(),
                });
            }

            let headers = HeaderConverter::to_single_value(&HeaderConverter::to_hashmap(
                response.headers(),
            ));
            let body = response
                .bytes()
                .await
                .map_err(|e| transport_error(e, &current))?;

            return Ok(FetchedPage {
                final_url: current.to_string(),
                body: String::from_utf8_lossy(&body).into_owned(),
                headers,
            });
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, max_redirects: usize) -> Result<FetchedPage, FetchError> {
        let start = Instant::now();
        let result = match timeout(self.timeout, self.follow(url, max_redirects)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(format!(
                "{} did not answer within {:?}",
                url, self.timeout
            ))),
        };

        match &result {
            Ok(page) => debug!(
                "fetched {} ({} bytes) in {:?}",
                page.final_url,
                page.body.len(),
                start.elapsed()
            ),
            Err(e) => warn!("fetch {} failed: {}", url, e),
        }
        result
    }
}

fn transport_error(error: reqwest::Error, url: &Url) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(format!("{}: {}", url, error))
    } else {
        FetchError::Transport(format!("{}: {}", url, error))
    }
}
