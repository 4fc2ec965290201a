//! 页面拉取模块：拉取协作者接口与基于 reqwest 的实现
use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::FetchError;

pub mod http_fetcher;

pub use self::http_fetcher::HttpFetcher;

/// 拉取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// 跟随重定向后的最终地址
    pub final_url: String,
    pub body: String,
    /// 小写Header名 -> 值（同名取首个非空值）
    pub headers: HashMap<String, String>,
}

/// 页面拉取协作者
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, max_redirects: usize) -> Result<FetchedPage, FetchError>;
}
