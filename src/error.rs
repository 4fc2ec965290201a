//! 全局错误类型定义

use std::io::Error as IoError;

use regex::Error as RegexError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// 页面拉取错误（外部拉取协作者上报，原样透传给调用方）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("too many redirects (limit {limit})")]
    TooManyRedirects { limit: usize },
    #[error("unexpected status code {status} from {url}")]
    Status { status: u16, url: String },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum TechDetectiveError {
    // 签名配置错误（加载/编译/注册时立即失败）
    #[error("signature configuration error: {0}")]
    ConfigurationError(String),
    #[error("regex compile failed: {0}")]
    RegexCompileError(#[from] RegexError),

    // 拉取错误
    #[error("fetch failed: {0}")]
    FetchFailure(#[from] FetchError),

    // 序列化/反序列化错误
    #[error("JSON parse failed: {0}")]
    JsonError(#[from] SerdeJsonError),

    // 基础错误
    #[error("IO failed: {0}")]
    IoError(#[from] IoError),
}

impl TechDetectiveError {
    /// 构造配置错误的便捷方法
    pub fn config(msg: impl Into<String>) -> Self {
        TechDetectiveError::ConfigurationError(msg.into())
    }
}

// 全局Result类型
pub type TdResult<T> = Result<T, TechDetectiveError>;
