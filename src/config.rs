//! 全局配置管理,存储所有可配置项

use std::path::PathBuf;

/// 默认User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("techdetective/", env!("CARGO_PKG_VERSION"));

/// 扫描配置
#[derive(Debug, Clone)]
pub struct ScanConfig {
    // 请求超时（单位：秒）
    pub http_timeout: u64,
    // 最大重定向次数
    pub max_redirects: usize,
    // 请求User-Agent
    pub user_agent: String,
    // 额外签名库路径（追加在内置签名库之后）
    pub signature_path: Option<PathBuf>,
    // 是否使用系统代理（HTTP_PROXY 等环境变量）
    pub system_proxy: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            http_timeout: 10,
            max_redirects: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            signature_path: None,
            system_proxy: true,
        }
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> ScanConfig {
        ScanConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone, Default)]
pub struct CustomConfigBuilder {
    config: ScanConfig,
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn http_timeout(mut self, timeout: u64) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.config.max_redirects = max_redirects;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn signature_path(mut self, path: PathBuf) -> Self {
        self.config.signature_path = Some(path);
        self
    }

    pub fn system_proxy(mut self, enabled: bool) -> Self {
        self.config.system_proxy = enabled;
        self
    }

    pub fn build(self) -> ScanConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = ConfigManager::custom()
            .http_timeout(3)
            .max_redirects(0)
            .user_agent("scanner/1.0")
            .signature_path(PathBuf::from("extra.json"))
            .build();

        assert_eq!(config.http_timeout, 3);
        assert_eq!(config.max_redirects, 0);
        assert_eq!(config.user_agent, "scanner/1.0");
        assert_eq!(config.signature_path, Some(PathBuf::from("extra.json")));
        assert!(config.system_proxy);
    }

    #[test]
    fn test_default_config() {
        let config = ConfigManager::get_default();
        assert_eq!(config.http_timeout, 10);
        assert_eq!(config.max_redirects, 5);
        assert!(config.user_agent.starts_with("techdetective/"));
        assert!(config.signature_path.is_none());
        assert!(config.system_proxy);
    }
}
