//! 签名库加载管理器
//! 负责加载内置签名库与外部JSON签名库，并编译为可执行签名

use std::path::Path;

use tracing::{debug, info, warn};

use super::model::SignatureCatalogDef;
use crate::compiler::{SignatureCatalog, SignatureCompiler};
use crate::config::ScanConfig;
use crate::error::TdResult;

/// 编译期嵌入的内置签名库
const BUILTIN_SIGNATURES: &str = include_str!("../../data/signatures.json");

/// 签名库加载管理器
pub struct SignatureLoader;

impl SignatureLoader {
    /// 按配置加载签名库：内置签名库 + 可选的外部签名库（追加在后）
    pub async fn load(config: &ScanConfig) -> TdResult<SignatureCatalog> {
        let mut catalog = Self::builtin()?;

        if let Some(path) = &config.signature_path {
            let extra = Self::from_file(path).await?;
            info!(
                "appending {} signatures from {}",
                extra.signature_count(),
                path.display()
            );
            catalog.extend(extra);
        }

        Ok(catalog)
    }

    /// 加载内置签名库
    pub fn builtin() -> TdResult<SignatureCatalog> {
        let catalog = Self::from_json_str(BUILTIN_SIGNATURES)?;
        debug!(
            "builtin signature catalog loaded: {} categories, {} signatures",
            catalog.categories().len(),
            catalog.signature_count()
        );
        Ok(catalog)
    }

    /// 从JSON字符串加载并编译
    pub fn from_json_str(json: &str) -> TdResult<SignatureCatalog> {
        let catalog_def = Self::parse_definitions(json)?;
        SignatureCompiler::compile(&catalog_def)
    }

    /// 仅解析签名定义（不编译）
    pub fn parse_definitions(json: &str) -> TdResult<SignatureCatalogDef> {
        Ok(serde_json::from_str(json)?)
    }

    /// 从本地文件加载并编译
    pub async fn from_file(path: impl AsRef<Path>) -> TdResult<SignatureCatalog> {
        let path = path.as_ref();
        let json = match tokio::fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) => {
                warn!("cannot read signature file {}: {}", path.display(), e);
                return Err(e.into());
            }
        };
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TechDetectiveError;
    use crate::compiler::SignatureRules;

    #[test]
    fn test_builtin_catalog_compiles() {
        let catalog = SignatureLoader::builtin().unwrap();
        let categories: Vec<_> = catalog.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            categories,
            vec![
                "analytics",
                "javascript_frameworks",
                "javascript_libraries",
                "payment_processors",
                "security",
                "cms",
                "web_frameworks",
                "ui_frameworks",
                "server",
                "reverse_proxies",
                "ecommerce",
                "programming_languages",
                "databases",
            ]
        );

        let jquery = catalog.iter().find(|s| s.name() == "jQuery").unwrap();
        assert_eq!(jquery.category(), "javascript_libraries");
        match jquery.rules() {
            SignatureRules::Versions(versions) => {
                assert!(versions.iter().any(|v| v.label() == "jQuery 3.x"));
            }
            SignatureRules::Patterns(_) => panic!("jQuery should be versioned"),
        }
        assert!(catalog.contains("Nginx"));
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(
            SignatureLoader::from_json_str("{not json"),
            Err(TechDetectiveError::JsonError(_))
        ));
    }

    #[tokio::test]
    async fn test_load_appends_extra_file() {
        let path = std::env::temp_dir().join(format!(
            "techdetective-extra-{}.json",
            std::process::id()
        ));
        tokio::fs::write(
            &path,
            r#"{"categories":[
                {"name":"server","signatures":[
                    {"name":"Caddy","weight":0.9,"patterns":[{"type":"header","name":"server","value":"caddy","flags":"i"}]}
                ]},
                {"name":"static_site_generators","signatures":[
                    {"name":"Hugo","weight":0.9,"patterns":[{"type":"meta","name":"generator","content":"Hugo"}]}
                ]}
            ]}"#,
        )
        .await
        .unwrap();

        let config = crate::ConfigManager::custom().signature_path(path.clone()).build();
        let catalog = SignatureLoader::load(&config).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;

        let server = catalog.categories().iter().find(|c| c.name == "server").unwrap();
        assert_eq!(server.signatures.last().unwrap().name(), "Caddy");
        assert_eq!(
            catalog.categories().last().unwrap().name,
            "static_site_generators"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let result = SignatureLoader::from_file("/definitely/not/here.json").await;
        match result {
            Err(TechDetectiveError::IoError(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected result {:?}", other.map(|c| c.signature_count())),
        }
    }
}
