//! techdetective - 网站技术栈指纹识别
//! 正则证据提取 + 加权签名匹配 + 版本判定

// 导出全局错误类型
pub use self::error::{FetchError, TechDetectiveError, TdResult};

// 导出配置模块
pub use self::config::{ConfigManager, CustomConfigBuilder, ScanConfig};

// 导出规则模块核心接口
pub use self::rule::{
    CategoryDef, CategoryMap, DetectionOutcome, PatternDef, ScanFailure, ScanReport,
    SignatureCatalogDef, SignatureDef, SignatureLoader, VersionDef,
};

// 导出提取模块核心接口
pub use self::extractor::{EvidenceBundle, HtmlExtractor};

// 导出编译模块核心接口
pub use self::compiler::{Pattern, PatternKind, Signature, SignatureCatalog, SignatureCompiler, VersionRule};

// 导出检测模块核心接口
pub use self::detector::{ConfidenceResolver, PatternMatcher, ReportBuilder, SignatureRegistry, TechDetector};

// 导出拉取模块核心接口
pub use self::fetch::{FetchedPage, HttpFetcher, PageFetcher};

// 导出工具模块核心接口
pub use self::utils::HeaderConverter;

// 声明所有子模块
pub mod config;
pub mod error;
pub mod rule;
pub mod extractor;
pub mod utils;
pub mod compiler;
pub mod detector;
pub mod fetch;
