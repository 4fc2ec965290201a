//! 检测模块：模式匹配、置信度判定、签名注册表与检测器门面
pub mod matcher;
pub mod resolver;
pub mod registry;
pub mod report;
pub mod detector;

// 导出核心接口
pub use self::matcher::PatternMatcher;
pub use self::resolver::{ConfidenceResolver, EARLY_EXIT_THRESHOLD};
pub use self::registry::SignatureRegistry;
pub use self::report::ReportBuilder;
pub use self::detector::TechDetector;
