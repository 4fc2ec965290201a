//! 规则模块：签名定义数据模型、检测结果模型与签名库加载
pub mod model;
pub mod loader;

// 导出核心接口
pub use self::model::{
    CategoryDef, CategoryMap, DetectionOutcome, PatternDef, ScanFailure, ScanReport,
    SignatureCatalogDef, SignatureDef, VersionDef,
};
pub use self::loader::SignatureLoader;
