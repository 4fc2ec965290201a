//! 编译模块：将签名定义编译为可执行的模式变体
pub mod pattern;
pub mod compiler;

pub use self::pattern::{
    CategorySignatures, Pattern, PatternKind, Signature, SignatureCatalog, SignatureRules,
    VersionRule, DEFAULT_WEIGHT,
};
pub use self::compiler::SignatureCompiler;
