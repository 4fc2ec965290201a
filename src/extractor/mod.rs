//! 提取模块：从HTML与响应头中提取证据
pub mod evidence;
pub mod html_extractor;
pub mod script_heuristics;

// 导出核心接口
pub use self::evidence::EvidenceBundle;
pub use self::html_extractor::HtmlExtractor;
pub use self::script_heuristics::ScriptHeuristics;
