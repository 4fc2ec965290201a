//! 单模式匹配器：按证据类型分派，扫描期不会失败
use crate::compiler::{Pattern, PatternKind};
use crate::extractor::EvidenceBundle;

/// 模式匹配器
pub struct PatternMatcher;

impl PatternMatcher {
    /// 判断单条模式是否命中证据集合
    pub fn matches(pattern: &Pattern, evidence: &EvidenceBundle) -> bool {
        Self::matches_kind(pattern.kind(), evidence)
    }

    pub fn matches_kind(kind: &PatternKind, evidence: &EvidenceBundle) -> bool {
        match kind {
            PatternKind::Html(regex) => regex.is_match(&evidence.raw_html),
            PatternKind::Script(regex) => evidence.script_sources.iter().any(|s| regex.is_match(s)),
            PatternKind::Css(regex) => evidence.style_sources.iter().any(|s| regex.is_match(s)),
            PatternKind::Header { name, value } => {
                Self::keyed(evidence.headers.get(name), value.as_ref())
            }
            PatternKind::Meta { name, content } => {
                Self::keyed(evidence.meta_tags.get(name), content.as_ref())
            }
            PatternKind::Cookie(regex) => evidence
                .client_cookies
                .iter()
                .any(|(name, _)| regex.is_match(name)),
            PatternKind::JsGlobal { ident, word } => {
                evidence.inferred_globals.contains(ident) || word.is_match(&evidence.raw_html)
            }
            PatternKind::NetworkRequest(regex) => {
                regex.is_match(&evidence.raw_html)
                    || evidence
                        .inferred_request_urls
                        .iter()
                        .any(|url| regex.is_match(url))
            }
            PatternKind::JsVersion { probe, version } => evidence
                .client_version(probe)
                .is_some_and(|v| version.is_match(v)),
            PatternKind::HtmlComment { regex, literal } => evidence.comments.iter().any(|comment| {
                regex.is_match(comment)
                    && literal.as_deref().is_none_or(|l| comment.contains(l))
            }),
        }
    }

    /// 键存在性 + 可选值正则
    fn keyed(found: Option<&String>, regex: Option<&regex::Regex>) -> bool {
        match (found, regex) {
            (Some(value), Some(regex)) => regex.is_match(value),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}
