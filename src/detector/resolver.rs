//! 置信度与版本判定
//! 无版本签名：基础权重逐个乘以命中模式权重，超过阈值即停止
//! 多版本签名：每个版本变体独立完整评估，取置信度严格最高者，平局取先声明者

use tracing::debug;

use crate::compiler::{Pattern, Signature, SignatureRules, VersionRule};
use crate::extractor::EvidenceBundle;
use crate::rule::DetectionOutcome;

use super::matcher::PatternMatcher;

/// 无版本签名的提前结束阈值（严格大于）
pub const EARLY_EXIT_THRESHOLD: f64 = 0.8;

/// 置信度判定器
pub struct ConfidenceResolver;

impl ConfidenceResolver {
    /// 判定单个签名，无任何命中返回 None
    pub fn resolve(signature: &Signature, evidence: &EvidenceBundle) -> Option<DetectionOutcome> {
        match signature.rules() {
            SignatureRules::Patterns(patterns) => Self::resolve_unversioned(signature, patterns, evidence),
            SignatureRules::Versions(versions) => Self::resolve_versioned(signature, versions, evidence),
        }
    }

    fn resolve_unversioned(
        signature: &Signature,
        patterns: &[Pattern],
        evidence: &EvidenceBundle,
    ) -> Option<DetectionOutcome> {
        let (confidence, matched) = score(signature.name(), signature.base_weight(), patterns, evidence, true);
        if matched == 0 {
            return None;
        }
        Some(DetectionOutcome {
            name: signature.name().to_string(),
            version: None,
            confidence: to_percent(confidence),
        })
    }

    fn resolve_versioned(
        signature: &Signature,
        versions: &[VersionRule],
        evidence: &EvidenceBundle,
    ) -> Option<DetectionOutcome> {
        let mut best: Option<(&VersionRule, f64)> = None;

        for version in versions {
            let (confidence, matched) =
                score(signature.name(), version.weight(), version.patterns(), evidence, false);
            if matched == 0 {
                continue;
            }
            debug!(
                "{} candidate `{}`: {} matches, confidence {:.4}",
                signature.name(),
                version.label(),
                matched,
                confidence
            );
            // 严格大于才替换，平局保留先声明的变体
            if best.is_none_or(|(_, top)| confidence > top) {
                best = Some((version, confidence));
            }
        }

        best.map(|(version, confidence)| DetectionOutcome {
            name: signature.name().to_string(),
            version: Some(version.label().to_string()),
            confidence: to_percent(confidence),
        })
    }
}

/// 按声明顺序累乘命中模式权重，返回 (置信度, 命中数)
fn score(
    name: &str,
    start: f64,
    patterns: &[Pattern],
    evidence: &EvidenceBundle,
    early_exit: bool,
) -> (f64, usize) {
    let mut confidence = start;
    let mut matched = 0;

    for pattern in patterns {
        if !PatternMatcher::matches(pattern, evidence) {
            continue;
        }
        confidence *= pattern.weight();
        matched += 1;
        debug!(
            "{} matched {} `{}` (weight {})",
            name,
            pattern.kind().kind_name(),
            pattern.kind().describe(),
            pattern.weight()
        );
        if early_exit && confidence > EARLY_EXIT_THRESHOLD {
            break;
        }
    }

    (confidence, matched)
}

/// 置信度转百分制并钳制到 [0, 100]
pub fn to_percent(confidence: f64) -> u8 {
    (confidence * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::PatternKind;
    use regex::Regex;

    fn html(re: &str, weight: f64) -> Pattern {
        Pattern::with_weight(PatternKind::Html(Regex::new(re).unwrap()), weight).unwrap()
    }

    fn page(html: &str) -> EvidenceBundle {
        EvidenceBundle {
            raw_html: html.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_unversioned_multiplies_matched_weights() {
        let signature = Signature::unversioned(
            "Stack",
            "misc",
            0.8,
            vec![html("a", 0.9), html("missing", 0.1), html("b", 0.5)],
        )
        .unwrap();
        let outcome = ConfidenceResolver::resolve(&signature, &page("a b")).unwrap();
        assert_eq!(outcome.version, None);
        assert_eq!(outcome.confidence, 36);

        assert!(ConfidenceResolver::resolve(&signature, &page("nothing")).is_none());
    }

    #[test]
    fn test_early_exit_depends_on_declaration_order() {
        // 1.0 > 0.8：首个命中后立即停止，后续低权重模式不再参与
        let strong_first = Signature::unversioned(
            "Ordered",
            "misc",
            1.0,
            vec![html("a", 1.0), html("b", 0.5)],
        )
        .unwrap();
        assert_eq!(
            ConfidenceResolver::resolve(&strong_first, &page("a b")).unwrap().confidence,
            100
        );

        let weak_first = Signature::unversioned(
            "Ordered",
            "misc",
            1.0,
            vec![html("b", 0.5), html("a", 1.0)],
        )
        .unwrap();
        assert_eq!(
            ConfidenceResolver::resolve(&weak_first, &page("a b")).unwrap().confidence,
            50
        );
    }

    #[test]
    fn test_versioned_picks_strictly_highest() {
        let versions = vec![
            VersionRule::new("v1", 0.9, vec![html("legacy", 0.5)]).unwrap(),
            VersionRule::new("v2", 0.9, vec![html("modern", 0.8), html("extra", 1.0)]).unwrap(),
            VersionRule::new("v3", 0.9, vec![html("future", 1.0)]).unwrap(),
        ];
        let signature = Signature::versioned("Lib", "misc", 1.0, versions).unwrap();

        let outcome = ConfidenceResolver::resolve(&signature, &page("legacy modern extra")).unwrap();
        assert_eq!(outcome.version.as_deref(), Some("v2"));
        assert_eq!(outcome.confidence, 72);

        assert!(ConfidenceResolver::resolve(&signature, &page("unrelated")).is_none());
    }

    #[test]
    fn test_versioned_tie_goes_to_first_declared() {
        let versions = vec![
            VersionRule::new("first", 0.9, vec![html("shared", 1.0)]).unwrap(),
            VersionRule::new("second", 0.9, vec![html("shared", 1.0)]).unwrap(),
        ];
        let signature = Signature::versioned("Lib", "misc", 1.0, versions).unwrap();
        let outcome = ConfidenceResolver::resolve(&signature, &page("shared")).unwrap();
        assert_eq!(outcome.version.as_deref(), Some("first"));
        assert_eq!(outcome.confidence, 90);
    }

    #[test]
    fn test_versioned_variants_have_no_early_exit() {
        // 变体内部不提前结束：两个模式都参与累乘
        let versions = vec![VersionRule::new("only", 1.0, vec![html("a", 1.0), html("b", 0.5)]).unwrap()];
        let signature = Signature::versioned("Lib", "misc", 1.0, versions).unwrap();
        assert_eq!(
            ConfidenceResolver::resolve(&signature, &page("a b")).unwrap().confidence,
            50
        );
    }

    #[test]
    fn test_to_percent_bounds() {
        assert_eq!(to_percent(0.0), 0);
        assert_eq!(to_percent(0.724), 72);
        assert_eq!(to_percent(1.0), 100);
        assert_eq!(to_percent(1.7), 100);
        assert_eq!(to_percent(-0.2), 0);
    }
}
