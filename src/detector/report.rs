//! 检测报告构建：按分类顺序、签名声明顺序汇总判定结果
use crate::compiler::SignatureCatalog;
use crate::extractor::EvidenceBundle;
use crate::rule::CategoryMap;

use super::resolver::ConfidenceResolver;

/// 报告构建器
pub struct ReportBuilder;

impl ReportBuilder {
    /// 无检测结果的分类同样输出（空列表）
    pub fn build(catalog: &SignatureCatalog, evidence: &EvidenceBundle) -> CategoryMap {
        let mut report = CategoryMap::new();
        for category in catalog.categories() {
            let outcomes = category
                .signatures
                .iter()
                .filter_map(|signature| ConfidenceResolver::resolve(signature, evidence))
                .collect();
            report.push_category(category.name.as_str(), outcomes);
        }
        report
    }
}
