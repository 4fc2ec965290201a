//! 编译后签名模型
//! 每种证据类型对应一个模式变体，只携带该类型需要的字段

use std::sync::Arc;

use regex::Regex;

use crate::error::{TdResult, TechDetectiveError};

/// 模式未声明权重时的默认值（命中不扣减置信度）
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// 模式匹配方式（按证据类型区分）
#[derive(Debug, Clone)]
pub enum PatternKind {
    /// 匹配原始HTML
    Html(Regex),
    /// 匹配任一 script src
    Script(Regex),
    /// 匹配任一样式表链接
    Css(Regex),
    /// 响应头存在性 / 值匹配
    Header { name: String, value: Option<Regex> },
    /// meta 标签存在性 / 内容匹配
    Meta { name: String, content: Option<Regex> },
    /// 匹配脚本写入的 Cookie 名
    Cookie(Regex),
    /// 全局标识符（推断集合命中或原文中独立出现）
    JsGlobal { ident: String, word: Regex },
    /// 外发请求URL（原文或推断URL列表）
    NetworkRequest(Regex),
    /// 客户端库版本探针
    JsVersion { probe: String, version: Regex },
    /// HTML 注释
    HtmlComment { regex: Regex, literal: Option<String> },
}

impl PatternKind {
    /// 构造全局标识符模式，同时生成“独立单词”正则
    pub fn js_global(ident: impl Into<String>) -> TdResult<Self> {
        let ident = ident.into();
        let valid = ident
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
            && ident
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        if !valid {
            return Err(TechDetectiveError::config(format!(
                "`{}` is not a valid JavaScript identifier",
                ident
            )));
        }

        // JS 标识符字符集包含 `$`，\b 不适用
        let word = Regex::new(&format!(
            r"(?:^|[^A-Za-z0-9_$]){}(?:[^A-Za-z0-9_$]|$)",
            regex::escape(&ident)
        ))?;
        Ok(PatternKind::JsGlobal { ident, word })
    }

    /// 证据类型名称（与签名库 `type` 字段一致）
    pub fn kind_name(&self) -> &'static str {
        match self {
            PatternKind::Html(_) => "html",
            PatternKind::Script(_) => "script",
            PatternKind::Css(_) => "css",
            PatternKind::Header { .. } => "header",
            PatternKind::Meta { .. } => "meta",
            PatternKind::Cookie(_) => "cookie",
            PatternKind::JsGlobal { .. } => "jsGlobal",
            PatternKind::NetworkRequest(_) => "networkRequest",
            PatternKind::JsVersion { .. } => "jsVersion",
            PatternKind::HtmlComment { .. } => "htmlComment",
        }
    }

    /// 规则描述（日志用）
    pub fn describe(&self) -> String {
        match self {
            PatternKind::Html(r)
            | PatternKind::Script(r)
            | PatternKind::Css(r)
            | PatternKind::Cookie(r)
            | PatternKind::NetworkRequest(r) => r.as_str().to_string(),
            PatternKind::Header { name, value } | PatternKind::Meta { name, content: value } => {
                match value {
                    Some(v) => format!("{}~{}", name, v.as_str()),
                    None => format!("{} exists", name),
                }
            }
            PatternKind::JsGlobal { ident, .. } => ident.clone(),
            PatternKind::JsVersion { probe, version } => format!("{}~{}", probe, version.as_str()),
            PatternKind::HtmlComment { regex, literal } => match literal {
                Some(l) => format!("{} +`{}`", regex.as_str(), l),
                None => regex.as_str().to_string(),
            },
        }
    }
}

/// 编译后的单条模式
#[derive(Debug, Clone)]
pub struct Pattern {
    kind: PatternKind,
    weight: f64,
}

impl Pattern {
    /// 默认权重模式
    pub fn new(kind: PatternKind) -> Self {
        Self {
            kind,
            weight: DEFAULT_WEIGHT,
        }
    }

    /// 指定权重模式，权重必须位于 (0, 1]
    pub fn with_weight(kind: PatternKind, weight: f64) -> TdResult<Self> {
        let weight = validate_weight("pattern", weight)?;
        Ok(Self { kind, weight })
    }

    pub fn kind(&self) -> &PatternKind {
        &self.kind
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// 版本变体
#[derive(Debug, Clone)]
pub struct VersionRule {
    label: String,
    weight: f64,
    patterns: Vec<Pattern>,
}

impl VersionRule {
    pub fn new(label: impl Into<String>, weight: f64, patterns: Vec<Pattern>) -> TdResult<Self> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(TechDetectiveError::config("version label must not be empty"));
        }
        if patterns.is_empty() {
            return Err(TechDetectiveError::config(format!(
                "version `{}` declares no patterns",
                label
            )));
        }
        let weight = validate_weight("version", weight)?;
        Ok(Self {
            label,
            weight,
            patterns,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }
}

/// 签名规则：模式列表与版本变体二选一
#[derive(Debug, Clone)]
pub enum SignatureRules {
    Patterns(Vec<Pattern>),
    Versions(Vec<VersionRule>),
}

/// 编译后的技术签名
#[derive(Debug, Clone)]
pub struct Signature {
    name: String,
    category: String,
    base_weight: f64,
    rules: SignatureRules,
}

impl Signature {
    /// 无版本签名
    pub fn unversioned(
        name: impl Into<String>,
        category: impl Into<String>,
        base_weight: f64,
        patterns: Vec<Pattern>,
    ) -> TdResult<Self> {
        let name = name.into();
        if patterns.is_empty() {
            return Err(TechDetectiveError::config(format!(
                "signature `{}` declares no patterns",
                name
            )));
        }
        Self::build(name, category.into(), base_weight, SignatureRules::Patterns(patterns))
    }

    /// 多版本签名，变体按声明顺序保存，标签不可重复
    pub fn versioned(
        name: impl Into<String>,
        category: impl Into<String>,
        base_weight: f64,
        versions: Vec<VersionRule>,
    ) -> TdResult<Self> {
        let name = name.into();
        if versions.is_empty() {
            return Err(TechDetectiveError::config(format!(
                "signature `{}` declares no versions",
                name
            )));
        }
        for (i, version) in versions.iter().enumerate() {
            if versions[..i].iter().any(|v| v.label == version.label) {
                return Err(TechDetectiveError::config(format!(
                    "signature `{}` declares version `{}` twice",
                    name, version.label
                )));
            }
        }
        Self::build(name, category.into(), base_weight, SignatureRules::Versions(versions))
    }

    fn build(name: String, category: String, base_weight: f64, rules: SignatureRules) -> TdResult<Self> {
        if name.trim().is_empty() {
            return Err(TechDetectiveError::config("signature name must not be empty"));
        }
        if category.trim().is_empty() {
            return Err(TechDetectiveError::config(format!(
                "signature `{}` has an empty category",
                name
            )));
        }
        let base_weight = validate_weight("signature", base_weight)?;
        Ok(Self {
            name,
            category,
            base_weight,
            rules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn base_weight(&self) -> f64 {
        self.base_weight
    }

    pub fn rules(&self) -> &SignatureRules {
        &self.rules
    }

    pub fn is_versioned(&self) -> bool {
        matches!(self.rules, SignatureRules::Versions(_))
    }

    /// 模式总数（含所有版本变体）
    pub fn pattern_count(&self) -> usize {
        match &self.rules {
            SignatureRules::Patterns(patterns) => patterns.len(),
            SignatureRules::Versions(versions) => versions.iter().map(|v| v.patterns.len()).sum(),
        }
    }
}

fn validate_weight(owner: &str, weight: f64) -> TdResult<f64> {
    if weight.is_finite() && weight > 0.0 && weight <= 1.0 {
        Ok(weight)
    } else {
        Err(TechDetectiveError::config(format!(
            "{} weight {} is outside (0, 1]",
            owner, weight
        )))
    }
}

/// 单个分类下的签名
#[derive(Debug, Clone)]
pub struct CategorySignatures {
    pub name: String,
    pub signatures: Vec<Arc<Signature>>,
}

/// 编译后的签名库：分类按首次插入顺序排列
#[derive(Debug, Clone, Default)]
pub struct SignatureCatalog {
    categories: Vec<CategorySignatures>,
}

impl SignatureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> &[CategorySignatures] {
        &self.categories
    }

    /// 获取分类（不存在则在末尾创建）
    pub fn ensure_category(&mut self, name: &str) -> &mut CategorySignatures {
        let index = match self.categories.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.categories.push(CategorySignatures {
                    name: name.to_string(),
                    signatures: Vec::new(),
                });
                self.categories.len() - 1
            }
        };
        &mut self.categories[index]
    }

    /// 追加签名到其所属分类
    pub fn push(&mut self, signature: impl Into<Arc<Signature>>) {
        let signature = signature.into();
        self.ensure_category(signature.category())
            .signatures
            .push(signature);
    }

    /// 合并另一签名库（保持双方声明顺序）
    pub fn extend(&mut self, other: SignatureCatalog) {
        for category in other.categories {
            self.ensure_category(&category.name)
                .signatures
                .extend(category.signatures);
        }
    }

    /// 按名称删除所有分类中的签名，返回删除数量，空分类保留
    pub fn remove_by_name(&mut self, name: &str) -> usize {
        let mut removed = 0;
        for category in &mut self.categories {
            let before = category.signatures.len();
            category.signatures.retain(|s| s.name() != name);
            removed += before - category.signatures.len();
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.iter().any(|s| s.name() == name)
    }

    pub fn signature_count(&self) -> usize {
        self.categories.iter().map(|c| c.signatures.len()).sum()
    }

    /// 按分类顺序、声明顺序遍历签名
    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.categories
            .iter()
            .flat_map(|c| c.signatures.iter().map(|s| s.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(re: &str) -> Pattern {
        Pattern::new(PatternKind::Html(Regex::new(re).unwrap()))
    }

    #[test]
    fn test_weight_bounds() {
        let kind = PatternKind::Html(Regex::new("x").unwrap());
        assert!(Pattern::with_weight(kind.clone(), 1.0).is_ok());
        assert!(Pattern::with_weight(kind.clone(), 0.0).is_err());
        assert!(Pattern::with_weight(kind.clone(), 1.2).is_err());
        assert!(Pattern::with_weight(kind, f64::NAN).is_err());
        assert!(Signature::unversioned("A", "misc", 0.0, vec![html("a")]).is_err());
    }

    #[test]
    fn test_signature_requires_rules() {
        assert!(Signature::unversioned("A", "misc", 0.9, Vec::new()).is_err());
        assert!(Signature::versioned("A", "misc", 1.0, Vec::new()).is_err());
        assert!(VersionRule::new("v1", 0.9, Vec::new()).is_err());

        let dup = vec![
            VersionRule::new("v1", 0.9, vec![html("a")]).unwrap(),
            VersionRule::new("v1", 0.8, vec![html("b")]).unwrap(),
        ];
        assert!(Signature::versioned("A", "misc", 1.0, dup).is_err());
    }

    #[test]
    fn test_js_global_identifier_validation() {
        assert!(PatternKind::js_global("__NEXT_DATA__").is_ok());
        assert!(PatternKind::js_global("$").is_ok());
        assert!(PatternKind::js_global("window.ga").is_err());
        assert!(PatternKind::js_global("").is_err());
        assert!(PatternKind::js_global("9lives").is_err());
    }

    #[test]
    fn test_catalog_push_and_remove() {
        let mut catalog = SignatureCatalog::new();
        catalog.push(Signature::unversioned("A", "cms", 0.9, vec![html("a")]).unwrap());
        catalog.push(Signature::unversioned("B", "server", 0.9, vec![html("b")]).unwrap());
        catalog.push(Signature::unversioned("A", "server", 0.9, vec![html("a")]).unwrap());

        let names: Vec<_> = catalog.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["cms", "server"]);
        assert_eq!(catalog.signature_count(), 3);

        assert_eq!(catalog.remove_by_name("A"), 2);
        assert!(!catalog.contains("A"));
        // 空分类保留
        assert_eq!(catalog.categories().len(), 2);
        assert!(catalog.categories()[0].signatures.is_empty());
        assert_eq!(catalog.remove_by_name("missing"), 0);
    }
}
