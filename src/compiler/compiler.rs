//! 签名编译器核心
//! 将宽松类型的签名定义编译为带类型的模式变体，配置错误立即失败

use std::time::Instant;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use super::pattern::{Pattern, PatternKind, Signature, SignatureCatalog, VersionRule, DEFAULT_WEIGHT};
use crate::error::{TdResult, TechDetectiveError};
use crate::rule::{PatternDef, SignatureCatalogDef, SignatureDef, VersionDef};

/// 签名编译器
pub struct SignatureCompiler;

impl SignatureCompiler {
    /// 编译完整签名库
    pub fn compile(catalog_def: &SignatureCatalogDef) -> TdResult<SignatureCatalog> {
        let start = Instant::now();
        let mut catalog = SignatureCatalog::new();
        let mut stats = CompileStats::default();

        for category in &catalog_def.categories {
            // 空分类同样保留，保证分类枚举稳定
            catalog.ensure_category(&category.name);
            for signature_def in &category.signatures {
                let signature = Self::compile_signature(&category.name, signature_def)?;
                stats.record(&signature);
                catalog.push(signature);
            }
        }

        debug!("signature catalog compiled in {:?}", start.elapsed());
        debug!(
            "compile stats: categories={} signatures={} versioned={} patterns={}",
            catalog.categories().len(),
            stats.signatures,
            stats.versioned,
            stats.patterns
        );

        Ok(catalog)
    }

    /// 编译单个签名定义
    pub fn compile_signature(category: &str, def: &SignatureDef) -> TdResult<Signature> {
        let base_weight = def.weight.unwrap_or(DEFAULT_WEIGHT);
        let context = |e: TechDetectiveError| Self::with_context(&def.name, e);

        match (&def.patterns, &def.versions) {
            (Some(patterns), None) => {
                let patterns = Self::compile_pattern_list(patterns).map_err(context)?;
                Signature::unversioned(&def.name, category, base_weight, patterns)
            }
            (None, Some(versions)) => {
                let versions = versions
                    .iter()
                    .map(Self::compile_version)
                    .collect::<TdResult<Vec<_>>>()
                    .map_err(context)?;
                Signature::versioned(&def.name, category, base_weight, versions)
            }
            (None, None) => Err(TechDetectiveError::config(format!(
                "signature `{}` declares neither `patterns` nor `versions`",
                def.name
            ))),
            (Some(_), Some(_)) => Err(TechDetectiveError::config(format!(
                "signature `{}` declares both `patterns` and `versions`",
                def.name
            ))),
        }
    }

    fn compile_version(def: &VersionDef) -> TdResult<VersionRule> {
        let patterns = Self::compile_pattern_list(&def.patterns)?;
        VersionRule::new(&def.label, def.weight, patterns)
    }

    fn compile_pattern_list(defs: &[PatternDef]) -> TdResult<Vec<Pattern>> {
        defs.iter().map(Self::compile_pattern).collect()
    }

    /// 编译单条模式
    pub fn compile_pattern(def: &PatternDef) -> TdResult<Pattern> {
        let flags = def.flags.as_deref();
        let kind = match def.kind.as_str() {
            "html" => PatternKind::Html(Self::build_regex(required(def, "pattern", &def.pattern)?, flags)?),
            "script" => PatternKind::Script(Self::build_regex(required(def, "pattern", &def.pattern)?, flags)?),
            "css" => PatternKind::Css(Self::build_regex(required(def, "pattern", &def.pattern)?, flags)?),
            "cookie" => PatternKind::Cookie(Self::build_regex(required(def, "pattern", &def.pattern)?, flags)?),
            "networkRequest" => {
                PatternKind::NetworkRequest(Self::build_regex(required(def, "pattern", &def.pattern)?, flags)?)
            }
            "header" => PatternKind::Header {
                name: required(def, "name", &def.name)?.to_ascii_lowercase(),
                value: Self::optional_regex(def.value.as_deref(), flags)?,
            },
            "meta" => PatternKind::Meta {
                name: required(def, "name", &def.name)?.to_ascii_lowercase(),
                content: Self::optional_regex(def.content.as_deref(), flags)?,
            },
            "jsGlobal" => PatternKind::js_global(required(def, "pattern", &def.pattern)?)?,
            "jsVersion" => PatternKind::JsVersion {
                probe: required(def, "probe", &def.probe)?.to_string(),
                version: Self::build_regex(required(def, "pattern", &def.pattern)?, flags)?,
            },
            "htmlComment" => PatternKind::HtmlComment {
                regex: Self::build_regex(required(def, "pattern", &def.pattern)?, flags)?,
                literal: def.value.clone().filter(|v| !v.is_empty()),
            },
            other => {
                return Err(TechDetectiveError::config(format!(
                    "unrecognized pattern kind `{}`",
                    other
                )));
            }
        };

        match def.weight {
            Some(weight) => Pattern::with_weight(kind, weight),
            None => Ok(Pattern::new(kind)),
        }
    }

    /// 按 JS 风格的标志位编译正则（i/s/m，g 忽略）
    pub fn build_regex(pattern: &str, flags: Option<&str>) -> TdResult<Regex> {
        let mut builder = RegexBuilder::new(pattern);
        for flag in flags.unwrap_or_default().chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                'g' => {}
                other => {
                    return Err(TechDetectiveError::config(format!(
                        "unsupported regex flag `{}` on /{}/",
                        other, pattern
                    )));
                }
            }
        }
        Ok(builder.build()?)
    }

    fn optional_regex(pattern: Option<&str>, flags: Option<&str>) -> TdResult<Option<Regex>> {
        pattern
            .filter(|p| !p.is_empty())
            .map(|p| Self::build_regex(p, flags))
            .transpose()
    }

    fn with_context(signature: &str, error: TechDetectiveError) -> TechDetectiveError {
        match error {
            TechDetectiveError::ConfigurationError(msg) => {
                TechDetectiveError::config(format!("signature `{}`: {}", signature, msg))
            }
            TechDetectiveError::RegexCompileError(e) => {
                TechDetectiveError::config(format!("signature `{}`: invalid regex: {}", signature, e))
            }
            other => other,
        }
    }
}

/// 取出必填字段，缺失即配置错误
fn required<'a>(def: &PatternDef, field: &str, value: &'a Option<String>) -> TdResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            TechDetectiveError::config(format!(
                "`{}` pattern is missing required field `{}`",
                def.kind, field
            ))
        })
}

/// 编译统计信息
#[derive(Debug, Clone, Default)]
struct CompileStats {
    signatures: usize,
    versioned: usize,
    patterns: usize,
}

impl CompileStats {
    fn record(&mut self, signature: &Signature) {
        self.signatures += 1;
        if signature.is_versioned() {
            self.versioned += 1;
        }
        self.patterns += signature.pattern_count();
    }
}
