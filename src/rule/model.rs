//! 签名数据模型定义
//! 原始签名定义（JSON反序列化，宽松类型）与检测结果结构，不含匹配逻辑

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::TdResult;

/// 单项技术检测结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionOutcome {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub confidence: u8,
}

impl fmt::Display for DetectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) if !v.is_empty() => write!(f, "{} ({}) {}%", self.name, v, self.confidence),
            _ => write!(f, "{} {}%", self.name, self.confidence),
        }
    }
}

/// 分类 -> 检测结果列表（保持签名库中的分类顺序）
/// 序列化为JSON对象，键顺序即分类顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    entries: Vec<(String, Vec<DetectionOutcome>)>,
}

impl CategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加分类（调用方保证分类名不重复）
    pub fn push_category(&mut self, category: impl Into<String>, outcomes: Vec<DetectionOutcome>) {
        self.entries.push((category.into(), outcomes));
    }

    /// 按分类名获取检测结果
    pub fn get(&self, category: &str) -> Option<&[DetectionOutcome]> {
        self.entries
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, outcomes)| outcomes.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DetectionOutcome])> {
        self.entries
            .iter()
            .map(|(name, outcomes)| (name.as_str(), outcomes.as_slice()))
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// 分类数量（含空分类）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 所有分类下的检测结果总数
    pub fn detection_count(&self) -> usize {
        self.entries.iter().map(|(_, outcomes)| outcomes.len()).sum()
    }

    /// 查找任意分类中指定名称的技术
    pub fn find(&self, name: &str) -> Option<(&str, &DetectionOutcome)> {
        self.entries.iter().find_map(|(category, outcomes)| {
            outcomes
                .iter()
                .find(|o| o.name == name)
                .map(|o| (category.as_str(), o))
        })
    }
}

impl Serialize for CategoryMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (category, outcomes) in &self.entries {
            map.serialize_entry(category, outcomes)?;
        }
        map.end()
    }
}

/// 扫描结果（成功信封）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub success: bool,
    pub message: String,
    pub url: String,
    pub technologies: CategoryMap,
}

impl ScanReport {
    pub fn new(url: impl Into<String>, technologies: CategoryMap) -> Self {
        Self {
            success: true,
            message: "Technologies detected".to_string(),
            url: url.into(),
            technologies,
        }
    }

    pub fn to_json(&self, pretty: bool) -> TdResult<String> {
        to_json(self, pretty)
    }
}

/// 扫描失败信封（供需要返回响应体而非错误的调用方使用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    pub success: bool,
    pub message: String,
    pub url: String,
    pub error: String,
}

impl ScanFailure {
    pub fn new(url: impl Into<String>, error: &impl fmt::Display) -> Self {
        Self {
            success: false,
            message: "Error fetching URL".to_string(),
            url: url.into(),
            error: error.to_string(),
        }
    }

    pub fn to_json(&self, pretty: bool) -> TdResult<String> {
        to_json(self, pretty)
    }
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> TdResult<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

/// 完整签名库定义（JSON顶层结构）
/// 使用数组而非对象保存分类/签名/版本，保证声明顺序
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SignatureCatalogDef {
    #[serde(default)]
    pub categories: Vec<CategoryDef>,
}

/// 分类定义
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CategoryDef {
    pub name: String,
    #[serde(default)]
    pub signatures: Vec<SignatureDef>,
}

/// 技术签名定义
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SignatureDef {
    pub name: String,
    // 基础权重，缺省为1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<PatternDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<VersionDef>>,
}

impl SignatureDef {
    /// 无版本签名
    pub fn unversioned(name: impl Into<String>, weight: f64, patterns: Vec<PatternDef>) -> Self {
        Self {
            name: name.into(),
            weight: Some(weight),
            patterns: Some(patterns),
            versions: None,
        }
    }

    /// 多版本签名
    pub fn versioned(name: impl Into<String>, versions: Vec<VersionDef>) -> Self {
        Self {
            name: name.into(),
            weight: None,
            patterns: None,
            versions: Some(versions),
        }
    }
}

/// 版本变体定义
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VersionDef {
    pub label: String,
    pub weight: f64,
    #[serde(default)]
    pub patterns: Vec<PatternDef>,
}

impl VersionDef {
    pub fn new(label: impl Into<String>, weight: f64, patterns: Vec<PatternDef>) -> Self {
        Self {
            label: label.into(),
            weight,
            patterns,
        }
    }
}

/// 单条模式定义
/// 各字段含义取决于 `type`：
/// - html/script/css/cookie/networkRequest/htmlComment：`pattern` 为正则
/// - jsGlobal：`pattern` 为标识符字面量
/// - header/meta：`name` 为键名，`value`/`content` 为可选值正则
/// - jsVersion：`probe` 为版本探针名，`pattern` 为版本正则
/// - htmlComment：`value` 为可选的附加字面量
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PatternDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<String>,
}

impl PatternDef {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn flags(mut self, flags: impl Into<String>) -> Self {
        self.flags = Some(flags.into());
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn probe(mut self, probe: impl Into<String>) -> Self {
        self.probe = Some(probe.into());
        self
    }
}
