//! 证据集合：单次扫描从页面与响应头中提取出的全部证据
//! 构建完成后只读，匹配器只通过引用访问

use std::collections::{BTreeMap, HashMap, HashSet};

/// 单次扫描的证据集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceBundle {
    /// 原始HTML
    pub raw_html: String,
    /// 小写Header名 -> 值（传输层Header与 http-equiv 合并，传输层优先）
    pub headers: HashMap<String, String>,
    /// `<script src>`，文档顺序
    pub script_sources: Vec<String>,
    /// 样式表链接，文档顺序
    pub style_sources: Vec<String>,
    /// 小写meta名 -> content（同名取首个）
    pub meta_tags: HashMap<String, String>,
    /// HTML注释内容（已去除首尾空白）
    pub comments: Vec<String>,
    /// 内联脚本写入的 Cookie (name, value)
    pub client_cookies: Vec<(String, String)>,
    /// 推断出的全局标识符
    pub inferred_globals: HashSet<String>,
    /// 推断出的外发请求地址（不含协议头，去重保序）
    pub inferred_request_urls: Vec<String>,
    /// 版本探针 -> 推断版本；所有已知探针均有键，未推断出则为 None
    pub inferred_client_versions: BTreeMap<String, Option<String>>,
}

impl EvidenceBundle {
    /// 读取Header（名称大小写不敏感）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// 读取meta内容（名称大小写不敏感）
    pub fn meta(&self, name: &str) -> Option<&str> {
        self.meta_tags
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// 读取版本探针结果，未知探针与未推断出的探针都返回 None
    pub fn client_version(&self, probe: &str) -> Option<&str> {
        self.inferred_client_versions
            .get(probe)
            .and_then(|v| v.as_deref())
    }

    /// 证据统计（日志用）
    pub fn summary(&self) -> String {
        format!(
            "headers={} scripts={} styles={} metas={} comments={} cookies={} globals={} urls={} versions={}",
            self.headers.len(),
            self.script_sources.len(),
            self.style_sources.len(),
            self.meta_tags.len(),
            self.comments.len(),
            self.client_cookies.len(),
            self.inferred_globals.len(),
            self.inferred_request_urls.len(),
            self.inferred_client_versions
                .values()
                .filter(|v| v.is_some())
                .count()
        )
    }
}
