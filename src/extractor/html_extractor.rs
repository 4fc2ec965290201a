//! HTML证据提取器
//! 全部基于正则全局扫描（不构建解析树），畸形HTML只会得到空/部分结果，不会报错
//! script / style / meta / http-equiv 各跑两遍互补扫描，按匹配偏移合并去重

use std::collections::HashMap;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::{Captures, Match, Regex};
use tracing::debug;

use super::evidence::EvidenceBundle;
use super::script_heuristics::ScriptHeuristics;
use crate::utils::HeaderConverter;

/// 无引号属性值，自闭合标签的结尾 `/` 不计入
const UNQUOTED_VALUE: &str = r#"((?:[^\s"'>/]|/[^\s"'>])+)"#;

/// 属性值：双引号 / 单引号 / 无引号，占用三个捕获组
const ATTR_VALUE: &str = r#"(?:"([^"]*)"|'([^']*)'|((?:[^\s"'>/]|/[^\s"'>])+))"#;

static SCRIPT_SRC_QUOTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<script\b[^>]*?\ssrc\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});
static SCRIPT_SRC_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)<script\b[^>]*?\ssrc\s*=\s*{}", UNQUOTED_VALUE)).unwrap());

static LINK_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<link\b[^>]*>").unwrap());
static REL_STYLESHEET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\srel\s*=\s*["']?[^"'>]*\bstylesheet\b"#).unwrap());
static HREF_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\shref\s*=\s*{}", ATTR_VALUE)).unwrap());
static CSS_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\shref\s*=\s*(?:"([^"]*\.css)"|'([^']*\.css)'|([^\s"'>]*\.css)\b)"#).unwrap()
});

static META_NAME_FIRST: Lazy<Regex> = Lazy::new(|| tag_pair_regex("meta", "name", "content"));
static META_CONTENT_FIRST: Lazy<Regex> = Lazy::new(|| tag_pair_regex("meta", "content", "name"));
static EQUIV_NAME_FIRST: Lazy<Regex> =
    Lazy::new(|| tag_pair_regex("meta", "http-equiv", "content"));
static EQUIV_CONTENT_FIRST: Lazy<Regex> =
    Lazy::new(|| tag_pair_regex("meta", "content", "http-equiv"));

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--(.*?)-->").unwrap());
static INLINE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>(.*?)</script\s*>").unwrap());

/// 构造“同一标签内两个属性按固定先后出现”的正则，两个值各占三个捕获组
fn tag_pair_regex(tag: &str, first: &str, second: &str) -> Regex {
    Regex::new(&format!(
        r"(?i)<{tag}\b[^>]*?\s{first}\s*=\s*{v}[^>]*?\s{second}\s*=\s*{v}",
        tag = tag,
        first = regex::escape(first),
        second = regex::escape(second),
        v = ATTR_VALUE
    ))
    .unwrap()
}

/// 取出三选一属性值组（从 first 开始的连续三个组）
fn attr_value<'h>(caps: &Captures<'h>, first: usize) -> Option<Match<'h>> {
    (first..first + 3).find_map(|i| caps.get(i))
}

/// 合并两遍扫描结果：按偏移排序，同一偏移只保留一条
fn merge_by_offset<T>(mut first: Vec<(usize, T)>, second: Vec<(usize, T)>) -> Vec<T> {
    first.extend(second);
    first.sort_by_key(|(offset, _)| *offset);
    first.dedup_by_key(|(offset, _)| *offset);
    first.into_iter().map(|(_, value)| value).collect()
}

/// 键值对按文档顺序折叠为映射，同名取首个
fn first_wins(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        map.entry(name).or_insert(value);
    }
    map
}

/// HTML证据提取器
pub struct HtmlExtractor;

impl HtmlExtractor {
    /// 从HTML与传输层Header中提取完整证据集合
    pub fn extract(html: &str, transport_headers: &HashMap<String, String>) -> EvidenceBundle {
        let start = Instant::now();

        let script_sources = Self::script_sources(html);
        let style_sources = Self::style_sources(html);
        let meta_tags = first_wins(Self::meta_tags(html));

        // 先放 http-equiv，再由传输层Header覆盖
        let mut headers = first_wins(Self::http_equiv_headers(html));
        headers.extend(Self::fold_transport_headers(transport_headers));

        let comments = Self::comments(html);
        let inline_scripts = Self::inline_scripts(html);

        let evidence = EvidenceBundle {
            client_cookies: ScriptHeuristics::client_cookies(&inline_scripts),
            inferred_globals: ScriptHeuristics::globals(&inline_scripts, html),
            inferred_request_urls: ScriptHeuristics::request_urls(html),
            inferred_client_versions: ScriptHeuristics::client_versions(&script_sources, html),
            raw_html: html.to_string(),
            headers,
            script_sources,
            style_sources,
            meta_tags,
            comments,
        };

        debug!(
            "evidence extracted in {:?}: {}",
            start.elapsed(),
            evidence.summary()
        );
        evidence
    }

    /// 传输层Header按小写名折叠
    /// 仅大小写不同的重名Header：已是小写的名称优先，其余按原名字典序取首个
    pub fn fold_transport_headers(transport_headers: &HashMap<String, String>) -> HashMap<String, String> {
        let mut pairs: Vec<_> = transport_headers.iter().collect();
        pairs.sort_by(|(a, _), (b, _)| {
            let rank = |name: &str| name.bytes().any(|c| c.is_ascii_uppercase());
            (rank(a), a.as_str()).cmp(&(rank(b), b.as_str()))
        });
        HeaderConverter::from_pairs(pairs.into_iter().map(|(name, value)| (name, value.clone())))
    }

    /// 提取 `<script src>`（带引号 + 无引号两遍）
    pub fn script_sources(html: &str) -> Vec<String> {
        let quoted = SCRIPT_SRC_QUOTED
            .captures_iter(html)
            .filter_map(|caps| (1..=2).find_map(|i| caps.get(i)))
            .map(|m| (m.start(), m.as_str().trim().to_string()))
            .collect();
        let bare = SCRIPT_SRC_BARE
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|m| (m.start(), m.as_str().to_string()))
            .collect();

        merge_by_offset(quoted, bare)
            .into_iter()
            .filter(|src| !src.is_empty())
            .collect()
    }

    /// 提取样式表（rel=stylesheet 的 link 标签 + 任意以 .css 结尾的 href 两遍）
    pub fn style_sources(html: &str) -> Vec<String> {
        let linked = LINK_TAG
            .find_iter(html)
            .filter(|tag| REL_STYLESHEET.is_match(tag.as_str()))
            .filter_map(|tag| {
                let caps = HREF_ATTR.captures(tag.as_str())?;
                let value = attr_value(&caps, 1)?;
                Some((tag.start() + value.start(), value.as_str().trim().to_string()))
            })
            .collect();
        let by_suffix = CSS_HREF
            .captures_iter(html)
            .filter_map(|caps| attr_value(&caps, 1))
            .map(|m| (m.start(), m.as_str().trim().to_string()))
            .collect();

        merge_by_offset(linked, by_suffix)
            .into_iter()
            .filter(|href| !href.is_empty())
            .collect()
    }

    /// 提取 meta name/content 对，文档顺序，名称小写
    pub fn meta_tags(html: &str) -> Vec<(String, String)> {
        Self::attribute_pairs(html, &META_NAME_FIRST, &META_CONTENT_FIRST)
    }

    /// 提取 `<meta http-equiv>` 合成的Header，文档顺序，名称小写
    pub fn http_equiv_headers(html: &str) -> Vec<(String, String)> {
        Self::attribute_pairs(html, &EQUIV_NAME_FIRST, &EQUIV_CONTENT_FIRST)
    }

    /// 提取HTML注释内容
    pub fn comments(html: &str) -> Vec<String> {
        COMMENT
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|comment| !comment.is_empty())
            .collect()
    }

    /// 提取内联脚本正文
    pub fn inline_scripts(html: &str) -> Vec<String> {
        INLINE_SCRIPT
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|body| !body.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    /// key-first 与 value-first 两遍扫描，按标签偏移合并
    fn attribute_pairs(html: &str, key_first: &Regex, value_first: &Regex) -> Vec<(String, String)> {
        let forward = key_first
            .captures_iter(html)
            .filter_map(|caps| {
                let key = attr_value(&caps, 1)?;
                let value = attr_value(&caps, 4)?;
                Some((caps.get(0)?.start(), (key.as_str(), value.as_str())))
            })
            .map(|(offset, (k, v))| (offset, (k.trim().to_ascii_lowercase(), v.to_string())))
            .collect();
        let reversed = value_first
            .captures_iter(html)
            .filter_map(|caps| {
                let value = attr_value(&caps, 1)?;
                let key = attr_value(&caps, 4)?;
                Some((caps.get(0)?.start(), (key.as_str(), value.as_str())))
            })
            .map(|(offset, (k, v))| (offset, (k.trim().to_ascii_lowercase(), v.to_string())))
            .collect();

        merge_by_offset(forward, reversed)
            .into_iter()
            .filter(|(key, _)| !key.is_empty())
            .collect()
    }
}
