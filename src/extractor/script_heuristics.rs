//! 内联脚本启发式推断
//! Cookie写入、全局标识符、外发请求地址、客户端库版本；尽力而为，允许误报

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

static DOCUMENT_COOKIE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"document\.cookie\s*=\s*(?:"([^"]*)"|'([^']*)'|`([^`]*)`)"#).unwrap()
});

static GLOBAL_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\b(?:var|let|const)\s+|\bwindow\.)([A-Za-z_$][A-Za-z0-9_$]*)\s*=(?:[^=]|$)")
        .unwrap()
});

static QUOTED_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["'`](https?://[^"'`\s<>]+)["'`]"#).unwrap());

/// 页面原文中逐字出现即视为存在的全局标识符
/// 过短的标识符（ga、wp、$、_）误报太多，不在此列
const WATCHED_GLOBALS: &[&str] = &[
    "jQuery",
    "React",
    "ReactDOM",
    "angular",
    "Vue",
    "dataLayer",
    "gtag",
    "mixpanel",
    "Stripe",
    "paypal",
    "Shopify",
    "Drupal",
    "Mage",
    "__NEXT_DATA__",
    "__NUXT__",
];

const VERSION: &str = r"(\d+\.\d+(?:\.\d+)?)";

/// 客户端版本探针：先查 script src，再查页面原文
struct VersionProbe {
    name: &'static str,
    from_scripts: Vec<Regex>,
    from_html: Vec<Regex>,
}

impl VersionProbe {
    fn new(name: &'static str, from_scripts: &[&str], from_html: &[&str]) -> Self {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns
                .iter()
                .map(|p| Regex::new(&p.replace("{VERSION}", VERSION)).unwrap())
                .collect()
        };
        Self {
            name,
            from_scripts: compile(from_scripts),
            from_html: compile(from_html),
        }
    }

    fn resolve(&self, script_sources: &[String], html: &str) -> Option<String> {
        let first_capture = |regex: &Regex, text: &str| {
            regex
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        };

        script_sources
            .iter()
            .find_map(|src| self.from_scripts.iter().find_map(|r| first_capture(r, src)))
            .or_else(|| self.from_html.iter().find_map(|r| first_capture(r, html)))
    }
}

static VERSION_PROBES: Lazy<Vec<VersionProbe>> = Lazy::new(|| {
    vec![
        VersionProbe::new(
            "$.fn.jquery",
            &[r"(?i)jquery[-./@]v?{VERSION}"],
            &[r"jQuery (?:JavaScript Library )?v{VERSION}"],
        ),
        VersionProbe::new(
            "React.version",
            &[r"(?i)react(?:-dom)?@{VERSION}", r"(?i)/react(?:-dom)?/{VERSION}/"],
            &[r"React v{VERSION}"],
        ),
        VersionProbe::new(
            "Vue.version",
            &[r"(?i)vue@{VERSION}", r"(?i)/vue/{VERSION}/"],
            &[r"Vue\.js v{VERSION}"],
        ),
        VersionProbe::new(
            "angular.version",
            &[r"(?i)angular(?:js)?[-/@]{VERSION}"],
            &[r"AngularJS v{VERSION}", r#"ng-version\s*=\s*["']{VERSION}"#],
        ),
    ]
});

/// 内联脚本启发式推断器
pub struct ScriptHeuristics;

impl ScriptHeuristics {
    /// 所有已知版本探针名
    pub fn known_probes() -> impl Iterator<Item = &'static str> {
        VERSION_PROBES.iter().map(|p| p.name)
    }

    /// `document.cookie = "name=value; ..."` 赋值
    pub fn client_cookies(inline_scripts: &[String]) -> Vec<(String, String)> {
        inline_scripts
            .iter()
            .flat_map(|script| DOCUMENT_COOKIE.captures_iter(script))
            .filter_map(|caps| (1..=3).find_map(|i| caps.get(i)))
            .filter_map(|m| {
                let pair = m.as_str().split(';').next()?;
                let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                let name = name.trim();
                (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
            })
            .collect()
    }

    /// `var|let|const|window.<id> =` 赋值 + 原文中逐字出现的关注标识符
    pub fn globals(inline_scripts: &[String], html: &str) -> HashSet<String> {
        let mut globals: HashSet<String> = inline_scripts
            .iter()
            .flat_map(|script| GLOBAL_ASSIGNMENT.captures_iter(script))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect();

        globals.extend(
            WATCHED_GLOBALS
                .iter()
                .filter(|ident| html.contains(*ident))
                .map(|ident| ident.to_string()),
        );
        globals
    }

    /// 页面中带引号的 http(s) 地址，去掉协议头与片段，去重保序
    pub fn request_urls(html: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        QUOTED_URL
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| {
                let (_, rest) = m.as_str().split_once("://")?;
                let rest = rest.split('#').next().unwrap_or_default();
                (!rest.is_empty()).then(|| rest.to_string())
            })
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }

    /// 所有已知探针都有键，推断不出的为 None
    pub fn client_versions(script_sources: &[String], html: &str) -> BTreeMap<String, Option<String>> {
        VERSION_PROBES
            .iter()
            .map(|probe| (probe.name.to_string(), probe.resolve(script_sources, html)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_client_cookies() {
        let inline = scripts(&[
            r#"document.cookie = "_ga=GA1.2.3; path=/"; document.cookie='mp_token=abc';"#,
            "document.cookie = `flag`;",
        ]);
        assert_eq!(
            ScriptHeuristics::client_cookies(&inline),
            vec![
                ("_ga".to_string(), "GA1.2.3".to_string()),
                ("mp_token".to_string(), "abc".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_globals_from_assignments_and_watch_list() {
        let inline = scripts(&["var __APP__ = {}; window.dataLayer = []; let x == 1; const $el = 2;"]);
        let html = "<script>var __APP__ = {};</script><div>jQuery</div>";
        let globals = ScriptHeuristics::globals(&inline, html);

        assert!(globals.contains("__APP__"));
        assert!(globals.contains("dataLayer"));
        assert!(globals.contains("$el"));
        assert!(globals.contains("jQuery"));
        assert!(!globals.contains("x"));
    }

    #[test]
    fn test_request_urls_strip_scheme_and_dedupe() {
        let html = r#"
            <script src="https://js.stripe.com/v3/"></script>
            fetch('https://api.segment.io/v1/t#frag');
            <a href="https://js.stripe.com/v3/">again</a>
            <a href="/relative">no</a>
        "#;
        assert_eq!(
            ScriptHeuristics::request_urls(html),
            vec!["js.stripe.com/v3/", "api.segment.io/v1/t"]
        );
    }

    #[test]
    fn test_client_versions() {
        let sources = scripts(&[
            "https://code.jquery.com/jquery-3.6.0.min.js",
            "https://unpkg.com/vue@3.2.47/dist/vue.global.js",
        ]);
        let html = r#"<app-root ng-version="15.2.1"></app-root>"#;
        let versions = ScriptHeuristics::client_versions(&sources, html);

        assert_eq!(versions["$.fn.jquery"].as_deref(), Some("3.6.0"));
        assert_eq!(versions["Vue.version"].as_deref(), Some("3.2.47"));
        assert_eq!(versions["angular.version"].as_deref(), Some("15.2.1"));
        assert_eq!(versions["React.version"], None);
        assert_eq!(versions.len(), ScriptHeuristics::known_probes().count());
    }

    #[test]
    fn test_version_banner_fallback() {
        let html = "/*! jQuery v1.12.4 | (c) jQuery Foundation */";
        let versions = ScriptHeuristics::client_versions(&[], html);
        assert_eq!(versions["$.fn.jquery"].as_deref(), Some("1.12.4"));
    }
}
