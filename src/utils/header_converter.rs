//! Header格式转换工具
//! reqwest HeaderMap 与检测用的小写单值映射之间的转换

use std::collections::HashMap;
use std::time::Instant;

use reqwest::header::HeaderMap;
use tracing::debug;

/// Header转换工具
pub struct HeaderConverter;

impl HeaderConverter {
    /// 将HeaderMap转换为HashMap<String, Vec<String>>，名称小写，非UTF-8值记为空串
    pub fn to_hashmap(header_map: &HeaderMap) -> HashMap<String, Vec<String>> {
        let start = Instant::now();
        let mut map: HashMap<String, Vec<String>> = HashMap::new();

        for (key, value) in header_map.iter() {
            let value_str = value.to_str().unwrap_or_default().to_string();
            map.entry(key.as_str().to_ascii_lowercase())
                .or_default()
                .push(value_str);
        }

        debug!(
            "header conversion took {:?}, {} distinct names",
            start.elapsed(),
            map.len()
        );
        map
    }

    /// 多值映射转为单值映射，取首个非空值；全为空的Header按存在但值为空保留
    pub fn to_single_value(hashmap: &HashMap<String, Vec<String>>) -> HashMap<String, String> {
        hashmap
            .iter()
            .map(|(key, values)| {
                let value = values
                    .iter()
                    .find(|v| !v.is_empty())
                    .cloned()
                    .unwrap_or_default();
                (key.clone(), value)
            })
            .collect()
    }

    /// 任意 (名称, 值) 序列转为小写单值映射，同名取首个
    pub fn from_pairs<K, V, I>(pairs: I) -> HashMap<String, String>
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = HashMap::new();
        for (key, value) in pairs {
            map.entry(key.as_ref().trim().to_ascii_lowercase())
                .or_insert_with(|| value.into());
        }
        map
    }
}
