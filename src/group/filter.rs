//! Request-level filters over list properties.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::device::Record;
use crate::error::{Error, Result};
use crate::recipe::Pattern;

/// One filter as supplied with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyFilter {
    /// Keep only records whose `path` value matches `regex`.
    Group { path: String, regex: String },
    /// Drop `path` from every record.
    Value { path: String },
    /// Keep only `paths` in every record.
    ExclusiveValue { paths: Vec<String> },
}

/// Filters compiled once per request.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilters {
    groups: Vec<(String, Pattern)>,
    dropped: Vec<String>,
    exclusive: Option<Vec<String>>,
}

impl CompiledFilters {
    pub fn new(filters: &[PropertyFilter]) -> Result<Self> {
        let mut out = Self::default();
        for filter in filters {
            match filter {
                PropertyFilter::Group { path, regex } => {
                    let pattern = Pattern::new(regex).map_err(|_| {
                        Error::pre_condition(format!("group filter on '{path}': invalid regex '{regex}'"))
                    })?;
                    out.groups.push((path.clone(), pattern));
                }
                PropertyFilter::Value { path } => out.dropped.push(path.clone()),
                PropertyFilter::ExclusiveValue { paths } => {
                    out.exclusive
                        .get_or_insert_with(Vec::new)
                        .extend(paths.iter().cloned());
                }
            }
        }
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.dropped.is_empty() && self.exclusive.is_none()
    }

    /// Paths that group filters inspect.
    pub fn group_paths(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(p, _)| p.as_str())
    }

    pub fn is_group_path(&self, path: &str) -> bool {
        self.groups.iter().any(|(p, _)| covers(p, path))
    }

    /// Whether `path` survives into the result.
    pub fn visible(&self, path: &str) -> bool {
        if self.dropped.iter().any(|d| covers(d, path)) {
            return false;
        }
        match &self.exclusive {
            Some(keep) => keep.iter().any(|k| covers(k, path) || covers(path, k)),
            None => true,
        }
    }

    /// Whether `path` must be read from the device at all.
    pub fn wants(&self, path: &str) -> bool {
        self.visible(path) || self.is_group_path(path)
    }

    /// Group filters against a raw record. A record lacking a filtered
    /// field does not match.
    pub fn keep_record(&self, record: &Record) -> bool {
        self.groups.iter().all(|(path, pattern)| {
            record
                .string(path)
                .is_some_and(|v| pattern.regex().is_match(&v))
        })
    }

    /// Strip fields that must not appear in the result.
    pub fn finish(&self, record: &mut Record) {
        let hidden: Vec<String> = record
            .iter()
            .map(|(k, _)| k)
            .filter(|k| !self.visible(k))
            .map(str::to_owned)
            .collect();
        for key in hidden {
            record.remove_path(&key);
        }
    }

    /// Re-apply the filters to typed items, e.g. after an override changed
    /// or added records.
    pub fn apply<T: Serialize + DeserializeOwned>(&self, items: Vec<T>) -> Result<Vec<T>> {
        if self.is_empty() {
            return Ok(items);
        }
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let json = serde_json::to_value(&item)
                .map_err(|e| Error::decode(format!("filter: {e}")))?;
            if !self.keep_json(&json) {
                continue;
            }
            let json = self.prune_json(json, "");
            out.push(
                serde_json::from_value(json).map_err(|e| Error::decode(format!("filter: {e}")))?,
            );
        }
        Ok(out)
    }

    fn keep_json(&self, json: &Json) -> bool {
        self.groups.iter().all(|(path, pattern)| {
            lookup(json, path)
                .and_then(scalar_text)
                .is_some_and(|v| pattern.regex().is_match(&v))
        })
    }

    fn prune_json(&self, json: Json, prefix: &str) -> Json {
        let Json::Object(map) = json else {
            return json;
        };
        let mut out = Map::new();
        for (key, value) in map {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            if !self.visible(&path) {
                continue;
            }
            let value = match value {
                Json::Object(_) => self.prune_json(value, &path),
                other => other,
            };
            if matches!(&value, Json::Object(m) if m.is_empty()) {
                continue;
            }
            out.insert(key, value);
        }
        Json::Object(out)
    }
}

/// `filter` covers `path` when they are equal or `path` lies below it.
fn covers(filter: &str, path: &str) -> bool {
    path == filter
        || path
            .strip_prefix(filter)
            .is_some_and(|rest| rest.starts_with('.'))
}

fn lookup<'a>(json: &'a Json, path: &str) -> Option<&'a Json> {
    path.split('.').try_fold(json, |node, key| node.get(key))
}

fn scalar_text(json: &Json) -> Option<String> {
    match json {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Interface, Radio};

    fn compile(filters: Vec<PropertyFilter>) -> CompiledFilters {
        CompiledFilters::new(&filters).unwrap()
    }

    #[test]
    fn value_and_exclusive_filters_decide_fetching() {
        let f = compile(vec![
            PropertyFilter::Value {
                path: "radio".into(),
            },
            PropertyFilter::Group {
                path: "ifDescr".into(),
                regex: "^eth".into(),
            },
            PropertyFilter::ExclusiveValue {
                paths: vec!["ifIndex".into(), "radio".into()],
            },
        ]);
        assert!(f.wants("ifIndex"));
        assert!(f.wants("ifDescr"));
        assert!(!f.visible("ifDescr"));
        assert!(!f.wants("radio.level_in"));
        assert!(!f.wants("ifSpeed"));
    }

    #[test]
    fn raw_records_are_grouped_and_pruned() {
        let f = compile(vec![
            PropertyFilter::Group {
                path: "ifDescr".into(),
                regex: "^Radio".into(),
            },
            PropertyFilter::Value {
                path: "ifSpeed".into(),
            },
        ]);
        let mut radio = Record::new();
        radio.insert("ifDescr", "Radio Interface #1");
        radio.insert("ifSpeed", 1000u64);
        let mut eth = Record::new();
        eth.insert("ifDescr", "Ethernet #8");
        assert!(f.keep_record(&radio));
        assert!(!f.keep_record(&eth));
        assert!(!f.keep_record(&Record::new()));
        f.finish(&mut radio);
        assert!(radio.contains("ifDescr"));
        assert!(!radio.contains("ifSpeed"));
    }

    #[test]
    fn typed_items_are_filtered_through_json() {
        let f = compile(vec![
            PropertyFilter::Group {
                path: "ifIndex".into(),
                regex: "^[12]$".into(),
            },
            PropertyFilter::Value {
                path: "radio.level_out".into(),
            },
        ]);
        let mk = |i| Interface {
            if_index: Some(i),
            radio: Some(Radio {
                level_in: Some(-40.0),
                level_out: Some(12.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let out = f.apply(vec![mk(1), mk(2), mk(3)]).unwrap();
        assert_eq!(out.len(), 2);
        let radio = out[0].radio.as_ref().unwrap();
        assert_eq!(radio.level_in, Some(-40.0));
        assert_eq!(radio.level_out, None);
    }

    #[test]
    fn bad_regex_is_a_precondition() {
        let err = CompiledFilters::new(&[PropertyFilter::Group {
            path: "ifDescr".into(),
            regex: "(".into(),
        }])
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PreCondition);
    }

    #[test]
    fn filters_deserialize_from_json() {
        let filters: Vec<PropertyFilter> = serde_json::from_str(
            r#"[{"type":"group","path":"ifDescr","regex":"^eth"},{"type":"exclusive_value","paths":["ifIndex"]}]"#,
        )
        .unwrap();
        assert_eq!(filters.len(), 2);
    }
}
