use std::collections::BTreeMap;

use crate::codec::RawValue;
use crate::device::{HealthState, Status};

/// One row of a group property: field path to raw value.
///
/// Paths are dotted, so `radio.level_in` addresses field `level_in` of the
/// `radio` sub-record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, RawValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.insert(path.into(), value.into());
    }

    pub fn get(&self, path: &str) -> Option<&RawValue> {
        self.fields.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.fields.contains_key(path)
    }

    /// Remove `path` and every field below it.
    pub fn remove_path(&mut self, path: &str) {
        self.fields.retain(|key, _| !path_matches(key, path));
    }

    /// Keep only fields at or below one of `paths`.
    pub fn retain_paths(&mut self, paths: &[String]) {
        self.fields
            .retain(|key, _| paths.iter().any(|p| path_matches(key, p)));
    }

    /// Copy every field of `other` not already present.
    pub fn merge_missing(&mut self, other: Record) {
        for (key, value) in other.fields {
            self.fields.entry(key).or_insert(value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether any field lives below `prefix`.
    pub fn has_section(&self, prefix: &str) -> bool {
        let dotted = format!("{prefix}.");
        self.fields.keys().any(|k| k.starts_with(&dotted))
    }

    pub fn string(&self, path: &str) -> Option<String> {
        self.get(path).map(RawValue::as_string)
    }

    pub fn uint(&self, path: &str) -> Option<u64> {
        self.convert(path, RawValue::as_uint)
    }

    pub fn int(&self, path: &str) -> Option<i64> {
        self.convert(path, RawValue::as_int)
    }

    pub fn float(&self, path: &str) -> Option<f64> {
        self.convert(path, RawValue::as_float)
    }

    pub fn status(&self, path: &str) -> Option<Status> {
        let value = self.get(path)?;
        match value.as_int() {
            Ok(code) => Status::from_code(code),
            Err(_) => value.as_string().parse().ok(),
        }
    }

    pub fn health(&self, path: &str) -> Option<HealthState> {
        let value = self.get(path)?;
        match value.as_int() {
            Ok(code) => HealthState::from_code(code),
            Err(_) => value.as_string().parse().ok(),
        }
    }

    fn convert<T>(&self, path: &str, f: impl Fn(&RawValue) -> crate::Result<T>) -> Option<T> {
        let value = self.get(path)?;
        match f(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(target: "async_devmon::device", { field = path, error = %e }, "dropping unconvertible field");
                None
            }
        }
    }
}

/// Typed records assembled from a [`Record`].
pub trait FromRecord {
    fn from_record(record: &Record) -> Self;
}

fn path_matches(key: &str, path: &str) -> bool {
    key == path
        || key
            .strip_prefix(path)
            .is_some_and(|rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_path_drops_whole_section() {
        let mut r = Record::new();
        r.insert("ifDescr", "eth0");
        r.insert("radio.level_in", -40i64);
        r.insert("radio.level_out", 10i64);
        r.insert("radioX", 1i64);
        r.remove_path("radio");
        assert!(r.contains("ifDescr"));
        assert!(r.contains("radioX"));
        assert!(!r.has_section("radio"));
    }

    #[test]
    fn typed_accessors_tolerate_text() {
        let mut r = Record::new();
        r.insert("ifSpeed", "1000");
        r.insert("ifOperStatus", "up");
        r.insert("state", 3i64);
        assert_eq!(r.uint("ifSpeed"), Some(1000));
        assert_eq!(r.status("ifOperStatus"), Some(Status::Up));
        assert_eq!(r.health("state"), Some(HealthState::Critical));
        assert_eq!(r.uint("missing"), None);
    }
}
