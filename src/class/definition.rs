//! Class data files.
//!
//! ```yaml
//! try_to_match_last: false
//! match:
//!   type: snmpget
//!   oid: .1.3.6.1.2.1.1.2.0
//!   match_mode: starts_with
//!   values: [.1.3.6.1.4.1.2281.]
//! components: [interfaces, cpu]
//! properties:
//!   identify:
//!     vendor: {constant: Ceragon}
//!   cpu:
//!     bulk:
//!       index: .1.3.6.1.4.1.2281.10.1.1.9
//!       fields:
//!         load: {get: .1.3.6.1.4.1.2281.10.1.1.9}
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_yaml::Value as Yaml;

use super::condition::{Condition, parse_condition};
use super::{Component, DeviceClass};
use crate::error::{Error, Result};
use crate::recipe::{Recipe, flatten};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ClassFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    try_to_match_last: bool,
    #[serde(default, rename = "match")]
    condition: Option<Yaml>,
    #[serde(default)]
    components: Vec<Component>,
    #[serde(default)]
    properties: Option<Yaml>,
}

/// Identifier implied by a path below the class directory.
pub(super) fn id_from_path(path: &str) -> Option<&str> {
    path.strip_suffix(".yaml").or_else(|| path.strip_suffix(".yml"))
}

/// Parent identifier by prefix; top-level classes hang below `generic`.
pub(super) fn parent_id(id: &str) -> Option<String> {
    if id == super::GENERIC {
        return None;
    }
    Some(match id.rsplit_once('/') {
        Some((parent, _)) => parent.to_owned(),
        None => super::GENERIC.to_owned(),
    })
}

/// Parse one class file.
pub(super) fn parse(path: &str, contents: &str) -> Result<DeviceClass> {
    let fail = |what: String| Error::config(format!("{path}: {what}"));
    let default_id = id_from_path(path).ok_or_else(|| fail("not a YAML file".into()))?;
    let file: ClassFile = serde_yaml::from_str(contents).map_err(|e| fail(e.to_string()))?;
    let id = file.name.unwrap_or_else(|| default_id.to_owned());
    if id.is_empty() || id.split('/').any(str::is_empty) {
        return Err(fail(format!("invalid class identifier '{id}'")));
    }

    let condition = match &file.condition {
        Some(yaml) => parse_condition(yaml).map_err(|e| fail(e.to_string()))?,
        None => Condition::Always,
    };

    let mut properties = BTreeMap::new();
    if let Some(yaml) = &file.properties {
        flatten(yaml, "", &mut properties).map_err(|e| fail(e.to_string()))?;
    }
    for (key, recipe) in &properties {
        let component = key.split('.').next().unwrap_or_default();
        let component: Component = component
            .parse()
            .map_err(|_| fail(format!("property '{key}' names no known component")))?;
        if component.is_list() && !matches!(recipe, Recipe::Bulk(_)) && !key.contains('.') {
            return Err(fail(format!("property '{key}' must be a bulk recipe")));
        }
    }

    Ok(DeviceClass {
        parent: parent_id(&id),
        id,
        try_to_match_last: file.try_to_match_last,
        condition,
        components: file.components.into_iter().collect::<BTreeSet<_>>(),
        properties,
        children: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_follow_path_prefixes() {
        assert_eq!(parent_id("generic"), None);
        assert_eq!(parent_id("ceragon").as_deref(), Some("generic"));
        assert_eq!(parent_id("ceragon/ip10").as_deref(), Some("ceragon"));
        assert_eq!(parent_id("a/b/c").as_deref(), Some("a/b"));
    }

    #[test]
    fn parses_a_class_file() {
        let class = parse(
            "ceragon/ip10.yaml",
            r#"
match:
  type: snmpget
  oid: .1.3.6.1.2.1.1.1.0
  match_mode: contains
  values: [IP-10]
components: [interfaces]
properties:
  identify:
    model: {constant: IP-10}
    os_version:
      get: {oid: .1.3.6.1.4.1.2281.10.4.1.13.1.1.3.1, ops: [trim]}
"#,
        )
        .unwrap();
        assert_eq!(class.id, "ceragon/ip10");
        assert_eq!(class.parent.as_deref(), Some("ceragon"));
        assert!(class.components.contains(&Component::Interfaces));
        assert!(class.properties.contains_key("identify.os_version"));
    }

    #[test]
    fn rejects_unknown_sections_and_components() {
        assert!(parse("x.yaml", "colour: blue\n").is_err());
        assert!(parse("x.yaml", "properties:\n  toaster:\n    heat: {constant: 3}\n").is_err());
        assert!(parse("x.yaml", "properties:\n  interfaces: {constant: 3}\n").is_err());
    }
}
