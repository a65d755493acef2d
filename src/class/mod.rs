//! Device class hierarchy.
//!
//! Classes are loaded once from the asset bundle and never change. Each
//! class names its parent by path prefix (`ceragon/ip10` extends `ceragon`,
//! top-level classes extend `generic`) and inherits every property recipe
//! it does not define itself.

mod condition;
mod definition;

pub use condition::{Condition, MatchMode, Matcher, parse_condition};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::assets::{AssetSource, CLASS_DIR};
use crate::error::{Error, Result};
use crate::recipe::{BulkRecipe, Recipe};

/// Identifier of the root class.
pub const GENERIC: &str = "generic";

/// Capability groups a class may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Identify,
    Interfaces,
    Cpu,
    Memory,
    Disk,
    Ups,
    Server,
    Sbc,
    HardwareHealth,
    HighAvailability,
    Siem,
}

impl Component {
    pub const ALL: [Component; 11] = [
        Component::Identify,
        Component::Interfaces,
        Component::Cpu,
        Component::Memory,
        Component::Disk,
        Component::Ups,
        Component::Server,
        Component::Sbc,
        Component::HardwareHealth,
        Component::HighAvailability,
        Component::Siem,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Component::Identify => "identify",
            Component::Interfaces => "interfaces",
            Component::Cpu => "cpu",
            Component::Memory => "memory",
            Component::Disk => "disk",
            Component::Ups => "ups",
            Component::Server => "server",
            Component::Sbc => "sbc",
            Component::HardwareHealth => "hardware_health",
            Component::HighAvailability => "high_availability",
            Component::Siem => "siem",
        }
    }

    /// Components whose top-level property is a list.
    pub fn is_list(self) -> bool {
        matches!(
            self,
            Component::Interfaces | Component::Cpu | Component::Memory | Component::Disk
        )
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        Component::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::not_found(format!("component '{s}'")))
    }
}

/// One node of the class tree.
#[derive(Debug)]
pub struct DeviceClass {
    pub id: String,
    pub parent: Option<String>,
    pub try_to_match_last: bool,
    pub condition: Condition,
    /// Components declared by this class alone.
    pub components: BTreeSet<Component>,
    /// Recipes declared by this class alone, by dotted property path.
    pub properties: BTreeMap<String, Recipe>,
    /// Direct children, sorted by identifier.
    pub children: Vec<String>,
}

impl DeviceClass {
    pub fn is_generic(&self) -> bool {
        self.id == GENERIC
    }
}

/// The compiled class tree.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<String, Arc<DeviceClass>>,
}

impl ClassRegistry {
    /// Load every class file below the class directory of `source`.
    pub fn load(source: &dyn AssetSource) -> Result<Self> {
        let mut files = Vec::new();
        for path in source.list(CLASS_DIR)? {
            let contents = source.read(&format!("{CLASS_DIR}/{path}"))?;
            files.push((path, contents));
        }
        Self::from_files(files)
    }

    /// Build the tree from `(path below the class directory, contents)`.
    pub fn from_files<I, P, C>(files: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: AsRef<str>,
    {
        let mut classes: BTreeMap<String, DeviceClass> = BTreeMap::new();
        for (path, contents) in files {
            let path = path.as_ref();
            let class = definition::parse(path, contents.as_ref())?;
            if classes.contains_key(&class.id) {
                return Err(Error::config(format!(
                    "{path}: duplicate class identifier '{}'",
                    class.id
                )));
            }
            classes.insert(class.id.clone(), class);
        }

        if !classes.contains_key(GENERIC) {
            return Err(Error::config("class 'generic' is missing"));
        }
        let links: Vec<(String, String)> = classes
            .values()
            .filter_map(|c| c.parent.clone().map(|p| (p, c.id.clone())))
            .collect();
        for (parent, child) in links {
            let node = classes.get_mut(&parent).ok_or_else(|| {
                Error::config(format!("class '{child}': parent '{parent}' is missing"))
            })?;
            node.children.push(child);
        }
        for class in classes.values_mut() {
            class.children.sort();
        }

        tracing::debug!(target: "async_devmon::class", { classes = classes.len() }, "class tree loaded");
        Ok(Self {
            classes: classes
                .into_iter()
                .map(|(id, c)| (id, Arc::new(c)))
                .collect(),
        })
    }

    pub fn get(&self, id: &str) -> Result<Arc<DeviceClass>> {
        self.classes
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("device class '{id}'")))
    }

    pub fn generic(&self) -> Arc<DeviceClass> {
        // Presence of the root is checked at load time.
        self.classes
            .get(GENERIC)
            .cloned()
            .unwrap_or_else(|| Arc::new(empty_generic()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn children(&self, class: &DeviceClass) -> Vec<Arc<DeviceClass>> {
        class
            .children
            .iter()
            .filter_map(|id| self.classes.get(id).cloned())
            .collect()
    }

    /// `id` followed by its ancestors up to `generic`.
    pub fn chain(&self, id: &str) -> Result<Vec<Arc<DeviceClass>>> {
        let mut out = Vec::new();
        let mut next = Some(id.to_owned());
        while let Some(current) = next {
            let class = self.get(&current)?;
            next = class.parent.clone();
            out.push(class);
        }
        Ok(out)
    }

    /// Components of `id` including inherited ones.
    pub fn components(&self, id: &str) -> Result<BTreeSet<Component>> {
        Ok(self
            .chain(id)?
            .iter()
            .flat_map(|c| c.components.iter().copied())
            .collect())
    }

    pub fn has_component(&self, id: &str, component: Component) -> Result<bool> {
        Ok(self
            .chain(id)?
            .iter()
            .any(|c| c.components.contains(&component)))
    }

    /// Nearest recipe for `path` along the chain of `id`. Bulk recipes with
    /// `inherit` are merged with the nearest ancestor's recipe for the same
    /// path, own fields taking precedence.
    pub fn resolve_property(&self, id: &str, path: &str) -> Result<Option<Recipe>> {
        let chain = self.chain(id)?;
        Ok(resolve_in(&chain, path))
    }

    /// Every property path defined anywhere along the chain of `id` below
    /// `prefix.`.
    pub fn property_paths(&self, id: &str, prefix: &str) -> Result<BTreeSet<String>> {
        let dotted = format!("{prefix}.");
        Ok(self
            .chain(id)?
            .iter()
            .flat_map(|c| c.properties.keys())
            .filter(|k| k.starts_with(&dotted))
            .cloned()
            .collect())
    }
}

fn resolve_in(chain: &[Arc<DeviceClass>], path: &str) -> Option<Recipe> {
    let (pos, recipe) = chain
        .iter()
        .enumerate()
        .find_map(|(i, c)| c.properties.get(path).map(|r| (i, r)))?;
    match recipe {
        Recipe::Bulk(bulk) if bulk.inherit => {
            let Some(Recipe::Bulk(base)) = resolve_in(&chain[pos + 1..], path) else {
                return Some(recipe.clone());
            };
            let mut fields = base.fields;
            fields.extend(bulk.fields.clone());
            Some(Recipe::Bulk(BulkRecipe {
                index: bulk.index.clone(),
                inherit: false,
                fields,
            }))
        }
        _ => Some(recipe.clone()),
    }
}

fn empty_generic() -> DeviceClass {
    DeviceClass {
        id: GENERIC.to_owned(),
        parent: None,
        try_to_match_last: false,
        condition: Condition::Always,
        components: BTreeSet::new(),
        properties: BTreeMap::new(),
        children: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::EmbeddedAssets;

    const GENERIC_YAML: &str = r#"
components: [identify, interfaces]
properties:
  identify:
    vendor: {constant: unknown}
  interfaces:
    bulk:
      index: .1.3.6.1.2.1.2.2.1.1
      fields:
        ifIndex: {get: .1.3.6.1.2.1.2.2.1.1}
        ifDescr: {get: .1.3.6.1.2.1.2.2.1.2}
"#;

    fn registry(extra: &[(&str, &str)]) -> Result<ClassRegistry> {
        let mut files = vec![("generic.yaml", GENERIC_YAML)];
        files.extend_from_slice(extra);
        ClassRegistry::from_files(files)
    }

    #[test]
    fn tree_links_children_by_prefix() {
        let reg = registry(&[
            ("ceragon.yaml", "components: [cpu]\n"),
            ("ceragon/ip20.yaml", ""),
            ("ceragon/ip10.yaml", ""),
        ])
        .unwrap();
        let generic = reg.generic();
        assert_eq!(generic.children, ["ceragon"]);
        let ceragon = reg.get("ceragon").unwrap();
        assert_eq!(ceragon.children, ["ceragon/ip10", "ceragon/ip20"]);
        let chain: Vec<_> = reg
            .chain("ceragon/ip10")
            .unwrap()
            .iter()
            .map(|c| c.id.clone())
            .collect();
        assert_eq!(chain, ["ceragon/ip10", "ceragon", "generic"]);
    }

    #[test]
    fn components_are_inherited() {
        let reg = registry(&[("ceragon.yaml", "components: [cpu]\n"), ("ceragon/ip10.yaml", "")])
            .unwrap();
        assert!(reg.has_component("ceragon/ip10", Component::Cpu).unwrap());
        assert!(reg.has_component("ceragon/ip10", Component::Interfaces).unwrap());
        assert!(!reg.has_component("ceragon/ip10", Component::Ups).unwrap());
        assert!(!reg.has_component("generic", Component::Cpu).unwrap());
    }

    #[test]
    fn loading_rejects_broken_trees() {
        assert!(registry(&[("a/b.yaml", "")]).is_err());
        assert!(registry(&[("a.yaml", ""), ("b.yaml", "name: a\n")]).is_err());
        assert!(ClassRegistry::from_files([("a.yaml", "")]).is_err());
        let err = registry(&[("bad.yaml", "properties:\n  identify:\n    vendor: {get: {}}\n")])
            .unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn nearest_recipe_wins_and_bulk_inherit_merges() {
        let reg = registry(&[(
            "ceragon.yaml",
            r#"
properties:
  identify:
    vendor: {constant: Ceragon}
  interfaces:
    bulk:
      index: .1.3.6.1.2.1.2.2.1.1
      inherit: true
      fields:
        ifDescr: {get: .1.3.6.1.2.1.31.1.1.1.1}
        radio:
          level_in: {get: .1.3.6.1.4.1.2281.10.5.1.1.2}
"#,
        )])
        .unwrap();
        let Some(Recipe::Constant(vendor)) =
            reg.resolve_property("ceragon", "identify.vendor").unwrap()
        else {
            panic!("expected constant");
        };
        assert_eq!(vendor.as_string(), "Ceragon");

        let Some(Recipe::Bulk(bulk)) = reg.resolve_property("ceragon", "interfaces").unwrap()
        else {
            panic!("expected bulk");
        };
        let keys: Vec<_> = bulk.fields.keys().cloned().collect();
        assert_eq!(keys, ["ifDescr", "ifIndex", "radio.level_in"]);
        let Recipe::Get(descr) = &bulk.fields["ifDescr"] else {
            panic!("expected get");
        };
        assert_eq!(descr.oid, ".1.3.6.1.2.1.31.1.1.1.1");
        assert!(reg.resolve_property("ceragon", "cpu").unwrap().is_none());
    }

    #[test]
    fn embedded_bundle_loads() {
        let reg = ClassRegistry::load(&EmbeddedAssets).unwrap();
        for id in ["generic", "ceragon/ip10", "ironware", "ios", "linux/logpoint"] {
            assert!(reg.get(id).is_ok(), "{id}");
        }
        assert!(reg.get("ceragon/ip10").unwrap().children.is_empty());
    }
}
