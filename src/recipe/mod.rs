//! Property recipes.
//!
//! A recipe describes how to obtain one property value from a device. Class
//! files write recipes as single-key maps whose key names the variant:
//!
//! ```yaml
//! identify:
//!   vendor:
//!     constant: Ceragon
//!   serial_number:
//!     get:
//!       oid: .1.3.6.1.4.1.2281.10.4.1.13.1.1.5.1
//!       ops: [trim]
//!   model:
//!     chain:
//!       - lookup: {mapping: ceragonModel, source: {get: .1.3.6.1.2.1.1.2.0}}
//!       - regex_extract: {source: {get: .1.3.6.1.2.1.1.1.0}, regex: "^(\\S+)"}
//! ```
//!
//! Nested maps that are not recipes are flattened into dotted property
//! paths, so the block above defines `identify.vendor`,
//! `identify.serial_number` and `identify.model`.

mod eval;

pub use eval::{EvalContext, apply_ops, eval};
pub(crate) use eval::is_absent;

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value as Yaml;

use crate::codec::RawValue;
use crate::error::{Error, Result};
use crate::oid::Oid;

/// Keys that turn a single-key map into a recipe.
pub const RECIPE_TAGS: [&str; 7] = [
    "get",
    "bulk",
    "http",
    "constant",
    "lookup",
    "regex_extract",
    "chain",
];

/// A compiled regular expression read from a data file.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self> {
        Regex::new(source)
            .map(Pattern)
            .map_err(|e| Error::config(format!("invalid regex '{source}': {e}")))
    }

    pub fn regex(&self) -> &Regex {
        &self.0
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Pattern::new(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone)]
pub enum Recipe {
    Get(GetRecipe),
    Bulk(BulkRecipe),
    Http(HttpRecipe),
    Constant(RawValue),
    Lookup(LookupRecipe),
    RegexExtract(RegexExtractRecipe),
    /// First alternative that yields a value.
    Chain(Vec<Recipe>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetRecipe {
    /// OID, optionally containing `${index}`.
    pub oid: String,
    #[serde(default)]
    pub use_raw_result: bool,
    #[serde(skip)]
    pub ops: Vec<Op>,
}

/// A list property: walk `index`, then read every field per index.
#[derive(Debug, Clone)]
pub struct BulkRecipe {
    pub index: Oid,
    /// Merge the fields of the nearest ancestor's recipe for this property.
    pub inherit: bool,
    pub fields: BTreeMap<String, Recipe>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpRecipe {
    /// Path, optionally containing `${index}`.
    pub path: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(skip)]
    pub parser: ResponseParser,
    #[serde(skip)]
    pub ops: Vec<Op>,
}

#[derive(Debug, Clone, Default)]
pub enum ResponseParser {
    #[default]
    Body,
    JsonPointer(String),
    Regex { pattern: Pattern, group: usize },
}

#[derive(Debug, Clone)]
pub struct LookupRecipe {
    pub mapping: String,
    pub source: Box<Recipe>,
    pub ops: Vec<Op>,
}

#[derive(Debug, Clone)]
pub struct RegexExtractRecipe {
    pub source: Box<Recipe>,
    pub regex: Pattern,
    pub group: usize,
    pub ops: Vec<Op>,
}

/// Post-processing applied to a recipe result, in order.
#[derive(Debug, Clone)]
pub enum Op {
    Trim,
    RegexReplace { regex: Pattern, replace: String },
    Multiply(f64),
    Divide(f64),
    Map(BTreeMap<String, String>),
    ToStatus,
    ToHealthState,
}

fn single_entry(value: &Yaml) -> Option<(&str, &Yaml)> {
    let map = value.as_mapping()?;
    if map.len() != 1 {
        return None;
    }
    let (k, v) = map.iter().next()?;
    Some((k.as_str()?, v))
}

fn yaml_err(what: impl fmt::Display) -> Box<Error> {
    Error::config(what.to_string())
}

fn from_yaml<T: serde::de::DeserializeOwned>(what: &str, value: &Yaml) -> Result<T> {
    serde_yaml::from_value(value.clone()).map_err(|e| yaml_err(format!("{what}: {e}")))
}

/// A YAML scalar as a raw value.
pub fn scalar(value: &Yaml) -> Result<RawValue> {
    match value {
        Yaml::String(s) => Ok(RawValue::Text(s.clone())),
        Yaml::Bool(b) => Ok(RawValue::Text(b.to_string())),
        Yaml::Number(n) => {
            if let Some(u) = n.as_u64() {
                Ok(RawValue::UInt(u))
            } else if let Some(i) = n.as_i64() {
                Ok(RawValue::Int(i))
            } else {
                Ok(RawValue::Float(n.as_f64().unwrap_or_default()))
            }
        }
        other => Err(yaml_err(format!("expected a scalar, got {other:?}"))),
    }
}

/// Scalar rendered as a string, for match values and table keys.
pub fn scalar_string(value: &Yaml) -> Result<String> {
    scalar(value).map(|v| v.as_string())
}

impl Recipe {
    pub fn from_yaml(value: &Yaml) -> Result<Recipe> {
        let (tag, body) =
            single_entry(value).ok_or_else(|| yaml_err("a recipe is a map with one key"))?;
        match tag {
            "get" => match body {
                Yaml::String(oid) => Ok(Recipe::Get(GetRecipe {
                    oid: oid.clone(),
                    use_raw_result: false,
                    ops: Vec::new(),
                })),
                _ => {
                    let mut get: GetRecipe = from_yaml("get", &strip_ops(body))?;
                    get.ops = parse_ops(body)?;
                    Ok(Recipe::Get(get))
                }
            },
            "bulk" => {
                let index = body
                    .get("index")
                    .and_then(Yaml::as_str)
                    .ok_or_else(|| yaml_err("bulk: missing index"))?;
                let index = Oid::parse(index).map_err(|e| yaml_err(format!("bulk: {e}")))?;
                let inherit = body.get("inherit").and_then(Yaml::as_bool).unwrap_or(false);
                let mut fields = BTreeMap::new();
                if let Some(f) = body.get("fields") {
                    flatten(f, "", &mut fields)?;
                }
                Ok(Recipe::Bulk(BulkRecipe {
                    index,
                    inherit,
                    fields,
                }))
            }
            "http" => match body {
                Yaml::String(path) => Ok(Recipe::Http(HttpRecipe {
                    path: path.clone(),
                    content_type: None,
                    parser: ResponseParser::Body,
                    ops: Vec::new(),
                })),
                _ => {
                    let stripped = strip_keys(body, &["ops", "parser"]);
                    let mut http: HttpRecipe = from_yaml("http", &stripped)?;
                    http.parser = match body.get("parser") {
                        Some(p) => ResponseParser::from_yaml(p)?,
                        None => ResponseParser::Body,
                    };
                    http.ops = parse_ops(body)?;
                    Ok(Recipe::Http(http))
                }
            },
            "constant" => Ok(Recipe::Constant(scalar(body)?)),
            "lookup" => {
                let mapping = body
                    .get("mapping")
                    .and_then(Yaml::as_str)
                    .ok_or_else(|| yaml_err("lookup: missing mapping"))?;
                let source = body
                    .get("source")
                    .ok_or_else(|| yaml_err("lookup: missing source"))?;
                Ok(Recipe::Lookup(LookupRecipe {
                    mapping: mapping.to_owned(),
                    source: Box::new(Recipe::from_yaml(source)?),
                    ops: parse_ops(body)?,
                }))
            }
            "regex_extract" => {
                let source = body
                    .get("source")
                    .ok_or_else(|| yaml_err("regex_extract: missing source"))?;
                let regex = body
                    .get("regex")
                    .and_then(Yaml::as_str)
                    .ok_or_else(|| yaml_err("regex_extract: missing regex"))?;
                let group = body
                    .get("group")
                    .and_then(Yaml::as_u64)
                    .map(|g| g as usize)
                    .unwrap_or(1);
                Ok(Recipe::RegexExtract(RegexExtractRecipe {
                    source: Box::new(Recipe::from_yaml(source)?),
                    regex: Pattern::new(regex)?,
                    group,
                    ops: parse_ops(body)?,
                }))
            }
            "chain" => {
                let items = body
                    .as_sequence()
                    .ok_or_else(|| yaml_err("chain: expected a list of recipes"))?;
                let recipes = items.iter().map(Recipe::from_yaml).collect::<Result<Vec<_>>>()?;
                if recipes.is_empty() {
                    return Err(yaml_err("chain: empty"));
                }
                Ok(Recipe::Chain(recipes))
            }
            other => Err(yaml_err(format!("unknown recipe type '{other}'"))),
        }
    }

    pub fn as_bulk(&self) -> Option<&BulkRecipe> {
        match self {
            Recipe::Bulk(b) => Some(b),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Recipe {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = Yaml::deserialize(d)?;
        Recipe::from_yaml(&value).map_err(serde::de::Error::custom)
    }
}

impl ResponseParser {
    fn from_yaml(value: &Yaml) -> Result<Self> {
        if value.as_str() == Some("body") {
            return Ok(ResponseParser::Body);
        }
        match single_entry(value) {
            Some(("json_pointer", Yaml::String(p))) => Ok(ResponseParser::JsonPointer(p.clone())),
            Some(("regex", Yaml::String(p))) => Ok(ResponseParser::Regex {
                pattern: Pattern::new(p)?,
                group: 1,
            }),
            Some(("regex", body)) => {
                let pattern = body
                    .get("pattern")
                    .and_then(Yaml::as_str)
                    .ok_or_else(|| yaml_err("regex parser: missing pattern"))?;
                let group = body.get("group").and_then(Yaml::as_u64).unwrap_or(1) as usize;
                Ok(ResponseParser::Regex {
                    pattern: Pattern::new(pattern)?,
                    group,
                })
            }
            _ => Err(yaml_err(format!("unknown response parser {value:?}"))),
        }
    }
}

impl Op {
    fn from_yaml(value: &Yaml) -> Result<Op> {
        match value.as_str() {
            Some("trim") => return Ok(Op::Trim),
            Some("to_status") => return Ok(Op::ToStatus),
            Some("to_health_state") => return Ok(Op::ToHealthState),
            Some(other) => return Err(yaml_err(format!("unknown op '{other}'"))),
            None => {}
        }
        let (tag, body) = single_entry(value).ok_or_else(|| yaml_err("an op is a name or a map with one key"))?;
        let number = |what: &str| {
            body.as_f64()
                .filter(|n| n.is_finite())
                .ok_or_else(|| yaml_err(format!("{what}: expected a number")))
        };
        match tag {
            "multiply" => Ok(Op::Multiply(number("multiply")?)),
            "divide" => {
                let n = number("divide")?;
                if n == 0.0 {
                    return Err(yaml_err("divide: division by zero"));
                }
                Ok(Op::Divide(n))
            }
            "regex_replace" => {
                let regex = body
                    .get("regex")
                    .and_then(Yaml::as_str)
                    .ok_or_else(|| yaml_err("regex_replace: missing regex"))?;
                let replace = body
                    .get("replace")
                    .map(scalar_string)
                    .transpose()?
                    .unwrap_or_default();
                Ok(Op::RegexReplace {
                    regex: Pattern::new(regex)?,
                    replace,
                })
            }
            "map" => {
                let table = body
                    .as_mapping()
                    .ok_or_else(|| yaml_err("map: expected a table"))?;
                let mut out = BTreeMap::new();
                for (k, v) in table {
                    out.insert(scalar_string(k)?, scalar_string(v)?);
                }
                Ok(Op::Map(out))
            }
            other => Err(yaml_err(format!("unknown op '{other}'"))),
        }
    }
}

fn parse_ops(body: &Yaml) -> Result<Vec<Op>> {
    match body.get("ops") {
        None => Ok(Vec::new()),
        Some(Yaml::Sequence(items)) => items.iter().map(Op::from_yaml).collect(),
        Some(_) => Err(yaml_err("ops: expected a list")),
    }
}

fn strip_keys(body: &Yaml, keys: &[&str]) -> Yaml {
    let mut body = body.clone();
    if let Some(map) = body.as_mapping_mut() {
        for key in keys {
            map.remove(*key);
        }
    }
    body
}

fn strip_ops(body: &Yaml) -> Yaml {
    strip_keys(body, &["ops"])
}

/// Flatten nested property maps into dotted paths.
pub fn flatten(value: &Yaml, prefix: &str, out: &mut BTreeMap<String, Recipe>) -> Result<()> {
    if let Some((tag, _)) = single_entry(value)
        && RECIPE_TAGS.contains(&tag)
    {
        if prefix.is_empty() {
            return Err(yaml_err("a recipe needs a property name"));
        }
        let recipe =
            Recipe::from_yaml(value).map_err(|e| yaml_err(format!("property '{prefix}': {e}")))?;
        out.insert(prefix.to_owned(), recipe);
        return Ok(());
    }
    let map = value
        .as_mapping()
        .ok_or_else(|| yaml_err(format!("property '{prefix}': expected a recipe or a map")))?;
    for (key, child) in map {
        let key = scalar_string(key)?;
        let path = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        flatten(child, &path, out)?;
    }
    Ok(())
}
