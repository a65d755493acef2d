//! Reply serialisations: JSON, XML and plain text.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value as Json;

use super::{Reply, Response};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    #[default]
    Json,
    Xml,
    Text,
}

impl FromStr for OutputFormat {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            "text" | "txt" => Ok(Self::Text),
            other => Err(Error::pre_condition(format!("unknown output format '{other}'"))),
        }
    }
}

pub fn render(reply: &Reply, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(reply).map_err(encode_error),
        OutputFormat::Xml => xml(reply),
        OutputFormat::Text => text(reply),
    }
}

fn encode_error(e: impl std::fmt::Display) -> Box<Error> {
    Error::decode(format!("encoding reply: {e}"))
}

/// List payloads become repeated `<item>` children of the root element.
#[derive(Serialize)]
struct Items<'a, T> {
    item: &'a [T],
}

#[derive(Serialize)]
struct Scalar<T> {
    value: T,
}

fn to_xml<T: Serialize>(root: &str, value: &T) -> Result<String> {
    quick_xml::se::to_string_with_root(root, value).map_err(encode_error)
}

fn xml(reply: &Reply) -> Result<String> {
    let response = match reply {
        Reply::Failure(failure) => return to_xml("error", failure),
        Reply::Success(response) => response,
    };
    match response {
        Response::Identify(v) => to_xml("identify", v),
        Response::Check(v) => to_xml("check", v),
        Response::Interfaces(v) => to_xml("interfaces", &Items { item: v }),
        Response::Count(v) => to_xml("count", &Scalar { value: v }),
        Response::CpuLoad(v) => to_xml("cpu_load", &Items { item: v }),
        Response::MemoryUsage(v) => to_xml("memory_usage", &Items { item: v }),
        Response::Ups(v) => to_xml("ups", v),
        Response::Disk(v) => to_xml("disk", &Items { item: v }),
        Response::Sbc(v) => to_xml("sbc", v),
        Response::Server(v) => to_xml("server", v),
        Response::HardwareHealth(v) => to_xml("hardware_health", v),
        Response::HighAvailability(v) => to_xml("high_availability", v),
        Response::Siem(v) => to_xml("siem", v),
        Response::Components(v) => to_xml("components", &Items { item: v }),
    }
}

fn text(reply: &Reply) -> Result<String> {
    match reply {
        Reply::Failure(failure) => Ok(format!("error ({}): {}", failure.kind, failure.message)),
        Reply::Success(Response::Check(check)) => Ok(check.to_string()),
        Reply::Success(Response::Count(n)) => Ok(n.to_string()),
        Reply::Success(response) => {
            let mut value = serde_json::to_value(response).map_err(encode_error)?;
            let data = value.get_mut("data").map(Json::take).unwrap_or_default();
            let mut out = String::new();
            write_text(&data, 0, &mut out);
            Ok(out.trim_end().to_owned())
        }
    }
}

fn scalar(value: &Json) -> Option<String> {
    match value {
        Json::Null => Some(String::new()),
        Json::Bool(b) => Some(b.to_string()),
        Json::Number(n) => Some(n.to_string()),
        Json::String(s) => Some(s.clone()),
        Json::Array(a) if a.is_empty() => Some("[]".to_owned()),
        Json::Object(o) if o.is_empty() => Some("{}".to_owned()),
        _ => None,
    }
}

/// Indented `key: value` lines, `-` for list entries.
fn write_text(value: &Json, indent: usize, out: &mut String) {
    let pad = " ".repeat(indent);
    match value {
        Json::Object(map) => {
            for (key, v) in map {
                match scalar(v) {
                    Some(s) => {
                        let _ = writeln!(out, "{pad}{key}: {s}");
                    }
                    None => {
                        let _ = writeln!(out, "{pad}{key}:");
                        write_text(v, indent + 2, out);
                    }
                }
            }
        }
        Json::Array(items) => {
            for item in items {
                match scalar(item) {
                    Some(s) => {
                        let _ = writeln!(out, "{pad}- {s}");
                    }
                    None => {
                        let _ = writeln!(out, "{pad}-");
                        write_text(item, indent + 2, out);
                    }
                }
            }
        }
        other => {
            let _ = writeln!(out, "{pad}{}", scalar(other).unwrap_or_default());
        }
    }
}
