//! Match conditions deciding whether a device belongs to a class.

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_yaml::Value as Yaml;

use crate::env::RequestEnv;
use crate::error::{Error, ErrorKind, Result};
use crate::oid::Oid;
use crate::recipe::{Pattern, scalar_string};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Equals,
    StartsWith,
    Contains,
    Regex,
}

/// Compares a probe result against the expected values; any value may
/// match.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawMatcher")]
pub struct Matcher {
    mode: MatchMode,
    values: Vec<String>,
    patterns: Vec<Pattern>,
}

#[derive(Deserialize)]
struct RawMatcher {
    match_mode: MatchMode,
    values: Vec<Yaml>,
}

impl TryFrom<RawMatcher> for Matcher {
    type Error = String;

    fn try_from(raw: RawMatcher) -> std::result::Result<Self, String> {
        let values = raw
            .values
            .iter()
            .map(scalar_string)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.to_string())?;
        if values.is_empty() {
            return Err("a match needs at least one value".into());
        }
        Matcher::new(raw.match_mode, values).map_err(|e| e.to_string())
    }
}

impl Matcher {
    pub fn new(mode: MatchMode, values: Vec<String>) -> Result<Self> {
        let patterns = if mode == MatchMode::Regex {
            values.iter().map(|v| Pattern::new(v)).collect::<Result<_>>()?
        } else {
            Vec::new()
        };
        Ok(Self {
            mode,
            values,
            patterns,
        })
    }

    pub fn matches(&self, actual: &str) -> bool {
        match self.mode {
            MatchMode::Equals => self.values.iter().any(|v| actual == v),
            MatchMode::StartsWith => self.values.iter().any(|v| actual.starts_with(v.as_str())),
            MatchMode::Contains => self.values.iter().any(|v| actual.contains(v.as_str())),
            MatchMode::Regex => self.patterns.iter().any(|p| p.regex().is_match(actual)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    And {
        conditions: Vec<Condition>,
    },
    Or {
        conditions: Vec<Condition>,
    },
    Not {
        condition: Box<Condition>,
    },
    Snmpget {
        oid: Oid,
        #[serde(flatten)]
        matcher: Matcher,
    },
    /// True if any value of the walked subtree matches.
    Snmpwalk {
        oid: Oid,
        #[serde(flatten)]
        matcher: Matcher,
    },
    /// Matches against the body of a GET.
    Http {
        path: String,
        #[serde(flatten)]
        matcher: Matcher,
    },
    #[default]
    Always,
}

impl Condition {
    /// Evaluate against the live connection. Probe failures count as no
    /// match; only cancellation propagates.
    pub fn evaluate<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            env.check_cancelled()?;
            match self {
                Condition::Always => Ok(true),
                Condition::And { conditions } => {
                    for c in conditions {
                        if !c.evaluate(env).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                Condition::Or { conditions } => {
                    for c in conditions {
                        if c.evaluate(env).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Condition::Not { condition } => Ok(!condition.evaluate(env).await?),
                Condition::Snmpget { oid, matcher } => {
                    let probe = async {
                        let snmp = env.connection.snmp()?;
                        let value = env.run(snmp.get_one(oid)).await?;
                        Ok(matcher.matches(&crate::codec::RawValue::Snmp(value).as_string()))
                    };
                    settle(probe.await, "snmpget", &oid.to_string())
                }
                Condition::Snmpwalk { oid, matcher } => {
                    let probe = async {
                        let snmp = env.connection.snmp()?;
                        let vbs = env.run(snmp.walk(oid)).await?;
                        Ok(vbs.into_iter().any(|vb| {
                            matcher.matches(&crate::codec::RawValue::Snmp(vb.value).as_string())
                        }))
                    };
                    settle(probe.await, "snmpwalk", &oid.to_string())
                }
                Condition::Http { path, matcher } => {
                    let probe = async {
                        let http = env.connection.http()?;
                        let response = env.run(http.get(path)).await?;
                        Ok(matcher.matches(&response.body))
                    };
                    settle(probe.await, "http", path)
                }
            }
        })
    }
}

fn settle(outcome: Result<bool>, probe: &str, target: &str) -> Result<bool> {
    match outcome {
        Ok(matched) => Ok(matched),
        Err(e) if matches!(e.kind(), ErrorKind::Cancelled | ErrorKind::Timeout) => Err(e),
        Err(e) => {
            tracing::debug!(target: "async_devmon::class", { probe, target, error = %e }, "condition probe failed");
            Ok(false)
        }
    }
}

/// Parse a condition tree from YAML.
pub fn parse_condition(value: &Yaml) -> Result<Condition> {
    serde_yaml::from_value(value.clone()).map_err(|e| Error::config(format!("match: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_conditions() {
        let yaml: Yaml = serde_yaml::from_str(
            r#"
type: and
conditions:
  - type: snmpget
    oid: .1.3.6.1.2.1.1.2.0
    match_mode: starts_with
    values: [.1.3.6.1.4.1.2281]
  - type: not
    condition:
      type: snmpget
      oid: .1.3.6.1.2.1.1.1.0
      match_mode: regex
      values: ["IP-?20"]
"#,
        )
        .unwrap();
        let cond = parse_condition(&yaml).unwrap();
        let Condition::And { conditions } = cond else {
            panic!("expected and");
        };
        assert_eq!(conditions.len(), 2);
        assert!(matches!(conditions[1], Condition::Not { .. }));
    }

    #[test]
    fn matcher_modes() {
        let m = Matcher::new(MatchMode::StartsWith, vec![".1.3.6.1.4.1.9".into()]).unwrap();
        assert!(m.matches(".1.3.6.1.4.1.9.1.1208"));
        assert!(!m.matches(".1.3.6.1.4.1.1991.1"));
        let m = Matcher::new(MatchMode::Contains, vec!["IP-10".into(), "IP10".into()]).unwrap();
        assert!(m.matches("Ceragon IP10 G"));
        let m = Matcher::new(MatchMode::Regex, vec![r"^Linux \S+ 5\.".into()]).unwrap();
        assert!(m.matches("Linux lp01 5.15.0-91-generic"));
        assert!(Matcher::new(MatchMode::Regex, vec!["(".into()]).is_err());
    }

    #[test]
    fn bad_regex_and_empty_values_are_rejected() {
        let yaml: Yaml = serde_yaml::from_str(
            "type: http\npath: /\nmatch_mode: regex\nvalues: ['[']\n",
        )
        .unwrap();
        assert!(parse_condition(&yaml).is_err());
        let yaml: Yaml =
            serde_yaml::from_str("type: snmpget\noid: .1.3\nmatch_mode: equals\nvalues: []\n")
                .unwrap();
        assert!(parse_condition(&yaml).is_err());
    }
}
