//! Net-SNMP Linux hosts and the LogPoint SIEM appliance built on them.

use futures::future::BoxFuture;

use super::{Parent, column, get};
use crate::communicator::{Communicator, optional};
use crate::device::{MemoryPool, SiemComponent, Storage, ZfsPool};
use crate::env::RequestEnv;
use crate::error::{Error, Result};

/// UCD-SNMP-MIB memory scalars, kilobytes.
const MEM_TOTAL_REAL: &str = ".1.3.6.1.4.1.2021.4.5.0";
const MEM_AVAIL_REAL: &str = ".1.3.6.1.4.1.2021.4.6.0";
const MEM_BUFFER: &str = ".1.3.6.1.4.1.2021.4.14.0";
const MEM_CACHED: &str = ".1.3.6.1.4.1.2021.4.15.0";

/// NET-SNMP-EXTEND-MIB nsExtendOutLine.
const EXTEND_OUT_LINE: &str = ".1.3.6.1.4.1.8072.1.3.4.1.2";
const STATS_EXTEND: &str = "lp_stats";
const ZPOOL_EXTEND: &str = "lp_zpool";

/// Mount points that never hold user data.
const PSEUDO_MOUNTS: [&str; 5] = ["/run", "/dev", "/sys", "/proc", "/snap"];

pub(super) fn linux(parent: Parent) -> Box<dyn Communicator> {
    Box::new(Linux { parent })
}

pub(super) fn logpoint(parent: Parent) -> Box<dyn Communicator> {
    Box::new(LogPoint { parent })
}

struct Linux {
    parent: Parent,
}

impl Communicator for Linux {
    /// Used memory excludes buffers and page cache.
    fn memory_usage<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<MemoryPool>>> {
        Box::pin(async move {
            let Some(total) = optional(get(env, MEM_TOTAL_REAL).await)? else {
                return self.parent.memory_usage(env).await;
            };
            let mut kb = [0.0; 3];
            for (slot, oid) in kb.iter_mut().zip([MEM_AVAIL_REAL, MEM_BUFFER, MEM_CACHED]) {
                if let Some(v) = optional(get(env, oid).await)? {
                    *slot = v.as_float()?;
                }
            }
            let [avail, buffer, cached] = kb;
            Ok(vec![MemoryPool {
                label: Some("Physical memory".into()),
                usage: memory_percent(total.as_float()?, avail, buffer, cached),
            }])
        })
    }

    fn disk<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<Storage>>> {
        Box::pin(async move {
            let mut disks = self.parent.disk(env).await?;
            disks.retain(is_real_filesystem);
            Ok(disks)
        })
    }
}

fn memory_percent(total: f64, avail: f64, buffer: f64, cached: f64) -> Option<f64> {
    if total <= 0.0 {
        return None;
    }
    let used = (total - avail - buffer - cached).max(0.0);
    Some(used / total * 100.0)
}

fn is_real_filesystem(storage: &Storage) -> bool {
    let Some(descr) = storage.description.as_deref() else {
        return true;
    };
    if storage.available == Some(0) {
        return false;
    }
    !PSEUDO_MOUNTS
        .iter()
        .any(|m| descr == *m || descr.strip_prefix(m).is_some_and(|r| r.starts_with('/')))
}

struct LogPoint {
    parent: Parent,
}

impl LogPoint {
    async fn extend_lines(&self, env: &RequestEnv, name: &str) -> Result<Vec<String>> {
        let base = format!("{EXTEND_OUT_LINE}.{}", extend_index(name));
        Ok(column(env, &base)
            .await?
            .into_iter()
            .map(|(_, line)| line.as_string())
            .collect())
    }
}

impl Communicator for LogPoint {
    fn siem<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<SiemComponent>> {
        Box::pin(async move {
            let stats = self.extend_lines(env, STATS_EXTEND).await?;
            if stats.is_empty() {
                return Err(Error::not_implemented("lp_stats extend"));
            }
            let mut siem = parse_stats(&stats);
            siem.zfs_pools = parse_zpools(&self.extend_lines(env, ZPOOL_EXTEND).await?);
            if siem.system_version.is_none() {
                siem.system_version = optional(self.parent.os_version(env).await)?;
            }
            Ok(siem)
        })
    }
}

/// String index of an extend entry: length, then one arc per byte.
fn extend_index(name: &str) -> String {
    std::iter::once(name.len().to_string())
        .chain(name.bytes().map(|b| b.to_string()))
        .collect::<Vec<_>>()
        .join(".")
}

/// `key=value` lines.
fn parse_stats(lines: &[String]) -> SiemComponent {
    let mut siem = SiemComponent::default();
    for line in lines {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let number = || value.parse::<f64>().ok().map(|v| v.round() as i64);
        match key.trim() {
            "recorded_mps_last" => siem.last_recorded_messages_per_second = number(),
            "recorded_mps_avg" => siem.average_recorded_messages_per_second = number(),
            "processed_mps_last" => siem.last_processed_messages_per_second = number(),
            "processed_mps_avg" => siem.average_processed_messages_per_second = number(),
            "version" => siem.system_version = Some(value.to_owned()),
            _ => {}
        }
    }
    siem
}

/// `name state health` lines.
fn parse_zpools(lines: &[String]) -> Vec<ZfsPool> {
    lines
        .iter()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            Some(ZfsPool {
                name: Some(name.to_owned()),
                state: parts.next().map(str::to_owned),
                health: parts.next().map(str::to_owned),
            })
        })
        .collect()
}
