//! Hand-written behaviour for classes whose devices need more than
//! recipes.
//!
//! Each bundle receives the composite communicator of its class's direct
//! parent and returns `NotImplemented` for everything it does not handle.

mod adva;
mod aruba;
mod aviat;
mod ceragon;
mod ekinops;
mod fortigate;
mod ios;
mod ironware;
mod junos;
mod linux;
mod powerone;
mod routeros;
mod timos;
mod vmware;

use std::sync::Arc;

use super::{Communicator, CompositeCommunicator};
use crate::codec::RawValue;
use crate::env::RequestEnv;
use crate::error::Result;
use crate::network::SnmpClient;
use crate::oid::Oid;

pub type Parent = Arc<CompositeCommunicator>;
pub type Constructor = fn(Parent) -> Box<dyn Communicator>;

static REGISTRY: &[(&str, Constructor)] = &[
    ("adva_fsp3kr7", adva::fsp3kr7),
    ("aruba", aruba::aruba),
    ("aviat", aviat::aviat),
    ("ceragon/ip10", ceragon::ip10),
    ("ceragon/ip20", ceragon::ip20),
    ("ekinops", ekinops::ekinops),
    ("fortigate", fortigate::fortigate),
    ("ios", ios::ios),
    ("ironware", ironware::ironware),
    ("junos", junos::junos),
    ("linux", linux::linux),
    ("linux/logpoint", linux::logpoint),
    ("powerone/acc", powerone::acc),
    ("powerone/pcc", powerone::pcc),
    ("routeros", routeros::routeros),
    ("timos", timos::timos),
    ("timos/sas", timos::sas),
    ("vmware_esxi", vmware::esxi),
];

pub fn lookup(class: &str) -> Option<Constructor> {
    REGISTRY
        .iter()
        .find(|(id, _)| *id == class)
        .map(|(_, constructor)| *constructor)
}

/// Classes with an override bundle.
pub fn classes() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(id, _)| *id)
}

async fn get(env: &RequestEnv, oid: &str) -> Result<RawValue> {
    let oid = Oid::parse(oid)?;
    let snmp = env.connection.snmp()?;
    Ok(RawValue::Snmp(env.run(snmp.get_one(&oid)).await?))
}

/// Successful values of the subtree below `base` as `(index, value)`, in
/// walk order. An absent subtree is empty.
async fn column(env: &RequestEnv, base: &str) -> Result<Vec<(String, RawValue)>> {
    column_on(env, env.connection.snmp()?, base).await
}

/// [`column`] through a specific client, such as a per-module sibling.
async fn column_on(
    env: &RequestEnv,
    snmp: &SnmpClient,
    base: &str,
) -> Result<Vec<(String, RawValue)>> {
    let base = Oid::parse(base)?;
    let rows = match env.run(snmp.walk(&base)).await {
        Ok(rows) => rows,
        Err(e) if crate::recipe::is_absent(&e) => Vec::new(),
        Err(e) => return Err(e),
    };
    Ok(rows
        .into_iter()
        .filter(|vb| vb.value.is_successful())
        .filter_map(|vb| {
            let suffix = vb.oid.strip_prefix(&base)?;
            let index = suffix
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(".");
            Some((index, RawValue::Snmp(vb.value)))
        })
        .collect())
}

/// [`column`] as a lookup table.
async fn column_map(
    env: &RequestEnv,
    base: &str,
) -> Result<std::collections::HashMap<String, RawValue>> {
    Ok(column(env, base).await?.into_iter().collect())
}

/// Tenths, hundredths and the like to a float.
fn scaled(value: &RawValue, divisor: f64) -> Option<f64> {
    value.as_float().ok().map(|v| v / divisor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_override_has_a_class_file() {
        let registry = crate::class::ClassRegistry::load(&crate::assets::EmbeddedAssets).unwrap();
        for class in classes() {
            let node = registry.get(class).unwrap();
            assert!(node.parent.is_some(), "{class}");
        }
        assert!(lookup("ceragon/ip10").is_some());
        assert!(lookup("ceragon").is_none());
    }
}
