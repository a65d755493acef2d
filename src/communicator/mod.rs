//! Capability surface of a device.
//!
//! A [`Communicator`] answers property queries for one device class. Every
//! method defaults to `NotImplemented`, which is how an override bundle
//! hands a capability back to the declarative layer.

mod composite;
mod declarative;
pub mod overrides;

pub use composite::CompositeCommunicator;
pub use declarative::DeclarativeCommunicator;

use futures::future::BoxFuture;

use crate::device::{
    Cpu, HardwareHealthComponent, HighAvailabilityComponent, IdentifyProperties, Interface,
    MemoryPool, SbcComponent, ServerComponent, SiemComponent, Storage, UpsComponent,
};
use crate::env::RequestEnv;
use crate::error::{Error, Result};
use crate::group::CompiledFilters;

macro_rules! not_implemented {
    ($what:literal) => {
        Box::pin(async { Err(Error::not_implemented($what)) })
    };
}

pub trait Communicator: Send + Sync {
    fn vendor<'a>(&'a self, _env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        not_implemented!("vendor")
    }

    fn model<'a>(&'a self, _env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        not_implemented!("model")
    }

    fn model_series<'a>(&'a self, _env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        not_implemented!("model_series")
    }

    fn serial_number<'a>(&'a self, _env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        not_implemented!("serial_number")
    }

    fn os_version<'a>(&'a self, _env: &'a RequestEnv) -> BoxFuture<'a, Result<String>> {
        not_implemented!("os_version")
    }

    /// Interface list. Implementations may ignore `filters`; the composite
    /// applies them again to whatever comes back.
    fn interfaces<'a>(
        &'a self,
        _env: &'a RequestEnv,
        _filters: &'a CompiledFilters,
    ) -> BoxFuture<'a, Result<Vec<Interface>>> {
        not_implemented!("interfaces")
    }

    fn count_interfaces<'a>(&'a self, _env: &'a RequestEnv) -> BoxFuture<'a, Result<u64>> {
        not_implemented!("count_interfaces")
    }

    fn cpu_load<'a>(&'a self, _env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<Cpu>>> {
        not_implemented!("cpu_load")
    }

    fn memory_usage<'a>(&'a self, _env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<MemoryPool>>> {
        not_implemented!("memory_usage")
    }

    fn ups<'a>(&'a self, _env: &'a RequestEnv) -> BoxFuture<'a, Result<UpsComponent>> {
        not_implemented!("ups")
    }

    fn disk<'a>(&'a self, _env: &'a RequestEnv) -> BoxFuture<'a, Result<Vec<Storage>>> {
        not_implemented!("disk")
    }

    fn server<'a>(&'a self, _env: &'a RequestEnv) -> BoxFuture<'a, Result<ServerComponent>> {
        not_implemented!("server")
    }

    fn sbc<'a>(&'a self, _env: &'a RequestEnv) -> BoxFuture<'a, Result<SbcComponent>> {
        not_implemented!("sbc")
    }

    fn hardware_health<'a>(
        &'a self,
        _env: &'a RequestEnv,
    ) -> BoxFuture<'a, Result<HardwareHealthComponent>> {
        not_implemented!("hardware_health")
    }

    fn high_availability<'a>(
        &'a self,
        _env: &'a RequestEnv,
    ) -> BoxFuture<'a, Result<HighAvailabilityComponent>> {
        not_implemented!("high_availability")
    }

    fn siem<'a>(&'a self, _env: &'a RequestEnv) -> BoxFuture<'a, Result<SiemComponent>> {
        not_implemented!("siem")
    }
}

/// Collect the identity fields; a field the device cannot answer is left
/// empty.
pub async fn read_identity(
    comm: &dyn Communicator,
    env: &RequestEnv,
) -> Result<IdentifyProperties> {
    let (vendor, model, model_series, serial_number, os_version) = futures::join!(
        comm.vendor(env),
        comm.model(env),
        comm.model_series(env),
        comm.serial_number(env),
        comm.os_version(env),
    );
    Ok(IdentifyProperties {
        vendor: optional(vendor)?,
        model: optional(model)?,
        model_series: optional(model_series)?,
        serial_number: optional(serial_number)?,
        os_version: optional(os_version)?,
    })
}

/// `Ok(None)` for "no value here", errors otherwise.
pub(crate) fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e)
            if crate::recipe::is_absent(&e)
                || e.kind() == crate::error::ErrorKind::ComponentNotFound =>
        {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
