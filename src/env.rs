//! Request-scoped environment handed to communicators and recipes.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::mapping::MappingRegistry;
use crate::network::Connection;

#[derive(Debug, Clone)]
pub struct RequestEnv {
    pub connection: Connection,
    pub mappings: Arc<MappingRegistry>,
    pub cancel: CancellationToken,
    /// GET column values per index instead of walking each column.
    pub snmp_gets_instead_of_walk: bool,
}

impl RequestEnv {
    pub fn new(
        connection: Connection,
        mappings: Arc<MappingRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connection,
            mappings,
            cancel,
            snmp_gets_instead_of_walk: false,
        }
    }

    /// Run `fut` unless the request is cancelled first.
    pub async fn run<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled.boxed()),
            out = fut => out,
        }
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled.boxed());
        }
        Ok(())
    }
}
