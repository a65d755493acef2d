//! One in-flight request per target IP.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily allocated per-IP mutexes.
#[derive(Debug, Default)]
pub struct IpLocks {
    locks: RwLock<HashMap<IpAddr, Arc<Mutex<()>>>>,
}

impl IpLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex(&self, ip: IpAddr) -> Arc<Mutex<()>> {
        if let Some(m) = self.locks.read().get(&ip) {
            return Arc::clone(m);
        }
        let mut locks = self.locks.write();
        // Another request may have inserted between the two locks.
        Arc::clone(locks.entry(ip).or_default())
    }

    /// Wait for exclusive use of `ip`. Released when the guard drops.
    pub async fn lock(&self, ip: IpAddr) -> OwnedMutexGuard<()> {
        self.mutex(ip).lock_owned().await
    }

    /// Whether a request currently holds `ip`.
    pub fn is_locked(&self, ip: IpAddr) -> bool {
        self.locks
            .read()
            .get(&ip)
            .is_some_and(|m| m.try_lock().is_err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_ip_serialises() {
        let locks = Arc::new(IpLocks::new());
        let ip: IpAddr = "192.0.2.1".parse().unwrap();
        let guard = locks.lock(ip).await;
        assert!(locks.is_locked(ip));

        let other = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            let _g = other.lock(ip).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
        assert!(!locks.is_locked(ip));
    }

    #[tokio::test]
    async fn different_ips_do_not_block() {
        let locks = IpLocks::new();
        let _a = locks.lock("192.0.2.1".parse().unwrap()).await;
        let b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.lock("192.0.2.2".parse().unwrap()),
        )
        .await;
        assert!(b.is_ok());
    }
}
