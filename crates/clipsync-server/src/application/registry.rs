//! Connection registry: the authoritative set of connected devices.
//!
//! # Lock discipline (for beginners)
//!
//! The registry is a `HashMap` of device entries behind a
//! `tokio::sync::RwLock`:
//!
//! - [`Registry::snapshot`] takes the **read** lock, clones the entries and
//!   releases the lock before returning.  Many snapshots can run at once.
//! - [`Registry::admit`] and [`Registry::remove`] take the **write** lock, so a
//!   snapshot taken after an admit/remove returned always sees it.
//!
//! A device can be admitted *pending*: it is registered (its id is taken and
//! `remove` finds it) but [`Registry::snapshot`] and
//! [`Registry::device_infos`] leave it out until [`Registry::mark_ready`].
//! The hub uses this so a new device receives its welcome frames before any
//! relayed traffic.
//!
//! Nothing ever writes to a socket while holding either lock.  In particular
//! `remove` takes the entry out under the write lock and closes its link only
//! after the lock is released.  Because `HashMap::remove` hands the entry to
//! exactly one caller, two failure paths racing to remove the same device
//! close its link exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;

use clipsync_core::{DeviceId, DeviceInfo};

use crate::application::link::DeviceLink;

/// One connected device.
///
/// Cloning is cheap: the link is shared behind an `Arc`.
#[derive(Clone)]
pub struct Device {
    /// Hub-assigned id.
    pub id: DeviceId,
    /// Display label supplied by the device (untrusted).
    pub hostname: String,
    /// Write side of the device's connection.
    pub link: Arc<dyn DeviceLink>,
}

impl Device {
    pub fn new(id: DeviceId, hostname: impl Into<String>, link: Arc<dyn DeviceLink>) -> Self {
        Self {
            id,
            hostname: hostname.into(),
            link,
        }
    }

    /// The public part of this device, as sent in `device_list`.
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            id: self.id.clone(),
            hostname: self.hostname.clone(),
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("hostname", &self.hostname)
            .finish_non_exhaustive()
    }
}

struct Entry {
    device: Device,
    ready: bool,
}

/// In-memory registry of connected devices.
#[derive(Default)]
pub struct Registry {
    devices: RwLock<HashMap<DeviceId, Entry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a device.  Returns `false` (and leaves the registry unchanged) if
    /// the id is already taken.
    pub async fn admit(&self, device: Device) -> bool {
        self.insert(device, true).await
    }

    /// Adds a device that stays out of snapshots until [`Registry::mark_ready`].
    /// Returns `false` if the id is already taken.
    pub async fn admit_pending(&self, device: Device) -> bool {
        self.insert(device, false).await
    }

    /// Makes a pending device visible to snapshots.  Returns `false` if the
    /// device is no longer registered.
    pub async fn mark_ready(&self, id: &DeviceId) -> bool {
        match self.devices.write().await.get_mut(id) {
            Some(entry) => {
                entry.ready = true;
                true
            }
            None => false,
        }
    }

    async fn insert(&self, device: Device, ready: bool) -> bool {
        let mut devices = self.devices.write().await;
        if devices.contains_key(&device.id) {
            return false;
        }
        devices.insert(device.id.clone(), Entry { device, ready });
        true
    }

    /// Removes a device and closes its link.
    ///
    /// Idempotent: returns `true` only for the call that actually removed the
    /// entry; every other call is a no-op returning `false`.
    pub async fn remove(&self, id: &DeviceId) -> bool {
        // The write guard is dropped at the end of this statement.
        let removed = self.devices.write().await.remove(id);
        match removed {
            Some(entry) => {
                entry.device.link.close().await;
                true
            }
            None => false,
        }
    }

    /// A point-in-time copy of all ready devices.
    pub async fn snapshot(&self) -> Vec<Device> {
        self.devices
            .read()
            .await
            .values()
            .filter(|entry| entry.ready)
            .map(|entry| entry.device.clone())
            .collect()
    }

    /// Looks up a single device, pending or ready.
    pub async fn get(&self, id: &DeviceId) -> Option<Device> {
        self.devices
            .read()
            .await
            .get(id)
            .map(|entry| entry.device.clone())
    }

    /// Public descriptions of all ready devices.
    pub async fn device_infos(&self) -> Vec<DeviceInfo> {
        self.devices
            .read()
            .await
            .values()
            .filter(|entry| entry.ready)
            .map(|entry| entry.device.info())
            .collect()
    }

    /// Number of registered devices, pending ones included.
    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::link::mock::MockLink;

    fn make_device(id: &str) -> (Device, Arc<MockLink>) {
        let link = Arc::new(MockLink::new());
        let device = Device::new(DeviceId::from(id), format!("host-{id}"), link.clone());
        (device, link)
    }

    #[tokio::test]
    async fn test_admit_then_snapshot_contains_device() {
        // Arrange
        let registry = Registry::new();
        let (device, _) = make_device("a");

        // Act
        assert!(registry.admit(device).await);

        // Assert
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, DeviceId::from("a"));
    }

    #[tokio::test]
    async fn test_admit_duplicate_id_is_rejected() {
        let registry = Registry::new();
        let (first, _) = make_device("a");
        let (second, _) = make_device("a");
        assert!(registry.admit(first).await);
        assert!(!registry.admit(second).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_closes_link() {
        let registry = Registry::new();
        let (device, link) = make_device("a");
        registry.admit(device).await;

        assert!(registry.remove(&DeviceId::from("a")).await);

        assert_eq!(link.close_count(), 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_twice_closes_exactly_once() {
        // Arrange
        let registry = Registry::new();
        let (device, link) = make_device("a");
        registry.admit(device).await;
        let id = DeviceId::from("a");

        // Act
        let first = registry.remove(&id).await;
        let second = registry.remove(&id).await;

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(link.close_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_remove_closes_exactly_once() {
        // Arrange: two failure paths (read loop and router) race on one id
        let registry = Arc::new(Registry::new());
        let (device, link) = make_device("a");
        registry.admit(device).await;

        // Act
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.remove(&DeviceId::from("a")).await })
            })
            .collect();
        let mut removed = 0;
        for h in handles {
            if h.await.unwrap() {
                removed += 1;
            }
        }

        // Assert
        assert_eq!(removed, 1);
        assert_eq!(link.close_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_id_is_noop() {
        let registry = Registry::new();
        assert!(!registry.remove(&DeviceId::from("ghost")).await);
    }

    #[tokio::test]
    async fn test_snapshot_is_independent_of_later_removal() {
        let registry = Registry::new();
        let (a, _) = make_device("a");
        let (b, _) = make_device("b");
        registry.admit(a).await;
        registry.admit(b).await;

        let snapshot = registry.snapshot().await;
        registry.remove(&DeviceId::from("a")).await;

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_pending_device_is_hidden_until_ready() {
        // Arrange
        let registry = Registry::new();
        let (a, _) = make_device("a");
        let id = DeviceId::from("a");

        // Act
        assert!(registry.admit_pending(a).await);

        // Assert: registered but not yet visible
        assert!(registry.get(&id).await.is_some());
        assert_eq!(registry.len().await, 1);
        assert!(registry.snapshot().await.is_empty());
        assert!(registry.device_infos().await.is_empty());

        assert!(registry.mark_ready(&id).await);
        assert_eq!(registry.snapshot().await.len(), 1);
        assert_eq!(registry.device_infos().await.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_device_can_be_removed() {
        let registry = Registry::new();
        let (a, link) = make_device("a");
        let id = DeviceId::from("a");
        registry.admit_pending(a).await;

        assert!(registry.remove(&id).await);

        assert_eq!(link.close_count(), 1);
        assert!(!registry.mark_ready(&id).await);
    }

    #[tokio::test]
    async fn test_device_infos_carry_hostnames() {
        let registry = Registry::new();
        let (a, _) = make_device("a");
        registry.admit(a).await;

        let infos = registry.device_infos().await;

        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].hostname, "host-a");
    }
}
