//! In-memory client registry

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};

use contracts::{ClientAddress, ClientRecord, ClientRegistry, SyncResult};
use tracing::debug;

/// 进程内 registry，供 CLI 与测试使用
#[derive(Debug, Default)]
pub struct InMemoryClientRegistry {
    clients: RwLock<HashMap<ClientAddress, ClientRecord>>,
    leader_epoch_offset_ns: AtomicI64,
}

impl InMemoryClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clients(clients: impl IntoIterator<Item = ClientAddress>) -> Self {
        let registry = Self::new();
        for client in clients {
            registry.insert(client);
        }
        registry
    }

    /// 注册 client；已存在时保留原记录并返回 `false`
    pub fn insert(&self, client: ClientAddress) -> bool {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        if clients.contains_key(&client) {
            return false;
        }
        clients.insert(client, ClientRecord::new(client));
        true
    }

    pub fn remove(&self, client: &ClientAddress) -> Option<ClientRecord> {
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(client)
    }

    pub fn get(&self, client: &ClientAddress) -> Option<ClientRecord> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(client)
            .copied()
    }

    /// 按地址排序的全部记录
    pub fn snapshot(&self) -> Vec<ClientRecord> {
        let mut records: Vec<_> = self
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .copied()
            .collect();
        records.sort_by_key(|r| r.address);
        records
    }

    pub fn len(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_leader_epoch_offset_ns(&self, offset_ns: i64) {
        self.leader_epoch_offset_ns.store(offset_ns, Ordering::Relaxed);
    }
}

impl ClientRegistry for InMemoryClientRegistry {
    fn contains(&self, client: &ClientAddress) -> bool {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(client)
    }

    fn update_client_offset(&self, client: &ClientAddress, result: &SyncResult) {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        // removed while the sync was running
        let Some(record) = clients.get_mut(client) else {
            debug!(client = %client, "offset update for unknown client dropped");
            return;
        };
        record.last_offset_ns = result.offset_ns;
        record.last_accuracy_ns = result.sync_accuracy_ns;
        record.sync_count += 1;
    }

    fn leader_epoch_offset_ns(&self) -> i64 {
        self.leader_epoch_offset_ns.load(Ordering::Relaxed)
    }
}
