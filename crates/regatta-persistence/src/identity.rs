// Durable storage of the node's Raft replica id
// The id is generated once on first boot and never changes afterwards

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{DB, Options};
use tracing::info;

use regatta_common::ReplicaId;

const RAFT_SERVER_ID_KEY: &[u8] = b"raft_server_id";

/// Get/set of the durable self identifier
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Returns the nil id when nothing has been stored yet
    async fn get_raft_server_id(&self) -> anyhow::Result<ReplicaId>;

    async fn set_raft_server_id(&self, id: ReplicaId) -> anyhow::Result<()>;
}

/// Identity store backed by a local RocksDB instance
pub struct RocksIdentityStore {
    db: Arc<DB>,
}

impl RocksIdentityStore {
    /// Open (or create) the store under `path`
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path.as_ref())
            .map_err(|e| anyhow::anyhow!("RocksDB open error: {}", e))?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn new(db: Arc<DB>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityStore for RocksIdentityStore {
    async fn get_raft_server_id(&self) -> anyhow::Result<ReplicaId> {
        let db = self.db.clone();
        let raw = tokio::task::spawn_blocking(move || db.get(RAFT_SERVER_ID_KEY))
            .await?
            .map_err(|e| anyhow::anyhow!("RocksDB get error: {}", e))?;

        match raw {
            None => Ok(ReplicaId::default()),
            Some(bytes) => {
                let uuid = uuid::Uuid::from_slice(&bytes)
                    .map_err(|e| anyhow::anyhow!("Corrupt raft server id: {}", e))?;
                Ok(ReplicaId::from(uuid))
            }
        }
    }

    async fn set_raft_server_id(&self, id: ReplicaId) -> anyhow::Result<()> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            db.put(RAFT_SERVER_ID_KEY, id.as_uuid().as_bytes())?;
            db.flush()
        })
        .await?
        .map_err(|e| anyhow::anyhow!("RocksDB put error: {}", e))
    }
}

/// Volatile identity store, mainly for tests and single-process setups
#[derive(Default)]
pub struct MemoryIdentityStore {
    id: Mutex<ReplicaId>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_raft_server_id(&self) -> anyhow::Result<ReplicaId> {
        Ok(*self.id.lock())
    }

    async fn set_raft_server_id(&self, id: ReplicaId) -> anyhow::Result<()> {
        *self.id.lock() = id;
        Ok(())
    }
}

/// Read the persisted replica id, creating and persisting a random one on first boot
pub async fn load_or_create_replica_id(store: &dyn IdentityStore) -> anyhow::Result<ReplicaId> {
    let id = store.get_raft_server_id().await?;
    if !id.is_nil() {
        return Ok(id);
    }

    let id = ReplicaId::create_random_id();
    info!(replica_id = %id, "Setting new raft server id");
    store.set_raft_server_id(id).await?;
    Ok(id)
}
