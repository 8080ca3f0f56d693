//! Persistence of section records.

pub mod codec;
pub mod memory;
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::model::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use crate::section::{MetadataPatch, Section};

pub use codec::{Base64JsonCodec, FieldCodec, JsonCodec};
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Durable section records keyed by checksum.
///
/// `create` is the uniqueness gate: a checksum that already exists is a
/// `Conflict`, detected at write time.
#[async_trait]
pub trait SectionStore: Send + Sync {
    /// Persists a new record.
    async fn create(&self, section: Section) -> Result<Section, StoreError>;

    /// Fetches one record.
    async fn get(&self, checksum: &str) -> Result<Section, StoreError>;

    /// Returns every stored record, oldest first.
    async fn list(&self) -> Result<Vec<Section>, StoreError>;

    /// Merges `patch` into a record's metadata and stamps its modification time.
    async fn update(&self, checksum: &str, patch: MetadataPatch) -> Result<Section, StoreError>;

    /// Removes a record.
    async fn delete(&self, checksum: &str) -> Result<(), StoreError>;
}

/// Opens the store selected in configuration.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn SectionStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory section store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis => {
            let store = RedisStore::connect(
                &config.redis.url(),
                &config.redis.key_prefix,
                codec::codec_for(config.codec),
            )
            .await?;
            tracing::info!(host = %config.redis.host, port = config.redis.port, "Connected to Redis section store");
            Ok(Arc::new(store))
        }
    }
}

/// Orders records oldest first, ties broken by checksum.
pub(crate) fn sort_by_age(sections: &mut [Section]) {
    sections.sort_by(|a, b| {
        (a.created_at(), &a.checksum).cmp(&(b.created_at(), &b.checksum))
    });
}
