//! Redis-backed section store.

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use super::codec::FieldCodec;
use super::{sort_by_age, SectionStore};
use crate::error::{CodecError, StoreError};
use crate::section::{MetadataPatch, Section};

const RECORD_PREFIX: &str = "section:";
const INDEX_KEY: &str = "sections";

/// Record layout in Redis. Metadata and directives go through the field codec.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSection {
    checksum: String,
    section: String,
    section_name: Option<String>,
    meta: String,
    configuration: String,
}

/// Stores each record under `<prefix>section:<checksum>` and indexes the
/// checksums in the `<prefix>sections` set.
pub struct RedisStore {
    connection: redis::aio::ConnectionManager,
    key_prefix: String,
    codec: Box<dyn FieldCodec>,
}

impl RedisStore {
    /// Connects to the Redis server at `redis_url`.
    pub async fn connect(
        redis_url: &str,
        key_prefix: &str,
        codec: Box<dyn FieldCodec>,
    ) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            StoreError::Backend(format!("failed to open client for '{}': {}", redis_url, e))
        })?;

        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Backend(format!("failed to connect to '{}': {}", redis_url, e)))?;

        Ok(Self {
            connection,
            key_prefix: key_prefix.to_string(),
            codec,
        })
    }

    fn record_key(&self, checksum: &str) -> String {
        format!("{}{}{}", self.key_prefix, RECORD_PREFIX, checksum)
    }

    fn index_key(&self) -> String {
        format!("{}{}", self.key_prefix, INDEX_KEY)
    }

    async fn fetch(
        &self,
        connection: &mut redis::aio::ConnectionManager,
        checksum: &str,
    ) -> Result<Option<Section>, StoreError> {
        let raw: Option<String> = connection
            .get(self.record_key(checksum))
            .await
            .map_err(backend)?;

        raw.map(|r| decode_record(self.codec.as_ref(), &r)).transpose()
    }
}

#[async_trait]
impl SectionStore for RedisStore {
    async fn create(&self, section: Section) -> Result<Section, StoreError> {
        let mut connection = self.connection.clone();
        let payload = encode_record(self.codec.as_ref(), &section)?;

        // SET NX makes the uniqueness check and the write a single step.
        let written: Option<String> = redis::cmd("SET")
            .arg(self.record_key(&section.checksum))
            .arg(&payload)
            .arg("NX")
            .query_async(&mut connection)
            .await
            .map_err(backend)?;

        if written.is_none() {
            return Err(StoreError::Conflict {
                checksum: section.checksum,
            });
        }

        // An unindexed record would be invisible to `list` yet still conflict.
        if let Err(e) = connection
            .sadd::<_, _, ()>(self.index_key(), &section.checksum)
            .await
        {
            let record_key = self.record_key(&section.checksum);
            if let Err(cleanup) = connection.del::<_, ()>(&record_key).await {
                tracing::error!(key = %record_key, error = %cleanup, "Failed to remove unindexed record");
            }
            return Err(backend(e));
        }

        Ok(section)
    }

    async fn get(&self, checksum: &str) -> Result<Section, StoreError> {
        let mut connection = self.connection.clone();
        self.fetch(&mut connection, checksum)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                checksum: checksum.to_string(),
            })
    }

    async fn list(&self) -> Result<Vec<Section>, StoreError> {
        let mut connection = self.connection.clone();
        let checksums: Vec<String> = connection
            .smembers(self.index_key())
            .await
            .map_err(backend)?;

        let mut sections = Vec::with_capacity(checksums.len());
        for checksum in checksums {
            match self.fetch(&mut connection, &checksum).await? {
                Some(section) => sections.push(section),
                None => tracing::warn!(checksum = %checksum, "Indexed section has no record"),
            }
        }

        sort_by_age(&mut sections);
        Ok(sections)
    }

    async fn update(&self, checksum: &str, patch: MetadataPatch) -> Result<Section, StoreError> {
        let mut connection = self.connection.clone();
        let mut section = self
            .fetch(&mut connection, checksum)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                checksum: checksum.to_string(),
            })?;

        section.touch(patch, Utc::now());
        let payload = encode_record(self.codec.as_ref(), &section)?;

        // XX: a concurrent delete wins over the touch.
        let written: Option<String> = redis::cmd("SET")
            .arg(self.record_key(checksum))
            .arg(&payload)
            .arg("XX")
            .query_async(&mut connection)
            .await
            .map_err(backend)?;

        if written.is_none() {
            return Err(StoreError::NotFound {
                checksum: checksum.to_string(),
            });
        }

        Ok(section)
    }

    async fn delete(&self, checksum: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let removed: usize = connection
            .del(self.record_key(checksum))
            .await
            .map_err(backend)?;

        connection
            .srem::<_, _, ()>(self.index_key(), checksum)
            .await
            .map_err(backend)?;

        if removed == 0 {
            return Err(StoreError::NotFound {
                checksum: checksum.to_string(),
            });
        }
        Ok(())
    }
}

fn backend(e: redis::RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn encode_record(codec: &dyn FieldCodec, section: &Section) -> Result<String, StoreError> {
    let meta = serde_json::to_value(&section.meta).map_err(|e| CodecError::Json(e.to_string()))?;
    let configuration =
        serde_json::to_value(&section.configuration).map_err(|e| CodecError::Json(e.to_string()))?;

    let record = StoredSection {
        checksum: section.checksum.clone(),
        section: section.section_type.clone(),
        section_name: section.section_name.clone(),
        meta: codec.encode(&meta)?,
        configuration: codec.encode(&configuration)?,
    };
    Ok(serde_json::to_string(&record).map_err(|e| CodecError::Json(e.to_string()))?)
}

fn decode_record(codec: &dyn FieldCodec, raw: &str) -> Result<Section, StoreError> {
    let record: StoredSection =
        serde_json::from_str(raw).map_err(|e| CodecError::Json(e.to_string()))?;

    let meta = serde_json::from_value(codec.decode(&record.meta)?)
        .map_err(|e| CodecError::Json(e.to_string()))?;
    let configuration = serde_json::from_value(codec.decode(&record.configuration)?)
        .map_err(|e| CodecError::Json(e.to_string()))?;

    Ok(Section {
        checksum: record.checksum,
        section_type: record.section,
        section_name: record.section_name,
        meta,
        configuration,
    })
}
