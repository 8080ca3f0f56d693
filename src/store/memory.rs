//! Process-local section store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{sort_by_age, SectionStore};
use crate::error::StoreError;
use crate::section::{MetadataPatch, Section};

/// Keeps records in memory. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sections: RwLock<HashMap<String, Section>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SectionStore for MemoryStore {
    async fn create(&self, section: Section) -> Result<Section, StoreError> {
        let mut sections = self.sections.write().await;
        if sections.contains_key(&section.checksum) {
            return Err(StoreError::Conflict {
                checksum: section.checksum,
            });
        }
        sections.insert(section.checksum.clone(), section.clone());
        Ok(section)
    }

    async fn get(&self, checksum: &str) -> Result<Section, StoreError> {
        self.sections
            .read()
            .await
            .get(checksum)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                checksum: checksum.to_string(),
            })
    }

    async fn list(&self) -> Result<Vec<Section>, StoreError> {
        let mut sections: Vec<Section> = self.sections.read().await.values().cloned().collect();
        sort_by_age(&mut sections);
        Ok(sections)
    }

    async fn update(&self, checksum: &str, patch: MetadataPatch) -> Result<Section, StoreError> {
        let mut sections = self.sections.write().await;
        let section = sections.get_mut(checksum).ok_or_else(|| StoreError::NotFound {
            checksum: checksum.to_string(),
        })?;
        section.touch(patch, Utc::now());
        Ok(section.clone())
    }

    async fn delete(&self, checksum: &str) -> Result<(), StoreError> {
        self.sections
            .write()
            .await
            .remove(checksum)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                checksum: checksum.to_string(),
            })
    }
}
