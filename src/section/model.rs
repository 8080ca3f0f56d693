//! Section record definitions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Section types accepted by HAProxy.
pub const KNOWN_SECTION_TYPES: &[&str] = &[
    "global",
    "defaults",
    "frontend",
    "backend",
    "listen",
    "userlist",
    "peers",
    "resolvers",
    "mailers",
    "program",
    "cache",
    "http-errors",
    "ring",
];

/// Directive name to directive value. A `None` value renders blank.
pub type Directives = BTreeMap<String, Option<String>>;

/// A stored configuration fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Content checksum, the record key.
    pub checksum: String,

    /// Section type (`global`, `backend`, ...).
    #[serde(rename = "section")]
    pub section_type: String,

    /// Section name, present for named sections.
    pub section_name: Option<String>,

    /// Record metadata.
    pub meta: SectionMeta,

    /// Directives of this section.
    pub configuration: Directives,
}

impl Section {
    /// Returns the time this record was persisted.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.meta.create_time
    }

    /// Returns the time used to pick the active record of a `(type, name)` group.
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.meta.modify_time.unwrap_or(self.meta.create_time)
    }

    /// Returns true if this section carries a non-empty name.
    pub fn is_named(&self) -> bool {
        self.section_name.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// Applies a metadata patch and stamps the modification time.
    pub fn touch(&mut self, patch: MetadataPatch, now: DateTime<Utc>) {
        self.meta.extra.extend(patch.extra);
        self.meta.modify_time = Some(now);
    }
}

/// Free-form record metadata with well-known timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMeta {
    /// When the record was persisted.
    pub create_time: DateTime<Utc>,

    /// When the record was last touched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify_time: Option<DateTime<Utc>>,

    /// Caller-supplied keys.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SectionMeta {
    /// Creates metadata for a record persisted at `now`.
    pub fn created(now: DateTime<Utc>) -> Self {
        Self {
            create_time: now,
            modify_time: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Keys merged into a section's metadata on touch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataPatch {
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MetadataPatch {
    /// Builds a patch, dropping the reserved timestamp keys.
    pub fn new(mut extra: serde_json::Map<String, serde_json::Value>) -> Self {
        extra.remove("createTime");
        extra.remove("modifyTime");
        Self { extra }
    }
}

/// Finds the known section type closest to `input`.
pub fn suggest_section_type(input: &str) -> &'static str {
    KNOWN_SECTION_TYPES
        .iter()
        .min_by_key(|t| strsim::levenshtein(input, t))
        .copied()
        .unwrap_or("global")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn section_at(create: i64, modify: Option<i64>) -> Section {
        Section {
            checksum: "abc".to_string(),
            section_type: "backend".to_string(),
            section_name: Some("bak".to_string()),
            meta: SectionMeta {
                create_time: Utc.timestamp_opt(create, 0).unwrap(),
                modify_time: modify.map(|m| Utc.timestamp_opt(m, 0).unwrap()),
                extra: serde_json::Map::new(),
            },
            configuration: Directives::new(),
        }
    }

    #[test]
    fn effective_time_prefers_modify_time() {
        assert_eq!(section_at(10, None).effective_time().timestamp(), 10);
        assert_eq!(section_at(10, Some(50)).effective_time().timestamp(), 50);
    }

    #[test]
    fn touch_merges_patch_and_stamps_time() {
        let mut section = section_at(10, None);
        let mut extra = serde_json::Map::new();
        extra.insert("owner".to_string(), serde_json::json!("ops"));
        extra.insert("createTime".to_string(), serde_json::json!("bogus"));

        section.touch(MetadataPatch::new(extra), Utc.timestamp_opt(99, 0).unwrap());

        assert_eq!(section.meta.modify_time.unwrap().timestamp(), 99);
        assert_eq!(section.meta.create_time.timestamp(), 10);
        assert_eq!(section.meta.extra.get("owner"), Some(&serde_json::json!("ops")));
        assert!(!section.meta.extra.contains_key("createTime"));
    }

    #[test]
    fn meta_serializes_camel_case() {
        let section = section_at(0, Some(1));
        let value = serde_json::to_value(&section).unwrap();
        assert!(value["meta"]["createTime"].is_string());
        assert!(value["meta"]["modifyTime"].is_string());
        assert_eq!(value["section"], "backend");
    }

    #[test]
    fn suggests_closest_type() {
        assert_eq!(suggest_section_type("backnd"), "backend");
        assert_eq!(suggest_section_type("frontned"), "frontend");
    }
}
