//! Content checksums used as section identity.

use sha2::{Digest, Sha256};

use super::model::Directives;

const FIELD_SEPARATOR: u8 = 0x1f;

/// Computes the identity checksum of a section's content.
///
/// The digest covers the type, the name (empty when absent) and the
/// canonical JSON form of the directives. Directives are a sorted map, so
/// the serialization does not depend on submission order.
pub fn compute_checksum(
    section_type: &str,
    section_name: Option<&str>,
    configuration: &Directives,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(section_type.as_bytes());
    hasher.update([FIELD_SEPARATOR]);
    hasher.update(section_name.unwrap_or("").as_bytes());
    hasher.update([FIELD_SEPARATOR]);
    // A BTreeMap of strings always serializes.
    let json = serde_json::to_string(configuration).unwrap_or_default();
    hasher.update(json.as_bytes());
    hex::encode(hasher.finalize())
}
