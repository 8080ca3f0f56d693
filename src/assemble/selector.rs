//! Active section selection and ordering.

use std::collections::HashMap;

use crate::error::ManagerError;
use crate::section::Section;

/// Weight given to section types outside the ordering table.
const UNRANKED_WEIGHT: u32 = u32::MAX;

/// Returns the position of a section type in the rendered file.
///
/// Named variants sort immediately after their unnamed counterpart.
pub fn type_weight(section_type: &str, named: bool) -> Option<u32> {
    let base = match section_type {
        "global" => return Some(1),
        "defaults" => 3,
        "frontend" => 5,
        "backend" => 7,
        "listen" => 9,
        _ => return None,
    };
    Some(if named { base + 1 } else { base })
}

/// Picks the most recent section of every `(type, name)` group and orders them.
///
/// Sections whose type has no weight are kept and placed last, ordered by type
/// and then name.
pub fn select_active(sections: Vec<Section>) -> Result<Vec<Section>, ManagerError> {
    if sections.is_empty() {
        return Err(ManagerError::not_found("no sections stored"));
    }

    let mut latest: HashMap<(String, Option<String>), Section> = HashMap::new();
    for section in sections {
        let key = (section.section_type.clone(), section.section_name.clone());
        match latest.get(&key) {
            Some(current) if !is_newer(&section, current) => {}
            _ => {
                latest.insert(key, section);
            }
        }
    }

    let mut selected: Vec<Section> = latest.into_values().collect();
    selected.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

    tracing::debug!(selected = selected.len(), "Selected active sections");
    Ok(selected)
}

/// Equal timestamps fall back to the checksum so selection is deterministic.
fn is_newer(candidate: &Section, current: &Section) -> bool {
    (candidate.effective_time(), &candidate.checksum) > (current.effective_time(), &current.checksum)
}

fn sort_key(section: &Section) -> (u32, &str, &str) {
    (
        type_weight(&section.section_type, section.is_named()).unwrap_or(UNRANKED_WEIGHT),
        section.section_type.as_str(),
        section.section_name.as_deref().unwrap_or(""),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::section::{Directives, SectionMeta};
    use chrono::{TimeZone, Utc};

    fn section(kind: &str, name: Option<&str>, checksum: &str, created: i64) -> Section {
        Section {
            checksum: checksum.to_string(),
            section_type: kind.to_string(),
            section_name: name.map(str::to_string),
            meta: SectionMeta::created(Utc.timestamp_opt(created, 0).unwrap()),
            configuration: Directives::new(),
        }
    }

    fn labels(sections: &[Section]) -> Vec<String> {
        sections
            .iter()
            .map(|s| match &s.section_name {
                Some(n) => format!("{}/{}", s.section_type, n),
                None => s.section_type.clone(),
            })
            .collect()
    }

    #[test]
    fn orders_by_type_weight() {
        let selected = select_active(vec![
            section("backend", Some("bak"), "4", 4),
            section("frontend", Some("nodes"), "3", 3),
            section("global", None, "1", 1),
            section("defaults", None, "2", 2),
        ])
        .unwrap();

        assert_eq!(
            labels(&selected),
            vec!["global", "defaults", "frontend/nodes", "backend/bak"]
        );
    }

    #[test]
    fn named_variant_follows_unnamed() {
        let selected = select_active(vec![
            section("frontend", Some("b"), "1", 1),
            section("defaults", Some("tcp"), "2", 1),
            section("listen", Some("stats"), "3", 1),
            section("defaults", None, "4", 1),
            section("frontend", Some("a"), "5", 1),
        ])
        .unwrap();

        assert_eq!(
            labels(&selected),
            vec!["defaults", "defaults/tcp", "frontend/a", "frontend/b", "listen/stats"]
        );
    }

    #[test]
    fn most_recent_record_wins() {
        let mut touched = section("backend", Some("bak"), "old", 1);
        touched.meta.modify_time = Some(Utc.timestamp_opt(100, 0).unwrap());

        let selected = select_active(vec![
            touched,
            section("backend", Some("bak"), "new", 50),
            section("backend", Some("bak"), "oldest", 0),
        ])
        .unwrap();

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].checksum, "old");
    }

    #[test]
    fn unranked_types_sort_last() {
        let selected = select_active(vec![
            section("userlist", Some("admins"), "1", 1),
            section("cache", Some("static"), "2", 1),
            section("listen", Some("stats"), "3", 1),
            section("global", None, "4", 1),
        ])
        .unwrap();

        assert_eq!(
            labels(&selected),
            vec!["global", "listen/stats", "cache/static", "userlist/admins"]
        );
    }

    #[test]
    fn empty_store_is_not_found() {
        assert_eq!(select_active(Vec::new()).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn selection_ignores_input_order() {
        let a = vec![
            section("backend", Some("x"), "a", 5),
            section("backend", Some("x"), "b", 5),
        ];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(select_active(a).unwrap(), select_active(b).unwrap());
    }
}
