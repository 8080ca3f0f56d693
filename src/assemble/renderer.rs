//! Serialization of ordered sections into HAProxy configuration text.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use crate::error::ManagerError;
use crate::section::Section;

const DIRECTIVE_INDENT: &str = "    ";

/// Renders sections in the given order.
///
/// Directives are emitted in lexical key order, so the same input always
/// produces byte-identical text.
pub fn render(sections: &[Section]) -> String {
    let mut text = String::new();

    for section in sections {
        let _ = writeln!(
            text,
            "{} {}",
            section.section_type,
            section.section_name.as_deref().unwrap_or("")
        );
        for (key, value) in &section.configuration {
            let _ = writeln!(
                text,
                "{}{} {}",
                DIRECTIVE_INDENT,
                key,
                value.as_deref().unwrap_or("")
            );
        }
        text.push('\n');
    }

    text
}

/// Writes rendered configuration to `path`, truncating any previous content.
pub fn write_config(path: &Path, text: &str) -> Result<(), ManagerError> {
    let mut file = std::fs::File::create(path).map_err(|e| ManagerError::storage(path, &e))?;

    file.write_all(text.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| ManagerError::storage(path, &e))?;

    tracing::info!(path = %path.display(), bytes = text.len(), "Configuration written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::section::{Directives, SectionMeta};
    use chrono::Utc;

    fn section(kind: &str, name: Option<&str>, pairs: &[(&str, Option<&str>)]) -> Section {
        Section {
            checksum: String::new(),
            section_type: kind.to_string(),
            section_name: name.map(str::to_string),
            meta: SectionMeta::created(Utc::now()),
            configuration: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect::<Directives>(),
        }
    }

    #[test]
    fn renders_headers_directives_and_separators() {
        let sections = vec![
            section("global", None, &[("user", Some("haproxy")), ("daemon", None)]),
            section("backend", Some("bak"), &[("mode", Some("http"))]),
        ];

        let expected = "global \n    daemon \n    user haproxy\n\nbackend bak\n    mode http\n\n";
        assert_eq!(render(&sections), expected);
    }

    #[test]
    fn render_is_deterministic() {
        let sections = vec![section(
            "defaults",
            None,
            &[("timeout connect", Some("5s")), ("mode", Some("http")), ("log", Some("global"))],
        )];
        assert_eq!(render(&sections), render(&sections.clone()));
    }

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(render(&[]), "");
    }

    #[test]
    fn write_config_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haproxy.cfg");
        std::fs::write(&path, "a much longer previous configuration\n").unwrap();

        write_config(&path, "global \n\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "global \n\n");
    }

    #[test]
    fn write_config_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("haproxy.cfg");

        let err = write_config(&path, "global \n").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StorageError);
        match err {
            ManagerError::Storage { path: failed, code, .. } => {
                assert_eq!(failed, path);
                assert!(code.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
