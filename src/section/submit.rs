//! Input gate for section submissions.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::checksum::compute_checksum;
use super::model::{suggest_section_type, Directives, Section, SectionMeta, KNOWN_SECTION_TYPES};
use crate::config::model::HaproxyConfig;
use crate::error::ManagerError;

/// The one unnamed-by-default type that may still carry a name.
const OPTIONALLY_NAMED: &str = "defaults";

/// A section as submitted by a client, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionSubmission {
    /// Section type.
    #[serde(default)]
    pub section: Option<String>,

    /// Section name.
    #[serde(default)]
    pub section_name: Option<String>,

    /// Directives, either as JSON text or as an inline JSON object.
    #[serde(default)]
    pub configuration: Option<Value>,
}

/// A validated section that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSection {
    pub section_type: String,
    pub section_name: Option<String>,
    pub configuration: Directives,
}

impl NewSection {
    /// Validates a submission against the configured named section types.
    ///
    /// Names on types outside the named set are dropped, except on
    /// `defaults`. Control characters are refused in names, keys and values
    /// so each directive renders as exactly one line.
    pub fn from_submission(
        submission: SectionSubmission,
        settings: &HaproxyConfig,
    ) -> Result<Self, ManagerError> {
        let section_type = submission
            .section
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ManagerError::invalid("section", "Section type is required"))?;

        if !KNOWN_SECTION_TYPES.contains(&section_type.as_str()) {
            return Err(ManagerError::InvalidInput {
                field: "section".to_string(),
                message: format!("Unknown section type: '{}'", section_type),
                suggestion: Some(format!(
                    "Did you mean '{}'?",
                    suggest_section_type(&section_type)
                )),
            });
        }

        let named = settings.is_named(&section_type);
        let mut section_name = submission
            .section_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        if let Some(name) = &section_name {
            reject_control_chars("section_name", name)?;
            if !named && section_type != OPTIONALLY_NAMED {
                tracing::debug!(section = %section_type, name = %name, "Dropping name on unnamed section type");
                section_name = None;
            }
        }

        if section_name.is_none() && named {
            return Err(ManagerError::invalid(
                "section_name",
                format!("Section type '{}' requires a section name", section_type),
            ));
        }

        let configuration = parse_directives(submission.configuration)?;

        Ok(Self {
            section_type,
            section_name,
            configuration,
        })
    }

    /// Computes the checksum this section will be stored under.
    pub fn checksum(&self) -> String {
        compute_checksum(
            &self.section_type,
            self.section_name.as_deref(),
            &self.configuration,
        )
    }

    /// Turns this submission into a record persisted at `now`.
    pub fn into_section(self, now: DateTime<Utc>) -> Section {
        Section {
            checksum: self.checksum(),
            section_type: self.section_type,
            section_name: self.section_name,
            meta: SectionMeta::created(now),
            configuration: self.configuration,
        }
    }
}

/// Parses submitted directives into a sorted map.
fn parse_directives(raw: Option<Value>) -> Result<Directives, ManagerError> {
    let object = match raw {
        None | Some(Value::Null) => {
            return Err(ManagerError::invalid("configuration", "Configuration is required"));
        }
        Some(Value::String(text)) => {
            if text.trim().is_empty() {
                return Err(ManagerError::invalid("configuration", "Configuration is required"));
            }
            match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(ManagerError::invalid(
                        "configuration",
                        "Configuration must be a JSON object",
                    ))
                }
                Err(e) => {
                    return Err(ManagerError::invalid(
                        "configuration",
                        format!("Configuration is not valid JSON: {}", e),
                    ))
                }
            }
        }
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(ManagerError::invalid(
                "configuration",
                "Configuration must be a JSON object",
            ))
        }
    };

    if object.is_empty() {
        return Err(ManagerError::invalid("configuration", "Configuration is empty"));
    }

    let mut directives = Directives::new();
    for (key, value) in object {
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(ManagerError::invalid("configuration", "Directive names cannot be empty"));
        }
        reject_control_chars("configuration", &key)?;
        if directives.contains_key(&key) {
            return Err(ManagerError::invalid(
                format!("configuration.{}", key),
                format!("Directive '{}' is given more than once", key),
            ));
        }

        let value = match value {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(_) | Value::Object(_) => {
                return Err(ManagerError::invalid(
                    format!("configuration.{}", key),
                    "Directive values must be scalars",
                ))
            }
        };
        if let Some(text) = &value {
            reject_control_chars(&format!("configuration.{}", key), text)?;
        }
        directives.insert(key, value);
    }

    Ok(directives)
}

/// Refuses text that would break a rendered line, such as CR or LF.
fn reject_control_chars(field: &str, text: &str) -> Result<(), ManagerError> {
    if text.chars().any(char::is_control) {
        return Err(ManagerError::invalid(
            field,
            "Control characters (including line breaks) are not allowed",
        ));
    }
    Ok(())
}
