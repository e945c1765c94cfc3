//! Durable translation file format and the submission shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, SimtransError};
use crate::keys::{KeyPath, StringKey};

pub type UserId = u64;

/// Milliseconds since the Unix epoch
pub type Timestamp = i64;

/// One change to a translated string. Never modified once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub user_id: UserId,
    pub timestamp: Timestamp,
    pub old_value: String,
    pub new_value: String,
}

/// Current value of a translated string plus every change that led to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub value: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl TranslationRecord {
    /// A record created by its first translation
    pub fn created(value: String, user_id: UserId, timestamp: Timestamp) -> Self {
        Self {
            history: vec![HistoryEntry {
                user_id,
                timestamp,
                old_value: String::new(),
                new_value: value.clone(),
            }],
            value,
        }
    }

    /// Replace the value, appending the change to the history
    pub fn update(&mut self, value: String, user_id: UserId, timestamp: Timestamp) {
        let old_value = std::mem::replace(&mut self.value, value.clone());
        self.history.push(HistoryEntry {
            user_id,
            timestamp,
            old_value,
            new_value: value,
        });
    }
}

/// Check that `language` is a locale code such as `es` or `zh_CN`
pub fn validate_language(language: &str) -> Result<()> {
    if language.is_empty() || !language.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
        return Err(SimtransError::InvalidSubmission(format!(
            "invalid language code '{}'",
            language
        )));
    }
    Ok(())
}

/// Translations of one repository into one language
pub type TranslationFile = BTreeMap<KeyPath, TranslationRecord>;

/// Submitted value for a single key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedString {
    pub key: StringKey,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFormData {
    #[serde(default)]
    pub sim_specific: Vec<SubmittedString>,
    #[serde(default)]
    pub shared: Vec<SubmittedString>,
    #[serde(default)]
    pub common: Vec<SubmittedString>,
}

/// A translator's submission, not yet split by owning repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationSubmission {
    pub user_id: UserId,
    pub simulation_name: String,
    pub language: String,
    pub timestamp: Timestamp,
    pub form_data: SubmissionFormData,
}

impl TranslationSubmission {
    /// Submitted values grouped by owning repository, in submission order.
    ///
    /// Sim-specific strings must belong to the simulation's own repository;
    /// any other owner fails the whole submission.
    pub fn partition_by_repo(&self) -> Result<BTreeMap<String, Vec<(KeyPath, String)>>> {
        validate_language(&self.language)?;

        if let Some(stray) = self
            .form_data
            .sim_specific
            .iter()
            .find(|entry| entry.key.repo != self.simulation_name)
        {
            return Err(SimtransError::InvalidSubmission(format!(
                "sim-specific string {} does not belong to {}",
                stray.key, self.simulation_name
            )));
        }

        let mut by_repo: BTreeMap<String, Vec<(KeyPath, String)>> = BTreeMap::new();
        for entry in self
            .form_data
            .sim_specific
            .iter()
            .chain(&self.form_data.shared)
            .chain(&self.form_data.common)
        {
            by_repo
                .entry(entry.key.repo.clone())
                .or_default()
                .push((entry.key.path.clone(), entry.value.clone()));
        }

        Ok(by_repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durable_json_shape() {
        let mut file = TranslationFile::new();
        file.insert(
            KeyPath::from("screen.name"),
            TranslationRecord::created("Soluciones".to_string(), 7, 1_700_000_000_000),
        );

        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "screen.name": {
                    "value": "Soluciones",
                    "history": [{
                        "userId": 7,
                        "timestamp": 1_700_000_000_000_i64,
                        "oldValue": "",
                        "newValue": "Soluciones"
                    }]
                }
            })
        );
    }

    #[test]
    fn test_record_without_history_loads() {
        let file: TranslationFile =
            serde_json::from_str(r#"{"title": {"value": "Título"}}"#).unwrap();
        assert!(file[&KeyPath::from("title")].history.is_empty());
    }

    #[test]
    fn test_partition_by_repo() {
        let submission = TranslationSubmission {
            user_id: 1,
            simulation_name: "acid-base-solutions".to_string(),
            language: "es".to_string(),
            timestamp: 0,
            form_data: SubmissionFormData {
                sim_specific: vec![SubmittedString {
                    key: StringKey::parse("ACID_BASE_SOLUTIONS/title").unwrap(),
                    value: "Soluciones".to_string(),
                }],
                shared: vec![SubmittedString {
                    key: StringKey::parse("PH_SCALE/water").unwrap(),
                    value: "agua".to_string(),
                }],
                common: vec![
                    SubmittedString {
                        key: StringKey::parse("JOIST/home").unwrap(),
                        value: "Inicio".to_string(),
                    },
                    SubmittedString {
                        key: StringKey::parse("JOIST/credits").unwrap(),
                        value: "Créditos".to_string(),
                    },
                ],
            },
        };

        let partitioned = submission.partition_by_repo().unwrap();
        assert_eq!(partitioned.len(), 3);
        assert_eq!(partitioned["joist"][0].0, KeyPath::from("home"));
        assert_eq!(partitioned["joist"][1].0, KeyPath::from("credits"));
        assert_eq!(partitioned["ph-scale"][0].1, "agua");
        assert_eq!(partitioned["acid-base-solutions"].len(), 1);
    }

    fn submission_for(simulation_name: &str, language: &str, sim_key: &str) -> TranslationSubmission {
        TranslationSubmission {
            user_id: 1,
            simulation_name: simulation_name.to_string(),
            language: language.to_string(),
            timestamp: 0,
            form_data: SubmissionFormData {
                sim_specific: vec![SubmittedString {
                    key: StringKey::parse(sim_key).unwrap(),
                    value: "agua".to_string(),
                }],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_sim_specific_key_of_another_repo_is_rejected() {
        let submission = submission_for("acid-base-solutions", "es", "PH_SCALE/water");
        assert!(matches!(
            submission.partition_by_repo(),
            Err(SimtransError::InvalidSubmission(_))
        ));
    }

    #[test]
    fn test_language_must_be_a_locale_code() {
        assert!(validate_language("es").is_ok());
        assert!(validate_language("zh_CN").is_ok());
        for bad in ["", "../es", "es/../../x", "e s", ".."] {
            assert!(validate_language(bad).is_err(), "accepted {:?}", bad);
        }

        let submission = submission_for("ph-scale", "../../fr", "PH_SCALE/water");
        assert!(matches!(
            submission.partition_by_repo(),
            Err(SimtransError::InvalidSubmission(_))
        ));
    }
}
