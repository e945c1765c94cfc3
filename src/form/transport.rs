//! Form data for transports that read `.` in object keys as nesting.
//!
//! Keys are flattened to `REPO_PREFIX/path` and every `.` is escaped as `%2E`
//! (`%` itself as `%25`), so `JOIST/screen.name` can never turn into
//! `{"JOIST/screen": {"name": ...}}` on the other side.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, SimtransError};
use crate::keys::{StringKey, PATH_SEPARATOR};
use super::{TranslatableEntry, TranslationFormData};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportEntry {
    pub english: String,
    pub translated: String,
    #[serde(default)]
    pub prior: String,
    /// Owning repository, kept so the client can show where a string comes from
    pub repo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportForm {
    pub simulation_name: String,
    pub language: String,
    pub sim_specific: BTreeMap<String, TransportEntry>,
    pub shared: BTreeMap<String, TransportEntry>,
    pub common: BTreeMap<String, TransportEntry>,
}

pub fn encode_key(key: &StringKey) -> String {
    let mut encoded = String::new();
    for c in key.to_string().chars() {
        match c {
            '%' => encoded.push_str("%25"),
            PATH_SEPARATOR => encoded.push_str("%2E"),
            c => encoded.push(c),
        }
    }
    encoded
}

pub fn decode_key(encoded: &str) -> Result<StringKey> {
    let mut decoded = String::with_capacity(encoded.len());
    let mut rest = encoded;
    while let Some(index) = rest.find('%') {
        decoded.push_str(&rest[..index]);
        let escape = rest.get(index..index + 3);
        match escape {
            Some("%25") => decoded.push('%'),
            Some("%2E") => decoded.push(PATH_SEPARATOR),
            _ => {
                return Err(SimtransError::InvalidKey {
                    key: encoded.to_string(),
                    reason: "invalid escape sequence".to_string(),
                })
            }
        }
        rest = &rest[index + 3..];
    }
    decoded.push_str(rest);
    StringKey::parse(&decoded)
}

fn encode_entries(entries: &[TranslatableEntry]) -> BTreeMap<String, TransportEntry> {
    entries
        .iter()
        .map(|entry| {
            (
                encode_key(&entry.key),
                TransportEntry {
                    english: entry.english_value.clone(),
                    translated: entry.translated_value.clone(),
                    prior: entry.prior_translated_value.clone(),
                    repo: entry.key.repo.clone(),
                },
            )
        })
        .collect()
}

fn decode_entries(entries: BTreeMap<String, TransportEntry>) -> Result<Vec<TranslatableEntry>> {
    entries
        .into_iter()
        .map(|(encoded, entry)| {
            let key = decode_key(&encoded)?;
            if key.repo != entry.repo {
                return Err(SimtransError::InvalidKey {
                    key: encoded,
                    reason: format!("key does not belong to repository {}", entry.repo),
                });
            }
            Ok(TranslatableEntry {
                key,
                english_value: entry.english,
                translated_value: entry.translated,
                prior_translated_value: entry.prior,
            })
        })
        .collect()
}

impl From<&TranslationFormData> for TransportForm {
    fn from(form: &TranslationFormData) -> Self {
        Self {
            simulation_name: form.simulation_name.clone(),
            language: form.language.clone(),
            sim_specific: encode_entries(&form.sim_specific),
            shared: encode_entries(&form.shared),
            common: encode_entries(&form.common),
        }
    }
}

impl TryFrom<TransportForm> for TranslationFormData {
    type Error = SimtransError;

    fn try_from(form: TransportForm) -> Result<Self> {
        Ok(Self {
            simulation_name: form.simulation_name,
            language: form.language,
            sim_specific: decode_entries(form.sim_specific)?,
            shared: decode_entries(form.shared)?,
            common: decode_entries(form.common)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_key_has_no_separator() {
        let key = StringKey::parse("JOIST/screen.name").unwrap();
        let encoded = encode_key(&key);
        assert_eq!(encoded, "JOIST/screen%2Ename");
        assert_eq!(decode_key(&encoded).unwrap(), key);
    }

    #[test]
    fn test_literal_escape_text_survives() {
        let key = StringKey::new("joist", "rate%2Eper.unit");
        let encoded = encode_key(&key);
        assert!(!encoded.contains('.'));
        assert_eq!(decode_key(&encoded).unwrap(), key);
    }

    #[test]
    fn test_bad_escape_rejected() {
        assert!(decode_key("JOIST/a%2").is_err());
        assert!(decode_key("JOIST/a%41b").is_err());
    }

    #[test]
    fn test_form_through_nested_json() {
        let mut form = TranslationFormData::empty("acid-base-solutions", "es");
        form.common.push(TranslatableEntry {
            key: StringKey::parse("JOIST/preferences.title").unwrap(),
            english_value: "Preferences".to_string(),
            translated_value: "Preferencias".to_string(),
            prior_translated_value: String::new(),
        });

        let json = serde_json::to_value(TransportForm::from(&form)).unwrap();
        assert_eq!(
            json["common"]["JOIST/preferences%2Etitle"]["translated"],
            "Preferencias"
        );
        assert_eq!(json["common"]["JOIST/preferences%2Etitle"]["repo"], "joist");

        let back: TransportForm = serde_json::from_value(json).unwrap();
        assert_eq!(TranslationFormData::try_from(back).unwrap(), form);
    }

    #[test]
    fn test_repo_mismatch_rejected() {
        let mut common = BTreeMap::new();
        common.insert(
            "JOIST/title".to_string(),
            TransportEntry {
                english: "Title".to_string(),
                translated: "Título".to_string(),
                prior: String::new(),
                repo: "scenery-phet".to_string(),
            },
        );
        let form = TransportForm {
            simulation_name: "ph-scale".to_string(),
            language: "es".to_string(),
            sim_specific: BTreeMap::new(),
            shared: BTreeMap::new(),
            common,
        };
        assert!(TranslationFormData::try_from(form).is_err());
    }
}
