use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

use crate::keys::StringKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StringCategory {
    /// Owned by a library repository used by many simulations
    Common,
    /// Owned by the simulation's own repository
    SimSpecific,
    /// Owned by another simulation's repository
    Shared,
}

/// Keys of one simulation split by owning repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorizedKeys {
    pub common: Vec<StringKey>,
    pub sim_specific: Vec<StringKey>,
    pub shared: Vec<StringKey>,
    /// Simulations that own the shared keys
    pub shared_sims: Vec<String>,
}

impl CategorizedKeys {
    pub fn keys(&self, category: StringCategory) -> &[StringKey] {
        match category {
            StringCategory::Common => &self.common,
            StringCategory::SimSpecific => &self.sim_specific,
            StringCategory::Shared => &self.shared,
        }
    }

    /// All repositories that own at least one key
    pub fn repos(&self) -> BTreeSet<&str> {
        self.common
            .iter()
            .chain(&self.sim_specific)
            .chain(&self.shared)
            .map(|key| key.repo.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.common.len() + self.sim_specific.len() + self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Category of a single key for a given simulation
pub fn categorize_key(
    key: &StringKey,
    sim_name: &str,
    known_sims: &HashSet<String>,
) -> StringCategory {
    if key.repo == sim_name {
        StringCategory::SimSpecific
    } else if known_sims.contains(&key.repo) {
        StringCategory::Shared
    } else {
        StringCategory::Common
    }
}

/// Categorize the runtime keys referenced by `sim_name`.
///
/// Accessibility keys are skipped and unparseable keys are dropped with a
/// warning. Output lists are sorted and free of duplicates.
pub fn categorize_keys<S: AsRef<str>>(
    raw_keys: &[S],
    sim_name: &str,
    known_sims: &HashSet<String>,
) -> CategorizedKeys {
    let mut common = BTreeSet::new();
    let mut sim_specific = BTreeSet::new();
    let mut shared = BTreeSet::new();
    let mut shared_sims = BTreeSet::new();

    for raw in raw_keys {
        let raw = raw.as_ref();
        let key = match StringKey::parse(raw) {
            Ok(key) => key,
            Err(e) => {
                warn!("Dropping string key used by {}: {}", sim_name, e);
                continue;
            }
        };

        if key.is_accessibility() {
            debug!("Skipping accessibility key {}", raw);
            continue;
        }

        match categorize_key(&key, sim_name, known_sims) {
            StringCategory::SimSpecific => {
                sim_specific.insert(key);
            }
            StringCategory::Shared => {
                shared_sims.insert(key.repo.clone());
                shared.insert(key);
            }
            StringCategory::Common => {
                common.insert(key);
            }
        }
    }

    let categorized = CategorizedKeys {
        common: common.into_iter().collect(),
        sim_specific: sim_specific.into_iter().collect(),
        shared: shared.into_iter().collect(),
        shared_sims: shared_sims.into_iter().collect(),
    };

    debug!(
        "Categorized keys for {}: {} common, {} sim-specific, {} shared from {:?}",
        sim_name,
        categorized.common.len(),
        categorized.sim_specific.len(),
        categorized.shared.len(),
        categorized.shared_sims
    );

    categorized
}
