// Translation completeness reports
//
// - compute: statistics for one (simulation, language) pair
// - cache: shared store of computed report objects with dirty tracking
// - service: cache-first access and full-language report streams

pub mod cache;
pub mod compute;
pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use cache::ReportObjectCache;
pub use compute::ReportObjectComputer;
pub use service::{ReportEvent, ReportService};

/// Whether translated content is consulted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Count persisted translations
    Translated,
    /// Treat every string as untranslated without fetching translations
    Untranslated,
}

/// `floor(numerator / denominator * 100)`, 0 when there is nothing to count
pub fn percent(numerator: usize, denominator: usize) -> u32 {
    if denominator == 0 {
        return 0;
    }
    let value = numerator.saturating_mul(100) / denominator;
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub total: usize,
    pub translated: usize,
    pub percent: u32,
}

impl CategoryStats {
    pub fn new(total: usize, translated: usize) -> Self {
        Self {
            total,
            translated,
            percent: percent(translated, total),
        }
    }
}

/// Completeness of one simulation in one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportObject {
    pub simulation_name: String,
    pub title: String,
    pub common: CategoryStats,
    pub sim_specific: CategoryStats,
    pub shared: CategoryStats,
    pub total_strings: usize,
    pub total_translated: usize,
    pub percent_total: u32,
    /// Simulations owning the shared strings
    pub shared_sims: Vec<String>,
    pub is_dirty: bool,
    pub timestamp: DateTime<Utc>,
}

impl ReportObject {
    pub fn new(
        simulation_name: &str,
        title: &str,
        common: CategoryStats,
        sim_specific: CategoryStats,
        shared: CategoryStats,
        shared_sims: Vec<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let total_strings = common.total + sim_specific.total + shared.total;
        let total_translated = common.translated + sim_specific.translated + shared.translated;
        Self {
            simulation_name: simulation_name.to_string(),
            title: title.to_string(),
            common,
            sim_specific,
            shared,
            total_strings,
            total_translated,
            percent_total: percent(total_translated, total_strings),
            shared_sims,
            is_dirty: false,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(5, 0), 0);
        assert_eq!(percent(5, 20), 25);
        assert_eq!(percent(20, 20), 100);
        assert_eq!(percent(25, 40), 62);
        assert_eq!(percent(1, 3), 33);
    }

    #[test]
    fn test_totals_sum_categories() {
        let report = ReportObject::new(
            "ph-scale",
            "pH Scale",
            CategoryStats::new(40, 25),
            CategoryStats::new(10, 10),
            CategoryStats::new(0, 0),
            Vec::new(),
            Utc::now(),
        );
        assert_eq!(report.common.percent, 62);
        assert_eq!(report.sim_specific.percent, 100);
        assert_eq!(report.shared.percent, 0);
        assert_eq!(report.total_strings, 50);
        assert_eq!(report.total_translated, 35);
        assert_eq!(report.percent_total, 70);
        assert!(!report.is_dirty);
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ReportMode::Untranslated).unwrap(), "\"untranslated\"");
    }
}
