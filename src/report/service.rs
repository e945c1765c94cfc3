use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::sources::{SimulationCatalog, SimulationInfo};
use super::{ReportMode, ReportObject, ReportObjectCache, ReportObjectComputer};

/// One step of a full-language report stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ReportEvent {
    Report { report: ReportObject },
    Failed { simulation_name: String, error: String },
    /// Always the last event of a stream that ran to the end
    Complete { simulations: usize },
}

/// Cache-first report access
#[derive(Clone)]
pub struct ReportService {
    computer: ReportObjectComputer,
    catalog: Arc<dyn SimulationCatalog>,
    cache: Arc<ReportObjectCache>,
    concurrency: usize,
}

impl ReportService {
    pub fn new(
        computer: ReportObjectComputer,
        catalog: Arc<dyn SimulationCatalog>,
        cache: Arc<ReportObjectCache>,
        concurrency: usize,
    ) -> Self {
        Self {
            computer,
            catalog,
            cache,
            concurrency: concurrency.max(1),
        }
    }

    pub fn cache(&self) -> &Arc<ReportObjectCache> {
        &self.cache
    }

    pub async fn get_report(
        &self,
        simulation_name: &str,
        language: &str,
        mode: ReportMode,
    ) -> Result<ReportObject> {
        if mode == ReportMode::Translated {
            if let Some(cached) = self.cache.get_object(language, simulation_name) {
                debug!("Report cache hit for {}/{}", language, simulation_name);
                return Ok(cached);
            }
        }

        let sims = self.catalog.simulations().await?;
        self.report_with(&sims, simulation_name, language, mode).await
    }

    async fn report_with(
        &self,
        sims: &[SimulationInfo],
        simulation_name: &str,
        language: &str,
        mode: ReportMode,
    ) -> Result<ReportObject> {
        if mode == ReportMode::Untranslated {
            return self
                .computer
                .compute_with(sims, simulation_name, language, mode)
                .await;
        }

        if let Some(cached) = self.cache.get_object(language, simulation_name) {
            debug!("Report cache hit for {}/{}", language, simulation_name);
            return Ok(cached);
        }

        let report = self
            .computer
            .compute_with(sims, simulation_name, language, mode)
            .await?;
        self.cache
            .set_object(language, simulation_name, report.clone(), report.timestamp);
        Ok(report)
    }

    /// Signal that a submission changed strings seen by (language, simulation)
    pub fn mark_dirty(&self, language: &str, simulation_name: &str) -> bool {
        self.cache.set_dirty_object(language, simulation_name)
    }

    pub fn flush_report(&self, language: &str, simulation_name: &str) -> bool {
        let flushed = self.cache.flush_object(language, simulation_name);
        info!(
            "Flush of report {}/{}: {}",
            language,
            simulation_name,
            if flushed { "evicted" } else { "not cached" }
        );
        flushed
    }

    /// Simulations covered by a full-language report
    fn report_simulations(sims: &[SimulationInfo], language: &str, mode: ReportMode) -> Vec<String> {
        sims.iter()
            .filter(|sim| sim.visible)
            .filter(|sim| mode == ReportMode::Translated || !sim.has_translation(language))
            .map(|sim| sim.name.clone())
            .collect()
    }

    /// Report every visible simulation of `language`, one event per simulation
    /// as it completes, followed by [`ReportEvent::Complete`].
    ///
    /// Dropping the receiver stops scheduling further simulations; reports
    /// already computed stay cached.
    pub async fn stream_language_report(
        &self,
        language: &str,
        mode: ReportMode,
    ) -> Result<mpsc::Receiver<ReportEvent>> {
        let sims = Arc::new(self.catalog.simulations().await?);
        let names = Self::report_simulations(&sims, language, mode);
        let (tx, rx) = mpsc::channel(self.concurrency * 2);

        let service = self.clone();
        let language = language.to_string();
        tokio::spawn(async move {
            let total = names.len();
            info!(
                "Streaming {:?} report for {} over {} simulations",
                mode, language, total
            );

            let mut events = stream::iter(names)
                .map(|name| {
                    let service = service.clone();
                    let sims = sims.clone();
                    let language = language.clone();
                    async move {
                        match service.report_with(&sims, &name, &language, mode).await {
                            Ok(report) => ReportEvent::Report { report },
                            Err(e) => {
                                warn!("Report of {}/{} failed: {}", language, name, e);
                                ReportEvent::Failed {
                                    simulation_name: name,
                                    error: e.to_string(),
                                }
                            }
                        }
                    }
                })
                .buffer_unordered(service.concurrency);

            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        info!("Report stream for {} abandoned by caller", language);
                        return;
                    }
                    next = events.next() => match next {
                        Some(event) => {
                            if tx.send(event).await.is_err() {
                                info!("Report stream for {} abandoned by caller", language);
                                return;
                            }
                        }
                        None => break,
                    },
                }
            }

            let _ = tx.send(ReportEvent::Complete { simulations: total }).await;
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPath;
    use crate::sources::fetch::StringFetcher;
    use crate::sources::memory::{MemoryCatalog, MemoryEnglishSource, MemoryTranslatedStore};
    use crate::translation::{TranslationFile, TranslationRecord};
    use std::time::Duration;

    struct Fixture {
        english: Arc<MemoryEnglishSource>,
        store: Arc<MemoryTranslatedStore>,
        catalog: Arc<MemoryCatalog>,
        service: ReportService,
    }

    fn fixture(sim_count: usize, english: MemoryEnglishSource, concurrency: usize) -> Fixture {
        let english = Arc::new(english);
        let store = Arc::new(MemoryTranslatedStore::new());
        let catalog = Arc::new(MemoryCatalog::new());

        for i in 0..sim_count {
            let name = format!("sim-{}", i);
            english.insert(&name, "title", "Title");
            let key = format!("{}/title", crate::keys::prefix_from_repo(&name));
            catalog.add_simulation(&name, &format!("Sim {}", i), &[key.as_str()]);
        }
        catalog.add(
            SimulationInfo {
                name: "hidden".to_string(),
                title: "Hidden".to_string(),
                visible: false,
                translated_languages: Vec::new(),
                dependencies: Default::default(),
            },
            Vec::new(),
        );

        let fetcher = StringFetcher::new(english.clone(), store.clone(), Duration::from_secs(5));
        let computer = ReportObjectComputer::new(fetcher, catalog.clone());
        let cache = Arc::new(ReportObjectCache::new(chrono::Duration::minutes(5)));
        Fixture {
            english,
            store,
            catalog: catalog.clone(),
            service: ReportService::new(computer, catalog, cache, concurrency),
        }
    }

    #[tokio::test]
    async fn test_second_request_hits_cache() {
        let f = fixture(1, MemoryEnglishSource::new(), 2);

        let first = f.service.get_report("sim-0", "es", ReportMode::Translated).await.unwrap();
        let fetches = f.english.fetch_count();
        let catalog_calls = f.catalog.simulations_count();
        let second = f.service.get_report("sim-0", "es", ReportMode::Translated).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.english.fetch_count(), fetches);
        assert_eq!(f.catalog.simulations_count(), catalog_calls);
    }

    #[tokio::test]
    async fn test_untranslated_mode_bypasses_cache() {
        let f = fixture(1, MemoryEnglishSource::new(), 2);

        f.service.get_report("sim-0", "es", ReportMode::Untranslated).await.unwrap();
        assert!(f.service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_flush_forces_recompute() {
        let f = fixture(1, MemoryEnglishSource::new(), 2);
        let before = f.service.get_report("sim-0", "es", ReportMode::Translated).await.unwrap();
        assert_eq!(before.sim_specific.translated, 0);

        let mut file = TranslationFile::new();
        file.insert(KeyPath::from("title"), TranslationRecord::created("Título".to_string(), 1, 1));
        f.store.insert_file("sim-0", "es", file);

        let cached = f.service.get_report("sim-0", "es", ReportMode::Translated).await.unwrap();
        assert_eq!(cached.sim_specific.translated, 0);

        assert!(f.service.flush_report("es", "sim-0"));
        assert!(!f.service.flush_report("es", "sim-0"));
        let after = f.service.get_report("sim-0", "es", ReportMode::Translated).await.unwrap();
        assert_eq!(after.sim_specific.translated, 1);
        assert_eq!(after.percent_total, 100);
    }

    #[tokio::test]
    async fn test_stream_emits_every_visible_sim_then_completes() {
        let f = fixture(6, MemoryEnglishSource::new(), 3);
        f.english.fail_repo("sim-4");

        let mut rx = f
            .service
            .stream_language_report("es", ReportMode::Translated)
            .await
            .unwrap();

        let mut reports = Vec::new();
        let mut failed = Vec::new();
        let mut complete = None;
        while let Some(event) = rx.recv().await {
            match event {
                ReportEvent::Report { report } => reports.push(report.simulation_name),
                ReportEvent::Failed { simulation_name, .. } => failed.push(simulation_name),
                ReportEvent::Complete { simulations } => complete = Some(simulations),
            }
        }

        reports.sort();
        assert_eq!(reports, vec!["sim-0", "sim-1", "sim-2", "sim-3", "sim-5"]);
        assert_eq!(failed, vec!["sim-4"]);
        assert_eq!(complete, Some(6));
        assert_eq!(f.service.cache().len(), 5);
    }

    #[tokio::test]
    async fn test_untranslated_stream_skips_translated_sims() {
        let f = fixture(0, MemoryEnglishSource::new(), 2);
        let catalog = Arc::new(MemoryCatalog::new());
        f.english.insert("ph-scale", "title", "pH Scale");
        f.english.insert("friction", "title", "Friction");
        catalog.add(
            SimulationInfo {
                name: "ph-scale".to_string(),
                title: "pH Scale".to_string(),
                visible: true,
                translated_languages: vec!["es".to_string()],
                dependencies: Default::default(),
            },
            vec!["PH_SCALE/title".to_string()],
        );
        catalog.add_simulation("friction", "Friction", &["FRICTION/title"]);
        let fetcher = StringFetcher::new(f.english.clone(), f.store.clone(), Duration::from_secs(5));
        let service = ReportService::new(
            ReportObjectComputer::new(fetcher, catalog.clone()),
            catalog,
            Arc::new(ReportObjectCache::new(chrono::Duration::minutes(5))),
            2,
        );

        let mut rx = service
            .stream_language_report("es", ReportMode::Untranslated)
            .await
            .unwrap();
        let mut names = Vec::new();
        while let Some(event) = rx.recv().await {
            if let ReportEvent::Report { report } = event {
                names.push(report.simulation_name);
            }
        }
        assert_eq!(names, vec!["friction"]);
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_stream() {
        let slow = MemoryEnglishSource::new().with_latency(Duration::from_millis(20));
        let f = fixture(50, slow, 1);

        let mut rx = f
            .service
            .stream_language_report("es", ReportMode::Translated)
            .await
            .unwrap();
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, ReportEvent::Report { .. }));
        drop(rx);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let fetched = f.english.fetch_count();
        assert!(fetched < 50, "stream kept running after disconnect: {} fetches", fetched);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(f.english.fetch_count(), fetched);
        assert!(f.service.cache().len() >= 1);
    }
}
