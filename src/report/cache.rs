use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

use super::ReportObject;

type CacheKey = (String, String);

fn cache_key(language: &str, simulation_name: &str) -> CacheKey {
    (language.to_string(), simulation_name.to_string())
}

/// Report objects keyed by (language, simulation).
///
/// A dirty object is still served until `valid_window` has passed since it was
/// computed. The cache does no I/O; share it by `Arc` handle.
#[derive(Debug)]
pub struct ReportObjectCache {
    objects: RwLock<HashMap<CacheKey, ReportObject>>,
    valid_window: Duration,
}

impl ReportObjectCache {
    pub fn new(valid_window: Duration) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            valid_window,
        }
    }

    pub fn valid_window(&self) -> Duration {
        self.valid_window
    }

    /// Store a freshly computed object
    pub fn set_object(
        &self,
        language: &str,
        simulation_name: &str,
        mut object: ReportObject,
        timestamp: DateTime<Utc>,
    ) {
        object.is_dirty = false;
        object.timestamp = timestamp;
        self.objects
            .write()
            .insert(cache_key(language, simulation_name), object);
    }

    /// Mark an existing object dirty; returns false when nothing was cached
    pub fn set_dirty_object(&self, language: &str, simulation_name: &str) -> bool {
        let mut objects = self.objects.write();
        match objects.get_mut(&cache_key(language, simulation_name)) {
            Some(object) => {
                object.is_dirty = true;
                debug!("Marked report {}/{} dirty", language, simulation_name);
                true
            }
            None => false,
        }
    }

    pub fn get_object(&self, language: &str, simulation_name: &str) -> Option<ReportObject> {
        self.get_object_at(language, simulation_name, Utc::now())
    }

    /// Servable object as of `now`
    pub fn get_object_at(
        &self,
        language: &str,
        simulation_name: &str,
        now: DateTime<Utc>,
    ) -> Option<ReportObject> {
        let objects = self.objects.read();
        let object = objects.get(&cache_key(language, simulation_name))?;

        if !object.is_dirty || now - object.timestamp < self.valid_window {
            Some(object.clone())
        } else {
            None
        }
    }

    /// Evict one object; returns whether it was cached
    pub fn flush_object(&self, language: &str, simulation_name: &str) -> bool {
        self.objects
            .write()
            .remove(&cache_key(language, simulation_name))
            .is_some()
    }

    /// Evict every object of `language`; returns how many were cached
    pub fn flush_language(&self, language: &str) -> usize {
        let mut objects = self.objects.write();
        let before = objects.len();
        objects.retain(|(cached_language, _), _| cached_language != language);
        before - objects.len()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
