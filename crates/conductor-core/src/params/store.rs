//! Shared parameter store.
//!
//! The [`ParamStore`] holds the name -> value table behind an
//! `Arc<RwLock>`, so the OSC receiver and the sampler each hold a clone of
//! the same handle instead of reaching for globals.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::value::{
    default_value, is_known, ParamValue, BPM, DARKNESS, DEFAULT_BPM, DEFAULT_DARKNESS,
    DEFAULT_ENERGY, DEFAULT_HATS, DEFAULT_KICK_ON, DEFAULT_PROFILE, ENERGY, HATS, KICK_ON,
    LIVE_PARAMS, PARAM_NAMES, PROFILE, SAVED_STATE,
};

#[derive(Debug, Clone)]
struct ParamTable {
    values: BTreeMap<String, ParamValue>,
    version: u64,
}

impl ParamTable {
    fn with_defaults() -> Self {
        let values = PARAM_NAMES
            .iter()
            .filter_map(|name| default_value(name).map(|v| (name.to_string(), v)))
            .collect();
        Self { values, version: 0 }
    }

    fn write(&mut self, key: &str, value: ParamValue) {
        self.values.insert(key.to_string(), value);
        self.version += 1;
    }
}

/// Thread-safe handle to the parameter table.
///
/// Cloning the handle shares the underlying table. Writes are last-write-wins
/// per key; there is no ordering guarantee across keys or writers.
#[derive(Clone)]
pub struct ParamStore {
    table: Arc<RwLock<ParamTable>>,
}

impl Default for ParamStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamStore {
    /// Create a store holding the documented defaults.
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(ParamTable::with_defaults())),
        }
    }

    fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ParamTable) -> R,
    {
        // The table only holds plain values, so a writer that panicked
        // cannot leave it half-updated.
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        f(&table)
    }

    fn write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ParamTable) -> R,
    {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut table)
    }

    /// Overwrite `key` with `value`. No validation or coercion is applied.
    pub fn set(&self, key: &str, value: impl Into<ParamValue>) {
        let value = value.into();
        if !is_known(key) {
            log::debug!("[PARAMS] Setting undeclared parameter '{}'", key);
        }
        log::trace!("[PARAMS] {} = {}", key, value);
        self.write(|t| t.write(key, value));
    }

    /// Last value written for `key`, its default if never written, or
    /// [`ParamValue::Nil`] for an unknown key.
    pub fn get(&self, key: &str) -> ParamValue {
        self.read(|t| t.values.get(key).cloned())
            .or_else(|| default_value(key))
            .unwrap_or(ParamValue::Nil)
    }

    fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.read(|t| t.values.get(key).and_then(ParamValue::as_f64))
            .unwrap_or(default)
    }

    fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.read(|t| t.values.get(key).and_then(ParamValue::as_i64))
            .unwrap_or(default)
    }

    pub fn energy(&self) -> f64 {
        self.get_f64(ENERGY, DEFAULT_ENERGY)
    }

    pub fn darkness(&self) -> f64 {
        self.get_f64(DARKNESS, DEFAULT_DARKNESS)
    }

    pub fn hats(&self) -> f64 {
        self.get_f64(HATS, DEFAULT_HATS)
    }

    pub fn bpm(&self) -> i64 {
        self.get_i64(BPM, DEFAULT_BPM)
    }

    /// Kick toggle as a bool; any non-zero value counts as on.
    pub fn kick_on(&self) -> bool {
        self.get_i64(KICK_ON, DEFAULT_KICK_ON) != 0
    }

    pub fn profile(&self) -> String {
        self.read(|t| {
            t.values
                .get(PROFILE)
                .and_then(ParamValue::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    /// Read energy, darkness and hats under a single lock.
    pub fn voice_params(&self) -> (f64, f64, f64) {
        self.read(|t| {
            let f = |key: &str, default: f64| {
                t.values.get(key).and_then(ParamValue::as_f64).unwrap_or(default)
            };
            (
                f(ENERGY, DEFAULT_ENERGY),
                f(DARKNESS, DEFAULT_DARKNESS),
                f(HATS, DEFAULT_HATS),
            )
        })
    }

    /// Clone of every current value.
    pub fn snapshot(&self) -> BTreeMap<String, ParamValue> {
        self.read(|t| t.values.clone())
    }

    /// Number of writes applied since creation.
    pub fn version(&self) -> u64 {
        self.read(|t| t.version)
    }

    /// Capture the live parameters into `saved_state`.
    pub fn save(&self) {
        self.write(|t| {
            let captured: BTreeMap<String, ParamValue> = LIVE_PARAMS
                .iter()
                .map(|name| {
                    let v = t
                        .values
                        .get(*name)
                        .cloned()
                        .or_else(|| default_value(name))
                        .unwrap_or(ParamValue::Nil);
                    (name.to_string(), v)
                })
                .collect();
            t.write(SAVED_STATE, ParamValue::Snapshot(captured));
        });
        log::debug!("[PARAMS] Saved current parameters");
    }

    /// Restore the live parameters from `saved_state`.
    ///
    /// Returns `false` and changes nothing when no snapshot has been saved.
    pub fn undo(&self) -> bool {
        let restored = self.write(|t| {
            let saved = match t.values.get(SAVED_STATE) {
                Some(ParamValue::Snapshot(map)) => map.clone(),
                _ => return false,
            };
            for (key, value) in saved {
                t.write(&key, value);
            }
            true
        });
        if restored {
            log::debug!("[PARAMS] Restored saved parameters");
        } else {
            log::debug!("[PARAMS] Undo requested but nothing was saved");
        }
        restored
    }

    /// Put the live parameters back to their defaults. `saved_state` is kept.
    pub fn reset(&self) {
        self.write(|t| {
            for name in LIVE_PARAMS {
                if let Some(v) = default_value(name) {
                    t.write(name, v);
                }
            }
        });
        log::debug!("[PARAMS] Reset parameters to defaults");
    }
}

impl std::fmt::Debug for ParamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamStore")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_defaults_after_creation() {
        let store = ParamStore::new();
        assert_eq!(store.get("energy"), ParamValue::Float(0.5));
        assert_eq!(store.get("darkness"), ParamValue::Float(0.5));
        assert_eq!(store.get("hats"), ParamValue::Float(0.5));
        assert_eq!(store.get("bpm"), ParamValue::Int(128));
        assert_eq!(store.get("kick_on"), ParamValue::Int(1));
        assert_eq!(store.get("profile"), ParamValue::Str("peak".to_string()));
        assert_eq!(store.get("saved_state"), ParamValue::Nil);
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_set_then_get_returns_value_unchanged() {
        let store = ParamStore::new();
        store.set("energy", 0.8);
        assert_eq!(store.get("energy"), ParamValue::Float(0.8));
        store.set("energy", 0.3);
        assert_eq!(store.get("energy"), ParamValue::Float(0.3));
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_no_coercion_on_write() {
        let store = ParamStore::new();
        store.set("bpm", "fast");
        assert_eq!(store.get("bpm"), ParamValue::Str("fast".to_string()));
        // Typed read falls back to the default instead of failing
        assert_eq!(store.bpm(), 128);
    }

    #[test]
    fn test_unknown_key() {
        let store = ParamStore::new();
        assert_eq!(store.get("volume"), ParamValue::Nil);
        store.set("volume", 3);
        assert_eq!(store.get("volume"), ParamValue::Int(3));
    }

    #[test]
    fn test_typed_reads() {
        let store = ParamStore::new();
        assert!((store.energy() - 0.5).abs() < 1e-9);
        assert!(store.kick_on());
        assert_eq!(store.profile(), "peak");

        store.set("hats", 1);
        store.set("kick_on", 0);
        store.set("profile", "afterhour");
        assert!((store.hats() - 1.0).abs() < 1e-9);
        assert!(!store.kick_on());
        assert_eq!(store.profile(), "afterhour");
        // Widening happens on read only
        assert_eq!(store.get("hats"), ParamValue::Int(1));
    }

    #[test]
    fn test_voice_params() {
        let store = ParamStore::new();
        store.set("darkness", 0.9);
        let (e, d, h) = store.voice_params();
        assert!((e - 0.5).abs() < 1e-9);
        assert!((d - 0.9).abs() < 1e-9);
        assert!((h - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_save_undo_reset() {
        let store = ParamStore::new();
        assert!(!store.undo());

        store.set("energy", 0.9);
        store.set("bpm", 132);
        store.save();

        match store.get("saved_state") {
            ParamValue::Snapshot(map) => {
                assert_eq!(map.get("energy"), Some(&ParamValue::Float(0.9)));
                assert_eq!(map.get("bpm"), Some(&ParamValue::Int(132)));
                assert!(!map.contains_key("saved_state"));
            }
            other => panic!("expected snapshot, got {:?}", other),
        }

        store.reset();
        assert_eq!(store.get("energy"), ParamValue::Float(0.5));
        assert_eq!(store.get("bpm"), ParamValue::Int(128));
        assert!(!store.get("saved_state").is_nil());

        assert!(store.undo());
        assert_eq!(store.get("energy"), ParamValue::Float(0.9));
        assert_eq!(store.get("bpm"), ParamValue::Int(132));
    }

    #[test]
    fn test_clones_share_state() {
        let store1 = ParamStore::new();
        let store2 = store1.clone();
        store1.set("energy", 0.7);
        assert_eq!(store2.get("energy"), ParamValue::Float(0.7));
    }

    #[test]
    fn test_concurrent_writers() {
        let store = ParamStore::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let s = store.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.set("hats", f64::from(i) / 10.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.version(), 400);
        let hats = store.hats();
        assert!((0.0..=0.3 + 1e-9).contains(&hats));
    }
}
